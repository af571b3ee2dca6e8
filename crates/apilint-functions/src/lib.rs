//! # apilint-functions
//!
//! Built-in rule functions for apilint.
//!
//! ## Available Functions
//!
//! | Name | Description |
//! |------|-------------|
//! | `schema` | Validates the target against a JSON Schema (draft 4 to 2020-12, OpenAPI 2/3) |
//! | `asyncapi2-payload-validation` | Validates payload values against the payload and the AsyncAPI 2 schema object |
//! | `pattern` | Checks a string against `match` / `not-match` expressions |
//! | `truthy` | Requires the target to be present and truthy |
//!
//! Validating functions share a [`ValidatorCache`], so each schema is
//! compiled once per process.
//!
//! ## Usage
//!
//! ```ignore
//! use apilint_core::Ruleset;
//! use apilint_functions::{builtin_functions, ValidatorCache};
//!
//! let registry = builtin_functions(Arc::new(ValidatorCache::new()));
//! let ruleset = Ruleset::from_file("ruleset.toml", &registry)?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![recursion_limit = "256"]

mod payload;
mod pattern;
mod registry;
mod truthy;

/// JSON Schema validation pipeline.
pub mod schema;

pub use payload::{combined_schema, PayloadOptions, PayloadValidation};
pub use pattern::{Pattern, PatternOptions};
pub use registry::{builtin_functions, default_functions};
pub use schema::{
    normalize_errors, validate, validate_keyed, CompiledSchema, Dialect, ErrorMode, RawError,
    Schema, SchemaError, SchemaKey, SchemaOptions, ValidatorCache,
};
pub use truthy::Truthy;
