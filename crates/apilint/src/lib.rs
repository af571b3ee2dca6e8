//! # apilint
//!
//! Structural linter for OpenAPI and AsyncAPI documents.
//!
//! This crate ties the rule engine ([`apilint_core`]) to the built-in rule
//! functions ([`apilint_functions`]) and ships ready-made rulesets.
//!
//! ## Bundled Rules
//!
//! | Name | Checks |
//! |------|--------|
//! | `asyncapi2-channel-no-query-nor-fragment` | Channel keys carry no `?` or `#` |
//! | `asyncapi2-payload-example` | A payload `example` fits the payload and the schema object |
//! | `asyncapi2-payload-examples` | Every payload `examples` entry fits the payload and the schema object |
//!
//! ## Usage
//!
//! ```ignore
//! use apilint::{lint_document, DocumentInventory};
//!
//! let document = DocumentInventory::new(tree).with_source("api.yaml");
//! let result = lint_document(document).await?;
//! for diagnostic in &result.diagnostics {
//!     println!("{diagnostic}");
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod runner;

/// Bundled rulesets.
pub mod rulesets;

pub use runner::{lint_document, recommended_linter};

pub use apilint_core::{
    path, Diagnostic, DocumentInventory, DocumentSource, Format, FunctionRegistry, Linter,
    LintResult, LoadRulesetError, Rule, RuleFunction, Ruleset, Segment, Severity,
    EXCEPT_BUT_STDIN,
};
pub use apilint_functions::{builtin_functions, default_functions, ValidatorCache};
