//! # apilint-core
//!
//! Rule-matching engine for structural linting of API description documents
//! (OpenAPI, AsyncAPI) held as `serde_json::Value` trees.
//!
//! This crate provides:
//!
//! - [`PathCompiler`] turning a subset of path expressions into anchored
//!   patterns, so most rules are matched in one [`traverse`] of the document
//! - [`PathQueryEngine`] for the expressions that do not compile
//! - [`RuleFunction`] for the checks rules apply to matched nodes
//! - [`Linter`] orchestrating a run and aggregating [`Diagnostic`]s
//! - [`Ruleset`] loading rules from TOML
//!
//! ## Example
//!
//! ```ignore
//! use apilint_core::{DocumentInventory, Linter, Ruleset};
//!
//! let ruleset = Ruleset::from_file("ruleset.toml", &registry)?;
//! let linter = Linter::builder().ruleset(ruleset).build();
//!
//! let document = DocumentInventory::new(tree).with_source("api.yaml").with_detected_formats();
//! let result = linter.run(&document).await;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod compile;
mod document;
mod error;
mod exceptions;
mod lint;
mod query;
mod rule;
mod runner;
mod traverse;
mod types;

/// Diagnostic message templating.
pub mod message;
/// JSON pointer encoding helpers.
pub mod pointer;
/// TOML ruleset loading.
pub mod ruleset;

pub use compile::{compile, CompiledExpression, PathCompiler, ROOT};
pub use document::{DocumentInventory, DocumentNode, DocumentSource, Format};
pub use error::{FunctionError, LintError, QueryError};
pub use exceptions::{pivot_exceptions, ExceptionIndex, ExceptionLocation, Exceptions};
pub use lint::{lint_node, lint_targets, value_at, LintContext, LintStep, LintTarget, KEY_FIELD};
pub use query::{JsonPathEngine, PathQueryEngine};
pub use rule::{
    FunctionContext, FunctionFuture, FunctionOutput, FunctionRef, FunctionRegistry,
    FunctionResult, FunctionResults, Given, Rule, RuleAction, RuleFunction, RuleSeverity,
};
pub use ruleset::{LoadRulesetError, Ruleset};
pub use runner::{Linter, LinterBuilder, EXCEPT_BUT_STDIN};
pub use traverse::traverse;
pub use types::{Diagnostic, JsonPath, LintResult, Segment, Severity};
