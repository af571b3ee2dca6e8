//! Rulesets shipped with apilint.

use apilint_core::{FunctionRegistry, LoadRulesetError, Ruleset};

/// TOML source of the AsyncAPI 2 ruleset.
pub const ASYNCAPI: &str = include_str!("asyncapi.toml");

/// Loads the AsyncAPI 2 ruleset, resolving functions through `registry`.
///
/// # Errors
///
/// Returns an error if `registry` lacks a function the ruleset uses.
pub fn asyncapi(registry: &FunctionRegistry) -> Result<Ruleset, LoadRulesetError> {
    Ruleset::parse(ASYNCAPI, registry)
}
