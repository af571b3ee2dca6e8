//! Built-in function sets.

use apilint_core::FunctionRegistry;
use std::sync::Arc;

use crate::payload::PayloadValidation;
use crate::pattern::Pattern;
use crate::schema::{Schema, ValidatorCache};
use crate::truthy::Truthy;

/// Returns every built-in function, validating through `cache`.
///
/// Includes:
/// - `schema` - JSON Schema validation of the target
/// - `asyncapi2-payload-validation` - payload values against payload and schema object
/// - `pattern` - `match` / `not-match` regular expressions
/// - `truthy` - presence checks
#[must_use]
pub fn builtin_functions(cache: Arc<ValidatorCache>) -> FunctionRegistry {
    let mut registry = FunctionRegistry::new();
    registry
        .register(Schema::new(Arc::clone(&cache)))
        .register(PayloadValidation::new(cache))
        .register(Pattern::new())
        .register(Truthy);
    registry
}

/// Returns every built-in function around a fresh validator cache.
#[must_use]
pub fn default_functions() -> FunctionRegistry {
    builtin_functions(Arc::new(ValidatorCache::new()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registers_all_builtins() {
        let registry = default_functions();
        assert_eq!(
            registry.names(),
            vec!["asyncapi2-payload-validation", "pattern", "schema", "truthy"]
        );
    }
}
