//! JSON Schema validation of lint targets.
//!
//! # Architecture
//!
//! ```text
//! target value + schema
//!   ↓ ValidatorCache (compile once per dialect, mode and schema)
//! jsonschema errors
//!   ↓ RawError (owned)
//!   ↓ normalize_errors (enrich, clean, locate)
//! FunctionResult list
//! ```

use apilint_core::{
    Format, FunctionContext, FunctionError, FunctionOutput, FunctionResult, FunctionResults,
    RuleFunction, Segment,
};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

pub mod cache;
pub mod dialect;
pub mod normalize;

pub use cache::{CompiledSchema, ErrorMode, SchemaError, SchemaKey, ValidatorCache};
pub use dialect::Dialect;
pub use normalize::{normalize_errors, ErrorDetail, RawError, DOES_NOT_EXIST, SUBJECT};

/// Validates `target` against `schema`, locating findings under `base`.
///
/// An absent target yields a single "does not exist" finding without
/// running the validator. A schema whose `$ref` cannot be resolved yields a
/// single finding at `base` carrying the resolver's message.
///
/// # Errors
///
/// Returns [`FunctionError::Validator`] if the schema is malformed.
pub fn validate(
    cache: &ValidatorCache,
    schema: &Value,
    dialect: Dialect,
    mode: ErrorMode,
    target: Option<&Value>,
    base: &[Segment],
) -> FunctionResults {
    let Some(target) = target else {
        return Ok(vec![FunctionResult::at(DOES_NOT_EXIST, base.to_vec())]);
    };
    run(cache.compile(schema, dialect, mode), mode, target, base)
}

/// Like [`validate`], for a schema cached under `key` and built by `build`
/// only when the key is new.
///
/// # Errors
///
/// Returns [`FunctionError::Validator`] if the built schema is malformed.
pub fn validate_keyed<F>(
    cache: &ValidatorCache,
    key: SchemaKey,
    build: F,
    dialect: Dialect,
    mode: ErrorMode,
    target: Option<&Value>,
    base: &[Segment],
) -> FunctionResults
where
    F: FnOnce() -> Value,
{
    let Some(target) = target else {
        return Ok(vec![FunctionResult::at(DOES_NOT_EXIST, base.to_vec())]);
    };
    run(cache.compile_keyed(key, dialect, mode, build), mode, target, base)
}

fn run(
    compiled: Result<Arc<CompiledSchema>, SchemaError>,
    mode: ErrorMode,
    target: &Value,
    base: &[Segment],
) -> FunctionResults {
    let compiled = match compiled {
        Ok(compiled) => compiled,
        Err(SchemaError::MissingReference(message)) => {
            return Ok(vec![FunctionResult::at(message, base.to_vec())]);
        }
        Err(err @ SchemaError::Invalid(_)) => return Err(FunctionError::Validator(err.to_string())),
    };

    let errors = compiled.validator().iter_errors(target);
    let raw: Vec<RawError> = match mode {
        ErrorMode::All => errors.map(|e| RawError::from_validation_error(&e)).collect(),
        ErrorMode::First => errors.take(1).map(|e| RawError::from_validation_error(&e)).collect(),
    };
    if raw.is_empty() {
        return Ok(Vec::new());
    }
    debug!(errors = raw.len(), "schema validation failed");

    Ok(normalize_errors(&raw, compiled.schema(), target, base))
}

// ────────────────────────────────────────────
// `schema` rule function
// ────────────────────────────────────────────

/// Options of the `schema` function.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct SchemaOptions {
    /// The schema to validate against.
    pub schema: Value,
    /// Dialect name (`draft7` when omitted); see [`Dialect::from_name`].
    #[serde(default)]
    pub dialect: Option<String>,
    /// Report every error instead of the first only.
    #[serde(default)]
    pub all_errors: bool,
}

/// Validates the lint target against a schema given in the rule options.
///
/// When the rule leaves the dialect open, documents detected as OpenAPI
/// use the matching OpenAPI dialect.
#[derive(Debug, Clone)]
pub struct Schema {
    cache: Arc<ValidatorCache>,
}

impl Schema {
    /// Function name used in rulesets.
    pub const NAME: &'static str = "schema";

    /// Creates the function around a shared cache.
    #[must_use]
    pub fn new(cache: Arc<ValidatorCache>) -> Self {
        Self { cache }
    }

    fn dialect(options: &SchemaOptions, ctx: &FunctionContext<'_>) -> Result<Dialect, FunctionError> {
        if let Some(name) = &options.dialect {
            return Dialect::from_name(name).ok_or_else(|| {
                FunctionError::invalid_options(Self::NAME, format!("unknown dialect `{name}`"))
            });
        }
        let has = |format: &str| {
            ctx.document
                .formats
                .as_ref()
                .is_some_and(|formats| formats.contains(&Format::new(format)))
        };
        Ok(if has(Format::OAS2) {
            Dialect::OpenApi2
        } else if has(Format::OAS3) {
            Dialect::OpenApi3
        } else {
            Dialect::default()
        })
    }
}

impl RuleFunction for Schema {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn description(&self) -> &'static str {
        "Validates the target against a JSON Schema"
    }

    fn execute(
        &self,
        target: Option<&Value>,
        options: &Value,
        ctx: &FunctionContext<'_>,
    ) -> FunctionOutput {
        let result = SchemaOptions::deserialize(options)
            .map_err(|e| FunctionError::invalid_options(Self::NAME, e.to_string()))
            .and_then(|options| {
                let dialect = Self::dialect(&options, ctx)?;
                validate(
                    &self.cache,
                    &options.schema,
                    dialect,
                    ErrorMode::from_all_errors(options.all_errors),
                    target,
                    ctx.path,
                )
            });
        FunctionOutput::Ready(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use apilint_core::path;
    use serde_json::json;

    #[test]
    fn absent_target_short_circuits() {
        let cache = ValidatorCache::new();
        let results = validate(
            &cache,
            &json!({"type": "string"}),
            Dialect::default(),
            ErrorMode::All,
            None,
            &path!["info", "title"],
        )
        .unwrap();
        assert_eq!(results, vec![FunctionResult::at(DOES_NOT_EXIST, path!["info", "title"])]);
        assert!(cache.is_empty());
    }

    #[test]
    fn valid_value_has_no_findings() {
        let cache = ValidatorCache::new();
        let results = validate(
            &cache,
            &json!({"type": "integer"}),
            Dialect::default(),
            ErrorMode::All,
            Some(&json!(3)),
            &[],
        )
        .unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn first_error_mode_stops_early() {
        let cache = ValidatorCache::new();
        let schema = json!({"properties": {"a": {"type": "string"}, "b": {"type": "string"}}});
        let value = json!({"a": 1, "b": 2});

        let all = validate(&cache, &schema, Dialect::default(), ErrorMode::All, Some(&value), &[]).unwrap();
        let first =
            validate(&cache, &schema, Dialect::default(), ErrorMode::First, Some(&value), &[]).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(first.len(), 1);
    }

    #[test]
    fn missing_reference_becomes_a_finding() {
        let cache = ValidatorCache::new();
        let results = validate(
            &cache,
            &json!({"$ref": "#/definitions/nowhere"}),
            Dialect::default(),
            ErrorMode::All,
            Some(&json!({})),
            &path!["components"],
        )
        .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].path, Some(path!["components"]));
    }

    #[test]
    fn malformed_schema_fails() {
        let cache = ValidatorCache::new();
        let err = validate(
            &cache,
            &json!({"type": 12}),
            Dialect::default(),
            ErrorMode::All,
            Some(&json!(1)),
            &[],
        )
        .unwrap_err();
        assert!(matches!(err, FunctionError::Validator(_)));
    }

    #[test]
    fn openapi3_accepts_nullable() {
        let cache = ValidatorCache::new();
        let schema = json!({"type": "string", "nullable": true});
        let results =
            validate(&cache, &schema, Dialect::OpenApi3, ErrorMode::All, Some(&Value::Null), &[]).unwrap();
        assert!(results.is_empty());

        let results =
            validate(&cache, &schema, Dialect::OpenApi2, ErrorMode::All, Some(&Value::Null), &[]).unwrap();
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn options_are_checked() {
        let err = SchemaOptions::deserialize(&json!({"schema": {}, "bogus": 1})).unwrap_err();
        assert!(err.to_string().contains("bogus"));

        let options = SchemaOptions::deserialize(&json!({"schema": {}, "all-errors": true})).unwrap();
        assert!(options.all_errors);
        assert_eq!(options.dialect, None);
    }
}
