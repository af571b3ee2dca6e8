//! AsyncAPI 2 payload validation.
//!
//! Values attached to a message payload (`example`, `examples`, `default`)
//! must satisfy both the payload schema itself and the AsyncAPI 2 rules for
//! writing schema objects. Both are checked in one pass against
//! `allOf: [payload, schemaObject]`, so a single value can be reported by
//! either half.

use apilint_core::{
    lint_targets, FunctionContext, FunctionError, FunctionOutput, FunctionResult,
    FunctionResults, RuleFunction, ROOT,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::{Arc, LazyLock};

use crate::schema::{validate_keyed, Dialect, ErrorMode, SchemaKey, ValidatorCache};

/// Where the schema-object metaschema lives inside the combined schema.
const SCHEMA_OBJECT_REF: &str = "#/definitions/asyncapi2SchemaObject";

/// The AsyncAPI 2 schema object: JSON Schema draft-07 plus the AsyncAPI
/// vocabulary (`discriminator`, `externalDocs`, `deprecated`, `x-` keys).
static SCHEMA_OBJECT: LazyLock<Value> = LazyLock::new(|| {
    let schema = json!({ "$ref": SCHEMA_OBJECT_REF });
    let schema_array = json!({ "type": "array", "minItems": 1, "items": schema });
    let non_negative = json!({ "type": "integer", "minimum": 0 });
    json!({
        "allOf": [
            {
                "type": ["object", "boolean"],
                "properties": {
                    "$id": { "type": "string" },
                    "$ref": { "type": "string" },
                    "title": { "type": "string" },
                    "description": { "type": "string" },
                    "default": true,
                    "readOnly": { "type": "boolean" },
                    "writeOnly": { "type": "boolean" },
                    "examples": { "type": "array" },
                    "multipleOf": { "type": "number", "exclusiveMinimum": 0 },
                    "maximum": { "type": "number" },
                    "exclusiveMaximum": { "type": "number" },
                    "minimum": { "type": "number" },
                    "exclusiveMinimum": { "type": "number" },
                    "maxLength": non_negative,
                    "minLength": non_negative,
                    "pattern": { "type": "string", "format": "regex" },
                    "additionalItems": schema,
                    "items": { "anyOf": [schema, schema_array] },
                    "maxItems": non_negative,
                    "minItems": non_negative,
                    "uniqueItems": { "type": "boolean" },
                    "contains": schema,
                    "maxProperties": non_negative,
                    "minProperties": non_negative,
                    "required": { "type": "array", "items": { "type": "string" }, "uniqueItems": true },
                    "additionalProperties": schema,
                    "properties": { "type": "object", "additionalProperties": schema },
                    "patternProperties": { "type": "object", "additionalProperties": schema },
                    "propertyNames": schema,
                    "const": true,
                    "enum": { "type": "array", "items": true },
                    "type": {
                        "anyOf": [
                            { "$ref": "#/definitions/simpleTypes" },
                            {
                                "type": "array",
                                "items": { "$ref": "#/definitions/simpleTypes" },
                                "minItems": 1,
                                "uniqueItems": true
                            }
                        ]
                    },
                    "format": { "type": "string" },
                    "if": schema,
                    "then": schema,
                    "else": schema,
                    "allOf": schema_array,
                    "anyOf": schema_array,
                    "oneOf": schema_array,
                    "not": schema
                }
            },
            {
                "type": "object",
                "patternProperties": { "^x-": true },
                "properties": {
                    "discriminator": { "type": "string" },
                    "externalDocs": {
                        "type": "object",
                        "required": ["url"],
                        "properties": {
                            "description": { "type": "string" },
                            "url": { "type": "string", "format": "uri" }
                        }
                    },
                    "deprecated": { "type": "boolean", "default": false }
                }
            }
        ]
    })
});

/// Builds the combined schema for one payload.
#[must_use]
pub fn combined_schema(payload: &Value) -> Value {
    json!({
        "allOf": [payload, { "$ref": SCHEMA_OBJECT_REF }],
        "definitions": {
            "asyncapi2SchemaObject": &*SCHEMA_OBJECT,
            "simpleTypes": {
                "enum": ["array", "boolean", "integer", "null", "number", "object", "string"]
            }
        }
    })
}

/// Options of the `asyncapi2-payload-validation` function.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct PayloadOptions {
    /// Values to check, relative to the payload (`example`, `$.examples.*`).
    #[serde(default)]
    pub field: Option<String>,
    /// Query selecting the payload schema inside the target (`$` = the
    /// target itself).
    #[serde(default = "default_schema_path")]
    pub schema_path: String,
}

fn default_schema_path() -> String {
    ROOT.to_string()
}

/// Validates payload values against the payload and the schema-object
/// metaschema at once.
#[derive(Debug, Clone)]
pub struct PayloadValidation {
    cache: Arc<ValidatorCache>,
}

impl PayloadValidation {
    /// Function name used in rulesets.
    pub const NAME: &'static str = "asyncapi2-payload-validation";

    /// Creates the function around a shared cache.
    #[must_use]
    pub fn new(cache: Arc<ValidatorCache>) -> Self {
        Self { cache }
    }

    fn check(&self, target: &Value, options: &PayloadOptions, ctx: &FunctionContext<'_>) -> FunctionResults {
        let payload = if options.schema_path == ROOT {
            Some(target)
        } else {
            ctx.query
                .evaluate(&options.schema_path, target)?
                .into_iter()
                .next()
                .map(|node| node.value)
        };
        let Some(payload) = payload else {
            return Ok(Vec::new());
        };
        let key = SchemaKey::of(payload).derived(Self::NAME);

        let mut results = Vec::new();
        for item in lint_targets(target, options.field.as_deref(), ctx.query)? {
            // Nothing to check when the payload carries no such value.
            let Some(value) = item.value else {
                continue;
            };
            let mut base = ctx.path.to_vec();
            base.extend(item.path);
            results.extend(validate_keyed(
                &self.cache,
                key.clone(),
                || combined_schema(payload),
                Dialect::default(),
                ErrorMode::All,
                Some(&*value),
                &base,
            )?);
        }
        Ok(results)
    }
}

impl RuleFunction for PayloadValidation {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn description(&self) -> &'static str {
        "Validates payload examples against the payload schema and the AsyncAPI 2 schema object"
    }

    fn execute(
        &self,
        target: Option<&Value>,
        options: &Value,
        ctx: &FunctionContext<'_>,
    ) -> FunctionOutput {
        let Some(target) = target else {
            return FunctionOutput::Ready(Ok(Vec::<FunctionResult>::new()));
        };
        let result = PayloadOptions::deserialize(options)
            .map_err(|e| FunctionError::invalid_options(Self::NAME, e.to_string()))
            .and_then(|options| self.check(target, &options, ctx));
        FunctionOutput::Ready(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::validate;

    #[test]
    fn combined_schema_places_metaschema_under_definitions() {
        let schema = combined_schema(&json!({"type": "string"}));
        assert_eq!(schema["allOf"][0], json!({"type": "string"}));
        assert_eq!(schema["allOf"][1]["$ref"], SCHEMA_OBJECT_REF);
        assert_eq!(
            schema.pointer("/definitions/asyncapi2SchemaObject/allOf/1/properties/deprecated/type"),
            Some(&json!("boolean"))
        );
    }

    #[test]
    fn metaschema_accepts_schema_objects() {
        let cache = ValidatorCache::new();
        let meta = combined_schema(&json!(true));
        let valid = json!({
            "type": "object",
            "properties": {"a": {"type": ["string", "null"]}},
            "deprecated": true,
            "x-internal": 1
        });
        let results = validate(&cache, &meta, Dialect::default(), ErrorMode::All, Some(&valid), &[]).unwrap();
        assert!(results.is_empty(), "{results:?}");

        let invalid = json!({"properties": {"a": {"deprecated": "yes"}}});
        let results = validate(&cache, &meta, Dialect::default(), ErrorMode::All, Some(&invalid), &[]).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(
            results[0].path,
            Some(apilint_core::path!["properties", "a", "deprecated"])
        );
    }

    #[test]
    fn options_default_to_the_target_schema() {
        let options = PayloadOptions::deserialize(&json!({"field": "example"})).unwrap();
        assert_eq!(options.schema_path, ROOT);
        assert!(PayloadOptions::deserialize(&json!({"fields": "x"})).is_err());
    }
}
