//! Schema dialects and the validator options built for each.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use jsonschema::{Draft, ValidationOptions};
use serde_json::{json, Map, Value};

/// The schema language a schema is written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    /// Plain JSON Schema of the given draft.
    JsonSchema(Draft),
    /// Swagger 2.0 schema objects (draft-04 based).
    OpenApi2,
    /// OpenAPI 3.0 schema objects (draft-04 based, with `nullable`).
    OpenApi3,
}

impl Default for Dialect {
    fn default() -> Self {
        Self::JsonSchema(Draft::Draft7)
    }
}

impl Dialect {
    /// Parses a dialect name as used in rule options.
    ///
    /// Accepts `draft4`, `draft6`, `draft7`, `draft2019-09`, `draft2020-12`,
    /// `oas2` and `oas3`.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        let dialect = match name {
            "draft4" => Self::JsonSchema(Draft::Draft4),
            "draft6" => Self::JsonSchema(Draft::Draft6),
            "draft7" => Self::JsonSchema(Draft::Draft7),
            "draft2019-09" => Self::JsonSchema(Draft::Draft201909),
            "draft2020-12" => Self::JsonSchema(Draft::Draft202012),
            "oas2" => Self::OpenApi2,
            "oas3" => Self::OpenApi3,
            _ => return None,
        };
        Some(dialect)
    }

    /// The JSON Schema draft validation runs under.
    #[must_use]
    pub fn draft(self) -> Draft {
        match self {
            Self::JsonSchema(draft) => draft,
            Self::OpenApi2 | Self::OpenApi3 => Draft::Draft4,
        }
    }

    /// Validator options for this dialect.
    pub(crate) fn options(self) -> ValidationOptions<'static> {
        jsonschema::options()
            .with_draft(self.draft())
            .should_validate_formats(true)
            .with_format("byte", is_base64)
    }

    /// Rewrites keywords the validator does not know into plain JSON Schema.
    ///
    /// Numeric OpenAPI formats (`int32`, `int64`, `float`, `double`) become
    /// range constraints in every dialect. Under OpenAPI 3, `nullable: true`
    /// also widens `type` to admit `null`.
    #[must_use]
    pub fn prepare(self, mut schema: Value) -> Value {
        rewrite(&mut schema, self == Self::OpenApi3);
        schema
    }
}

fn rewrite(value: &mut Value, nullable: bool) {
    match value {
        Value::Object(map) => {
            if nullable {
                widen_nullable(map);
            }
            constrain_numeric_format(map);
            for (keyword, child) in map.iter_mut() {
                match keyword.as_str() {
                    // Instance data, not subschemas.
                    "const" | "default" | "enum" | "example" | "examples" => {}
                    "properties" | "patternProperties" | "definitions" | "$defs" | "dependencies"
                    | "dependentSchemas" => {
                        if let Value::Object(members) = child {
                            members.values_mut().for_each(|m| rewrite(m, nullable));
                        }
                    }
                    _ => rewrite(child, nullable),
                }
            }
        }
        Value::Array(items) => items.iter_mut().for_each(|item| rewrite(item, nullable)),
        _ => {}
    }
}

fn widen_nullable(map: &mut Map<String, Value>) {
    if map.get("nullable") != Some(&Value::Bool(true)) {
        return;
    }
    let widened = match map.get("type") {
        Some(Value::String(t)) => Some(Value::from(vec![t.clone(), "null".to_string()])),
        Some(Value::Array(types)) if !types.iter().any(|t| t == "null") => {
            let mut types = types.clone();
            types.push(Value::from("null"));
            Some(Value::Array(types))
        }
        _ => None,
    };
    if let Some(widened) = widened {
        map.insert("type".to_string(), widened);
    }
}

/// Range a numeric format admits, as schema keywords. Non-numbers pass.
fn numeric_range(format: &str) -> Option<Value> {
    let range = match format {
        "int32" => json!({ "multipleOf": 1, "minimum": i32::MIN, "maximum": i32::MAX }),
        "int64" => json!({ "multipleOf": 1, "minimum": i64::MIN, "maximum": i64::MAX }),
        "float" => json!({ "minimum": -f64::from(f32::MAX), "maximum": f64::from(f32::MAX) }),
        "double" => json!({ "minimum": -f64::MAX, "maximum": f64::MAX }),
        _ => return None,
    };
    Some(range)
}

fn constrain_numeric_format(map: &mut Map<String, Value>) {
    let Some(range) = map.get("format").and_then(Value::as_str).and_then(numeric_range) else {
        return;
    };
    match map.get_mut("allOf") {
        Some(Value::Array(all_of)) => all_of.push(range),
        _ => {
            map.insert("allOf".to_string(), Value::Array(vec![range]));
        }
    }
}

fn is_base64(value: &str) -> bool {
    STANDARD.decode(value).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_map_to_dialects() {
        assert_eq!(Dialect::from_name("oas3"), Some(Dialect::OpenApi3));
        assert_eq!(Dialect::from_name("draft4").map(Dialect::draft), Some(Draft::Draft4));
        assert_eq!(Dialect::OpenApi2.draft(), Draft::Draft4);
        assert_eq!(Dialect::from_name("draft5"), None);
    }

    #[test]
    fn nullable_widens_type_in_openapi3_only() {
        let schema = json!({
            "type": "object",
            "properties": {"a": {"type": "string", "nullable": true}, "b": {"nullable": true}}
        });

        let prepared = Dialect::OpenApi3.prepare(schema.clone());
        assert_eq!(prepared["properties"]["a"]["type"], json!(["string", "null"]));
        assert_eq!(prepared["properties"]["b"], json!({"nullable": true}));

        assert_eq!(Dialect::OpenApi2.prepare(schema.clone()), schema);
    }

    #[test]
    fn base64_check() {
        assert!(is_base64("aGVsbG8="));
        assert!(is_base64(""));
        assert!(!is_base64("aGVsbG8"));
        assert!(!is_base64("a*==ab=="));
        assert!(!is_base64("aGVsbG8=\n"));
    }

    #[test]
    fn numeric_formats_become_ranges() {
        let schema = json!({
            "properties": {
                "count": {"type": "integer", "format": "int32"},
                "ratio": {"format": "float", "allOf": [{"minimum": 0}]},
                "default": {"format": "int64"}
            },
            "default": {"format": "int32"},
            "enum": [{"format": "int32"}]
        });

        let prepared = Dialect::default().prepare(schema);
        assert_eq!(
            prepared["properties"]["count"]["allOf"],
            json!([{"multipleOf": 1, "minimum": -2_147_483_648_i64, "maximum": 2_147_483_647}])
        );
        assert_eq!(prepared["properties"]["ratio"]["allOf"].as_array().map(Vec::len), Some(2));
        assert!(prepared["properties"]["default"].get("allOf").is_some());
        assert_eq!(prepared["default"], json!({"format": "int32"}));
        assert_eq!(prepared["enum"], json!([{"format": "int32"}]));
    }

    #[test]
    fn int32_rejects_out_of_range_and_fractional_numbers() {
        let schema = Dialect::OpenApi3.prepare(json!({"type": "number", "format": "int32"}));
        let validator = Dialect::OpenApi3.options().build(&schema).unwrap();

        assert!(validator.is_valid(&json!(2_147_483_647)));
        assert!(!validator.is_valid(&json!(2_147_483_648_i64)));
        assert!(!validator.is_valid(&json!(1.5)));
        assert!(validator.is_valid(&json!(-2_147_483_648_i64)));
    }

    #[test]
    fn byte_format_requires_base64() {
        let validator = Dialect::default()
            .options()
            .build(&json!({"type": "string", "format": "byte"}))
            .unwrap();
        assert!(validator.is_valid(&json!("aGVsbG8=")));
        assert!(!validator.is_valid(&json!("not base64!")));
    }
}
