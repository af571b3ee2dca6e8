//! Turning validator errors into located, readable findings.
//!
//! Raw validator messages are first enriched (precise sub-path, wording,
//! "Did you mean" suggestions) where the failing keyword is understood, then
//! cleaned into the `{{property...}}` subject form the message templating
//! resolves per diagnostic.

use apilint_core::message::{capitalize, type_word};
use apilint_core::pointer::{encode_fragment, parse_pointer};
use apilint_core::{value_at, FunctionResult, JsonPath, Segment};
use jsonschema::error::ValidationErrorKind;
use jsonschema::ValidationError;
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

/// Subject placeholder, rendered as "`name` property " or a capitalized
/// type word.
pub const SUBJECT: &str = "{{property|gravis|append-property|optional-typeof|capitalize}}";

/// Message for an absent validation target.
pub const DOES_NOT_EXIST: &str = "{{property|gravis|append-property}}does not exist";

#[allow(clippy::unwrap_used)]
static PROPERTY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(Property\s+)(\S+)").unwrap());

/// Minimum similarity for a "Did you mean" suggestion.
const SUGGESTION_THRESHOLD: f64 = 0.7;

/// Keyword-specific facts carried over from the validator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorDetail {
    /// A `required` property is missing.
    Required(String),
    /// Properties rejected by `additionalProperties`.
    Unexpected(Vec<String>),
    /// Nothing beyond the message.
    None,
}

/// A validator error detached from the validator's lifetimes.
#[derive(Debug, Clone, PartialEq)]
pub struct RawError {
    /// Pointer to the failing value, relative to the validated value.
    pub instance_path: String,
    /// Pointer to the failing keyword inside the schema.
    pub schema_path: String,
    /// The validator's message.
    pub message: String,
    /// The failing value.
    pub instance: Value,
    /// Keyword-specific facts.
    pub detail: ErrorDetail,
}

impl RawError {
    /// Captures a `jsonschema` validation error.
    #[must_use]
    pub fn from_validation_error(error: &ValidationError<'_>) -> Self {
        let detail = match error.kind() {
            ValidationErrorKind::Required { property } => ErrorDetail::Required(
                property
                    .as_str()
                    .map_or_else(|| property.to_string(), str::to_string),
            ),
            ValidationErrorKind::AdditionalProperties { unexpected } => {
                ErrorDetail::Unexpected(unexpected.clone())
            }
            _ => ErrorDetail::None,
        };
        let instance: &Value = error.instance();
        Self {
            instance_path: error.instance_path().to_string(),
            schema_path: error.schema_path().to_string(),
            message: error.to_string(),
            instance: instance.clone(),
            detail,
        }
    }

    fn keyword(&self) -> &str {
        self.schema_path.rsplit('/').next().unwrap_or_default()
    }
}

/// An error after enrichment: where it is, what it says, what to suggest.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Explained {
    sub_path: String,
    message: String,
    suggestion: Option<String>,
}

/// Converts validator errors into results located under `base`.
///
/// `schema` is the schema that produced the errors and `target` the value
/// that was validated.
#[must_use]
pub fn normalize_errors(
    errors: &[RawError],
    schema: &Value,
    target: &Value,
    base: &[Segment],
) -> Vec<FunctionResult> {
    errors
        .iter()
        .flat_map(|error| {
            let mut explained = enrich(error, schema);
            if explained.is_empty() {
                explained.push(Explained {
                    sub_path: error.instance_path.clone(),
                    message: error.message.clone(),
                    suggestion: None,
                });
            }
            explained.into_iter().map(move |e| {
                let message = clean_message(&e.message, &e.sub_path, target);
                let message = match e.suggestion.filter(|s| !s.is_empty()) {
                    Some(suggestion) => format!("{message}. {suggestion}"),
                    None => message,
                };
                FunctionResult::at(message.replace(['"', '\''], "`"), compose_path(base, &e.sub_path, target))
            })
        })
        .collect()
}

// ────────────────────────────────────────────
// Enrichment
// ────────────────────────────────────────────

fn enrich(error: &RawError, schema: &Value) -> Vec<Explained> {
    let at = &error.instance_path;
    let Some(node) = schema_at(schema, &error.schema_path) else {
        return Vec::new();
    };

    match (error.keyword(), &error.detail) {
        ("type", _) => {
            let types = match node {
                Value::String(t) => t.clone(),
                Value::Array(types) => types
                    .iter()
                    .filter_map(Value::as_str)
                    .collect::<Vec<_>>()
                    .join(","),
                _ => return Vec::new(),
            };
            vec![Explained {
                sub_path: at.clone(),
                message: format!("{at}: type should be {types}"),
                suggestion: None,
            }]
        }
        ("required", ErrorDetail::Required(property)) => vec![Explained {
            sub_path: at.clone(),
            message: format!("{at}: should have required property '{property}'"),
            suggestion: None,
        }],
        ("additionalProperties", ErrorDetail::Unexpected(unexpected)) => {
            let parent = parent_path(&error.schema_path);
            let allowed: Vec<&str> = schema_at(schema, parent)
                .and_then(|p| p.get("properties"))
                .and_then(Value::as_object)
                .map(|props| props.keys().map(String::as_str).collect())
                .unwrap_or_default();
            unexpected
                .iter()
                .map(|name| Explained {
                    sub_path: format!("{at}/{}", encode_fragment(name)),
                    message: format!("Property {name} is not expected to be here"),
                    suggestion: closest(allowed.iter().copied(), name)
                        .map(|c| format!("Did you mean `{c}`?")),
                })
                .collect()
        }
        ("enum", _) => {
            let Some(options) = node.as_array() else {
                return Vec::new();
            };
            let listed: Vec<String> = options.iter().map(Value::to_string).collect();
            let suggestion = error.instance.as_str().and_then(|given| {
                closest(options.iter().filter_map(Value::as_str), given)
                    .map(|c| format!("Did you mean `{c}`?"))
            });
            vec![Explained {
                sub_path: at.clone(),
                message: format!(
                    "{at}: should be equal to one of the allowed values: {}",
                    listed.join(", ")
                ),
                suggestion,
            }]
        }
        _ => Vec::new(),
    }
}

fn parent_path(pointer: &str) -> &str {
    pointer.rsplit_once('/').map_or("", |(parent, _)| parent)
}

/// Walks a schema pointer, following local `$ref`s met on the way.
fn schema_at<'s>(root: &'s Value, pointer: &str) -> Option<&'s Value> {
    let mut node = root;
    for segment in parse_pointer(pointer) {
        let key = segment.as_key()?;
        if key == "$ref" {
            node = resolve_ref(root, node)?;
            continue;
        }
        node = match child(node, key) {
            Some(next) => next,
            None => child(resolve_ref(root, node)?, key)?,
        };
    }
    Some(node)
}

fn child<'s>(node: &'s Value, key: &str) -> Option<&'s Value> {
    match node {
        Value::Object(map) => map.get(key),
        Value::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    }
}

fn resolve_ref<'s>(root: &'s Value, node: &Value) -> Option<&'s Value> {
    let reference = node.get("$ref")?.as_str()?;
    root.pointer(reference.strip_prefix('#')?)
}

fn closest<'a>(candidates: impl IntoIterator<Item = &'a str>, input: &str) -> Option<&'a str> {
    candidates
        .into_iter()
        .map(|c| (c, strsim::jaro_winkler(c, input)))
        .filter(|(_, score)| *score >= SUGGESTION_THRESHOLD)
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(c, _)| c)
}

// ────────────────────────────────────────────
// Cleaning
// ────────────────────────────────────────────

/// Rewrites a message into subject form. Messages with no recognizable
/// subject are prefixed with the type of the whole validated value.
fn clean_message(message: &str, sub_path: &str, target: &Value) -> String {
    if !sub_path.is_empty() {
        let prefix = Regex::new(&format!(
            r"^{}:?\s*(?:(Property\s+)(\S+))?",
            regex::escape(sub_path)
        ));
        if let Some(caps) = prefix.ok().and_then(|re| re.captures(message)) {
            let rest = &message[caps.get(0).map_or(0, |m| m.end())..];
            return match caps.get(2) {
                Some(name) => format!("Property `{}`{rest}", unquote(name.as_str())),
                None => format!("{SUBJECT}{rest}"),
            };
        }
    }

    if let Some(rest) = message.strip_prefix(':') {
        return format!("{SUBJECT}{}", rest.trim_start());
    }

    if let Some(caps) = PROPERTY.captures(message) {
        let rest = &message[caps.get(0).map_or(0, |m| m.end())..];
        return format!("Property `{}`{rest}", unquote(&caps[2]));
    }

    format!("{} {message}", capitalize(type_word(Some(target))))
}

fn unquote(name: &str) -> &str {
    name.trim_matches(['"', '\'', '`'])
}

/// Appends the decoded sub-path to `base`, using index segments where the
/// validated value holds arrays.
fn compose_path(base: &[Segment], sub_path: &str, target: &Value) -> JsonPath {
    let mut path = base.to_vec();
    let mut node = Some(target);
    for segment in parse_pointer(sub_path) {
        let segment = match (node, &segment) {
            (Some(Value::Array(_)), Segment::Key(key)) => {
                key.parse().map_or(segment, Segment::Index)
            }
            _ => segment,
        };
        node = node.and_then(|n| value_at(n, std::slice::from_ref(&segment)));
        path.push(segment);
    }
    path
}
