//! TOML deserialization types (DTO layer).
//!
//! These types exist solely for serde deserialization.
//! They are converted to [`crate::Rule`]s by the loader.

use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Raw TOML representation of a ruleset.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RulesetDto {
    /// Rules by name.
    #[serde(default)]
    pub rules: BTreeMap<String, RuleDto>,

    /// `"<source>#<pointer>"` to suppressed rule names.
    #[serde(default)]
    pub except: BTreeMap<String, Vec<String>>,
}

/// TOML representation of one rule.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RuleDto {
    /// Human description.
    #[serde(default)]
    pub description: Option<String>,
    /// Message template.
    #[serde(default)]
    pub message: Option<String>,
    /// One expression or a list of them.
    pub given: GivenDto,
    /// Severity (default: "warn").
    #[serde(default = "default_severity_str")]
    pub severity: String,
    /// Applicable formats.
    #[serde(default)]
    pub formats: Option<Vec<String>>,
    /// Whether to lint the resolved tree (default: true).
    #[serde(default = "default_resolved")]
    pub resolved: bool,
    /// Actions.
    #[serde(default)]
    pub then: Vec<ActionDto>,
}

/// `given` accepts a string or an array of strings.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum GivenDto {
    /// A single expression.
    One(String),
    /// Several expressions.
    Many(Vec<String>),
}

impl GivenDto {
    /// Flattens into a list.
    #[must_use]
    pub fn into_vec(self) -> Vec<String> {
        match self {
            Self::One(expression) => vec![expression],
            Self::Many(expressions) => expressions,
        }
    }
}

/// TOML representation of one `then` entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ActionDto {
    /// Optional lint target.
    #[serde(default)]
    pub field: Option<String>,
    /// Function name.
    pub function: String,
    /// Function options.
    #[serde(default)]
    pub function_options: Value,
}

fn default_severity_str() -> String {
    "warn".to_string()
}

fn default_resolved() -> bool {
    true
}
