//! `{{placeholder}}` templating for diagnostic messages.
//!
//! A placeholder names a variable optionally followed by `|`-separated
//! transforms applied left to right:
//!
//! | transform         | effect                                              |
//! |-------------------|-----------------------------------------------------|
//! | `gravis`          | wraps a non-empty value in backticks                |
//! | `append-property` | appends ` property ` to a non-empty value           |
//! | `optional-typeof` | replaces an empty value with the value's type word  |
//! | `capitalize`      | upper-cases the first character                     |

use regex::{Captures, Regex};
use serde_json::Value;
use std::sync::LazyLock;

use crate::pointer::to_pointer;
use crate::types::Segment;

#[allow(clippy::unwrap_used)]
static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\{\{([^{}]+)\}\}").unwrap());

/// Variables available to message templates.
#[derive(Debug, Clone, Default)]
pub struct MessageVars<'a> {
    /// Name of the offending property, or empty.
    pub property: String,
    /// Message reported by the rule function.
    pub error: &'a str,
    /// Rule description.
    pub description: &'a str,
    /// Location of the diagnostic.
    pub path: &'a [Segment],
    /// Value at the diagnostic location.
    pub value: Option<&'a Value>,
}

/// Returns the lower-case type word used in messages (`object`, `string`, ...).
#[must_use]
pub fn type_word(value: Option<&Value>) -> &'static str {
    match value {
        None => "undefined",
        Some(Value::Null) => "null",
        Some(Value::Bool(_)) => "boolean",
        Some(Value::Number(_)) => "number",
        Some(Value::String(_)) => "string",
        Some(Value::Array(_)) => "array",
        Some(Value::Object(_)) => "object",
    }
}

/// Upper-cases the first character.
#[must_use]
pub fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Renders `template`, substituting every placeholder.
///
/// Unknown variables render as the empty string; unknown transforms are
/// ignored.
#[must_use]
pub fn render(template: &str, vars: &MessageVars<'_>) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures<'_>| {
            let mut parts = caps[1].split('|').map(str::trim);
            let mut text = parts.next().map(|name| lookup(name, vars)).unwrap_or_default();
            for transform in parts {
                text = apply(transform, text, vars);
            }
            text
        })
        .into_owned()
}

fn lookup(name: &str, vars: &MessageVars<'_>) -> String {
    match name {
        "property" => vars.property.clone(),
        "error" => vars.error.to_string(),
        "description" => vars.description.to_string(),
        "path" => format!("#{}", to_pointer(vars.path)),
        "value" => match vars.value {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => String::new(),
        },
        _ => String::new(),
    }
}

fn apply(transform: &str, text: String, vars: &MessageVars<'_>) -> String {
    match transform {
        "gravis" if !text.is_empty() => format!("`{text}`"),
        "append-property" if !text.is_empty() => format!("{text} property "),
        "optional-typeof" if text.is_empty() => format!("{} ", type_word(vars.value)),
        "capitalize" => capitalize(&text),
        _ => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path;
    use serde_json::json;

    const SUBJECT: &str = "{{property|gravis|append-property|optional-typeof|capitalize}}";

    #[test]
    fn subject_with_property() {
        let vars = MessageVars {
            property: "deprecated".into(),
            ..MessageVars::default()
        };
        assert_eq!(
            render(&format!("{SUBJECT}type should be boolean"), &vars),
            "`deprecated` property type should be boolean"
        );
    }

    #[test]
    fn subject_falls_back_to_type() {
        let value = json!({"deprecated": 17});
        let vars = MessageVars {
            value: Some(&value),
            ..MessageVars::default()
        };
        assert_eq!(
            render(&format!("{SUBJECT}should have required property `value`"), &vars),
            "Object should have required property `value`"
        );
    }

    #[test]
    fn does_not_exist_subject() {
        let vars = MessageVars {
            property: "payload".into(),
            ..MessageVars::default()
        };
        assert_eq!(
            render("{{property|gravis|append-property}}does not exist", &vars),
            "`payload` property does not exist"
        );
    }

    #[test]
    fn plain_variables() {
        let value = json!("users?x");
        let path = path!["channels", "users?x"];
        let vars = MessageVars {
            error: "bad",
            description: "Channels are plain",
            path: &path,
            value: Some(&value),
            ..MessageVars::default()
        };
        assert_eq!(
            render("{{description}}: {{error}} at {{path}} ({{value}}){{unknown}}", &vars),
            "Channels are plain: bad at #/channels/users?x (users?x)"
        );
    }

    #[test]
    fn text_without_placeholders_is_untouched() {
        assert_eq!(render("no {braces} here", &MessageVars::default()), "no {braces} here");
    }
}
