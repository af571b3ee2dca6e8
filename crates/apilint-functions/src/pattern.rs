//! Regular-expression checks on string targets.

use apilint_core::{FunctionContext, FunctionError, FunctionOutput, FunctionResult, RuleFunction};
use parking_lot::RwLock;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;

/// Options of the `pattern` function. At least one must be set.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct PatternOptions {
    /// The target must match this expression.
    #[serde(default, rename = "match")]
    pub must_match: Option<String>,
    /// The target must not match this expression.
    #[serde(default)]
    pub not_match: Option<String>,
}

/// Checks string targets against `match` / `not-match` expressions.
///
/// Expressions may be written as `/source/flags`; the `i`, `m` and `s`
/// flags are honoured. Compiled expressions are kept for reuse.
#[derive(Debug, Default)]
pub struct Pattern {
    compiled: RwLock<HashMap<String, Regex>>,
}

impl Pattern {
    /// Function name used in rulesets.
    pub const NAME: &'static str = "pattern";

    /// Creates the function.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn regex(&self, expression: &str) -> Result<Regex, FunctionError> {
        if let Some(regex) = self.compiled.read().get(expression) {
            return Ok(regex.clone());
        }
        let regex = Regex::new(&to_regex_syntax(expression))
            .map_err(|e| FunctionError::invalid_options(Self::NAME, e.to_string()))?;
        self.compiled
            .write()
            .insert(expression.to_string(), regex.clone());
        Ok(regex)
    }

    fn check(&self, value: &str, options: &PatternOptions) -> Result<Vec<FunctionResult>, FunctionError> {
        if options.must_match.is_none() && options.not_match.is_none() {
            return Err(FunctionError::invalid_options(
                Self::NAME,
                "one of `match` or `not-match` is required",
            ));
        }

        let mut results = Vec::new();
        if let Some(expression) = &options.must_match {
            if !self.regex(expression)?.is_match(value) {
                results.push(FunctionResult::new(format!(
                    "{{{{property|gravis|append-property}}}}must match the pattern `{expression}`"
                )));
            }
        }
        if let Some(expression) = &options.not_match {
            if self.regex(expression)?.is_match(value) {
                results.push(FunctionResult::new(format!(
                    "{{{{property|gravis|append-property}}}}must not match the pattern `{expression}`"
                )));
            }
        }
        Ok(results)
    }
}

/// Turns `/source/flags` into inline-flag syntax; other text is kept as is.
fn to_regex_syntax(expression: &str) -> String {
    let Some(body) = expression.strip_prefix('/') else {
        return expression.to_string();
    };
    match body.rsplit_once('/') {
        Some((source, flags)) if flags.chars().all(|c| matches!(c, 'i' | 'm' | 's' | 'g' | 'u')) => {
            let inline: String = flags.chars().filter(|c| matches!(c, 'i' | 'm' | 's')).collect();
            if inline.is_empty() {
                source.to_string()
            } else {
                format!("(?{inline}){source}")
            }
        }
        _ => expression.to_string(),
    }
}

impl RuleFunction for Pattern {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn description(&self) -> &'static str {
        "Checks a string against a regular expression"
    }

    fn execute(
        &self,
        target: Option<&Value>,
        options: &Value,
        _ctx: &FunctionContext<'_>,
    ) -> FunctionOutput {
        let Some(value) = target.and_then(Value::as_str) else {
            return FunctionOutput::Ready(Ok(Vec::new()));
        };
        let result = PatternOptions::deserialize(options)
            .map_err(|e| FunctionError::invalid_options(Self::NAME, e.to_string()))
            .and_then(|options| self.check(value, &options));
        FunctionOutput::Ready(result)
    }
}
