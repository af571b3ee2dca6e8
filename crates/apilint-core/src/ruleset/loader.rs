//! DTO → Domain model conversion with validation.

use crate::compile::PathCompiler;
use crate::rule::{FunctionRegistry, Given, Rule, RuleAction, RuleSeverity};

use super::config_dto::{ActionDto, RuleDto, RulesetDto};
use super::Ruleset;

/// Errors during DTO → Domain conversion.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// Unknown severity string.
    #[error("{context}: unknown severity `{value}`, expected: off, hint, info, warn, error")]
    UnknownSeverity {
        /// Where the error occurred.
        context: String,
        /// The invalid value.
        value: String,
    },

    /// A `then` entry names a function that is not registered.
    #[error("{context}: unknown function `{function}`")]
    UnknownFunction {
        /// Where the error occurred (e.g., "rules.x.then[0]").
        context: String,
        /// The unknown function name.
        function: String,
    },

    /// A rule has no `given` expression.
    #[error("rules.{rule}: `given` must not be empty")]
    EmptyGiven {
        /// The offending rule.
        rule: String,
    },
}

/// Converts a `RulesetDto` into a validated [`Ruleset`].
///
/// # Errors
///
/// Returns the first error encountered during conversion.
pub fn load(
    dto: RulesetDto,
    registry: &FunctionRegistry,
    compiler: &PathCompiler,
) -> Result<Ruleset, LoadError> {
    let rules = dto
        .rules
        .into_iter()
        .map(|(name, rule)| convert_rule(name, rule, registry, compiler))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Ruleset::new(rules, dto.except))
}

fn convert_rule(
    name: String,
    dto: RuleDto,
    registry: &FunctionRegistry,
    compiler: &PathCompiler,
) -> Result<Rule, LoadError> {
    let given = dto.given.into_vec();
    if given.is_empty() {
        return Err(LoadError::EmptyGiven { rule: name });
    }

    let severity = parse_severity(&dto.severity, &format!("rules.{name}.severity"))?;

    let then = dto
        .then
        .into_iter()
        .enumerate()
        .map(|(i, action)| convert_action(action, registry, &format!("rules.{name}.then[{i}]")))
        .collect::<Result<Vec<_>, _>>()?;

    let mut rule = Rule::new(name, Given::with_compiler(given, compiler))
        .severity(severity)
        .resolved(dto.resolved);
    rule.description = dto.description;
    rule.message = dto.message;
    rule.then = then;
    if let Some(formats) = dto.formats {
        rule = rule.formats(formats);
    }

    Ok(rule)
}

fn convert_action(
    dto: ActionDto,
    registry: &FunctionRegistry,
    context: &str,
) -> Result<RuleAction, LoadError> {
    let function = registry
        .get(&dto.function)
        .ok_or_else(|| LoadError::UnknownFunction {
            context: context.to_string(),
            function: dto.function.clone(),
        })?;

    let mut action = RuleAction::new(function).options(dto.function_options);
    action.field = dto.field;
    Ok(action)
}

/// Parses a severity string.
///
/// `hint` is accepted as a synonym of `info`, `warning` of `warn`.
///
/// # Errors
///
/// Returns [`LoadError::UnknownSeverity`] for anything else.
pub fn parse_severity(value: &str, context: &str) -> Result<RuleSeverity, LoadError> {
    match value {
        "off" => Ok(RuleSeverity::Off),
        "hint" | "info" => Ok(RuleSeverity::Info),
        "warn" | "warning" => Ok(RuleSeverity::Warn),
        "error" => Ok(RuleSeverity::Error),
        _ => Err(LoadError::UnknownSeverity {
            context: context.to_string(),
            value: value.to_string(),
        }),
    }
}
