//! Presence checks.

use apilint_core::{FunctionContext, FunctionOutput, FunctionResult, RuleFunction};
use serde_json::Value;

/// Reports targets that are absent, `null`, `false`, `0` or `""`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Truthy;

impl Truthy {
    /// Function name used in rulesets.
    pub const NAME: &'static str = "truthy";
}

fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|n| n != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_) | Value::Object(_)) => true,
    }
}

impl RuleFunction for Truthy {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn description(&self) -> &'static str {
        "Requires the target to be present and truthy"
    }

    fn execute(
        &self,
        target: Option<&Value>,
        _options: &Value,
        _ctx: &FunctionContext<'_>,
    ) -> FunctionOutput {
        let results = if is_truthy(target) {
            Vec::new()
        } else {
            vec![FunctionResult::new("{{property|gravis|append-property}}is not truthy")]
        };
        FunctionOutput::Ready(Ok(results))
    }
}
