//! Applying one rule to one matched node.

use futures::future::BoxFuture;
use serde_json::Value;
use std::borrow::Cow;

use crate::compile::ROOT;
use crate::document::{DocumentInventory, DocumentNode};
use crate::error::{LintError, QueryError};
use crate::exceptions::ExceptionLocation;
use crate::message::{render, MessageVars};
use crate::query::PathQueryEngine;
use crate::rule::{FunctionContext, FunctionResult, Rule, RuleAction};
use crate::types::{Diagnostic, JsonPath, Segment, Severity};

/// The `field` value selecting every member name of the matched object.
pub const KEY_FIELD: &str = "@key";

/// A value a rule function is applied to, relative to the matched node.
#[derive(Debug, Clone, PartialEq)]
pub struct LintTarget<'v> {
    /// Location relative to the matched node.
    pub path: JsonPath,
    /// The value; `None` when the field does not exist.
    pub value: Option<Cow<'v, Value>>,
}

/// Resolves a rule's `field` against a matched value.
///
/// - no field, or a non-object value: the value itself
/// - `@key`: every member name, each located at its member
/// - `$...`: every node the query selects inside the value
/// - anything else: a dotted property path (`a.b[0].c`)
///
/// Never returns an empty list; a field that selects nothing yields one
/// absent target at the matched node.
///
/// # Errors
///
/// Returns a [`QueryError`] if a `$...` field cannot be evaluated.
pub fn lint_targets<'v>(
    value: &'v Value,
    field: Option<&str>,
    query: &dyn PathQueryEngine,
) -> Result<Vec<LintTarget<'v>>, QueryError> {
    let mut targets = Vec::new();

    match (value, field) {
        (Value::Object(map), Some(KEY_FIELD)) => {
            targets.extend(map.keys().map(|key| LintTarget {
                path: vec![Segment::Key(key.clone())],
                value: Some(Cow::Owned(Value::String(key.clone()))),
            }));
        }
        (Value::Object(_), Some(field)) if field.starts_with(ROOT) => {
            targets.extend(query.evaluate(field, value)?.into_iter().map(|node| LintTarget {
                path: node.path,
                value: Some(Cow::Borrowed(node.value)),
            }));
        }
        (Value::Object(_), Some(field)) => {
            let path = parse_property_path(field);
            let found = value_at(value, &path);
            targets.push(LintTarget {
                path,
                value: found.map(Cow::Borrowed),
            });
        }
        _ => targets.push(LintTarget {
            path: Vec::new(),
            value: Some(Cow::Borrowed(value)),
        }),
    }

    if targets.is_empty() {
        targets.push(LintTarget {
            path: Vec::new(),
            value: None,
        });
    }
    Ok(targets)
}

/// Splits `a.b[0].c` into segments.
fn parse_property_path(field: &str) -> JsonPath {
    let mut path = Vec::new();
    for part in field.split('.').filter(|p| !p.is_empty()) {
        let (name, mut rest) = part.split_once('[').unwrap_or((part, ""));
        if !name.is_empty() {
            path.push(Segment::Key(name.to_string()));
        }
        while let Some((index, tail)) = rest.split_once(']') {
            path.push(match index.parse::<usize>() {
                Ok(i) => Segment::Index(i),
                Err(_) => Segment::Key(index.trim_matches(['\'', '"']).to_string()),
            });
            rest = tail.strip_prefix('[').unwrap_or(tail);
        }
    }
    path
}

/// Looks a value up by path. A leading `$` segment denotes the root.
#[must_use]
pub fn value_at<'v>(root: &'v Value, path: &[Segment]) -> Option<&'v Value> {
    let path = match path.split_first() {
        Some((first, rest)) if first.as_key() == Some(ROOT) => rest,
        _ => path,
    };
    path.iter().try_fold(root, |value, segment| match (value, segment) {
        (Value::Array(items), Segment::Index(i)) => items.get(*i),
        (Value::Array(items), Segment::Key(k)) => k.parse::<usize>().ok().and_then(|i| items.get(i)),
        (Value::Object(map), segment) => map.get(&segment.to_string()),
        _ => None,
    })
}

/// State shared by every lint step of a run.
#[derive(Clone, Copy)]
pub struct LintContext<'a> {
    /// The document under lint.
    pub document: &'a DocumentInventory,
    /// Query engine for `$...` fields and secondary lookups.
    pub query: &'a dyn PathQueryEngine,
}

/// One deferred function invocation.
pub type LintStep<'a> = BoxFuture<'a, Result<Vec<Diagnostic>, LintError>>;

/// Applies `rule` to a matched node.
///
/// Every function invocation becomes one [`LintStep`]; functions run
/// immediately and only their outcome is deferred. Diagnostics lying under
/// one of the `suppressed` locations are dropped.
#[must_use]
pub fn lint_node<'a>(
    ctx: LintContext<'a>,
    node: &DocumentNode<'a>,
    rule: &'a Rule,
    suppressed: &'a [ExceptionLocation],
) -> Vec<LintStep<'a>> {
    let mut steps: Vec<LintStep<'a>> = Vec::new();

    for action in &rule.then {
        let targets = match lint_targets(node.value, action.field.as_deref(), ctx.query) {
            Ok(targets) => targets,
            Err(source) => {
                let error = LintError::Query {
                    rule: rule.name.clone(),
                    source,
                };
                steps.push(Box::pin(futures::future::ready(Err(error))));
                continue;
            }
        };

        for target in targets {
            let mut path = node.path.clone();
            path.extend(target.path);
            steps.push(invoke(ctx, rule, action, &node.path, path, target.value.as_deref(), suppressed));
        }
    }

    steps
}

fn invoke<'a>(
    ctx: LintContext<'a>,
    rule: &'a Rule,
    action: &'a RuleAction,
    given_path: &[Segment],
    target_path: JsonPath,
    target: Option<&Value>,
    suppressed: &'a [ExceptionLocation],
) -> LintStep<'a> {
    let output = action.function.execute(
        target,
        &action.options,
        &FunctionContext {
            rule,
            path: &target_path,
            given_path,
            document: ctx.document,
            query: ctx.query,
        },
    );
    let target_value = target.cloned();
    let given_len = given_path.len();

    Box::pin(async move {
        let results = output
            .into_future()
            .await
            .map_err(|source| LintError::Function {
                rule: rule.name.clone(),
                source,
            })?;

        Ok(results
            .into_iter()
            .map(|result| {
                diagnostic(ctx, rule, given_len, &target_path, target_value.as_ref(), result)
            })
            .filter(|d| !suppressed.iter().any(|location| location.covers(d)))
            .collect())
    })
}

fn diagnostic(
    ctx: LintContext<'_>,
    rule: &Rule,
    given_len: usize,
    target_path: &[Segment],
    target_value: Option<&Value>,
    result: FunctionResult,
) -> Diagnostic {
    let path = result.path.unwrap_or_else(|| target_path.to_vec());

    // Only locations inside the matched node name a property.
    let property = if path.len() > given_len {
        path.last().and_then(Segment::as_key).unwrap_or_default().to_string()
    } else {
        String::new()
    };
    let value = if path == target_path {
        target_value
    } else {
        value_at(ctx.document.target(rule.resolved), &path).or(target_value)
    };
    let mut vars = MessageVars {
        property,
        error: "",
        description: rule.description.as_deref().unwrap_or_default(),
        path: &path,
        value,
    };

    let error = render(&result.message, &vars);
    let message = match &rule.message {
        Some(template) => {
            vars.error = &error;
            render(template, &vars)
        }
        None => error.clone(),
    };

    let severity = rule.severity.severity().unwrap_or(Severity::Warning);
    Diagnostic::new(&rule.name, message, path, severity)
        .with_source(ctx.document.source.name().map(str::to_string))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path;
    use crate::query::JsonPathEngine;
    use crate::rule::{FunctionOutput, Given, RuleFunction};
    use futures::executor::block_on;
    use serde_json::json;
    use std::sync::Arc;

    /// Reports every string target that contains `?`.
    struct NoQuery;

    impl RuleFunction for NoQuery {
        fn name(&self) -> &'static str {
            "no-query"
        }

        fn execute(
            &self,
            target: Option<&Value>,
            _options: &Value,
            _ctx: &FunctionContext<'_>,
        ) -> FunctionOutput {
            let results = match target.and_then(Value::as_str) {
                Some(s) if s.contains('?') => vec![FunctionResult::new("{{value}} has a query")],
                _ => vec![],
            };
            FunctionOutput::Ready(Ok(results))
        }
    }

    /// Always fails.
    struct Broken;

    impl RuleFunction for Broken {
        fn name(&self) -> &'static str {
            "broken"
        }

        fn execute(
            &self,
            _target: Option<&Value>,
            _options: &Value,
            _ctx: &FunctionContext<'_>,
        ) -> FunctionOutput {
            FunctionOutput::Pending(Box::pin(async {
                Err::<Vec<FunctionResult>, _>(crate::FunctionError::Validator("boom".into()))
            }))
        }
    }

    fn run(
        document: &DocumentInventory,
        node: &DocumentNode<'_>,
        rule: &Rule,
        suppressed: &[ExceptionLocation],
    ) -> Vec<Result<Vec<Diagnostic>, LintError>> {
        let engine = JsonPathEngine::new();
        let ctx = LintContext {
            document,
            query: &engine,
        };
        let steps = lint_node(ctx, node, rule, suppressed);
        block_on(futures::future::join_all(steps))
    }

    #[test]
    fn key_targets_each_member_name() {
        let value = json!({"a": {}, "b?": {}});
        let targets = lint_targets(&value, Some(KEY_FIELD), &JsonPathEngine::new()).unwrap();
        assert_eq!(targets.len(), 2);
        assert_eq!(targets[1].path, path!["b?"]);
        assert_eq!(targets[1].value.as_deref(), Some(&json!("b?")));
    }

    #[test]
    fn query_and_property_targets() {
        let value = json!({"examples": [1, 2], "a": {"b": [{"c": true}]}});
        let engine = JsonPathEngine::new();

        let examples = lint_targets(&value, Some("$.examples.*"), &engine).unwrap();
        assert_eq!(examples[1].path, path!["examples", 1]);

        let nested = lint_targets(&value, Some("a.b[0].c"), &engine).unwrap();
        assert_eq!(nested[0].path, path!["a", "b", 0, "c"]);
        assert_eq!(nested[0].value.as_deref(), Some(&json!(true)));

        let missing = lint_targets(&value, Some("nope"), &engine).unwrap();
        assert_eq!(missing[0].value, None);

        let nothing = lint_targets(&value, Some("$.none.*"), &engine).unwrap();
        assert_eq!(nothing, vec![LintTarget { path: vec![], value: None }]);
    }

    #[test]
    fn primitive_values_ignore_field() {
        let value = json!(3);
        let targets = lint_targets(&value, Some("x"), &JsonPathEngine::new()).unwrap();
        assert_eq!(targets[0].value.as_deref(), Some(&json!(3)));
    }

    #[test]
    fn value_lookup_skips_root_marker() {
        let tree = json!({"servers": [{"url": "u"}]});
        assert_eq!(value_at(&tree, &path!["$", "servers", 0, "url"]), Some(&json!("u")));
        assert_eq!(value_at(&tree, &path!["servers", "0"]), Some(&json!({"url": "u"})));
        assert_eq!(value_at(&tree, &path!["servers", 3]), None);
    }

    #[test]
    fn builds_diagnostics_with_templates_and_source() {
        let tree = json!({"channels": {"ok": {}, "bad?x": {}}});
        let document = DocumentInventory::new(tree.clone()).with_source("api.yaml");
        let rule = Rule::new("channel-query", Given::new(["$.channels"]))
            .message("Channel {{error}}")
            .then(RuleAction::new(Arc::new(NoQuery)).field(KEY_FIELD));
        let node = DocumentNode::new(path!["channels"], &tree["channels"]);

        let outcomes = run(&document, &node, &rule, &[]);
        let diagnostics: Vec<Diagnostic> = outcomes.into_iter().flat_map(Result::unwrap).collect();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].path, path!["channels", "bad?x"]);
        assert_eq!(diagnostics[0].message, "Channel bad?x has a query");
        assert_eq!(diagnostics[0].source.as_deref(), Some("api.yaml"));
        assert_eq!(diagnostics[0].severity, Severity::Warning);
    }

    #[test]
    fn suppressed_locations_drop_diagnostics() {
        let tree = json!({"channels": {"a?": {}, "b?": {}}});
        let document = DocumentInventory::new(tree.clone()).with_source("api.yaml");
        let rule = Rule::new("channel-query", Given::new(["$.channels"]))
            .then(RuleAction::new(Arc::new(NoQuery)).field(KEY_FIELD));
        let node = DocumentNode::new(path!["channels"], &tree["channels"]);
        let suppressed = [ExceptionLocation::parse("api.yaml#/channels/a?")];

        let diagnostics: Vec<Diagnostic> = run(&document, &node, &rule, &suppressed)
            .into_iter()
            .flat_map(Result::unwrap)
            .collect();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].path, path!["channels", "b?"]);
    }

    #[test]
    fn function_failure_is_reported_per_step() {
        let tree = json!({"info": {}});
        let document = DocumentInventory::new(tree.clone());
        let rule = Rule::new("broken", Given::new(["$.info"]))
            .then(RuleAction::new(Arc::new(Broken)))
            .then(RuleAction::new(Arc::new(NoQuery)));
        let node = DocumentNode::new(path!["info"], &tree["info"]);

        let outcomes = run(&document, &node, &rule, &[]);
        assert_eq!(outcomes.len(), 2);
        assert!(matches!(outcomes[0], Err(LintError::Function { .. })));
        assert!(matches!(&outcomes[1], Ok(d) if d.is_empty()));
    }
}
