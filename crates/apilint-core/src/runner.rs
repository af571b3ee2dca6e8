//! Lint orchestration: rule selection, matching, suppression and joining.

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::compile::ROOT;
use crate::document::{DocumentInventory, DocumentNode, DocumentSource};
use crate::error::LintError;
use crate::exceptions::{pivot_exceptions, ExceptionIndex, Exceptions};
use crate::lint::{lint_node, LintContext, LintStep};
use crate::query::{JsonPathEngine, PathQueryEngine};
use crate::rule::Rule;
use crate::ruleset::Ruleset;
use crate::traverse::traverse;
use crate::types::{Diagnostic, LintResult, Segment, Severity};

/// Code of the diagnostic emitted when exceptions cannot be honored.
pub const EXCEPT_BUT_STDIN: &str = "except-but-stdin";

const EXCEPT_BUT_STDIN_MESSAGE: &str = "The ruleset contains `except` entries. \
     However, they cannot be enforced when the input is passed through stdin.";

/// Builder for configuring a [`Linter`].
#[derive(Default)]
pub struct LinterBuilder {
    rules: Vec<Rule>,
    exceptions: Exceptions,
    query: Option<Arc<dyn PathQueryEngine>>,
}

impl LinterBuilder {
    /// Creates a new builder with no rules.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a rule.
    #[must_use]
    pub fn rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Adds multiple rules.
    #[must_use]
    pub fn rules<I>(mut self, rules: I) -> Self
    where
        I: IntoIterator<Item = Rule>,
    {
        self.rules.extend(rules);
        self
    }

    /// Adds every rule and exception of a ruleset.
    #[must_use]
    pub fn ruleset(mut self, ruleset: Ruleset) -> Self {
        let (rules, exceptions) = ruleset.into_parts();
        self.rules.extend(rules);
        self.exceptions.extend(exceptions);
        self
    }

    /// Adds one exception entry (`"<source>#<pointer>"` to rule names).
    #[must_use]
    pub fn exception<I, S>(mut self, location: impl Into<String>, rules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exceptions
            .entry(location.into())
            .or_default()
            .extend(rules.into_iter().map(Into::into));
        self
    }

    /// Replaces the fallback query engine (default: [`JsonPathEngine`]).
    #[must_use]
    pub fn query_engine(mut self, engine: Arc<dyn PathQueryEngine>) -> Self {
        self.query = Some(engine);
        self
    }

    /// Builds the linter. Rules are ordered by name.
    #[must_use]
    pub fn build(mut self) -> Linter {
        self.rules.sort_by(|a, b| a.name.cmp(&b.name));
        Linter {
            rules: self.rules,
            exceptions: self.exceptions,
            query: self
                .query
                .unwrap_or_else(|| Arc::new(JsonPathEngine::new())),
        }
    }
}

/// Runs a set of rules against documents.
///
/// Use [`Linter::builder()`] to construct an instance.
pub struct Linter {
    rules: Vec<Rule>,
    exceptions: Exceptions,
    query: Arc<dyn PathQueryEngine>,
}

impl Linter {
    /// Creates a new builder for configuring a linter.
    #[must_use]
    pub fn builder() -> LinterBuilder {
        LinterBuilder::new()
    }

    /// Returns the configured rules, ordered by name.
    #[must_use]
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Lints a document.
    ///
    /// Never fails: a rule whose function or query errors contributes no
    /// diagnostics and is logged. Diagnostic order is not part of the
    /// contract; sort the result before comparing.
    pub async fn run(&self, document: &DocumentInventory) -> LintResult {
        let mut result = LintResult::new();

        let exceptions = self.exception_index(document, &mut result);

        let relevant: Vec<&Rule> = self
            .rules
            .iter()
            .filter(|rule| {
                let keep = rule.is_enabled() && rule.applies_to(document.formats.as_ref());
                if !keep {
                    debug!("Skipping rule: {}", rule.name);
                }
                keep
            })
            .collect();
        let (optimized, fallback): (Vec<&Rule>, Vec<&Rule>) = relevant
            .into_iter()
            .partition(|rule| rule.given.is_optimized());

        info!(
            "Linting with {} optimized and {} fallback rules",
            optimized.len(),
            fallback.len()
        );

        let ctx = LintContext {
            document,
            query: self.query.as_ref(),
        };
        let mut steps: Vec<LintStep<'_>> = Vec::new();

        // Optimized rules share one walk per tree.
        let (on_resolved, on_unresolved): (Vec<&Rule>, Vec<&Rule>) =
            optimized.into_iter().partition(|rule| rule.resolved);
        for (tree, rules) in [
            (document.target(true), on_resolved),
            (document.target(false), on_unresolved),
        ] {
            if rules.is_empty() {
                continue;
            }
            traverse(tree, &rules, |rule, node| {
                steps.extend(lint_node(ctx, &node, rule, exceptions.get(&rule.name)));
            });
        }

        for rule in fallback {
            debug!("Evaluating rule `{}` with the fallback engine", rule.name);
            let tree = document.target(rule.resolved);
            for expression in rule.given.expressions() {
                if expression == ROOT {
                    let node = DocumentNode::new(vec![Segment::from(ROOT)], tree);
                    steps.extend(lint_node(ctx, &node, rule, exceptions.get(&rule.name)));
                    continue;
                }
                match self.query.evaluate(expression, tree) {
                    Ok(nodes) => {
                        for node in &nodes {
                            steps.extend(lint_node(ctx, node, rule, exceptions.get(&rule.name)));
                        }
                    }
                    Err(source) => warn!(
                        "{}",
                        LintError::Query {
                            rule: rule.name.clone(),
                            source,
                        }
                    ),
                }
            }
        }

        let outcomes = futures::future::join_all(steps).await;
        for outcome in outcomes {
            match outcome {
                Ok(diagnostics) => result.diagnostics.extend(diagnostics),
                Err(e) => warn!("{e}"),
            }
        }

        info!("Lint complete: {} diagnostics", result.len());
        result
    }

    /// Lints a document, blocking the current thread until done.
    #[must_use]
    pub fn run_blocking(&self, document: &DocumentInventory) -> LintResult {
        futures::executor::block_on(self.run(document))
    }

    fn exception_index(&self, document: &DocumentInventory, result: &mut LintResult) -> ExceptionIndex {
        if self.exceptions.is_empty() {
            return ExceptionIndex::default();
        }
        if document.source == DocumentSource::Stdin {
            result.diagnostics.push(Diagnostic::new(
                EXCEPT_BUT_STDIN,
                EXCEPT_BUT_STDIN_MESSAGE,
                Vec::new(),
                Severity::Warning,
            ));
            return ExceptionIndex::default();
        }
        pivot_exceptions(&self.exceptions, &self.rules)
    }
}
