//! Rules, rule functions and the function registry.

use futures::future::BoxFuture;
use regex::Regex;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use crate::compile::{CompiledExpression, PathCompiler, ROOT};
use crate::document::{DocumentInventory, Format};
use crate::error::FunctionError;
use crate::query::PathQueryEngine;
use crate::types::{JsonPath, Segment, Severity};

// ────────────────────────────────────────────
// Rule functions
// ────────────────────────────────────────────

/// One finding reported by a rule function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionResult {
    /// Message, possibly containing `{{...}}` placeholders.
    pub message: String,
    /// Absolute location of the finding; `None` means the lint target itself.
    pub path: Option<JsonPath>,
}

impl FunctionResult {
    /// Creates a result located at the lint target.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            path: None,
        }
    }

    /// Creates a result at an explicit location.
    #[must_use]
    pub fn at(message: impl Into<String>, path: JsonPath) -> Self {
        Self {
            message: message.into(),
            path: Some(path),
        }
    }
}

/// Results of one function invocation.
pub type FunctionResults = Result<Vec<FunctionResult>, FunctionError>;

/// A deferred function outcome.
pub type FunctionFuture = BoxFuture<'static, FunctionResults>;

/// What a rule function returns: a result now, or one later.
pub enum FunctionOutput {
    /// The function finished synchronously.
    Ready(FunctionResults),
    /// The function needs to be awaited.
    Pending(FunctionFuture),
}

impl FunctionOutput {
    /// Converts either variant into a future.
    #[must_use]
    pub fn into_future(self) -> FunctionFuture {
        match self {
            Self::Ready(results) => Box::pin(futures::future::ready(results)),
            Self::Pending(future) => future,
        }
    }
}

impl From<FunctionResults> for FunctionOutput {
    fn from(results: FunctionResults) -> Self {
        Self::Ready(results)
    }
}

impl fmt::Debug for FunctionOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready(results) => f.debug_tuple("Ready").field(results).finish(),
            Self::Pending(_) => f.write_str("Pending(..)"),
        }
    }
}

/// Everything a rule function may inspect besides its target value.
pub struct FunctionContext<'a> {
    /// The rule being applied.
    pub rule: &'a Rule,
    /// Location of the lint target.
    pub path: &'a [Segment],
    /// Location of the node matched by `given`.
    pub given_path: &'a [Segment],
    /// The document under lint.
    pub document: &'a DocumentInventory,
    /// Query engine for secondary lookups.
    pub query: &'a dyn PathQueryEngine,
}

/// A function a rule applies to each lint target.
///
/// # Example
///
/// ```
/// use apilint_core::{FunctionContext, FunctionOutput, FunctionResult, RuleFunction};
/// use serde_json::Value;
///
/// struct Defined;
///
/// impl RuleFunction for Defined {
///     fn name(&self) -> &'static str { "defined" }
///
///     fn execute(&self, target: Option<&Value>, _: &Value, _: &FunctionContext<'_>) -> FunctionOutput {
///         let results = match target {
///             Some(_) => vec![],
///             None => vec![FunctionResult::new("{{property|gravis|append-property}}must be defined")],
///         };
///         FunctionOutput::Ready(Ok(results))
///     }
/// }
/// ```
pub trait RuleFunction: Send + Sync {
    /// Name rulesets use to refer to this function.
    fn name(&self) -> &'static str;

    /// Returns a brief description of what this function checks.
    fn description(&self) -> &'static str {
        ""
    }

    /// Checks one target. `target` is `None` when the rule's `field` does
    /// not exist on the matched node.
    fn execute(
        &self,
        target: Option<&Value>,
        options: &Value,
        ctx: &FunctionContext<'_>,
    ) -> FunctionOutput;
}

/// Shared handle to a rule function.
pub type FunctionRef = Arc<dyn RuleFunction>;

/// Registry resolving function names used in rulesets.
#[derive(Default, Clone)]
pub struct FunctionRegistry {
    functions: HashMap<String, FunctionRef>,
}

impl FunctionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a function under its own name, replacing any previous one.
    pub fn register<F: RuleFunction + 'static>(&mut self, function: F) -> &mut Self {
        self.register_arc(Arc::new(function))
    }

    /// Registers a shared function.
    pub fn register_arc(&mut self, function: FunctionRef) -> &mut Self {
        self.functions.insert(function.name().to_string(), function);
        self
    }

    /// Looks a function up by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<FunctionRef> {
        self.functions.get(name).cloned()
    }

    /// Returns the registered names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.functions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Returns the number of registered functions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.functions.len()
    }

    /// Returns true if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

impl fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionRegistry")
            .field("functions", &self.names())
            .finish()
    }
}

// ────────────────────────────────────────────
// Rules
// ────────────────────────────────────────────

/// Configured severity of a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RuleSeverity {
    /// The rule is disabled.
    Off,
    /// Informational.
    Info,
    /// Warning.
    #[default]
    Warn,
    /// Error.
    Error,
}

impl RuleSeverity {
    /// Returns the diagnostic severity, or `None` when disabled.
    #[must_use]
    pub fn severity(self) -> Option<Severity> {
        match self {
            Self::Off => None,
            Self::Info => Some(Severity::Info),
            Self::Warn => Some(Severity::Warning),
            Self::Error => Some(Severity::Error),
        }
    }
}

impl From<Severity> for RuleSeverity {
    fn from(severity: Severity) -> Self {
        match severity {
            Severity::Info => Self::Info,
            Severity::Warning => Self::Warn,
            Severity::Error => Self::Error,
        }
    }
}

/// A rule's path expressions together with their compiled forms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Given {
    expressions: Vec<String>,
    compiled: CompiledExpression,
}

impl Given {
    /// Compiles expressions with the process-wide compiler.
    #[must_use]
    pub fn new<I, S>(expressions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_compiler(expressions, PathCompiler::global())
    }

    /// Compiles expressions with the given compiler.
    #[must_use]
    pub fn with_compiler<I, S>(expressions: I, compiler: &PathCompiler) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let expressions: Vec<String> = expressions.into_iter().map(Into::into).collect();
        let compiled = compiler.compile_many(&expressions);
        Self {
            expressions,
            compiled,
        }
    }

    /// Raw expressions, in declaration order.
    #[must_use]
    pub fn expressions(&self) -> &[String] {
        &self.expressions
    }

    /// Compiled form of the expressions taken together.
    #[must_use]
    pub fn compiled(&self) -> &CompiledExpression {
        &self.compiled
    }

    /// True when every expression compiled, so the rule can join the
    /// single-pass traversal.
    #[must_use]
    pub fn is_optimized(&self) -> bool {
        self.compiled.is_supported()
    }

    /// True when one of the expressions is the root selector.
    #[must_use]
    pub fn includes_root(&self) -> bool {
        self.expressions.iter().any(|e| e == ROOT)
    }

    /// All patterns across the compiled expressions.
    pub fn patterns(&self) -> impl Iterator<Item = &Regex> {
        self.compiled.patterns().iter()
    }
}

/// One `then` entry of a rule.
#[derive(Clone)]
pub struct RuleAction {
    /// Optional target relative to the matched node.
    pub field: Option<String>,
    /// Function to apply.
    pub function: FunctionRef,
    /// Options passed to the function.
    pub options: Value,
}

impl RuleAction {
    /// Creates an action applying `function` to the matched node.
    #[must_use]
    pub fn new(function: FunctionRef) -> Self {
        Self {
            field: None,
            function,
            options: Value::Null,
        }
    }

    /// Sets the lint target.
    #[must_use]
    pub fn field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    /// Sets the function options.
    #[must_use]
    pub fn options(mut self, options: Value) -> Self {
        self.options = options;
        self
    }
}

impl fmt::Debug for RuleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleAction")
            .field("field", &self.field)
            .field("function", &self.function.name())
            .field("options", &self.options)
            .finish()
    }
}

/// A configured lint rule.
#[derive(Debug, Clone)]
pub struct Rule {
    /// Rule name, used as the diagnostic code.
    pub name: String,
    /// Human description, available to messages as `{{description}}`.
    pub description: Option<String>,
    /// Message template overriding function messages.
    pub message: Option<String>,
    /// Path expressions selecting the nodes to lint.
    pub given: Given,
    /// Configured severity.
    pub severity: RuleSeverity,
    /// Formats the rule applies to; `None` means all.
    pub formats: Option<BTreeSet<Format>>,
    /// Lint the resolved tree (default) or the tree as authored.
    pub resolved: bool,
    /// Functions to apply.
    pub then: Vec<RuleAction>,
}

impl Rule {
    /// Creates an enabled rule with warning severity and no actions.
    #[must_use]
    pub fn new(name: impl Into<String>, given: Given) -> Self {
        Self {
            name: name.into(),
            description: None,
            message: None,
            given,
            severity: RuleSeverity::default(),
            formats: None,
            resolved: true,
            then: Vec::new(),
        }
    }

    /// Sets the severity.
    #[must_use]
    pub fn severity(mut self, severity: RuleSeverity) -> Self {
        self.severity = severity;
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the message template.
    #[must_use]
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Restricts the rule to some formats.
    #[must_use]
    pub fn formats<I, F>(mut self, formats: I) -> Self
    where
        I: IntoIterator<Item = F>,
        F: Into<Format>,
    {
        self.formats = Some(formats.into_iter().map(Into::into).collect());
        self
    }

    /// Selects which tree the rule runs against.
    #[must_use]
    pub fn resolved(mut self, resolved: bool) -> Self {
        self.resolved = resolved;
        self
    }

    /// Appends an action.
    #[must_use]
    pub fn then(mut self, action: RuleAction) -> Self {
        self.then.push(action);
        self
    }

    /// True unless the rule is switched off.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.severity.severity().is_some()
    }

    /// True when the rule has no format restriction or shares a format with
    /// the document. Documents without detected formats only run
    /// unrestricted rules.
    #[must_use]
    pub fn applies_to(&self, formats: Option<&BTreeSet<Format>>) -> bool {
        match (&self.formats, formats) {
            (None, _) => true,
            (Some(_), None) => false,
            (Some(wanted), Some(detected)) => !wanted.is_disjoint(detected),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Noop;

    impl RuleFunction for Noop {
        fn name(&self) -> &'static str {
            "noop"
        }

        fn execute(
            &self,
            _target: Option<&Value>,
            _options: &Value,
            _ctx: &FunctionContext<'_>,
        ) -> FunctionOutput {
            FunctionOutput::Ready(Ok(vec![]))
        }
    }

    #[test]
    fn given_classification() {
        let compiler = PathCompiler::new();
        let optimized = Given::with_compiler(["$", "$.info"], &compiler);
        assert!(optimized.is_optimized());
        assert!(optimized.includes_root());
        assert_eq!(optimized.patterns().count(), 1);
        assert!(matches!(optimized.compiled(), CompiledExpression::PatternList(_)));
        assert!(matches!(
            Given::with_compiler(["$.info"], &compiler).compiled(),
            CompiledExpression::Pattern(_)
        ));
        let root_only = Given::with_compiler(["$"], &compiler);
        assert!(root_only.is_optimized());
        assert_eq!(root_only.patterns().count(), 0);

        let demoted = Given::with_compiler(["$.info", "$.tags[?(@.name)]"], &compiler);
        assert!(!demoted.is_optimized());
        assert!(!Given::with_compiler(Vec::<String>::new(), &compiler).is_optimized());
    }

    #[test]
    fn severity_enablement() {
        let rule = Rule::new("r", Given::new(["$"]));
        assert!(rule.is_enabled());
        assert!(!rule.severity(RuleSeverity::Off).is_enabled());
        assert_eq!(RuleSeverity::Warn.severity(), Some(Severity::Warning));
    }

    #[test]
    fn format_intersection() {
        let rule = Rule::new("r", Given::new(["$"])).formats(["oas2", "oas3"]);
        let oas3: BTreeSet<Format> = [Format::new("oas3")].into();
        let asyncapi: BTreeSet<Format> = [Format::new("asyncapi2")].into();
        assert!(rule.applies_to(Some(&oas3)));
        assert!(!rule.applies_to(Some(&asyncapi)));
        assert!(!rule.applies_to(None));
        assert!(Rule::new("any", Given::new(["$"])).applies_to(None));
    }

    #[test]
    fn registry_resolves_by_name() {
        let mut registry = FunctionRegistry::new();
        registry.register(Noop);
        assert_eq!(registry.len(), 1);
        assert!(registry.get("noop").is_some());
        assert!(registry.get("missing").is_none());
        assert_eq!(registry.names(), vec!["noop"]);
    }

    #[test]
    fn ready_output_becomes_future() {
        let output = FunctionOutput::from(Ok(vec![FunctionResult::new("m")]));
        let results = futures::executor::block_on(output.into_future());
        assert_eq!(results.map(|r| r.len()).ok(), Some(1));
    }
}
