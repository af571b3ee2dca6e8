//! Error types shared by the engine and rule functions.

/// Errors from the fallback path-query evaluator.
#[derive(Debug, Clone, thiserror::Error)]
pub enum QueryError {
    /// The expression could not be parsed by the query engine.
    #[error("invalid path expression `{expression}`: {message}")]
    Parse {
        /// The offending expression.
        expression: String,
        /// Parser message.
        message: String,
    },
}

/// Errors raised by a rule function.
#[derive(Debug, thiserror::Error)]
pub enum FunctionError {
    /// The rule passed options the function cannot use.
    #[error("invalid options for `{function}`: {message}")]
    InvalidOptions {
        /// Function name.
        function: String,
        /// What is wrong with the options.
        message: String,
    },

    /// A validator could not be built or run (e.g. a malformed schema).
    #[error("validator failure: {0}")]
    Validator(String),

    /// A secondary query issued by the function failed.
    #[error(transparent)]
    Query(#[from] QueryError),
}

impl FunctionError {
    /// Creates an [`FunctionError::InvalidOptions`] error.
    #[must_use]
    pub fn invalid_options(function: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidOptions {
            function: function.into(),
            message: message.into(),
        }
    }
}

/// Failure of one lint step (one rule applied to one matched node).
///
/// The orchestrator logs these and carries on; they never abort a run.
#[derive(Debug, thiserror::Error)]
pub enum LintError {
    /// A rule function failed.
    #[error("rule `{rule}` failed: {source}")]
    Function {
        /// Rule name.
        rule: String,
        /// Underlying failure.
        source: FunctionError,
    },

    /// Evaluating a rule's `given` or `field` expression failed.
    #[error("rule `{rule}` failed to query the document: {source}")]
    Query {
        /// Rule name.
        rule: String,
        /// Underlying failure.
        source: QueryError,
    },
}
