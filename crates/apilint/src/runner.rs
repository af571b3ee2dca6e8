//! One-call linting with the bundled rules.

use apilint_core::{DocumentInventory, Linter, LintResult, LoadRulesetError};
use apilint_functions::{builtin_functions, ValidatorCache};
use std::sync::Arc;
use tracing::debug;

use crate::rulesets;

/// Builds a linter carrying every bundled ruleset, validating through
/// `cache`.
///
/// # Errors
///
/// Returns an error if a bundled ruleset fails to load.
pub fn recommended_linter(cache: Arc<ValidatorCache>) -> Result<Linter, LoadRulesetError> {
    let registry = builtin_functions(cache);
    let linter = Linter::builder().ruleset(rulesets::asyncapi(&registry)?).build();
    debug!("Loaded {} bundled rules", linter.rules().len());
    Ok(linter)
}

/// Lints a document with the bundled rules.
///
/// Formats are detected from the document when the inventory carries none.
///
/// # Errors
///
/// Returns an error if a bundled ruleset fails to load.
pub async fn lint_document(document: DocumentInventory) -> Result<LintResult, LoadRulesetError> {
    let document = if document.formats.is_none() {
        document.with_detected_formats()
    } else {
        document
    };
    let linter = recommended_linter(Arc::new(ValidatorCache::new()))?;
    Ok(linter.run(&document).await)
}
