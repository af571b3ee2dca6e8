//! Fallback path-query evaluation.

use parking_lot::RwLock;
use serde_json::Value;
use serde_json_path::{JsonPath as Query, PathElement};
use std::collections::HashMap;

use crate::document::DocumentNode;
use crate::error::QueryError;
use crate::types::Segment;

/// Evaluates path expressions the compiler could not turn into patterns.
pub trait PathQueryEngine: Send + Sync {
    /// Returns every node selected by `expression` in `tree`, with its
    /// unescaped location.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::Parse`] if the engine cannot parse the
    /// expression.
    fn evaluate<'v>(
        &self,
        expression: &str,
        tree: &'v Value,
    ) -> Result<Vec<DocumentNode<'v>>, QueryError>;
}

/// [`PathQueryEngine`] backed by `serde_json_path` (RFC 9535).
///
/// Parsed queries are cached by expression.
#[derive(Debug, Default)]
pub struct JsonPathEngine {
    cache: RwLock<HashMap<String, Query>>,
}

impl JsonPathEngine {
    /// Creates an engine with an empty query cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn parse(&self, expression: &str) -> Result<Query, QueryError> {
        if let Some(query) = self.cache.read().get(expression) {
            return Ok(query.clone());
        }
        let query = Query::parse(expression).map_err(|e| QueryError::Parse {
            expression: expression.to_string(),
            message: e.to_string(),
        })?;
        self.cache
            .write()
            .insert(expression.to_string(), query.clone());
        Ok(query)
    }
}

impl PathQueryEngine for JsonPathEngine {
    fn evaluate<'v>(
        &self,
        expression: &str,
        tree: &'v Value,
    ) -> Result<Vec<DocumentNode<'v>>, QueryError> {
        let query = self.parse(expression)?;
        let nodes = query
            .query_located(tree)
            .into_iter()
            .map(|located| {
                let path = located
                    .location()
                    .iter()
                    .map(|element| match element {
                        PathElement::Name(name) => Segment::Key((*name).to_string()),
                        PathElement::Index(index) => Segment::Index(*index),
                    })
                    .collect();
                DocumentNode::new(path, located.node())
            })
            .collect();
        Ok(nodes)
    }
}
