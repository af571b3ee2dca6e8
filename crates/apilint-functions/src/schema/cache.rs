//! Compiled validator cache.
//!
//! Validators are compiled once per (dialect, error mode, schema) and shared
//! afterwards, together with the prepared schema they were compiled from.
//! Entries are never replaced or evicted.

use jsonschema::error::ValidationErrorKind;
use jsonschema::{ValidationError, ValidationOptions, Validator};
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use super::dialect::Dialect;

/// Whether validation reports every error or stops at the first.
///
/// The mode is part of every cache key, so engines and validators are never
/// shared between modes. The engines themselves are configured identically;
/// stopping at the first error happens when the validator is run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ErrorMode {
    /// Collect every error.
    #[default]
    All,
    /// Stop at the first error.
    First,
}

impl ErrorMode {
    /// Maps an `all-errors` option to a mode.
    #[must_use]
    pub fn from_all_errors(all: bool) -> Self {
        if all {
            Self::All
        } else {
            Self::First
        }
    }
}

/// How a compiled schema is identified in the cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SchemaKey {
    /// The schema's own `$id` (or draft-04 `id`).
    Id(String),
    /// The serialized schema.
    Content(String),
    /// A schema derived from another one, such as a payload wrapped into a
    /// combined schema. Keeps derived entries apart from the source's own.
    Derived(&'static str, Box<SchemaKey>),
}

impl SchemaKey {
    /// Derives the key for a schema.
    #[must_use]
    pub fn of(schema: &Value) -> Self {
        ["$id", "id"]
            .iter()
            .find_map(|key| schema.get(key).and_then(Value::as_str))
            .map_or_else(|| Self::Content(schema.to_string()), |id| Self::Id(id.to_string()))
    }

    /// Key for a schema built from `self` under `scope`.
    #[must_use]
    pub fn derived(self, scope: &'static str) -> Self {
        Self::Derived(scope, Box::new(self))
    }
}

/// A compiled validator and the prepared schema it was built from.
///
/// Error normalization walks the prepared schema, so both are kept together.
pub struct CompiledSchema {
    schema: Value,
    validator: Validator,
}

impl CompiledSchema {
    /// The schema after dialect preparation.
    #[must_use]
    pub fn schema(&self) -> &Value {
        &self.schema
    }

    /// The compiled validator.
    #[must_use]
    pub fn validator(&self) -> &Validator {
        &self.validator
    }
}

impl fmt::Debug for CompiledSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledSchema").field("schema", &self.schema).finish_non_exhaustive()
    }
}

/// Errors from compiling a schema.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    /// A `$ref` points at a schema that cannot be found.
    #[error("{0}")]
    MissingReference(String),

    /// The schema is malformed.
    #[error("invalid schema: {0}")]
    Invalid(String),
}

impl SchemaError {
    pub(crate) fn from_validation_error(error: &ValidationError<'_>) -> Self {
        if matches!(error.kind(), ValidationErrorKind::Referencing(_)) {
            Self::MissingReference(error.to_string())
        } else {
            Self::Invalid(error.to_string())
        }
    }
}

type EngineKey = (Dialect, ErrorMode);

/// Process-wide store of validator engines and compiled validators.
///
/// Construct one and share it (behind an [`Arc`]) between every function
/// that validates; it is safe to use from several runs at once.
#[derive(Default)]
pub struct ValidatorCache {
    engines: RwLock<HashMap<EngineKey, Arc<ValidationOptions<'static>>>>,
    validators: RwLock<HashMap<(EngineKey, SchemaKey), Arc<CompiledSchema>>>,
}

impl ValidatorCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the compiled form of `schema`, compiling it on first use.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError`] if the schema does not compile.
    pub fn compile(
        &self,
        schema: &Value,
        dialect: Dialect,
        mode: ErrorMode,
    ) -> Result<Arc<CompiledSchema>, SchemaError> {
        self.compile_keyed(SchemaKey::of(schema), dialect, mode, || schema.clone())
    }

    /// Returns the entry stored under `key`, building the schema with
    /// `build` and compiling it only when the key is new.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError`] if the built schema does not compile.
    pub fn compile_keyed<F>(
        &self,
        key: SchemaKey,
        dialect: Dialect,
        mode: ErrorMode,
        build: F,
    ) -> Result<Arc<CompiledSchema>, SchemaError>
    where
        F: FnOnce() -> Value,
    {
        let key = ((dialect, mode), key);
        if let Some(compiled) = self.validators.read().get(&key) {
            return Ok(Arc::clone(compiled));
        }

        debug!(?dialect, ?mode, key = ?key.1, "compiling schema");
        let schema = dialect.prepare(build());
        let validator = self
            .engine(dialect, mode)
            .build(&schema)
            .map_err(|e| SchemaError::from_validation_error(&e))?;

        let mut validators = self.validators.write();
        Ok(Arc::clone(
            validators
                .entry(key)
                .or_insert_with(|| Arc::new(CompiledSchema { schema, validator })),
        ))
    }

    fn engine(&self, dialect: Dialect, mode: ErrorMode) -> Arc<ValidationOptions> {
        if let Some(engine) = self.engines.read().get(&(dialect, mode)) {
            return Arc::clone(engine);
        }
        let mut engines = self.engines.write();
        Arc::clone(
            engines
                .entry((dialect, mode))
                .or_insert_with(|| Arc::new(dialect.options())),
        )
    }

    /// Returns the number of compiled validators.
    #[must_use]
    pub fn len(&self) -> usize {
        self.validators.read().len()
    }

    /// Returns true if nothing has been compiled yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.validators.read().is_empty()
    }

    /// Returns the number of validator engines created.
    #[must_use]
    pub fn engine_count(&self) -> usize {
        self.engines.read().len()
    }
}

impl fmt::Debug for ValidatorCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidatorCache")
            .field("engines", &self.engine_count())
            .field("validators", &self.len())
            .finish()
    }
}
