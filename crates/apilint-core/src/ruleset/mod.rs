//! Rulesets loaded from TOML.
//!
//! # Architecture
//!
//! ```text
//! TOML text
//!   ↓ serde (DTO layer)
//! config_dto types
//!   ↓ validate + convert, compiling every `given`
//! Ruleset (rules sorted by name + raw exceptions)
//! ```

use std::path::{Path, PathBuf};

use crate::compile::PathCompiler;
use crate::exceptions::Exceptions;
use crate::rule::{FunctionRegistry, Rule};

pub mod config_dto;
pub mod loader;

/// Errors from reading, parsing and loading a ruleset.
#[derive(Debug, thiserror::Error)]
pub enum LoadRulesetError {
    /// The ruleset file could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Io {
        /// File that failed to read.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// TOML deserialization failed.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Domain model validation failed.
    #[error("{0}")]
    Load(#[from] loader::LoadError),
}

/// A set of rules plus the exceptions configured alongside them.
#[derive(Debug, Clone, Default)]
pub struct Ruleset {
    rules: Vec<Rule>,
    except: Exceptions,
}

impl Ruleset {
    /// Creates a ruleset. Rules are kept sorted by name.
    #[must_use]
    pub fn new(mut rules: Vec<Rule>, except: Exceptions) -> Self {
        rules.sort_by(|a, b| a.name.cmp(&b.name));
        Self { rules, except }
    }

    /// Parses TOML content, resolving functions through `registry`.
    ///
    /// # Errors
    ///
    /// Returns an error if TOML parsing or model validation fails.
    pub fn parse(content: &str, registry: &FunctionRegistry) -> Result<Self, LoadRulesetError> {
        let dto: config_dto::RulesetDto = toml::from_str(content)?;
        Ok(loader::load(dto, registry, PathCompiler::global())?)
    }

    /// Reads and parses a TOML ruleset file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or its content is invalid.
    pub fn from_file(
        path: impl AsRef<Path>,
        registry: &FunctionRegistry,
    ) -> Result<Self, LoadRulesetError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| LoadRulesetError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content, registry)
    }

    /// Rules sorted by name.
    #[must_use]
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Looks a rule up by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Rule> {
        self.rules
            .binary_search_by(|r| r.name.as_str().cmp(name))
            .ok()
            .map(|i| &self.rules[i])
    }

    /// Raw exception configuration.
    #[must_use]
    pub fn except(&self) -> &Exceptions {
        &self.except
    }

    /// Returns the number of rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Returns true if there are no rules.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Splits into rules and exceptions.
    #[must_use]
    pub fn into_parts(self) -> (Vec<Rule>, Exceptions) {
        (self.rules, self.except)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const RULESET: &str = r#"
[rules.b-rule]
given = "$.b"

[rules.a-rule]
given = "$.a"
severity = "off"

[except]
"api.yaml#/a" = ["b-rule"]
"#;

    #[test]
    fn parse_sorts_rules() {
        let ruleset = Ruleset::parse(RULESET, &FunctionRegistry::new()).unwrap();
        let names: Vec<_> = ruleset.rules().iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["a-rule", "b-rule"]);
        assert!(!ruleset.get("a-rule").unwrap().is_enabled());
        assert!(ruleset.get("c-rule").is_none());
        assert_eq!(ruleset.except().len(), 1);
    }

    #[test]
    fn from_file_reads_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(RULESET.as_bytes()).unwrap();

        let ruleset = Ruleset::from_file(file.path(), &FunctionRegistry::new()).unwrap();
        assert_eq!(ruleset.len(), 2);
    }

    #[test]
    fn from_file_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Ruleset::from_file(dir.path().join("missing.toml"), &FunctionRegistry::new())
            .unwrap_err();
        assert!(matches!(err, LoadRulesetError::Io { .. }));
    }

    #[test]
    fn invalid_toml_is_reported() {
        let err = Ruleset::parse("[rules.x\n", &FunctionRegistry::new()).unwrap_err();
        assert!(matches!(err, LoadRulesetError::Toml(_)));
    }
}
