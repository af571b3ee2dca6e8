//! The document inventory handed to a lint run.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;

use crate::types::JsonPath;

/// A specification family and version a document belongs to (e.g. `oas3`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Format(String);

impl Format {
    /// OpenAPI 2.0 (Swagger).
    pub const OAS2: &'static str = "oas2";
    /// OpenAPI 3.x.
    pub const OAS3: &'static str = "oas3";
    /// AsyncAPI 2.x.
    pub const ASYNCAPI2: &'static str = "asyncapi2";

    /// Creates a format identifier.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Detects the formats a parsed document declares.
    #[must_use]
    pub fn detect(document: &Value) -> BTreeSet<Self> {
        let version = |key: &str| document.get(key).and_then(Value::as_str);
        let mut formats = BTreeSet::new();

        if version("swagger") == Some("2.0") {
            formats.insert(Self::new(Self::OAS2));
        }
        if version("openapi").is_some_and(|v| v.starts_with("3.")) {
            formats.insert(Self::new(Self::OAS3));
        }
        if version("asyncapi").is_some_and(|v| v.starts_with("2.")) {
            formats.insert(Self::new(Self::ASYNCAPI2));
        }

        formats
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Format {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for Format {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// Where a document came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentSource {
    /// A named, stable source (file path or URL).
    Named(String),
    /// An unnamed stream such as stdin.
    Stdin,
}

impl DocumentSource {
    /// Returns the source identity, if any.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Named(name) => Some(name),
            Self::Stdin => None,
        }
    }
}

/// A parsed document together with everything known about it.
#[derive(Debug, Clone)]
pub struct DocumentInventory {
    /// Tree with references resolved.
    pub resolved: Value,
    /// Tree as authored, if it differs from the resolved one.
    pub unresolved: Option<Value>,
    /// Detected formats; `None` when detection was not performed.
    pub formats: Option<BTreeSet<Format>>,
    /// Source identity.
    pub source: DocumentSource,
}

impl DocumentInventory {
    /// Creates an inventory for an unnamed, already-resolved document.
    #[must_use]
    pub fn new(resolved: Value) -> Self {
        Self {
            resolved,
            unresolved: None,
            formats: None,
            source: DocumentSource::Stdin,
        }
    }

    /// Sets the unresolved tree.
    #[must_use]
    pub fn with_unresolved(mut self, unresolved: Value) -> Self {
        self.unresolved = Some(unresolved);
        self
    }

    /// Sets the detected formats.
    #[must_use]
    pub fn with_formats<I, F>(mut self, formats: I) -> Self
    where
        I: IntoIterator<Item = F>,
        F: Into<Format>,
    {
        self.formats = Some(formats.into_iter().map(Into::into).collect());
        self
    }

    /// Detects formats from the resolved tree.
    #[must_use]
    pub fn with_detected_formats(mut self) -> Self {
        self.formats = Some(Format::detect(&self.resolved));
        self
    }

    /// Marks the document as coming from a named source.
    #[must_use]
    pub fn with_source(mut self, name: impl Into<String>) -> Self {
        self.source = DocumentSource::Named(name.into());
        self
    }

    /// Returns the tree a rule should run against.
    #[must_use]
    pub fn target(&self, resolved: bool) -> &Value {
        if resolved {
            &self.resolved
        } else {
            self.unresolved.as_ref().unwrap_or(&self.resolved)
        }
    }
}

/// A node matched by a rule's `given`.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentNode<'a> {
    /// Unescaped location of the node.
    pub path: JsonPath,
    /// The node value.
    pub value: &'a Value,
}

impl<'a> DocumentNode<'a> {
    /// Creates a node.
    #[must_use]
    pub fn new(path: JsonPath, value: &'a Value) -> Self {
        Self { path, value }
    }
}
