//! Location-based suppression of rule diagnostics.

use std::collections::{BTreeMap, HashMap};
use tracing::warn;

use crate::compile::ROOT;
use crate::pointer::{is_prefix, parse_pointer};
use crate::rule::Rule;
use crate::types::{Diagnostic, JsonPath};

/// Raw exception configuration: `"<source>#<pointer>"` to rule names.
pub type Exceptions = BTreeMap<String, Vec<String>>;

/// A location under which one rule's diagnostics are dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExceptionLocation {
    /// Document the location belongs to.
    pub source: String,
    /// Location inside the document.
    pub path: JsonPath,
}

impl ExceptionLocation {
    /// Parses `"<source>#<pointer>"`; a missing fragment addresses the whole
    /// document.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let (source, pointer) = raw.split_once('#').unwrap_or((raw, ""));
        Self {
            source: source.to_string(),
            path: parse_pointer(pointer),
        }
    }

    /// True when `diagnostic` lies at or beneath this location.
    #[must_use]
    pub fn covers(&self, diagnostic: &Diagnostic) -> bool {
        if diagnostic.source.as_deref() != Some(self.source.as_str()) {
            return false;
        }
        let path = match diagnostic.path.split_first() {
            Some((first, rest)) if first.as_key() == Some(ROOT) => rest,
            _ => diagnostic.path.as_slice(),
        };
        is_prefix(&self.path, path)
    }
}

/// Suppressed locations per rule name, built once per run.
#[derive(Debug, Clone, Default)]
pub struct ExceptionIndex {
    locations: HashMap<String, Vec<ExceptionLocation>>,
}

impl ExceptionIndex {
    /// Returns the suppressed locations for a rule.
    #[must_use]
    pub fn get(&self, rule: &str) -> &[ExceptionLocation] {
        self.locations.get(rule).map_or(&[], Vec::as_slice)
    }

    /// Returns true if nothing is suppressed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }
}

/// Groups raw exception entries by rule.
///
/// Entries naming rules absent from `rules` are skipped with a warning.
#[must_use]
pub fn pivot_exceptions(exceptions: &Exceptions, rules: &[Rule]) -> ExceptionIndex {
    let mut locations: HashMap<String, Vec<ExceptionLocation>> = HashMap::new();

    for (raw, names) in exceptions {
        let location = ExceptionLocation::parse(raw);
        for name in names {
            if !rules.iter().any(|r| &r.name == name) {
                warn!("Exception `{raw}` refers to unknown rule `{name}`");
                continue;
            }
            locations
                .entry(name.clone())
                .or_default()
                .push(location.clone());
        }
    }

    ExceptionIndex { locations }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path;
    use crate::rule::Given;
    use crate::types::Severity;

    fn diagnostic(source: &str, path: JsonPath) -> Diagnostic {
        Diagnostic::new("r", "m", path, Severity::Warning).with_source(Some(source.into()))
    }

    #[test]
    fn parses_source_and_pointer() {
        let location = ExceptionLocation::parse("api.yaml#/channels/a~1b");
        assert_eq!(location.source, "api.yaml");
        assert_eq!(location.path, path!["channels", "a/b"]);

        let whole = ExceptionLocation::parse("api.yaml");
        assert!(whole.path.is_empty());
    }

    #[test]
    fn covers_descendants_of_same_source() {
        let location = ExceptionLocation::parse("api.yaml#/servers/0");
        assert!(location.covers(&diagnostic("api.yaml", path!["servers", 0])));
        assert!(location.covers(&diagnostic("api.yaml", path!["servers", 0, "url"])));
        assert!(!location.covers(&diagnostic("api.yaml", path!["servers", 1])));
        assert!(!location.covers(&diagnostic("other.yaml", path!["servers", 0])));
    }

    #[test]
    fn root_marker_is_ignored() {
        let location = ExceptionLocation::parse("api.yaml#/info");
        assert!(location.covers(&diagnostic("api.yaml", path!["$", "info", "title"])));
    }

    #[test]
    fn pivot_groups_by_rule_and_skips_unknown() {
        let rules = vec![
            Rule::new("a", Given::new(["$"])),
            Rule::new("b", Given::new(["$"])),
        ];
        let mut exceptions = Exceptions::new();
        exceptions.insert("x.yaml#/p".into(), vec!["a".into(), "ghost".into()]);
        exceptions.insert("x.yaml#/q".into(), vec!["a".into(), "b".into()]);

        let index = pivot_exceptions(&exceptions, &rules);
        assert_eq!(index.get("a").len(), 2);
        assert_eq!(index.get("b").len(), 1);
        assert!(index.get("ghost").is_empty());
    }
}
