//! Single-pass matching of compiled rules against a document tree.

use serde_json::Value;
use std::collections::HashMap;

use crate::compile::ROOT;
use crate::document::DocumentNode;
use crate::pointer::{encode_fragment, SEPARATOR};
use crate::rule::Rule;
use crate::types::{JsonPath, Segment};

/// Walks `root` once and reports every `(rule, node)` pair whose location
/// matches one of the rule's patterns.
///
/// Rules whose `given` contains `$` receive one match at `["$"]` before the
/// walk. Every other node is visited in pre-order: object members in
/// enumeration order, array elements by ascending index. The root itself is
/// never tested against patterns. A rule fires at most once per node even
/// when several of its patterns match.
///
/// Only rules for which [`crate::Given::is_optimized`] holds should be
/// passed in; others have no patterns and never match.
pub fn traverse<'r, 'v, F>(root: &'v Value, rules: &[&'r Rule], mut on_match: F)
where
    F: FnMut(&'r Rule, DocumentNode<'v>),
{
    for rule in rules.iter().copied().filter(|r| r.given.includes_root()) {
        on_match(rule, DocumentNode::new(vec![Segment::from(ROOT)], root));
    }

    let mut walker = Walker {
        rules,
        memo: HashMap::new(),
        location: String::new(),
        path: Vec::new(),
        on_match: &mut on_match,
    };
    walker.children(root);
}

struct Walker<'a, 'r, F> {
    rules: &'a [&'r Rule],
    memo: HashMap<&'r str, bool>,
    location: String,
    path: JsonPath,
    on_match: &'a mut F,
}

impl<'r, 'v, F> Walker<'_, 'r, F>
where
    F: FnMut(&'r Rule, DocumentNode<'v>),
{
    fn children(&mut self, value: &'v Value) {
        match value {
            Value::Object(map) => {
                for (key, child) in map {
                    self.visit(&encode_fragment(key), Segment::Key(key.clone()), child);
                }
            }
            Value::Array(items) => {
                for (index, child) in items.iter().enumerate() {
                    self.visit(&index.to_string(), Segment::Index(index), child);
                }
            }
            _ => {}
        }
    }

    fn visit(&mut self, fragment: &str, segment: Segment, value: &'v Value) {
        let parent_len = self.location.len();
        if !self.path.is_empty() {
            self.location.push(SEPARATOR);
        }
        self.location.push_str(fragment);
        self.path.push(segment);

        let location = self.location.as_str();
        self.memo.clear();
        for &rule in self.rules {
            let matched = rule.given.patterns().any(|pattern| {
                *self
                    .memo
                    .entry(pattern.as_str())
                    .or_insert_with(|| pattern.is_match(location))
            });
            if matched {
                (self.on_match)(rule, DocumentNode::new(self.path.clone(), value));
            }
        }

        if value.is_object() || value.is_array() {
            self.children(value);
        }

        self.location.truncate(parent_len);
        self.path.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::PathCompiler;
    use crate::path;
    use crate::rule::Given;
    use serde_json::json;

    fn rule(name: &str, given: &[&str]) -> Rule {
        Rule::new(name, Given::with_compiler(given.iter().copied(), &PathCompiler::new()))
    }

    fn collect(root: &Value, rules: &[&Rule]) -> Vec<(String, JsonPath)> {
        let mut hits = Vec::new();
        traverse(root, rules, |rule, node| hits.push((rule.name.clone(), node.path)));
        hits
    }

    #[test]
    fn root_rule_matches_once() {
        let doc = json!({"info": {}});
        let root = rule("root", &["$"]);
        assert_eq!(collect(&doc, &[&root]), vec![("root".into(), path!["$"])]);
    }

    #[test]
    fn visits_in_document_order() {
        let doc = json!({"a": [{"x": 1}, {"x": 2}], "b": {"x": 3}});
        let xs = rule("xs", &["$..x"]);
        let paths: Vec<_> = collect(&doc, &[&xs]).into_iter().map(|(_, p)| p).collect();
        assert_eq!(
            paths,
            vec![path!["a", 0, "x"], path!["a", 1, "x"], path!["b", "x"]]
        );
    }

    #[test]
    fn fires_once_per_rule_and_node() {
        let doc = json!({"info": {"title": "t"}});
        let overlapping = rule("overlap", &["$.info", "$..info"]);
        assert_eq!(collect(&doc, &[&overlapping]).len(), 1);
    }

    #[test]
    fn shared_patterns_match_each_rule() {
        let doc = json!({"servers": [{"url": "u"}]});
        let a = rule("a", &["$.servers[*].url"]);
        let b = rule("b", &["$.servers[*].url"]);
        let hits = collect(&doc, &[&a, &b]);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].0, "a");
        assert_eq!(hits[1].0, "b");
    }

    #[test]
    fn keys_are_encoded_for_matching_and_decoded_in_paths() {
        let doc = json!({"paths": {"/pets": {"get": {}}, "/users/{id}": {}}});
        let pets = rule("pets", &["$.paths['/pets'].get"]);
        assert_eq!(
            collect(&doc, &[&pets]),
            vec![("pets".into(), path!["paths", "/pets", "get"])]
        );
    }

    #[test]
    fn primitives_terminate_branches() {
        let doc = json!({"a": "leaf", "b": null, "c": [1, 2]});
        let all = rule("all", &["$..*"]);
        let paths: Vec<_> = collect(&doc, &[&all]).into_iter().map(|(_, p)| p).collect();
        assert_eq!(
            paths,
            vec![path!["a"], path!["b"], path!["c"], path!["c", 0], path!["c", 1]]
        );
    }

    #[test]
    fn node_values_are_passed_through() {
        let doc = json!({"info": {"version": "1.0"}});
        let version = rule("v", &["$.info.version"]);
        let mut values = Vec::new();
        traverse(&doc, &[&version], |_, node| values.push(node.value.clone()));
        assert_eq!(values, vec![json!("1.0")]);
    }
}
