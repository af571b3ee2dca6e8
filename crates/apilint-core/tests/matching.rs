//! Integration test: compiled-pattern matching against the fallback engine.
//!
//! Every expression the compiler accepts must select exactly the nodes the
//! query engine selects for the same expression on the same tree.

use apilint_core::pointer::encode_fragment;
use apilint_core::{
    traverse, CompiledExpression, Given, JsonPathEngine, PathCompiler, PathQueryEngine, Rule,
    Segment,
};
use serde_json::{json, Value};
use std::collections::BTreeSet;

type Hits = BTreeSet<(Vec<Segment>, String)>;

fn documents() -> Vec<Value> {
    vec![
        json!({
            "openapi": "3.0.0",
            "info": {"title": "Pets", "description": "d", "contact": {"name": "n", "url": "u"}},
            "servers": [{"url": "https://a"}, {"url": "https://b", "description": "second"}],
            "paths": {
                "/pets": {
                    "get": {"description": "list", "responses": {"200": {"description": "ok"}}},
                    "post": {"responses": {"default": {"description": "err"}}}
                },
                "/pets/{id}": {"put": {"title": "t", "description": "replace"}}
            },
            "components": {"schemas": {"Pet": {"$ref": "#/components/schemas/Base", "title": "Pet"}}}
        }),
        json!({
            "asyncapi": "2.0.0",
            "channels": {
                "users/{userId}/signedUp": {"publish": {"message": {"payload": {"examples": [1, {"a": 2}]}}}},
                "a~b": {"subscribe": {"message": {"payload": {"example": {"description": "x"}}}}},
                "": {"description": "empty key"}
            },
            "servers": [],
            "tags": [{"name": "x", "description": "y"}, {"name": "z"}]
        }),
        json!({"description": {"description": {"description": "nested"}}, "list": [[1, [2]], [{"x": null}]]}),
        json!({
            "multi\nline": {"description": "x", "inner\r\n": {"description": "z"}},
            "b": {"description": "y"}
        }),
    ]
}

fn traverse_hits(expression: &str, tree: &Value) -> Hits {
    let rule = Rule::new("r", Given::with_compiler([expression], &PathCompiler::new()));
    assert!(rule.given.is_optimized(), "{expression} should compile");
    let mut hits = Hits::new();
    traverse(tree, &[&rule], |_, node| {
        hits.insert((node.path, node.value.to_string()));
    });
    hits
}

fn query_hits(expression: &str, tree: &Value) -> Hits {
    JsonPathEngine::new()
        .evaluate(expression, tree)
        .unwrap()
        .into_iter()
        .map(|node| (node.path, node.value.to_string()))
        .collect()
}

#[test]
fn compiled_patterns_select_what_the_engine_selects() {
    let expressions = [
        "$.info",
        "$.info.contact.*",
        "$.servers[*].url",
        "$.servers[*]",
        "$.paths.*",
        "$.paths.*.*.responses",
        "$..description",
        "$..*",
        "$.paths..responses.*",
        "$.channels.*",
        "$.channels.*.*.message.payload.examples.*",
        "$['channels']['a~b']",
        "$.channels['users/{userId}/signedUp'].publish",
        "$..payload..a",
        "$.tags[*].name",
        "$..['$ref']",
        "$.list[*][*]",
        "$.servers[1].description",
    ];

    for tree in documents() {
        for expression in expressions {
            assert_eq!(
                traverse_hits(expression, &tree),
                query_hits(expression, &tree),
                "mismatch for {expression} on {tree}"
            );
        }
    }
}

#[test]
fn property_filters_select_like_name_unions() {
    let pairs = [
        (
            "$.paths.*[?(@property === 'get' || @property === 'put')]",
            "$.paths.*['get','put']",
        ),
        (
            "$..responses[?(@property == '200' || @property == 'default')]",
            "$..responses['200','default']",
        ),
        (
            "$.info[?(@property === 'title')]",
            "$.info['title']",
        ),
    ];

    for tree in documents() {
        for (filter, union) in pairs {
            assert_eq!(
                traverse_hits(filter, &tree),
                query_hits(union, &tree),
                "mismatch for {filter} on {tree}"
            );
        }
    }
}

/// Every node with its encoded location, root excluded.
fn all_nodes(value: &Value, location: &str, path: &[Segment], out: &mut Vec<(String, Vec<Segment>)>) {
    let mut visit = |fragment: String, segment: Segment, child: &Value| {
        let child_location = if path.is_empty() {
            fragment
        } else {
            format!("{location}/{fragment}")
        };
        let mut child_path = path.to_vec();
        child_path.push(segment);
        out.push((child_location.clone(), child_path.clone()));
        all_nodes(child, &child_location, &child_path, out);
    };
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                visit(encode_fragment(key).into_owned(), Segment::Key(key.clone()), child);
            }
        }
        Value::Array(items) => {
            for (i, child) in items.iter().enumerate() {
                visit(i.to_string(), Segment::Index(i), child);
            }
        }
        _ => {}
    }
}

#[test]
fn traversal_fires_exactly_once_per_matching_rule_and_node() {
    let compiler = PathCompiler::new();
    let rules = vec![
        Rule::new("descriptions", Given::with_compiler(["$..description"], &compiler)),
        Rule::new(
            "overlapping",
            Given::with_compiler(["$..description", "$.info.*", "$..*"], &compiler),
        ),
        Rule::new("servers", Given::with_compiler(["$.servers[*]"], &compiler)),
        Rule::new("duplicate-servers", Given::with_compiler(["$.servers[*]"], &compiler)),
    ];
    let refs: Vec<&Rule> = rules.iter().collect();

    for tree in documents() {
        let mut fired: Vec<(String, Vec<Segment>)> = Vec::new();
        traverse(&tree, &refs, |rule, node| fired.push((rule.name.clone(), node.path)));

        let mut nodes = Vec::new();
        all_nodes(&tree, "", &[], &mut nodes);
        let mut expected = Vec::new();
        for (location, path) in &nodes {
            for rule in &rules {
                if rule.given.compiled().matches(location) {
                    expected.push((rule.name.clone(), path.clone()));
                }
            }
        }

        let unique: BTreeSet<_> = fired.iter().cloned().collect();
        assert_eq!(unique.len(), fired.len(), "a rule fired twice on one node");
        assert_eq!(unique, expected.into_iter().collect::<BTreeSet<_>>());
    }
}

#[test]
fn recompiling_hits_the_cache() {
    let compiler = PathCompiler::new();
    let first = compiler.compile("$.channels.*");
    assert!(compiler.is_cached("$.channels.*"));
    let before = compiler.cached_len();
    let second = compiler.compile("$.channels.*");
    assert_eq!(first, second);
    assert_eq!(compiler.cached_len(), before);
    assert!(matches!(second, CompiledExpression::Pattern(_)));
}
