//! JSON pointer fragment encoding.
//!
//! Locations are joined with `/`; inside a segment `~` is written as `~0`
//! and `/` as `~1`.

use crate::types::{JsonPath, Segment};
use std::borrow::Cow;

/// Separator between encoded segments.
pub const SEPARATOR: char = '/';

/// Escapes a single key for use inside a pointer.
#[must_use]
pub fn encode_fragment(key: &str) -> Cow<'_, str> {
    if key.contains(['~', '/']) {
        Cow::Owned(key.replace('~', "~0").replace('/', "~1"))
    } else {
        Cow::Borrowed(key)
    }
}

/// Reverses [`encode_fragment`].
#[must_use]
pub fn decode_fragment(fragment: &str) -> Cow<'_, str> {
    if fragment.contains('~') {
        Cow::Owned(fragment.replace("~1", "/").replace("~0", "~"))
    } else {
        Cow::Borrowed(fragment)
    }
}

/// Encodes a segment the way it appears in a location string.
#[must_use]
pub fn encode_segment(segment: &Segment) -> Cow<'_, str> {
    match segment {
        Segment::Key(key) => encode_fragment(key),
        Segment::Index(index) => Cow::Owned(index.to_string()),
    }
}

/// Renders a path as a JSON pointer (`/a/0/b~1c`), or `""` for the root.
#[must_use]
pub fn to_pointer(path: &[Segment]) -> String {
    let mut pointer = String::new();
    for segment in path {
        pointer.push(SEPARATOR);
        pointer.push_str(&encode_segment(segment));
    }
    pointer
}

/// Parses a JSON pointer into key segments.
///
/// A leading `/` is dropped and an optional leading `#` fragment marker is
/// ignored. Every segment is decoded as a key; numeric keys stay keys since a
/// pointer alone cannot tell an array index from a member name.
#[must_use]
pub fn parse_pointer(pointer: &str) -> JsonPath {
    let pointer = pointer.strip_prefix('#').unwrap_or(pointer);
    let Some(rest) = pointer.strip_prefix(SEPARATOR) else {
        return Vec::new();
    };
    rest.split(SEPARATOR)
        .map(|fragment| Segment::Key(decode_fragment(fragment).into_owned()))
        .collect()
}

/// Returns true when `prefix` addresses `path` or one of its ancestors.
///
/// Index and key segments compare by their textual form, so a pointer
/// parsed from configuration (`/servers/0`) matches a traversal path
/// holding `Segment::Index(0)`.
#[must_use]
pub fn is_prefix(prefix: &[Segment], path: &[Segment]) -> bool {
    prefix.len() <= path.len()
        && prefix
            .iter()
            .zip(path)
            .all(|(a, b)| a == b || a.to_string() == b.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path;

    #[test]
    fn encodes_separator_and_escape() {
        assert_eq!(encode_fragment("/users/{id}"), "~1users~1{id}");
        assert_eq!(encode_fragment("a~b"), "a~0b");
        assert_eq!(encode_fragment("plain"), "plain");
    }

    #[test]
    fn decode_reverses_encode() {
        for key in ["/a/b", "~1", "x~0y", "~/~"] {
            assert_eq!(decode_fragment(&encode_fragment(key)), key);
        }
    }

    #[test]
    fn pointer_round_trip_for_keys() {
        let p = path!["paths", "/pets/{id}", "get"];
        assert_eq!(to_pointer(&p), "/paths/~1pets~1{id}/get");
        assert_eq!(parse_pointer("#/paths/~1pets~1{id}/get"), p);
    }

    #[test]
    fn root_pointer_is_empty() {
        assert_eq!(to_pointer(&[]), "");
        assert!(parse_pointer("").is_empty());
        assert!(parse_pointer("#").is_empty());
    }

    #[test]
    fn prefix_matches_index_by_text() {
        let prefix = parse_pointer("/servers/0");
        assert!(is_prefix(&prefix, &path!["servers", 0, "url"]));
        assert!(!is_prefix(&prefix, &path!["servers", 1, "url"]));
        assert!(!is_prefix(&path!["servers", 0, "url"], &path!["servers", 0]));
    }
}
