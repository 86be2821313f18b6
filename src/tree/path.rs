//! Dotted paths over trees and JSON documents
//!
//! A path is a sequence of segments written as `a.b.0.c`. Numeric segments
//! index into sequences; every other segment names a mapping key.

use std::fmt;

use serde_json::{Map, Value};

/// One step of a path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Key(String),
    Index(usize),
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Key(k) => write!(f, "{}", k),
            Segment::Index(i) => write!(f, "{}", i),
        }
    }
}

/// Position of a node inside a tree, root being empty
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TreePath {
    segments: Vec<Segment>,
}

impl TreePath {
    pub fn root() -> Self {
        Self::default()
    }

    /// Parses a dotted path; empty input is the root
    pub fn parse(path: &str) -> Self {
        let segments = path
            .split('.')
            .filter(|s| !s.is_empty())
            .map(|s| match s.parse::<usize>() {
                Ok(i) => Segment::Index(i),
                Err(_) => Segment::Key(s.to_string()),
            })
            .collect();
        Self { segments }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    pub fn push(&mut self, segment: Segment) {
        self.segments.push(segment);
    }

    pub fn pop(&mut self) -> Option<Segment> {
        self.segments.pop()
    }

    /// Returns a new path extended by one key
    pub fn child(&self, key: &str) -> Self {
        let mut next = self.clone();
        next.push(Segment::Key(key.to_string()));
        next
    }

    /// Returns a new path extended by one index
    pub fn index(&self, i: usize) -> Self {
        let mut next = self.clone();
        next.push(Segment::Index(i));
        next
    }

    /// Last key segment, skipping indices
    pub fn last_key(&self) -> Option<&str> {
        self.segments.iter().rev().find_map(|s| match s {
            Segment::Key(k) => Some(k.as_str()),
            Segment::Index(_) => None,
        })
    }

    /// Dotted form with sequence indices removed (`rooms.0.owner` -> `rooms.owner`)
    pub fn schema_path(&self) -> String {
        self.segments
            .iter()
            .filter_map(|s| match s {
                Segment::Key(k) => Some(k.as_str()),
                Segment::Index(_) => None,
            })
            .collect::<Vec<_>>()
            .join(".")
    }
}

impl fmt::Display for TreePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                write!(f, ".")?;
            }
            write!(f, "{}", segment)?;
        }
        Ok(())
    }
}

/// Joins a prefix and a key into a dotted path
pub fn join_path(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", prefix, key)
    }
}

/// Reads the value at `path`
pub fn json_get<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = value;
    for segment in TreePath::parse(path).segments() {
        current = match (segment, current) {
            (Segment::Key(k), Value::Object(map)) => map.get(k)?,
            (Segment::Index(i), Value::Array(items)) => items.get(*i)?,
            (Segment::Index(i), Value::Object(map)) => map.get(&i.to_string())?,
            _ => return None,
        };
    }
    Some(current)
}

/// Mutable variant of [`json_get`]
pub fn json_get_mut<'a>(value: &'a mut Value, path: &str) -> Option<&'a mut Value> {
    let mut current = value;
    for segment in TreePath::parse(path).segments() {
        current = match (segment, current) {
            (Segment::Key(k), Value::Object(map)) => map.get_mut(k)?,
            (Segment::Index(i), Value::Array(items)) => items.get_mut(*i)?,
            (Segment::Index(i), Value::Object(map)) => map.get_mut(&i.to_string())?,
            _ => return None,
        };
    }
    Some(current)
}

/// Writes `new_value` at `path`, creating intermediate objects.
///
/// Returns false when an intermediate node is a scalar or an index is
/// out of range.
pub fn json_set(value: &mut Value, path: &str, new_value: Value) -> bool {
    let parsed = TreePath::parse(path);
    let Some((last, parents)) = parsed.segments().split_last() else {
        *value = new_value;
        return true;
    };

    let mut current = value;
    for segment in parents {
        if current.is_null() {
            *current = Value::Object(Map::new());
        }
        current = match (segment, current) {
            (Segment::Key(k), Value::Object(map)) => {
                map.entry(k.clone()).or_insert_with(|| Value::Object(Map::new()))
            }
            (Segment::Index(i), Value::Array(items)) => match items.get_mut(*i) {
                Some(item) => item,
                None => return false,
            },
            (Segment::Index(i), Value::Object(map)) => map
                .entry(i.to_string())
                .or_insert_with(|| Value::Object(Map::new())),
            _ => return false,
        };
    }

    if current.is_null() {
        *current = Value::Object(Map::new());
    }
    match (last, current) {
        (Segment::Key(k), Value::Object(map)) => {
            map.insert(k.clone(), new_value);
            true
        }
        (Segment::Index(i), Value::Array(items)) => {
            if *i < items.len() {
                items[*i] = new_value;
                true
            } else if *i == items.len() {
                items.push(new_value);
                true
            } else {
                false
            }
        }
        (Segment::Index(i), Value::Object(map)) => {
            map.insert(i.to_string(), new_value);
            true
        }
        _ => false,
    }
}

/// Removes and returns the value at `path`
pub fn json_remove(value: &mut Value, path: &str) -> Option<Value> {
    let parsed = TreePath::parse(path);
    let (last, parents) = parsed.segments().split_last()?;
    let parent_path = TreePath {
        segments: parents.to_vec(),
    };
    let parent = json_get_mut(value, &parent_path.to_string())?;
    match (last, parent) {
        (Segment::Key(k), Value::Object(map)) => map.shift_remove(k),
        (Segment::Index(i), Value::Array(items)) if *i < items.len() => Some(items.remove(*i)),
        (Segment::Index(i), Value::Object(map)) => map.shift_remove(&i.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_and_display() {
        let path = TreePath::parse("rooms.1.owner");
        assert_eq!(path.depth(), 3);
        assert_eq!(path.segments()[1], Segment::Index(1));
        assert_eq!(path.to_string(), "rooms.1.owner");
        assert_eq!(path.schema_path(), "rooms.owner");
        assert_eq!(path.last_key(), Some("owner"));
    }

    #[test]
    fn test_root_path() {
        assert!(TreePath::parse("").is_root());
        assert_eq!(join_path("", "name"), "name");
        assert_eq!(join_path("car", "make"), "car.make");
    }

    #[test]
    fn test_json_get_through_arrays() {
        let doc = json!({"rooms": [{"name": "a"}, {"name": "b"}]});
        assert_eq!(json_get(&doc, "rooms.1.name"), Some(&json!("b")));
        assert_eq!(json_get(&doc, "rooms.2.name"), None);
        assert_eq!(json_get(&doc, "rooms.name"), None);
    }

    #[test]
    fn test_json_set_creates_intermediate_objects() {
        let mut doc = json!({});
        assert!(json_set(&mut doc, "car.make", json!("Saab")));
        assert_eq!(doc, json!({"car": {"make": "Saab"}}));
    }

    #[test]
    fn test_json_set_refuses_scalar_parent() {
        let mut doc = json!({"name": "x"});
        assert!(!json_set(&mut doc, "name.first", json!("y")));
    }

    #[test]
    fn test_json_set_appends_at_end() {
        let mut doc = json!({"tags": ["a"]});
        assert!(json_set(&mut doc, "tags.1", json!("b")));
        assert!(!json_set(&mut doc, "tags.5", json!("c")));
        assert_eq!(doc, json!({"tags": ["a", "b"]}));
    }

    #[test]
    fn test_json_remove() {
        let mut doc = json!({"a": {"b": 1, "c": 2}});
        assert_eq!(json_remove(&mut doc, "a.b"), Some(json!(1)));
        assert_eq!(doc, json!({"a": {"c": 2}}));
        assert_eq!(json_remove(&mut doc, "a.zzz"), None);
    }
}
