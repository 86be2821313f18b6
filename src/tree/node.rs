//! Generic nested tree node

use std::fmt;

use base64::Engine as _;
use chrono::{DateTime, SecondsFormat, Utc};
use indexmap::IndexMap;
use regex::Regex;
use serde_json::{Number, Value};

/// A nested mapping/sequence structure with opaque scalar kinds.
///
/// `Bytes`, `Timestamp` and `Pattern` are opaque: tree operations never
/// descend into them and merges replace them whole. `Leaf` carries the
/// domain payload a tree is specialised for.
#[derive(Debug, Clone)]
pub enum Tree<L> {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Bytes(Vec<u8>),
    Timestamp(DateTime<Utc>),
    Pattern(Regex),
    Seq(Vec<Tree<L>>),
    Map(IndexMap<String, Tree<L>>),
    Leaf(L),
}

impl<L> Tree<L> {
    /// Empty mapping node
    pub fn map() -> Self {
        Tree::Map(IndexMap::new())
    }

    /// Builds a mapping node from key/value pairs, keeping their order
    pub fn from_pairs<K, I>(pairs: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Tree<L>)>,
    {
        Tree::Map(pairs.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Single-element sequence, read as "array of" in declarations
    pub fn array_of(inner: Tree<L>) -> Self {
        Tree::Seq(vec![inner])
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Tree::Null)
    }

    pub fn is_map(&self) -> bool {
        matches!(self, Tree::Map(_))
    }

    pub fn is_seq(&self) -> bool {
        matches!(self, Tree::Seq(_))
    }

    /// True for values tree operations treat as indivisible
    pub fn is_opaque(&self) -> bool {
        matches!(self, Tree::Bytes(_) | Tree::Timestamp(_) | Tree::Pattern(_))
    }

    pub fn as_map(&self) -> Option<&IndexMap<String, Tree<L>>> {
        match self {
            Tree::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_map_mut(&mut self) -> Option<&mut IndexMap<String, Tree<L>>> {
        match self {
            Tree::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_seq(&self) -> Option<&[Tree<L>]> {
        match self {
            Tree::Seq(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Tree::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Tree::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Tree::Number(n) => n.as_f64(),
            _ => None,
        }
    }

    pub fn as_leaf(&self) -> Option<&L> {
        match self {
            Tree::Leaf(leaf) => Some(leaf),
            _ => None,
        }
    }

    /// Looks up a direct child of a mapping node
    pub fn get(&self, key: &str) -> Option<&Tree<L>> {
        self.as_map().and_then(|map| map.get(key))
    }

    /// True when this is a mapping node holding `key`
    pub fn has_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Converts the data part of the tree to JSON.
    ///
    /// Leaves are handed to `leaf`; returning `None` drops the entry
    /// (or yields `None` when the root itself is a dropped leaf).
    pub fn to_json_with(&self, leaf: &mut impl FnMut(&L) -> Option<Value>) -> Option<Value> {
        Some(match self {
            Tree::Null => Value::Null,
            Tree::Bool(b) => Value::Bool(*b),
            Tree::Number(n) => Value::Number(n.clone()),
            Tree::String(s) => Value::String(s.clone()),
            Tree::Bytes(bytes) => {
                Value::String(base64::engine::general_purpose::STANDARD.encode(bytes))
            }
            Tree::Timestamp(ts) => Value::String(ts.to_rfc3339_opts(SecondsFormat::Millis, true)),
            Tree::Pattern(re) => Value::String(re.as_str().to_string()),
            Tree::Seq(items) => Value::Array(
                items
                    .iter()
                    .filter_map(|item| item.to_json_with(leaf))
                    .collect(),
            ),
            Tree::Map(map) => Value::Object(
                map.iter()
                    .filter_map(|(k, v)| v.to_json_with(leaf).map(|v| (k.clone(), v)))
                    .collect(),
            ),
            Tree::Leaf(l) => return leaf(l),
        })
    }

    /// Converts the data part of the tree to JSON, dropping leaves
    pub fn to_json(&self) -> Option<Value> {
        self.to_json_with(&mut |_| None)
    }
}

impl<L: PartialEq> PartialEq for Tree<L> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Tree::Null, Tree::Null) => true,
            (Tree::Bool(a), Tree::Bool(b)) => a == b,
            (Tree::Number(a), Tree::Number(b)) => a == b,
            (Tree::String(a), Tree::String(b)) => a == b,
            (Tree::Bytes(a), Tree::Bytes(b)) => a == b,
            (Tree::Timestamp(a), Tree::Timestamp(b)) => a == b,
            (Tree::Pattern(a), Tree::Pattern(b)) => a.as_str() == b.as_str(),
            (Tree::Seq(a), Tree::Seq(b)) => a == b,
            (Tree::Map(a), Tree::Map(b)) => {
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x == y)
            }
            (Tree::Leaf(a), Tree::Leaf(b)) => a == b,
            _ => false,
        }
    }
}

impl<L> Default for Tree<L> {
    fn default() -> Self {
        Tree::Null
    }
}

impl<L> From<Value> for Tree<L> {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Tree::Null,
            Value::Bool(b) => Tree::Bool(b),
            Value::Number(n) => Tree::Number(n),
            Value::String(s) => Tree::String(s),
            Value::Array(items) => Tree::Seq(items.into_iter().map(Tree::from).collect()),
            Value::Object(map) => Tree::Map(map.into_iter().map(|(k, v)| (k, Tree::from(v))).collect()),
        }
    }
}

impl<L> From<&str> for Tree<L> {
    fn from(s: &str) -> Self {
        Tree::String(s.to_string())
    }
}

impl<L> From<String> for Tree<L> {
    fn from(s: String) -> Self {
        Tree::String(s)
    }
}

impl<L> From<bool> for Tree<L> {
    fn from(b: bool) -> Self {
        Tree::Bool(b)
    }
}

impl<L> From<i64> for Tree<L> {
    fn from(n: i64) -> Self {
        Tree::Number(n.into())
    }
}

impl<L> From<f64> for Tree<L> {
    fn from(n: f64) -> Self {
        Number::from_f64(n).map(Tree::Number).unwrap_or(Tree::Null)
    }
}

impl<L> From<DateTime<Utc>> for Tree<L> {
    fn from(ts: DateTime<Utc>) -> Self {
        Tree::Timestamp(ts)
    }
}

impl<L> From<Regex> for Tree<L> {
    fn from(re: Regex) -> Self {
        Tree::Pattern(re)
    }
}

impl<L> From<Vec<&str>> for Tree<L> {
    fn from(items: Vec<&str>) -> Self {
        Tree::Seq(items.into_iter().map(Tree::from).collect())
    }
}

impl<L, const N: usize> From<[&str; N]> for Tree<L> {
    fn from(items: [&str; N]) -> Self {
        Tree::Seq(items.into_iter().map(Tree::from).collect())
    }
}

impl<L: fmt::Debug> fmt::Display for Tree<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tree::Null => write!(f, "null"),
            Tree::Bool(b) => write!(f, "{}", b),
            Tree::Number(n) => write!(f, "{}", n),
            Tree::String(s) => write!(f, "{:?}", s),
            Tree::Bytes(bytes) => write!(f, "<{} bytes>", bytes.len()),
            Tree::Timestamp(ts) => write!(f, "{}", ts.to_rfc3339()),
            Tree::Pattern(re) => write!(f, "/{}/", re.as_str()),
            Tree::Seq(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Tree::Map(map) => {
                write!(f, "{{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                write!(f, "}}")
            }
            Tree::Leaf(l) => write!(f, "{:?}", l),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    type Plain = Tree<()>;

    #[test]
    fn test_from_json_keeps_key_order() {
        let tree = Plain::from(json!({"b": 1, "a": [true, null]}));
        let keys: Vec<_> = tree.as_map().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["b", "a"]);
        assert!(tree.get("a").unwrap().is_seq());
    }

    #[test]
    fn test_to_json_drops_leaves() {
        let tree: Tree<u8> = Tree::from_pairs([("keep", Tree::from("x")), ("drop", Tree::Leaf(7))]);
        assert_eq!(tree.to_json(), Some(json!({"keep": "x"})));
        assert_eq!(Tree::Leaf(7u8).to_json(), None);
    }

    #[test]
    fn test_opaque_values_render_as_strings() {
        let bytes = Plain::Bytes(vec![1, 2, 3]);
        assert_eq!(bytes.to_json(), Some(json!("AQID")));

        let re = Plain::Pattern(Regex::new("^a+$").unwrap());
        assert!(re.is_opaque());
        assert_eq!(re.to_json(), Some(json!("^a+$")));
    }

    #[test]
    fn test_pattern_equality_by_source() {
        let a = Plain::Pattern(Regex::new("x").unwrap());
        let b = Plain::Pattern(Regex::new("x").unwrap());
        assert_eq!(a, b);
    }

    #[test]
    fn test_map_equality_is_order_sensitive() {
        let a = Plain::from(json!({"a": 1, "b": 2}));
        let b = Plain::from_pairs([("b", Plain::from(2i64)), ("a", Plain::from(1i64))]);
        assert_ne!(a, b);
    }
}
