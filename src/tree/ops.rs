//! Recursive operations over [`Tree`]
//!
//! All operations are pure unless the name says otherwise. Opaque nodes
//! (bytes, timestamps, patterns) and leaves are never descended into.

use indexmap::IndexMap;

use super::node::Tree;
use super::path::{Segment, TreePath};

/// Rewrites every mapping key at every depth.
///
/// `f` receives the key and the value stored under it and returns the
/// replacement key. Sequences are walked so that maps nested inside
/// arrays are rewritten too.
pub fn deep_map_keys<L, F>(tree: &Tree<L>, f: &mut F) -> Tree<L>
where
    L: Clone,
    F: FnMut(&str, &Tree<L>) -> String,
{
    match tree {
        Tree::Map(map) => {
            let mut out = IndexMap::with_capacity(map.len());
            for (key, value) in map {
                let new_key = f(key, value);
                out.insert(new_key, deep_map_keys(value, f));
            }
            Tree::Map(out)
        }
        Tree::Seq(items) => Tree::Seq(items.iter().map(|item| deep_map_keys(item, f)).collect()),
        other => other.clone(),
    }
}

/// Rewrites every non-container node.
///
/// `f` receives the node and the key it sits under (`None` for sequence
/// elements and the root).
pub fn deep_map_values<L, F>(tree: &Tree<L>, f: &mut F) -> Tree<L>
where
    L: Clone,
    F: FnMut(&Tree<L>, Option<&str>) -> Tree<L>,
{
    fn walk<L, F>(tree: &Tree<L>, key: Option<&str>, f: &mut F) -> Tree<L>
    where
        L: Clone,
        F: FnMut(&Tree<L>, Option<&str>) -> Tree<L>,
    {
        match tree {
            Tree::Map(map) => Tree::Map(
                map.iter()
                    .map(|(k, v)| (k.clone(), walk(v, Some(k), f)))
                    .collect(),
            ),
            Tree::Seq(items) => Tree::Seq(items.iter().map(|item| walk(item, None, f)).collect()),
            other => f(other, key),
        }
    }
    walk(tree, None, f)
}

/// Extends every mapping node with entries computed from its position.
///
/// `f` sees the path of the mapping and its current entries and returns
/// entries to insert; an existing key is overwritten in place, a new key
/// is appended. Children are visited after their parent has been extended,
/// so injected subtrees are walked as well.
pub fn extend_with_context<L, F>(tree: &Tree<L>, f: &mut F) -> Tree<L>
where
    L: Clone,
    F: FnMut(&TreePath, &IndexMap<String, Tree<L>>) -> Vec<(String, Tree<L>)>,
{
    fn walk<L, F>(tree: &Tree<L>, path: &mut TreePath, f: &mut F) -> Tree<L>
    where
        L: Clone,
        F: FnMut(&TreePath, &IndexMap<String, Tree<L>>) -> Vec<(String, Tree<L>)>,
    {
        match tree {
            Tree::Map(map) => {
                let mut extended = map.clone();
                for (key, value) in f(path, map) {
                    extended.insert(key, value);
                }
                let mut out = IndexMap::with_capacity(extended.len());
                for (key, value) in extended {
                    path.push(Segment::Key(key.clone()));
                    let walked = walk(&value, path, f);
                    path.pop();
                    out.insert(key, walked);
                }
                Tree::Map(out)
            }
            Tree::Seq(items) => {
                let mut out = Vec::with_capacity(items.len());
                for (i, item) in items.iter().enumerate() {
                    path.push(Segment::Index(i));
                    out.push(walk(item, path, f));
                    path.pop();
                }
                Tree::Seq(out)
            }
            other => other.clone(),
        }
    }
    walk(tree, &mut TreePath::root(), f)
}

/// Drops mapping entries for which `keep` returns false, at every depth
pub fn retain_keys_deep<L, F>(tree: &Tree<L>, keep: &mut F) -> Tree<L>
where
    L: Clone,
    F: FnMut(&TreePath, &str, &Tree<L>) -> bool,
{
    fn walk<L, F>(tree: &Tree<L>, path: &mut TreePath, keep: &mut F) -> Tree<L>
    where
        L: Clone,
        F: FnMut(&TreePath, &str, &Tree<L>) -> bool,
    {
        match tree {
            Tree::Map(map) => {
                let mut out = IndexMap::with_capacity(map.len());
                for (key, value) in map {
                    if !keep(path, key, value) {
                        continue;
                    }
                    path.push(Segment::Key(key.clone()));
                    out.insert(key.clone(), walk(value, path, keep));
                    path.pop();
                }
                Tree::Map(out)
            }
            Tree::Seq(items) => {
                let mut out = Vec::with_capacity(items.len());
                for (i, item) in items.iter().enumerate() {
                    path.push(Segment::Index(i));
                    out.push(walk(item, path, keep));
                    path.pop();
                }
                Tree::Seq(out)
            }
            other => other.clone(),
        }
    }
    walk(tree, &mut TreePath::root(), keep)
}

/// Visits every node in pre-order with its path
pub fn deep_traverse<L, F>(tree: &Tree<L>, f: &mut F)
where
    F: FnMut(&TreePath, &Tree<L>),
{
    fn walk<L, F>(tree: &Tree<L>, path: &mut TreePath, f: &mut F)
    where
        F: FnMut(&TreePath, &Tree<L>),
    {
        f(path, tree);
        match tree {
            Tree::Map(map) => {
                for (key, value) in map {
                    path.push(Segment::Key(key.clone()));
                    walk(value, path, f);
                    path.pop();
                }
            }
            Tree::Seq(items) => {
                for (i, item) in items.iter().enumerate() {
                    path.push(Segment::Index(i));
                    walk(item, path, f);
                    path.pop();
                }
            }
            _ => {}
        }
    }
    walk(tree, &mut TreePath::root(), f)
}

/// Looks up a node by dotted path
pub fn get_path<'a, L>(tree: &'a Tree<L>, path: &str) -> Option<&'a Tree<L>> {
    let mut current = tree;
    for segment in TreePath::parse(path).segments() {
        current = match (segment, current) {
            (Segment::Key(k), Tree::Map(map)) => map.get(k)?,
            (Segment::Index(i), Tree::Seq(items)) => items.get(*i)?,
            (Segment::Index(i), Tree::Map(map)) => map.get(&i.to_string())?,
            _ => return None,
        };
    }
    Some(current)
}

/// Merges `source` into `target` in place.
///
/// Mappings merge key by key; every other node, opaque values and
/// sequences included, replaces the target node with a copy.
pub fn deep_merge<L: Clone>(target: &mut Tree<L>, source: &Tree<L>) {
    match (target, source) {
        (Tree::Map(into), Tree::Map(from)) => {
            for (key, value) in from {
                match into.get_mut(key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        into.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (slot, other) => *slot = other.clone(),
    }
}

/// True when any node in the tree satisfies `pred`
pub fn any_node<L, F>(tree: &Tree<L>, pred: &mut F) -> bool
where
    F: FnMut(&TreePath, &Tree<L>) -> bool,
{
    let mut found = false;
    deep_traverse(tree, &mut |path, node| {
        if !found && pred(path, node) {
            found = true;
        }
    });
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    type Plain = Tree<()>;

    #[test]
    fn test_deep_map_keys_reaches_nested_arrays() {
        let tree = Plain::from(json!({"refer": 1, "list": [{"refer": 2}]}));
        let renamed = deep_map_keys(&tree, &mut |k, _| {
            if k == "refer" { "ref".to_string() } else { k.to_string() }
        });
        assert_eq!(renamed.to_json(), Some(json!({"ref": 1, "list": [{"ref": 2}]})));
    }

    #[test]
    fn test_deep_map_values_passes_key() {
        let tree = Plain::from(json!({"a": 1, "b": [2, 3]}));
        let mut seen = Vec::new();
        let doubled = deep_map_values(&tree, &mut |node, key| {
            seen.push(key.map(str::to_string));
            Plain::from(node.as_f64().unwrap_or(0.0) * 2.0)
        });
        assert_eq!(doubled.to_json(), Some(json!({"a": 2.0, "b": [4.0, 6.0]})));
        assert_eq!(seen, vec![Some("a".to_string()), None, None]);
    }

    #[test]
    fn test_extend_with_context_injects_at_position() {
        let tree = Plain::from(json!({"owner": {"ref": "User"}, "rooms": [{"ref": "Room"}]}));
        let extended = extend_with_context(&tree, &mut |_, map| {
            if map.contains_key("ref") && !map.contains_key("type") {
                vec![("type".to_string(), Plain::from("ObjectId"))]
            } else {
                Vec::new()
            }
        });
        assert_eq!(
            extended.to_json(),
            Some(json!({
                "owner": {"ref": "User", "type": "ObjectId"},
                "rooms": [{"ref": "Room", "type": "ObjectId"}]
            }))
        );
    }

    #[test]
    fn test_extend_with_context_reports_paths() {
        let tree = Plain::from(json!({"a": {"b": [{}]}}));
        let mut paths = Vec::new();
        extend_with_context(&tree, &mut |path, _| {
            paths.push(path.to_string());
            Vec::new()
        });
        assert_eq!(paths, vec!["", "a", "a.b.0"]);
    }

    #[test]
    fn test_retain_keys_deep() {
        let tree = Plain::from(json!({"hidden": true, "x": {"hidden": ["y"], "y": 1}}));
        let stripped = retain_keys_deep(&tree, &mut |_, k, _| k != "hidden");
        assert_eq!(stripped.to_json(), Some(json!({"x": {"y": 1}})));
    }

    #[test]
    fn test_get_path() {
        let tree = Plain::from(json!({"rooms": [{"owner": {"ref": "User"}}]}));
        assert_eq!(
            get_path(&tree, "rooms.0.owner.ref").and_then(Tree::as_str),
            Some("User")
        );
        assert!(get_path(&tree, "rooms.1").is_none());
    }

    #[test]
    fn test_deep_merge_replaces_opaque_values() {
        let ts = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let mut target = Plain::from_pairs([
            ("when", Plain::from(ts)),
            ("nested", Plain::from(json!({"a": 1, "b": 2}))),
            ("list", Plain::from(json!([1, 2, 3]))),
        ]);
        let later = Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap();
        let source = Plain::from_pairs([
            ("when", Plain::from(later)),
            ("nested", Plain::from(json!({"b": 3}))),
            ("list", Plain::from(json!([9]))),
        ]);
        deep_merge(&mut target, &source);

        assert!(matches!(target.get("when"), Some(Tree::Timestamp(t)) if *t == later));
        assert_eq!(target.get("nested").unwrap().to_json(), Some(json!({"a": 1, "b": 3})));
        assert_eq!(target.get("list").unwrap().to_json(), Some(json!([9])));
    }

    #[test]
    fn test_clone_is_deep() {
        let original = Plain::from(json!({"a": {"b": 1}}));
        let mut copy = original.clone();
        deep_merge(&mut copy, &Plain::from(json!({"a": {"b": 2}})));
        assert_eq!(original.to_json(), Some(json!({"a": {"b": 1}})));
    }

    #[test]
    fn test_any_node() {
        let tree = Plain::from(json!({"a": [{"subdoc": true}]}));
        assert!(any_node(&tree, &mut |_, node| node.has_key("subdoc")));
        assert!(!any_node(&tree, &mut |_, node| node.has_key("ref")));
    }
}
