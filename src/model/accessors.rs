//! Accessor table
//!
//! Built once per model from the raw field tree, before the schema is
//! compiled. Every declared path, at every sub-document depth, maps to
//! how a read through the typed wrapper treats its value.

use indexmap::IndexMap;

use crate::field::{is_subdoc, reference_target};
use crate::schema::{keys, Declaration, ModelRef};
use crate::tree::{join_path, Tree, TreePath};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessorKind {
    /// Returned as stored
    Plain,
    /// Populated records are rehydrated as instances of `target`
    Reference { target: ModelRef, many: bool },
    /// Returned as handles scoped to the owning record
    Subdocument { many: bool },
}

/// Accessors keyed by schema path (`rooms.owner`, never `rooms.0.owner`)
#[derive(Debug, Clone, Default)]
pub struct AccessorTable {
    entries: IndexMap<String, AccessorKind>,
}

impl AccessorTable {
    pub fn build(raw: &IndexMap<String, Declaration>) -> Self {
        let mut table = Self::default();
        table.collect("", raw);
        table
    }

    fn collect(&mut self, prefix: &str, fields: &IndexMap<String, Declaration>) {
        for (name, node) in fields {
            let path = join_path(prefix, name);
            if is_subdoc(node) {
                let (body, many) = match node {
                    Tree::Seq(items) => (&items[0], true),
                    other => (other, false),
                };
                self.entries
                    .insert(path.clone(), AccessorKind::Subdocument { many });
                if let Some(children) = body.as_map() {
                    let children: IndexMap<String, Declaration> = children
                        .iter()
                        .filter(|(key, value)| !is_subdoc_flag(key, value))
                        .map(|(key, value)| (key.clone(), value.clone()))
                        .collect();
                    self.collect(&path, &children);
                }
            } else if let Some((target, many)) = reference_target(node) {
                self.entries
                    .insert(path, AccessorKind::Reference { target, many });
            } else {
                self.entries.insert(path.clone(), AccessorKind::Plain);
                if let Some(children) = nested_object(node) {
                    self.collect(&path, children);
                }
            }
        }
    }

    /// Accessor for a document path; array indices are ignored
    pub fn get(&self, path: &str) -> Option<AccessorKind> {
        self.entries
            .get(&TreePath::parse(path).schema_path())
            .copied()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn is_subdoc_flag(key: &str, value: &Declaration) -> bool {
    match key {
        keys::SUBDOC => true,
        keys::HIDDEN => !value.is_map(),
        _ => false,
    }
}

/// Plain nested object: a mapping that is not itself a field descriptor
fn nested_object(node: &Declaration) -> Option<&IndexMap<String, Declaration>> {
    let map = node.as_map()?;
    let descriptor = map.contains_key(keys::TYPE) || map.contains_key(keys::REF);
    if descriptor || map.is_empty() || !map.values().all(|v| v.is_map() || v.is_seq()) {
        return None;
    }
    Some(map)
}
