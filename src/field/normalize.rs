//! Declaration normalization
//!
//! Applied to every field before it is branched into sub-document or
//! scalar processing:
//!
//! 1. `refer` keys become `ref`, at every depth
//! 2. Shorthands become descriptor maps (`User` becomes `{ref: User}`,
//!    `{type: User}` becomes `{ref: User}`, `asArray` becomes `[{...}]`)
//! 3. Every mapping holding `ref` without `type` gets `type: ObjectId`
//!    injected at that same position

use indexmap::IndexMap;

use crate::schema::{keys, Declaration, FieldType, Marker, OdmError, OdmResult};
use crate::tree::{deep_map_keys, extend_with_context, Tree};

/// Rewrites `refer` to `ref` everywhere; the flag reports whether the
/// deprecated spelling was seen
pub(crate) fn normalize_aliases(tree: &Declaration) -> (Declaration, bool) {
    let mut used_alias = false;
    let normalized = deep_map_keys(tree, &mut |key, _| {
        if key == keys::REFER {
            used_alias = true;
            keys::REF.to_string()
        } else {
            key.to_string()
        }
    });
    (normalized, used_alias)
}

/// True for a node naming a model: a bare model leaf or a map with `ref`
pub(crate) fn is_reference_node(node: &Declaration) -> bool {
    match node {
        Tree::Leaf(Marker::Model(_)) => true,
        Tree::Map(map) => map.contains_key(keys::REF),
        _ => false,
    }
}

/// Expands shorthands into descriptor maps at the top of a field
pub(crate) fn descriptor_form(model: &str, field: &str, tree: Declaration) -> OdmResult<Declaration> {
    match tree {
        Tree::Leaf(Marker::Type(t)) => Ok(single(keys::TYPE, Tree::Leaf(Marker::Type(t)))),
        Tree::Leaf(Marker::Model(target)) => Ok(single(keys::REF, Tree::Leaf(Marker::Model(target)))),
        Tree::Seq(items) => {
            if items.len() != 1 {
                if items.iter().any(is_reference_node) {
                    return Err(OdmError::invalid_reference_array(model, field, items.len()));
                }
                return Ok(Tree::Seq(items));
            }
            let element = items.into_iter().next().unwrap_or_default();
            Ok(Tree::array_of(descriptor_form(model, field, element)?))
        }
        Tree::Map(map) => map_form(model, field, map),
        other => Ok(other),
    }
}

fn single(key: &str, value: Declaration) -> Declaration {
    Tree::from_pairs([(key, value)])
}

fn map_form(model: &str, field: &str, mut map: IndexMap<String, Declaration>) -> OdmResult<Declaration> {
    if map.get(keys::AS_ARRAY).and_then(Tree::as_bool).unwrap_or(false) {
        map.shift_remove(keys::AS_ARRAY);
        return Ok(Tree::array_of(map_form(model, field, map)?));
    }
    map.shift_remove(keys::AS_ARRAY);

    // {type: User} names a model through the type slot
    if let Some(Tree::Leaf(Marker::Model(target))) = map.get(keys::TYPE) {
        let target = *target;
        rename_key(&mut map, keys::TYPE, keys::REF, Tree::Leaf(Marker::Model(target)));
    }

    // {type: [User]} and {ref: [User]} are arrays of references
    for key in [keys::TYPE, keys::REF] {
        let element = match map.get(key) {
            Some(Tree::Seq(items)) if items.iter().any(is_reference_node) => {
                if items.len() != 1 {
                    return Err(OdmError::invalid_reference_array(model, field, items.len()));
                }
                items[0].clone()
            }
            _ => continue,
        };
        let target = match element {
            Tree::Map(inner) => return Ok(Tree::array_of(map_form(model, field, inner)?)),
            Tree::Leaf(Marker::Model(target)) => target,
            _ => continue,
        };
        rename_key(&mut map, key, keys::REF, Tree::Leaf(Marker::Model(target)));
        return Ok(Tree::array_of(Tree::Map(map)));
    }
    Ok(Tree::Map(map))
}

/// Replaces `from` by `to: value`, keeping the entry's position
fn rename_key(map: &mut IndexMap<String, Declaration>, from: &str, to: &str, value: Declaration) {
    match map.get_index_of(from) {
        Some(index) => {
            map.shift_remove(from);
            map.shift_remove(to);
            let index = index.min(map.len());
            map.shift_insert(index, to.to_string(), value);
        }
        None => {
            map.insert(to.to_string(), value);
        }
    }
}

/// Injects `type: ObjectId` next to every `ref` that has no type
pub(crate) fn inject_identifier_type(tree: &Declaration) -> Declaration {
    extend_with_context(tree, &mut |_, entries| {
        if entries.contains_key(keys::REF) && !entries.contains_key(keys::TYPE) {
            vec![(keys::TYPE.to_string(), Tree::Leaf(Marker::Type(FieldType::ObjectId)))]
        } else {
            Vec::new()
        }
    })
}
