//! Reference rewriting and resolution
//!
//! The raw form of a declaration keeps [`ModelRef`] leaves so accessors
//! can rehydrate related records later; the engine form carries the
//! target's canonical name instead.

use crate::schema::{keys, Declaration, Marker, ModelRef, OdmError, OdmResult};
use crate::tree::{deep_map_values, deep_traverse, retain_keys_deep, Tree};

/// Fails on the first model leaf that `resolve` does not accept
pub(crate) fn check_references(
    model: &str,
    field: &str,
    tree: &Declaration,
    resolve: &dyn Fn(&ModelRef) -> bool,
) -> OdmResult<()> {
    let mut unresolved: Option<&'static str> = None;
    deep_traverse(tree, &mut |_, node| {
        if let Tree::Leaf(Marker::Model(target)) = node {
            if unresolved.is_none() && !resolve(target) {
                unresolved = Some(target.name());
            }
        }
    });
    match unresolved {
        Some(target) => Err(OdmError::unresolved_reference(model, field, target)),
        None => Ok(()),
    }
}

/// Replaces every model leaf with the target's name
pub(crate) fn rewrite_references(tree: &Declaration) -> Declaration {
    deep_map_values(tree, &mut |node, _| match node {
        Tree::Leaf(Marker::Model(target)) => Tree::String(target.name().to_string()),
        other => other.clone(),
    })
}

/// Drops `hidden` annotations at every depth
pub(crate) fn strip_hidden_keys(tree: &Declaration) -> Declaration {
    retain_keys_deep(tree, &mut |_, key, value| {
        !(key == keys::HIDDEN && matches!(value, Tree::Bool(_) | Tree::Seq(_)))
    })
}

/// Target of a raw field declared as a reference, and whether it is an
/// array of references
pub(crate) fn reference_target(raw: &Declaration) -> Option<(ModelRef, bool)> {
    fn direct(node: &Declaration) -> Option<ModelRef> {
        match node.get(keys::REF) {
            Some(Tree::Leaf(Marker::Model(target))) => Some(*target),
            _ => None,
        }
    }
    match raw {
        Tree::Seq(items) if items.len() == 1 => direct(&items[0]).map(|t| (t, true)),
        other => direct(other).map(|t| (t, false)),
    }
}

/// True when a raw field is itself marked `hidden: true`
pub(crate) fn declares_hidden(raw: &Declaration) -> bool {
    let node = match raw {
        Tree::Seq(items) if items.len() == 1 => &items[0],
        other => other,
    };
    node.get(keys::HIDDEN).and_then(Tree::as_bool).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{array_of, typed, FieldType, OdmErrorCode};
    use crate::tree::get_path;

    crate::model::test_support::dummy_model!(Person, "Person");

    fn person() -> Declaration {
        Tree::Leaf(Marker::Model(ModelRef::of::<Person>()))
    }

    fn nested() -> Declaration {
        Tree::from_pairs([(
            "rooms",
            array_of(Tree::from_pairs([
                ("owner", Tree::from_pairs([(keys::REF, person()), (keys::TYPE, typed(FieldType::ObjectId))])),
                ("hidden", Tree::Bool(true)),
            ])),
        )])
    }

    #[test]
    fn test_rewrite_is_positional_and_idempotent() {
        let raw = nested();
        let driver = rewrite_references(&raw);
        assert_eq!(
            get_path(&driver, "rooms.0.owner.ref").and_then(Tree::as_str),
            Some("Person")
        );
        assert!(matches!(
            get_path(&raw, "rooms.0.owner.ref"),
            Some(Tree::Leaf(Marker::Model(_)))
        ));
        assert_eq!(rewrite_references(&driver), driver);
    }

    #[test]
    fn test_unresolved_reference() {
        let err = check_references("House", "rooms", &nested(), &|_| false).unwrap_err();
        assert_eq!(err.code(), OdmErrorCode::UnresolvedReference);
        assert!(err.message().contains("Person"));
        assert!(check_references("House", "rooms", &nested(), &|_| true).is_ok());
    }

    #[test]
    fn test_strip_hidden_keys() {
        let stripped = strip_hidden_keys(&nested());
        assert!(get_path(&stripped, "rooms.0.hidden").is_none());
        assert!(get_path(&stripped, "rooms.0.owner").is_some());
    }

    #[test]
    fn test_reference_target() {
        let single = Tree::from_pairs([(keys::REF, person())]);
        let (target, many) = reference_target(&single).unwrap();
        assert_eq!(target.name(), "Person");
        assert!(!many);
        assert!(reference_target(&array_of(single)).unwrap().1);
        assert!(reference_target(&typed(FieldType::String)).is_none());
    }

    #[test]
    fn test_declares_hidden() {
        let hidden = Tree::from_pairs([(keys::TYPE, typed(FieldType::String)), (keys::HIDDEN, Tree::Bool(true))]);
        assert!(declares_hidden(&hidden));
        assert!(declares_hidden(&array_of(hidden)));
        assert!(!declares_hidden(&typed(FieldType::String)));
    }
}
