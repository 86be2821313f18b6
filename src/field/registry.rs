//! `declare_field`: one field declaration into both metadata forms

use crate::model::ModelSlot;
use crate::observability::{log_event_with_fields, Event};
use crate::schema::{keys, Declaration, Marker, ModelRef, OdmError, OdmResult};
use crate::tree::Tree;

use super::hint::Hint;
use super::metadata::ModelMetadata;
use super::normalize::{descriptor_form, inject_identifier_type, normalize_aliases};
use super::reference::{check_references, reference_target, rewrite_references, strip_hidden_keys};
use super::subdoc::{check_subdoc_array, is_subdoc, process_subdoc};
use super::validators::wrap_validators;

/// What field processing needs to know about the model being defined
pub(crate) struct FieldContext<'a> {
    pub(crate) model: &'static str,
    /// Owner that bound validators resolve to at call time
    pub(crate) slot: &'a ModelSlot,
    /// Accepts model references that are mapped (or being mapped)
    pub(crate) resolve: &'a dyn Fn(&ModelRef) -> bool,
}

/// Engine-facing and raw forms of one field
#[derive(Debug, Clone)]
pub(crate) struct Processed {
    pub(crate) driver: Declaration,
    pub(crate) raw: Declaration,
}

/// Normalizes `declaration` and records it under `field`.
///
/// `hint` stands in for the field's static type when the declaration
/// names none.
pub(crate) fn declare_field(
    ctx: &FieldContext<'_>,
    metadata: &mut ModelMetadata,
    field: &str,
    declaration: Declaration,
    hint: &Hint,
) -> OdmResult<()> {
    let (normalized, used_alias) = normalize_aliases(&declaration);
    if used_alias {
        log_event_with_fields(
            Event::DeprecatedAlias,
            &[
                ("model", ctx.model),
                ("field", field),
                ("alias", keys::REFER),
                ("use", keys::REF),
            ],
        );
    }
    let tree = inject_identifier_type(&descriptor_form(ctx.model, field, normalized)?);
    check_subdoc_array(ctx.model, field, &tree)?;

    let (processed, kind) = if is_subdoc(&tree) {
        (process_subdoc(ctx, field, tree)?, "subdoc")
    } else {
        let processed = process_scalar(ctx, field, tree, hint)?;
        let kind = if reference_target(&processed.raw).is_some() {
            "reference"
        } else {
            "scalar"
        };
        (processed, kind)
    };
    metadata.insert_field(field, processed.driver, processed.raw);
    log_event_with_fields(
        Event::FieldDeclared,
        &[("model", ctx.model), ("field", field), ("kind", kind)],
    );
    Ok(())
}

fn process_scalar(
    ctx: &FieldContext<'_>,
    field: &str,
    tree: Declaration,
    hint: &Hint,
) -> OdmResult<Processed> {
    let tree = wrap_validators(ctx.model, field, tree, ctx.slot)?;
    let tree = if has_type(&tree) {
        tree
    } else {
        apply_hint(ctx.model, field, tree, hint)?
    };
    require_type(ctx.model, field, &tree)?;
    check_references(ctx.model, field, &tree, ctx.resolve)?;
    Ok(Processed {
        driver: strip_hidden_keys(&rewrite_references(&tree)),
        raw: tree,
    })
}

fn has_type(tree: &Declaration) -> bool {
    match tree {
        Tree::Map(map) if map.is_empty() => false,
        Tree::Map(map) => {
            let is_descriptor = map
                .keys()
                .any(|k| keys::DESCRIPTOR_KEYS.contains(&k.as_str()));
            // a mapping without descriptor keys is a nested object of fields
            !is_descriptor || map.contains_key(keys::TYPE) || map.contains_key(keys::REF)
        }
        Tree::Seq(items) => items.first().map_or(false, has_type),
        Tree::Leaf(Marker::Type(_)) | Tree::String(_) => true,
        _ => false,
    }
}

/// Rejects any leaf of a declaration that names no storage type.
///
/// Nested plain objects are walked so the error names the full path
/// (`address.city`); sub-documents are checked when they are compiled.
pub(crate) fn require_type(model: &str, field: &str, tree: &Declaration) -> OdmResult<()> {
    match tree {
        Tree::Map(map) if map.is_empty() => Err(OdmError::type_not_set(model, field)),
        Tree::Map(map) => {
            if is_subdoc(tree) {
                return Ok(());
            }
            let is_descriptor = map
                .keys()
                .any(|k| keys::DESCRIPTOR_KEYS.contains(&k.as_str()));
            if is_descriptor {
                return if map.contains_key(keys::TYPE) || map.contains_key(keys::REF) {
                    Ok(())
                } else {
                    Err(OdmError::type_not_set(model, field))
                };
            }
            map.iter().try_for_each(|(key, child)| {
                require_type(model, &format!("{}.{}", field, key), child)
            })
        }
        // an empty array holds mixed values
        Tree::Seq(items) => items
            .first()
            .map_or(Ok(()), |element| require_type(model, field, element)),
        Tree::Leaf(Marker::Type(_) | Marker::Model(_) | Marker::Schema(_)) | Tree::String(_) => Ok(()),
        _ => Err(OdmError::type_not_set(model, field)),
    }
}

fn apply_hint(model: &str, field: &str, tree: Declaration, hint: &Hint) -> OdmResult<Declaration> {
    let mut entries = match tree {
        Tree::Map(map) => map,
        Tree::Seq(items) => {
            let element = items.into_iter().next().unwrap_or_else(Tree::map);
            let inner = match hint {
                Hint::Array(inner) => inner.as_ref(),
                other => other,
            };
            return Ok(Tree::array_of(apply_hint(model, field, element, inner)?));
        }
        _ => Default::default(),
    };
    match hint {
        Hint::None => return Err(OdmError::type_not_set(model, field)),
        Hint::Type(t) => {
            entries.insert(keys::TYPE.to_string(), Tree::Leaf(Marker::Type(*t)));
        }
        Hint::Model(target) => {
            entries.insert(keys::REF.to_string(), Tree::Leaf(Marker::Model(*target)));
            entries.insert(
                keys::TYPE.to_string(),
                Tree::Leaf(Marker::Type(crate::schema::FieldType::ObjectId)),
            );
        }
        Hint::Array(inner) => {
            return Ok(Tree::array_of(apply_hint(model, field, Tree::Map(entries), inner)?));
        }
    }
    Ok(Tree::Map(entries))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::hint::{hint_of, Ref};
    use crate::schema::{array_of, typed, Field, FieldType, OdmErrorCode, Subdoc};
    use crate::tree::get_path;

    crate::model::test_support::dummy_model!(Person, "Person");

    fn declare(
        metadata: &mut ModelMetadata,
        field: &str,
        declaration: Declaration,
        hint: Hint,
    ) -> OdmResult<()> {
        let slot = ModelSlot::new();
        let resolve = |target: &ModelRef| target.name() == "Person";
        let ctx = FieldContext {
            model: "Post",
            slot: &slot,
            resolve: &resolve,
        };
        declare_field(&ctx, metadata, field, declaration, &hint)
    }

    #[test]
    fn test_hint_supplies_type() {
        let mut metadata = ModelMetadata::new();
        declare(&mut metadata, "title", Field::new().required().build(), hint_of::<String>()).unwrap();
        declare(&mut metadata, "tags", Field::new().build(), hint_of::<Vec<String>>()).unwrap();

        let title = metadata.property("title").unwrap();
        assert_eq!(title.get(keys::TYPE), Some(&typed(FieldType::String)));
        assert_eq!(title.get(keys::REQUIRED).and_then(Tree::as_bool), Some(true));
        let tags = metadata.property("tags").unwrap();
        assert_eq!(tags.as_seq().unwrap()[0].get(keys::TYPE), Some(&typed(FieldType::String)));
    }

    #[test]
    fn test_type_not_set() {
        let mut metadata = ModelMetadata::new();
        let err = declare(&mut metadata, "mystery", Field::new().build(), Hint::None).unwrap_err();
        assert_eq!(err.code(), OdmErrorCode::TypeNotSet);
        assert_eq!(err.field(), Some("mystery"));
        assert!(metadata.property("mystery").is_none());
    }

    #[test]
    fn test_nested_object_leaf_needs_type() {
        let mut metadata = ModelMetadata::new();
        let address = Tree::from_pairs([
            ("street", typed(FieldType::String)),
            ("city", Field::new().required().build()),
        ]);
        let err = declare(&mut metadata, "address", address, Hint::None).unwrap_err();
        assert_eq!(err.code(), OdmErrorCode::TypeNotSet);
        assert_eq!(err.field(), Some("address.city"));

        let typed_address = Tree::from_pairs([("city", Field::string().required().build())]);
        declare(&mut metadata, "address", typed_address, Hint::None).unwrap();
    }

    #[test]
    fn test_reference_from_hint() {
        let mut metadata = ModelMetadata::new();
        declare(&mut metadata, "creator", Field::new().build(), hint_of::<Ref<Person>>()).unwrap();
        let driver = metadata.property("creator").unwrap();
        assert_eq!(driver.get(keys::REF).and_then(Tree::as_str), Some("Person"));
        assert_eq!(driver.get(keys::TYPE), Some(&typed(FieldType::ObjectId)));
        let raw = metadata.raw("creator").unwrap();
        assert!(matches!(raw.get(keys::REF), Some(Tree::Leaf(Marker::Model(_)))));
    }

    #[test]
    fn test_refer_alias_matches_ref() {
        let mut metadata = ModelMetadata::new();
        let person = Tree::Leaf(Marker::Model(ModelRef::of::<Person>()));
        declare(&mut metadata, "a", Tree::from_pairs([(keys::REFER, person.clone())]), Hint::None).unwrap();
        declare(&mut metadata, "b", Tree::from_pairs([(keys::REF, person)]), Hint::None).unwrap();
        assert_eq!(metadata.property("a"), metadata.property("b"));
    }

    #[test]
    fn test_unresolved_reference_rejected() {
        crate::model::test_support::dummy_model!(Ghost, "Ghost");
        let mut metadata = ModelMetadata::new();
        let err = declare(&mut metadata, "ghost", Field::new().build(), hint_of::<Ref<Ghost>>()).unwrap_err();
        assert_eq!(err.code(), OdmErrorCode::UnresolvedReference);
    }

    #[test]
    fn test_nested_reference_in_subdoc_array() {
        let mut metadata = ModelMetadata::new();
        let rooms = Subdoc::new()
            .field("name", typed(FieldType::String))
            .field("owner", Field::reference::<Person>())
            .array();
        declare(&mut metadata, "rooms", rooms, Hint::None).unwrap();

        let raw = metadata.raw("rooms").unwrap();
        assert!(matches!(
            get_path(raw, "0.owner.ref"),
            Some(Tree::Leaf(Marker::Model(_)))
        ));
        assert_eq!(
            get_path(raw, "0.owner.type"),
            Some(&typed(FieldType::ObjectId))
        );
        let Some([Tree::Leaf(Marker::Schema(room))]) = metadata.property("rooms").and_then(Tree::as_seq) else {
            panic!("expected compiled room schema");
        };
        assert_eq!(room.reference_for("owner"), Some("Person"));
    }

    #[test]
    fn test_hidden_scalar_keeps_flag_in_raw_only() {
        let mut metadata = ModelMetadata::new();
        declare(&mut metadata, "secret", Field::string().hidden().build(), Hint::None).unwrap();
        assert!(!metadata.property("secret").unwrap().has_key(keys::HIDDEN));
        assert!(metadata.raw("secret").unwrap().has_key(keys::HIDDEN));
    }

    #[test]
    fn test_array_reference_shape() {
        let mut metadata = ModelMetadata::new();
        let person = Tree::Leaf(Marker::Model(ModelRef::of::<Person>()));
        declare(&mut metadata, "likes", array_of(person), Hint::None).unwrap();
        let driver = metadata.property("likes").unwrap();
        let raw = metadata.raw("likes").unwrap();
        assert_eq!(driver.as_seq().map(<[_]>::len), Some(1));
        assert_eq!(raw.as_seq().map(<[_]>::len), Some(1));
        assert_eq!(reference_target(raw).map(|(t, many)| (t.name(), many)), Some(("Person", true)));
    }
}
