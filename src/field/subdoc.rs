//! Sub-document processing
//!
//! A field marked `subdoc` is compiled into its own child schema,
//! recursively. The engine form holds the compiled schema; the raw form
//! keeps the normalized declaration (model references, `subdoc` and
//! `hidden` flags) so accessors can be built for every nesting depth.

use std::sync::Arc;

use indexmap::IndexMap;

use crate::observability::{log_event_with_fields, Event};
use crate::schema::{keys, Declaration, Marker, OdmError, OdmResult, SchemaOptions};
use crate::store::Schema;
use crate::tree::Tree;

use super::normalize::{descriptor_form, inject_identifier_type};
use super::reference::{check_references, declares_hidden, rewrite_references, strip_hidden_keys};
use super::registry::{require_type, FieldContext, Processed};
use super::validators::wrap_validators;

fn marks_subdoc(node: &Declaration) -> bool {
    !matches!(node.get(keys::SUBDOC), None | Some(Tree::Bool(false)))
}

/// True for `{subdoc, ...}` and `[{subdoc, ...}]`
pub(crate) fn is_subdoc(tree: &Declaration) -> bool {
    match tree {
        Tree::Seq(items) if items.len() == 1 => marks_subdoc(&items[0]),
        other => marks_subdoc(other),
    }
}

/// Rejects a sub-document marker inside an array of other than one element
pub(crate) fn check_subdoc_array(model: &str, field: &str, tree: &Declaration) -> OdmResult<()> {
    match tree {
        Tree::Seq(items) if items.len() != 1 && items.iter().any(marks_subdoc) => {
            Err(OdmError::invalid_subdoc_array(model, field, items.len()))
        }
        _ => Ok(()),
    }
}

pub(crate) fn process_subdoc(
    ctx: &FieldContext<'_>,
    field: &str,
    tree: Declaration,
) -> OdmResult<Processed> {
    let (descriptor, many) = match tree {
        Tree::Seq(items) => (items.into_iter().next().unwrap_or_default(), true),
        other => (other, false),
    };
    let Tree::Map(entries) = descriptor else {
        return Err(OdmError::malformed_declaration(
            ctx.model,
            field,
            "sub-document must be a mapping of fields",
        ));
    };

    let options = entries
        .get(keys::SUBDOC)
        .map(SchemaOptions::from_declaration)
        .unwrap_or_default();
    let mut hide: Vec<String> = match entries.get(keys::HIDDEN) {
        Some(Tree::Seq(names)) => names
            .iter()
            .filter_map(Tree::as_str)
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    };

    let mut raw = IndexMap::with_capacity(entries.len());
    let mut body = IndexMap::with_capacity(entries.len());
    for (key, child) in entries {
        if key == keys::SUBDOC || key == keys::HIDDEN {
            raw.insert(key, child);
            continue;
        }
        let child_field = format!("{}.{}", field, key);
        let child = inject_identifier_type(&descriptor_form(ctx.model, &child_field, child)?);
        check_subdoc_array(ctx.model, &child_field, &child)?;

        let processed = if is_subdoc(&child) {
            process_subdoc(ctx, &child_field, child)?
        } else {
            require_type(ctx.model, &child_field, &child)?;
            check_references(ctx.model, &child_field, &child, ctx.resolve)?;
            let wrapped = wrap_validators(ctx.model, &child_field, child, ctx.slot)?;
            Processed {
                driver: strip_hidden_keys(&rewrite_references(&wrapped)),
                raw: wrapped,
            }
        };
        if declares_hidden(&processed.raw) && !hide.contains(&key) {
            hide.push(key.clone());
        }
        body.insert(key.clone(), processed.driver);
        raw.insert(key, processed.raw);
    }

    let mut schema = Schema::compile_child(&Tree::Map(body), &options)
        .map_err(|e| OdmError::malformed_declaration(ctx.model, field, e))?;
    for name in hide {
        schema.hide(name);
    }
    let raw = Tree::Map(raw);
    schema.attach_raw(raw.clone());
    log_event_with_fields(
        Event::SubdocCompiled,
        &[
            ("model", ctx.model),
            ("field", field),
            ("paths", &schema.path_names().len().to_string()),
        ],
    );

    let handle = Tree::Leaf(Marker::Schema(Arc::new(schema)));
    Ok(if many {
        Processed {
            driver: Tree::array_of(handle),
            raw: Tree::array_of(raw),
        }
    } else {
        Processed { driver: handle, raw }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ModelSlot;
    use crate::schema::{typed, Field, FieldType, OdmErrorCode, Subdoc};

    fn ctx<'a>(slot: &'a ModelSlot, resolve: &'a dyn Fn(&crate::schema::ModelRef) -> bool) -> FieldContext<'a> {
        FieldContext {
            model: "Car",
            slot,
            resolve,
        }
    }

    #[test]
    fn test_detection() {
        let single = Subdoc::new().field("make", typed(FieldType::String)).build();
        assert!(is_subdoc(&single));
        assert!(is_subdoc(&Tree::array_of(single.clone())));
        assert!(!is_subdoc(&typed(FieldType::String)));

        let err = check_subdoc_array("Car", "parts", &Tree::Seq(vec![single.clone(), single])).unwrap_err();
        assert_eq!(err.code(), OdmErrorCode::InvalidSubdocArray);
    }

    #[test]
    fn test_compiles_child_schema_and_keeps_raw() {
        let slot = ModelSlot::new();
        let resolve = |_: &crate::schema::ModelRef| true;
        let decl = Subdoc::new()
            .field("cylinders", typed(FieldType::Number))
            .field("serial", typed(FieldType::String))
            .hide(["serial"])
            .build();
        let processed = process_subdoc(&ctx(&slot, &resolve), "engine", decl).unwrap();

        let Tree::Leaf(Marker::Schema(child)) = &processed.driver else {
            panic!("expected a compiled child schema");
        };
        assert!(child.has_path("cylinders"));
        assert_eq!(child.hidden(), ["serial".to_string()]);
        assert!(child.raw().unwrap().has_key(keys::SUBDOC));
        assert!(processed.raw.has_key(keys::SUBDOC));
        assert!(processed.raw.has_key("cylinders"));
    }

    #[test]
    fn test_untyped_child_rejected() {
        let slot = ModelSlot::new();
        let resolve = |_: &crate::schema::ModelRef| true;
        let decl = Subdoc::new()
            .field("name", typed(FieldType::String))
            .field("price", Field::new().required())
            .array();
        let err = process_subdoc(&ctx(&slot, &resolve), "items", decl).unwrap_err();
        assert_eq!(err.code(), OdmErrorCode::TypeNotSet);
        assert_eq!(err.field(), Some("items.price"));
    }

    #[test]
    fn test_nested_subdoc_array() {
        let slot = ModelSlot::new();
        let resolve = |_: &crate::schema::ModelRef| true;
        let inner = Subdoc::new().field("watts", typed(FieldType::Number)).hidden().array();
        let decl = Subdoc::new().field("name", typed(FieldType::String)).field("lights", inner).array();
        let processed = process_subdoc(&ctx(&slot, &resolve), "rooms", decl).unwrap();

        let Some([Tree::Leaf(Marker::Schema(room))]) = processed.driver.as_seq() else {
            panic!("expected an array of child schemas");
        };
        assert!(room.has_path("lights.watts"));
        assert_eq!(room.hidden(), ["lights".to_string()]);
        let raw_lights = &processed.raw.as_seq().unwrap()[0].get("lights").unwrap();
        assert!(is_subdoc(raw_lights));
    }
}
