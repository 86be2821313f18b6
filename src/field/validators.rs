//! Validator normalization
//!
//! The four accepted `validate` shapes become one list of
//! [`ValidatorDescriptor`]s whose functions are bound to the owning model:
//!
//! - `fn`
//! - `[fn, message]`
//! - `{validator: fn, message}`
//! - `[{validator: fn, message}, ...]`

use crate::model::{bind_validator, ModelSlot};
use crate::schema::{keys, Declaration, Marker, OdmError, OdmResult, ValidatorFn};
use crate::store::ValidatorDescriptor;
use crate::tree::Tree;

/// Normalizes the value of a `validate` key
pub(crate) fn normalize_validators(
    model: &str,
    field: &str,
    node: &Declaration,
    slot: &ModelSlot,
) -> OdmResult<Vec<ValidatorDescriptor>> {
    let describe = |f: &ValidatorFn, message: Option<&str>| {
        ValidatorDescriptor::new(bind_validator(slot, f.clone()), message.map(str::to_string))
    };

    match node {
        Tree::Leaf(Marker::Validator(f)) => Ok(vec![describe(f, None)]),
        Tree::Leaf(Marker::Validators(list)) => Ok(list.clone()),
        Tree::Seq(items) => match items.as_slice() {
            [Tree::Leaf(Marker::Validator(f)), Tree::String(message)] => {
                Ok(vec![describe(f, Some(message))])
            }
            _ => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(object_form(model, field, item, &describe)?);
                }
                Ok(out)
            }
        },
        Tree::Map(_) => Ok(vec![object_form(model, field, node, &describe)?]),
        other => Err(OdmError::malformed_declaration(
            model,
            field,
            format!("unsupported validate value {}", other),
        )),
    }
}

fn object_form(
    model: &str,
    field: &str,
    node: &Declaration,
    describe: &dyn Fn(&ValidatorFn, Option<&str>) -> ValidatorDescriptor,
) -> OdmResult<ValidatorDescriptor> {
    match node.get(keys::VALIDATOR) {
        Some(Tree::Leaf(Marker::Validator(f))) => {
            Ok(describe(f, node.get(keys::MESSAGE).and_then(Tree::as_str)))
        }
        _ => Err(OdmError::malformed_declaration(
            model,
            field,
            "validate entries must be {validator, message} objects",
        )),
    }
}

/// Replaces the `validate` entry of a descriptor (or of the element of an
/// array descriptor) with its normalized form
pub(crate) fn wrap_validators(
    model: &str,
    field: &str,
    tree: Declaration,
    slot: &ModelSlot,
) -> OdmResult<Declaration> {
    match tree {
        Tree::Map(mut map) => {
            if let Some(node) = map.get(keys::VALIDATE) {
                let list = normalize_validators(model, field, node, slot)?;
                map.insert(keys::VALIDATE.to_string(), Tree::Leaf(Marker::Validators(list)));
            }
            Ok(Tree::Map(map))
        }
        Tree::Seq(items) if items.len() == 1 => {
            let element = items.into_iter().next().unwrap_or_default();
            Ok(Tree::array_of(wrap_validators(model, field, element, slot)?))
        }
        other => Ok(other),
    }
}
