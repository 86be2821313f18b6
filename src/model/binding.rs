//! Late binding of user functions to their owning model
//!
//! Validators and hooks are declared before the model they belong to is
//! compiled. Each builder hands out a [`ModelSlot`] that is filled once
//! registration succeeds; bound functions read it at call time to wrap
//! the engine document in an [`Instance`].

use std::fmt;
use std::sync::{Arc, OnceLock, Weak};

use crate::method::HookFn;
use crate::record::Instance;
use crate::schema::ValidatorFn;
use crate::store::{DocHook, DocValidator, Document};

use super::compiled::CompiledModel;

/// Write-once pointer to a compiled model.
///
/// Holds the model weakly; the registry owns it.
#[derive(Clone, Default)]
pub struct ModelSlot(Arc<OnceLock<Weak<CompiledModel>>>);

impl ModelSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// The compiled model, once registered and while still registered
    pub fn get(&self) -> Option<Arc<CompiledModel>> {
        self.0.get().and_then(Weak::upgrade)
    }

    pub fn is_filled(&self) -> bool {
        self.0.get().is_some()
    }

    /// Returns false if the slot was already filled
    pub(crate) fn fill(&self, model: &Arc<CompiledModel>) -> bool {
        self.0.set(Arc::downgrade(model)).is_ok()
    }

    fn instance_for(&self, doc: &Document) -> Instance {
        Instance::bound(self.get(), doc.clone())
    }
}

impl fmt::Debug for ModelSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.get() {
            Some(model) => write!(f, "ModelSlot({})", model.name()),
            None => write!(f, "ModelSlot(<empty>)"),
        }
    }
}

/// Adapts a user validator to the engine's document-level signature
pub(crate) fn bind_validator(slot: &ModelSlot, f: ValidatorFn) -> DocValidator {
    let slot = slot.clone();
    match f {
        ValidatorFn::Sync(f) => {
            DocValidator::sync(move |doc, value| f(&slot.instance_for(doc), value))
        }
        ValidatorFn::Callback(f) => DocValidator::callback(move |doc, value, done| {
            f(&slot.instance_for(doc), value, done)
        }),
    }
}

/// Adapts a user hook to the engine's document-level signature
pub(crate) fn bind_hook(slot: &ModelSlot, f: HookFn) -> DocHook {
    let slot = slot.clone();
    match f {
        HookFn::Sync(f) => DocHook::sync(move |doc| f(&slot.instance_for(doc))),
        HookFn::Callback(f) => {
            DocHook::callback(move |doc, done| f(&slot.instance_for(doc), done))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaOptions;
    use crate::store::Schema;
    use serde_json::json;

    fn detached(data: serde_json::Value) -> Document {
        let schema = Schema::compile(&crate::tree::Tree::map(), &SchemaOptions::default().strict(false)).unwrap();
        Document::detached(Arc::new(schema), data)
    }

    #[test]
    fn test_empty_slot_yields_unbound_instance() {
        let slot = ModelSlot::new();
        assert!(!slot.is_filled());
        assert!(slot.get().is_none());

        let seen = Arc::new(std::sync::Mutex::new(None));
        let sink = Arc::clone(&seen);
        let validator = bind_validator(
            &slot,
            ValidatorFn::new(move |instance, value| {
                *sink.lock().unwrap() = Some((instance.model().is_none(), instance.value("name")));
                value.as_str() == Some("ok")
            }),
        );
        let doc = detached(json!({"name": "Ada"}));
        let DocValidator::Sync(f) = validator else {
            panic!("expected sync validator");
        };
        assert!(f(&doc, &json!("ok")));
        assert!(!f(&doc, &json!("no")));
        assert_eq!(*seen.lock().unwrap(), Some((true, Some(json!("Ada")))));
    }

    #[test]
    fn test_hook_sees_document_through_instance() {
        let slot = ModelSlot::new();
        let hook = bind_hook(
            &slot,
            HookFn::new(|instance| {
                instance.set("touched", true);
                Ok(())
            }),
        );
        let doc = detached(json!({}));
        let DocHook::Sync(f) = hook else {
            panic!("expected sync hook");
        };
        f(&doc).unwrap();
        assert_eq!(doc.get("touched"), Some(json!(true)));
    }
}
