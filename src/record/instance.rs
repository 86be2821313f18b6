//! The record behind every typed wrapper

use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::model::{AccessorKind, CompiledModel, Model};
use crate::schema::{OdmError, OdmResult};
use crate::store::{Document, StoreError};
use crate::tree::join_path;

/// An engine document together with the model it was loaded through.
///
/// Either half may be absent: an empty instance backs a wrapper built
/// before any record exists, and a record with no model reads every
/// path as a plain value.
#[derive(Clone, Default)]
pub struct Instance {
    model: Option<Arc<CompiledModel>>,
    record: Option<Document>,
}

/// What a read through [`Instance::get`] produced
#[derive(Debug, Clone)]
pub enum Accessed {
    Missing,
    Value(Value),
    /// Populated single reference
    Reference(Instance),
    /// Populated reference array
    References(Vec<Instance>),
    Subdocument(Subdocument),
    Subdocuments(Vec<Subdocument>),
}

impl Accessed {
    /// Plain JSON form of whatever was read
    pub fn into_value(self) -> Option<Value> {
        match self {
            Accessed::Missing => None,
            Accessed::Value(value) => Some(value),
            Accessed::Reference(instance) => instance.record().map(Document::data),
            Accessed::References(items) => Some(Value::Array(
                items
                    .iter()
                    .filter_map(|i| i.record().map(Document::data))
                    .collect(),
            )),
            Accessed::Subdocument(sub) => sub.value(),
            Accessed::Subdocuments(items) => {
                Some(Value::Array(items.iter().filter_map(Subdocument::value).collect()))
            }
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Accessed::Missing)
    }
}

impl Instance {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(model: Arc<CompiledModel>, record: Document) -> Self {
        Self {
            model: Some(model),
            record: Some(record),
        }
    }

    pub fn bound(model: Option<Arc<CompiledModel>>, record: Document) -> Self {
        Self {
            model,
            record: Some(record),
        }
    }

    pub fn record(&self) -> Option<&Document> {
        self.record.as_ref()
    }

    pub fn model(&self) -> Option<&Arc<CompiledModel>> {
        self.model.as_ref()
    }

    pub fn has_record(&self) -> bool {
        self.record.is_some()
    }

    pub(crate) fn require_record(&self) -> OdmResult<&Document> {
        self.record.as_ref().ok_or_else(|| {
            OdmError::from(StoreError::Internal(
                "wrapper has no underlying record".to_string(),
            ))
        })
    }

    /// Reads `path` through the model's accessors.
    ///
    /// Populated references come back as instances of the referenced
    /// model; sub-documents as handles that read and write through this
    /// record.
    pub fn get(&self, path: &str) -> Accessed {
        let Some(record) = &self.record else {
            return Accessed::Missing;
        };
        let Some(value) = record.get(path) else {
            return Accessed::Missing;
        };
        let kind = self
            .model
            .as_ref()
            .and_then(|m| m.accessors().get(path))
            .unwrap_or(AccessorKind::Plain);

        match kind {
            AccessorKind::Plain => Accessed::Value(value),
            AccessorKind::Reference { target, many } => {
                let target = self.model.as_ref().and_then(|m| m.resolve(target.type_id()));
                match (target, value) {
                    (Some(target), value @ Value::Object(_)) if !many => {
                        Accessed::Reference(rehydrate(&target, value))
                    }
                    (Some(target), Value::Array(items))
                        if many && !items.is_empty() && items.iter().all(Value::is_object) =>
                    {
                        Accessed::References(
                            items.into_iter().map(|item| rehydrate(&target, item)).collect(),
                        )
                    }
                    (_, value) => Accessed::Value(value),
                }
            }
            AccessorKind::Subdocument { many } => match value {
                Value::Object(_) if !many => Accessed::Subdocument(Subdocument {
                    owner: self.clone(),
                    path: path.to_string(),
                }),
                Value::Array(items) if many => Accessed::Subdocuments(
                    (0..items.len())
                        .map(|i| Subdocument {
                            owner: self.clone(),
                            path: join_path(path, &i.to_string()),
                        })
                        .collect(),
                ),
                value => Accessed::Value(value),
            },
        }
    }

    /// Stored value at `path` as plain JSON
    pub fn value(&self, path: &str) -> Option<Value> {
        self.record.as_ref()?.get(path)
    }

    /// Value at `path` deserialized into `T`; `None` when absent or
    /// of another shape
    pub fn get_as<T: DeserializeOwned>(&self, path: &str) -> Option<T> {
        serde_json::from_value(self.value(path)?).ok()
    }

    /// Writes through to the record; does nothing without one
    pub fn set(&self, path: &str, value: impl Into<Value>) {
        if let Some(record) = &self.record {
            record.set(path, value);
        }
    }

    /// Rewraps as `M` when this instance was loaded through `M`
    pub fn downcast<M: Model>(&self) -> Option<M> {
        match &self.model {
            Some(model) if model.is::<M>() => Some(M::from_instance(self.clone())),
            _ => None,
        }
    }
}

fn rehydrate(target: &Arc<CompiledModel>, data: Value) -> Instance {
    Instance::new(Arc::clone(target), target.handle().hydrate(data))
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("model", &self.model.as_ref().map(|m| m.name()))
            .field("record", &self.record)
            .finish()
    }
}

/// A sub-document inside a record, addressed by its path
#[derive(Debug, Clone)]
pub struct Subdocument {
    owner: Instance,
    path: String,
}

impl Subdocument {
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn owner(&self) -> &Instance {
        &self.owner
    }

    /// Reads a path relative to this sub-document
    pub fn get(&self, path: &str) -> Accessed {
        self.owner.get(&join_path(&self.path, path))
    }

    pub fn set(&self, path: &str, value: impl Into<Value>) {
        self.owner.set(&join_path(&self.path, path), value);
    }

    /// The whole sub-document as plain JSON
    pub fn value(&self) -> Option<Value> {
        self.owner.value(&self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaOptions;
    use crate::store::Schema;
    use crate::tree::Tree;
    use serde_json::json;

    fn detached(data: Value) -> Document {
        let schema = Schema::compile(&Tree::map(), &SchemaOptions::default().strict(false)).unwrap();
        Document::detached(Arc::new(schema), data)
    }

    #[test]
    fn test_empty_instance() {
        let instance = Instance::empty();
        assert!(instance.get("name").is_missing());
        assert_eq!(instance.value("name"), None);
        instance.set("name", "ignored");
        assert!(instance.require_record().is_err());
    }

    #[test]
    fn test_unbound_record_reads_plain_values() {
        let instance = Instance::bound(None, detached(json!({"age": 3, "tags": ["a"]})));
        assert!(matches!(instance.get("age"), Accessed::Value(v) if v == json!(3)));
        assert_eq!(instance.get_as::<Vec<String>>("tags"), Some(vec!["a".to_string()]));
        assert_eq!(instance.get_as::<String>("age"), None);
        instance.set("age", 4);
        assert_eq!(instance.value("age"), Some(json!(4)));
    }
}
