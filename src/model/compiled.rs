//! A registered model: metadata, accessors and the engine handle

use std::any::TypeId;
use std::fmt;
use std::sync::{Arc, Weak};

use crate::field::ModelMetadata;
use crate::store::{ModelHandle, Schema};

use super::accessors::AccessorTable;
use super::registry::RegistryShared;
use super::Model;

pub struct CompiledModel {
    pub(crate) name: &'static str,
    pub(crate) type_id: TypeId,
    pub(crate) collection: String,
    pub(crate) metadata: ModelMetadata,
    pub(crate) accessors: AccessorTable,
    pub(crate) handle: ModelHandle,
    pub(crate) registry: Weak<RegistryShared>,
}

impl CompiledModel {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn is<M: Model>(&self) -> bool {
        self.type_id == TypeId::of::<M>()
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }

    pub fn accessors(&self) -> &AccessorTable {
        &self.accessors
    }

    pub fn handle(&self) -> &ModelHandle {
        &self.handle
    }

    pub fn schema(&self) -> Arc<Schema> {
        self.handle.schema()
    }

    /// Another model of the same registry, if it is still registered
    pub fn resolve(&self, type_id: TypeId) -> Option<Arc<CompiledModel>> {
        self.registry.upgrade()?.lookup(type_id)
    }
}

impl fmt::Debug for CompiledModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledModel")
            .field("name", &self.name)
            .field("collection", &self.collection)
            .field("fields", &self.metadata.field_names())
            .finish()
    }
}
