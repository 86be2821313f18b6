//! Document store engine
//!
//! The engine owns a storage backend and the table of registered models.
//! Models refer back to it weakly for reference lookups during population.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use super::backend::{InMemoryStorage, StorageBackend};
use super::errors::{StoreError, StoreResult};
use super::model::ModelHandle;
use super::schema::Schema;
use crate::schema::{Declaration, SchemaOptions};

pub(crate) struct EngineShared {
    backend: Arc<dyn StorageBackend>,
    models: RwLock<HashMap<String, ModelHandle>>,
}

fn poisoned<T>(err: std::sync::PoisonError<T>) -> StoreError {
    StoreError::Internal(format!("model table lock poisoned: {}", err))
}

impl EngineShared {
    pub(crate) fn lookup(&self, name: &str) -> StoreResult<ModelHandle> {
        self.models
            .read()
            .map_err(poisoned)?
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::UnknownModel(name.to_string()))
    }
}

#[derive(Clone)]
pub struct Engine {
    shared: Arc<EngineShared>,
}

impl Engine {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self {
            shared: Arc::new(EngineShared {
                backend,
                models: RwLock::new(HashMap::new()),
            }),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryStorage::new()))
    }

    pub fn backend(&self) -> Arc<dyn StorageBackend> {
        Arc::clone(&self.shared.backend)
    }

    /// Compiles a schema from a driver-facing field tree
    pub fn schema(&self, fields: &Declaration, options: &SchemaOptions) -> StoreResult<Schema> {
        Schema::compile(fields, options)
    }

    /// Registers a compiled schema under `name`
    pub fn model(
        &self,
        name: &str,
        schema: Schema,
        collection: &str,
    ) -> StoreResult<ModelHandle> {
        let mut models = self.shared.models.write().map_err(poisoned)?;
        if models.contains_key(name) {
            return Err(StoreError::ModelExists(name.to_string()));
        }
        let handle = ModelHandle::new(
            name.to_string(),
            collection.to_string(),
            Arc::new(schema),
            Arc::clone(&self.shared.backend),
            Arc::downgrade(&self.shared),
        );
        models.insert(name.to_string(), handle.clone());
        Ok(handle)
    }

    pub fn get_model(&self, name: &str) -> StoreResult<ModelHandle> {
        self.shared.lookup(name)
    }

    pub fn has_model(&self, name: &str) -> bool {
        self.shared.lookup(name).is_ok()
    }

    pub fn model_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .shared
            .models
            .read()
            .map(|models| models.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }

    pub fn delete_model(&self, name: &str) -> StoreResult<bool> {
        Ok(self
            .shared
            .models
            .write()
            .map_err(poisoned)?
            .remove(name)
            .is_some())
    }

    /// Forgets every registered model; stored documents are kept
    pub fn clear_models(&self) -> StoreResult<usize> {
        let mut models = self.shared.models.write().map_err(poisoned)?;
        let count = models.len();
        models.clear();
        Ok(count)
    }

    /// Removes every stored document
    pub fn drop_all(&self) -> StoreResult<()> {
        self.shared.backend.clear()
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("models", &self.model_names())
            .finish()
    }
}
