//! Storage backends
//!
//! The engine keeps documents as JSON objects keyed by their `_id`.
//! Filtering, sorting and projection happen in the engine; a backend only
//! stores and returns whole documents in insertion order.

use std::collections::HashMap;
use std::sync::RwLock;

use indexmap::IndexMap;
use serde_json::Value;

use super::errors::{StoreError, StoreResult};

/// Trait for the storage backend
pub trait StorageBackend: Send + Sync {
    /// Read a document by ID
    fn read(&self, collection: &str, id: &str) -> StoreResult<Option<Value>>;

    /// Insert a document, assigning an `_id` when it has none
    fn insert(&self, collection: &str, document: Value) -> StoreResult<String>;

    /// Replace a stored document; false when it does not exist
    fn replace(&self, collection: &str, id: &str, document: Value) -> StoreResult<bool>;

    /// Delete a document
    fn delete(&self, collection: &str, id: &str) -> StoreResult<bool>;

    /// All documents of a collection in insertion order
    fn scan(&self, collection: &str) -> StoreResult<Vec<Value>>;

    /// Remove every document of every collection
    fn clear(&self) -> StoreResult<()>;
}

/// Generates a fresh record identifier
pub fn new_object_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

type Collections = HashMap<String, IndexMap<String, Value>>;

/// In-memory storage backend
pub struct InMemoryStorage {
    data: RwLock<Collections>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self {
            data: RwLock::new(HashMap::new()),
        }
    }

    /// Number of stored documents in a collection
    pub fn len(&self, collection: &str) -> usize {
        self.data
            .read()
            .map(|data| data.get(collection).map(IndexMap::len).unwrap_or(0))
            .unwrap_or(0)
    }

    pub fn is_empty(&self, collection: &str) -> bool {
        self.len(collection) == 0
    }
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned<T>(err: std::sync::PoisonError<T>) -> StoreError {
    StoreError::Backend(err.to_string())
}

impl StorageBackend for InMemoryStorage {
    fn read(&self, collection: &str, id: &str) -> StoreResult<Option<Value>> {
        let data = self.data.read().map_err(poisoned)?;
        Ok(data.get(collection).and_then(|c| c.get(id)).cloned())
    }

    fn insert(&self, collection: &str, mut document: Value) -> StoreResult<String> {
        let mut data = self.data.write().map_err(poisoned)?;

        let id = document
            .get("_id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(new_object_id);

        let obj = document
            .as_object_mut()
            .ok_or_else(|| StoreError::Backend("documents must be JSON objects".into()))?;
        obj.insert("_id".to_string(), Value::String(id.clone()));

        let coll = data.entry(collection.to_string()).or_default();
        if coll.contains_key(&id) {
            return Err(StoreError::Backend(format!(
                "Document {} already exists in {}",
                id, collection
            )));
        }
        coll.insert(id.clone(), document);

        Ok(id)
    }

    fn replace(&self, collection: &str, id: &str, document: Value) -> StoreResult<bool> {
        let mut data = self.data.write().map_err(poisoned)?;

        match data.get_mut(collection).and_then(|c| c.get_mut(id)) {
            Some(slot) => {
                *slot = document;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn delete(&self, collection: &str, id: &str) -> StoreResult<bool> {
        let mut data = self.data.write().map_err(poisoned)?;

        if let Some(coll) = data.get_mut(collection) {
            Ok(coll.shift_remove(id).is_some())
        } else {
            Ok(false)
        }
    }

    fn scan(&self, collection: &str) -> StoreResult<Vec<Value>> {
        let data = self.data.read().map_err(poisoned)?;

        Ok(data
            .get(collection)
            .map(|c| c.values().cloned().collect())
            .unwrap_or_default())
    }

    fn clear(&self) -> StoreResult<()> {
        let mut data = self.data.write().map_err(poisoned)?;
        data.clear();
        Ok(())
    }
}
