//! Compiled models
//!
//! A [`ModelHandle`] binds a compiled schema to a collection of the
//! engine's backend. Save order is fixed:
//!
//! pre-validate → validate → post-validate → pre-save → persist → post-save

use std::fmt;
use std::sync::{Arc, Weak};

use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};

use crate::tree::{join_path, json_get, json_remove, json_set};

use super::aggregate::{self, MapReduce, MapReduceOutput};
use super::backend::StorageBackend;
use super::document::Document;
use super::engine::EngineShared;
use super::errors::{StoreError, StoreResult, ValidationError, ValidatorError};
use super::filter::FilterMatcher;
use super::hooks::{HookPhase, Lifecycle};
use super::query::{Query, QueryOp};
use super::schema::Schema;
use super::update::{apply_update, check_update};

/// Options of update operations
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateOptions {
    /// Update every matching document instead of the first
    pub multi: bool,
    /// `find_one_and_update` returns the updated record instead of the original
    pub return_new: bool,
}

impl UpdateOptions {
    pub fn multi() -> Self {
        Self {
            multi: true,
            ..Self::default()
        }
    }

    pub fn return_new() -> Self {
        Self {
            return_new: true,
            ..Self::default()
        }
    }
}

/// Outcome of an update
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateResult {
    pub matched: usize,
    pub modified: usize,
}

pub(crate) struct ModelCore {
    name: String,
    collection: String,
    schema: Arc<Schema>,
    backend: Arc<dyn StorageBackend>,
    engine: Weak<EngineShared>,
}

/// A model registered with an engine
#[derive(Clone)]
pub struct ModelHandle {
    core: Arc<ModelCore>,
}

impl ModelHandle {
    pub(crate) fn new(
        name: String,
        collection: String,
        schema: Arc<Schema>,
        backend: Arc<dyn StorageBackend>,
        engine: Weak<EngineShared>,
    ) -> Self {
        Self {
            core: Arc::new(ModelCore {
                name,
                collection,
                schema,
                backend,
                engine,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.core.name
    }

    pub fn collection(&self) -> &str {
        &self.core.collection
    }

    pub fn schema(&self) -> Arc<Schema> {
        Arc::clone(&self.core.schema)
    }

    pub fn ptr_eq(&self, other: &ModelHandle) -> bool {
        Arc::ptr_eq(&self.core, &other.core)
    }

    fn backend(&self) -> &dyn StorageBackend {
        self.core.backend.as_ref()
    }

    fn lookup(&self, name: &str) -> StoreResult<ModelHandle> {
        let engine = self
            .core
            .engine
            .upgrade()
            .ok_or_else(|| StoreError::Internal("engine has been dropped".into()))?;
        engine.lookup(name)
    }

    /// New unsaved document
    pub fn new_document(&self, data: Value) -> Document {
        Document::new(self.clone(), &data)
    }

    /// Wraps stored data as a saved document without running hooks
    pub fn hydrate(&self, data: Value) -> Document {
        Document::hydrate(self.clone(), data)
    }

    /// Wraps stored data, running init hooks
    pub(crate) async fn init(&self, data: Value) -> StoreResult<Document> {
        let doc = self.hydrate(data);
        let hooks = self.core.schema.hooks();
        hooks.run(HookPhase::Pre, Lifecycle::Init, &doc).await?;
        hooks.run(HookPhase::Post, Lifecycle::Init, &doc).await?;
        Ok(doc)
    }

    pub async fn create(&self, data: Value) -> StoreResult<Document> {
        let doc = self.new_document(data);
        doc.save().await?;
        Ok(doc)
    }

    /// Creates documents one by one, stopping at the first failure
    pub async fn create_many(&self, items: Vec<Value>) -> StoreResult<Vec<Document>> {
        let mut out = Vec::with_capacity(items.len());
        for item in items {
            out.push(self.create(item).await?);
        }
        Ok(out)
    }

    /// Validates every document, then inserts them without save hooks
    pub async fn insert_many(&self, items: Vec<Value>) -> StoreResult<Vec<Document>> {
        let docs: Vec<Document> = items.into_iter().map(|d| self.new_document(d)).collect();
        for doc in &docs {
            if let Some(errors) = doc.run_validation(false).await {
                return Err(StoreError::Validation(errors));
            }
        }
        for doc in &docs {
            self.persist(doc)?;
        }
        Ok(docs)
    }

    pub(crate) async fn save_document(&self, doc: &Document) -> StoreResult<()> {
        doc.validate().await?;
        let hooks = self.core.schema.hooks();
        hooks.run(HookPhase::Pre, Lifecycle::Save, doc).await?;
        self.persist(doc)?;
        hooks.run(HookPhase::Post, Lifecycle::Save, doc).await
    }

    fn persist(&self, doc: &Document) -> StoreResult<()> {
        let schema = &self.core.schema;
        let mut cast_errors = Vec::new();
        let mut stored = schema.cast_document(&doc.data(), "", &mut cast_errors);
        if let Some(err) = cast_errors.into_iter().next() {
            let mut errors = ValidationError::new(self.name());
            errors.push(err.path, err.kind, err.message, err.value);
            return Err(StoreError::Validation(errors));
        }
        let id = doc.id().ok_or(StoreError::MissingId)?;
        self.check_unique(&stored, &id)?;

        if doc.is_new() {
            if let Some(key) = schema.version_key() {
                json_set(&mut stored, key, Value::from(0));
            }
            self.backend().insert(&self.core.collection, stored.clone())?;
        } else {
            let mut merged = self
                .backend()
                .read(&self.core.collection, &id)?
                .ok_or_else(|| StoreError::NotFound {
                    collection: self.core.collection.clone(),
                    id: id.clone(),
                })?;
            if let (Value::Object(target), Value::Object(source)) = (&mut merged, &stored) {
                for (k, v) in source {
                    target.insert(k.clone(), v.clone());
                }
            }
            for path in doc.modified_paths() {
                if json_get(&stored, &path).is_none() {
                    json_remove(&mut merged, &path);
                }
            }
            if let Some(key) = schema.version_key() {
                let current = merged.get(key).and_then(Value::as_i64).unwrap_or(0);
                let next = if doc.wants_version_bump() { current + 1 } else { current };
                json_set(&mut merged, key, Value::from(next));
            }
            self.backend().replace(&self.core.collection, &id, merged.clone())?;
            stored = merged;
        }

        if let Some(key) = schema.version_key() {
            if let Some(version) = stored.get(key).cloned() {
                let mut data = doc.data();
                json_set(&mut data, key, version);
                doc.replace_data(data);
            }
        }
        doc.set_is_new(false);
        doc.clear_modified();
        Ok(())
    }

    fn check_unique(&self, document: &Value, id: &str) -> StoreResult<()> {
        let unique = self.core.schema.unique_paths();
        if unique.is_empty() {
            return Ok(());
        }
        let existing = self.backend().scan(&self.core.collection)?;
        for path in unique {
            let Some(value) = json_get(document, path).filter(|v| !v.is_null()) else {
                continue;
            };
            let clash = existing.iter().any(|other| {
                other.get("_id").and_then(Value::as_str) != Some(id)
                    && json_get(other, path) == Some(value)
            });
            if clash {
                return Err(StoreError::DuplicateKey {
                    model: self.name().to_string(),
                    collection: self.core.collection.clone(),
                    path: path.to_string(),
                    value: value.clone(),
                });
            }
        }
        Ok(())
    }

    pub(crate) async fn remove_document(&self, doc: &Document) -> StoreResult<()> {
        let id = doc.id().ok_or(StoreError::MissingId)?;
        let hooks = self.core.schema.hooks();
        hooks.run(HookPhase::Pre, Lifecycle::Remove, doc).await?;
        self.backend().delete(&self.core.collection, &id)?;
        hooks.run(HookPhase::Post, Lifecycle::Remove, doc).await
    }

    /// Stored documents matching `filter`, in insertion order
    pub(crate) fn scan_matching(&self, filter: &Value) -> StoreResult<Vec<Value>> {
        FilterMatcher::check(filter)?;
        Ok(self
            .backend()
            .scan(&self.core.collection)?
            .into_iter()
            .filter(|doc| FilterMatcher::matches(doc, filter))
            .collect())
    }

    pub(crate) fn read_by_id(&self, id: &str) -> StoreResult<Option<Value>> {
        self.backend().read(&self.core.collection, id)
    }

    pub fn find(&self, filter: Value) -> Query {
        Query::new(self.clone(), QueryOp::Find, filter)
    }

    pub fn find_one(&self, filter: Value) -> Query {
        Query::new(self.clone(), QueryOp::FindOne, filter)
    }

    pub fn find_by_id(&self, id: &str) -> Query {
        self.find_one(id_filter(id))
    }

    /// Starts a query with a condition chain on `path`
    pub fn where_path(&self, path: &str) -> Query {
        self.find(Value::Object(Map::new())).where_path(path)
    }

    pub fn find_one_and_update(&self, filter: Value, update: Value, options: UpdateOptions) -> Query {
        let op = QueryOp::FindOneAndUpdate {
            update,
            return_new: options.return_new,
        };
        Query::new(self.clone(), op, filter)
    }

    pub fn find_by_id_and_update(&self, id: &str, update: Value, options: UpdateOptions) -> Query {
        self.find_one_and_update(id_filter(id), update, options)
    }

    pub fn find_one_and_remove(&self, filter: Value) -> Query {
        Query::new(self.clone(), QueryOp::FindOneAndRemove, filter)
    }

    pub fn find_by_id_and_remove(&self, id: &str) -> Query {
        self.find_one_and_remove(id_filter(id))
    }

    pub fn count(&self, filter: Value) -> StoreResult<usize> {
        Ok(self.scan_matching(&filter)?.len())
    }

    /// Distinct values of `path` among matching documents; arrays contribute
    /// their elements
    pub fn distinct(&self, path: &str, filter: Value) -> StoreResult<Vec<Value>> {
        let mut out: Vec<Value> = Vec::new();
        for doc in self.scan_matching(&filter)? {
            let values = match json_get(&doc, path) {
                Some(Value::Array(items)) => items.clone(),
                Some(v) => vec![v.clone()],
                None => continue,
            };
            for v in values {
                if !out.contains(&v) {
                    out.push(v);
                }
            }
        }
        Ok(out)
    }

    /// Applies `update` to matching documents, re-casting each result
    pub fn update(&self, filter: Value, update: Value, options: UpdateOptions) -> StoreResult<UpdateResult> {
        check_update(&update)?;
        let matching = self.scan_matching(&filter)?;
        let take = if options.multi { matching.len() } else { matching.len().min(1) };

        let mut result = UpdateResult::default();
        for original in matching.into_iter().take(take) {
            result.matched += 1;
            if self.update_stored(&original, &update)? != original {
                result.modified += 1;
            }
        }
        Ok(result)
    }

    /// Applies `update` to one stored document and writes the result back
    pub(crate) fn update_stored(&self, original: &Value, update: &Value) -> StoreResult<Value> {
        let updated = self.updated_copy(original, update)?;
        if updated != *original {
            let id = original
                .get("_id")
                .and_then(Value::as_str)
                .ok_or(StoreError::MissingId)?;
            self.check_unique(&updated, id)?;
            self.backend().replace(&self.core.collection, id, updated.clone())?;
        }
        Ok(updated)
    }

    pub fn update_one(&self, filter: Value, update: Value) -> StoreResult<UpdateResult> {
        self.update(filter, update, UpdateOptions::default())
    }

    pub fn update_many(&self, filter: Value, update: Value) -> StoreResult<UpdateResult> {
        self.update(filter, update, UpdateOptions::multi())
    }

    /// Replaces the first matching document, keeping its id
    pub fn replace_one(&self, filter: Value, replacement: Value) -> StoreResult<UpdateResult> {
        let Some(original) = self.scan_matching(&filter)?.into_iter().next() else {
            return Ok(UpdateResult::default());
        };
        let id = original
            .get("_id")
            .and_then(Value::as_str)
            .ok_or(StoreError::MissingId)?
            .to_string();
        let mut errors = Vec::new();
        let mut document = self.core.schema.cast_document(&replacement, "", &mut errors);
        self.reject_cast_errors(errors)?;
        json_set(&mut document, "_id", Value::String(id.clone()));
        if let Some(key) = self.core.schema.version_key() {
            if let Some(version) = original.get(key) {
                json_set(&mut document, key, version.clone());
            }
        }
        self.check_unique(&document, &id)?;
        self.backend().replace(&self.core.collection, &id, document)?;
        Ok(UpdateResult {
            matched: 1,
            modified: 1,
        })
    }

    fn updated_copy(&self, original: &Value, update: &Value) -> StoreResult<Value> {
        let mut working = original.clone();
        apply_update(&mut working, update)?;
        if let Some(ts) = self.core.schema.timestamps() {
            let now = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
            json_set(&mut working, &ts.updated_at, Value::String(now));
        }
        let mut errors = Vec::new();
        let casted = self.core.schema.cast_document(&working, "", &mut errors);
        self.reject_cast_errors(errors)?;
        Ok(casted)
    }

    fn reject_cast_errors(&self, errors: Vec<ValidatorError>) -> StoreResult<()> {
        if errors.is_empty() {
            return Ok(());
        }
        let mut validation = ValidationError::new(self.name());
        for err in errors {
            validation.push(err.path, err.kind, err.message, err.value);
        }
        Err(StoreError::Validation(validation))
    }

    pub(crate) fn delete_by_id(&self, id: &str) -> StoreResult<bool> {
        self.backend().delete(&self.core.collection, id)
    }

    /// Deletes every matching document without running hooks
    pub fn remove(&self, filter: Value) -> StoreResult<usize> {
        let mut removed = 0;
        for doc in self.scan_matching(&filter)? {
            if let Some(id) = doc.get("_id").and_then(Value::as_str) {
                if self.delete_by_id(id)? {
                    removed += 1;
                }
            }
        }
        Ok(removed)
    }

    pub fn aggregate(&self, pipeline: &[Value]) -> StoreResult<Vec<Value>> {
        let docs = self.backend().scan(&self.core.collection)?;
        aggregate::run_pipeline(docs, pipeline)
    }

    pub fn map_reduce(&self, job: &MapReduce) -> StoreResult<Vec<MapReduceOutput>> {
        let filter = job.query().cloned().unwrap_or(Value::Null);
        let docs = self.scan_matching(&filter)?;
        Ok(job.run(&docs))
    }

    /// Replaces identifiers at each reference path with stored records.
    ///
    /// Paths inside sub-document arrays (`rooms.owner`) are populated in
    /// every element. Identifiers with no stored record are dropped.
    pub(crate) async fn populate_document(&self, doc: &Document, paths: &[String]) -> StoreResult<()> {
        for path in paths {
            let target_name = self.core.schema.reference_for(path).ok_or_else(|| {
                StoreError::InvalidQuery(format!(
                    "cannot populate {}.{}: not a reference",
                    self.name(),
                    path
                ))
            })?;
            let target = self.lookup(target_name)?;
            let deselected: Vec<String> = target
                .schema()
                .deselected()
                .into_iter()
                .map(str::to_string)
                .collect();

            let data = doc.data();
            let segments: Vec<&str> = path.split('.').collect();
            let mut concrete = Vec::new();
            concrete_paths(&data, &segments, String::new(), &mut concrete);

            for concrete_path in concrete {
                let Some(original) = json_get(&data, &concrete_path).cloned() else {
                    continue;
                };
                let fetch = |id: &Value| -> StoreResult<Option<Value>> {
                    let Some(id) = id.as_str() else {
                        return Ok(None);
                    };
                    Ok(target.read_by_id(id)?.map(|mut record| {
                        for p in &deselected {
                            json_remove(&mut record, p);
                        }
                        record
                    }))
                };
                let records = match &original {
                    Value::Array(ids) => {
                        let mut found = Vec::with_capacity(ids.len());
                        for id in ids {
                            if let Some(record) = fetch(id)? {
                                found.push(record);
                            }
                        }
                        Value::Array(found)
                    }
                    Value::Null => continue,
                    id => fetch(id)?.unwrap_or(Value::Null),
                };
                doc.set_populated(&concrete_path, records, original);
            }
        }
        Ok(())
    }
}

impl fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelHandle")
            .field("name", &self.core.name)
            .field("collection", &self.core.collection)
            .finish()
    }
}

fn id_filter(id: &str) -> Value {
    let mut filter = Map::new();
    filter.insert("_id".to_string(), Value::String(id.to_string()));
    Value::Object(filter)
}

/// Expands a schema path into the concrete paths present in `value`,
/// adding indices where arrays are crossed
fn concrete_paths(value: &Value, segments: &[&str], prefix: String, out: &mut Vec<String>) {
    match (segments.split_first(), value) {
        (None, _) => out.push(prefix),
        (Some(_), Value::Array(items)) => {
            for (i, item) in items.iter().enumerate() {
                concrete_paths(item, segments, join_path(&prefix, &i.to_string()), out);
            }
        }
        (Some((head, rest)), Value::Object(map)) => {
            if let Some(child) = map.get(*head) {
                concrete_paths(child, rest, join_path(&prefix, head), out);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_concrete_paths_cross_arrays() {
        let data = json!({"rooms": [{"owner": "a"}, {"name": "x"}, {"owner": "b"}], "creator": "c"});
        let mut out = Vec::new();
        concrete_paths(&data, &["rooms", "owner"], String::new(), &mut out);
        assert_eq!(out, vec!["rooms.0.owner", "rooms.2.owner"]);

        let mut out = Vec::new();
        concrete_paths(&data, &["creator"], String::new(), &mut out);
        assert_eq!(out, vec!["creator"]);
    }

    #[test]
    fn test_id_filter() {
        assert_eq!(id_filter("x"), json!({"_id": "x"}));
    }
}
