//! Engine-level documents
//!
//! A [`Document`] is a shared handle: clones observe the same state. The
//! state lock is never held while user hooks or validators run.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_util::FutureExt;
use serde_json::Value;

use crate::schema::FieldType;
use crate::tree::{json_get, json_remove, json_set};

use super::backend::new_object_id;
use super::errors::{StoreError, StoreResult, ValidationError, ValidatorError};
use super::hooks::{HookPhase, Lifecycle};
use super::model::ModelHandle;
use super::schema::{leaf_type, Schema};
use super::validation::validate_tree;

/// Options for [`Document::to_object`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ToObjectOptions {
    /// Keep paths declared hidden
    pub show_hidden: bool,
    /// Apply path getters
    pub getters: bool,
    /// Replace populated records with their identifiers
    pub depopulate: bool,
}

impl ToObjectOptions {
    pub fn show_hidden() -> Self {
        Self {
            show_hidden: true,
            ..Self::default()
        }
    }
}

struct DocState {
    data: Value,
    schema: Arc<Schema>,
    model: Option<ModelHandle>,
    is_new: bool,
    modified: Vec<String>,
    /// Original identifiers of populated paths
    populated: HashMap<String, Value>,
    cast_errors: Vec<ValidatorError>,
    invalidated: Vec<ValidatorError>,
    bump_version: bool,
}

#[derive(Clone)]
pub struct Document {
    state: Arc<Mutex<DocState>>,
}

impl Document {
    fn build(schema: Arc<Schema>, model: Option<ModelHandle>, data: &Value) -> Self {
        let mut cast_errors = Vec::new();
        let mut data = schema.cast_document(data, "", &mut cast_errors);
        if !data.is_object() {
            data = Value::Object(Default::default());
        }
        schema.apply_defaults(&mut data);
        if json_get(&data, "_id").map_or(true, Value::is_null) {
            json_set(&mut data, "_id", Value::String(new_object_id()));
        }
        Self::from_state(DocState {
            data,
            schema,
            model,
            is_new: true,
            modified: Vec::new(),
            populated: HashMap::new(),
            cast_errors,
            invalidated: Vec::new(),
            bump_version: false,
        })
    }

    fn from_state(state: DocState) -> Self {
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// New unsaved document of a model: casts, fills defaults, assigns an id
    pub(crate) fn new(model: ModelHandle, data: &Value) -> Self {
        Self::build(model.schema(), Some(model), data)
    }

    /// New document not bound to any model; it can be validated but not saved
    pub fn detached(schema: Arc<Schema>, data: Value) -> Self {
        Self::build(schema, None, &data)
    }

    /// Wraps already-stored data without casting
    pub(crate) fn hydrate(model: ModelHandle, data: Value) -> Self {
        Self::from_state(DocState {
            data,
            schema: model.schema(),
            model: Some(model),
            is_new: false,
            modified: Vec::new(),
            populated: HashMap::new(),
            cast_errors: Vec::new(),
            invalidated: Vec::new(),
            bump_version: false,
        })
    }

    fn state(&self) -> MutexGuard<'_, DocState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn id(&self) -> Option<String> {
        self.state()
            .data
            .get("_id")
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    pub fn schema(&self) -> Arc<Schema> {
        Arc::clone(&self.state().schema)
    }

    pub fn model(&self) -> Option<ModelHandle> {
        self.state().model.clone()
    }

    /// Name used in validation errors
    pub fn model_name(&self) -> String {
        self.state()
            .model
            .as_ref()
            .map(|m| m.name().to_string())
            .unwrap_or_else(|| "Document".to_string())
    }

    pub fn is_new(&self) -> bool {
        self.state().is_new
    }

    pub(crate) fn set_is_new(&self, is_new: bool) {
        self.state().is_new = is_new;
    }

    /// Value at `path` with the path's getter applied
    pub fn get(&self, path: &str) -> Option<Value> {
        let state = self.state();
        let path = state.schema.resolve_alias(path);
        let value = json_get(&state.data, path)?.clone();
        match state.schema.path(path).and_then(|sp| sp.options.getter.as_ref()) {
            Some(getter) => Some(getter.apply(value)),
            None => Some(value),
        }
    }

    /// Stored value at `path`, without getters
    pub fn get_raw(&self, path: &str) -> Option<Value> {
        let state = self.state();
        let path = state.schema.resolve_alias(path);
        json_get(&state.data, path).cloned()
    }

    /// Writes `value` without casting and marks the path modified
    pub fn put_raw(&self, path: &str, value: Value) {
        let mut state = self.state();
        let path = state.schema.resolve_alias(path).to_string();
        json_set(&mut state.data, &path, value);
        state.mark(&path);
    }

    /// Casts and writes `value`.
    ///
    /// A cast failure is kept and reported by the next validation. Records
    /// assigned to a reference path are stored populated.
    pub fn set(&self, path: &str, value: impl Into<Value>) {
        let value = value.into();
        let mut state = self.state();
        let path = state.schema.resolve_alias(path).to_string();
        state.cast_errors.retain(|e| e.path != path);

        let is_reference = state
            .schema
            .path(&path)
            .map_or(false, |sp| sp.is_reference() && leaf_type(sp) == Some(FieldType::ObjectId));
        let holds_records = match &value {
            Value::Object(_) => true,
            Value::Array(items) => !items.is_empty() && items.iter().all(Value::is_object),
            _ => false,
        };

        let cast = state.schema.cast_path(&path, value.clone());
        match cast {
            Ok(casted) if is_reference && holds_records => {
                state.populated.insert(path.clone(), casted);
                json_set(&mut state.data, &path, value);
            }
            Ok(casted) => {
                state.populated.remove(&path);
                json_set(&mut state.data, &path, casted);
            }
            Err(err) => {
                state.cast_errors.push(err);
                json_set(&mut state.data, &path, value);
            }
        }
        state.mark(&path);
    }

    /// Snapshot of the stored data
    pub fn data(&self) -> Value {
        self.state().data.clone()
    }

    pub(crate) fn replace_data(&self, data: Value) {
        self.state().data = data;
    }

    /// True when `path` (or, without a path, anything) changed since the
    /// last save. Parents and children of a modified path count as modified.
    pub fn is_modified(&self, path: Option<&str>) -> bool {
        let state = self.state();
        match path {
            None => !state.modified.is_empty(),
            Some(path) => state.modified.iter().any(|m| related(m, path)),
        }
    }

    pub fn modified_paths(&self) -> Vec<String> {
        self.state().modified.clone()
    }

    pub fn mark_modified(&self, path: &str) {
        self.state().mark(path);
    }

    pub fn unmark_modified(&self, path: &str) {
        self.state().modified.retain(|m| m != path);
    }

    pub(crate) fn clear_modified(&self) {
        let mut state = self.state();
        state.modified.clear();
        state.bump_version = false;
    }

    /// Records a failure reported by the next validation
    pub fn invalidate(&self, path: &str, message: impl Into<String>, value: Value) {
        self.state().invalidated.push(ValidatorError {
            path: path.to_string(),
            kind: "user defined".to_string(),
            message: message.into(),
            value,
        });
    }

    /// Original identifiers of a populated path
    pub fn populated(&self, path: &str) -> Option<Value> {
        self.state().populated.get(path).cloned()
    }

    pub(crate) fn set_populated(&self, path: &str, records: Value, original: Value) {
        let mut state = self.state();
        json_set(&mut state.data, path, records);
        state.populated.insert(path.to_string(), original);
    }

    /// Restores the identifiers of a populated path
    pub fn depopulate(&self, path: &str) {
        let mut state = self.state();
        if let Some(original) = state.populated.remove(path) {
            json_set(&mut state.data, path, original);
        }
    }

    /// Requests a version bump on the next save
    pub fn increment(&self) {
        self.state().bump_version = true;
    }

    pub(crate) fn wants_version_bump(&self) -> bool {
        self.state().bump_version
    }

    pub fn version(&self) -> Option<i64> {
        let state = self.state();
        let key = state.schema.version_key()?;
        state.data.get(key).and_then(Value::as_i64)
    }

    /// External representation of the document
    pub fn to_object(&self, options: ToObjectOptions) -> Value {
        let state = self.state();
        let mut data = state.data.clone();
        if options.depopulate {
            for (path, original) in &state.populated {
                json_set(&mut data, path, original.clone());
            }
        }
        if options.getters {
            state.schema.apply_getters(&mut data);
        }
        if !options.show_hidden {
            state.schema.strip_hidden(&mut data);
        }
        data
    }

    pub fn to_json(&self) -> Value {
        self.to_object(ToObjectOptions {
            getters: true,
            ..ToObjectOptions::default()
        })
    }

    /// Same identity: same handle, or both stored under the same id
    pub fn equals(&self, other: &Document) -> bool {
        if self.ptr_eq(other) {
            return true;
        }
        match (self.id(), other.id()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    pub fn ptr_eq(&self, other: &Document) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }

    /// Runs every validator; async validators are skipped when `sync_only`
    pub(crate) async fn run_validation(&self, sync_only: bool) -> Option<ValidationError> {
        let (schema, data, pending) = {
            let state = self.state();
            let pending: Vec<ValidatorError> = state
                .cast_errors
                .iter()
                .chain(state.invalidated.iter())
                .cloned()
                .collect();
            (Arc::clone(&state.schema), state.data.clone(), pending)
        };

        let mut errors = ValidationError::new(self.model_name());
        for err in pending {
            if !errors.has_path(&err.path) {
                errors.push(err.path, err.kind, err.message, err.value);
            }
        }
        validate_tree(self, &schema, &data, String::new(), sync_only, &mut errors).await;
        self.state().invalidated.clear();

        if errors.is_empty() {
            None
        } else {
            Some(errors)
        }
    }

    /// Runs validate hooks and validators
    pub async fn validate(&self) -> StoreResult<()> {
        let schema = self.schema();
        let hooks = schema.hooks();
        hooks.run(HookPhase::Pre, Lifecycle::Validate, self).await?;
        if let Some(errors) = self.run_validation(false).await {
            return Err(StoreError::Validation(errors));
        }
        hooks.run(HookPhase::Post, Lifecycle::Validate, self).await
    }

    /// Runs synchronous validators only, without hooks
    pub fn validate_sync(&self) -> Option<ValidationError> {
        self.run_validation(true).now_or_never().flatten()
    }

    fn bound_model(&self) -> StoreResult<ModelHandle> {
        self.model()
            .ok_or_else(|| StoreError::Internal("document is not bound to a model".into()))
    }

    pub async fn save(&self) -> StoreResult<()> {
        self.bound_model()?.save_document(self).await
    }

    pub async fn remove(&self) -> StoreResult<()> {
        self.bound_model()?.remove_document(self).await
    }

    /// Replaces the identifiers at each reference path with the records
    pub async fn populate(&self, paths: &[&str]) -> StoreResult<()> {
        let paths: Vec<String> = paths.iter().map(|p| p.to_string()).collect();
        self.bound_model()?.populate_document(self, &paths).await
    }

    /// Removes the value at `path`
    pub fn unset(&self, path: &str) {
        let mut state = self.state();
        json_remove(&mut state.data, path);
        state.mark(path);
    }
}

impl DocState {
    fn mark(&mut self, path: &str) {
        if !self.modified.iter().any(|m| m == path) {
            self.modified.push(path.to_string());
        }
    }
}

fn related(modified: &str, path: &str) -> bool {
    let nested = |outer: &str, inner: &str| {
        inner.len() > outer.len() && inner.starts_with(outer) && inner.as_bytes()[outer.len()] == b'.'
    };
    modified == path || nested(path, modified) || nested(modified, path)
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state();
        f.debug_struct("Document")
            .field("model", &state.model.as_ref().map(|m| m.name().to_string()))
            .field("is_new", &state.is_new)
            .field("data", &state.data)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{typed, Field, SchemaOptions};
    use crate::store::{DocValidator, ValidatorDescriptor};
    use crate::tree::Tree;
    use serde_json::json;

    fn schema() -> Arc<Schema> {
        let fields = Tree::from_pairs(vec![
            ("name", Field::string().required().build()),
            ("age", Field::number().min(0.0).build()),
            ("secret", typed(FieldType::String)),
            (
                "creator",
                Field::of(FieldType::ObjectId).option("ref", "User").build(),
            ),
        ]);
        let mut schema = Schema::compile(&fields, &SchemaOptions::default()).unwrap();
        schema.hide("secret");
        Arc::new(schema)
    }

    #[test]
    fn test_new_document_gets_id() {
        let doc = Document::detached(schema(), json!({"name": "a"}));
        assert!(doc.id().is_some());
        assert!(doc.is_new());
        assert!(!doc.is_modified(None));
    }

    #[test]
    fn test_set_tracks_modified_paths() {
        let doc = Document::detached(schema(), json!({"name": "a"}));
        doc.set("age", "12");
        assert_eq!(doc.get("age"), Some(json!(12)));
        assert!(doc.is_modified(Some("age")));
        assert!(!doc.is_modified(Some("name")));
        doc.unmark_modified("age");
        assert!(!doc.is_modified(None));
    }

    #[test]
    fn test_modified_parent_and_child() {
        assert!(related("address.city", "address"));
        assert!(related("address", "address.city"));
        assert!(!related("addresses", "address"));
    }

    #[test]
    fn test_validate_sync_reports_required_and_cast() {
        let doc = Document::detached(schema(), json!({}));
        doc.set("age", "old");
        let errors = doc.validate_sync().unwrap();
        assert_eq!(errors.get("name").unwrap().kind, "required");
        assert_eq!(errors.get("age").unwrap().kind, "cast");
    }

    #[test]
    fn test_validate_sync_skips_async_validators() {
        let mut schema = (*schema()).clone();
        schema.attach_validator(
            "name",
            ValidatorDescriptor::new(DocValidator::callback(|_, _, done| done.invalid()), None),
        );
        let doc = Document::detached(Arc::new(schema), json!({"name": "a"}));
        assert!(doc.validate_sync().is_none());
    }

    #[tokio::test]
    async fn test_validate_runs_async_validators() {
        let mut schema = (*schema()).clone();
        schema.attach_validator(
            "name",
            ValidatorDescriptor::new(
                DocValidator::callback(|_, v, done| done.finish(v != "bad")),
                Some("`{VALUE}` rejected at {PATH}".into()),
            ),
        );
        let doc = Document::detached(Arc::new(schema), json!({"name": "bad"}));
        let err = doc.validate().await.unwrap_err();
        let StoreError::Validation(errors) = err else {
            panic!("expected validation error");
        };
        assert_eq!(errors.get("name").unwrap().message, "`bad` rejected at name");
    }

    #[test]
    fn test_invalidate_is_reported_once() {
        let doc = Document::detached(schema(), json!({"name": "a"}));
        doc.invalidate("name", "taken", json!("a"));
        assert_eq!(doc.validate_sync().unwrap().get("name").unwrap().message, "taken");
        assert!(doc.validate_sync().is_none());
    }

    #[test]
    fn test_to_object_hides_and_shows() {
        let doc = Document::detached(schema(), json!({"name": "a", "secret": "s"}));
        assert!(doc.to_object(ToObjectOptions::default()).get("secret").is_none());
        assert_eq!(doc.to_object(ToObjectOptions::show_hidden())["secret"], "s");
    }

    #[test]
    fn test_setting_record_on_reference_populates() {
        let doc = Document::detached(schema(), json!({"name": "a"}));
        doc.set("creator", json!({"_id": "u1", "name": "Ada"}));
        assert_eq!(doc.populated("creator"), Some(json!("u1")));
        assert_eq!(doc.get("creator").unwrap()["name"], "Ada");
        doc.depopulate("creator");
        assert_eq!(doc.get("creator"), Some(json!("u1")));
    }

    #[test]
    fn test_equals_by_id() {
        let a = Document::detached(schema(), json!({"_id": "x", "name": "a"}));
        let b = Document::detached(schema(), json!({"_id": "x", "name": "b"}));
        let c = Document::detached(schema(), json!({"name": "a"}));
        assert!(a.equals(&b));
        assert!(!a.equals(&c));
        assert!(a.equals(&a.clone()));
    }
}
