//! Record operations available on every model type

use chrono::{DateTime, SecondsFormat, Utc};
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::model::Model;
use crate::schema::{OdmError, OdmResult};
use crate::store::{Document, StoreError, ToObjectOptions};

use super::instance::{Accessed, Instance, Subdocument};

fn record_of<M: Model>(model: &M) -> OdmResult<&Document> {
    model.instance().require_record()
}

fn rewrap<M: Model>(model: &M) -> M {
    M::from_instance(model.instance().clone())
}

/// Path of the creation (or modification) timestamp, when the model keeps them
fn timestamp_path(record: &Document, created: bool) -> Option<String> {
    let schema = record.schema();
    let fields = schema.timestamps()?;
    Some(if created {
        fields.created_at.clone()
    } else {
        fields.updated_at.clone()
    })
}

fn timestamp<M: Model>(model: &M, created: bool) -> Option<DateTime<Utc>> {
    let record = model.instance().record()?;
    let path = timestamp_path(record, created)?;
    serde_json::from_value(record.get_raw(&path)?).ok()
}

fn set_timestamp<M: Model>(model: &M, created: bool, at: DateTime<Utc>) {
    let Some(record) = model.instance().record() else {
        return;
    };
    if let Some(path) = timestamp_path(record, created) {
        record.put_raw(&path, Value::String(at.to_rfc3339_opts(SecondsFormat::Millis, true)));
    }
}

/// Reads, writes and persistence on the record behind a model value.
///
/// Implemented for every [`Model`]; operations that need a record fail
/// on a wrapper that has none.
pub trait ModelExt: Model {
    fn id(&self) -> Option<String> {
        self.instance().record().and_then(Document::id)
    }

    fn version(&self) -> Option<i64> {
        self.instance().record().and_then(Document::version)
    }

    fn is_new(&self) -> bool {
        self.instance().record().map_or(true, Document::is_new)
    }

    fn created_at(&self) -> Option<DateTime<Utc>> {
        timestamp(self, true)
    }

    fn updated_at(&self) -> Option<DateTime<Utc>> {
        timestamp(self, false)
    }

    fn set_created_at(&self, at: DateTime<Utc>) {
        set_timestamp(self, true, at);
    }

    fn set_updated_at(&self, at: DateTime<Utc>) {
        set_timestamp(self, false, at);
    }

    fn get(&self, path: &str) -> Accessed {
        self.instance().get(path)
    }

    fn value(&self, path: &str) -> Option<Value> {
        self.instance().value(path)
    }

    fn get_as<T: DeserializeOwned>(&self, path: &str) -> Option<T> {
        self.instance().get_as(path)
    }

    /// Populated single reference at `path`, as `T`
    fn reference<T: Model>(&self, path: &str) -> Option<T> {
        match self.get(path) {
            Accessed::Reference(instance) => Some(T::from_instance(instance)),
            _ => None,
        }
    }

    /// Populated reference array at `path`, as `T`; empty when the
    /// references are still identifiers
    fn references<T: Model>(&self, path: &str) -> Vec<T> {
        match self.get(path) {
            Accessed::References(items) => items.into_iter().map(T::from_instance).collect(),
            Accessed::Reference(instance) => vec![T::from_instance(instance)],
            _ => Vec::new(),
        }
    }

    fn subdocument(&self, path: &str) -> Option<Subdocument> {
        match self.get(path) {
            Accessed::Subdocument(sub) => Some(sub),
            _ => None,
        }
    }

    fn subdocuments(&self, path: &str) -> Vec<Subdocument> {
        match self.get(path) {
            Accessed::Subdocuments(items) => items,
            Accessed::Subdocument(sub) => vec![sub],
            _ => Vec::new(),
        }
    }

    fn set(&self, path: &str, value: impl Into<Value>) {
        self.instance().set(path, value);
    }

    fn unset(&self, path: &str) {
        if let Some(record) = self.instance().record() {
            record.unset(path);
        }
    }

    /// Validates and persists; runs the model's save hooks
    fn save(&self) -> BoxFuture<'_, OdmResult<Self>> {
        async move {
            record_of(self)?.save().await?;
            Ok(rewrap(self))
        }
        .boxed()
    }

    fn remove(&self) -> BoxFuture<'_, OdmResult<()>> {
        async move { Ok(record_of(self)?.remove().await?) }.boxed()
    }

    fn validate(&self) -> BoxFuture<'_, OdmResult<()>> {
        async move { Ok(record_of(self)?.validate().await?) }.boxed()
    }

    /// Validation without callback-style validators
    fn validate_sync(&self) -> OdmResult<()> {
        match record_of(self)?.validate_sync() {
            Some(err) => Err(OdmError::from(StoreError::Validation(err))),
            None => Ok(()),
        }
    }

    /// Replaces the identifiers at each path with the referenced records
    fn populate<'a>(&'a self, paths: &'a [&'a str]) -> BoxFuture<'a, OdmResult<Self>> {
        async move {
            record_of(self)?.populate(paths).await?;
            Ok(rewrap(self))
        }
        .boxed()
    }

    fn depopulate(&self, path: &str) {
        if let Some(record) = self.instance().record() {
            record.depopulate(path);
        }
    }

    /// Original identifier(s) of a populated path
    fn populated(&self, path: &str) -> Option<Value> {
        self.instance().record()?.populated(path)
    }

    fn to_object(&self, options: ToObjectOptions) -> Value {
        self.instance()
            .record()
            .map_or(Value::Null, |record| record.to_object(options))
    }

    fn to_json(&self) -> Value {
        self.instance()
            .record()
            .map_or(Value::Null, Document::to_json)
    }

    /// Same stored record, compared by identifier
    fn equals<T: Model>(&self, other: &T) -> bool {
        match (self.instance().record(), other.instance().record()) {
            (Some(a), Some(b)) => a.equals(b),
            _ => false,
        }
    }

    /// Requests a version bump on the next save
    fn increment(&self) {
        if let Some(record) = self.instance().record() {
            record.increment();
        }
    }

    fn is_modified(&self, path: Option<&str>) -> bool {
        self.instance()
            .record()
            .map_or(false, |record| record.is_modified(path))
    }

    fn modified_paths(&self) -> Vec<String> {
        self.instance()
            .record()
            .map(Document::modified_paths)
            .unwrap_or_default()
    }

    fn mark_modified(&self, path: &str) {
        if let Some(record) = self.instance().record() {
            record.mark_modified(path);
        }
    }

    fn unmark_modified(&self, path: &str) {
        if let Some(record) = self.instance().record() {
            record.unmark_modified(path);
        }
    }

    /// Records a validation failure reported by the next validation
    fn invalidate(&self, path: &str, message: &str, value: Value) {
        if let Some(record) = self.instance().record() {
            record.invalidate(path, message, value);
        }
    }

    /// The wrapper's instance, detached from the static type
    fn to_instance(&self) -> Instance {
        self.instance().clone()
    }
}

impl<M: Model> ModelExt for M {}
