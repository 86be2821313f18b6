//! Query builder
//!
//! A [`Query`] accumulates a filter, a projection and result options and
//! runs when executed or awaited. Condition helpers (`equals`, `gt`, ...)
//! apply to the path chosen with [`Query::where_path`].

use std::future::{Future, IntoFuture};
use std::pin::Pin;

use serde_json::{Map, Value};

use crate::tree::{json_get, json_remove, json_set};

use super::document::Document;
use super::errors::{StoreError, StoreResult};
use super::model::ModelHandle;
use super::sorter::SortSpec;

/// What a query does with the documents it selects
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOp {
    Find,
    FindOne,
    FindOneAndUpdate { update: Value, return_new: bool },
    FindOneAndRemove,
}

/// Field selection parsed from `"name -email +password"`
#[derive(Debug, Clone, Default, PartialEq)]
struct Projection {
    include: Vec<String>,
    exclude: Vec<String>,
    /// Paths declared `select: false` requested explicitly
    force: Vec<String>,
}

impl Projection {
    fn parse(spec: &str) -> Self {
        let mut projection = Self::default();
        for token in spec.split_whitespace() {
            if let Some(path) = token.strip_prefix('-') {
                projection.exclude.push(path.to_string());
            } else if let Some(path) = token.strip_prefix('+') {
                projection.force.push(path.to_string());
            } else {
                projection.include.push(token.to_string());
            }
        }
        projection
    }

    fn merge(&mut self, other: Projection) {
        self.include.extend(other.include);
        self.exclude.extend(other.exclude);
        self.force.extend(other.force);
    }

    fn check(&self) -> StoreResult<()> {
        let excluded = self.exclude.iter().filter(|p| p.as_str() != "_id").count();
        if !self.include.is_empty() && excluded > 0 {
            return Err(StoreError::InvalidQuery(
                "projection cannot both include and exclude fields".into(),
            ));
        }
        Ok(())
    }

    fn apply(&self, document: Value, deselected: &[&str]) -> Value {
        let mut out = if self.include.is_empty() {
            let mut out = document;
            for path in deselected {
                if !self.force.iter().any(|f| f == path) && !self.include.iter().any(|i| i == path) {
                    json_remove(&mut out, path);
                }
            }
            out
        } else {
            let mut out = Value::Object(Map::new());
            if let Some(id) = document.get("_id") {
                json_set(&mut out, "_id", id.clone());
            }
            for path in self.include.iter().chain(self.force.iter()) {
                if let Some(value) = json_get(&document, path) {
                    json_set(&mut out, path, value.clone());
                }
            }
            out
        };
        for path in &self.exclude {
            json_remove(&mut out, path);
        }
        out
    }
}

#[must_use = "queries do nothing until executed or awaited"]
#[derive(Debug, Clone)]
pub struct Query {
    model: ModelHandle,
    op: QueryOp,
    filter: Map<String, Value>,
    projection: Projection,
    sort: SortSpec,
    skip: usize,
    limit: Option<usize>,
    populate: Vec<String>,
    current_path: Option<String>,
    error: Option<String>,
}

impl Query {
    pub(crate) fn new(model: ModelHandle, op: QueryOp, filter: Value) -> Self {
        let (filter, error) = match filter {
            Value::Object(map) => (map, None),
            Value::Null => (Map::new(), None),
            other => (Map::new(), Some(format!("filter must be an object, got {}", other))),
        };
        Self {
            model,
            op,
            filter,
            projection: Projection::default(),
            sort: SortSpec::new(),
            skip: 0,
            limit: None,
            populate: Vec::new(),
            current_path: None,
            error,
        }
    }

    pub fn model(&self) -> &ModelHandle {
        &self.model
    }

    pub fn op(&self) -> &QueryOp {
        &self.op
    }

    /// Current filter document
    pub fn conditions(&self) -> Value {
        Value::Object(self.filter.clone())
    }

    /// Merges more conditions into the filter
    pub fn filter(mut self, conditions: Value) -> Self {
        match conditions {
            Value::Object(map) => self.filter.extend(map),
            other => self.error = Some(format!("filter must be an object, got {}", other)),
        }
        self
    }

    /// Selects the path the following condition helpers apply to
    pub fn where_path(mut self, path: &str) -> Self {
        self.current_path = Some(path.to_string());
        self
    }

    pub fn equals(mut self, value: impl Into<Value>) -> Self {
        match self.current_path.clone() {
            Some(path) => {
                self.filter.insert(path, value.into());
            }
            None => self.error = Some("equals() needs a path; call where_path() first".into()),
        }
        self
    }

    fn condition(mut self, op: &str, value: Value) -> Self {
        let Some(path) = self.current_path.clone() else {
            self.error = Some(format!("{} needs a path; call where_path() first", op));
            return self;
        };
        let entry = self
            .filter
            .entry(path)
            .or_insert_with(|| Value::Object(Map::new()));
        if !entry.as_object().map_or(false, |o| o.keys().all(|k| k.starts_with('$'))) {
            *entry = Value::Object(Map::new());
        }
        if let Value::Object(ops) = entry {
            ops.insert(op.to_string(), value);
        }
        self
    }

    pub fn gt(self, value: impl Into<Value>) -> Self {
        self.condition("$gt", value.into())
    }

    pub fn gte(self, value: impl Into<Value>) -> Self {
        self.condition("$gte", value.into())
    }

    pub fn lt(self, value: impl Into<Value>) -> Self {
        self.condition("$lt", value.into())
    }

    pub fn lte(self, value: impl Into<Value>) -> Self {
        self.condition("$lte", value.into())
    }

    pub fn ne(self, value: impl Into<Value>) -> Self {
        self.condition("$ne", value.into())
    }

    pub fn is_in<I, V>(self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values = values.into_iter().map(Into::into).collect();
        self.condition("$in", Value::Array(values))
    }

    pub fn nin<I, V>(self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values = values.into_iter().map(Into::into).collect();
        self.condition("$nin", Value::Array(values))
    }

    /// Sort spec such as `{"age": -1}`
    pub fn sort(mut self, spec: Value) -> Self {
        self.sort = SortSpec::from_json(&spec);
        self
    }

    pub fn sort_by(mut self, spec: SortSpec) -> Self {
        self.sort = spec;
        self
    }

    pub fn skip(mut self, n: usize) -> Self {
        self.skip = n;
        self
    }

    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }

    /// Field selection: `"name age"`, `"-email"`, `"+password"`
    pub fn select(mut self, spec: &str) -> Self {
        self.projection.merge(Projection::parse(spec));
        self
    }

    /// Reference paths to populate, space separated
    pub fn populate(mut self, paths: &str) -> Self {
        self.populate
            .extend(paths.split_whitespace().map(str::to_string));
        self
    }

    fn selected(&self) -> StoreResult<Vec<Value>> {
        if let Some(error) = &self.error {
            return Err(StoreError::InvalidQuery(error.clone()));
        }
        self.projection.check()?;
        let mut docs = self.model.scan_matching(&self.conditions())?;
        self.sort.sort(&mut docs);
        let limit = match self.op {
            QueryOp::Find => self.limit,
            _ => Some(1),
        };
        Ok(docs
            .into_iter()
            .skip(self.skip)
            .take(limit.unwrap_or(usize::MAX))
            .collect())
    }

    async fn load(&self, data: Value) -> StoreResult<Document> {
        let schema = self.model.schema();
        let projected = self.projection.apply(data, &schema.deselected());
        let doc = self.model.init(projected).await?;
        if !self.populate.is_empty() {
            self.model.populate_document(&doc, &self.populate).await?;
        }
        Ok(doc)
    }

    /// Runs the query; single-record operations yield at most one document
    pub async fn exec(self) -> StoreResult<Vec<Document>> {
        let selected = self.selected()?;
        let mut out = Vec::with_capacity(selected.len());
        match &self.op {
            QueryOp::Find | QueryOp::FindOne => {
                for data in selected {
                    out.push(self.load(data).await?);
                }
            }
            QueryOp::FindOneAndUpdate { update, return_new } => {
                if let Some(original) = selected.into_iter().next() {
                    let updated = self.model.update_stored(&original, update)?;
                    let shown = if *return_new { updated } else { original };
                    out.push(self.load(shown).await?);
                }
            }
            QueryOp::FindOneAndRemove => {
                if let Some(original) = selected.into_iter().next() {
                    if let Some(id) = original.get("_id").and_then(Value::as_str) {
                        self.model.delete_by_id(id)?;
                    }
                    out.push(self.load(original).await?);
                }
            }
        }
        Ok(out)
    }

    pub async fn exec_one(self) -> StoreResult<Option<Document>> {
        Ok(self.exec().await?.into_iter().next())
    }
}

impl IntoFuture for Query {
    type Output = StoreResult<Vec<Document>>;
    type IntoFuture = Pin<Box<dyn Future<Output = Self::Output> + Send>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.exec())
    }
}
