//! Typed collection operations
//!
//! Every engine document a query returns is rewrapped as the model type
//! it was requested through.

use std::fmt;
use std::future::{Future, IntoFuture};
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;

use crate::model::{CompiledModel, Model};
use crate::schema::OdmResult;
use crate::store::{
    Document, MapReduce, MapReduceOutput, ModelHandle, Query, SortSpec, UpdateOptions,
    UpdateResult,
};

use super::instance::Instance;

/// Handle to the collection of a registered model `M`
pub struct Collection<M: Model> {
    model: Arc<CompiledModel>,
    _marker: PhantomData<fn() -> M>,
}

impl<M: Model> Clone for Collection<M> {
    fn clone(&self) -> Self {
        Self::new(Arc::clone(&self.model))
    }
}

impl<M: Model> fmt::Debug for Collection<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collection")
            .field("model", &self.model.name())
            .field("collection", &self.model.collection())
            .finish()
    }
}

impl<M: Model> Collection<M> {
    pub(crate) fn new(model: Arc<CompiledModel>) -> Self {
        Self {
            model,
            _marker: PhantomData,
        }
    }

    pub fn model(&self) -> &Arc<CompiledModel> {
        &self.model
    }

    pub fn handle(&self) -> &ModelHandle {
        self.model.handle()
    }

    pub fn collection_name(&self) -> &str {
        self.model.collection()
    }

    fn wrap(&self, doc: Document) -> M {
        M::from_instance(Instance::new(Arc::clone(&self.model), doc))
    }

    fn wrap_all(&self, docs: Vec<Document>) -> Vec<M> {
        docs.into_iter().map(|doc| self.wrap(doc)).collect()
    }

    /// Wraps `data` as a record of `M`.
    ///
    /// Data carrying the version key is taken as already stored and
    /// adopted as-is; anything else becomes a new unsaved record.
    pub fn construct(&self, data: Value) -> M {
        let schema = self.model.schema();
        let stored = schema
            .version_key()
            .map_or(false, |key| data.get(key).is_some());
        if stored {
            self.hydrate(data)
        } else {
            self.wrap(self.handle().new_document(data))
        }
    }

    /// Wraps an engine document directly
    pub fn adopt(&self, doc: Document) -> M {
        self.wrap(doc)
    }

    /// Wraps stored data without casting
    pub fn hydrate(&self, data: Value) -> M {
        self.wrap(self.handle().hydrate(data))
    }

    pub async fn create(&self, data: Value) -> OdmResult<M> {
        let doc = self.handle().create(data).await?;
        Ok(self.wrap(doc))
    }

    pub async fn create_many(&self, items: Vec<Value>) -> OdmResult<Vec<M>> {
        let docs = self.handle().create_many(items).await?;
        Ok(self.wrap_all(docs))
    }

    pub async fn insert_many(&self, items: Vec<Value>) -> OdmResult<Vec<M>> {
        let docs = self.handle().insert_many(items).await?;
        Ok(self.wrap_all(docs))
    }

    pub fn find(&self, filter: Value) -> FindMany<M> {
        FindMany::new(self.clone(), self.handle().find(filter))
    }

    pub fn where_path(&self, path: &str) -> FindMany<M> {
        FindMany::new(self.clone(), self.handle().where_path(path))
    }

    pub fn find_one(&self, filter: Value) -> FindOne<M> {
        FindOne::new(self.clone(), self.handle().find_one(filter))
    }

    pub fn find_by_id(&self, id: &str) -> FindOne<M> {
        FindOne::new(self.clone(), self.handle().find_by_id(id))
    }

    pub fn find_one_and_update(
        &self,
        filter: Value,
        update: Value,
        options: UpdateOptions,
    ) -> FindOne<M> {
        FindOne::new(
            self.clone(),
            self.handle().find_one_and_update(filter, update, options),
        )
    }

    pub fn find_by_id_and_update(
        &self,
        id: &str,
        update: Value,
        options: UpdateOptions,
    ) -> FindOne<M> {
        FindOne::new(
            self.clone(),
            self.handle().find_by_id_and_update(id, update, options),
        )
    }

    pub fn find_one_and_remove(&self, filter: Value) -> FindOne<M> {
        FindOne::new(self.clone(), self.handle().find_one_and_remove(filter))
    }

    pub fn find_by_id_and_remove(&self, id: &str) -> FindOne<M> {
        FindOne::new(self.clone(), self.handle().find_by_id_and_remove(id))
    }

    pub fn count(&self, filter: Value) -> OdmResult<usize> {
        Ok(self.handle().count(filter)?)
    }

    pub fn distinct(&self, path: &str, filter: Value) -> OdmResult<Vec<Value>> {
        Ok(self.handle().distinct(path, filter)?)
    }

    pub fn update(&self, filter: Value, update: Value, options: UpdateOptions) -> OdmResult<UpdateResult> {
        Ok(self.handle().update(filter, update, options)?)
    }

    pub fn update_one(&self, filter: Value, update: Value) -> OdmResult<UpdateResult> {
        Ok(self.handle().update_one(filter, update)?)
    }

    pub fn update_many(&self, filter: Value, update: Value) -> OdmResult<UpdateResult> {
        Ok(self.handle().update_many(filter, update)?)
    }

    pub fn replace_one(&self, filter: Value, replacement: Value) -> OdmResult<UpdateResult> {
        Ok(self.handle().replace_one(filter, replacement)?)
    }

    pub fn remove(&self, filter: Value) -> OdmResult<usize> {
        Ok(self.handle().remove(filter)?)
    }

    pub fn aggregate(&self, pipeline: &[Value]) -> OdmResult<Vec<Value>> {
        Ok(self.handle().aggregate(pipeline)?)
    }

    pub fn map_reduce(&self, job: &MapReduce) -> OdmResult<Vec<MapReduceOutput>> {
        Ok(self.handle().map_reduce(job)?)
    }
}

macro_rules! query_builders {
    ($name:ident) => {
        impl<M: Model> $name<M> {
            fn new(collection: Collection<M>, query: Query) -> Self {
                Self { collection, query }
            }

            /// The underlying engine query
            pub fn query(&self) -> &Query {
                &self.query
            }

            pub fn filter(self, conditions: Value) -> Self {
                self.map(|q| q.filter(conditions))
            }

            pub fn where_path(self, path: &str) -> Self {
                self.map(|q| q.where_path(path))
            }

            pub fn equals(self, value: impl Into<Value>) -> Self {
                self.map(|q| q.equals(value))
            }

            pub fn gt(self, value: impl Into<Value>) -> Self {
                self.map(|q| q.gt(value))
            }

            pub fn gte(self, value: impl Into<Value>) -> Self {
                self.map(|q| q.gte(value))
            }

            pub fn lt(self, value: impl Into<Value>) -> Self {
                self.map(|q| q.lt(value))
            }

            pub fn lte(self, value: impl Into<Value>) -> Self {
                self.map(|q| q.lte(value))
            }

            pub fn ne(self, value: impl Into<Value>) -> Self {
                self.map(|q| q.ne(value))
            }

            pub fn is_in<I, V>(self, values: I) -> Self
            where
                I: IntoIterator<Item = V>,
                V: Into<Value>,
            {
                self.map(|q| q.is_in(values))
            }

            pub fn nin<I, V>(self, values: I) -> Self
            where
                I: IntoIterator<Item = V>,
                V: Into<Value>,
            {
                self.map(|q| q.nin(values))
            }

            pub fn sort(self, spec: Value) -> Self {
                self.map(|q| q.sort(spec))
            }

            pub fn sort_by(self, spec: SortSpec) -> Self {
                self.map(|q| q.sort_by(spec))
            }

            pub fn skip(self, n: usize) -> Self {
                self.map(|q| q.skip(n))
            }

            pub fn limit(self, n: usize) -> Self {
                self.map(|q| q.limit(n))
            }

            /// Field selection: `"name age"`, `"-email"`, `"+secret"`
            pub fn select(self, spec: &str) -> Self {
                self.map(|q| q.select(spec))
            }

            /// Reference paths to populate, space separated
            pub fn populate(self, paths: &str) -> Self {
                self.map(|q| q.populate(paths))
            }

            fn map(self, f: impl FnOnce(Query) -> Query) -> Self {
                Self {
                    collection: self.collection,
                    query: f(self.query),
                }
            }
        }
    };
}

/// Query yielding every matching record
pub struct FindMany<M: Model> {
    collection: Collection<M>,
    query: Query,
}

query_builders!(FindMany);

impl<M: Model> FindMany<M> {
    pub async fn exec(self) -> OdmResult<Vec<M>> {
        let docs = self.query.exec().await?;
        Ok(self.collection.wrap_all(docs))
    }
}

impl<M: Model> IntoFuture for FindMany<M> {
    type Output = OdmResult<Vec<M>>;
    type IntoFuture = Pin<Box<dyn Future<Output = Self::Output> + Send>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.exec())
    }
}

/// Query yielding at most one record
pub struct FindOne<M: Model> {
    collection: Collection<M>,
    query: Query,
}

query_builders!(FindOne);

impl<M: Model> FindOne<M> {
    pub async fn exec(self) -> OdmResult<Option<M>> {
        let doc = self.query.exec_one().await?;
        Ok(doc.map(|doc| self.collection.wrap(doc)))
    }
}

impl<M: Model> IntoFuture for FindOne<M> {
    type Output = OdmResult<Option<M>>;
    type IntoFuture = Pin<Box<dyn Future<Output = Self::Output> + Send>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.exec())
    }
}
