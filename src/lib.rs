//! aeromodel - typed object-document mapping
//!
//! Rust types declare their fields and methods once; the mapping layer
//! normalizes the declarations, compiles them into a document store
//! schema and wraps every record the store returns in the declaring
//! type.
//!
//! # Layers
//!
//! - `tree`: generic nested-tree utilities the declaration pipeline runs on
//! - `schema`: declaration vocabulary, options and errors
//! - `field` / `method`: field and method metadata registries
//! - `model`: the `Model` trait, registry and schema materializer
//! - `record`: typed wrappers, collections and record operations
//! - `store`: the in-memory document store models compile into

pub mod config;
pub mod field;
pub mod method;
pub mod model;
pub mod observability;
pub mod record;
pub mod schema;
pub mod store;
pub mod tree;

pub use config::OdmConfig;
pub use field::{Ref, TypeHint};
pub use method::{HookFn, MethodBody, MethodOptions};
pub use model::{Model, ModelBuilder, ModelRegistry};
pub use record::{Accessed, Collection, Instance, ModelExt, Subdocument};
pub use schema::{
    array_of, reference, typed, Field, FieldType, OdmError, OdmErrorCode, OdmResult,
    SchemaOptions, Subdoc, ValidateSpec, ValidatorFn,
};
