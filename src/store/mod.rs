//! Document store engine
//!
//! The layer mapped models are compiled into: schemas, documents, queries,
//! lifecycle hooks, validation and a pluggable storage backend.
//!
//! # Execution Flow (save)
//!
//! 1. Run pre-validate hooks
//! 2. Validate every path (cast failures, built-ins, path validators)
//! 3. Run post-validate hooks, then pre-save hooks
//! 4. Cast and persist; check unique paths; maintain the version key
//! 5. Run post-save hooks
//!
//! # Invariants
//!
//! - Hooks and validators run in registration order
//! - A failing hook or validator aborts the operation before persistence
//! - Document locks are never held while user code runs

mod aggregate;
mod backend;
mod document;
mod engine;
mod errors;
mod filter;
mod hooks;
mod model;
mod plugin;
mod query;
mod schema;
mod sorter;
mod update;
mod validation;

pub use aggregate::{run_pipeline, Emitter, MapReduce, MapReduceOutput};
pub use backend::{new_object_id, InMemoryStorage, StorageBackend};
pub use document::{Document, ToObjectOptions};
pub use engine::Engine;
pub use errors::{StoreError, StoreResult, ValidationError, ValidatorError};
pub use filter::FilterMatcher;
pub use hooks::{DocHook, HookDone, HookPhase, Hooks, Lifecycle};
pub use model::{ModelHandle, UpdateOptions, UpdateResult};
pub use plugin::{SchemaPlugin, TimestampPlugin};
pub use query::{Query, QueryOp};
pub use schema::{DefaultValue, PathKind, PathOptions, Schema, SchemaPath, TimestampFields};
pub use sorter::{SortDirection, SortSpec};
pub use update::{apply_update, check_update};
pub use validation::{
    render_message, DocValidator, ValidatorDescriptor, ValidatorDone, DEFAULT_VALIDATOR_MESSAGE,
};
