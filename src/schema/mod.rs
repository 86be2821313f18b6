//! Declaration vocabulary for mapped models
//!
//! Field declarations are trees built with [`Field`] and [`Subdoc`] (or
//! directly as [`Declaration`] values) and handed to a
//! [`ModelBuilder`](crate::model::ModelBuilder).
//!
//! # Design Principles
//!
//! - `ref` is the canonical reference key, `refer` a deprecated alias
//! - Every reference is backed by an `ObjectId` storage type
//! - Registration errors are fatal and never swallowed

mod errors;
mod field;
mod types;
mod validator;

pub use errors::{OdmError, OdmErrorCode, OdmResult, Severity};
pub use field::{array_of, reference, typed, Field, Subdoc};
pub use types::{keys, Declaration, FieldType, Marker, ModelRef, SchemaOptions, TransformFn};
pub use validator::{ValidateSpec, ValidatorFn};
