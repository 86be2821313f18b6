//! Field metadata registry
//!
//! Every field declaration passes through [`declare_field`] once, in
//! declaration order, before its model is finalized. The result is kept
//! twice in [`ModelMetadata`]: a raw form that still names mapped types
//! and an engine form where references are collection-facing names and
//! sub-documents are compiled child schemas.
//!
//! # Pipeline
//!
//! 1. Alias normalization (`refer` becomes `ref`, logged as deprecated)
//! 2. Shorthand expansion and implicit `ObjectId` injection
//! 3. Sub-document processing, or validator wrapping and type resolution
//! 4. Raw/engine split

mod hint;
mod metadata;
mod normalize;
mod reference;
mod registry;
mod subdoc;
mod validators;

pub use hint::{hint_of, Hint, Ref, TypeHint};
pub use metadata::ModelMetadata;

pub(crate) use reference::{declares_hidden, reference_target};
pub(crate) use registry::{declare_field, FieldContext};
pub(crate) use subdoc::is_subdoc;
