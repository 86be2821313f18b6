//! Method metadata registry
//!
//! A method declaration attaches one user function to lifecycle hooks
//! (`pre`/`post`), to field validation (`validate`), or both kinds of
//! slot the body supports. [`declare_method`] records it as a
//! [`MethodSignature`] in declaration order; the materializer wires the
//! signatures into the compiled schema.

mod body;
mod options;
mod signature;

pub use body::{HookFn, MethodBody};
pub use options::MethodOptions;
pub use signature::MethodSignature;

pub(crate) use signature::declare_method;
