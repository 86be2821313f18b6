//! Typed record wrapper
//!
//! A model value is a thin wrapper around an [`Instance`]: the engine
//! document plus the compiled model it came from. Reads go through the
//! model's accessor table, so populated references come back as the
//! referenced model and sub-documents as handles into the owning record.
//! [`Collection`] rewraps every document a query returns; [`ModelExt`]
//! adds record operations to every model type.

mod collection;
mod ext;
mod instance;

pub use collection::{Collection, FindMany, FindOne};
pub use ext::ModelExt;
pub use instance::{Accessed, Instance, Subdocument};
