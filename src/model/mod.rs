//! Mapped types and their registry
//!
//! A type becomes a model by implementing [`Model`]: it names itself,
//! declares fields and methods through a [`ModelBuilder`], and wraps an
//! [`Instance`]. [`ModelRegistry::register`] runs the declarations and
//! materializes the compiled schema.
//!
//! # Registration Flow
//!
//! 1. `Model::define` declares fields and methods in order
//! 2. Accessors are derived from the raw field tree
//! 3. The engine schema is compiled, validators and hooks attached
//! 4. `Model::customize_schema` may adjust the schema
//! 5. The schema is registered under the model name and the slot filled
//!
//! A failure at any step leaves nothing registered.

mod accessors;
mod binding;
mod builder;
mod compiled;
mod materializer;
mod naming;
mod registry;

pub use accessors::{AccessorKind, AccessorTable};
pub use binding::ModelSlot;
pub use builder::ModelBuilder;
pub use compiled::CompiledModel;
pub use naming::collection_name;
pub use registry::ModelRegistry;

pub(crate) use binding::{bind_hook, bind_validator};

use crate::record::Instance;
use crate::schema::OdmResult;
use crate::store::Schema;

/// A Rust type mapped onto a collection.
///
/// ```ignore
/// struct User(Instance);
///
/// impl Model for User {
///     const NAME: &'static str = "User";
///
///     fn define(m: &mut ModelBuilder) -> OdmResult<()> {
///         m.field::<String>("name", Field::new().required())?;
///         Ok(())
///     }
///
///     fn from_instance(instance: Instance) -> Self {
///         User(instance)
///     }
///
///     fn instance(&self) -> &Instance {
///         &self.0
///     }
/// }
/// ```
pub trait Model: Sized + Send + Sync + 'static {
    /// Model name; also the reference value stored in other models
    const NAME: &'static str;

    fn define(model: &mut ModelBuilder) -> OdmResult<()>;

    /// Last chance to adjust the compiled schema before registration
    fn customize_schema(_schema: &mut Schema) {}

    fn from_instance(instance: Instance) -> Self;

    fn instance(&self) -> &Instance;
}
