//! Declaration surface handed to `Model::define`

use std::any::TypeId;
use std::sync::Arc;

use crate::field::{declare_field, hint_of, FieldContext, Hint, ModelMetadata, TypeHint};
use crate::method::{declare_method, MethodBody, MethodOptions};
use crate::schema::{Declaration, ModelRef, OdmResult, SchemaOptions};

use super::binding::ModelSlot;
use super::registry::RegistryShared;

/// Collects field and method declarations for one model.
///
/// Declarations are processed immediately, in call order; the first
/// failure aborts the definition.
pub struct ModelBuilder {
    name: &'static str,
    type_id: TypeId,
    metadata: ModelMetadata,
    options: Option<SchemaOptions>,
    registry: Arc<RegistryShared>,
    slot: ModelSlot,
}

pub(crate) struct BuilderParts {
    pub(crate) name: &'static str,
    pub(crate) type_id: TypeId,
    pub(crate) metadata: ModelMetadata,
    pub(crate) options: Option<SchemaOptions>,
}

impl ModelBuilder {
    pub(crate) fn new(
        name: &'static str,
        type_id: TypeId,
        registry: Arc<RegistryShared>,
        slot: ModelSlot,
    ) -> Self {
        Self {
            name,
            type_id,
            metadata: ModelMetadata::new(),
            options: None,
            registry,
            slot,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }

    /// Declares a field whose Rust type is `T`.
    ///
    /// `T` supplies the storage type when the declaration names none;
    /// use [`crate::field::Ref`] for references to other models.
    pub fn field<T: TypeHint>(
        &mut self,
        name: &str,
        declaration: impl Into<Declaration>,
    ) -> OdmResult<&mut Self> {
        self.declare(name, declaration.into(), &hint_of::<T>())?;
        Ok(self)
    }

    /// Declares a field with no type hint; the declaration must be complete
    pub fn property(
        &mut self,
        name: &str,
        declaration: impl Into<Declaration>,
    ) -> OdmResult<&mut Self> {
        self.declare(name, declaration.into(), &Hint::None)?;
        Ok(self)
    }

    pub fn method(
        &mut self,
        name: &str,
        options: MethodOptions,
        body: impl Into<MethodBody>,
    ) -> OdmResult<&mut Self> {
        declare_method(
            self.name,
            &self.slot,
            &mut self.metadata,
            name,
            options,
            body.into(),
        )?;
        Ok(self)
    }

    /// Whole-schema options; options passed to registration take precedence
    pub fn options(&mut self, options: SchemaOptions) -> &mut Self {
        self.options = Some(options);
        self
    }

    fn declare(&mut self, name: &str, declaration: Declaration, hint: &Hint) -> OdmResult<()> {
        let own = self.type_id;
        let registry = Arc::clone(&self.registry);
        let resolve = move |target: &ModelRef| {
            target.type_id() == own || registry.is_mapped(target.type_id())
        };
        let ctx = FieldContext {
            model: self.name,
            slot: &self.slot,
            resolve: &resolve,
        };
        declare_field(&ctx, &mut self.metadata, name, declaration, hint)
    }

    pub(crate) fn into_parts(self) -> BuilderParts {
        BuilderParts {
            name: self.name,
            type_id: self.type_id,
            metadata: self.metadata,
            options: self.options,
        }
    }
}
