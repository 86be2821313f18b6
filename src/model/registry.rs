//! Model registry
//!
//! Maps Rust types to compiled models. Registration is all-or-nothing:
//! a definition that fails part-way leaves neither the registry nor the
//! engine holding the model.

use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use crate::config::OdmConfig;
use crate::observability::{log_event_with_fields, Event, Logger};
use crate::record::Collection;
use crate::schema::{OdmError, OdmResult, SchemaOptions};
use crate::store::{Engine, StoreError};

use super::binding::ModelSlot;
use super::builder::ModelBuilder;
use super::compiled::CompiledModel;
use super::materializer::finalize;
use super::Model;

pub(crate) struct RegistryShared {
    engine: Engine,
    config: OdmConfig,
    models: RwLock<HashMap<TypeId, Arc<CompiledModel>>>,
}

fn poisoned<T>(err: PoisonError<T>) -> OdmError {
    StoreError::Internal(format!("model registry lock poisoned: {}", err)).into()
}

impl RegistryShared {
    pub(crate) fn engine(&self) -> &Engine {
        &self.engine
    }

    pub(crate) fn config(&self) -> &OdmConfig {
        &self.config
    }

    pub(crate) fn lookup(&self, type_id: TypeId) -> Option<Arc<CompiledModel>> {
        self.models
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&type_id)
            .cloned()
    }

    pub(crate) fn is_mapped(&self, type_id: TypeId) -> bool {
        self.lookup(type_id).is_some()
    }
}

#[derive(Clone)]
pub struct ModelRegistry {
    shared: Arc<RegistryShared>,
}

impl ModelRegistry {
    /// Registry over `engine`; the config's log level becomes the
    /// process-wide minimum severity
    pub fn new(engine: Engine, config: OdmConfig) -> OdmResult<Self> {
        Logger::set_min_severity(config.severity()?);
        Ok(Self {
            shared: Arc::new(RegistryShared {
                engine,
                config,
                models: RwLock::new(HashMap::new()),
            }),
        })
    }

    /// Registry over a fresh in-memory engine with default configuration
    pub fn in_memory() -> Self {
        Self {
            shared: Arc::new(RegistryShared {
                engine: Engine::in_memory(),
                config: OdmConfig::default(),
                models: RwLock::new(HashMap::new()),
            }),
        }
    }

    pub fn engine(&self) -> &Engine {
        self.shared.engine()
    }

    pub fn config(&self) -> &OdmConfig {
        self.shared.config()
    }

    pub fn register<M: Model>(&self) -> OdmResult<Collection<M>> {
        self.register_inner::<M>(None)
    }

    /// Registers `M` with schema options overriding those it declares
    pub fn register_with<M: Model>(&self, options: SchemaOptions) -> OdmResult<Collection<M>> {
        self.register_inner::<M>(Some(options))
    }

    fn register_inner<M: Model>(&self, options: Option<SchemaOptions>) -> OdmResult<Collection<M>> {
        let type_id = TypeId::of::<M>();
        let compiled = match self.compile::<M>(type_id, options) {
            Ok(compiled) => compiled,
            Err(err) => {
                log_event_with_fields(
                    Event::ModelRejected,
                    &[("model", M::NAME), ("code", err.code().code()), ("error", err.message())],
                );
                return Err(err);
            }
        };
        Ok(Collection::new(compiled))
    }

    fn compile<M: Model>(
        &self,
        type_id: TypeId,
        options: Option<SchemaOptions>,
    ) -> OdmResult<Arc<CompiledModel>> {
        if self.shared.is_mapped(type_id) {
            return Err(OdmError::already_registered(M::NAME));
        }
        let slot = ModelSlot::new();
        let mut builder =
            ModelBuilder::new(M::NAME, type_id, Arc::clone(&self.shared), slot.clone());
        M::define(&mut builder)?;
        let compiled = Arc::new(finalize(
            builder,
            options,
            M::customize_schema,
            &self.shared,
        )?);
        slot.fill(&compiled);

        let mut models = self.shared.models.write().map_err(poisoned)?;
        models.insert(type_id, Arc::clone(&compiled));
        Ok(compiled)
    }

    /// Collection of an already registered model
    pub fn collection<M: Model>(&self) -> OdmResult<Collection<M>> {
        self.compiled::<M>().map(Collection::new)
    }

    pub fn compiled<M: Model>(&self) -> OdmResult<Arc<CompiledModel>> {
        self.shared
            .lookup(TypeId::of::<M>())
            .ok_or_else(|| OdmError::not_registered(M::NAME))
    }

    pub fn is_mapped<M: Model>(&self) -> bool {
        self.shared.is_mapped(TypeId::of::<M>())
    }

    pub fn model_names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self
            .shared
            .models
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(|m| m.name())
            .collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.shared
            .models
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forgets every model here and in the engine; stored records are
    /// kept. Returns how many models were registered.
    pub fn teardown(&self) -> OdmResult<usize> {
        let count = {
            let mut models = self.shared.models.write().map_err(poisoned)?;
            let count = models.len();
            models.clear();
            count
        };
        self.shared.engine.clear_models()?;
        log_event_with_fields(
            Event::RegistryTeardown,
            &[("models", &count.to_string())],
        );
        Ok(count)
    }
}

impl fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelRegistry")
            .field("models", &self.model_names())
            .field("config", &self.shared.config)
            .finish()
    }
}
