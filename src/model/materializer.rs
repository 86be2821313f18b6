//! Schema materialization
//!
//! Turns a finished [`ModelBuilder`] into a [`CompiledModel`] registered
//! with the engine.

use std::sync::Arc;

use crate::config::OdmConfig;
use crate::field::declares_hidden;
use crate::observability::{log_event_with_fields, Event};
use crate::schema::{OdmError, OdmResult, SchemaOptions};
use crate::store::{Engine, HookPhase, Lifecycle, Schema, StoreError, TimestampPlugin, ValidatorDescriptor};

use super::accessors::AccessorTable;
use super::builder::ModelBuilder;
use super::compiled::CompiledModel;
use super::naming::collection_name;
use super::registry::RegistryShared;

pub(crate) fn finalize(
    builder: ModelBuilder,
    options: Option<SchemaOptions>,
    customize: fn(&mut Schema),
    registry: &Arc<RegistryShared>,
) -> OdmResult<CompiledModel> {
    let parts = builder.into_parts();
    let mut metadata = parts.metadata;
    if let Some(options) = options.or(parts.options) {
        metadata.set_schema_options(options);
    }

    let accessors = AccessorTable::build(metadata.raw_properties());
    let mut schema = compile(registry.engine(), registry.config(), &metadata)?;

    for signature in metadata.method_signatures() {
        if let Some(validator) = signature.validator() {
            for field in signature.validated_fields() {
                // Paths the schema does not know are skipped
                schema.attach_validator(
                    field,
                    ValidatorDescriptor::new(
                        validator.clone(),
                        signature.message().map(str::to_string),
                    ),
                );
            }
        }
        if let Some(hook) = signature.hook() {
            let phases = [
                (HookPhase::Pre, signature.pre_hooks()),
                (HookPhase::Post, signature.post_hooks()),
            ];
            for (phase, names) in phases {
                for lifecycle in names.iter().filter_map(|n| n.parse::<Lifecycle>().ok()) {
                    schema.register_hook(phase, lifecycle, hook.clone());
                }
            }
        }
    }

    customize(&mut schema);

    let config = registry.config();
    let collection = metadata
        .schema_options()
        .collection
        .clone()
        .unwrap_or_else(|| collection_name(parts.name, config.pluralize_collections));
    let handle = registry
        .engine()
        .model(parts.name, schema, &collection)
        .map_err(|err| match err {
            StoreError::ModelExists(_) => OdmError::already_registered(parts.name),
            other => other.into(),
        })?;

    let fields = metadata.field_names().len().to_string();
    log_event_with_fields(
        Event::ModelRegistered,
        &[
            ("model", parts.name),
            ("collection", &collection),
            ("fields", &fields),
        ],
    );

    Ok(CompiledModel {
        name: parts.name,
        type_id: parts.type_id,
        collection,
        metadata,
        accessors,
        handle,
        registry: Arc::downgrade(registry),
    })
}

fn compile(
    engine: &Engine,
    config: &OdmConfig,
    metadata: &crate::field::ModelMetadata,
) -> OdmResult<Schema> {
    let options = metadata.schema_options();
    let mut schema = engine.schema(&metadata.properties_tree(), options)?;
    for (field, raw) in metadata.raw_properties() {
        if declares_hidden(raw) {
            schema.hide(field.clone());
        }
    }
    if options.timestamps.unwrap_or(config.timestamps) {
        schema.apply_plugin(&TimestampPlugin::new(
            &config.created_at_field,
            &config.updated_at_field,
        ));
    }
    schema.set_version_key(
        options
            .version_key
            .clone()
            .unwrap_or_else(|| config.version_key.clone()),
    );
    schema.attach_raw(metadata.raw_tree());
    Ok(schema)
}
