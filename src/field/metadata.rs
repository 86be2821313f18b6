//! Per-model declaration record

use indexmap::IndexMap;

use crate::method::MethodSignature;
use crate::schema::{Declaration, SchemaOptions};
use crate::tree::Tree;

/// Everything declared for one mapped type, in declaration order.
///
/// `raw_properties` keeps model references and the `subdoc`/`hidden`
/// flags; `properties` is the same tree rewritten for the engine. Both
/// always hold the same field names.
#[derive(Debug, Clone, Default)]
pub struct ModelMetadata {
    raw_properties: IndexMap<String, Declaration>,
    properties: IndexMap<String, Declaration>,
    schema_options: SchemaOptions,
    method_signatures: Vec<MethodSignature>,
}

impl ModelMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raw_properties(&self) -> &IndexMap<String, Declaration> {
        &self.raw_properties
    }

    pub fn properties(&self) -> &IndexMap<String, Declaration> {
        &self.properties
    }

    pub fn schema_options(&self) -> &SchemaOptions {
        &self.schema_options
    }

    pub fn method_signatures(&self) -> &[MethodSignature] {
        &self.method_signatures
    }

    pub fn raw(&self, field: &str) -> Option<&Declaration> {
        self.raw_properties.get(field)
    }

    pub fn property(&self, field: &str) -> Option<&Declaration> {
        self.properties.get(field)
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.properties.keys().map(String::as_str).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty() && self.method_signatures.is_empty()
    }

    /// Engine-facing field tree
    pub fn properties_tree(&self) -> Declaration {
        Tree::Map(self.properties.clone())
    }

    /// Field tree with model references intact
    pub fn raw_tree(&self) -> Declaration {
        Tree::Map(self.raw_properties.clone())
    }

    /// Stores both forms of a field; redeclaring a field replaces it in place
    pub(crate) fn insert_field(&mut self, name: &str, driver: Declaration, raw: Declaration) {
        self.properties.insert(name.to_string(), driver);
        self.raw_properties.insert(name.to_string(), raw);
    }

    pub(crate) fn set_schema_options(&mut self, options: SchemaOptions) {
        self.schema_options = options;
    }

    pub(crate) fn push_method(&mut self, signature: MethodSignature) {
        self.method_signatures.push(signature);
    }
}
