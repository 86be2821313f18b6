//! Builders for field declarations

use indexmap::IndexMap;
use regex::Regex;
use serde_json::Value;

use crate::model::Model;
use crate::tree::Tree;

use super::types::{keys, Declaration, FieldType, Marker, ModelRef, SchemaOptions, TransformFn};
use super::validator::ValidateSpec;

/// Descriptor for one field.
///
/// An empty `Field` means "infer everything from the type hint".
#[derive(Debug, Clone, Default)]
pub struct Field {
    options: IndexMap<String, Declaration>,
}

impl Field {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn of(field_type: FieldType) -> Self {
        Self::new().field_type(field_type)
    }

    pub fn string() -> Self {
        Self::of(FieldType::String)
    }

    pub fn number() -> Self {
        Self::of(FieldType::Number)
    }

    pub fn boolean() -> Self {
        Self::of(FieldType::Boolean)
    }

    pub fn date() -> Self {
        Self::of(FieldType::Date)
    }

    pub fn buffer() -> Self {
        Self::of(FieldType::Buffer)
    }

    pub fn mixed() -> Self {
        Self::of(FieldType::Mixed)
    }

    /// Reference to another mapped type
    pub fn reference<M: Model>() -> Self {
        Self::new().reference_to(ModelRef::of::<M>())
    }

    pub fn field_type(self, field_type: FieldType) -> Self {
        self.option(keys::TYPE, field_type)
    }

    pub fn reference_to(self, target: ModelRef) -> Self {
        self.option(keys::REF, target)
    }

    pub fn required(self) -> Self {
        self.option(keys::REQUIRED, true)
    }

    pub fn default_value(self, value: impl Into<Value>) -> Self {
        self.option(keys::DEFAULT, Declaration::from(value.into()))
    }

    /// Default computed when a document is created
    pub fn default_with(self, f: impl Fn() -> Value + Send + Sync + 'static) -> Self {
        self.option(keys::DEFAULT, TransformFn::new(move |_| f()))
    }

    pub fn select(self, selected: bool) -> Self {
        self.option(keys::SELECT, selected)
    }

    pub fn validate(self, spec: impl Into<ValidateSpec>) -> Self {
        self.option(keys::VALIDATE, spec.into().into_declaration())
    }

    pub fn get(self, f: impl Fn(Value) -> Value + Send + Sync + 'static) -> Self {
        self.option(keys::GET, TransformFn::new(f))
    }

    pub fn set(self, f: impl Fn(Value) -> Value + Send + Sync + 'static) -> Self {
        self.option(keys::SET, TransformFn::new(f))
    }

    pub fn alias(self, name: &str) -> Self {
        self.option(keys::ALIAS, name)
    }

    pub fn index(self) -> Self {
        self.option(keys::INDEX, true)
    }

    pub fn unique(self) -> Self {
        self.option(keys::UNIQUE, true)
    }

    pub fn sparse(self) -> Self {
        self.option(keys::SPARSE, true)
    }

    pub fn lowercase(self) -> Self {
        self.option(keys::LOWERCASE, true)
    }

    pub fn uppercase(self) -> Self {
        self.option(keys::UPPERCASE, true)
    }

    pub fn trim(self) -> Self {
        self.option(keys::TRIM, true)
    }

    pub fn matches(self, pattern: Regex) -> Self {
        self.option(keys::MATCH, pattern)
    }

    pub fn one_of<I, V>(self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        self.option(keys::ENUM, Declaration::from(Value::Array(values)))
    }

    pub fn min(self, bound: f64) -> Self {
        self.option(keys::MIN, bound)
    }

    pub fn max(self, bound: f64) -> Self {
        self.option(keys::MAX, bound)
    }

    /// Store the declared type as an array of it
    pub fn as_array(self) -> Self {
        self.option(keys::AS_ARRAY, true)
    }

    /// Exclude from default external representations
    pub fn hidden(self) -> Self {
        self.option(keys::HIDDEN, true)
    }

    /// Sets any declaration key, overwriting an earlier value
    pub fn option(mut self, key: &str, value: impl Into<Declaration>) -> Self {
        self.options.insert(key.to_string(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    pub fn build(self) -> Declaration {
        Tree::Map(self.options)
    }
}

impl From<Field> for Declaration {
    fn from(field: Field) -> Self {
        field.build()
    }
}

/// Descriptor for an embedded sub-document with its own schema
#[derive(Debug, Clone)]
pub struct Subdoc {
    fields: IndexMap<String, Declaration>,
    options: Option<SchemaOptions>,
    hidden: Vec<String>,
    hide_self: bool,
}

impl Default for Subdoc {
    fn default() -> Self {
        Self::new()
    }
}

impl Subdoc {
    pub fn new() -> Self {
        Self {
            fields: IndexMap::new(),
            options: None,
            hidden: Vec::new(),
            hide_self: false,
        }
    }

    pub fn field(mut self, name: &str, declaration: impl Into<Declaration>) -> Self {
        self.fields.insert(name.to_string(), declaration.into());
        self
    }

    /// Child fields excluded from default external representations
    pub fn hide<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.hidden.extend(names.into_iter().map(Into::into));
        self
    }

    /// Hide the whole sub-document in its parent
    pub fn hidden(mut self) -> Self {
        self.hide_self = true;
        self
    }

    pub fn options(mut self, options: SchemaOptions) -> Self {
        self.options = Some(options);
        self
    }

    pub fn build(self) -> Declaration {
        let mut map = self.fields;
        let marker = match self.options {
            Some(options) => serde_json::to_value(options)
                .map(Declaration::from)
                .unwrap_or(Tree::Bool(true)),
            None => Tree::Bool(true),
        };
        map.insert(keys::SUBDOC.to_string(), marker);
        if self.hide_self {
            map.insert(keys::HIDDEN.to_string(), Tree::Bool(true));
        } else if !self.hidden.is_empty() {
            map.insert(
                keys::HIDDEN.to_string(),
                Tree::Seq(self.hidden.into_iter().map(Tree::String).collect()),
            );
        }
        Tree::Map(map)
    }

    /// Array-of-sub-documents form
    pub fn array(self) -> Declaration {
        Tree::array_of(self.build())
    }
}

impl From<Subdoc> for Declaration {
    fn from(subdoc: Subdoc) -> Self {
        subdoc.build()
    }
}

/// Shorthand for a bare type leaf
pub fn typed(field_type: FieldType) -> Declaration {
    Tree::Leaf(Marker::Type(field_type))
}

/// Shorthand for `{ref: M}`
pub fn reference<M: Model>() -> Declaration {
    Field::reference::<M>().build()
}

/// Shorthand for `[descriptor]`
pub fn array_of(inner: impl Into<Declaration>) -> Declaration {
    Tree::array_of(inner.into())
}
