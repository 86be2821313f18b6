//! Declaration vocabulary
//!
//! A field declaration is a [`Declaration`]: a tree whose data nodes are
//! option values and whose leaves are [`Marker`]s carrying things JSON
//! cannot hold (types, model references, functions, compiled schemas).

use std::any::TypeId;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::model::Model;
use crate::store::{Schema, ValidatorDescriptor};
use crate::tree::Tree;

use super::validator::ValidatorFn;

/// Declaration keys recognised by the mapping layer
pub mod keys {
    pub const TYPE: &str = "type";
    pub const REF: &str = "ref";
    /// Deprecated spelling of [`REF`]
    pub const REFER: &str = "refer";
    pub const SUBDOC: &str = "subdoc";
    pub const HIDDEN: &str = "hidden";
    pub const AS_ARRAY: &str = "asArray";
    pub const VALIDATE: &str = "validate";
    pub const VALIDATOR: &str = "validator";
    pub const MESSAGE: &str = "message";
    pub const REQUIRED: &str = "required";
    pub const DEFAULT: &str = "default";
    pub const SELECT: &str = "select";
    pub const GET: &str = "get";
    pub const SET: &str = "set";
    pub const ALIAS: &str = "alias";
    pub const INDEX: &str = "index";
    pub const UNIQUE: &str = "unique";
    pub const SPARSE: &str = "sparse";
    pub const LOWERCASE: &str = "lowercase";
    pub const UPPERCASE: &str = "uppercase";
    pub const TRIM: &str = "trim";
    pub const MATCH: &str = "match";
    pub const ENUM: &str = "enum";
    pub const MIN: &str = "min";
    pub const MAX: &str = "max";

    /// Keys that make a mapping a field descriptor rather than a nested object
    pub const DESCRIPTOR_KEYS: &[&str] = &[
        TYPE, REF, REFER, SUBDOC, AS_ARRAY, VALIDATE, REQUIRED, DEFAULT, SELECT, GET, SET, ALIAS,
        INDEX, UNIQUE, SPARSE, LOWERCASE, UPPERCASE, TRIM, MATCH, ENUM, MIN, MAX,
    ];
}

/// Storage types understood by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldType {
    String,
    Number,
    Boolean,
    Date,
    Buffer,
    /// Opaque record identifier, the backing type of every reference
    ObjectId,
    Mixed,
}

impl FieldType {
    pub fn name(&self) -> &'static str {
        match self {
            FieldType::String => "String",
            FieldType::Number => "Number",
            FieldType::Boolean => "Boolean",
            FieldType::Date => "Date",
            FieldType::Buffer => "Buffer",
            FieldType::ObjectId => "ObjectId",
            FieldType::Mixed => "Mixed",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for FieldType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "String" | "string" => Ok(FieldType::String),
            "Number" | "number" => Ok(FieldType::Number),
            "Boolean" | "boolean" => Ok(FieldType::Boolean),
            "Date" | "date" => Ok(FieldType::Date),
            "Buffer" | "buffer" => Ok(FieldType::Buffer),
            "ObjectId" | "objectid" => Ok(FieldType::ObjectId),
            "Mixed" | "mixed" => Ok(FieldType::Mixed),
            other => Err(format!("unknown field type '{}'", other)),
        }
    }
}

/// Handle naming another mapped type inside a declaration
#[derive(Debug, Clone, Copy)]
pub struct ModelRef {
    type_id: TypeId,
    name: &'static str,
}

impl ModelRef {
    pub fn of<M: Model>() -> Self {
        Self {
            type_id: TypeId::of::<M>(),
            name: M::NAME,
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Canonical model name, also the reference value the engine sees
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for ModelRef {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for ModelRef {}

/// Value transform used by `get`/`set` options and function defaults
#[derive(Clone)]
pub struct TransformFn(Arc<dyn Fn(Value) -> Value + Send + Sync>);

impl TransformFn {
    pub fn new(f: impl Fn(Value) -> Value + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    pub fn apply(&self, value: Value) -> Value {
        (self.0)(value)
    }
}

impl fmt::Debug for TransformFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TransformFn")
    }
}

/// Leaf payload of a declaration tree
#[derive(Debug, Clone)]
pub enum Marker {
    Type(FieldType),
    Model(ModelRef),
    /// User validator as declared
    Validator(ValidatorFn),
    /// Validators after normalization, ready for the engine
    Validators(Vec<ValidatorDescriptor>),
    Transform(TransformFn),
    /// Compiled child schema replacing a sub-document declaration
    Schema(Arc<Schema>),
}

impl PartialEq for Marker {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Marker::Type(a), Marker::Type(b)) => a == b,
            (Marker::Model(a), Marker::Model(b)) => a == b,
            (Marker::Validator(a), Marker::Validator(b)) => a == b,
            (Marker::Validators(a), Marker::Validators(b)) => a == b,
            (Marker::Transform(a), Marker::Transform(b)) => Arc::ptr_eq(&a.0, &b.0),
            (Marker::Schema(a), Marker::Schema(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// A field declaration tree
pub type Declaration = Tree<Marker>;

impl From<FieldType> for Declaration {
    fn from(t: FieldType) -> Self {
        Tree::Leaf(Marker::Type(t))
    }
}

impl From<ModelRef> for Declaration {
    fn from(r: ModelRef) -> Self {
        Tree::Leaf(Marker::Model(r))
    }
}

impl From<ValidatorFn> for Declaration {
    fn from(v: ValidatorFn) -> Self {
        Tree::Leaf(Marker::Validator(v))
    }
}

impl From<TransformFn> for Declaration {
    fn from(t: TransformFn) -> Self {
        Tree::Leaf(Marker::Transform(t))
    }
}

/// Whole-schema options
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaOptions {
    /// Physical collection name, overriding the derived one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collection: Option<String>,
    /// Overrides the registry-wide timestamp setting
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamps: Option<bool>,
    /// Drop undeclared fields when constructing documents (default true)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strict: Option<bool>,
    /// Overrides the registry-wide version key
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version_key: Option<String>,
    /// Engine options this layer does not interpret
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SchemaOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn collection(mut self, name: impl Into<String>) -> Self {
        self.collection = Some(name.into());
        self
    }

    pub fn timestamps(mut self, enabled: bool) -> Self {
        self.timestamps = Some(enabled);
        self
    }

    pub fn strict(mut self, enabled: bool) -> Self {
        self.strict = Some(enabled);
        self
    }

    pub fn is_strict(&self) -> bool {
        self.strict.unwrap_or(true)
    }

    /// Reads options from the value of a `subdoc` key.
    ///
    /// `true` means defaults; a mapping is read field by field and any
    /// unparseable content falls back to defaults.
    pub fn from_declaration(tree: &Declaration) -> Self {
        match tree.to_json() {
            Some(value @ Value::Object(_)) => serde_json::from_value(value).unwrap_or_default(),
            _ => Self::default(),
        }
    }
}
