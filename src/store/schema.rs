//! Compiled schemas
//!
//! A [`Schema`] is compiled from a driver-facing declaration tree. Nested
//! plain objects flatten into dotted paths (`address.city`); sub-documents
//! keep their own compiled child schema.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use base64::Engine as _;
use chrono::{DateTime, NaiveDate, SecondsFormat, TimeZone, Utc};
use indexmap::IndexMap;
use regex::Regex;
use serde_json::{Map, Value};

use crate::schema::{keys, Declaration, FieldType, Marker, SchemaOptions, TransformFn};
use crate::tree::{join_path, json_get, json_get_mut, json_remove, json_set, Tree, TreePath};

use super::errors::{StoreError, StoreResult, ValidatorError};
use super::hooks::{DocHook, HookPhase, Hooks, Lifecycle};
use super::plugin::SchemaPlugin;
use super::validation::ValidatorDescriptor;

/// Keys every document may carry regardless of strictness
const RESERVED_KEYS: &[&str] = &["_id"];

#[derive(Debug, Clone)]
pub enum DefaultValue {
    Value(Value),
    Fn(TransformFn),
}

impl DefaultValue {
    pub fn produce(&self) -> Value {
        match self {
            DefaultValue::Value(v) => v.clone(),
            DefaultValue::Fn(f) => f.apply(Value::Null),
        }
    }
}

/// Per-path options understood by the engine
#[derive(Debug, Clone, Default)]
pub struct PathOptions {
    pub required: bool,
    pub default: Option<DefaultValue>,
    /// Target model name of a reference
    pub reference: Option<String>,
    pub select: Option<bool>,
    pub unique: bool,
    pub index: bool,
    pub sparse: bool,
    pub lowercase: bool,
    pub uppercase: bool,
    pub trim: bool,
    pub pattern: Option<Regex>,
    pub enumeration: Vec<Value>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub getter: Option<TransformFn>,
    pub setter: Option<TransformFn>,
    pub alias: Option<String>,
}

#[derive(Debug, Clone)]
pub enum PathKind {
    Scalar(FieldType),
    Array(Box<PathKind>),
    Subdocument(Arc<Schema>),
    SubdocumentArray(Arc<Schema>),
}

impl PathKind {
    /// Engine-facing kind name
    pub fn instance(&self) -> &'static str {
        match self {
            PathKind::Scalar(t) => t.name(),
            PathKind::Array(_) => "Array",
            PathKind::Subdocument(_) => "Embedded",
            PathKind::SubdocumentArray(_) => "DocumentArray",
        }
    }

    fn leaf_type(&self) -> Option<FieldType> {
        match self {
            PathKind::Scalar(t) => Some(*t),
            PathKind::Array(inner) => inner.leaf_type(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SchemaPath {
    pub path: String,
    pub kind: PathKind,
    pub options: PathOptions,
    pub validators: Vec<ValidatorDescriptor>,
}

impl SchemaPath {
    pub fn new(path: impl Into<String>, kind: PathKind) -> Self {
        Self {
            path: path.into(),
            kind,
            options: PathOptions::default(),
            validators: Vec::new(),
        }
    }

    pub fn is_reference(&self) -> bool {
        self.options.reference.is_some()
    }

    /// Child schema of a sub-document path
    pub fn child(&self) -> Option<&Arc<Schema>> {
        match &self.kind {
            PathKind::Subdocument(child) | PathKind::SubdocumentArray(child) => Some(child),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimestampFields {
    pub created_at: String,
    pub updated_at: String,
}

/// A compiled schema
#[derive(Clone)]
pub struct Schema {
    paths: IndexMap<String, SchemaPath>,
    options: SchemaOptions,
    hooks: Hooks,
    hidden: Vec<String>,
    aliases: HashMap<String, String>,
    indexes: Vec<Value>,
    raw: Option<Declaration>,
    plugins: Vec<String>,
    timestamps: Option<TimestampFields>,
    version_key: Option<String>,
}

impl Schema {
    pub fn empty() -> Self {
        Self {
            paths: IndexMap::new(),
            options: SchemaOptions::default(),
            hooks: Hooks::default(),
            hidden: Vec::new(),
            aliases: HashMap::new(),
            indexes: Vec::new(),
            raw: None,
            plugins: Vec::new(),
            timestamps: None,
            version_key: None,
        }
    }

    /// Compiles a declaration mapping of field name to descriptor
    pub fn compile(fields: &Declaration, options: &SchemaOptions) -> StoreResult<Self> {
        let map = fields.as_map().ok_or_else(|| {
            StoreError::InvalidSchema(format!("schema fields must be a mapping, got {}", fields))
        })?;
        let mut schema = Self::empty();
        schema.options = options.clone();
        compile_fields(map, "", &mut schema)?;
        Ok(schema)
    }

    /// Compiles an embedded child schema
    pub fn compile_child(fields: &Declaration, options: &SchemaOptions) -> StoreResult<Self> {
        Self::compile(fields, options)
    }

    pub fn paths(&self) -> impl Iterator<Item = (&String, &SchemaPath)> {
        self.paths.iter()
    }

    pub fn path_names(&self) -> Vec<&str> {
        self.paths.keys().map(String::as_str).collect()
    }

    /// Resolves a dotted path, with or without array indices, through
    /// sub-document schemas
    pub fn path(&self, path: &str) -> Option<&SchemaPath> {
        let stripped = TreePath::parse(self.resolve_alias(path)).schema_path();
        if let Some(sp) = self.paths.get(&stripped) {
            return Some(sp);
        }
        let segments: Vec<&str> = stripped.split('.').collect();
        for split in (1..segments.len()).rev() {
            let head = segments[..split].join(".");
            if let Some(child) = self.paths.get(&head).and_then(SchemaPath::child) {
                return child.path(&segments[split..].join("."));
            }
        }
        None
    }

    pub fn has_path(&self, path: &str) -> bool {
        self.path(path).is_some()
    }

    /// Target model of the reference at `path`
    pub fn reference_for(&self, path: &str) -> Option<&str> {
        self.path(path).and_then(|sp| sp.options.reference.as_deref())
    }

    pub fn add_path(&mut self, sp: SchemaPath) {
        self.paths.insert(sp.path.clone(), sp);
    }

    /// Appends a validator to a path of this schema.
    ///
    /// Returns false, leaving the schema untouched, when the path is not
    /// declared directly on this schema.
    pub fn attach_validator(&mut self, path: &str, descriptor: ValidatorDescriptor) -> bool {
        let key = self.resolve_alias(path).to_string();
        match self.paths.get_mut(&key) {
            Some(sp) => {
                sp.validators.push(descriptor);
                true
            }
            None => false,
        }
    }

    pub fn register_hook(&mut self, phase: HookPhase, lifecycle: Lifecycle, hook: DocHook) {
        self.hooks.register(phase, lifecycle, hook);
    }

    pub fn hooks(&self) -> &Hooks {
        &self.hooks
    }

    pub fn apply_plugin(&mut self, plugin: &dyn SchemaPlugin) {
        plugin.apply(self);
        self.plugins.push(plugin.name().to_string());
    }

    pub fn plugins(&self) -> &[String] {
        &self.plugins
    }

    /// Excludes a path from default external representations
    pub fn hide(&mut self, path: impl Into<String>) {
        let path = path.into();
        if !self.hidden.contains(&path) {
            self.hidden.push(path);
        }
    }

    pub fn hidden(&self) -> &[String] {
        &self.hidden
    }

    /// Keeps the pre-rewrite declaration next to the compiled form
    pub fn attach_raw(&mut self, raw: Declaration) {
        self.raw = Some(raw);
    }

    pub fn raw(&self) -> Option<&Declaration> {
        self.raw.as_ref()
    }

    pub fn options(&self) -> &SchemaOptions {
        &self.options
    }

    pub fn options_mut(&mut self) -> &mut SchemaOptions {
        &mut self.options
    }

    /// Declares an index, e.g. `{"email": 1}`
    pub fn index(&mut self, spec: Value) {
        self.indexes.push(spec);
    }

    /// Declared indexes, including those implied by `unique`/`index` options
    pub fn indexes(&self) -> Vec<Value> {
        let mut out = self.indexes.clone();
        for (path, sp) in &self.paths {
            if sp.options.unique || sp.options.index {
                let mut spec = Map::new();
                spec.insert(path.clone(), Value::from(1));
                out.push(Value::Object(spec));
            }
        }
        out
    }

    pub fn timestamps(&self) -> Option<&TimestampFields> {
        self.timestamps.as_ref()
    }

    pub fn set_timestamps(&mut self, fields: TimestampFields) {
        self.timestamps = Some(fields);
    }

    pub fn version_key(&self) -> Option<&str> {
        self.version_key.as_deref()
    }

    pub fn set_version_key(&mut self, key: impl Into<String>) {
        self.version_key = Some(key.into());
    }

    pub fn resolve_alias<'a>(&'a self, path: &'a str) -> &'a str {
        self.aliases.get(path).map(String::as_str).unwrap_or(path)
    }

    pub(crate) fn unique_paths(&self) -> Vec<&str> {
        self.paths
            .iter()
            .filter(|(_, sp)| sp.options.unique)
            .map(|(p, _)| p.as_str())
            .collect()
    }

    /// Top-level paths declared with `select: false`
    pub(crate) fn deselected(&self) -> Vec<&str> {
        self.paths
            .iter()
            .filter(|(_, sp)| sp.options.select == Some(false))
            .map(|(p, _)| p.as_str())
            .collect()
    }

    fn is_reserved(&self, key: &str) -> bool {
        RESERVED_KEYS.contains(&key) || self.version_key.as_deref() == Some(key)
    }

    fn declares_prefix(&self, key: &str) -> bool {
        self.paths.contains_key(key)
            || self
                .paths
                .keys()
                .any(|p| p.len() > key.len() && p.starts_with(key) && p.as_bytes()[key.len()] == b'.')
    }

    /// Casts every declared path of `data`.
    ///
    /// Strict schemas drop undeclared top-level keys. Failures are pushed
    /// onto `errors` and the original value is kept.
    pub(crate) fn cast_document(
        &self,
        data: &Value,
        prefix: &str,
        errors: &mut Vec<ValidatorError>,
    ) -> Value {
        let Value::Object(input) = data else {
            return data.clone();
        };

        let mut out = if self.options.is_strict() {
            Value::Object(
                input
                    .iter()
                    .filter(|(k, _)| self.is_reserved(k) || self.declares_prefix(k))
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect(),
            )
        } else {
            data.clone()
        };

        for (path, sp) in &self.paths {
            if let Some(value) = json_get(data, path) {
                let casted = cast_value(sp, value.clone(), &join_path(prefix, path), errors);
                json_set(&mut out, path, casted);
            }
        }
        out
    }

    /// Casts a value bound for `path`; the error is the failure message
    pub(crate) fn cast_path(&self, path: &str, value: Value) -> Result<Value, ValidatorError> {
        let Some(sp) = self.path(path) else {
            return Ok(value);
        };
        let mut errors = Vec::new();
        let casted = cast_value(sp, value, path, &mut errors);
        match errors.into_iter().next() {
            Some(err) => Err(err),
            None => Ok(casted),
        }
    }

    /// Fills defaults of missing paths, recursing into present sub-documents
    pub(crate) fn apply_defaults(&self, data: &mut Value) {
        for (path, sp) in &self.paths {
            let missing = matches!(json_get(data, path), None | Some(Value::Null));
            if missing {
                if let Some(default) = &sp.options.default {
                    json_set(data, path, default.produce());
                } else if matches!(sp.kind, PathKind::Array(_) | PathKind::SubdocumentArray(_)) {
                    json_set(data, path, Value::Array(Vec::new()));
                }
            }
            match (&sp.kind, json_get_mut(data, path)) {
                (PathKind::Subdocument(child), Some(value)) if value.is_object() => {
                    child.apply_defaults(value)
                }
                (PathKind::SubdocumentArray(child), Some(Value::Array(items))) => {
                    for item in items.iter_mut().filter(|i| i.is_object()) {
                        child.apply_defaults(item);
                    }
                }
                _ => {}
            }
        }
    }

    /// Removes hidden paths at every sub-document depth
    pub(crate) fn strip_hidden(&self, data: &mut Value) {
        for (path, sp) in &self.paths {
            match (&sp.kind, json_get_mut(data, path)) {
                (PathKind::Subdocument(child), Some(value)) => child.strip_hidden(value),
                (PathKind::SubdocumentArray(child), Some(Value::Array(items))) => {
                    for item in items.iter_mut() {
                        child.strip_hidden(item);
                    }
                }
                _ => {}
            }
        }
        for path in &self.hidden {
            json_remove(data, path);
        }
    }

    /// Applies getters of every declared path
    pub(crate) fn apply_getters(&self, data: &mut Value) {
        for (path, sp) in &self.paths {
            if let Some(getter) = &sp.options.getter {
                if let Some(value) = json_get_mut(data, path) {
                    *value = getter.apply(value.take());
                }
            }
            match (&sp.kind, json_get_mut(data, path)) {
                (PathKind::Subdocument(child), Some(value)) => child.apply_getters(value),
                (PathKind::SubdocumentArray(child), Some(Value::Array(items))) => {
                    for item in items.iter_mut() {
                        child.apply_getters(item);
                    }
                }
                _ => {}
            }
        }
    }
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("paths", &self.paths.keys().collect::<Vec<_>>())
            .field("hidden", &self.hidden)
            .field("plugins", &self.plugins)
            .field("hooks", &self.hooks)
            .finish()
    }
}

fn is_descriptor(map: &IndexMap<String, Declaration>) -> bool {
    map.keys().any(|k| keys::DESCRIPTOR_KEYS.contains(&k.as_str()))
}

fn compile_fields(
    map: &IndexMap<String, Declaration>,
    prefix: &str,
    schema: &mut Schema,
) -> StoreResult<()> {
    for (key, node) in map {
        let path = join_path(prefix, key);
        match node {
            Tree::Map(inner) if !inner.is_empty() && !is_descriptor(inner) => {
                compile_fields(inner, &path, schema)?
            }
            _ => {
                let sp = compile_path(&path, node)?;
                if let Some(alias) = &sp.options.alias {
                    schema.aliases.insert(alias.clone(), path.clone());
                }
                schema.paths.insert(path, sp);
            }
        }
    }
    Ok(())
}

fn compile_path(path: &str, node: &Declaration) -> StoreResult<SchemaPath> {
    match node {
        Tree::Map(desc) if desc.is_empty() => Ok(SchemaPath::new(path, PathKind::Scalar(FieldType::Mixed))),
        Tree::Map(desc) if is_descriptor(desc) => {
            let kind = match desc.get(keys::TYPE) {
                Some(t) => kind_of(path, t)?,
                None if desc.contains_key(keys::REF) => PathKind::Scalar(FieldType::ObjectId),
                None => PathKind::Scalar(FieldType::Mixed),
            };
            let mut sp = SchemaPath::new(path, kind);
            parse_options(path, desc, &mut sp)?;
            Ok(sp)
        }
        Tree::Seq(items) => {
            let Some(element) = items.first() else {
                return Ok(SchemaPath::new(
                    path,
                    PathKind::Array(Box::new(PathKind::Scalar(FieldType::Mixed))),
                ));
            };
            if items.len() > 1 {
                return Err(StoreError::InvalidSchema(format!(
                    "array at {} must declare exactly one element type",
                    path
                )));
            }
            let mut sp = compile_path(path, element)?;
            sp.kind = match sp.kind {
                PathKind::Subdocument(child) => PathKind::SubdocumentArray(child),
                other => PathKind::Array(Box::new(other)),
            };
            Ok(sp)
        }
        other => Ok(SchemaPath::new(path, kind_of(path, other)?)),
    }
}

fn kind_of(path: &str, node: &Declaration) -> StoreResult<PathKind> {
    match node {
        Tree::Leaf(Marker::Type(t)) => Ok(PathKind::Scalar(*t)),
        Tree::Leaf(Marker::Model(_)) => Ok(PathKind::Scalar(FieldType::ObjectId)),
        Tree::Leaf(Marker::Schema(child)) => Ok(PathKind::Subdocument(Arc::clone(child))),
        Tree::String(name) => name
            .parse::<FieldType>()
            .map(PathKind::Scalar)
            .map_err(|e| StoreError::InvalidSchema(format!("{} at {}", e, path))),
        Tree::Seq(items) => {
            let inner = match items.first() {
                Some(element) => compile_path(path, element)?.kind,
                None => PathKind::Scalar(FieldType::Mixed),
            };
            Ok(match inner {
                PathKind::Subdocument(child) => PathKind::SubdocumentArray(child),
                other => PathKind::Array(Box::new(other)),
            })
        }
        Tree::Map(_) => {
            let child = Schema::compile(node, &SchemaOptions::default())?;
            Ok(PathKind::Subdocument(Arc::new(child)))
        }
        other => Err(StoreError::InvalidSchema(format!(
            "path {} has an invalid type {}",
            path, other
        ))),
    }
}

fn parse_options(
    path: &str,
    desc: &IndexMap<String, Declaration>,
    sp: &mut SchemaPath,
) -> StoreResult<()> {
    let flag = |key: &str| desc.get(key).and_then(Tree::as_bool).unwrap_or(false);
    let opts = &mut sp.options;

    opts.required = flag(keys::REQUIRED);
    opts.unique = flag(keys::UNIQUE);
    opts.index = flag(keys::INDEX);
    opts.sparse = flag(keys::SPARSE);
    opts.lowercase = flag(keys::LOWERCASE);
    opts.uppercase = flag(keys::UPPERCASE);
    opts.trim = flag(keys::TRIM);
    opts.select = desc.get(keys::SELECT).and_then(Tree::as_bool);
    opts.min = desc.get(keys::MIN).and_then(Tree::as_f64);
    opts.max = desc.get(keys::MAX).and_then(Tree::as_f64);
    opts.alias = desc.get(keys::ALIAS).and_then(Tree::as_str).map(str::to_string);

    opts.default = match desc.get(keys::DEFAULT) {
        Some(Tree::Leaf(Marker::Transform(f))) => Some(DefaultValue::Fn(f.clone())),
        Some(other) => other.to_json().map(DefaultValue::Value),
        None => None,
    };

    opts.reference = match desc.get(keys::REF) {
        Some(Tree::String(name)) => Some(name.clone()),
        Some(Tree::Leaf(Marker::Model(target))) => Some(target.name().to_string()),
        _ => None,
    };

    opts.pattern = match desc.get(keys::MATCH) {
        Some(Tree::Pattern(re)) => Some(re.clone()),
        Some(Tree::String(src)) => Some(Regex::new(src).map_err(|e| {
            StoreError::InvalidSchema(format!("invalid match pattern at {}: {}", path, e))
        })?),
        _ => None,
    };

    if let Some(Tree::Seq(values)) = desc.get(keys::ENUM) {
        opts.enumeration = values.iter().filter_map(Tree::to_json).collect();
    }

    if let Some(Tree::Leaf(Marker::Transform(f))) = desc.get(keys::GET) {
        opts.getter = Some(f.clone());
    }
    if let Some(Tree::Leaf(Marker::Transform(f))) = desc.get(keys::SET) {
        opts.setter = Some(f.clone());
    }

    if let Some(Tree::Leaf(Marker::Validators(list))) = desc.get(keys::VALIDATE) {
        sp.validators = list.clone();
    }
    Ok(())
}

fn cast_error(path: &str, expected: &str, value: &Value) -> ValidatorError {
    let shown = match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    ValidatorError {
        path: path.to_string(),
        kind: "cast".to_string(),
        message: format!(
            "Cast to {} failed for value \"{}\" at path \"{}\"",
            expected, shown, path
        ),
        value: value.clone(),
    }
}

fn cast_value(
    sp: &SchemaPath,
    value: Value,
    full: &str,
    errors: &mut Vec<ValidatorError>,
) -> Value {
    if value.is_null() {
        return value;
    }
    let value = match &sp.options.setter {
        Some(setter) => setter.apply(value),
        None => value,
    };
    cast_kind(&sp.kind, &sp.options, value, full, errors)
}

fn cast_kind(
    kind: &PathKind,
    opts: &PathOptions,
    value: Value,
    full: &str,
    errors: &mut Vec<ValidatorError>,
) -> Value {
    if value.is_null() {
        return value;
    }
    match kind {
        PathKind::Scalar(t) => match cast_scalar(*t, &value, opts) {
            Some(casted) => casted,
            None => {
                errors.push(cast_error(full, t.name(), &value));
                value
            }
        },
        PathKind::Array(inner) => {
            let items = match value {
                Value::Array(items) => items,
                single => vec![single],
            };
            Value::Array(
                items
                    .into_iter()
                    .enumerate()
                    .map(|(i, item)| cast_kind(inner, opts, item, &format!("{}.{}", full, i), errors))
                    .collect(),
            )
        }
        PathKind::Subdocument(child) => match &value {
            Value::Object(_) => child.cast_document(&value, full, errors),
            _ => {
                errors.push(cast_error(full, "Embedded", &value));
                value
            }
        },
        PathKind::SubdocumentArray(child) => {
            let items = match value {
                Value::Array(items) => items,
                single => vec![single],
            };
            Value::Array(
                items
                    .into_iter()
                    .enumerate()
                    .map(|(i, item)| {
                        let item_path = format!("{}.{}", full, i);
                        if item.is_object() {
                            child.cast_document(&item, &item_path, errors)
                        } else {
                            errors.push(cast_error(&item_path, "Embedded", &item));
                            item
                        }
                    })
                    .collect(),
            )
        }
    }
}

/// Casts one scalar; `None` when the value cannot be represented
pub(crate) fn cast_scalar(field_type: FieldType, value: &Value, opts: &PathOptions) -> Option<Value> {
    match field_type {
        FieldType::Mixed => Some(value.clone()),
        FieldType::String => {
            let mut s = match value {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                _ => return None,
            };
            if opts.trim {
                s = s.trim().to_string();
            }
            if opts.lowercase {
                s = s.to_lowercase();
            }
            if opts.uppercase {
                s = s.to_uppercase();
            }
            Some(Value::String(s))
        }
        FieldType::Number => match value {
            Value::Number(_) => Some(value.clone()),
            Value::Bool(b) => Some(Value::from(u8::from(*b))),
            Value::String(s) if !s.trim().is_empty() => {
                let s = s.trim();
                if let Ok(i) = s.parse::<i64>() {
                    Some(Value::from(i))
                } else {
                    s.parse::<f64>().ok().filter(|f| f.is_finite()).map(Value::from)
                }
            }
            _ => None,
        },
        FieldType::Boolean => match value {
            Value::Bool(_) => Some(value.clone()),
            Value::Number(n) => match n.as_i64() {
                Some(1) => Some(Value::Bool(true)),
                Some(0) => Some(Value::Bool(false)),
                _ => None,
            },
            Value::String(s) => match s.as_str() {
                "true" | "1" | "yes" => Some(Value::Bool(true)),
                "false" | "0" | "no" => Some(Value::Bool(false)),
                _ => None,
            },
            _ => None,
        },
        FieldType::Date => {
            let parsed: Option<DateTime<Utc>> = match value {
                Value::String(s) => DateTime::parse_from_rfc3339(s)
                    .map(|d| d.with_timezone(&Utc))
                    .ok()
                    .or_else(|| {
                        NaiveDate::parse_from_str(s, "%Y-%m-%d")
                            .ok()
                            .and_then(|d| d.and_hms_opt(0, 0, 0))
                            .map(|d| Utc.from_utc_datetime(&d))
                    }),
                Value::Number(n) => n.as_i64().and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
                _ => None,
            };
            parsed.map(|d| Value::String(d.to_rfc3339_opts(SecondsFormat::Millis, true)))
        }
        FieldType::Buffer => match value {
            Value::String(s) => base64::engine::general_purpose::STANDARD
                .decode(s)
                .ok()
                .map(|_| value.clone()),
            Value::Array(items) => {
                let bytes: Option<Vec<u8>> = items
                    .iter()
                    .map(|i| i.as_u64().and_then(|b| u8::try_from(b).ok()))
                    .collect();
                bytes.map(|b| Value::String(base64::engine::general_purpose::STANDARD.encode(b)))
            }
            _ => None,
        },
        FieldType::ObjectId => match value {
            Value::String(s) if !s.is_empty() => Some(value.clone()),
            Value::Object(obj) => obj.get("_id").filter(|id| id.is_string()).cloned(),
            _ => None,
        },
    }
}

/// Storage type of a path, looking through arrays
pub(crate) fn leaf_type(sp: &SchemaPath) -> Option<FieldType> {
    sp.kind.leaf_type()
}
