//! Document validation
//!
//! Per path, in order: pending cast/invalidate failures, `required`,
//! built-in checks (`enum`, `min`, `max`, `match`), then the path's
//! validator list. The first failure of a path is recorded and the
//! remaining validators of that path are skipped; other paths still run.

use std::fmt;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use serde_json::Value;
use tokio::sync::oneshot;

use crate::tree::{join_path, json_get};

use super::document::Document;
use super::errors::ValidationError;
use super::schema::{PathKind, Schema, SchemaPath};

/// Message used when a validator declares none
pub const DEFAULT_VALIDATOR_MESSAGE: &str = "Validator failed for path `{PATH}` with value `{VALUE}`";

/// Completion handle for callback-style validators
pub struct ValidatorDone {
    tx: oneshot::Sender<(bool, Option<String>)>,
}

impl ValidatorDone {
    pub fn finish(self, valid: bool) {
        let _ = self.tx.send((valid, None));
    }

    /// Finish, replacing the declared message on failure
    pub fn finish_with(self, valid: bool, message: impl Into<String>) {
        let _ = self.tx.send((valid, Some(message.into())));
    }

    pub fn valid(self) {
        self.finish(true)
    }

    pub fn invalid(self) {
        self.finish(false)
    }
}

type SyncDocValidator = dyn Fn(&Document, &Value) -> bool + Send + Sync;
type CallbackDocValidator = dyn Fn(&Document, &Value, ValidatorDone) + Send + Sync;

/// A validator as the engine invokes it
#[derive(Clone)]
pub enum DocValidator {
    Sync(Arc<SyncDocValidator>),
    Callback(Arc<CallbackDocValidator>),
}

impl DocValidator {
    pub fn sync(f: impl Fn(&Document, &Value) -> bool + Send + Sync + 'static) -> Self {
        DocValidator::Sync(Arc::new(f))
    }

    pub fn callback(f: impl Fn(&Document, &Value, ValidatorDone) + Send + Sync + 'static) -> Self {
        DocValidator::Callback(Arc::new(f))
    }

    pub fn is_async(&self) -> bool {
        matches!(self, DocValidator::Callback(_))
    }
}

impl fmt::Debug for DocValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocValidator::Sync(_) => write!(f, "DocValidator::Sync"),
            DocValidator::Callback(_) => write!(f, "DocValidator::Callback"),
        }
    }
}

impl PartialEq for DocValidator {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (DocValidator::Sync(a), DocValidator::Sync(b)) => Arc::ptr_eq(a, b),
            (DocValidator::Callback(a), DocValidator::Callback(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// Normalized validator attached to a schema path
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatorDescriptor {
    pub is_async: bool,
    pub validator: DocValidator,
    pub message: String,
}

impl ValidatorDescriptor {
    pub fn new(validator: DocValidator, message: Option<String>) -> Self {
        Self {
            is_async: validator.is_async(),
            validator,
            message: message.unwrap_or_else(|| DEFAULT_VALIDATOR_MESSAGE.to_string()),
        }
    }

    /// Runs the validator; the message is set on failure
    pub(crate) async fn run(&self, doc: &Document, value: &Value) -> (bool, Option<String>) {
        match &self.validator {
            DocValidator::Sync(f) => (f(doc, value), None),
            DocValidator::Callback(f) => {
                let (tx, rx) = oneshot::channel();
                f(doc, value, ValidatorDone { tx });
                rx.await.unwrap_or((false, None))
            }
        }
    }
}

/// Replaces `{PATH}` and `{VALUE}` in a message template
pub fn render_message(template: &str, path: &str, value: &Value) -> String {
    let shown = match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    template.replace("{PATH}", path).replace("{VALUE}", &shown)
}

/// True for values `required` rejects
fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

/// Built-in checks of one path; returns (kind, message) on failure
fn check_builtin(sp: &SchemaPath, full: &str, value: &Value) -> Option<(&'static str, String)> {
    let opts = &sp.options;
    if opts.required && is_blank(value) {
        return Some(("required", format!("Path `{}` is required.", full)));
    }
    if value.is_null() {
        return None;
    }

    if !opts.enumeration.is_empty() && !matches!(sp.kind, PathKind::Array(_)) && !opts.enumeration.contains(value) {
        return Some((
            "enum",
            render_message("`{VALUE}` is not a valid enum value for path `{PATH}`.", full, value),
        ));
    }
    if let Some(n) = value.as_f64() {
        if let Some(min) = opts.min {
            if n < min {
                return Some((
                    "min",
                    format!(
                        "Path `{}` ({}) is less than minimum allowed value ({}).",
                        full, value, min
                    ),
                ));
            }
        }
        if let Some(max) = opts.max {
            if n > max {
                return Some((
                    "max",
                    format!(
                        "Path `{}` ({}) is more than maximum allowed value ({}).",
                        full, value, max
                    ),
                ));
            }
        }
    }
    if let (Some(re), Some(s)) = (&opts.pattern, value.as_str()) {
        if !re.is_match(s) {
            return Some(("regexp", format!("Path `{}` is invalid ({}).", full, s)));
        }
    }
    None
}

/// Validates `data` against `schema`, recursing into sub-documents
pub(crate) fn validate_tree<'a>(
    doc: &'a Document,
    schema: &'a Schema,
    data: &'a Value,
    prefix: String,
    sync_only: bool,
    errors: &'a mut ValidationError,
) -> BoxFuture<'a, ()> {
    async move {
        for (path, sp) in schema.paths() {
            let full = join_path(&prefix, path);
            let value = json_get(data, path).cloned().unwrap_or(Value::Null);
            if errors.has_path(&full) {
                continue;
            }

            if let Some((kind, message)) = check_builtin(sp, &full, &value) {
                errors.push(full, kind, message, value);
                continue;
            }

            for descriptor in &sp.validators {
                if sync_only && descriptor.is_async {
                    continue;
                }
                let (valid, message) = descriptor.run(doc, &value).await;
                if !valid {
                    let template = message.unwrap_or_else(|| descriptor.message.clone());
                    let rendered = render_message(&template, &full, &value);
                    errors.push(full.clone(), "user defined", rendered, value.clone());
                    break;
                }
            }

            match (&sp.kind, &value) {
                (PathKind::Subdocument(child), Value::Object(_)) => {
                    validate_tree(doc, child, &value, full, sync_only, errors).await;
                }
                (PathKind::SubdocumentArray(child), Value::Array(items)) => {
                    for (i, item) in items.iter().enumerate() {
                        let item_prefix = format!("{}.{}", full, i);
                        validate_tree(doc, child, item, item_prefix, sync_only, errors).await;
                    }
                }
                _ => {}
            }
        }
    }
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_render_message() {
        assert_eq!(
            render_message(DEFAULT_VALIDATOR_MESSAGE, "email", &json!("123")),
            "Validator failed for path `email` with value `123`"
        );
        assert_eq!(render_message("{PATH}={VALUE}", "n", &json!(5)), "n=5");
    }

    #[test]
    fn test_descriptor_async_flag_follows_validator() {
        let sync = ValidatorDescriptor::new(DocValidator::sync(|_, _| true), None);
        let callback = ValidatorDescriptor::new(
            DocValidator::callback(|_, _, done| done.valid()),
            Some("nope".into()),
        );
        assert!(!sync.is_async);
        assert_eq!(sync.message, DEFAULT_VALIDATOR_MESSAGE);
        assert!(callback.is_async);
        assert_eq!(callback.message, "nope");
    }

    #[test]
    fn test_blank_values() {
        assert!(is_blank(&Value::Null));
        assert!(is_blank(&json!("")));
        assert!(!is_blank(&json!(0)));
        assert!(!is_blank(&json!([])));
    }
}
