//! Storage engine errors

use std::fmt;

use serde_json::Value;
use thiserror::Error;

/// One failed validator on one path
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatorError {
    /// Dotted path, with array indices for sub-document elements
    pub path: String,
    /// Validator kind (`required`, `cast`, `enum`, `min`, `max`, `regexp`, `user defined`)
    pub kind: String,
    pub message: String,
    pub value: Value,
}

/// All validation failures of one document
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    model: String,
    errors: Vec<ValidatorError>,
}

impl ValidationError {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            errors: Vec::new(),
        }
    }

    pub fn push(
        &mut self,
        path: impl Into<String>,
        kind: impl Into<String>,
        message: impl Into<String>,
        value: Value,
    ) {
        self.errors.push(ValidatorError {
            path: path.into(),
            kind: kind.into(),
            message: message.into(),
            value,
        });
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn errors(&self) -> &[ValidatorError] {
        &self.errors
    }

    /// First failure recorded for `path`
    pub fn get(&self, path: &str) -> Option<&ValidatorError> {
        self.errors.iter().find(|e| e.path == path)
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub(crate) fn has_path(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    pub(crate) fn into_result(self) -> StoreResult<()> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(StoreError::Validation(self))
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} validation failed", self.model)?;
        for (i, err) in self.errors.iter().enumerate() {
            let sep = if i == 0 { ": " } else { ", " };
            write!(f, "{}{}: {}", sep, err.path, err.message)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0}")]
    Validation(ValidationError),

    #[error("Duplicate key in {collection}: {path} = {value}")]
    DuplicateKey {
        model: String,
        collection: String,
        path: String,
        value: Value,
    },

    #[error("{lifecycle} hook failed: {message}")]
    Hook { lifecycle: String, message: String },

    #[error("Model {0} is not registered with the engine")]
    UnknownModel(String),

    #[error("Model {0} is already registered with the engine")]
    ModelExists(String),

    #[error("Document {id} not found in {collection}")]
    NotFound { collection: String, id: String },

    #[error("Document has no identifier")]
    MissingId,

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Invalid update: {0}")]
    InvalidUpdate(String),

    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    #[error("Storage backend error: {0}")]
    Backend(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl StoreError {
    pub fn hook(lifecycle: impl fmt::Display, message: impl Into<String>) -> Self {
        StoreError::Hook {
            lifecycle: lifecycle.to_string(),
            message: message.into(),
        }
    }

    /// Model the failure belongs to, when known
    pub fn model(&self) -> Option<&str> {
        match self {
            StoreError::Validation(err) => Some(err.model()),
            StoreError::DuplicateKey { model, .. } => Some(model),
            StoreError::UnknownModel(model) | StoreError::ModelExists(model) => Some(model),
            _ => None,
        }
    }
}

/// Result type for storage engine operations
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_validation_error_display_lists_paths() {
        let mut err = ValidationError::new("House");
        err.push("name", "required", "Path `name` is required.", Value::Null);
        err.push("rooms.1.name", "cast", "Cast to String failed", json!({}));
        let text = err.to_string();
        assert!(text.starts_with("House validation failed: name:"));
        assert!(text.contains(", rooms.1.name: Cast to String failed"));
    }

    #[test]
    fn test_validation_error_lookup() {
        let mut err = ValidationError::new("User");
        assert!(err.clone().into_result().is_ok());
        err.push("email", "user defined", "bad", json!("123"));
        assert_eq!(err.get("email").unwrap().kind, "user defined");
        assert!(err.get("name").is_none());
        assert!(matches!(err.into_result(), Err(StoreError::Validation(_))));
    }

    #[test]
    fn test_hook_error_display() {
        let err = StoreError::hook("save", "counter overflow");
        assert_eq!(err.to_string(), "save hook failed: counter overflow");
        assert_eq!(err.model(), None);
    }
}
