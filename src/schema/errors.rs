//! Mapping-layer error types
//!
//! Error codes:
//! - ODM_TYPE_NOT_SET (FATAL)
//! - ODM_MALFORMED_DECLARATION (FATAL)
//! - ODM_INVALID_REFERENCE_ARRAY (FATAL)
//! - ODM_INVALID_SUBDOC_ARRAY (FATAL)
//! - ODM_UNRESOLVED_REFERENCE (FATAL)
//! - ODM_ALREADY_REGISTERED (FATAL)
//! - ODM_NOT_REGISTERED (REJECT)
//! - ODM_CONFIG (FATAL)
//! - ODM_VALIDATION (REJECT)
//! - ODM_STORAGE (REJECT)
//!
//! Registration and resolution errors surface while a model is being
//! defined and indicate a programming error in the model definition.
//! Validation and storage errors come back from the storage engine.

use std::fmt;

use crate::store::{StoreError, ValidationError};

/// Severity levels for mapping errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Operation rejected, caller may recover
    Reject,
    /// Model definition is broken
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Reject => write!(f, "REJECT"),
            Severity::Fatal => write!(f, "FATAL"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OdmErrorCode {
    /// Field has no resolvable storage type
    TypeNotSet,
    /// Hook or validation declaration has the wrong shape
    MalformedDeclaration,
    /// Reference array with other than one element
    InvalidReferenceArray,
    /// Sub-document array with other than one element
    InvalidSubdocArray,
    /// Reference target is not a registered model
    UnresolvedReference,
    /// Model type registered twice
    AlreadyRegistered,
    /// Model type never registered
    NotRegistered,
    /// Configuration could not be loaded
    Config,
    /// Document failed validation
    Validation,
    /// Storage engine failure
    Storage,
}

impl OdmErrorCode {
    pub fn code(&self) -> &'static str {
        match self {
            OdmErrorCode::TypeNotSet => "ODM_TYPE_NOT_SET",
            OdmErrorCode::MalformedDeclaration => "ODM_MALFORMED_DECLARATION",
            OdmErrorCode::InvalidReferenceArray => "ODM_INVALID_REFERENCE_ARRAY",
            OdmErrorCode::InvalidSubdocArray => "ODM_INVALID_SUBDOC_ARRAY",
            OdmErrorCode::UnresolvedReference => "ODM_UNRESOLVED_REFERENCE",
            OdmErrorCode::AlreadyRegistered => "ODM_ALREADY_REGISTERED",
            OdmErrorCode::NotRegistered => "ODM_NOT_REGISTERED",
            OdmErrorCode::Config => "ODM_CONFIG",
            OdmErrorCode::Validation => "ODM_VALIDATION",
            OdmErrorCode::Storage => "ODM_STORAGE",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            OdmErrorCode::NotRegistered | OdmErrorCode::Validation | OdmErrorCode::Storage => {
                Severity::Reject
            }
            _ => Severity::Fatal,
        }
    }
}

impl fmt::Display for OdmErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Mapping error with model/field context
#[derive(Debug)]
pub struct OdmError {
    code: OdmErrorCode,
    message: String,
    model: Option<String>,
    field: Option<String>,
    source: Option<StoreError>,
}

impl OdmError {
    fn new(code: OdmErrorCode, message: String) -> Self {
        Self {
            code,
            message,
            model: None,
            field: None,
            source: None,
        }
    }

    fn at(mut self, model: impl Into<String>, field: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self.field = Some(field.into());
        self
    }

    pub fn type_not_set(model: impl Into<String>, field: impl Into<String>) -> Self {
        let (model, field) = (model.into(), field.into());
        Self::new(
            OdmErrorCode::TypeNotSet,
            format!("Type of {}.{} is not set", model, field),
        )
        .at(model, field)
    }

    pub fn malformed_declaration(
        model: impl Into<String>,
        member: impl Into<String>,
        detail: impl fmt::Display,
    ) -> Self {
        let (model, member) = (model.into(), member.into());
        Self::new(
            OdmErrorCode::MalformedDeclaration,
            format!("{}.{} is not declared properly: {}", model, member, detail),
        )
        .at(model, member)
    }

    pub fn invalid_reference_array(
        model: impl Into<String>,
        field: impl Into<String>,
        len: usize,
    ) -> Self {
        let (model, field) = (model.into(), field.into());
        Self::new(
            OdmErrorCode::InvalidReferenceArray,
            format!(
                "Reference array {}.{} must hold exactly one element, found {}",
                model, field, len
            ),
        )
        .at(model, field)
    }

    pub fn invalid_subdoc_array(
        model: impl Into<String>,
        field: impl Into<String>,
        len: usize,
    ) -> Self {
        let (model, field) = (model.into(), field.into());
        Self::new(
            OdmErrorCode::InvalidSubdocArray,
            format!(
                "Sub-document array {}.{} must hold exactly one element, found {}",
                model, field, len
            ),
        )
        .at(model, field)
    }

    pub fn unresolved_reference(
        model: impl Into<String>,
        field: impl Into<String>,
        target: &str,
    ) -> Self {
        let (model, field) = (model.into(), field.into());
        Self::new(
            OdmErrorCode::UnresolvedReference,
            format!(
                "{}.{} references {} which is not a registered model",
                model, field, target
            ),
        )
        .at(model, field)
    }

    pub fn already_registered(model: impl Into<String>) -> Self {
        let model = model.into();
        let mut err = Self::new(
            OdmErrorCode::AlreadyRegistered,
            format!("Model {} is already registered", model),
        );
        err.model = Some(model);
        err
    }

    pub fn not_registered(model: impl Into<String>) -> Self {
        let model = model.into();
        let mut err = Self::new(
            OdmErrorCode::NotRegistered,
            format!("Model {} is not registered", model),
        );
        err.model = Some(model);
        err
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::new(OdmErrorCode::Config, message.into())
    }

    pub fn code(&self) -> OdmErrorCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    pub fn field(&self) -> Option<&str> {
        self.field.as_deref()
    }

    pub fn severity(&self) -> Severity {
        self.code.severity()
    }

    pub fn is_validation(&self) -> bool {
        self.code == OdmErrorCode::Validation
    }

    /// Per-path validation failures, when this is a validation error
    pub fn validation(&self) -> Option<&ValidationError> {
        match &self.source {
            Some(StoreError::Validation(err)) => Some(err),
            _ => None,
        }
    }
}

impl fmt::Display for OdmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.code(), self.message)
    }
}

impl std::error::Error for OdmError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|err| err as &(dyn std::error::Error + 'static))
    }
}

impl From<StoreError> for OdmError {
    fn from(err: StoreError) -> Self {
        let code = match err {
            StoreError::Validation(_) => OdmErrorCode::Validation,
            _ => OdmErrorCode::Storage,
        };
        let mut out = Self::new(code, err.to_string());
        out.model = err.model().map(str::to_string);
        out.source = Some(err);
        out
    }
}

/// Result type for mapping operations
pub type OdmResult<T> = Result<T, OdmError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(OdmErrorCode::TypeNotSet.code(), "ODM_TYPE_NOT_SET");
        assert_eq!(OdmErrorCode::UnresolvedReference.code(), "ODM_UNRESOLVED_REFERENCE");
        assert_eq!(OdmErrorCode::Validation.code(), "ODM_VALIDATION");
    }

    #[test]
    fn test_registration_errors_are_fatal() {
        assert_eq!(OdmError::type_not_set("User", "name").severity(), Severity::Fatal);
        assert_eq!(
            OdmError::invalid_reference_array("Post", "tags", 2).severity(),
            Severity::Fatal
        );
        assert_eq!(OdmError::not_registered("Ghost").severity(), Severity::Reject);
    }

    #[test]
    fn test_type_not_set_names_model_and_field() {
        let err = OdmError::type_not_set("User", "nickname");
        assert_eq!(err.model(), Some("User"));
        assert_eq!(err.field(), Some("nickname"));
        assert!(err.to_string().contains("User.nickname"));
        assert!(err.to_string().starts_with("ODM_TYPE_NOT_SET"));
    }

    #[test]
    fn test_store_validation_maps_to_validation_code() {
        let mut validation = ValidationError::new("User");
        validation.push("email", "user defined", "bad email", serde_json::json!("123"));
        let err: OdmError = StoreError::Validation(validation).into();
        assert!(err.is_validation());
        assert_eq!(err.model(), Some("User"));
        assert_eq!(err.validation().unwrap().errors().len(), 1);
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_store_backend_failure_maps_to_storage() {
        let err: OdmError = StoreError::Backend("disk full".into()).into();
        assert_eq!(err.code(), OdmErrorCode::Storage);
        assert_eq!(err.severity(), Severity::Reject);
    }
}
