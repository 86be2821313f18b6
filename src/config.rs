//! Mapping-layer configuration
//!
//! Registry-wide defaults every finalized model starts from. Per-model
//! [`SchemaOptions`](crate::schema::SchemaOptions) override the collection
//! name, timestamps and version key.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::observability::{log_event_with_fields, Event, Severity};
use crate::schema::{OdmError, OdmResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OdmConfig {
    /// Attach the timestamp plugin to every model (default: true)
    #[serde(default = "default_timestamps")]
    pub timestamps: bool,

    /// Creation timestamp path (default: "createdAt")
    #[serde(default = "default_created_at_field")]
    pub created_at_field: String,

    /// Modification timestamp path (default: "updatedAt")
    #[serde(default = "default_updated_at_field")]
    pub updated_at_field: String,

    /// Storage revision marker (default: "__v")
    #[serde(default = "default_version_key")]
    pub version_key: String,

    /// Derive collection names by pluralizing (default: true)
    #[serde(default = "default_pluralize_collections")]
    pub pluralize_collections: bool,

    /// Minimum log severity (default: "info")
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_timestamps() -> bool {
    true
}

fn default_created_at_field() -> String {
    "createdAt".to_string()
}

fn default_updated_at_field() -> String {
    "updatedAt".to_string()
}

fn default_version_key() -> String {
    "__v".to_string()
}

fn default_pluralize_collections() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for OdmConfig {
    fn default() -> Self {
        Self {
            timestamps: default_timestamps(),
            created_at_field: default_created_at_field(),
            updated_at_field: default_updated_at_field(),
            version_key: default_version_key(),
            pluralize_collections: default_pluralize_collections(),
            log_level: default_log_level(),
        }
    }
}

impl OdmConfig {
    pub fn from_json_str(text: &str) -> OdmResult<Self> {
        let config: OdmConfig = serde_json::from_str(text)
            .map_err(|e| OdmError::config(format!("Invalid config JSON: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> OdmResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| OdmError::config(format!("Failed to read config: {}", e)))?;
        let config = Self::from_json_str(&content)?;
        log_event_with_fields(Event::ConfigLoaded, &[("path", &path.display().to_string())]);
        Ok(config)
    }

    fn validate(&self) -> OdmResult<()> {
        if self.version_key.is_empty() {
            return Err(OdmError::config("version_key must not be empty"));
        }
        if self.timestamps && (self.created_at_field.is_empty() || self.updated_at_field.is_empty()) {
            return Err(OdmError::config("timestamp field names must not be empty"));
        }
        if self.created_at_field == self.updated_at_field {
            return Err(OdmError::config(format!(
                "created_at_field and updated_at_field are both '{}'",
                self.created_at_field
            )));
        }
        self.severity()?;
        Ok(())
    }

    /// Parsed `log_level`
    pub fn severity(&self) -> OdmResult<Severity> {
        self.log_level.parse().map_err(OdmError::config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::OdmErrorCode;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = OdmConfig::default();
        assert!(config.timestamps);
        assert_eq!(config.created_at_field, "createdAt");
        assert_eq!(config.version_key, "__v");
        assert_eq!(config.severity().unwrap(), Severity::Info);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = OdmConfig::from_json_str(r#"{"timestamps": false, "log_level": "warn"}"#).unwrap();
        assert!(!config.timestamps);
        assert!(config.pluralize_collections);
        assert_eq!(config.severity().unwrap(), Severity::Warn);
    }

    #[test]
    fn test_invalid_config_is_config_error() {
        let err = OdmConfig::from_json_str(r#"{"version_key": ""}"#).unwrap_err();
        assert_eq!(err.code(), OdmErrorCode::Config);

        let err = OdmConfig::from_json_str(r#"{"log_level": "chatty"}"#).unwrap_err();
        assert_eq!(err.code(), OdmErrorCode::Config);

        let err = OdmConfig::from_json_str("not json").unwrap_err();
        assert!(err.message().contains("Invalid config JSON"));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"version_key": "_rev", "pluralize_collections": false}}"#).unwrap();
        let config = OdmConfig::from_file(file.path()).unwrap();
        assert_eq!(config.version_key, "_rev");
        assert!(!config.pluralize_collections);
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = OdmConfig::from_file(&dir.path().join("absent.json")).unwrap_err();
        assert_eq!(err.code(), OdmErrorCode::Config);
    }
}
