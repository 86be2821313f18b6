//! Schema plugins

use chrono::{SecondsFormat, Utc};
use serde_json::Value;

use crate::schema::FieldType;

use super::hooks::{DocHook, HookPhase, Lifecycle};
use super::schema::{PathKind, Schema, SchemaPath, TimestampFields};

/// Extension applied to a schema before a model is compiled from it
pub trait SchemaPlugin: Send + Sync {
    fn name(&self) -> &str;

    fn apply(&self, schema: &mut Schema);
}

/// Maintains creation and last-update timestamps.
///
/// Adds two `Date` paths and a pre-save hook that stamps the creation
/// time on first save and the update time on every save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimestampPlugin {
    created_at: String,
    updated_at: String,
}

impl TimestampPlugin {
    pub fn new(created_at: impl Into<String>, updated_at: impl Into<String>) -> Self {
        Self {
            created_at: created_at.into(),
            updated_at: updated_at.into(),
        }
    }
}

impl Default for TimestampPlugin {
    fn default() -> Self {
        Self::new("createdAt", "updatedAt")
    }
}

impl SchemaPlugin for TimestampPlugin {
    fn name(&self) -> &str {
        "timestamps"
    }

    fn apply(&self, schema: &mut Schema) {
        for field in [&self.created_at, &self.updated_at] {
            if !schema.has_path(field) {
                schema.add_path(SchemaPath::new(field.clone(), PathKind::Scalar(FieldType::Date)));
            }
        }
        schema.set_timestamps(TimestampFields {
            created_at: self.created_at.clone(),
            updated_at: self.updated_at.clone(),
        });

        let created_at = self.created_at.clone();
        let updated_at = self.updated_at.clone();
        schema.register_hook(
            HookPhase::Pre,
            Lifecycle::Save,
            DocHook::sync(move |doc| {
                let now = Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true));
                if doc.is_new() && doc.get_raw(&created_at).map_or(true, |v| v.is_null()) {
                    doc.put_raw(&created_at, now.clone());
                }
                doc.put_raw(&updated_at, now);
                Ok(())
            }),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::HookPhase;

    #[test]
    fn test_timestamp_plugin_declares_paths_and_hook() {
        let mut schema = Schema::empty();
        schema.apply_plugin(&TimestampPlugin::default());
        assert_eq!(schema.path("createdAt").unwrap().kind.instance(), "Date");
        assert!(schema.has_path("updatedAt"));
        assert_eq!(schema.hooks().count(HookPhase::Pre, Lifecycle::Save), 1);
        assert_eq!(schema.plugins(), &["timestamps".to_string()]);
        assert_eq!(schema.timestamps().unwrap().updated_at, "updatedAt");
    }
}
