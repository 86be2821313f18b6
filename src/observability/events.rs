//! Observable events of the mapping layer

use std::fmt;

use super::logger::Severity;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// Configuration loaded from text or file
    ConfigLoaded,
    /// One field declaration processed
    FieldDeclared,
    /// One method declaration processed
    MethodDeclared,
    /// Child schema compiled for a sub-document
    SubdocCompiled,
    /// The deprecated `refer` spelling was used
    DeprecatedAlias,
    /// Model finalized and registered with the engine
    ModelRegistered,
    /// Model definition rejected
    ModelRejected,
    /// Registry torn down
    RegistryTeardown,
}

impl Event {
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::ConfigLoaded => "CONFIG_LOADED",
            Event::FieldDeclared => "FIELD_DECLARED",
            Event::MethodDeclared => "METHOD_DECLARED",
            Event::SubdocCompiled => "SUBDOC_COMPILED",
            Event::DeprecatedAlias => "DEPRECATED_ALIAS",
            Event::ModelRegistered => "MODEL_REGISTERED",
            Event::ModelRejected => "MODEL_REJECTED",
            Event::RegistryTeardown => "REGISTRY_TEARDOWN",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Event::FieldDeclared | Event::MethodDeclared | Event::SubdocCompiled => Severity::Trace,
            Event::DeprecatedAlias => Severity::Warn,
            Event::ModelRejected => Severity::Error,
            Event::ConfigLoaded | Event::ModelRegistered | Event::RegistryTeardown => {
                Severity::Info
            }
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
