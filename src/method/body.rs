//! User-authored method bodies

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::record::Instance;
use crate::schema::ValidatorFn;
use crate::store::{HookDone, ValidatorDone};

type SyncHook = dyn Fn(&Instance) -> Result<(), String> + Send + Sync;
type CallbackHook = dyn Fn(&Instance, HookDone) + Send + Sync;

/// A lifecycle hook.
///
/// The one-parameter form continues by returning `Ok`; the two-parameter
/// form completes explicitly through [`HookDone`].
#[derive(Clone)]
pub enum HookFn {
    Sync(Arc<SyncHook>),
    Callback(Arc<CallbackHook>),
}

impl HookFn {
    pub fn new(f: impl Fn(&Instance) -> Result<(), String> + Send + Sync + 'static) -> Self {
        HookFn::Sync(Arc::new(f))
    }

    pub fn with_callback(f: impl Fn(&Instance, HookDone) + Send + Sync + 'static) -> Self {
        HookFn::Callback(Arc::new(f))
    }

    /// Declared parameter count, not counting the injected wrapper
    pub fn arity(&self) -> usize {
        match self {
            HookFn::Sync(_) => 1,
            HookFn::Callback(_) => 2,
        }
    }
}

impl fmt::Debug for HookFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HookFn::Sync(_) => write!(f, "HookFn::Sync"),
            HookFn::Callback(_) => write!(f, "HookFn::Callback"),
        }
    }
}

/// Body of a declared method
#[derive(Debug, Clone)]
pub enum MethodBody {
    Hook(HookFn),
    Validator(ValidatorFn),
    /// One method serving as a lifecycle hook and as a field validator
    Both { hook: HookFn, validator: ValidatorFn },
}

impl MethodBody {
    pub fn hook(f: impl Fn(&Instance) -> Result<(), String> + Send + Sync + 'static) -> Self {
        MethodBody::Hook(HookFn::new(f))
    }

    pub fn hook_with_done(f: impl Fn(&Instance, HookDone) + Send + Sync + 'static) -> Self {
        MethodBody::Hook(HookFn::with_callback(f))
    }

    pub fn validator(f: impl Fn(&Instance, &Value) -> bool + Send + Sync + 'static) -> Self {
        MethodBody::Validator(ValidatorFn::new(f))
    }

    pub fn validator_with_done(
        f: impl Fn(&Instance, &Value, ValidatorDone) + Send + Sync + 'static,
    ) -> Self {
        MethodBody::Validator(ValidatorFn::with_callback(f))
    }

    pub fn both(hook: HookFn, validator: ValidatorFn) -> Self {
        MethodBody::Both { hook, validator }
    }

    pub fn is_async(&self) -> bool {
        match self {
            MethodBody::Hook(f) => f.arity() == 2,
            MethodBody::Validator(f) => f.is_async(),
            MethodBody::Both { hook, validator } => hook.arity() == 2 || validator.is_async(),
        }
    }

    pub(crate) fn kind(&self) -> &'static str {
        match self {
            MethodBody::Hook(_) => "hook",
            MethodBody::Validator(_) => "validator",
            MethodBody::Both { .. } => "hook+validator",
        }
    }
}

impl From<HookFn> for MethodBody {
    fn from(f: HookFn) -> Self {
        MethodBody::Hook(f)
    }
}

impl From<ValidatorFn> for MethodBody {
    fn from(f: ValidatorFn) -> Self {
        MethodBody::Validator(f)
    }
}
