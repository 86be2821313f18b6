//! User-authored validator functions
//!
//! A validator receives the typed wrapper owning the value explicitly,
//! so it can read other fields through the wrapper's accessors. There
//! are two calling conventions:
//!
//! - one parameter: `(value) -> bool`, synchronous
//! - two parameters: `(value, done)`, completion reported through `done`

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::record::Instance;
use crate::store::ValidatorDone;
use crate::tree::Tree;

use super::types::{keys, Declaration, Marker};

type SyncValidator = dyn Fn(&Instance, &Value) -> bool + Send + Sync;
type CallbackValidator = dyn Fn(&Instance, &Value, ValidatorDone) + Send + Sync;

#[derive(Clone)]
pub enum ValidatorFn {
    Sync(Arc<SyncValidator>),
    Callback(Arc<CallbackValidator>),
}

impl ValidatorFn {
    /// Synchronous validator returning whether the value is valid
    pub fn new(f: impl Fn(&Instance, &Value) -> bool + Send + Sync + 'static) -> Self {
        ValidatorFn::Sync(Arc::new(f))
    }

    /// Callback-style validator completing through [`ValidatorDone`]
    pub fn with_callback(
        f: impl Fn(&Instance, &Value, ValidatorDone) + Send + Sync + 'static,
    ) -> Self {
        ValidatorFn::Callback(Arc::new(f))
    }

    /// Declared parameter count, not counting the injected wrapper
    pub fn arity(&self) -> usize {
        match self {
            ValidatorFn::Sync(_) => 1,
            ValidatorFn::Callback(_) => 2,
        }
    }

    pub fn is_async(&self) -> bool {
        self.arity() == 2
    }
}

impl fmt::Debug for ValidatorFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidatorFn::Sync(_) => write!(f, "ValidatorFn::Sync"),
            ValidatorFn::Callback(_) => write!(f, "ValidatorFn::Callback"),
        }
    }
}

impl PartialEq for ValidatorFn {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ValidatorFn::Sync(a), ValidatorFn::Sync(b)) => Arc::ptr_eq(a, b),
            (ValidatorFn::Callback(a), ValidatorFn::Callback(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// The accepted `validate` option shapes
#[derive(Debug, Clone)]
pub enum ValidateSpec {
    /// `fn`
    Bare(ValidatorFn),
    /// `[fn, message]`
    Pair(ValidatorFn, String),
    /// `{validator, message}`
    Object(ValidatorFn, Option<String>),
    /// `[{validator, message}, ...]`
    List(Vec<(ValidatorFn, Option<String>)>),
}

impl ValidateSpec {
    pub fn pair(f: ValidatorFn, message: impl Into<String>) -> Self {
        ValidateSpec::Pair(f, message.into())
    }

    pub fn object(f: ValidatorFn, message: impl Into<String>) -> Self {
        ValidateSpec::Object(f, Some(message.into()))
    }

    pub fn list<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = (ValidatorFn, S)>,
        S: Into<String>,
    {
        ValidateSpec::List(
            items
                .into_iter()
                .map(|(f, message)| (f, Some(message.into())))
                .collect(),
        )
    }

    /// Declaration tree form stored under the `validate` key
    pub fn into_declaration(self) -> Declaration {
        fn object(f: ValidatorFn, message: Option<String>) -> Declaration {
            let mut entries = vec![(keys::VALIDATOR, Tree::Leaf(Marker::Validator(f)))];
            if let Some(message) = message {
                entries.push((keys::MESSAGE, Tree::String(message)));
            }
            Tree::from_pairs(entries)
        }

        match self {
            ValidateSpec::Bare(f) => Tree::Leaf(Marker::Validator(f)),
            ValidateSpec::Pair(f, message) => {
                Tree::Seq(vec![Tree::Leaf(Marker::Validator(f)), Tree::String(message)])
            }
            ValidateSpec::Object(f, message) => object(f, message),
            ValidateSpec::List(items) => Tree::Seq(
                items
                    .into_iter()
                    .map(|(f, message)| object(f, message))
                    .collect(),
            ),
        }
    }
}

impl From<ValidatorFn> for ValidateSpec {
    fn from(f: ValidatorFn) -> Self {
        ValidateSpec::Bare(f)
    }
}
