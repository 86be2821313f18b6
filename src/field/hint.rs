//! Ambient type hints
//!
//! The Rust type named at the declaration site (`builder.field::<String>`)
//! stands in for the field's static type. It is consulted only when the
//! declaration itself names no storage type.

use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::model::Model;
use crate::schema::{FieldType, ModelRef};

/// What a declaration-site type says about storage
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Hint {
    /// Nothing; the declaration must name a type
    None,
    Type(FieldType),
    /// Another mapped type, stored as a reference
    Model(ModelRef),
    Array(Box<Hint>),
}

impl Hint {
    pub fn is_none(&self) -> bool {
        matches!(self, Hint::None)
    }
}

/// Declaration-site types usable with [`ModelBuilder::field`](crate::model::ModelBuilder::field)
pub trait TypeHint {
    fn hint() -> Hint;
}

/// Marker for a reference to the mapped type `M`
pub struct Ref<M: Model>(PhantomData<fn() -> M>);

impl<M: Model> fmt::Debug for Ref<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ref<{}>", M::NAME)
    }
}

impl<M: Model> TypeHint for Ref<M> {
    fn hint() -> Hint {
        Hint::Model(ModelRef::of::<M>())
    }
}

impl TypeHint for () {
    fn hint() -> Hint {
        Hint::None
    }
}

macro_rules! plain_hint {
    ($field_type:expr => $($t:ty),+) => {
        $(
            impl TypeHint for $t {
                fn hint() -> Hint {
                    Hint::Type($field_type)
                }
            }
        )+
    };
}

plain_hint!(FieldType::String => String, &'static str);
plain_hint!(FieldType::Number => i8, i16, i32, i64, u8, u16, u32, u64, usize, f32, f64);
plain_hint!(FieldType::Boolean => bool);
plain_hint!(FieldType::Date => DateTime<Utc>);
plain_hint!(FieldType::Mixed => Value, serde_json::Map<String, Value>, HashMap<String, Value>);

impl<T: TypeHint> TypeHint for Vec<T> {
    fn hint() -> Hint {
        match T::hint() {
            Hint::None => Hint::None,
            inner => Hint::Array(Box::new(inner)),
        }
    }
}

impl<T: TypeHint> TypeHint for Option<T> {
    fn hint() -> Hint {
        T::hint()
    }
}

/// Hint of a type, for builders that take it by value
pub fn hint_of<T: TypeHint>() -> Hint {
    T::hint()
}
