//! Result sorting
//!
//! Sorts documents by one or more dotted paths, stably and
//! deterministically.

use std::cmp::Ordering;

use serde_json::Value;

use crate::tree::json_get;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

/// Sort key list, applied left to right
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SortSpec {
    keys: Vec<(String, SortDirection)>,
}

impl SortSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn asc(field: impl Into<String>) -> Self {
        Self::new().then(field, SortDirection::Asc)
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self::new().then(field, SortDirection::Desc)
    }

    pub fn then(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.keys.push((field.into(), direction));
        self
    }

    /// Reads `{"field": 1, "other": -1}`
    pub fn from_json(spec: &Value) -> Self {
        let keys = spec
            .as_object()
            .map(|obj| {
                obj.iter()
                    .map(|(field, dir)| {
                        let direction = match dir.as_i64() {
                            Some(d) if d < 0 => SortDirection::Desc,
                            _ => match dir.as_str() {
                                Some("desc") | Some("descending") => SortDirection::Desc,
                                _ => SortDirection::Asc,
                            },
                        };
                        (field.clone(), direction)
                    })
                    .collect()
            })
            .unwrap_or_default();
        Self { keys }
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn sort(&self, documents: &mut [Value]) {
        if self.keys.is_empty() {
            return;
        }
        documents.sort_by(|a, b| {
            for (field, direction) in &self.keys {
                let ordering = compare_values(json_get(a, field), json_get(b, field));
                let ordering = match direction {
                    SortDirection::Asc => ordering,
                    SortDirection::Desc => ordering.reverse(),
                };
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            Ordering::Equal
        });
    }
}

/// Compares two JSON values for sorting.
///
/// Ordering rules:
/// - missing < null < bool < number < string < array < object
/// - For same types, natural ordering
pub fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a_val), Some(b_val)) => {
            let type_order = |v: &Value| -> u8 {
                match v {
                    Value::Null => 0,
                    Value::Bool(_) => 1,
                    Value::Number(_) => 2,
                    Value::String(_) => 3,
                    Value::Array(_) => 4,
                    Value::Object(_) => 5,
                }
            };

            let a_type = type_order(a_val);
            let b_type = type_order(b_val);

            if a_type != b_type {
                return a_type.cmp(&b_type);
            }

            match (a_val, b_val) {
                (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
                (Value::Number(x), Value::Number(y)) => {
                    let x = x.as_f64().unwrap_or(0.0);
                    let y = y.as_f64().unwrap_or(0.0);
                    x.partial_cmp(&y).unwrap_or(Ordering::Equal)
                }
                (Value::String(x), Value::String(y)) => x.cmp(y),
                (Value::Array(x), Value::Array(y)) => {
                    for (p, q) in x.iter().zip(y.iter()) {
                        let ordering = compare_values(Some(p), Some(q));
                        if ordering != Ordering::Equal {
                            return ordering;
                        }
                    }
                    x.len().cmp(&y.len())
                }
                _ => Ordering::Equal,
            }
        }
    }
}
