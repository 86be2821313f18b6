//! Update operators
//!
//! An update without any `$` operator is treated as `$set` of its fields.
//! Supported: `$set`, `$unset`, `$inc`, `$push`, `$pull`.

use serde_json::{Map, Value};

use crate::tree::{json_get, json_get_mut, json_remove, json_set};

use super::errors::{StoreError, StoreResult};

/// Checks the update shape before it is applied to any document
pub fn check_update(update: &Value) -> StoreResult<()> {
    let obj = update
        .as_object()
        .ok_or_else(|| StoreError::InvalidUpdate("update must be an object".into()))?;

    let operators = obj.keys().filter(|k| k.starts_with('$')).count();
    if operators > 0 && operators != obj.len() {
        return Err(StoreError::InvalidUpdate(
            "cannot mix update operators and plain fields".into(),
        ));
    }
    for (op, args) in obj.iter().filter(|(k, _)| k.starts_with('$')) {
        match op.as_str() {
            "$set" | "$unset" | "$inc" | "$push" | "$pull" => {
                if !args.is_object() {
                    return Err(StoreError::InvalidUpdate(format!(
                        "{} expects an object",
                        op
                    )));
                }
            }
            other => {
                return Err(StoreError::InvalidUpdate(format!(
                    "unknown update operator {}",
                    other
                )))
            }
        }
    }
    Ok(())
}

/// Applies `update` to `document`, returning the touched paths
pub fn apply_update(document: &mut Value, update: &Value) -> StoreResult<Vec<String>> {
    check_update(update)?;
    let empty = Map::new();
    let obj = update.as_object().unwrap_or(&empty);

    let mut touched = Vec::new();
    if !obj.keys().any(|k| k.starts_with('$')) {
        apply_set(document, obj, &mut touched)?;
        return Ok(touched);
    }

    for (op, args) in obj {
        let args = args.as_object().unwrap_or(&empty);
        match op.as_str() {
            "$set" => apply_set(document, args, &mut touched)?,
            "$unset" => {
                for path in args.keys() {
                    if json_remove(document, path).is_some() {
                        touched.push(path.clone());
                    }
                }
            }
            "$inc" => {
                for (path, by) in args {
                    let by = by.as_f64().ok_or_else(|| {
                        StoreError::InvalidUpdate(format!("$inc on {} needs a number", path))
                    })?;
                    let current = match json_get(document, path) {
                        None | Some(Value::Null) => 0.0,
                        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
                        Some(_) => {
                            return Err(StoreError::InvalidUpdate(format!(
                                "$inc on non-numeric path {}",
                                path
                            )))
                        }
                    };
                    set_path(document, path, number(current + by))?;
                    touched.push(path.clone());
                }
            }
            "$push" => {
                for (path, item) in args {
                    match json_get_mut(document, path) {
                        Some(Value::Array(items)) => items.push(item.clone()),
                        None | Some(Value::Null) => {
                            set_path(document, path, Value::Array(vec![item.clone()]))?
                        }
                        Some(_) => {
                            return Err(StoreError::InvalidUpdate(format!(
                                "$push on non-array path {}",
                                path
                            )))
                        }
                    }
                    touched.push(path.clone());
                }
            }
            "$pull" => {
                for (path, item) in args {
                    if let Some(Value::Array(items)) = json_get_mut(document, path) {
                        items.retain(|existing| existing != item);
                        touched.push(path.clone());
                    }
                }
            }
            _ => {}
        }
    }
    Ok(touched)
}

fn apply_set(
    document: &mut Value,
    fields: &Map<String, Value>,
    touched: &mut Vec<String>,
) -> StoreResult<()> {
    for (path, value) in fields {
        set_path(document, path, value.clone())?;
        touched.push(path.clone());
    }
    Ok(())
}

fn set_path(document: &mut Value, path: &str, value: Value) -> StoreResult<()> {
    if json_set(document, path, value) {
        Ok(())
    } else {
        Err(StoreError::InvalidUpdate(format!("cannot set path {}", path)))
    }
}

/// Integral results stay integers
fn number(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        Value::from(n as i64)
    } else {
        Value::from(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plain_update_is_set() {
        let mut doc = json!({"name": "a", "age": 1});
        let touched = apply_update(&mut doc, &json!({"name": "b"})).unwrap();
        assert_eq!(doc, json!({"name": "b", "age": 1}));
        assert_eq!(touched, vec!["name"]);
    }

    #[test]
    fn test_operators() {
        let mut doc = json!({"n": 1, "tags": ["a"], "gone": true});
        apply_update(
            &mut doc,
            &json!({
                "$inc": {"n": 2},
                "$push": {"tags": "b", "fresh": 1},
                "$unset": {"gone": ""},
                "$set": {"nested.x": 5}
            }),
        )
        .unwrap();
        assert_eq!(
            doc,
            json!({"n": 3, "tags": ["a", "b"], "fresh": [1], "nested": {"x": 5}})
        );
    }

    #[test]
    fn test_pull() {
        let mut doc = json!({"tags": ["a", "b", "a"]});
        apply_update(&mut doc, &json!({"$pull": {"tags": "a"}})).unwrap();
        assert_eq!(doc, json!({"tags": ["b"]}));
    }

    #[test]
    fn test_rejects_mixed_and_unknown() {
        assert!(check_update(&json!({"$set": {"a": 1}, "b": 2})).is_err());
        assert!(check_update(&json!({"$rename": {"a": "b"}})).is_err());
        assert!(check_update(&json!([1])).is_err());
    }

    #[test]
    fn test_inc_rejects_strings() {
        let mut doc = json!({"name": "x"});
        assert!(apply_update(&mut doc, &json!({"$inc": {"name": 1}})).is_err());
    }
}
