//! Document filtering
//!
//! Filters are JSON objects in the usual document-store shape:
//! `{"age": {"$gte": 18}, "$or": [{"name": "Ada"}, {"name": "Bob"}]}`.
//! Dotted paths fan out over arrays, so `{"rooms.name": "attic"}` matches
//! when any room is named "attic". No type coercion.

use std::cmp::Ordering;

use regex::RegexBuilder;
use serde_json::Value;

use super::errors::{StoreError, StoreResult};
use super::sorter::compare_values;

/// Evaluates filter documents against stored documents
pub struct FilterMatcher;

impl FilterMatcher {
    /// Rejects filters that are not objects or use unknown operators
    pub fn check(filter: &Value) -> StoreResult<()> {
        let obj = match filter {
            Value::Null => return Ok(()),
            Value::Object(obj) => obj,
            other => {
                return Err(StoreError::InvalidQuery(format!(
                    "filter must be an object, got {}",
                    other
                )))
            }
        };
        for (key, cond) in obj {
            match key.as_str() {
                "$and" | "$or" | "$nor" => {
                    let items = cond.as_array().ok_or_else(|| {
                        StoreError::InvalidQuery(format!("{} expects an array", key))
                    })?;
                    for item in items {
                        Self::check(item)?;
                    }
                }
                k if k.starts_with('$') => {
                    return Err(StoreError::InvalidQuery(format!("unknown operator {}", k)))
                }
                _ => {
                    if let Value::Object(ops) = cond {
                        for op in ops.keys().filter(|k| k.starts_with('$')) {
                            if !KNOWN_OPERATORS.contains(&op.as_str()) {
                                return Err(StoreError::InvalidQuery(format!(
                                    "unknown operator {}",
                                    op
                                )));
                            }
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Checks if a document matches a filter (AND over all entries)
    pub fn matches(document: &Value, filter: &Value) -> bool {
        let obj = match filter {
            Value::Null => return true,
            Value::Object(obj) => obj,
            _ => return false,
        };

        obj.iter().all(|(key, cond)| match key.as_str() {
            "$and" => Self::each(cond).iter().all(|f| Self::matches(document, f)),
            "$or" => Self::each(cond).iter().any(|f| Self::matches(document, f)),
            "$nor" => !Self::each(cond).iter().any(|f| Self::matches(document, f)),
            path => Self::matches_path(document, path, cond),
        })
    }

    fn each(cond: &Value) -> &[Value] {
        cond.as_array().map(Vec::as_slice).unwrap_or(&[])
    }

    fn matches_path(document: &Value, path: &str, cond: &Value) -> bool {
        let candidates = resolve_all(document, path);

        match cond {
            Value::Object(ops) if ops.keys().any(|k| k.starts_with('$')) => {
                let options = ops.get("$options").and_then(Value::as_str).unwrap_or("");
                ops.iter()
                    .filter(|(op, _)| op.as_str() != "$options")
                    .all(|(op, arg)| Self::apply_operator(&candidates, op, arg, options))
            }
            expected => candidates.iter().any(|v| Self::eq_match(v, expected)),
        }
    }

    fn apply_operator(candidates: &[&Value], op: &str, arg: &Value, options: &str) -> bool {
        match op {
            "$eq" => candidates.iter().any(|v| Self::eq_match(v, arg)),
            "$ne" => !candidates.iter().any(|v| Self::eq_match(v, arg)),
            "$gt" => candidates.iter().any(|v| Self::ordered(v, arg, |o| o == Ordering::Greater)),
            "$gte" => candidates.iter().any(|v| Self::ordered(v, arg, |o| o != Ordering::Less)),
            "$lt" => candidates.iter().any(|v| Self::ordered(v, arg, |o| o == Ordering::Less)),
            "$lte" => candidates.iter().any(|v| Self::ordered(v, arg, |o| o != Ordering::Greater)),
            "$in" => {
                let set = Self::each(arg);
                candidates.iter().any(|v| set.iter().any(|e| Self::eq_match(v, e)))
            }
            "$nin" => {
                let set = Self::each(arg);
                !candidates.iter().any(|v| set.iter().any(|e| Self::eq_match(v, e)))
            }
            "$exists" => {
                let present = candidates.iter().any(|v| !v.is_null());
                present == arg.as_bool().unwrap_or(true)
            }
            "$size" => candidates.iter().any(|v| match (v, arg.as_u64()) {
                (Value::Array(items), Some(n)) => items.len() as u64 == n,
                _ => false,
            }),
            "$regex" => {
                let Some(pattern) = arg.as_str() else {
                    return false;
                };
                let Ok(re) = RegexBuilder::new(pattern)
                    .case_insensitive(options.contains('i'))
                    .multi_line(options.contains('m'))
                    .build()
                else {
                    return false;
                };
                candidates
                    .iter()
                    .any(|v| v.as_str().map(|s| re.is_match(s)).unwrap_or(false))
            }
            _ => false,
        }
    }

    /// Equality, where an array field matches when any element does
    fn eq_match(actual: &Value, expected: &Value) -> bool {
        if actual == expected {
            return true;
        }
        match actual {
            Value::Array(items) => items.iter().any(|item| item == expected),
            _ => false,
        }
    }

    /// Ordered comparison between values of the same kind only
    fn ordered(actual: &Value, bound: &Value, accept: impl Fn(Ordering) -> bool) -> bool {
        let comparable = matches!(
            (actual, bound),
            (Value::Number(_), Value::Number(_)) | (Value::String(_), Value::String(_))
        );
        comparable && accept(compare_values(Some(actual), Some(bound)))
    }
}

const KNOWN_OPERATORS: &[&str] = &[
    "$eq", "$ne", "$gt", "$gte", "$lt", "$lte", "$in", "$nin", "$exists", "$size", "$regex",
    "$options",
];

/// Collects every value reachable at `path`, fanning out over arrays.
///
/// A missing path yields a single `null` so `$exists`/`$ne` behave.
fn resolve_all<'a>(document: &'a Value, path: &str) -> Vec<&'a Value> {
    fn walk<'a>(value: &'a Value, segments: &[&str], out: &mut Vec<&'a Value>) {
        let Some((head, rest)) = segments.split_first() else {
            out.push(value);
            return;
        };
        match value {
            Value::Object(map) => {
                if let Some(next) = map.get(*head) {
                    walk(next, rest, out);
                }
            }
            Value::Array(items) => match head.parse::<usize>() {
                Ok(i) => {
                    if let Some(next) = items.get(i) {
                        walk(next, rest, out);
                    }
                }
                Err(_) => {
                    for item in items {
                        walk(item, segments, out);
                    }
                }
            },
            _ => {}
        }
    }

    static NULL: Value = Value::Null;
    let segments: Vec<&str> = path.split('.').collect();
    let mut out = Vec::new();
    walk(document, &segments, &mut out);
    if out.is_empty() {
        out.push(&NULL);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_equality_match() {
        let doc = json!({"name": "Alice", "age": 30});
        assert!(FilterMatcher::matches(&doc, &json!({"name": "Alice"})));
        assert!(!FilterMatcher::matches(&doc, &json!({"name": "Bob"})));
        assert!(FilterMatcher::matches(&doc, &json!({})));
    }

    #[test]
    fn test_no_type_coercion() {
        let doc = json!({"value": 123});
        assert!(!FilterMatcher::matches(&doc, &json!({"value": "123"})));
    }

    #[test]
    fn test_range_operators() {
        let doc = json!({"age": 30});
        assert!(FilterMatcher::matches(&doc, &json!({"age": {"$gte": 30, "$lt": 31}})));
        assert!(!FilterMatcher::matches(&doc, &json!({"age": {"$gt": 30}})));
        assert!(!FilterMatcher::matches(&doc, &json!({"age": {"$gt": "3"}})));
    }

    #[test]
    fn test_dotted_path_fans_out_over_arrays() {
        let doc = json!({"rooms": [{"name": "attic"}, {"name": "cellar"}]});
        assert!(FilterMatcher::matches(&doc, &json!({"rooms.name": "cellar"})));
        assert!(FilterMatcher::matches(&doc, &json!({"rooms.1.name": "cellar"})));
        assert!(!FilterMatcher::matches(&doc, &json!({"rooms.0.name": "cellar"})));
    }

    #[test]
    fn test_array_field_equality() {
        let doc = json!({"tags": ["a", "b"]});
        assert!(FilterMatcher::matches(&doc, &json!({"tags": "b"})));
        assert!(FilterMatcher::matches(&doc, &json!({"tags": {"$in": ["x", "a"]}})));
        assert!(FilterMatcher::matches(&doc, &json!({"tags": {"$size": 2}})));
    }

    #[test]
    fn test_logical_operators() {
        let doc = json!({"name": "Ada", "age": 36});
        assert!(FilterMatcher::matches(
            &doc,
            &json!({"$or": [{"name": "Bob"}, {"age": {"$gt": 30}}]})
        ));
        assert!(!FilterMatcher::matches(&doc, &json!({"$nor": [{"name": "Ada"}]})));
        assert!(FilterMatcher::matches(
            &doc,
            &json!({"$and": [{"name": "Ada"}, {"age": 36}]})
        ));
    }

    #[test]
    fn test_exists_and_ne_on_missing() {
        let doc = json!({"name": "Ada"});
        assert!(FilterMatcher::matches(&doc, &json!({"email": {"$exists": false}})));
        assert!(FilterMatcher::matches(&doc, &json!({"email": {"$ne": "x"}})));
        assert!(FilterMatcher::matches(&doc, &json!({"email": null})));
    }

    #[test]
    fn test_regex_with_options() {
        let doc = json!({"email": "Ada@Example.com"});
        assert!(FilterMatcher::matches(
            &doc,
            &json!({"email": {"$regex": "example", "$options": "i"}})
        ));
        assert!(!FilterMatcher::matches(&doc, &json!({"email": {"$regex": "example"}})));
    }

    #[test]
    fn test_check_rejects_unknown_operators() {
        assert!(FilterMatcher::check(&json!({"a": {"$near": 1}})).is_err());
        assert!(FilterMatcher::check(&json!({"$where": "x"})).is_err());
        assert!(FilterMatcher::check(&json!([1])).is_err());
        assert!(FilterMatcher::check(&json!({"$or": [{"a": {"$gt": 1}}]})).is_ok());
    }
}
