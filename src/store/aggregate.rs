//! Aggregation pipelines and map-reduce
//!
//! Supported stages: `$match`, `$project`, `$sort`, `$skip`, `$limit`,
//! `$unwind`, `$group` and `$count`. Group accumulators: `$sum`, `$avg`,
//! `$min`, `$max`, `$push`, `$first`, `$last`.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::tree::{json_get, json_remove, json_set};

use super::errors::{StoreError, StoreResult};
use super::filter::FilterMatcher;
use super::sorter::{compare_values, SortSpec};

/// Runs `pipeline` over `documents`
pub fn run_pipeline(documents: Vec<Value>, pipeline: &[Value]) -> StoreResult<Vec<Value>> {
    let mut docs = documents;
    for stage in pipeline {
        let (name, spec) = stage
            .as_object()
            .filter(|obj| obj.len() == 1)
            .and_then(|obj| obj.iter().next())
            .ok_or_else(|| {
                StoreError::InvalidQuery(format!("pipeline stage must have one operator: {}", stage))
            })?;
        docs = match name.as_str() {
            "$match" => {
                FilterMatcher::check(spec)?;
                docs.into_iter()
                    .filter(|d| FilterMatcher::matches(d, spec))
                    .collect()
            }
            "$project" => project(docs, spec)?,
            "$sort" => {
                SortSpec::from_json(spec).sort(&mut docs);
                docs
            }
            "$skip" => docs.into_iter().skip(count_arg(name, spec)?).collect(),
            "$limit" => docs.into_iter().take(count_arg(name, spec)?).collect(),
            "$unwind" => unwind(docs, spec)?,
            "$group" => group(docs, spec)?,
            "$count" => {
                let field = spec.as_str().ok_or_else(|| {
                    StoreError::InvalidQuery("$count expects a field name".into())
                })?;
                let mut out = Map::new();
                out.insert(field.to_string(), Value::from(docs.len()));
                vec![Value::Object(out)]
            }
            other => {
                return Err(StoreError::InvalidQuery(format!(
                    "unknown pipeline stage {}",
                    other
                )))
            }
        };
    }
    Ok(docs)
}

fn count_arg(stage: &str, spec: &Value) -> StoreResult<usize> {
    spec.as_u64()
        .map(|n| n as usize)
        .ok_or_else(|| StoreError::InvalidQuery(format!("{} expects a non-negative integer", stage)))
}

/// `"$path"` reads the document; anything else is a literal
fn eval(doc: &Value, expr: &Value) -> Value {
    match expr {
        Value::String(s) if s.starts_with('$') => json_get(doc, &s[1..]).cloned().unwrap_or(Value::Null),
        Value::Object(fields) => Value::Object(
            fields
                .iter()
                .map(|(k, v)| (k.clone(), eval(doc, v)))
                .collect(),
        ),
        other => other.clone(),
    }
}

fn project(docs: Vec<Value>, spec: &Value) -> StoreResult<Vec<Value>> {
    let fields = spec
        .as_object()
        .ok_or_else(|| StoreError::InvalidQuery("$project expects an object".into()))?;
    let excluding = fields
        .iter()
        .filter(|(k, _)| k.as_str() != "_id")
        .all(|(_, v)| v == &Value::from(0) || v == &Value::Bool(false));

    Ok(docs
        .into_iter()
        .map(|doc| {
            if excluding {
                let mut out = doc;
                for key in fields.keys() {
                    json_remove(&mut out, key);
                }
                return out;
            }
            let mut out = Value::Object(Map::new());
            let keep_id = !matches!(fields.get("_id"), Some(v) if v == &Value::from(0) || v == &Value::Bool(false));
            if keep_id {
                if let Some(id) = doc.get("_id") {
                    json_set(&mut out, "_id", id.clone());
                }
            }
            for (key, rule) in fields.iter().filter(|(k, _)| k.as_str() != "_id") {
                let value = match rule {
                    Value::Number(_) | Value::Bool(_) => json_get(&doc, key).cloned(),
                    expr => Some(eval(&doc, expr)),
                };
                if let Some(value) = value {
                    json_set(&mut out, key, value);
                }
            }
            out
        })
        .collect())
}

fn unwind(docs: Vec<Value>, spec: &Value) -> StoreResult<Vec<Value>> {
    let path = spec
        .as_str()
        .and_then(|s| s.strip_prefix('$'))
        .ok_or_else(|| StoreError::InvalidQuery("$unwind expects \"$path\"".into()))?;
    let mut out = Vec::new();
    for doc in docs {
        if let Some(Value::Array(items)) = json_get(&doc, path) {
            for item in items.clone() {
                let mut copy = doc.clone();
                json_set(&mut copy, path, item);
                out.push(copy);
            }
        }
    }
    Ok(out)
}

#[derive(Debug)]
enum Accumulator {
    Sum(f64),
    Avg { total: f64, count: usize },
    Min(Option<Value>),
    Max(Option<Value>),
    Push(Vec<Value>),
    First(Option<Value>),
    Last(Option<Value>),
}

impl Accumulator {
    fn new(op: &str) -> StoreResult<Self> {
        Ok(match op {
            "$sum" => Accumulator::Sum(0.0),
            "$avg" => Accumulator::Avg { total: 0.0, count: 0 },
            "$min" => Accumulator::Min(None),
            "$max" => Accumulator::Max(None),
            "$push" => Accumulator::Push(Vec::new()),
            "$first" => Accumulator::First(None),
            "$last" => Accumulator::Last(None),
            other => {
                return Err(StoreError::InvalidQuery(format!(
                    "unknown group accumulator {}",
                    other
                )))
            }
        })
    }

    fn add(&mut self, value: Value) {
        match self {
            Accumulator::Sum(total) => *total += value.as_f64().unwrap_or(0.0),
            Accumulator::Avg { total, count } => {
                if let Some(n) = value.as_f64() {
                    *total += n;
                    *count += 1;
                }
            }
            Accumulator::Min(current) => {
                if !value.is_null()
                    && current
                        .as_ref()
                        .map_or(true, |c| compare_values(Some(&value), Some(c)) == Ordering::Less)
                {
                    *current = Some(value);
                }
            }
            Accumulator::Max(current) => {
                if !value.is_null()
                    && current
                        .as_ref()
                        .map_or(true, |c| compare_values(Some(&value), Some(c)) == Ordering::Greater)
                {
                    *current = Some(value);
                }
            }
            Accumulator::Push(items) => items.push(value),
            Accumulator::First(current) => {
                if current.is_none() {
                    *current = Some(value);
                }
            }
            Accumulator::Last(current) => *current = Some(value),
        }
    }

    fn finish(self) -> Value {
        match self {
            Accumulator::Sum(total) => number(total),
            Accumulator::Avg { total, count } if count > 0 => Value::from(total / count as f64),
            Accumulator::Avg { .. } => Value::Null,
            Accumulator::Min(v) | Accumulator::Max(v) | Accumulator::First(v) | Accumulator::Last(v) => {
                v.unwrap_or(Value::Null)
            }
            Accumulator::Push(items) => Value::Array(items),
        }
    }
}

fn number(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        Value::from(n as i64)
    } else {
        Value::from(n)
    }
}

fn group(docs: Vec<Value>, spec: &Value) -> StoreResult<Vec<Value>> {
    let fields = spec
        .as_object()
        .ok_or_else(|| StoreError::InvalidQuery("$group expects an object".into()))?;
    let key_expr = fields
        .get("_id")
        .ok_or_else(|| StoreError::InvalidQuery("$group needs an _id".into()))?;

    let mut accumulators: Vec<(&String, &str, &Value)> = Vec::new();
    for (name, rule) in fields.iter().filter(|(k, _)| k.as_str() != "_id") {
        let (op, expr) = rule
            .as_object()
            .filter(|o| o.len() == 1)
            .and_then(|o| o.iter().next())
            .ok_or_else(|| {
                StoreError::InvalidQuery(format!("group field {} needs one accumulator", name))
            })?;
        Accumulator::new(op)?;
        accumulators.push((name, op.as_str(), expr));
    }

    let mut groups: IndexMap<String, (Value, Vec<Accumulator>)> = IndexMap::new();
    for doc in &docs {
        let key = eval(doc, key_expr);
        let entry = match groups.entry(key.to_string()) {
            indexmap::map::Entry::Occupied(e) => e.into_mut(),
            indexmap::map::Entry::Vacant(e) => {
                let accs = accumulators
                    .iter()
                    .map(|(_, op, _)| Accumulator::new(op))
                    .collect::<StoreResult<Vec<_>>>()?;
                e.insert((key, accs))
            }
        };
        for (acc, (_, _, expr)) in entry.1.iter_mut().zip(&accumulators) {
            acc.add(eval(doc, expr));
        }
    }

    Ok(groups
        .into_values()
        .map(|(key, accs)| {
            let mut out = Map::new();
            out.insert("_id".to_string(), key);
            for (acc, (name, _, _)) in accs.into_iter().zip(&accumulators) {
                out.insert((*name).clone(), acc.finish());
            }
            Value::Object(out)
        })
        .collect())
}

/// Collects `(key, value)` pairs emitted by a map function
#[derive(Debug, Default)]
pub struct Emitter {
    pairs: Vec<(Value, Value)>,
}

impl Emitter {
    pub fn emit(&mut self, key: impl Into<Value>, value: impl Into<Value>) {
        self.pairs.push((key.into(), value.into()));
    }
}

type MapFn = dyn Fn(&Value, &mut Emitter) + Send + Sync;
type ReduceFn = dyn Fn(&Value, &[Value]) -> Value + Send + Sync;

/// A map-reduce job.
///
/// `reduce` only runs for keys that received more than one value; a single
/// value is passed through unchanged.
#[derive(Clone)]
pub struct MapReduce {
    map: Arc<MapFn>,
    reduce: Arc<ReduceFn>,
    query: Option<Value>,
}

impl MapReduce {
    pub fn new(
        map: impl Fn(&Value, &mut Emitter) + Send + Sync + 'static,
        reduce: impl Fn(&Value, &[Value]) -> Value + Send + Sync + 'static,
    ) -> Self {
        Self {
            map: Arc::new(map),
            reduce: Arc::new(reduce),
            query: None,
        }
    }

    /// Restricts the input documents
    pub fn query(&self) -> Option<&Value> {
        self.query.as_ref()
    }

    pub fn with_query(mut self, filter: Value) -> Self {
        self.query = Some(filter);
        self
    }

    pub(crate) fn run(&self, documents: &[Value]) -> Vec<MapReduceOutput> {
        let mut emitter = Emitter::default();
        for doc in documents {
            (self.map)(doc, &mut emitter);
        }

        let mut buckets: IndexMap<String, (Value, Vec<Value>)> = IndexMap::new();
        for (key, value) in emitter.pairs {
            buckets
                .entry(key.to_string())
                .or_insert_with(|| (key, Vec::new()))
                .1
                .push(value);
        }

        let mut out: Vec<MapReduceOutput> = buckets
            .into_values()
            .map(|(key, mut values)| {
                let value = if values.len() == 1 {
                    values.remove(0)
                } else {
                    (self.reduce)(&key, &values)
                };
                MapReduceOutput { id: key, value }
            })
            .collect();
        out.sort_by(|a, b| compare_values(Some(&a.id), Some(&b.id)));
        out
    }
}

impl fmt::Debug for MapReduce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MapReduce").field("query", &self.query).finish()
    }
}

/// One reduced key
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapReduceOutput {
    #[serde(rename = "_id")]
    pub id: Value,
    pub value: Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn people() -> Vec<Value> {
        vec![
            json!({"_id": "1", "name": "ada", "team": "a", "age": 36, "tags": ["x", "y"]}),
            json!({"_id": "2", "name": "bob", "team": "b", "age": 20, "tags": ["x"]}),
            json!({"_id": "3", "name": "cy", "team": "a", "age": 30, "tags": []}),
        ]
    }

    #[test]
    fn test_match_sort_limit() {
        let out = run_pipeline(
            people(),
            &[
                json!({"$match": {"age": {"$gte": 25}}}),
                json!({"$sort": {"age": 1}}),
                json!({"$limit": 1}),
            ],
        )
        .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0]["name"], "cy");
    }

    #[test]
    fn test_group_accumulators() {
        let out = run_pipeline(
            people(),
            &[json!({"$group": {
                "_id": "$team",
                "count": {"$sum": 1},
                "avgAge": {"$avg": "$age"},
                "oldest": {"$max": "$age"},
                "names": {"$push": "$name"}
            }})],
        )
        .unwrap();
        assert_eq!(
            out[0],
            json!({"_id": "a", "count": 2, "avgAge": 33.0, "oldest": 36, "names": ["ada", "cy"]})
        );
        assert_eq!(out[1]["count"], 1);
    }

    #[test]
    fn test_project_and_count() {
        let out = run_pipeline(people(), &[json!({"$project": {"name": 1, "_id": 0}})]).unwrap();
        assert_eq!(out[0], json!({"name": "ada"}));

        let out = run_pipeline(people(), &[json!({"$count": "total"})]).unwrap();
        assert_eq!(out, vec![json!({"total": 3})]);
    }

    #[test]
    fn test_unwind() {
        let out = run_pipeline(people(), &[json!({"$unwind": "$tags"})]).unwrap();
        assert_eq!(out.len(), 3);
        assert_eq!(out[1]["tags"], "y");
    }

    #[test]
    fn test_unknown_stage() {
        assert!(run_pipeline(people(), &[json!({"$lookup": {}})]).is_err());
    }

    #[test]
    fn test_map_reduce_skips_single_values() {
        let job = MapReduce::new(
            |doc, emit| emit.emit(doc["team"].clone(), doc["age"].clone()),
            |_, values| Value::from(values.iter().filter_map(Value::as_i64).sum::<i64>()),
        );
        let out = job.run(&people());
        assert_eq!(
            out,
            vec![
                MapReduceOutput { id: json!("a"), value: json!(66) },
                MapReduceOutput { id: json!("b"), value: json!(20) },
            ]
        );
    }
}
