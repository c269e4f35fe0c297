//! Query model shared by sessions and shard backends
//!
//! A query optionally narrows to one collection, filters on top-level body
//! fields, and may declare a sort and a limit. Shards evaluate the same query
//! so their result streams can be merged without re-sorting.

use crate::document::Document;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;

/// Comparison operator for a predicate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
}

/// A single `field <op> value` condition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Predicate {
    pub field: String,
    pub op: CompareOp,
    pub value: Value,
}

impl Predicate {
    pub fn new(field: impl Into<String>, op: CompareOp, value: Value) -> Self {
        Self {
            field: field.into(),
            op,
            value,
        }
    }

    /// Evaluate against a document. Missing fields compare as null.
    pub fn matches(&self, doc: &Document) -> bool {
        let actual = doc.field(&self.field).unwrap_or(&Value::Null);
        let ord = compare_values(actual, &self.value);
        match self.op {
            CompareOp::Eq => ord == Ordering::Equal,
            CompareOp::Ne => ord != Ordering::Equal,
            CompareOp::Gt => ord == Ordering::Greater,
            CompareOp::Gte => ord != Ordering::Less,
            CompareOp::Lt => ord == Ordering::Less,
            CompareOp::Lte => ord != Ordering::Greater,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

/// Sort order declared by a query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub field: String,
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Desc,
        }
    }

    /// Order two documents under this spec
    pub fn compare(&self, a: &Document, b: &Document) -> Ordering {
        let left = a.field(&self.field).unwrap_or(&Value::Null);
        let right = b.field(&self.field).unwrap_or(&Value::Null);
        let ord = compare_values(left, right);
        match self.direction {
            SortDirection::Asc => ord,
            SortDirection::Desc => ord.reverse(),
        }
    }
}

/// Query against the logical store
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Query {
    /// Narrowing collection; `None` means every collection on every shard
    pub collection: Option<String>,
    pub filter: Vec<Predicate>,
    pub sort: Option<SortSpec>,
    pub limit: Option<usize>,
}

impl Query {
    /// Query over every collection
    pub fn all() -> Self {
        Self::default()
    }

    /// Query narrowed to one collection
    pub fn collection(name: impl Into<String>) -> Self {
        Self {
            collection: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.filter.push(predicate);
        self
    }

    pub fn where_eq(self, field: impl Into<String>, value: Value) -> Self {
        self.filter(Predicate::new(field, CompareOp::Eq, value))
    }

    pub fn order_by(mut self, sort: SortSpec) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn take(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether a document satisfies the collection narrowing and every predicate
    pub fn matches(&self, doc: &Document) -> bool {
        if let Some(collection) = &self.collection {
            if doc.collection() != collection {
                return false;
            }
        }
        self.filter.iter().all(|p| p.matches(doc))
    }

    /// Apply this query to an unordered candidate set: filter, sort, limit.
    pub fn evaluate<I>(&self, candidates: I) -> Vec<Document>
    where
        I: IntoIterator<Item = Document>,
    {
        let mut matched: Vec<Document> = candidates.into_iter().filter(|d| self.matches(d)).collect();
        if let Some(sort) = &self.sort {
            matched.sort_by(|a, b| sort.compare(a, b));
        }
        if let Some(limit) = self.limit {
            matched.truncate(limit);
        }
        matched
    }
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// Total order over JSON values: null < bool < number < string < array < object
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            if let (Some(x), Some(y)) = (x.as_i64(), y.as_i64()) {
                return x.cmp(&y);
            }
            if let (Some(x), Some(y)) = (x.as_u64(), y.as_u64()) {
                return x.cmp(&y);
            }
            let x = x.as_f64().unwrap_or(f64::NAN);
            let y = y.as_f64().unwrap_or(f64::NAN);
            x.total_cmp(&y)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => {
            for (l, r) in x.iter().zip(y.iter()) {
                let ord = compare_values(l, r);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            x.len().cmp(&y.len())
        }
        (Value::Object(x), Value::Object(y)) => x.len().cmp(&y.len()),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn user(id: &str, name: &str, age: u64) -> Document {
        Document::with_id("Users", id, json!({ "Name": name, "Age": age }))
    }

    #[test]
    fn test_compare_values_across_types() {
        assert_eq!(compare_values(&json!(null), &json!(false)), Ordering::Less);
        assert_eq!(compare_values(&json!(3), &json!("3")), Ordering::Less);
        assert_eq!(compare_values(&json!(2), &json!(10)), Ordering::Less);
        assert_eq!(compare_values(&json!(-1), &json!(1u64)), Ordering::Less);
        assert_eq!(compare_values(&json!(1.5), &json!(1)), Ordering::Greater);
        assert_eq!(compare_values(&json!("b"), &json!("a")), Ordering::Greater);
    }

    #[test]
    fn test_predicate_missing_field_is_null() {
        let doc = Document::with_id("Users", "users/1", json!({}));
        assert!(Predicate::new("Name", CompareOp::Eq, json!(null)).matches(&doc));
        assert!(!Predicate::new("Name", CompareOp::Eq, json!("Oren")).matches(&doc));
    }

    #[test]
    fn test_query_evaluate_filters_sorts_and_limits() {
        let docs = vec![
            user("users/1", "Oren", 40),
            user("users/2", "Fitzchak", 30),
            user("users/3", "Itamar", 35),
            Document::with_id("Orders", "orders/1", json!({ "Age": 1 })),
        ];

        let query = Query::collection("Users")
            .filter(Predicate::new("Age", CompareOp::Gte, json!(31)))
            .order_by(SortSpec::desc("Age"))
            .take(1);

        let result = query.evaluate(docs);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].id(), Some("users/1"));
    }

    #[test]
    fn test_query_without_collection_spans_collections() {
        let docs = vec![
            user("users/1", "Oren", 40),
            Document::with_id("Orders", "orders/1", json!({ "Age": 1 })),
        ];
        assert_eq!(Query::all().evaluate(docs).len(), 2);
    }
}
