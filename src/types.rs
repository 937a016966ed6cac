use chrono::{DateTime, SecondsFormat, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// A scalar value a filter compares against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl FieldValue {
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            FieldValue::Bool(b) => serde_json::Value::Bool(*b),
            FieldValue::Integer(i) => serde_json::json!(i),
            FieldValue::Float(f) => serde_json::json!(f),
            FieldValue::Text(s) => serde_json::Value::String(s.clone()),
        }
    }
}

/// One side of a [`Filter::Range`]. Both sides are inclusive.
#[derive(Debug, Clone, PartialEq)]
pub enum RangeBound {
    Number(f64),
    Date(DateTime<Utc>),
}

impl RangeBound {
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            RangeBound::Number(n) => serde_json::json!(n),
            RangeBound::Date(d) => {
                serde_json::Value::String(d.to_rfc3339_opts(SecondsFormat::Millis, true))
            }
        }
    }
}

/// Inner hits requested on a nested clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InnerHitsRequest {
    /// Key the backend returns the sub-documents under (the nested path).
    pub name: String,
    pub size: u32,
}

/// A composable filter tree. Only conjunction is needed: every primary filter
/// of a request is ANDed, and OR over several values of one field is
/// expressed by [`Filter::Terms`].
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    MatchAll,
    Equals {
        field: String,
        value: FieldValue,
    },
    Terms {
        field: String,
        values: Vec<String>,
    },
    Range {
        field: String,
        gte: Option<RangeBound>,
        lte: Option<RangeBound>,
    },
    And(Vec<Filter>),
    Nested {
        path: String,
        query: Box<Filter>,
        inner_hits: Option<InnerHitsRequest>,
    },
}

impl Filter {
    /// Conjunction that drops `MatchAll` members and flattens nested `And`s.
    /// An empty conjunction is `MatchAll`; a single member is returned as is.
    pub fn and(filters: impl IntoIterator<Item = Filter>) -> Filter {
        let mut parts = Vec::new();
        for f in filters {
            match f {
                Filter::MatchAll => {}
                Filter::And(inner) => parts.extend(inner),
                other => parts.push(other),
            }
        }
        match parts.len() {
            0 => Filter::MatchAll,
            1 => parts.remove(0),
            _ => Filter::And(parts),
        }
    }

    pub fn is_match_all(&self) -> bool {
        matches!(self, Filter::MatchAll)
    }
}

/// A decoded aggregation bucket key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BucketKey {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl BucketKey {
    /// Total order used for key-ascending sorts and count ties:
    /// booleans, then numbers, then text.
    pub fn cmp_key(&self, other: &BucketKey) -> Ordering {
        fn rank(k: &BucketKey) -> u8 {
            match k {
                BucketKey::Bool(_) => 0,
                BucketKey::Number(_) => 1,
                BucketKey::Text(_) => 2,
            }
        }
        match (self, other) {
            (BucketKey::Bool(a), BucketKey::Bool(b)) => a.cmp(b),
            (BucketKey::Number(a), BucketKey::Number(b)) => a.total_cmp(b),
            (BucketKey::Text(a), BucketKey::Text(b)) => a.cmp(b),
            _ => rank(self).cmp(&rank(other)),
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            BucketKey::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            BucketKey::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl fmt::Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BucketKey::Bool(b) => write!(f, "{b}"),
            BucketKey::Number(n) => write!(f, "{n}"),
            BucketKey::Text(s) => f.write_str(s),
        }
    }
}

/// A single facet value and its document count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bucket {
    pub key: BucketKey,
    pub count: u64,
}

/// A matched document. Inner hits are keyed by nested path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub index: String,
    pub fields: serde_json::Map<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub inner_hits: IndexMap<String, Vec<Document>>,
}

impl Document {
    pub fn get(&self, field: &str) -> Option<&serde_json::Value> {
        self.fields.get(field)
    }

    /// Sub-documents returned for `path`; empty when none were requested or matched.
    pub fn inner_hits(&self, path: &str) -> &[Document] {
        self.inner_hits.get(path).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Results returned by [`Endpoint::execute`](crate::Endpoint::execute).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// Total number of matching documents (before pagination).
    pub total: u64,
    /// Matching documents in backend order.
    pub hits: Vec<Document>,
    /// Buckets keyed by aggregation name.
    pub aggregations: IndexMap<String, Vec<Bucket>>,
}

impl Response {
    pub fn buckets(&self, name: &str) -> Option<&[Bucket]> {
        self.aggregations.get(name).map(Vec::as_slice)
    }
}
