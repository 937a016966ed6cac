//! Search backends. The contract is a single call: run a
//! [`QueryDescription`] against some indices and return an
//! Elasticsearch-shaped [`RawResponse`].
//!
//! Enum dispatch rather than a trait object: async fn in traits is not
//! dyn-safe, and the set of backends is closed.

pub mod elasticsearch;
pub mod memory;

pub use elasticsearch::{ElasticsearchBackend, ElasticsearchConfig};
pub use memory::MemoryBackend;

use crate::error::Result;
use crate::query::QueryDescription;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone)]
pub enum Backend {
    Elasticsearch(Box<ElasticsearchBackend>),
    Memory(MemoryBackend),
}

impl Backend {
    pub async fn search(
        &self,
        indices: &[String],
        query: &QueryDescription,
    ) -> Result<RawResponse> {
        match self {
            Backend::Elasticsearch(b) => b.search(indices, query).await,
            Backend::Memory(b) => b.search(indices, query).await,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Backend::Elasticsearch(_) => "elasticsearch",
            Backend::Memory(_) => "memory",
        }
    }
}

impl From<ElasticsearchBackend> for Backend {
    fn from(b: ElasticsearchBackend) -> Self {
        Backend::Elasticsearch(Box::new(b))
    }
}

impl From<MemoryBackend> for Backend {
    fn from(b: MemoryBackend) -> Self {
        Backend::Memory(b)
    }
}

// ── Raw response ──

/// Body of a `_search` response, reduced to the parts the assembler reads.
/// `hits.total`, `hits.hits` and every hit's `_source` are required.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawResponse {
    #[serde(default)]
    pub took: u64,
    pub hits: RawHits,
    #[serde(default)]
    pub aggregations: serde_json::Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawHits {
    pub total: RawTotal,
    pub hits: Vec<RawHit>,
}

/// `hits.total` is an object since Elasticsearch 7 and a bare number before.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawTotal {
    Count(u64),
    Object {
        value: u64,
        #[serde(default)]
        relation: String,
    },
}

impl Default for RawTotal {
    fn default() -> Self {
        RawTotal::Count(0)
    }
}

impl RawTotal {
    pub fn value(&self) -> u64 {
        match self {
            RawTotal::Count(n) => *n,
            RawTotal::Object { value, .. } => *value,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawHit {
    #[serde(rename = "_index", default)]
    pub index: String,
    #[serde(rename = "_id", default)]
    pub id: String,
    #[serde(rename = "_nested", default, skip_serializing_if = "Option::is_none")]
    pub nested: Option<RawNested>,
    #[serde(rename = "_source")]
    pub source: serde_json::Map<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub inner_hits: IndexMap<String, RawInnerHits>,
}

/// Position of an inner hit inside its parent document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawNested {
    pub field: String,
    pub offset: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawInnerHits {
    pub hits: RawHits,
}
