//! Turns a backend's [`RawResponse`] into a [`Response`], walking each
//! aggregation through the same wrapper chain the builder emitted.

use crate::backend::{RawHit, RawResponse};
use crate::error::{FacetError, Result};
use crate::query::{
    AggregationPlan, BucketOrder, QueryDescription, BUCKETS_AGG, GLOBAL_AGG, NESTED_AGG,
    SCOPED_AGG,
};
use crate::types::{Bucket, BucketKey, Document, Response};
use indexmap::IndexMap;
use serde_json::Value;

#[derive(Debug, Default, Clone, Copy)]
pub struct ResponseAssembler;

impl ResponseAssembler {
    pub fn new() -> Self {
        ResponseAssembler
    }

    pub fn assemble(&self, raw: RawResponse, query: &QueryDescription) -> Result<Response> {
        let mut aggregations = IndexMap::new();
        if !query.plans.is_empty() {
            let facets = raw.aggregations.get(GLOBAL_AGG).ok_or_else(|| {
                FacetError::Decode(format!("response has no '{GLOBAL_AGG}' aggregation"))
            })?;
            for plan in &query.plans {
                aggregations.insert(plan.name.clone(), self.decode_buckets(facets, plan)?);
            }
        }

        Ok(Response {
            total: raw.hits.total.value(),
            hits: raw.hits.hits.into_iter().map(to_document).collect(),
            aggregations,
        })
    }

    fn decode_buckets(&self, facets: &Value, plan: &AggregationPlan) -> Result<Vec<Bucket>> {
        let missing = |what: &str| {
            FacetError::Decode(format!("aggregation '{}': missing {what}", plan.name))
        };

        let mut node = facets.get(&plan.name).ok_or_else(|| missing("facet"))?;
        for _ in 0..plan.nested_depth {
            node = node
                .get(NESTED_AGG)
                .and_then(|n| n.get(SCOPED_AGG))
                .ok_or_else(|| missing("nested wrapper"))?;
        }
        let raw_buckets = node
            .get(BUCKETS_AGG)
            .and_then(|b| b.get("buckets"))
            .and_then(Value::as_array)
            .ok_or_else(|| missing("bucket array"))?;

        let options = plan.options;
        let mut rows = Vec::with_capacity(raw_buckets.len());
        for raw in raw_buckets {
            let count = raw
                .get("doc_count")
                .and_then(Value::as_u64)
                .ok_or_else(|| missing("doc_count"))?;
            let key = raw.get("key").ok_or_else(|| missing("bucket key"))?;
            let sort_key = if options.boolean {
                boolean_key(raw, key).ok_or_else(|| {
                    FacetError::Decode(format!(
                        "aggregation '{}': non-boolean key {key}",
                        plan.name
                    ))
                })?
            } else {
                plain_key(key).ok_or_else(|| missing("scalar bucket key"))?
            };
            if options.drop_zero_key && sort_key.as_number() == Some(0.0) {
                continue;
            }
            let display = match raw.get("key_as_string").and_then(Value::as_str) {
                Some(s) if options.formatted_keys => BucketKey::Text(s.to_string()),
                _ => sort_key.clone(),
            };
            rows.push((sort_key, display, count));
        }

        if options.boolean {
            let count_of = |wanted: bool| {
                rows.iter()
                    .filter(|(k, _, _)| k.as_bool() == Some(wanted))
                    .map(|(_, _, c)| *c)
                    .sum::<u64>()
            };
            return Ok(vec![
                Bucket {
                    key: BucketKey::Bool(false),
                    count: count_of(false),
                },
                Bucket {
                    key: BucketKey::Bool(true),
                    count: count_of(true),
                },
            ]);
        }

        match options.order {
            BucketOrder::CountDesc => {
                rows.sort_by(|a, b| b.2.cmp(&a.2).then_with(|| a.0.cmp_key(&b.0)))
            }
            BucketOrder::KeyAsc => rows.sort_by(|a, b| a.0.cmp_key(&b.0)),
        }

        Ok(rows
            .into_iter()
            .map(|(_, key, count)| Bucket { key, count })
            .collect())
    }
}

/// Terms over a boolean field come back keyed 0/1 with `key_as_string`.
fn boolean_key(raw: &Value, key: &Value) -> Option<BucketKey> {
    let parsed = match raw.get("key_as_string").and_then(Value::as_str) {
        Some("true") => Some(true),
        Some("false") => Some(false),
        _ => match key {
            Value::Bool(b) => Some(*b),
            Value::Number(n) => match n.as_f64() {
                Some(x) if x == 1.0 => Some(true),
                Some(x) if x == 0.0 => Some(false),
                _ => None,
            },
            Value::String(s) if s.eq_ignore_ascii_case("true") => Some(true),
            Value::String(s) if s.eq_ignore_ascii_case("false") => Some(false),
            _ => None,
        },
    };
    parsed.map(BucketKey::Bool)
}

fn plain_key(key: &Value) -> Option<BucketKey> {
    match key {
        Value::String(s) => Some(BucketKey::Text(s.clone())),
        Value::Number(n) => n.as_f64().map(BucketKey::Number),
        Value::Bool(b) => Some(BucketKey::Bool(*b)),
        _ => None,
    }
}

fn to_document(hit: RawHit) -> Document {
    Document {
        id: hit.id,
        index: hit.index,
        fields: hit.source,
        inner_hits: hit
            .inner_hits
            .into_iter()
            .map(|(name, inner)| {
                let docs = inner.hits.hits.into_iter().map(to_document).collect();
                (name, docs)
            })
            .collect(),
    }
}
