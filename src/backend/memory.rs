//! In-process backend over JSON documents.
//!
//! Evaluates a [`QueryDescription`] directly (no DSL round trip) and answers
//! in the same shape as Elasticsearch: hits in insertion order, nested inner
//! hits with offsets, and `global`/`filter`/`nested`/`terms`/`histogram`/
//! `date_histogram` aggregation bodies.

use super::{RawHit, RawHits, RawInnerHits, RawNested, RawResponse, RawTotal};
use crate::error::{FacetError, Result};
use crate::feature::date_histogram::parse_date;
use crate::query::{AggregationKind, AggregationNode, CalendarInterval, DateInterval, QueryDescription};
use crate::types::{FieldValue, Filter, RangeBound};
use chrono::{DateTime, Datelike, Duration, NaiveDate, SecondsFormat, TimeZone, Timelike, Utc};
use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, RwLock};
use std::time::Instant;

type Source = Map<String, Value>;

#[derive(Debug, Clone)]
struct StoredDocument {
    id: String,
    source: Source,
}

/// Cloning shares the underlying store.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    indices: Arc<RwLock<IndexMap<String, Vec<StoredDocument>>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_index(&self, index: &str) {
        let mut store = self.indices.write().unwrap_or_else(|e| e.into_inner());
        store.entry(index.to_string()).or_default();
    }

    /// Add a document, or replace the source of an existing one with the same id.
    pub fn insert(&self, index: &str, id: impl Into<String>, source: Value) -> Result<()> {
        let Value::Object(source) = source else {
            return Err(FacetError::Json(
                "document source must be a JSON object".into(),
            ));
        };
        let id = id.into();
        let mut store = self.indices.write().unwrap_or_else(|e| e.into_inner());
        let docs = store.entry(index.to_string()).or_default();
        match docs.iter_mut().find(|d| d.id == id) {
            Some(existing) => existing.source = source,
            None => docs.push(StoredDocument { id, source }),
        }
        Ok(())
    }

    pub fn count(&self, index: &str) -> usize {
        let store = self.indices.read().unwrap_or_else(|e| e.into_inner());
        store.get(index).map_or(0, Vec::len)
    }

    pub async fn search(
        &self,
        indices: &[String],
        query: &QueryDescription,
    ) -> Result<RawResponse> {
        let start = Instant::now();
        let store = self.indices.read().unwrap_or_else(|e| e.into_inner());

        let names: Vec<&str> = if indices.is_empty() {
            store.keys().map(String::as_str).collect()
        } else {
            indices.iter().map(String::as_str).collect()
        };
        let mut docs: Vec<(&str, &StoredDocument)> = Vec::new();
        for name in names {
            let stored = store.get(name).ok_or_else(|| FacetError::Backend {
                status: 404,
                message: format!("no such index [{name}]"),
            })?;
            docs.extend(stored.iter().map(|d| (name, d)));
        }

        let mut matched: Vec<&Source> = Vec::new();
        let mut hits = Vec::new();
        for &(index, doc) in &docs {
            let mut inner_hits = IndexMap::new();
            let hit = HitRef { index, id: &doc.id };
            if !matches(&query.query, &doc.source, "", hit, &mut inner_hits) {
                continue;
            }
            matched.push(&doc.source);
            if hits.len() < query.size as usize {
                hits.push(RawHit {
                    index: index.to_string(),
                    id: doc.id.clone(),
                    nested: None,
                    source: doc.source.clone(),
                    inner_hits,
                });
            }
        }

        let roots: Vec<&Source> = docs.iter().map(|(_, d)| &d.source).collect();
        let aggregations = if query.aggregations.is_empty() {
            Value::Null
        } else {
            aggregate_all(&query.aggregations, &matched, "", &roots)
        };

        let took = start.elapsed().as_millis() as u64;
        tracing::debug!(
            "[MEMORY] scanned={} matched={} took={}ms",
            docs.len(),
            matched.len(),
            took
        );

        Ok(RawResponse {
            took,
            hits: RawHits {
                total: RawTotal::Object {
                    value: matched.len() as u64,
                    relation: "eq".into(),
                },
                hits,
            },
            aggregations,
        })
    }
}

// ── Filter evaluation ──

/// Parent document identity copied onto inner hits.
#[derive(Clone, Copy)]
struct HitRef<'a> {
    index: &'a str,
    id: &'a str,
}

impl HitRef<'static> {
    const NONE: HitRef<'static> = HitRef { index: "", id: "" };
}

fn matches(
    filter: &Filter,
    doc: &Source,
    prefix: &str,
    hit: HitRef<'_>,
    inner: &mut IndexMap<String, RawInnerHits>,
) -> bool {
    match filter {
        Filter::MatchAll => true,
        Filter::Equals { field, value } => field_values(doc, prefix, field)
            .into_iter()
            .any(|v| value_equals(v, value)),
        Filter::Terms { field, values } => field_values(doc, prefix, field)
            .into_iter()
            .any(|v| values.iter().any(|t| value_matches_term(v, t))),
        Filter::Range { field, gte, lte } => field_values(doc, prefix, field)
            .into_iter()
            .any(|v| in_range(v, gte.as_ref(), lte.as_ref())),
        Filter::And(filters) => filters
            .iter()
            .all(|f| matches(f, doc, prefix, hit, inner)),
        Filter::Nested {
            path,
            query,
            inner_hits,
        } => {
            let mut found = Vec::new();
            for (offset, sub) in nested_documents(doc, prefix, path).into_iter().enumerate() {
                let mut sub_inner = IndexMap::new();
                if matches(query, sub, path, hit, &mut sub_inner) {
                    found.push((offset, sub, sub_inner));
                }
            }
            if found.is_empty() {
                return false;
            }
            if let Some(request) = inner_hits {
                let total = found.len() as u64;
                let hits = found
                    .into_iter()
                    .take(request.size as usize)
                    .map(|(offset, sub, sub_inner)| RawHit {
                        index: hit.index.to_string(),
                        id: hit.id.to_string(),
                        nested: Some(RawNested {
                            field: path.clone(),
                            offset,
                        }),
                        source: sub.clone(),
                        inner_hits: sub_inner,
                    })
                    .collect();
                inner.insert(
                    request.name.clone(),
                    RawInnerHits {
                        hits: RawHits {
                            total: RawTotal::Object {
                                value: total,
                                relation: "eq".into(),
                            },
                            hits,
                        },
                    },
                );
            } else {
                // no inner hits at this level: deeper ones surface on the enclosing hit
                for (_, _, sub_inner) in found {
                    merge_inner_hits(inner, sub_inner);
                }
            }
            true
        }
    }
}

fn merge_inner_hits(
    into: &mut IndexMap<String, RawInnerHits>,
    from: IndexMap<String, RawInnerHits>,
) {
    for (name, found) in from {
        match into.get_mut(&name) {
            Some(existing) => {
                let total = existing.hits.total.value() + found.hits.total.value();
                existing.hits.total = RawTotal::Object {
                    value: total,
                    relation: "eq".into(),
                };
                existing.hits.hits.extend(found.hits.hits);
            }
            None => {
                into.insert(name, found);
            }
        }
    }
}

/// `field` relative to the nested document rooted at `prefix`.
fn relative_path<'f>(field: &'f str, prefix: &str) -> &'f str {
    if prefix.is_empty() {
        return field;
    }
    field
        .strip_prefix(prefix)
        .and_then(|rest| rest.strip_prefix('.'))
        .unwrap_or(field)
}

/// Leaf values at a dotted path. Arrays along the way are flattened.
fn field_values<'a>(doc: &'a Source, prefix: &str, field: &str) -> Vec<&'a Value> {
    let segments: Vec<&str> = relative_path(field, prefix).split('.').collect();
    let mut out = Vec::new();
    collect_from_map(doc, &segments, &mut out);
    out
}

fn collect_from_map<'a>(map: &'a Source, segments: &[&str], out: &mut Vec<&'a Value>) {
    if let Some((first, rest)) = segments.split_first() {
        if let Some(v) = map.get(*first) {
            collect_values(v, rest, out);
        }
    }
}

fn collect_values<'a>(value: &'a Value, segments: &[&str], out: &mut Vec<&'a Value>) {
    match value {
        Value::Array(items) => {
            for item in items {
                collect_values(item, segments, out);
            }
        }
        Value::Object(map) if !segments.is_empty() => collect_from_map(map, segments, out),
        Value::Null => {}
        other if segments.is_empty() => out.push(other),
        _ => {}
    }
}

fn nested_documents<'a>(doc: &'a Source, prefix: &str, path: &str) -> Vec<&'a Source> {
    field_values(doc, prefix, path)
        .into_iter()
        .filter_map(Value::as_object)
        .collect()
}

fn value_equals(v: &Value, expected: &FieldValue) -> bool {
    match expected {
        FieldValue::Bool(b) => v.as_bool() == Some(*b),
        FieldValue::Integer(i) => numeric(v) == Some(*i as f64),
        FieldValue::Float(f) => numeric(v) == Some(*f),
        FieldValue::Text(s) => value_matches_term(v, s),
    }
}

fn value_matches_term(v: &Value, term: &str) -> bool {
    match v {
        Value::String(s) => s == term,
        Value::Number(n) => term.parse::<f64>().ok() == n.as_f64(),
        Value::Bool(b) => term == if *b { "true" } else { "false" },
        _ => false,
    }
}

fn numeric(v: &Value) -> Option<f64> {
    v.as_f64()
        .or_else(|| v.as_str().and_then(|s| s.trim().parse().ok()))
}

fn date_millis(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => parse_date(s).map(|d| d.timestamp_millis()),
        _ => None,
    }
}

fn in_range(v: &Value, gte: Option<&RangeBound>, lte: Option<&RangeBound>) -> bool {
    let compare = |bound: &RangeBound| match bound {
        RangeBound::Number(n) => numeric(v).and_then(|x| x.partial_cmp(n)),
        RangeBound::Date(d) => date_millis(v).map(|ms| ms.cmp(&d.timestamp_millis())),
    };
    let above = gte.map_or(true, |b| compare(b).is_some_and(|o| o != Ordering::Less));
    let below = lte.map_or(true, |b| compare(b).is_some_and(|o| o != Ordering::Greater));
    above && below
}

// ── Aggregations ──

fn aggregate_all(
    aggs: &IndexMap<String, AggregationNode>,
    docs: &[&Source],
    prefix: &str,
    roots: &[&Source],
) -> Value {
    let mut out = Map::new();
    for (name, node) in aggs {
        out.insert(name.clone(), aggregate(node, docs, prefix, roots));
    }
    Value::Object(out)
}

fn with_doc_count(doc_count: usize, sub: Value) -> Value {
    let mut out = Map::new();
    out.insert("doc_count".to_string(), Value::from(doc_count));
    if let Value::Object(sub) = sub {
        out.extend(sub);
    }
    Value::Object(out)
}

fn aggregate(node: &AggregationNode, docs: &[&Source], prefix: &str, roots: &[&Source]) -> Value {
    match node {
        AggregationNode::Global { aggs } => {
            with_doc_count(roots.len(), aggregate_all(aggs, roots, "", roots))
        }
        AggregationNode::Filter { filter, aggs } => {
            let kept: Vec<&Source> = docs
                .iter()
                .copied()
                .filter(|d| matches(filter, d, prefix, HitRef::NONE, &mut IndexMap::new()))
                .collect();
            with_doc_count(kept.len(), aggregate_all(aggs, &kept, prefix, roots))
        }
        AggregationNode::Nested { path, aggs } => {
            let subs: Vec<&Source> = docs
                .iter()
                .copied()
                .flat_map(|d| nested_documents(d, prefix, path))
                .collect();
            with_doc_count(subs.len(), aggregate_all(aggs, &subs, path, roots))
        }
        AggregationNode::Bucket(kind) => {
            serde_json::json!({ "buckets": buckets(kind, docs, prefix) })
        }
    }
}

fn buckets(kind: &AggregationKind, docs: &[&Source], prefix: &str) -> Vec<Value> {
    match kind {
        AggregationKind::Terms {
            field,
            size,
            min_doc_count,
        } => terms_buckets(docs, prefix, field, *size, *min_doc_count),
        AggregationKind::Histogram {
            field,
            interval,
            min_doc_count,
        } => histogram_buckets(docs, prefix, field, *interval, *min_doc_count),
        AggregationKind::DateHistogram {
            field,
            interval,
            format,
            min_doc_count,
        } => date_histogram_buckets(docs, prefix, field, *interval, format.as_deref(), *min_doc_count),
    }
}

struct TermRow {
    key: Value,
    key_as_string: Option<String>,
    count: u64,
}

/// Booleans are keyed 0/1 with a `key_as_string`, as Elasticsearch does.
fn term_key(v: &Value) -> Option<(String, Value, Option<String>)> {
    match v {
        Value::String(s) => Some((s.clone(), Value::String(s.clone()), None)),
        Value::Number(n) => Some((n.to_string(), Value::Number(n.clone()), None)),
        Value::Bool(b) => Some((
            b.to_string(),
            Value::from(u8::from(*b)),
            Some(b.to_string()),
        )),
        _ => None,
    }
}

fn cmp_term_keys(a: &Value, b: &Value) -> Ordering {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        _ => a.as_str().unwrap_or("").cmp(b.as_str().unwrap_or("")),
    }
}

fn terms_buckets(docs: &[&Source], prefix: &str, field: &str, size: u32, min_doc_count: u64) -> Vec<Value> {
    let mut rows: IndexMap<String, TermRow> = IndexMap::new();
    for doc in docs {
        let mut seen = HashSet::new();
        for v in field_values(doc, prefix, field) {
            let Some((repr, key, key_as_string)) = term_key(v) else {
                continue;
            };
            if seen.insert(repr.clone()) {
                rows.entry(repr)
                    .or_insert(TermRow {
                        key,
                        key_as_string,
                        count: 0,
                    })
                    .count += 1;
            }
        }
    }

    let mut rows: Vec<TermRow> = rows
        .into_values()
        .filter(|r| r.count >= min_doc_count)
        .collect();
    rows.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| cmp_term_keys(&a.key, &b.key)));
    rows.truncate(size as usize);

    rows.into_iter()
        .map(|r| {
            let mut bucket = Map::new();
            bucket.insert("key".to_string(), r.key);
            if let Some(s) = r.key_as_string {
                bucket.insert("key_as_string".to_string(), Value::String(s));
            }
            bucket.insert("doc_count".to_string(), Value::from(r.count));
            Value::Object(bucket)
        })
        .collect()
}

fn histogram_buckets(
    docs: &[&Source],
    prefix: &str,
    field: &str,
    interval: f64,
    min_doc_count: u64,
) -> Vec<Value> {
    let mut counts: BTreeMap<i64, u64> = BTreeMap::new();
    for doc in docs {
        let mut seen = HashSet::new();
        for v in field_values(doc, prefix, field) {
            let Some(x) = numeric(v) else { continue };
            let slot = (x / interval).floor() as i64;
            if seen.insert(slot) {
                *counts.entry(slot).or_insert(0) += 1;
            }
        }
    }

    if min_doc_count == 0 {
        let bounds = counts.keys().next().copied().zip(counts.keys().next_back().copied());
        if let Some((first, last)) = bounds {
            for slot in first..=last {
                counts.entry(slot).or_insert(0);
            }
        }
    }

    counts
        .into_iter()
        .filter(|(_, count)| *count >= min_doc_count)
        .map(|(slot, count)| serde_json::json!({ "key": slot as f64 * interval, "doc_count": count }))
        .collect()
}

fn date_histogram_buckets(
    docs: &[&Source],
    prefix: &str,
    field: &str,
    interval: DateInterval,
    format: Option<&str>,
    min_doc_count: u64,
) -> Vec<Value> {
    let mut counts: BTreeMap<i64, u64> = BTreeMap::new();
    for doc in docs {
        let mut seen = HashSet::new();
        for v in field_values(doc, prefix, field) {
            let Some(key) = date_millis(v).and_then(|ms| bucket_start(ms, interval)) else {
                continue;
            };
            if seen.insert(key) {
                *counts.entry(key).or_insert(0) += 1;
            }
        }
    }

    counts
        .into_iter()
        .filter(|(_, count)| *count >= min_doc_count)
        .map(|(key, count)| {
            serde_json::json!({
                "key_as_string": format_date(key, format),
                "key": key,
                "doc_count": count,
            })
        })
        .collect()
}

fn bucket_start(ms: i64, interval: DateInterval) -> Option<i64> {
    match interval {
        DateInterval::Fixed(fixed) => {
            let width = fixed.as_millis();
            Some(ms.div_euclid(width) * width)
        }
        DateInterval::Calendar(calendar) => {
            let dt = Utc.timestamp_millis_opt(ms).single()?;
            let date = dt.date_naive();
            let start = match calendar {
                CalendarInterval::Minute => date.and_hms_opt(dt.hour(), dt.minute(), 0)?,
                CalendarInterval::Hour => date.and_hms_opt(dt.hour(), 0, 0)?,
                CalendarInterval::Day => date.and_hms_opt(0, 0, 0)?,
                CalendarInterval::Week => {
                    let monday =
                        date - Duration::days(i64::from(date.weekday().num_days_from_monday()));
                    monday.and_hms_opt(0, 0, 0)?
                }
                CalendarInterval::Month => {
                    NaiveDate::from_ymd_opt(date.year(), date.month(), 1)?.and_hms_opt(0, 0, 0)?
                }
                CalendarInterval::Quarter => {
                    let month = (date.month() - 1) / 3 * 3 + 1;
                    NaiveDate::from_ymd_opt(date.year(), month, 1)?.and_hms_opt(0, 0, 0)?
                }
                CalendarInterval::Year => {
                    NaiveDate::from_ymd_opt(date.year(), 1, 1)?.and_hms_opt(0, 0, 0)?
                }
            };
            Some(start.and_utc().timestamp_millis())
        }
    }
}

/// Render a bucket key with an Elasticsearch (Joda-style) date pattern.
/// Without a pattern the key is rendered as RFC 3339 with milliseconds.
fn format_date(ms: i64, pattern: Option<&str>) -> String {
    let Some(dt) = Utc.timestamp_millis_opt(ms).single() else {
        return ms.to_string();
    };
    match pattern {
        Some(pattern) => format_with(&dt, pattern),
        None => dt.to_rfc3339_opts(SecondsFormat::Millis, true),
    }
}

fn format_with(dt: &DateTime<Utc>, pattern: &str) -> String {
    dt.format(&joda_to_strftime(pattern)).to_string()
}

fn joda_to_strftime(pattern: &str) -> String {
    fn push_literal(out: &mut String, c: char) {
        if c == '%' {
            out.push_str("%%");
        } else {
            out.push(c);
        }
    }

    let chars: Vec<char> = pattern.chars().collect();
    let mut out = String::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c == '\'' {
            i += 1;
            while i < chars.len() && chars[i] != '\'' {
                push_literal(&mut out, chars[i]);
                i += 1;
            }
            i += 1;
            continue;
        }
        if !c.is_ascii_alphabetic() {
            push_literal(&mut out, c);
            i += 1;
            continue;
        }

        let mut run = 1;
        while i + run < chars.len() && chars[i + run] == c {
            run += 1;
        }
        let spec = match (c, run) {
            ('y' | 'u', 2) => Some("%y"),
            ('y' | 'u', _) => Some("%Y"),
            ('M', 1 | 2) => Some("%m"),
            ('M', 3) => Some("%b"),
            ('M', _) => Some("%B"),
            ('d', _) => Some("%d"),
            ('H', _) => Some("%H"),
            ('h', _) => Some("%I"),
            ('m', _) => Some("%M"),
            ('s', _) => Some("%S"),
            ('S', _) => Some("%3f"),
            ('a', _) => Some("%p"),
            ('E', 1..=3) => Some("%a"),
            ('E', _) => Some("%A"),
            _ => None,
        };
        match spec {
            Some(spec) => out.push_str(spec),
            None => (0..run).for_each(|_| push_literal(&mut out, c)),
        }
        i += run;
    }
    out
}
