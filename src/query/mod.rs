//! Backend-neutral query/aggregation tree produced by [`builder::Builder`].
//!
//! The tree mirrors the Elasticsearch Query DSL closely enough that
//! [`QueryDescription::to_json`] is a direct rendering, while the in-memory
//! backend interprets the typed nodes without going through JSON.

pub mod builder;
pub mod filter;

use crate::error::{FacetError, Result};
use crate::types::Filter;
use filter::FilterCompiler;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Name of the top-level `global` aggregation every facet lives under.
pub const GLOBAL_AGG: &str = "facets";
/// Name of the nested aggregation emitted for each nested scope level.
pub const NESTED_AGG: &str = "nested";
/// Name of the filter aggregation following each nested level.
pub const SCOPED_AGG: &str = "scoped";
/// Name of the innermost bucket aggregation.
pub const BUCKETS_AGG: &str = "buckets";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CalendarInterval {
    Minute,
    Hour,
    Day,
    Week,
    Month,
    Quarter,
    Year,
}

impl CalendarInterval {
    pub fn as_str(&self) -> &'static str {
        match self {
            CalendarInterval::Minute => "minute",
            CalendarInterval::Hour => "hour",
            CalendarInterval::Day => "day",
            CalendarInterval::Week => "week",
            CalendarInterval::Month => "month",
            CalendarInterval::Quarter => "quarter",
            CalendarInterval::Year => "year",
        }
    }
}

impl FromStr for CalendarInterval {
    type Err = FacetError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "minute" | "1m" => Ok(CalendarInterval::Minute),
            "hour" | "1h" => Ok(CalendarInterval::Hour),
            "day" | "1d" => Ok(CalendarInterval::Day),
            "week" | "1w" => Ok(CalendarInterval::Week),
            "month" | "1M" => Ok(CalendarInterval::Month),
            "quarter" | "1q" => Ok(CalendarInterval::Quarter),
            "year" | "1y" => Ok(CalendarInterval::Year),
            other => Err(FacetError::Config(format!(
                "unknown calendar interval '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeUnit {
    Millisecond,
    Second,
    Minute,
    Hour,
    Day,
}

impl TimeUnit {
    fn millis(&self) -> i64 {
        match self {
            TimeUnit::Millisecond => 1,
            TimeUnit::Second => 1_000,
            TimeUnit::Minute => 60_000,
            TimeUnit::Hour => 3_600_000,
            TimeUnit::Day => 86_400_000,
        }
    }

    fn suffix(&self) -> &'static str {
        match self {
            TimeUnit::Millisecond => "ms",
            TimeUnit::Second => "s",
            TimeUnit::Minute => "m",
            TimeUnit::Hour => "h",
            TimeUnit::Day => "d",
        }
    }
}

/// A fixed-length date bucket width such as `1d` or `12h`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FixedInterval {
    pub amount: u32,
    pub unit: TimeUnit,
}

impl FixedInterval {
    pub fn new(amount: u32, unit: TimeUnit) -> Self {
        FixedInterval {
            amount: amount.max(1),
            unit,
        }
    }

    pub fn days(n: u32) -> Self {
        Self::new(n, TimeUnit::Day)
    }

    pub fn hours(n: u32) -> Self {
        Self::new(n, TimeUnit::Hour)
    }

    pub fn minutes(n: u32) -> Self {
        Self::new(n, TimeUnit::Minute)
    }

    pub fn seconds(n: u32) -> Self {
        Self::new(n, TimeUnit::Second)
    }

    pub fn as_millis(&self) -> i64 {
        i64::from(self.amount) * self.unit.millis()
    }
}

impl fmt::Display for FixedInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.amount, self.unit.suffix())
    }
}

impl FromStr for FixedInterval {
    type Err = FacetError;

    fn from_str(s: &str) -> Result<Self> {
        let split = s
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(|| FacetError::Config(format!("fixed interval '{s}' has no unit")))?;
        let (digits, unit) = s.split_at(split);
        let amount: u32 = digits
            .parse()
            .map_err(|_| FacetError::Config(format!("invalid fixed interval '{s}'")))?;
        let unit = match unit {
            "ms" => TimeUnit::Millisecond,
            "s" => TimeUnit::Second,
            "m" => TimeUnit::Minute,
            "h" => TimeUnit::Hour,
            "d" => TimeUnit::Day,
            other => {
                return Err(FacetError::Config(format!(
                    "unknown fixed interval unit '{other}'"
                )))
            }
        };
        if amount == 0 {
            return Err(FacetError::Config(format!(
                "fixed interval '{s}' must be positive"
            )));
        }
        Ok(FixedInterval::new(amount, unit))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DateInterval {
    Fixed(FixedInterval),
    Calendar(CalendarInterval),
}

/// The native bucket aggregation a feature asks for.
#[derive(Debug, Clone, PartialEq)]
pub enum AggregationKind {
    Terms {
        field: String,
        size: u32,
        min_doc_count: u64,
    },
    Histogram {
        field: String,
        interval: f64,
        min_doc_count: u64,
    },
    DateHistogram {
        field: String,
        interval: DateInterval,
        format: Option<String>,
        min_doc_count: u64,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BucketOrder {
    #[default]
    CountDesc,
    KeyAsc,
}

/// How the assembler turns raw buckets into the response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BucketOptions {
    pub order: BucketOrder,
    /// Decode as exactly `[false, true]`, filling missing buckets with 0.
    pub boolean: bool,
    /// Drop the bucket keyed exactly 0.
    pub drop_zero_key: bool,
    /// Use `key_as_string` as the bucket key when present.
    pub formatted_keys: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AggregationNode {
    Global {
        aggs: IndexMap<String, AggregationNode>,
    },
    Filter {
        filter: Filter,
        aggs: IndexMap<String, AggregationNode>,
    },
    Nested {
        path: String,
        aggs: IndexMap<String, AggregationNode>,
    },
    Bucket(AggregationKind),
}

/// Where to find one facet in the raw aggregation tree and how to decode it.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregationPlan {
    pub name: String,
    /// Number of nested levels between the facet filter and its buckets.
    pub nested_depth: usize,
    pub options: BucketOptions,
}

/// The materialized query for one request.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryDescription {
    /// Hit-matching query: the AND of every primary filter.
    pub query: Filter,
    /// Maximum number of hits returned.
    pub size: u32,
    pub aggregations: IndexMap<String, AggregationNode>,
    pub plans: Vec<AggregationPlan>,
}

impl QueryDescription {
    /// Render the Elasticsearch `_search` request body.
    pub fn to_json(&self) -> Result<serde_json::Value> {
        let compiler = FilterCompiler::new();
        let mut body = serde_json::Map::new();
        body.insert("size".to_string(), serde_json::json!(self.size));
        body.insert("track_total_hits".to_string(), serde_json::json!(true));
        body.insert("query".to_string(), compiler.compile(&self.query)?);
        if !self.aggregations.is_empty() {
            body.insert(
                "aggs".to_string(),
                aggregations_to_json(&compiler, &self.aggregations)?,
            );
        }
        Ok(serde_json::Value::Object(body))
    }
}

fn aggregations_to_json(
    compiler: &FilterCompiler,
    aggs: &IndexMap<String, AggregationNode>,
) -> Result<serde_json::Value> {
    let mut map = serde_json::Map::new();
    for (name, node) in aggs {
        map.insert(name.clone(), aggregation_to_json(compiler, node)?);
    }
    Ok(serde_json::Value::Object(map))
}

fn aggregation_to_json(
    compiler: &FilterCompiler,
    node: &AggregationNode,
) -> Result<serde_json::Value> {
    let value = match node {
        AggregationNode::Global { aggs } => serde_json::json!({
            "global": {},
            "aggs": aggregations_to_json(compiler, aggs)?,
        }),
        AggregationNode::Filter { filter, aggs } => serde_json::json!({
            "filter": compiler.compile(filter)?,
            "aggs": aggregations_to_json(compiler, aggs)?,
        }),
        AggregationNode::Nested { path, aggs } => serde_json::json!({
            "nested": { "path": path },
            "aggs": aggregations_to_json(compiler, aggs)?,
        }),
        AggregationNode::Bucket(kind) => bucket_to_json(kind),
    };
    Ok(value)
}

fn bucket_to_json(kind: &AggregationKind) -> serde_json::Value {
    match kind {
        AggregationKind::Terms {
            field,
            size,
            min_doc_count,
        } => serde_json::json!({
            "terms": {
                "field": field,
                "size": size,
                "min_doc_count": min_doc_count,
                "order": [{ "_count": "desc" }, { "_key": "asc" }],
            }
        }),
        AggregationKind::Histogram {
            field,
            interval,
            min_doc_count,
        } => serde_json::json!({
            "histogram": {
                "field": field,
                "interval": interval,
                "min_doc_count": min_doc_count,
            }
        }),
        AggregationKind::DateHistogram {
            field,
            interval,
            format,
            min_doc_count,
        } => {
            let mut body = serde_json::Map::new();
            body.insert("field".to_string(), serde_json::json!(field));
            match interval {
                DateInterval::Fixed(fixed) => {
                    body.insert(
                        "fixed_interval".to_string(),
                        serde_json::json!(fixed.to_string()),
                    );
                }
                DateInterval::Calendar(cal) => {
                    body.insert(
                        "calendar_interval".to_string(),
                        serde_json::json!(cal.as_str()),
                    );
                }
            }
            if let Some(format) = format {
                body.insert("format".to_string(), serde_json::json!(format));
            }
            body.insert(
                "min_doc_count".to_string(),
                serde_json::json!(min_doc_count),
            );
            serde_json::json!({ "date_histogram": body })
        }
    }
}
