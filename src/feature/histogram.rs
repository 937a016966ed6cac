use crate::error::Result;
use crate::query::builder::{Builder, FeatureId};
use crate::query::{AggregationKind, BucketOptions, BucketOrder};
use crate::request::Request;
use crate::types::{Filter, RangeBound};

/// Numeric range facet bucketed at a fixed interval. Filters on
/// `field.min` / `field.max`.
#[derive(Debug)]
pub struct Histogram {
    id: FeatureId,
    field: String,
    interval: f64,
    drop_zero_bucket: bool,
}

impl Histogram {
    pub fn new(field: impl Into<String>, interval: f64) -> Self {
        let field = field.into();
        let interval = if interval.is_finite() && interval > 0.0 {
            interval
        } else {
            tracing::warn!(
                "[FEATURE] histogram '{}' has invalid interval {}, using 1",
                field,
                interval
            );
            1.0
        };
        Histogram {
            id: FeatureId::next(),
            field,
            interval,
            drop_zero_bucket: false,
        }
    }

    /// Omit the bucket keyed exactly 0 from the response. Useful when 0 means
    /// "unset" (e.g. unrated products).
    pub fn without_zero_bucket(mut self) -> Self {
        self.drop_zero_bucket = true;
        self
    }

    pub fn id(&self) -> FeatureId {
        self.id
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn interval(&self) -> f64 {
        self.interval
    }

    pub fn apply(&self, request: &Request, builder: &mut Builder) -> Result<()> {
        let range = request.range_values(&self.field);
        let gte = range.min.and_then(parse_number).map(RangeBound::Number);
        let lte = range.max.and_then(parse_number).map(RangeBound::Number);
        if gte.is_some() || lte.is_some() {
            builder.add_filter(
                self.id,
                Filter::Range {
                    field: self.field.clone(),
                    gte,
                    lte,
                },
            );
        }

        builder.add_aggregation(
            self.id,
            &self.field,
            AggregationKind::Histogram {
                field: self.field.clone(),
                interval: self.interval,
                min_doc_count: 1,
            },
            BucketOptions {
                order: BucketOrder::KeyAsc,
                drop_zero_key: self.drop_zero_bucket,
                ..BucketOptions::default()
            },
        )
    }
}

fn parse_number(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|n| n.is_finite())
}
