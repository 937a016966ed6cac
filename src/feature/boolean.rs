use crate::error::Result;
use crate::query::builder::{Builder, FeatureId};
use crate::query::{AggregationKind, BucketOptions, BucketOrder};
use crate::request::Request;
use crate::types::{FieldValue, Filter};

/// Facet over a boolean field. The aggregation always reports both
/// `false` and `true`, with zero counts kept.
#[derive(Debug)]
pub struct BooleanFilter {
    id: FeatureId,
    field: String,
}

impl BooleanFilter {
    pub fn new(field: impl Into<String>) -> Self {
        BooleanFilter {
            id: FeatureId::next(),
            field: field.into(),
        }
    }

    pub fn id(&self) -> FeatureId {
        self.id
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn apply(&self, request: &Request, builder: &mut Builder) -> Result<()> {
        if let Some(value) = request.first(&self.field).and_then(parse_bool) {
            builder.add_filter(
                self.id,
                Filter::Equals {
                    field: self.field.clone(),
                    value: FieldValue::Bool(value),
                },
            );
        }

        builder.add_aggregation(
            self.id,
            &self.field,
            AggregationKind::Terms {
                field: self.field.clone(),
                size: 2,
                min_doc_count: 0,
            },
            BucketOptions {
                order: BucketOrder::KeyAsc,
                boolean: true,
                ..BucketOptions::default()
            },
        )
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    if raw.eq_ignore_ascii_case("true") {
        Some(true)
    } else if raw.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}
