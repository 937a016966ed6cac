use crate::error::Result;
use crate::query::builder::{Builder, FeatureId};
use crate::query::{AggregationKind, BucketOptions, BucketOrder};
use crate::request::Request;
use crate::types::Filter;

/// Multi-select term facet. Every value supplied for the field is ORed; the
/// terms aggregation lists values by descending count.
#[derive(Debug)]
pub struct DynamicFilter {
    id: FeatureId,
    field: String,
}

impl DynamicFilter {
    pub fn new(field: impl Into<String>) -> Self {
        DynamicFilter {
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
        let values = request.values(&self.field);
        if !values.is_empty() {
            builder.add_filter(
                self.id,
                Filter::Terms {
                    field: self.field.clone(),
                    values: values.into_iter().map(str::to_string).collect(),
                },
            );
        }

        let size = builder.limits().max_values_per_facet;
        builder.add_aggregation(
            self.id,
            &self.field,
            AggregationKind::Terms {
                field: self.field.clone(),
                size,
                min_doc_count: 1,
            },
            BucketOptions {
                order: BucketOrder::CountDesc,
                ..BucketOptions::default()
            },
        )
    }
}
