//! Facet features: each reads its parameters from the [`Request`], adds at
//! most one primary filter and registers its aggregation on the [`Builder`].
//!
//! Features are configured once and reused across requests; `apply` only
//! reads `self`. Every feature carries a [`FeatureId`] allocated when it is
//! constructed, which is why features are not `Clone`.

pub mod boolean;
pub mod date_histogram;
pub mod dynamic;
pub mod histogram;
pub mod nested;

pub use boolean::BooleanFilter;
pub use date_histogram::DateHistogram;
pub use dynamic::DynamicFilter;
pub use histogram::Histogram;
pub use nested::NestedDocumentWrapper;

use crate::error::Result;
use crate::query::builder::{Builder, FeatureId};
use crate::request::Request;

#[derive(Debug)]
pub enum Feature {
    DynamicFilter(DynamicFilter),
    BooleanFilter(BooleanFilter),
    Histogram(Histogram),
    DateHistogram(DateHistogram),
    Nested(NestedDocumentWrapper),
}

impl Feature {
    pub fn id(&self) -> FeatureId {
        match self {
            Feature::DynamicFilter(f) => f.id(),
            Feature::BooleanFilter(f) => f.id(),
            Feature::Histogram(f) => f.id(),
            Feature::DateHistogram(f) => f.id(),
            Feature::Nested(f) => f.id(),
        }
    }

    /// Field (or nested path) the feature is bound to. Also the aggregation
    /// name for every variant except the nested wrapper, which has none.
    pub fn field(&self) -> &str {
        match self {
            Feature::DynamicFilter(f) => f.field(),
            Feature::BooleanFilter(f) => f.field(),
            Feature::Histogram(f) => f.field(),
            Feature::DateHistogram(f) => f.field(),
            Feature::Nested(f) => f.path(),
        }
    }

    /// Contribute this feature's filter and aggregation for `request`.
    ///
    /// Absent or malformed parameters contribute no filter. The only error is
    /// [`FacetError::DuplicateAggregation`](crate::FacetError::DuplicateAggregation).
    pub fn apply(&self, request: &Request, builder: &mut Builder) -> Result<()> {
        match self {
            Feature::DynamicFilter(f) => f.apply(request, builder),
            Feature::BooleanFilter(f) => f.apply(request, builder),
            Feature::Histogram(f) => f.apply(request, builder),
            Feature::DateHistogram(f) => f.apply(request, builder),
            Feature::Nested(f) => f.apply(request, builder),
        }
    }
}

impl From<DynamicFilter> for Feature {
    fn from(f: DynamicFilter) -> Self {
        Feature::DynamicFilter(f)
    }
}

impl From<BooleanFilter> for Feature {
    fn from(f: BooleanFilter) -> Self {
        Feature::BooleanFilter(f)
    }
}

impl From<Histogram> for Feature {
    fn from(f: Histogram) -> Self {
        Feature::Histogram(f)
    }
}

impl From<DateHistogram> for Feature {
    fn from(f: DateHistogram) -> Self {
        Feature::DateHistogram(f.finish())
    }
}

impl From<NestedDocumentWrapper> for Feature {
    fn from(f: NestedDocumentWrapper) -> Self {
        Feature::Nested(f)
    }
}
