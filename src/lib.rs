//! Facet-aware query composition for document search backends.
//!
//! An [`Endpoint`] holds an ordered list of [`Feature`]s. For each request,
//! every feature reads its parameters, contributes at most one filter and
//! registers an aggregation; the endpoint then builds a single query in
//! which each aggregation sees every filter except its own feature's, runs
//! it on a [`Backend`], and decodes the hits and buckets into a [`Response`].

pub mod backend;
pub mod endpoint;
pub mod error;
pub mod feature;
pub mod query;
pub mod request;
pub mod response;
pub mod settings;
pub mod types;

pub use backend::{Backend, ElasticsearchBackend, ElasticsearchConfig, MemoryBackend};
pub use endpoint::{CancelHandle, Context, Endpoint};
pub use error::{FacetError, Result};
pub use feature::{
    BooleanFilter, DateHistogram, DynamicFilter, Feature, Histogram, NestedDocumentWrapper,
};
pub use query::builder::{Builder, FeatureId};
pub use query::{CalendarInterval, FixedInterval, QueryDescription};
pub use request::{Parameter, Request};
pub use settings::EndpointSettings;
pub use types::{Bucket, BucketKey, Document, Response};

#[cfg(test)]
mod integ_tests;
