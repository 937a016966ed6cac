use super::Feature;
use crate::error::Result;
use crate::query::builder::{Builder, FeatureId};
use crate::request::Request;

/// Groups features that operate on the sub-documents under `path`. Child
/// features keep their full dotted field names (`reviews.author`).
#[derive(Debug)]
pub struct NestedDocumentWrapper {
    id: FeatureId,
    path: String,
    features: Vec<Feature>,
    inner_hits: bool,
}

impl NestedDocumentWrapper {
    pub fn new(path: impl Into<String>) -> Self {
        NestedDocumentWrapper {
            id: FeatureId::next(),
            path: path.into(),
            features: Vec::new(),
            inner_hits: false,
        }
    }

    pub fn with_features(mut self, features: impl IntoIterator<Item = Feature>) -> Self {
        self.features.extend(features);
        self
    }

    /// Return the matching sub-documents with each hit.
    pub fn with_inner_hits(mut self) -> Self {
        self.inner_hits = true;
        self
    }

    pub fn id(&self) -> FeatureId {
        self.id
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    pub fn apply(&self, request: &Request, builder: &mut Builder) -> Result<()> {
        let mut scope = builder.enter_scope(&self.path);
        if self.inner_hits {
            scope.request_inner_hits();
        }
        for feature in &self.features {
            feature.apply(request, &mut scope)?;
        }
        Ok(())
    }
}
