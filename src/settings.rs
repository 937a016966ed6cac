use crate::error::{FacetError, Result};
use crate::query::builder::BuildLimits;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;

fn default_hits_per_page() -> u32 {
    20
}

fn default_max_values_per_facet() -> u32 {
    1000
}

fn default_inner_hits_size() -> u32 {
    100
}

/// Per-endpoint configuration: which indices to search and the size limits
/// applied to hits, terms buckets and inner hits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointSettings {
    #[serde(default)]
    pub indices: Vec<String>,

    #[serde(default = "default_hits_per_page")]
    pub hits_per_page: u32,

    #[serde(default = "default_max_values_per_facet")]
    pub max_values_per_facet: u32,

    #[serde(default = "default_inner_hits_size")]
    pub inner_hits_size: u32,
}

impl Default for EndpointSettings {
    fn default() -> Self {
        EndpointSettings {
            indices: Vec::new(),
            hits_per_page: default_hits_per_page(),
            max_values_per_facet: default_max_values_per_facet(),
            inner_hits_size: default_inner_hits_size(),
        }
    }
}

impl EndpointSettings {
    pub fn new(indices: impl IntoIterator<Item = impl Into<String>>) -> Self {
        EndpointSettings {
            indices: indices.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    /// Read `FACETWISE_INDICES` (comma separated), `FACETWISE_HITS_PER_PAGE`,
    /// `FACETWISE_MAX_VALUES_PER_FACET` and `FACETWISE_INNER_HITS_SIZE`.
    /// Unset or unparseable values fall back to the defaults.
    pub fn from_env() -> Self {
        EndpointSettings {
            indices: env::var("FACETWISE_INDICES")
                .map(|s| {
                    s.split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
            hits_per_page: env::var("FACETWISE_HITS_PER_PAGE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or_else(default_hits_per_page),
            max_values_per_facet: env::var("FACETWISE_MAX_VALUES_PER_FACET")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or_else(default_max_values_per_facet),
            inner_hits_size: env::var("FACETWISE_INNER_HITS_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or_else(default_inner_hits_size),
        }
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| FacetError::Config(format!("cannot read {}: {e}", path.display())))?;
        let settings: EndpointSettings = serde_json::from_str(&content)?;
        Ok(settings)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)
            .map_err(|e| FacetError::Config(format!("cannot write {}: {e}", path.display())))?;
        Ok(())
    }

    pub fn limits(&self) -> BuildLimits {
        BuildLimits {
            size: self.hits_per_page,
            max_values_per_facet: self.max_values_per_facet,
            inner_hits_size: self.inner_hits_size,
        }
    }
}
