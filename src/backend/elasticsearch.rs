use std::collections::HashMap;
use std::env;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use super::RawResponse;
use crate::error::{FacetError, Result};
use crate::query::QueryDescription;

/// Connection settings for an Elasticsearch (or OpenSearch) cluster.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(default)]
pub struct ElasticsearchConfig {
    pub url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub timeout_ms: Option<u64>,
    pub headers: Option<HashMap<String, String>>,
}

impl ElasticsearchConfig {
    pub fn new(url: impl Into<String>) -> Self {
        ElasticsearchConfig {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Read `FACETWISE_ES_URL` (required), `FACETWISE_ES_USERNAME`,
    /// `FACETWISE_ES_PASSWORD` and `FACETWISE_ES_TIMEOUT_MS`.
    pub fn from_env() -> Result<Self> {
        let url = env::var("FACETWISE_ES_URL")
            .map_err(|_| FacetError::Config("FACETWISE_ES_URL is not set".into()))?;
        let config = ElasticsearchConfig {
            url,
            username: env::var("FACETWISE_ES_USERNAME").ok(),
            password: env::var("FACETWISE_ES_PASSWORD").ok(),
            timeout_ms: env::var("FACETWISE_ES_TIMEOUT_MS")
                .ok()
                .and_then(|s| s.parse().ok()),
            headers: None,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let parsed = url::Url::parse(&self.url)
            .map_err(|e| FacetError::Config(format!("invalid elasticsearch url '{}': {e}", self.url)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(FacetError::Config(format!(
                "elasticsearch url must be http or https, got '{}'",
                parsed.scheme()
            )));
        }
        if self.password.is_some() && self.username.is_none() {
            return Err(FacetError::Config(
                "elasticsearch `password` requires `username`".into(),
            ));
        }
        Ok(())
    }
}

/// Sends rendered query descriptions to `POST {url}/{indices}/_search`.
#[derive(Debug, Clone)]
pub struct ElasticsearchBackend {
    client: reqwest::Client,
    base_url: String,
    username: Option<String>,
    password: Option<String>,
}

impl ElasticsearchBackend {
    pub fn new(config: &ElasticsearchConfig) -> Result<Self> {
        config.validate()?;
        let mut client_builder = reqwest::Client::builder();

        let mut header_map = reqwest::header::HeaderMap::new();
        for (k, v) in config.headers.iter().flatten() {
            let name = reqwest::header::HeaderName::from_bytes(k.as_bytes())
                .map_err(|e| FacetError::Config(format!("invalid header name: {e}")))?;
            let val = reqwest::header::HeaderValue::from_str(v)
                .map_err(|e| FacetError::Config(format!("invalid header value: {e}")))?;
            header_map.insert(name, val);
        }
        client_builder = client_builder.default_headers(header_map);

        if let Some(ms) = config.timeout_ms {
            client_builder = client_builder.timeout(Duration::from_millis(ms));
        }

        let client = client_builder
            .build()
            .map_err(|e| FacetError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(ElasticsearchBackend {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            username: config.username.clone(),
            password: config.password.clone(),
        })
    }

    fn search_url(&self, indices: &[String]) -> String {
        if indices.is_empty() {
            format!("{}/_search", self.base_url)
        } else {
            format!("{}/{}/_search", self.base_url, indices.join(","))
        }
    }

    pub async fn search(
        &self,
        indices: &[String],
        query: &QueryDescription,
    ) -> Result<RawResponse> {
        let body = query.to_json()?;
        let url = self.search_url(indices);
        let start = Instant::now();

        let mut req = self.client.post(&url).json(&body);
        if let Some(user) = &self.username {
            req = req.basic_auth(user, self.password.as_ref());
        }
        let resp = req
            .send()
            .await
            .map_err(|e| FacetError::Http(format!("HTTP request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let body_text = resp
                .text()
                .await
                .unwrap_or_else(|_| "failed to read response body".into());
            tracing::debug!("[ES] {} returned {} after {:?}", url, status, start.elapsed());
            return Err(FacetError::Backend {
                status: status.as_u16(),
                message: body_text,
            });
        }

        let raw = resp
            .json::<RawResponse>()
            .await
            .map_err(|e| FacetError::Decode(format!("failed to parse search response: {e}")))?;
        tracing::debug!(
            "[ES] {} total={} took={}ms elapsed={:?}",
            url,
            raw.hits.total.value(),
            raw.took,
            start.elapsed()
        );
        Ok(raw)
    }
}
