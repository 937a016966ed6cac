use http::StatusCode;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum FacetError {
    #[error("Duplicate aggregation name: {name}")]
    DuplicateAggregation { name: String },

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Backend returned {status}: {message}")]
    Backend { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Backend call timed out after {0:?}")]
    Timeout(Duration),

    #[error("Request cancelled")]
    Cancelled,

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("JSON error: {0}")]
    Json(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, FacetError>;

impl From<serde_json::Error> for FacetError {
    fn from(e: serde_json::Error) -> Self {
        FacetError::Json(e.to_string())
    }
}

impl FacetError {
    /// Status an embedding HTTP service should answer with for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            FacetError::DuplicateAggregation { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            FacetError::InvalidQuery(_) => StatusCode::BAD_REQUEST,
            FacetError::Backend { status, .. } => {
                if (400..500).contains(status) {
                    StatusCode::BAD_REQUEST
                } else {
                    StatusCode::BAD_GATEWAY
                }
            }
            FacetError::Http(_) => StatusCode::BAD_GATEWAY,
            FacetError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            FacetError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
            FacetError::Decode(_) => StatusCode::BAD_GATEWAY,
            FacetError::Json(_) => StatusCode::BAD_GATEWAY,
            FacetError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// True for errors raised while registering features, before any request runs.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            FacetError::DuplicateAggregation { .. } | FacetError::Config(_)
        )
    }
}
