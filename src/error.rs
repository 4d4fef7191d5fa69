use thiserror::Error;

pub type Result<T> = std::result::Result<T, CatalogError>;

/// Failures surfaced by the catalog layer. Every variant names the resource
/// that was being fetched or looked up when it happened.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("not found: {resource}")]
    NotFound { resource: String },
    #[error("upstream failure for {resource}: {reason}")]
    UpstreamFailure {
        resource: String,
        status: Option<u16>,
        reason: String,
    },
    #[error("malformed response from {resource}: {detail}")]
    MalformedResponse { resource: String, detail: String },
}

impl CatalogError {
    pub fn not_found(resource: impl Into<String>) -> Self {
        CatalogError::NotFound {
            resource: resource.into(),
        }
    }

    pub fn malformed(resource: impl Into<String>, detail: impl ToString) -> Self {
        CatalogError::MalformedResponse {
            resource: resource.into(),
            detail: detail.to_string(),
        }
    }

    pub fn resource(&self) -> &str {
        match self {
            CatalogError::NotFound { resource }
            | CatalogError::UpstreamFailure { resource, .. }
            | CatalogError::MalformedResponse { resource, .. } => resource,
        }
    }
}
