//! Remote call error types

use thiserror::Error;

/// Errors returned by remote collaborators (policy store, operation client)
#[derive(Error, Debug)]
pub enum CloudError {
    /// The remote API answered with a non-success status
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    /// The request never produced a response (reset, timeout, DNS, ...)
    #[error("Network error: {0}")]
    Network(String),

    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CloudError {
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// HTTP status of the failure, if the remote answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            CloudError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, CloudError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_only_for_api_errors() {
        assert_eq!(CloudError::api(429, "slow down").status(), Some(429));
        assert_eq!(CloudError::Network("reset".into()).status(), None);
    }

    #[test]
    fn test_display() {
        let err = CloudError::api(412, "etag mismatch");
        assert_eq!(err.to_string(), "API error 412: etag mismatch");
    }
}
