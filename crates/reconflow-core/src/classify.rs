//! Error classification
//!
//! Every retry decision in this crate goes through [`classify`]. Call sites
//! match on the returned [`ErrorKind`] instead of inspecting errors themselves.

use reconflow_cloud::CloudError;
use serde::{Deserialize, Serialize};

/// Retry category of a failed remote call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Too many requests; re-issue the same request after backing off
    RateLimited,
    /// Stale concurrency token; re-read before retrying
    Conflict,
    /// The target resource does not exist
    NotFound,
    /// Network failure or 5xx; retry the same request
    Transient,
    /// Retrying will not help
    Terminal,
}

impl ErrorKind {
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            ErrorKind::RateLimited | ErrorKind::Conflict | ErrorKind::Transient
        )
    }

    /// Whether the retry must start again from a fresh read
    pub fn requires_reread(self) -> bool {
        self == ErrorKind::Conflict
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::RateLimited => write!(f, "rate-limited"),
            ErrorKind::Conflict => write!(f, "conflict"),
            ErrorKind::NotFound => write!(f, "not-found"),
            ErrorKind::Transient => write!(f, "transient"),
            ErrorKind::Terminal => write!(f, "terminal"),
        }
    }
}

// Some APIs answer 409 while another operation holds the resource; that is
// not a stale token.
const OPERATION_IN_PROGRESS: &str = "operationInProgress";

// Some APIs report per-minute quota exhaustion as 403 instead of 429.
const QUOTA_EXCEEDED: &str = "Quota exceeded for quota metric";
const PER_MINUTE: &str = "per minute";

// A write naming a service account that was deleted out of band.
const SERVICE_ACCOUNT: &str = "Service account";
const DOES_NOT_EXIST: &str = "does not exist";

/// Whether a rejected write names a service account that no longer exists
///
/// Classified [`ErrorKind::Terminal`]; the reconciliation loop still retries
/// it when the policy has moved on since the rejected write was built.
pub fn is_service_account_missing(error: &CloudError) -> bool {
    matches!(
        error,
        CloudError::Api { status: 400, message }
            if message.contains(SERVICE_ACCOUNT) && message.contains(DOES_NOT_EXIST)
    )
}

pub fn classify(error: &CloudError) -> ErrorKind {
    match error {
        CloudError::Api { status, message } => classify_status(*status, message),
        CloudError::Network(_) => ErrorKind::Transient,
        CloudError::ResourceNotFound(_) => ErrorKind::NotFound,
        CloudError::Io(e) => classify_io(e.kind()),
        CloudError::InvalidConfig(_) | CloudError::Json(_) => ErrorKind::Terminal,
    }
}

fn classify_status(status: u16, message: &str) -> ErrorKind {
    match status {
        429 => ErrorKind::RateLimited,
        403 if message.contains(QUOTA_EXCEEDED) && message.contains(PER_MINUTE) => {
            ErrorKind::RateLimited
        }
        409 if message.contains(OPERATION_IN_PROGRESS) => ErrorKind::Transient,
        409 | 412 => ErrorKind::Conflict,
        404 => ErrorKind::NotFound,
        500 | 502 | 503 | 504 => ErrorKind::Transient,
        _ => ErrorKind::Terminal,
    }
}

fn classify_io(kind: std::io::ErrorKind) -> ErrorKind {
    use std::io::ErrorKind as Io;
    match kind {
        Io::ConnectionReset
        | Io::ConnectionAborted
        | Io::TimedOut
        | Io::UnexpectedEof
        | Io::Interrupted => ErrorKind::Transient,
        _ => ErrorKind::Terminal,
    }
}
