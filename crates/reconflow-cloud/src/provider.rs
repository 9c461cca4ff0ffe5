//! Remote collaborator traits
//!
//! The reconciliation core never talks HTTP itself. Transport crates implement
//! these traits; the core only issues reads, writes and polls through them.

use crate::error::Result;
use crate::operation::{Operation, OperationHandle};
use crate::policy::Policy;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Polls long-running operations
#[async_trait]
pub trait OperationClient: Send + Sync {
    /// Fetch the current status of an operation. Safe to call repeatedly.
    async fn poll_operation(&self, handle: &OperationHandle) -> Result<Operation>;
}

/// Read-modify-write primitives for an access-control policy
///
/// `set_policy` must fail with a 409/412 [`CloudError::Api`](crate::CloudError)
/// when `policy.etag` no longer matches the server's version.
#[async_trait]
pub trait PolicyStore: Send + Sync {
    /// Fetch the current policy (including its concurrency token)
    async fn get_policy(&self, resource: &ResourceRef) -> Result<Policy>;

    /// Replace the policy, guarded by `policy.etag`
    async fn set_policy(&self, resource: &ResourceRef, policy: &Policy) -> Result<()>;
}

/// Identifies the remote object whose policy is reconciled
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceRef {
    /// Resource type (e.g., "project", "bucket", "service-account")
    pub resource_type: String,

    /// Resource identifier
    pub id: String,
}

impl ResourceRef {
    pub fn new(resource_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            id: id.into(),
        }
    }

    /// Get the full resource key (type:id)
    pub fn key(&self) -> String {
        format!("{}:{}", self.resource_type, self.id)
    }
}

impl std::fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {:?}", self.resource_type, self.id)
    }
}
