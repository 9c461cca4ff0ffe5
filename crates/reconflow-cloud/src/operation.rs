//! Long-running operation types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque reference to an in-progress remote action
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OperationHandle {
    /// Operation name/identifier as issued by the remote API
    pub id: String,
}

impl OperationHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

impl std::fmt::Display for OperationHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.id)
    }
}

/// Status reported by a poll
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationStatus {
    /// Accepted but not started
    Pending,
    /// In progress
    Running,
    /// Finished, either with a result or with an error
    Done,
}

impl std::fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OperationStatus::Pending => write!(f, "pending"),
            OperationStatus::Running => write!(f, "running"),
            OperationStatus::Done => write!(f, "done"),
        }
    }
}

/// Error embedded in a finished operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationFailure {
    /// Error kind/code as reported by the remote side
    pub kind: String,

    /// Human readable message
    pub message: String,
}

impl OperationFailure {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for OperationFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Snapshot of a remote operation as returned by one poll
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Operation {
    pub id: String,

    pub status: OperationStatus,

    /// Result payload, present once done without error
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,

    /// Error, present once done with error
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<OperationFailure>,

    /// When the remote side accepted the operation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Operation {
    pub fn pending(id: impl Into<String>) -> Self {
        Self::with_status(id, OperationStatus::Pending)
    }

    pub fn running(id: impl Into<String>) -> Self {
        Self::with_status(id, OperationStatus::Running)
    }

    pub fn succeeded(id: impl Into<String>, result: serde_json::Value) -> Self {
        Self {
            result: Some(result),
            ..Self::with_status(id, OperationStatus::Done)
        }
    }

    pub fn failed(id: impl Into<String>, error: OperationFailure) -> Self {
        Self {
            error: Some(error),
            ..Self::with_status(id, OperationStatus::Done)
        }
    }

    fn with_status(id: impl Into<String>, status: OperationStatus) -> Self {
        Self {
            id: id.into(),
            status,
            result: None,
            error: None,
            created_at: None,
        }
    }

    pub fn is_done(&self) -> bool {
        self.status == OperationStatus::Done
    }

    pub fn handle(&self) -> OperationHandle {
        OperationHandle::new(self.id.clone())
    }
}

/// What a mutating call handed back
#[derive(Debug, Clone)]
pub enum MutationOutcome {
    /// The call completed synchronously with this payload
    Done(serde_json::Value),
    /// The call started a long-running operation
    Pending(OperationHandle),
}
