//! Waiter and reconciliation error types

use crate::classify::ErrorKind;
use reconflow_cloud::{CloudError, OperationFailure, OperationHandle, OperationStatus, ResourceRef};
use std::time::Duration;
use thiserror::Error;

/// Why an operation wait ended without a result
#[derive(Error, Debug)]
pub enum WaitError {
    /// The operation finished with an error of its own (reported verbatim)
    #[error("Operation {operation} failed: {failure}")]
    Operation {
        operation: OperationHandle,
        failure: OperationFailure,
    },

    /// The wait budget ran out; the remote operation may still be running
    #[error("Timed out after {waited:?} waiting for operation {operation}")]
    Timeout {
        operation: OperationHandle,
        waited: Duration,
        last_status: Option<OperationStatus>,
    },

    #[error("Wait for operation {operation} cancelled after {polls} polls")]
    Cancelled { operation: OperationHandle, polls: u32 },

    /// Polling itself failed with a non-retryable error
    #[error("Polling operation {operation} failed ({kind})")]
    Poll {
        operation: OperationHandle,
        kind: ErrorKind,
        #[source]
        source: CloudError,
    },
}

impl WaitError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, WaitError::Timeout { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, WaitError::Cancelled { .. })
    }
}

/// Why a convergence did not complete
#[derive(Error, Debug)]
pub enum ReconcileError {
    /// Terminal or not-found error from the remote side, surfaced immediately
    #[error("Error applying policy to {resource} ({kind})")]
    Remote {
        resource: ResourceRef,
        kind: ErrorKind,
        #[source]
        source: CloudError,
    },

    /// Retries ran out (attempt count or elapsed time)
    #[error(
        "Gave up on {resource} after {attempts} attempts over {elapsed:?}; last error was {last_kind}"
    )]
    Exhausted {
        resource: ResourceRef,
        attempts: u32,
        elapsed: Duration,
        last_kind: ErrorKind,
        #[source]
        source: CloudError,
    },

    #[error("Reconciliation of {resource} cancelled after {attempts} retries")]
    Cancelled { resource: ResourceRef, attempts: u32 },

    /// The write succeeded but reads never showed it within the backoff ceiling
    #[error("Policy for {resource} did not show the change after waiting {waited:?}")]
    Propagation { resource: ResourceRef, waited: Duration },
}

impl ReconcileError {
    /// Classification of the underlying remote error, if there is one
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            ReconcileError::Remote { kind, .. } => Some(*kind),
            ReconcileError::Exhausted { last_kind, .. } => Some(*last_kind),
            ReconcileError::Cancelled { .. } | ReconcileError::Propagation { .. } => None,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self, ReconcileError::Exhausted { .. })
    }
}
