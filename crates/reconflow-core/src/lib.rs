//! reconflow core
//!
//! Waiting on long-running cloud operations and converging shared,
//! etag-guarded access policies.
//!
//! # Components
//!
//! - [`BackoffPolicy`]: pure delay curves (exponential for conflicts, fixed for polling)
//! - [`classify`]: maps a remote failure to an [`ErrorKind`]
//! - [`wait_for_operation`]: polls an operation handle to completion
//! - [`merge`]: additive union of bindings into a policy
//! - [`converge`]: read-merge-write with conflict/rate-limit retry
//!
//! # Example
//!
//! ```ignore
//! use reconflow_cloud::{Binding, ResourceRef};
//! use reconflow_core::{ConvergeConfig, TokioClock, converge};
//!
//! let report = converge(
//!     &store,
//!     &ResourceRef::new("project", "my-proj"),
//!     &[Binding::new("roles/viewer", ["user:a@example.com"])],
//!     &ConvergeConfig::default(),
//!     &TokioClock,
//! )
//! .await?;
//! println!("{} write(s), {} retries", report.writes, report.retries);
//! ```

pub mod backoff;
pub mod cancel;
pub mod classify;
pub mod clock;
pub mod error;
pub mod merge;
pub mod propagation;
pub mod reconcile;
pub mod waiter;

// Re-exports
pub use backoff::BackoffPolicy;
pub use cancel::{CancelHandle, CancelSignal, cancel_pair};
pub use classify::{ErrorKind, classify, is_service_account_missing};
pub use clock::{Clock, ManualClock, TokioClock};
pub use error::{ReconcileError, WaitError};
pub use merge::{is_satisfied, merge, merge_bindings, normalize_member};
pub use propagation::PropagationCheck;
pub use reconcile::{ConvergeConfig, ConvergeReport, RetryState, converge, read_policy_with_retry};
pub use waiter::{Completed, WaitConfig, complete, wait_for_operation, wait_for_operations};
