//! reconflow cloud seam
//!
//! Data model and collaborator traits shared by the reconciliation core and
//! the transport crates that talk to a concrete cloud API.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                 reconflow-core                   │
//! │   waiter · merge · reconcile · classify         │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │                reconflow-cloud                   │
//! │  ┌──────────────────────────────────────────┐   │
//! │  │  trait OperationClient / PolicyStore      │   │
//! │  └──────────────────────────────────────────┘   │
//! │  ┌──────────────┐  ┌──────────────┐            │
//! │  │  Operation   │  │    Policy    │            │
//! │  └──────────────┘  └──────────────┘            │
//! └───────┬─────────────────┬───────────────────────┘
//!         │                 │
//! ┌───────▼───────┐ ┌───────▼───────┐
//! │   transport   │ │   transport   │
//! │   (vendor A)  │ │   (vendor B)  │
//! └───────────────┘ └───────────────┘
//! ```

pub mod error;
pub mod operation;
pub mod policy;
pub mod provider;

// Re-exports
pub use error::{CloudError, Result};
pub use operation::{MutationOutcome, Operation, OperationFailure, OperationHandle, OperationStatus};
pub use policy::{Binding, BindingKey, Condition, Policy, normalize_member};
pub use provider::{OperationClient, PolicyStore, ResourceRef};
