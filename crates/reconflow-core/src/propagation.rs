//! Post-write propagation check
//!
//! A successful policy write is not always visible to the next read. When a
//! [`PropagationCheck`] is configured, [`converge`](crate::converge) keeps
//! reading until enough reads show the desired bindings. Reads that do not
//! (or that are rate limited) grow the delay. The check gives up once the
//! delay would pass the backoff ceiling or the convergence's `max_elapsed`
//! budget is spent.

use crate::backoff::BackoffPolicy;
use crate::classify::{ErrorKind, classify};
use crate::error::ReconcileError;
use crate::merge::is_satisfied;
use crate::reconcile::{ConvergeReport, Retrier};
use reconflow_cloud::{Binding, PolicyStore};

#[derive(Debug, Clone, PartialEq)]
pub struct PropagationCheck {
    /// Reads that must show the desired bindings
    pub confirmations: u32,

    /// Delay before each verification read
    pub backoff: BackoffPolicy,
}

impl Default for PropagationCheck {
    fn default() -> Self {
        Self {
            confirmations: 3,
            backoff: BackoffPolicy::conflict(),
        }
    }
}

pub(crate) async fn verify(
    retrier: &Retrier<'_>,
    store: &dyn PolicyStore,
    desired: &[Binding],
    check: &PropagationCheck,
    report: &mut ConvergeReport,
) -> Result<(), ReconcileError> {
    let resource = retrier.resource;
    let started = retrier.clock.now();
    let mut step: u32 = 1;
    let mut confirmed: u32 = 0;

    while confirmed < check.confirmations {
        // A fixed curve never passes its ceiling; the converge budget still applies.
        let remaining = retrier.remaining_budget();
        if check.backoff.exceeds_ceiling(step) || remaining.is_zero() {
            let waited = retrier.clock.elapsed_since(started);
            tracing::warn!(%resource, ?waited, confirmed, "Waited too long for policy propagation");
            return Err(ReconcileError::Propagation {
                resource: resource.clone(),
                waited,
            });
        }

        retrier.sleep(check.backoff.next_delay(step).min(remaining)).await?;
        retrier.check_cancelled()?;
        report.reads += 1;

        match retrier.call(store.get_policy(resource)).await? {
            Ok(policy) if is_satisfied(&policy, desired) => {
                confirmed += 1;
            }
            Ok(_) => {
                tracing::debug!(%resource, step, "Policy does not show the write yet");
                step += 1;
            }
            Err(e) => match classify(&e) {
                ErrorKind::RateLimited | ErrorKind::Transient => {
                    tracing::debug!(%resource, error = %e, "Verification read failed, backing off");
                    step += 1;
                }
                kind => return Err(retrier.remote(kind, e)),
            },
        }
    }

    tracing::debug!(%resource, confirmed, "Policy change observed");
    Ok(())
}
