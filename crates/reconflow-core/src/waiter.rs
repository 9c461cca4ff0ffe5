//! Long-running operation waiter（オペレーション完了待機）
//!
//! Turns an [`OperationHandle`] into a synchronous completion by polling it
//! on a fixed interval until it is done, the wait budget is spent, or the
//! caller cancels.

use crate::backoff::BackoffPolicy;
use crate::cancel::{self, CancelSignal};
use crate::classify::{ErrorKind, classify};
use crate::clock::Clock;
use crate::error::WaitError;
use reconflow_cloud::{MutationOutcome, OperationClient, OperationHandle, OperationStatus};
use reconflow_config::PollSettings;
use std::time::Duration;

/// Per-invocation wait settings
#[derive(Debug, Clone)]
pub struct WaitConfig {
    /// Delay between polls (normally a fixed interval)
    pub poll: BackoffPolicy,

    /// Upper bound on the whole wait
    pub max_wait: Duration,

    /// Optional caller cancellation
    pub cancel: Option<CancelSignal>,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            poll: BackoffPolicy::polling(),
            max_wait: Duration::from_secs(20 * 60),
            cancel: None,
        }
    }
}

impl WaitConfig {
    pub fn new(poll_interval: Duration, max_wait: Duration) -> Self {
        Self {
            poll: BackoffPolicy::fixed(poll_interval),
            max_wait,
            cancel: None,
        }
    }

    pub fn with_cancel(mut self, cancel: CancelSignal) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn from_settings(settings: &PollSettings) -> Self {
        Self::new(
            Duration::from_millis(settings.interval_ms),
            Duration::from_millis(settings.max_wait_ms),
        )
    }
}

/// A successfully finished operation
#[derive(Debug, Clone)]
pub struct Completed {
    pub operation: OperationHandle,

    /// Number of status reads performed
    pub polls: u32,

    /// Result payload (`Null` if the operation carried none)
    pub payload: serde_json::Value,
}

/// オペレーションの完了を待機
///
/// Polls `handle` until it finishes.
///
/// # Returns
/// * `Ok(Completed)` - the operation finished without error
/// * `Err(WaitError::Operation)` - the operation finished with its own error
/// * `Err(WaitError::Timeout)` - `config.max_wait` elapsed first
/// * `Err(WaitError::Cancelled)` - the caller cancelled; no poll is issued after that
/// * `Err(WaitError::Poll)` - a poll failed with a non-retryable error
pub async fn wait_for_operation(
    client: &dyn OperationClient,
    handle: &OperationHandle,
    config: &WaitConfig,
    clock: &dyn Clock,
) -> Result<Completed, WaitError> {
    let signal = config.cancel.as_ref();
    let started = clock.now();
    let mut polls: u32 = 0;
    let mut last_status: Option<OperationStatus> = None;

    loop {
        if cancel::is_cancelled(signal) {
            return Err(cancelled(handle, polls));
        }

        polls += 1;
        let Some(polled) = cancel::race(signal, client.poll_operation(handle)).await else {
            return Err(cancelled(handle, polls));
        };

        match polled {
            Ok(operation) if operation.is_done() => {
                return match operation.error {
                    Some(failure) => {
                        tracing::debug!(operation = %handle, polls, %failure, "Operation failed");
                        Err(WaitError::Operation {
                            operation: handle.clone(),
                            failure,
                        })
                    }
                    None => {
                        tracing::debug!(operation = %handle, polls, "Operation done");
                        Ok(Completed {
                            operation: handle.clone(),
                            polls,
                            payload: operation.result.unwrap_or(serde_json::Value::Null),
                        })
                    }
                };
            }
            Ok(operation) => {
                if last_status != Some(operation.status) {
                    tracing::debug!(operation = %handle, status = %operation.status, "Operation not done");
                }
                last_status = Some(operation.status);
            }
            Err(e) => {
                let kind = classify(&e);
                if !matches!(kind, ErrorKind::RateLimited | ErrorKind::Transient) {
                    return Err(WaitError::Poll {
                        operation: handle.clone(),
                        kind,
                        source: e,
                    });
                }
                tracing::debug!(operation = %handle, %kind, error = %e, "Poll failed, will poll again");
            }
        }

        let waited = clock.elapsed_since(started);
        if waited >= config.max_wait {
            tracing::warn!(operation = %handle, ?waited, polls, "Gave up waiting for operation");
            return Err(WaitError::Timeout {
                operation: handle.clone(),
                waited,
                last_status,
            });
        }

        let delay = config
            .poll
            .next_delay(polls)
            .min(config.max_wait.saturating_sub(waited));
        if cancel::race(signal, clock.sleep(delay)).await.is_none() {
            return Err(cancelled(handle, polls));
        }
    }
}

/// Wait for several operations one after another with the same settings
pub async fn wait_for_operations(
    client: &dyn OperationClient,
    handles: &[OperationHandle],
    config: &WaitConfig,
    clock: &dyn Clock,
) -> Result<Vec<Completed>, WaitError> {
    let mut completed = Vec::with_capacity(handles.len());
    for handle in handles {
        completed.push(wait_for_operation(client, handle, config, clock).await?);
    }
    Ok(completed)
}

/// Resolve the outcome of a mutating call to its terminal payload
///
/// Synchronous results are returned as-is; operation handles are waited on.
pub async fn complete(
    outcome: MutationOutcome,
    client: &dyn OperationClient,
    config: &WaitConfig,
    clock: &dyn Clock,
) -> Result<serde_json::Value, WaitError> {
    match outcome {
        MutationOutcome::Done(payload) => Ok(payload),
        MutationOutcome::Pending(handle) => {
            let done = wait_for_operation(client, &handle, config, clock).await?;
            Ok(done.payload)
        }
    }
}

fn cancelled(handle: &OperationHandle, polls: u32) -> WaitError {
    tracing::debug!(operation = %handle, polls, "Wait cancelled");
    WaitError::Cancelled {
        operation: handle.clone(),
        polls,
    }
}
