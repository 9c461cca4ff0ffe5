//! Read-merge-write reconciliation of a shared policy
//!
//! [`converge`] makes a remote policy include a set of bindings while other
//! writers may be changing the same policy. There is no local lock: the
//! policy's etag and the server's stale-token rejection are what keep
//! concurrent writers from clobbering each other. On a conflict the loop
//! starts over from a fresh read; on rate limiting or transient failures it
//! re-submits the same candidate.

use crate::backoff::BackoffPolicy;
use crate::cancel::{self, CancelSignal};
use crate::classify::{ErrorKind, classify, is_service_account_missing};
use crate::clock::Clock;
use crate::error::ReconcileError;
use crate::merge::merge;
use crate::propagation::{self, PropagationCheck};
use reconflow_cloud::{Binding, CloudError, Policy, PolicyStore, ResourceRef};
use reconflow_config::Settings;
use std::future::Future;
use std::time::{Duration, Instant};

/// Per-invocation reconciliation settings
#[derive(Debug, Clone)]
pub struct ConvergeConfig {
    /// Delay curve between retries
    pub backoff: BackoffPolicy,

    /// Retries allowed before giving up
    pub max_attempts: u32,

    /// Wall-clock budget for the whole convergence
    pub max_elapsed: Duration,

    /// Sleep after a successful write, for callers that need the write to be
    /// visible elsewhere before continuing
    pub settle_delay: Duration,

    /// Re-read after the write until the change is observed
    pub verify: Option<PropagationCheck>,

    /// Optional caller cancellation
    pub cancel: Option<CancelSignal>,
}

impl Default for ConvergeConfig {
    fn default() -> Self {
        Self {
            backoff: BackoffPolicy::conflict(),
            max_attempts: 10,
            max_elapsed: Duration::from_secs(10 * 60),
            settle_delay: Duration::ZERO,
            verify: None,
            cancel: None,
        }
    }
}

impl ConvergeConfig {
    pub fn with_cancel(mut self, cancel: CancelSignal) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn with_verify(mut self, check: PropagationCheck) -> Self {
        self.verify = Some(check);
        self
    }

    pub fn from_settings(settings: &Settings) -> Self {
        let backoff = BackoffPolicy::from_settings(&settings.conflict_backoff);
        let converge = &settings.converge;
        let verify = (converge.verify_confirmations > 0).then(|| PropagationCheck {
            confirmations: converge.verify_confirmations,
            backoff: backoff.clone(),
        });

        Self {
            backoff,
            max_attempts: converge.max_attempts,
            max_elapsed: Duration::from_millis(converge.max_elapsed_ms),
            settle_delay: Duration::from_millis(converge.settle_delay_ms),
            verify,
            cancel: None,
        }
    }
}

/// What a successful convergence did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConvergeReport {
    /// Backoffs taken (conflicts, rate limits, transient failures)
    pub retries: u32,

    /// Policy reads issued
    pub reads: u32,

    /// Policy writes issued
    pub writes: u32,

    /// Whether a write was needed
    pub changed: bool,
}

/// Retry bookkeeping for one convergence
#[derive(Debug, Clone)]
pub struct RetryState {
    pub attempts: u32,
    pub started: Instant,
    pub last_kind: Option<ErrorKind>,
}

impl RetryState {
    pub fn new(started: Instant) -> Self {
        Self {
            attempts: 0,
            started,
            last_kind: None,
        }
    }
}

/// Converge the policy of `resource` to include `desired`
///
/// A policy that already grants every desired member is left alone: no
/// write is issued.
pub async fn converge(
    store: &dyn PolicyStore,
    resource: &ResourceRef,
    desired: &[Binding],
    config: &ConvergeConfig,
    clock: &dyn Clock,
) -> Result<ConvergeReport, ReconcileError> {
    let mut retrier = Retrier::new(resource, config, clock);
    let mut report = ConvergeReport::default();

    'read: loop {
        let current = retrier.read(store, &mut report).await?;
        let (candidate, changed) = merge(&current, desired);
        if !changed {
            tracing::debug!(%resource, reads = report.reads, "Policy already has desired bindings");
            report.retries = retrier.state.attempts;
            return Ok(report);
        }

        loop {
            retrier.check_cancelled()?;
            tracing::debug!(%resource, etag = %candidate.etag, "Setting policy");
            report.writes += 1;

            let err = match retrier.call(store.set_policy(resource, &candidate)).await? {
                Ok(()) => break 'read,
                Err(e) => e,
            };

            let kind = classify(&err);
            match kind {
                ErrorKind::Conflict => {
                    tracing::debug!(%resource, error = %err, "Concurrent policy change, restarting read-modify-write");
                    retrier.back_off(kind, err).await?;
                    continue 'read;
                }
                ErrorKind::RateLimited | ErrorKind::Transient => {
                    retrier.back_off(kind, err).await?;
                }
                ErrorKind::Terminal if is_service_account_missing(&err) => {
                    // Retry only if someone changed the policy since our read.
                    match retrier.read(store, &mut report).await {
                        Ok(fresh) if fresh.etag != candidate.etag => {
                            tracing::debug!(%resource, error = %err, "Policy changed after missing service account, retrying");
                            retrier.back_off(kind, err).await?;
                            continue 'read;
                        }
                        Err(cancelled @ ReconcileError::Cancelled { .. }) => return Err(cancelled),
                        _ => return Err(retrier.remote(kind, err)),
                    }
                }
                ErrorKind::NotFound | ErrorKind::Terminal => {
                    return Err(retrier.remote(kind, err));
                }
            }
        }
    }

    report.changed = true;

    if !config.settle_delay.is_zero() {
        tracing::debug!(%resource, delay = ?config.settle_delay, "Waiting for policy write to settle");
        retrier.sleep(config.settle_delay).await?;
    }

    if let Some(check) = &config.verify {
        propagation::verify(&retrier, store, desired, check, &mut report).await?;
    }

    report.retries = retrier.state.attempts;
    tracing::info!(
        %resource,
        writes = report.writes,
        retries = report.retries,
        "Set policy"
    );
    Ok(report)
}

/// Read a policy, retrying rate-limited and transient failures
pub async fn read_policy_with_retry(
    store: &dyn PolicyStore,
    resource: &ResourceRef,
    config: &ConvergeConfig,
    clock: &dyn Clock,
) -> Result<Policy, ReconcileError> {
    let mut retrier = Retrier::new(resource, config, clock);
    let mut report = ConvergeReport::default();
    retrier.read(store, &mut report).await
}

/// Shared retry/cancel plumbing for one invocation
pub(crate) struct Retrier<'a> {
    pub(crate) resource: &'a ResourceRef,
    pub(crate) config: &'a ConvergeConfig,
    pub(crate) clock: &'a dyn Clock,
    pub(crate) state: RetryState,
}

impl<'a> Retrier<'a> {
    fn new(resource: &'a ResourceRef, config: &'a ConvergeConfig, clock: &'a dyn Clock) -> Self {
        Self {
            resource,
            config,
            clock,
            state: RetryState::new(clock.now()),
        }
    }

    async fn read(
        &mut self,
        store: &dyn PolicyStore,
        report: &mut ConvergeReport,
    ) -> Result<Policy, ReconcileError> {
        loop {
            self.check_cancelled()?;
            tracing::debug!(resource = %self.resource, "Retrieving policy");
            report.reads += 1;

            match self.call(store.get_policy(self.resource)).await? {
                Ok(policy) => return Ok(policy),
                Err(e) => {
                    let kind = classify(&e);
                    if !kind.is_retryable() {
                        return Err(self.remote(kind, e));
                    }
                    self.back_off(kind, e).await?;
                }
            }
        }
    }

    /// Count a failed attempt and sleep before the next one
    async fn back_off(&mut self, kind: ErrorKind, error: CloudError) -> Result<(), ReconcileError> {
        self.state.attempts += 1;
        self.state.last_kind = Some(kind);

        let elapsed = self.clock.elapsed_since(self.state.started);
        if self.state.attempts > self.config.max_attempts || elapsed >= self.config.max_elapsed {
            tracing::warn!(
                resource = %self.resource,
                attempts = self.state.attempts,
                ?elapsed,
                %kind,
                error = %error,
                "Giving up on policy"
            );
            return Err(ReconcileError::Exhausted {
                resource: self.resource.clone(),
                attempts: self.state.attempts,
                elapsed,
                last_kind: kind,
                source: error,
            });
        }

        let delay = self
            .config
            .backoff
            .next_delay(self.state.attempts)
            .min(self.config.max_elapsed.saturating_sub(elapsed));
        tracing::debug!(
            resource = %self.resource,
            attempt = self.state.attempts,
            %kind,
            delay_ms = delay.as_millis() as u64,
            "Retrying after backoff"
        );
        self.sleep(delay).await
    }

    /// Time left of `max_elapsed`, zero once it is spent
    pub(crate) fn remaining_budget(&self) -> Duration {
        let elapsed = self.clock.elapsed_since(self.state.started);
        self.config.max_elapsed.saturating_sub(elapsed)
    }

    pub(crate) async fn sleep(&self, delay: Duration) -> Result<(), ReconcileError> {
        self.call(self.clock.sleep(delay)).await
    }

    /// Drive a remote call or sleep, unless the caller cancels first
    pub(crate) async fn call<F: Future>(&self, fut: F) -> Result<F::Output, ReconcileError> {
        cancel::race(self.config.cancel.as_ref(), fut)
            .await
            .ok_or_else(|| self.cancelled())
    }

    pub(crate) fn check_cancelled(&self) -> Result<(), ReconcileError> {
        if cancel::is_cancelled(self.config.cancel.as_ref()) {
            return Err(self.cancelled());
        }
        Ok(())
    }

    pub(crate) fn remote(&self, kind: ErrorKind, source: CloudError) -> ReconcileError {
        tracing::debug!(resource = %self.resource, %kind, error = %source, "Not retrying policy error");
        ReconcileError::Remote {
            resource: self.resource.clone(),
            kind,
            source,
        }
    }

    fn cancelled(&self) -> ReconcileError {
        ReconcileError::Cancelled {
            resource: self.resource.clone(),
            attempts: self.state.attempts,
        }
    }
}
