// Each test binary uses a different subset of these helpers.
#![allow(dead_code)]

use async_trait::async_trait;
use reconflow_cloud::{
    Binding, CloudError, Operation, OperationClient, OperationHandle, Policy, PolicyStore,
    ResourceRef, Result,
};
use reconflow_core::merge_bindings;
use std::collections::VecDeque;
use std::future::pending;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

/// Versioned in-memory policy store
///
/// Every accepted write bumps the etag; writes carrying an older etag are
/// rejected with 409 like a real server would.
pub struct MemoryPolicyStore {
    inner: Mutex<Inner>,
    reads: AtomicU32,
    writes: AtomicU32,
}

struct Inner {
    policy: Policy,
    version: u64,
    read_faults: VecDeque<CloudError>,
    write_faults: VecDeque<CloudError>,
    /// Read faults armed by the next accepted write
    post_write_read_faults: VecDeque<CloudError>,
    /// Bindings another writer lands right before our next write
    interloper: Option<Binding>,
    /// Reads after a write that still return the previous policy
    read_lag: u32,
    lag_remaining: u32,
    previous: Option<Policy>,
}

impl MemoryPolicyStore {
    pub fn new(mut policy: Policy) -> Self {
        policy.etag = etag(1);
        Self {
            inner: Mutex::new(Inner {
                policy,
                version: 1,
                read_faults: VecDeque::new(),
                write_faults: VecDeque::new(),
                post_write_read_faults: VecDeque::new(),
                interloper: None,
                read_lag: 0,
                lag_remaining: 0,
                previous: None,
            }),
            reads: AtomicU32::new(0),
            writes: AtomicU32::new(0),
        }
    }

    pub fn empty() -> Self {
        Self::new(Policy::default())
    }

    pub fn fail_next_read(&self, error: CloudError) {
        self.inner.lock().unwrap().read_faults.push_back(error);
    }

    pub fn fail_next_write(&self, error: CloudError) {
        self.inner.lock().unwrap().write_faults.push_back(error);
    }

    /// Fail the first read issued after the next accepted write
    pub fn fail_read_after_write(&self, error: CloudError) {
        self.inner.lock().unwrap().post_write_read_faults.push_back(error);
    }

    /// Simulate another process writing `binding` just before our next write
    pub fn interleave_write(&self, binding: Binding) {
        self.inner.lock().unwrap().interloper = Some(binding);
    }

    /// After each write, the next `reads` reads still see the old policy
    pub fn lag_reads(&self, reads: u32) {
        self.inner.lock().unwrap().read_lag = reads;
    }

    pub fn snapshot(&self) -> Policy {
        self.inner.lock().unwrap().policy.clone()
    }

    pub fn reads(&self) -> u32 {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> u32 {
        self.writes.load(Ordering::SeqCst)
    }
}

impl Inner {
    fn commit(&mut self, mut policy: Policy) {
        self.previous = Some(self.policy.clone());
        self.lag_remaining = self.read_lag;
        self.version += 1;
        policy.etag = etag(self.version);
        self.policy = policy;
    }
}

fn etag(version: u64) -> String {
    format!("v{version}")
}

#[async_trait]
impl PolicyStore for MemoryPolicyStore {
    async fn get_policy(&self, _resource: &ResourceRef) -> Result<Policy> {
        // Let concurrent callers interleave between read and write.
        tokio::task::yield_now().await;
        self.reads.fetch_add(1, Ordering::SeqCst);

        let mut inner = self.inner.lock().unwrap();
        if let Some(e) = inner.read_faults.pop_front() {
            return Err(e);
        }
        if inner.lag_remaining > 0 {
            inner.lag_remaining -= 1;
            if let Some(previous) = &inner.previous {
                return Ok(previous.clone());
            }
        }
        Ok(inner.policy.clone())
    }

    async fn set_policy(&self, _resource: &ResourceRef, policy: &Policy) -> Result<()> {
        tokio::task::yield_now().await;
        self.writes.fetch_add(1, Ordering::SeqCst);

        let mut inner = self.inner.lock().unwrap();
        // The other writer lands first, even when our write is then rejected.
        if let Some(binding) = inner.interloper.take() {
            let mut theirs = inner.policy.clone();
            theirs.bindings.push(binding);
            theirs.bindings = merge_bindings(&theirs.bindings);
            inner.commit(theirs);
        }
        if let Some(e) = inner.write_faults.pop_front() {
            return Err(e);
        }
        if policy.etag != inner.policy.etag {
            return Err(CloudError::api(
                409,
                format!(
                    "etag mismatch: submitted {}, current {}",
                    policy.etag, inner.policy.etag
                ),
            ));
        }
        inner.commit(policy.clone());
        let armed = std::mem::take(&mut inner.post_write_read_faults);
        inner.read_faults.extend(armed);
        Ok(())
    }
}

/// Operation client that reports `Running` until told otherwise
pub struct ManualOperation {
    polls: AtomicU32,
    done: Mutex<Option<Operation>>,
}

impl ManualOperation {
    pub fn new() -> Self {
        Self {
            polls: AtomicU32::new(0),
            done: Mutex::new(None),
        }
    }

    pub fn finish(&self, operation: Operation) {
        *self.done.lock().unwrap() = Some(operation);
    }

    pub fn polls(&self) -> u32 {
        self.polls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OperationClient for ManualOperation {
    async fn poll_operation(&self, handle: &OperationHandle) -> Result<Operation> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        match self.done.lock().unwrap().clone() {
            Some(op) => Ok(op),
            None => Ok(Operation::running(handle.id.clone())),
        }
    }
}

/// Operation client whose polls never return
pub struct HangingOperation {
    pub polls: AtomicU32,
}

#[async_trait]
impl OperationClient for HangingOperation {
    async fn poll_operation(&self, _handle: &OperationHandle) -> Result<Operation> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        pending().await
    }
}
