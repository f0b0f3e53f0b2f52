//! Admission gate and scoped job permits.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, error, warn};

use tavern_core::TenantKey;

use super::store::{CounterStore, CounterStoreError};

/// Machine-readable code carried by every rejection.
pub const JOB_LIMIT_REACHED: &str = "job_limit_reached";

/// Decision for one admission attempt.
#[derive(Debug)]
pub enum Admission {
    /// A slot was reserved; the permit gives it back.
    Admitted(JobPermit),
    /// The tenant is at its limit. Expected and user-facing, not an error.
    Rejected(Rejection),
}

impl Admission {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Admission::Admitted(_))
    }
}

/// Why an admission was refused, with everything needed to render it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rejection {
    key: TenantKey,
    limit: u32,
}

impl Rejection {
    pub fn key(&self) -> &TenantKey {
        &self.key
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn code(&self) -> &'static str {
        JOB_LIMIT_REACHED
    }

    /// Human-readable message naming the configured limit.
    pub fn message(&self) -> String {
        format!(
            "You have reached the maximum number of concurrent jobs ({})",
            self.limit
        )
    }
}

/// Infrastructure failure while deciding. Distinct from a rejection so the
/// two are never confused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AdmissionError {
    #[error(transparent)]
    StoreUnavailable(#[from] CounterStoreError),
}

/// Bounds the number of admitted-but-unreleased jobs per tenant.
#[derive(Clone)]
pub struct AdmissionGate {
    store: Arc<dyn CounterStore>,
    limit: u32,
}

impl std::fmt::Debug for AdmissionGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdmissionGate")
            .field("limit", &self.limit)
            .finish_non_exhaustive()
    }
}

impl AdmissionGate {
    pub fn new(store: Arc<dyn CounterStore>, limit: u32) -> Self {
        Self { store, limit }
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Try to reserve a slot for `key`.
    ///
    /// On `Admitted`, the returned permit must be kept alive for the duration
    /// of the work; dropping it releases the slot.
    pub fn try_admit(&self, key: &TenantKey) -> Result<Admission, AdmissionError> {
        match self.store.increment_if_below(key, self.limit) {
            Ok(true) => {
                debug!(tenant = %key, limit = self.limit, "job admitted");
                Ok(Admission::Admitted(JobPermit {
                    store: self.store.clone(),
                    key: key.clone(),
                    released: false,
                }))
            }
            Ok(false) => {
                debug!(tenant = %key, limit = self.limit, "job rejected: limit reached");
                Ok(Admission::Rejected(Rejection {
                    key: key.clone(),
                    limit: self.limit,
                }))
            }
            Err(e) => {
                error!(tenant = %key, error = %e, "admission check failed");
                Err(AdmissionError::StoreUnavailable(e))
            }
        }
    }

    /// Release one slot for `key` without a permit. Floored at zero.
    ///
    /// Prefer dropping the `JobPermit`; this exists for callers that manage
    /// counts across process boundaries.
    pub fn release(&self, key: &TenantKey) -> Result<u64, AdmissionError> {
        let remaining = self.store.decrement(key)?;
        debug!(tenant = %key, remaining, "job slot released");
        Ok(remaining)
    }

    /// Number of admitted-but-unreleased jobs for `key`.
    pub fn active(&self, key: &TenantKey) -> Result<u64, AdmissionError> {
        Ok(self.store.current(key)?)
    }

    /// `try_admit` run on tokio's blocking pool.
    ///
    /// Store calls may cross the network; async callers use this so a slow
    /// round-trip does not stall a runtime worker.
    pub async fn admit(&self, key: &TenantKey) -> Result<Admission, AdmissionError> {
        let gate = self.clone();
        let key = key.clone();
        off_runtime(move || gate.try_admit(&key)).await?
    }

    /// `active` run on tokio's blocking pool.
    pub async fn in_flight(&self, key: &TenantKey) -> Result<u64, AdmissionError> {
        let gate = self.clone();
        let key = key.clone();
        off_runtime(move || gate.active(&key)).await?
    }
}

async fn off_runtime<T, F>(f: F) -> Result<T, CounterStoreError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| CounterStoreError::unavailable(format!("counter store task failed: {e}")))
}

/// Scoped acquisition of one job slot.
///
/// The slot is released exactly once: by `release()`, or when the permit is
/// dropped (normal return, error, panic unwinding, or task abort).
pub struct JobPermit {
    store: Arc<dyn CounterStore>,
    key: TenantKey,
    released: bool,
}

impl std::fmt::Debug for JobPermit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobPermit")
            .field("key", &self.key)
            .field("released", &self.released)
            .finish_non_exhaustive()
    }
}

impl JobPermit {
    pub fn key(&self) -> &TenantKey {
        &self.key
    }

    /// Release the slot now and report the store's answer.
    pub fn release(mut self) -> Result<u64, CounterStoreError> {
        self.released = true;
        self.store.decrement(&self.key)
    }

    /// `release` run on tokio's blocking pool.
    ///
    /// The permit moves into the blocking task, so the slot is still released
    /// if the awaiting future is dropped first.
    pub async fn release_async(self) -> Result<u64, CounterStoreError> {
        off_runtime(move || self.release()).await?
    }
}

impl Drop for JobPermit {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        match self.store.decrement(&self.key) {
            Ok(remaining) => debug!(tenant = %self.key, remaining, "job slot released"),
            Err(e) => warn!(tenant = %self.key, error = %e, "failed to release job slot"),
        }
    }
}
