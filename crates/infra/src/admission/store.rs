//! Counter store implementations.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tavern_core::TenantKey;

/// Persistence for in-flight job counts, keyed by tenant.
///
/// Implementations must make `increment_if_below` a single atomic step: a
/// read followed by a separate write lets concurrent callers overshoot the
/// limit.
pub trait CounterStore: Send + Sync {
    /// If the count for `key` is below `limit`, increment it and return `true`.
    /// Otherwise return `false` without mutating anything.
    fn increment_if_below(&self, key: &TenantKey, limit: u32) -> Result<bool, CounterStoreError>;

    /// Decrement the count for `key`, floored at zero. Returns the new count.
    fn decrement(&self, key: &TenantKey) -> Result<u64, CounterStoreError>;

    /// Current count for `key` (zero if never seen).
    fn current(&self, key: &TenantKey) -> Result<u64, CounterStoreError>;
}

/// Counter store error.
///
/// Never interpreted as "admit" or "deny": callers pick the fallback.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CounterStoreError {
    #[error("counter store unavailable: {0}")]
    Unavailable(String),
}

impl CounterStoreError {
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }
}

impl<S> CounterStore for Arc<S>
where
    S: CounterStore + ?Sized,
{
    fn increment_if_below(&self, key: &TenantKey, limit: u32) -> Result<bool, CounterStoreError> {
        (**self).increment_if_below(key, limit)
    }

    fn decrement(&self, key: &TenantKey) -> Result<u64, CounterStoreError> {
        (**self).decrement(key)
    }

    fn current(&self, key: &TenantKey) -> Result<u64, CounterStoreError> {
        (**self).current(key)
    }
}

/// In-memory counter store for single-process deployments, tests and dev.
///
/// Entries are created lazily and never removed; they decay to zero.
#[derive(Debug, Default)]
pub struct InMemoryCounterStore {
    counts: Mutex<HashMap<TenantKey, u64>>,
}

impl InMemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<TenantKey, u64>>, CounterStoreError> {
        self.counts
            .lock()
            .map_err(|_| CounterStoreError::unavailable("counter lock poisoned"))
    }
}

impl CounterStore for InMemoryCounterStore {
    fn increment_if_below(&self, key: &TenantKey, limit: u32) -> Result<bool, CounterStoreError> {
        let mut counts = self.lock()?;
        let count = counts.entry(key.clone()).or_insert(0);
        if *count < u64::from(limit) {
            *count += 1;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn decrement(&self, key: &TenantKey) -> Result<u64, CounterStoreError> {
        let mut counts = self.lock()?;
        match counts.get_mut(key) {
            Some(count) => {
                *count = count.saturating_sub(1);
                Ok(*count)
            }
            None => Ok(0),
        }
    }

    fn current(&self, key: &TenantKey) -> Result<u64, CounterStoreError> {
        Ok(self.lock()?.get(key).copied().unwrap_or(0))
    }
}
