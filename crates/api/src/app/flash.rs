//! One-shot flash messages, shown on the next page render after a redirect.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use serde::Serialize;

use tavern_core::TenantKey;

/// Pending messages kept per tenant; older ones are dropped first.
const MAX_PENDING_PER_TENANT: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FlashLevel {
    Notice,
    Alert,
}

impl FlashLevel {
    pub fn css_class(self) -> &'static str {
        match self {
            FlashLevel::Notice => "notice",
            FlashLevel::Alert => "alert",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Flash {
    pub level: FlashLevel,
    pub message: String,
}

/// In-memory flash storage keyed by tenant.
#[derive(Clone, Default)]
pub struct FlashStore {
    pending: Arc<RwLock<HashMap<TenantKey, Vec<Flash>>>>,
}

impl FlashStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn push(&self, tenant: &TenantKey, flash: Flash) {
        let mut pending = self.pending.write().await;
        let queue = pending.entry(tenant.clone()).or_default();
        queue.push(flash);
        if queue.len() > MAX_PENDING_PER_TENANT {
            let excess = queue.len() - MAX_PENDING_PER_TENANT;
            queue.drain(..excess);
        }
    }

    /// Remove and return every pending message for `tenant`.
    pub async fn take(&self, tenant: &TenantKey) -> Vec<Flash> {
        self.pending
            .write()
            .await
            .remove(tenant)
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tenant(s: &str) -> TenantKey {
        TenantKey::new(s).unwrap()
    }

    fn notice(msg: &str) -> Flash {
        Flash {
            level: FlashLevel::Notice,
            message: msg.to_string(),
        }
    }

    #[tokio::test]
    async fn flashes_are_shown_once() {
        let store = FlashStore::new();
        store.push(&tenant("u1"), notice("hello")).await;

        assert_eq!(store.take(&tenant("u1")).await, vec![notice("hello")]);
        assert!(store.take(&tenant("u1")).await.is_empty());
    }

    #[tokio::test]
    async fn flashes_are_per_tenant() {
        let store = FlashStore::new();
        store.push(&tenant("u1"), notice("for u1")).await;

        assert!(store.take(&tenant("u2")).await.is_empty());
        assert_eq!(store.take(&tenant("u1")).await.len(), 1);
    }

    #[tokio::test]
    async fn oldest_flashes_are_dropped() {
        let store = FlashStore::new();
        for i in 0..(MAX_PENDING_PER_TENANT + 3) {
            store.push(&tenant("u1"), notice(&format!("m{i}"))).await;
        }

        let taken = store.take(&tenant("u1")).await;
        assert_eq!(taken.len(), MAX_PENDING_PER_TENANT);
        assert_eq!(taken[0].message, "m3");
    }
}
