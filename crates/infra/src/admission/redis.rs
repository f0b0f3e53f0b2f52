//! Redis-backed counter store (optional).
//!
//! Centralized counts for deployments where several processes enforce the
//! same limit. Check-and-increment and the floored decrement each run as a
//! Lua script, so Redis executes them atomically; no client-side
//! read-modify-write ever happens.
//!
//! ## Keys
//!
//! - `tavern:active_jobs:<tenant>` holds the in-flight count as an integer

use std::sync::Arc;

use tracing::instrument;

use tavern_core::TenantKey;

use super::store::{CounterStore, CounterStoreError};

/// Default key prefix for per-tenant counters.
const DEFAULT_KEY_PREFIX: &str = "tavern:active_jobs";

/// Returns the new count, or -1 when the limit is already reached.
const INCREMENT_IF_BELOW: &str = r#"
local current = tonumber(redis.call('GET', KEYS[1]) or '0')
if current < tonumber(ARGV[1]) then
  return redis.call('INCR', KEYS[1])
end
return -1
"#;

const DECREMENT_FLOORED: &str = r#"
local current = tonumber(redis.call('GET', KEYS[1]) or '0')
if current > 0 then
  return redis.call('DECR', KEYS[1])
end
return 0
"#;

#[derive(Debug, Clone)]
pub struct RedisCounterStore {
    client: Arc<redis::Client>,
    key_prefix: String,
    increment: Arc<redis::Script>,
    decrement: Arc<redis::Script>,
}

impl RedisCounterStore {
    /// Create a store for `redis_url` (e.g. "redis://localhost:6379").
    ///
    /// Opening the client does not connect; connectivity problems surface on
    /// first use as `CounterStoreError::Unavailable`.
    pub fn new(
        redis_url: impl AsRef<str>,
        key_prefix: Option<String>,
    ) -> Result<Self, CounterStoreError> {
        let client = redis::Client::open(redis_url.as_ref())
            .map_err(|e| CounterStoreError::unavailable(e.to_string()))?;

        Ok(Self {
            client: Arc::new(client),
            key_prefix: key_prefix.unwrap_or_else(|| DEFAULT_KEY_PREFIX.to_string()),
            increment: Arc::new(redis::Script::new(INCREMENT_IF_BELOW)),
            decrement: Arc::new(redis::Script::new(DECREMENT_FLOORED)),
        })
    }

    fn counter_key(&self, key: &TenantKey) -> String {
        format!("{}:{}", self.key_prefix, key)
    }

    fn connection(&self) -> Result<redis::Connection, CounterStoreError> {
        self.client
            .get_connection()
            .map_err(|e| CounterStoreError::unavailable(e.to_string()))
    }
}

impl CounterStore for RedisCounterStore {
    #[instrument(skip(self), fields(tenant = %key), err)]
    fn increment_if_below(&self, key: &TenantKey, limit: u32) -> Result<bool, CounterStoreError> {
        let mut conn = self.connection()?;
        let result: i64 = self
            .increment
            .key(self.counter_key(key))
            .arg(limit)
            .invoke(&mut conn)
            .map_err(|e| CounterStoreError::unavailable(e.to_string()))?;
        Ok(result >= 0)
    }

    #[instrument(skip(self), fields(tenant = %key), err)]
    fn decrement(&self, key: &TenantKey) -> Result<u64, CounterStoreError> {
        let mut conn = self.connection()?;
        let remaining: i64 = self
            .decrement
            .key(self.counter_key(key))
            .invoke(&mut conn)
            .map_err(|e| CounterStoreError::unavailable(e.to_string()))?;
        Ok(remaining.max(0) as u64)
    }

    fn current(&self, key: &TenantKey) -> Result<u64, CounterStoreError> {
        let mut conn = self.connection()?;
        let count: Option<i64> = redis::cmd("GET")
            .arg(self.counter_key(key))
            .query(&mut conn)
            .map_err(|e| CounterStoreError::unavailable(e.to_string()))?;
        Ok(count.unwrap_or(0).max(0) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_keys_are_namespaced_per_tenant() {
        let store = RedisCounterStore::new("redis://localhost:6379", None).unwrap();
        let key = TenantKey::new("u1").unwrap();
        assert_eq!(store.counter_key(&key), "tavern:active_jobs:u1");
    }

    #[test]
    fn custom_prefix_is_used() {
        let store =
            RedisCounterStore::new("redis://localhost:6379", Some("test:jobs".into())).unwrap();
        let key = TenantKey::new("u2").unwrap();
        assert_eq!(store.counter_key(&key), "test:jobs:u2");
    }

    #[test]
    fn unreachable_server_reports_unavailable() {
        let store = RedisCounterStore::new("redis://127.0.0.1:1", None).unwrap();
        let key = TenantKey::new("u1").unwrap();
        assert!(matches!(
            store.increment_if_below(&key, 3),
            Err(CounterStoreError::Unavailable(_))
        ));
    }

    #[test]
    fn malformed_url_is_rejected() {
        assert!(RedisCounterStore::new("not a url", None).is_err());
    }
}
