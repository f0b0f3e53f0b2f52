use std::sync::Arc;

use tavern_infra::admission::{AdmissionGate, CounterStore, CounterStoreError, InMemoryCounterStore};
use tavern_infra::config::AppConfig;
use tavern_infra::jobs::{InMemoryJobStore, JobRunner};

use crate::app::flash::FlashStore;

/// Shared services handed to every protected handler.
#[derive(Clone)]
pub struct AppServices {
    pub gate: AdmissionGate,
    pub runner: JobRunner<Arc<InMemoryJobStore>>,
    pub flash: FlashStore,
}

impl AppServices {
    pub fn new(store: Arc<dyn CounterStore>, limit: u32) -> Self {
        Self {
            gate: AdmissionGate::new(store, limit),
            runner: JobRunner::new(InMemoryJobStore::arc()),
            flash: FlashStore::new(),
        }
    }

    pub fn limit(&self) -> u32 {
        self.gate.limit()
    }
}

/// Wire services from configuration.
///
/// `REDIS_URL` selects the centralized counter store (feature `redis`);
/// otherwise counts live in process memory and the limit is per process.
pub fn build_services(config: &AppConfig) -> Result<AppServices, CounterStoreError> {
    let store = counter_store(config)?;
    Ok(AppServices::new(store, config.max_concurrent_jobs))
}

#[cfg(feature = "redis")]
fn counter_store(config: &AppConfig) -> Result<Arc<dyn CounterStore>, CounterStoreError> {
    match &config.redis_url {
        Some(url) => {
            tracing::info!("using redis counter store");
            Ok(Arc::new(tavern_infra::admission::RedisCounterStore::new(url, None)?))
        }
        None => Ok(InMemoryCounterStore::arc()),
    }
}

#[cfg(not(feature = "redis"))]
fn counter_store(config: &AppConfig) -> Result<Arc<dyn CounterStore>, CounterStoreError> {
    if config.redis_url.is_some() {
        tracing::warn!("REDIS_URL set but the redis feature is disabled; using in-memory counters");
    }
    Ok(InMemoryCounterStore::arc())
}
