//! Per-tenant admission control for background jobs.
//!
//! ## Design
//!
//! - A `CounterStore` owns the in-flight count per tenant key and performs the
//!   check-and-increment as one atomic operation
//! - The `AdmissionGate` wraps a store with the configured limit and hands out
//!   `JobPermit`s
//! - A `JobPermit` releases its slot exactly once: explicitly, or on drop
//!
//! ## Components
//!
//! - `InMemoryCounterStore`: single-process store (limit is per process)
//! - `RedisCounterStore`: centralized store shared by every process (feature `redis`)
//! - `AdmissionGate` / `Admission` / `Rejection`: the decision value consumed by
//!   the HTTP layer

pub mod gate;
#[cfg(feature = "redis")]
pub mod redis;
pub mod store;

pub use gate::{Admission, AdmissionError, AdmissionGate, JobPermit, Rejection};
#[cfg(feature = "redis")]
pub use redis::RedisCounterStore;
pub use store::{CounterStore, CounterStoreError, InMemoryCounterStore};
