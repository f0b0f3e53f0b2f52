//! Background jobs gated by per-tenant admission.
//!
//! ## Design
//!
//! - A job only starts with a `JobPermit` from the admission gate
//! - The permit is owned by the job's task, so the slot is released on every
//!   exit path: success, failure, panic, or cancellation
//! - Outcomes are recorded in a tenant-scoped `JobStore` for visibility
//! - No automatic retries: a rejected or failed job is reported, not requeued
//!
//! ## Components
//!
//! - `JobRecord`: status and timing of one admitted job
//! - `JobStore`: persistence for records (in-memory)
//! - `JobRunner`: spawns admitted work and records how it ended

pub mod runner;
pub mod store;
pub mod types;

pub use runner::JobRunner;
pub use store::{
    DEFAULT_FINISHED_RETENTION, InMemoryJobStore, JobStats, JobStore, JobStoreError,
};
pub use types::{JobKind, JobRecord, JobStatus, MAX_DEMO_DURATION_MS};
