//! Job runner: executes admitted work and records how it ended.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

use tokio::task::{AbortHandle, JoinError};
use tracing::{error, info, warn};

use tavern_core::{JobId, TenantKey};

use crate::admission::JobPermit;

use super::store::{JobStore, JobStoreError};
use super::types::{JobKind, JobRecord};

/// Runs admitted jobs on the tokio runtime.
///
/// Each job's task owns its `JobPermit`, so the tenant's slot is released
/// however the task ends. A separate watcher task records the outcome.
pub struct JobRunner<S: JobStore> {
    store: S,
    running: Arc<Mutex<HashMap<JobId, AbortHandle>>>,
}

impl<S: JobStore + Clone + 'static> JobRunner<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            running: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Start `work` for the tenant holding `permit`.
    ///
    /// Must be called from within a tokio runtime. If the record cannot be
    /// stored the permit is dropped (slot released) and nothing runs.
    pub fn spawn<F>(&self, permit: JobPermit, kind: JobKind, work: F) -> Result<JobId, JobStoreError>
    where
        F: Future<Output = Result<(), String>> + Send + 'static,
    {
        let record = JobRecord::running(permit.key().clone(), kind);
        let job_id = self.store.insert(record.clone())?;

        let task = tokio::spawn(async move {
            let result = work.await;
            if let Err(e) = permit.release_async().await {
                warn!(error = %e, "failed to release job slot");
            }
            result
        });

        if let Ok(mut running) = self.running.lock() {
            running.insert(job_id, task.abort_handle());
        }

        info!(
            job_id = %job_id,
            tenant = %record.tenant,
            kind = record.kind.type_name(),
            "job started"
        );

        let store = self.store.clone();
        let running = self.running.clone();
        tokio::spawn(async move {
            let outcome = task.await;
            if let Ok(mut running) = running.lock() {
                running.remove(&job_id);
            }
            record_outcome(&store, record, outcome);
        });

        Ok(job_id)
    }

    /// Start the demo job described by `kind`.
    pub fn spawn_demo(&self, permit: JobPermit, kind: JobKind) -> Result<JobId, JobStoreError> {
        let work = demo_work(kind.clone());
        self.spawn(permit, kind, work)
    }

    /// Abort a running job. Its permit is released by the abort.
    pub fn cancel(&self, tenant: &TenantKey, job_id: JobId) -> Result<(), JobStoreError> {
        let record = self
            .store
            .get(tenant, job_id)?
            .ok_or(JobStoreError::NotFound(job_id))?;

        if record.status.is_terminal() {
            return Err(JobStoreError::AlreadyFinished(job_id));
        }

        let handle = self
            .running
            .lock()
            .map_err(|_| JobStoreError::Storage("running-job table poisoned".to_string()))?
            .remove(&job_id);

        match handle {
            Some(handle) if request_abort(&handle) => {
                info!(job_id = %job_id, tenant = %tenant, "job cancellation requested");
                Ok(())
            }
            _ => Err(JobStoreError::AlreadyFinished(job_id)),
        }
    }

    /// Number of jobs whose tasks have not finished yet (all tenants).
    pub fn running_count(&self) -> usize {
        self.running.lock().map(|r| r.len()).unwrap_or(0)
    }
}

impl<S: JobStore + Clone> Clone for JobRunner<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            running: self.running.clone(),
        }
    }
}

/// Abort the task unless it has already run to completion, in which case
/// its own outcome stands and the abort would be a no-op.
fn request_abort(handle: &AbortHandle) -> bool {
    if handle.is_finished() {
        return false;
    }
    handle.abort();
    true
}

fn record_outcome<S: JobStore>(
    store: &S,
    mut record: JobRecord,
    outcome: Result<Result<(), String>, JoinError>,
) {
    match outcome {
        Ok(Ok(())) => {
            record.mark_completed();
            info!(job_id = %record.id, tenant = %record.tenant, duration_ms = record.duration_ms(), "job completed");
        }
        Ok(Err(e)) => {
            error!(job_id = %record.id, tenant = %record.tenant, error = %e, "job execution failed");
            record.mark_failed(e);
        }
        Err(e) if e.is_panic() => {
            error!(job_id = %record.id, tenant = %record.tenant, "job execution panicked");
            record.mark_failed("job panicked");
        }
        Err(_) => {
            info!(job_id = %record.id, tenant = %record.tenant, "job cancelled");
            record.mark_cancelled();
        }
    }

    if let Err(e) = store.update(&record) {
        warn!(job_id = %record.id, error = %e, "failed to record job outcome");
    }
}

async fn demo_work(kind: JobKind) -> Result<(), String> {
    if let Some(duration) = kind.sleep_duration() {
        tokio::time::sleep(duration).await;
    }
    match kind {
        JobKind::Sleep { fail: true, .. } => Err("demo job failed on request".to_string()),
        _ => Ok(()),
    }
}
