//! Job record storage.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tavern_core::{JobId, TenantKey};

use super::types::{JobRecord, JobStatus};

/// Job record store abstraction.
pub trait JobStore: Send + Sync {
    /// Insert a new record.
    fn insert(&self, record: JobRecord) -> Result<JobId, JobStoreError>;

    /// Get a record by ID, scoped to `tenant`.
    fn get(&self, tenant: &TenantKey, job_id: JobId) -> Result<Option<JobRecord>, JobStoreError>;

    /// Replace an existing record.
    fn update(&self, record: &JobRecord) -> Result<(), JobStoreError>;

    /// Most recent records for a tenant, newest first.
    fn list(&self, tenant: &TenantKey, limit: usize) -> Result<Vec<JobRecord>, JobStoreError>;

    /// Per-status counts for a tenant.
    fn stats(&self, tenant: &TenantKey) -> Result<JobStats, JobStoreError>;
}

/// Job store error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JobStoreError {
    #[error("job not found: {0}")]
    NotFound(JobId),
    #[error("tenant isolation violation")]
    TenantIsolation,
    #[error("job already exists: {0}")]
    AlreadyExists(JobId),
    #[error("job already finished: {0}")]
    AlreadyFinished(JobId),
    #[error("storage error: {0}")]
    Storage(String),
}

/// Job statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct JobStats {
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
}

/// Finished records kept per tenant by default.
pub const DEFAULT_FINISHED_RETENTION: usize = 50;

/// In-memory job store for single-process deployments, tests and dev.
///
/// Running records are always kept. Once a tenant has more than
/// `finished_retention` finished records, the oldest are pruned.
#[derive(Debug)]
pub struct InMemoryJobStore {
    jobs: RwLock<HashMap<JobId, JobRecord>>,
    finished_retention: usize,
}

impl Default for InMemoryJobStore {
    fn default() -> Self {
        Self::with_retention(DEFAULT_FINISHED_RETENTION)
    }
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    pub fn with_retention(finished_retention: usize) -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            finished_retention,
        }
    }
}

fn prune_finished(
    jobs: &mut HashMap<JobId, JobRecord>,
    tenant: &TenantKey,
    keep: usize,
) {
    let mut finished: Vec<JobId> = jobs
        .values()
        .filter(|r| &r.tenant == tenant && r.status.is_terminal())
        .map(|r| r.id)
        .collect();
    if finished.len() <= keep {
        return;
    }

    // Oldest first; UUIDv7 ids sort by creation time.
    finished.sort_by(|a, b| a.as_uuid().cmp(b.as_uuid()));
    let excess = finished.len() - keep;
    for id in finished.into_iter().take(excess) {
        jobs.remove(&id);
    }
}

fn poisoned<T>(_: T) -> JobStoreError {
    JobStoreError::Storage("job store lock poisoned".to_string())
}

impl JobStore for InMemoryJobStore {
    fn insert(&self, record: JobRecord) -> Result<JobId, JobStoreError> {
        let mut jobs = self.jobs.write().map_err(poisoned)?;
        if jobs.contains_key(&record.id) {
            return Err(JobStoreError::AlreadyExists(record.id));
        }
        let id = record.id;
        jobs.insert(id, record);
        Ok(id)
    }

    fn get(&self, tenant: &TenantKey, job_id: JobId) -> Result<Option<JobRecord>, JobStoreError> {
        let jobs = self.jobs.read().map_err(poisoned)?;
        match jobs.get(&job_id) {
            Some(record) if &record.tenant == tenant => Ok(Some(record.clone())),
            Some(_) => Err(JobStoreError::TenantIsolation),
            None => Ok(None),
        }
    }

    fn update(&self, record: &JobRecord) -> Result<(), JobStoreError> {
        let mut jobs = self.jobs.write().map_err(poisoned)?;
        match jobs.get_mut(&record.id) {
            Some(existing) if existing.tenant == record.tenant => *existing = record.clone(),
            Some(_) => return Err(JobStoreError::TenantIsolation),
            None => return Err(JobStoreError::NotFound(record.id)),
        }

        if record.status.is_terminal() {
            prune_finished(&mut jobs, &record.tenant, self.finished_retention);
        }
        Ok(())
    }

    fn list(&self, tenant: &TenantKey, limit: usize) -> Result<Vec<JobRecord>, JobStoreError> {
        let jobs = self.jobs.read().map_err(poisoned)?;
        let mut result: Vec<_> = jobs
            .values()
            .filter(|r| &r.tenant == tenant)
            .cloned()
            .collect();

        // UUIDv7 ids sort by creation time.
        result.sort_by(|a, b| b.id.as_uuid().cmp(a.id.as_uuid()));
        result.truncate(limit);
        Ok(result)
    }

    fn stats(&self, tenant: &TenantKey) -> Result<JobStats, JobStoreError> {
        let jobs = self.jobs.read().map_err(poisoned)?;
        let mut stats = JobStats::default();

        for record in jobs.values().filter(|r| &r.tenant == tenant) {
            match record.status {
                JobStatus::Running => stats.running += 1,
                JobStatus::Completed => stats.completed += 1,
                JobStatus::Failed { .. } => stats.failed += 1,
                JobStatus::Cancelled => stats.cancelled += 1,
            }
        }

        Ok(stats)
    }
}

impl<S> JobStore for Arc<S>
where
    S: JobStore + ?Sized,
{
    fn insert(&self, record: JobRecord) -> Result<JobId, JobStoreError> {
        (**self).insert(record)
    }

    fn get(&self, tenant: &TenantKey, job_id: JobId) -> Result<Option<JobRecord>, JobStoreError> {
        (**self).get(tenant, job_id)
    }

    fn update(&self, record: &JobRecord) -> Result<(), JobStoreError> {
        (**self).update(record)
    }

    fn list(&self, tenant: &TenantKey, limit: usize) -> Result<Vec<JobRecord>, JobStoreError> {
        (**self).list(tenant, limit)
    }

    fn stats(&self, tenant: &TenantKey) -> Result<JobStats, JobStoreError> {
        (**self).stats(tenant)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::types::JobKind;

    fn tenant(s: &str) -> TenantKey {
        TenantKey::new(s).unwrap()
    }

    #[test]
    fn insert_and_get() {
        let store = InMemoryJobStore::new();
        let record = JobRecord::running(tenant("u1"), JobKind::custom("test"));
        let id = store.insert(record).unwrap();

        let fetched = store.get(&tenant("u1"), id).unwrap().unwrap();
        assert_eq!(fetched.id, id);
        assert!(store.get(&tenant("u1"), JobId::new()).unwrap().is_none());
    }

    #[test]
    fn duplicate_insert_is_rejected() {
        let store = InMemoryJobStore::new();
        let record = JobRecord::running(tenant("u1"), JobKind::custom("test"));
        store.insert(record.clone()).unwrap();

        assert!(matches!(
            store.insert(record),
            Err(JobStoreError::AlreadyExists(_))
        ));
    }

    #[test]
    fn tenant_isolation() {
        let store = InMemoryJobStore::new();
        let mut record = JobRecord::running(tenant("u1"), JobKind::custom("test"));
        let id = store.insert(record.clone()).unwrap();

        assert!(matches!(
            store.get(&tenant("u2"), id),
            Err(JobStoreError::TenantIsolation)
        ));

        record.tenant = tenant("u2");
        assert!(matches!(
            store.update(&record),
            Err(JobStoreError::TenantIsolation)
        ));
        assert!(store.list(&tenant("u2"), 10).unwrap().is_empty());
    }

    #[test]
    fn list_is_newest_first_and_truncated() {
        let store = InMemoryJobStore::new();
        let ids: Vec<_> = (0..5)
            .map(|i| {
                store
                    .insert(JobRecord::running(tenant("u1"), JobKind::custom(format!("job-{i}"))))
                    .unwrap()
            })
            .collect();

        let listed = store.list(&tenant("u1"), 3).unwrap();
        assert_eq!(listed.len(), 3);
        assert_eq!(listed[0].id, ids[4]);
    }

    #[test]
    fn finished_records_are_pruned_oldest_first() {
        let store = InMemoryJobStore::with_retention(2);
        let t = tenant("u1");

        let running = store
            .insert(JobRecord::running(t.clone(), JobKind::custom("long")))
            .unwrap();

        let mut finished = Vec::new();
        for i in 0..5 {
            let mut record = JobRecord::running(t.clone(), JobKind::custom(format!("job-{i}")));
            store.insert(record.clone()).unwrap();
            record.mark_completed();
            store.update(&record).unwrap();
            finished.push(record.id);
        }

        let stats = store.stats(&t).unwrap();
        assert_eq!(stats.running, 1);
        assert_eq!(stats.completed, 2);

        assert!(store.get(&t, running).unwrap().is_some());
        assert!(store.get(&t, finished[0]).unwrap().is_none());
        assert!(store.get(&t, finished[3]).unwrap().is_some());
        assert!(store.get(&t, finished[4]).unwrap().is_some());
    }

    #[test]
    fn pruning_is_per_tenant() {
        let store = InMemoryJobStore::with_retention(1);

        let mut kept = JobRecord::running(tenant("u2"), JobKind::custom("other"));
        store.insert(kept.clone()).unwrap();
        kept.mark_completed();
        store.update(&kept).unwrap();

        for _ in 0..3 {
            let mut record = JobRecord::running(tenant("u1"), JobKind::custom("mine"));
            store.insert(record.clone()).unwrap();
            record.mark_failed("boom");
            store.update(&record).unwrap();
        }

        assert_eq!(store.stats(&tenant("u1")).unwrap().failed, 1);
        assert!(store.get(&tenant("u2"), kept.id).unwrap().is_some());
    }

    #[test]
    fn stats_tracking() {
        let store = InMemoryJobStore::new();
        let t = tenant("u1");

        let mut done = JobRecord::running(t.clone(), JobKind::custom("a"));
        store.insert(done.clone()).unwrap();
        store
            .insert(JobRecord::running(t.clone(), JobKind::custom("b")))
            .unwrap();

        done.mark_completed();
        store.update(&done).unwrap();

        let stats = store.stats(&t).unwrap();
        assert_eq!(stats.running, 1);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.failed, 0);
    }
}
