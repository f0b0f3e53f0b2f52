//! Core job types.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tavern_core::{JobId, TenantKey};

/// Upper bound accepted for the demo job's sleep.
pub const MAX_DEMO_DURATION_MS: u64 = 60_000;

/// Job kind, used for logging and display.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum JobKind {
    /// Demo job: waits, then succeeds (or fails when asked to).
    Sleep { duration_ms: u64, fail: bool },
    /// Caller-supplied work.
    Custom { name: String },
}

impl JobKind {
    /// Demo job with the duration clamped to `MAX_DEMO_DURATION_MS`.
    pub fn sleep(duration_ms: u64, fail: bool) -> Self {
        Self::Sleep {
            duration_ms: duration_ms.min(MAX_DEMO_DURATION_MS),
            fail,
        }
    }

    pub fn custom(name: impl Into<String>) -> Self {
        Self::Custom { name: name.into() }
    }

    pub fn type_name(&self) -> &str {
        match self {
            JobKind::Sleep { .. } => "sleep",
            JobKind::Custom { name } => name,
        }
    }

    pub(crate) fn sleep_duration(&self) -> Option<Duration> {
        match self {
            JobKind::Sleep { duration_ms, .. } => Some(Duration::from_millis(*duration_ms)),
            JobKind::Custom { .. } => None,
        }
    }
}

/// Job execution status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum JobStatus {
    /// Admitted and executing
    Running,
    /// Completed successfully
    Completed,
    /// The work returned an error or panicked
    Failed { error: String },
    /// Aborted before finishing
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobStatus::Running)
    }

    pub fn label(&self) -> &'static str {
        match self {
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed { .. } => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }
}

/// One admitted job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: JobId,
    pub tenant: TenantKey,
    pub kind: JobKind,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl JobRecord {
    /// Record for a job that has just been admitted and is starting.
    pub fn running(tenant: TenantKey, kind: JobKind) -> Self {
        Self {
            id: JobId::new(),
            tenant,
            kind,
            status: JobStatus::Running,
            created_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn mark_completed(&mut self) {
        self.finish(JobStatus::Completed);
    }

    pub fn mark_failed(&mut self, error: impl Into<String>) {
        self.finish(JobStatus::Failed {
            error: error.into(),
        });
    }

    pub fn mark_cancelled(&mut self) {
        self.finish(JobStatus::Cancelled);
    }

    /// Wall time between admission and the end of the job, if it ended.
    pub fn duration_ms(&self) -> Option<u64> {
        self.finished_at
            .map(|end| (end - self.created_at).num_milliseconds().max(0) as u64)
    }

    fn finish(&mut self, status: JobStatus) {
        self.status = status;
        self.finished_at = Some(Utc::now());
    }
}
