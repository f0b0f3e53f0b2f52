use serde::{Deserialize, Serialize};

use tavern_infra::jobs::{JobRecord, JobStats};

/// Demo job duration when the request does not name one.
pub const DEFAULT_DEMO_DURATION_MS: u64 = 1_000;

/// Records shown on the jobs page / returned by the listing.
pub const JOB_LIST_LIMIT: usize = 20;

/// Query string for `POST /jobs`.
#[derive(Debug, Default, Deserialize)]
pub struct EnqueueJobParams {
    pub duration_ms: Option<u64>,
    pub fail: Option<bool>,
    pub format: Option<String>,
}

/// Query string shared by read endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct FormatParams {
    pub format: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct JobsOverview {
    pub active: u64,
    pub limit: u32,
    pub stats: JobStats,
    pub jobs: Vec<JobRecord>,
}
