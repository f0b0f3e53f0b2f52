//! Background job endpoints: enqueue-with-admission, listing, status, cancel.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::{HeaderMap, StatusCode},
    response::{Html, IntoResponse},
    routing::get,
    Json, Router,
};

use tavern_core::JobId;
use tavern_infra::admission::Admission;
use tavern_infra::jobs::{JobKind, JobRecord, JobStore};

use crate::app::dto::{self, EnqueueJobParams, FormatParams, JobsOverview};
use crate::app::flash::Flash;
use crate::app::respond::{self, escape_html, Outcome, ResponseFormat};
use crate::app::{errors, services::AppServices};
use crate::context::TenantContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_jobs).post(enqueue_job))
        .route("/:job_id", get(get_job).delete(cancel_job))
}

/// POST /jobs
///
/// Admit and start a demo job, or report that the user is at their limit.
pub async fn enqueue_job(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    headers: HeaderMap,
    Query(params): Query<EnqueueJobParams>,
) -> axum::response::Response {
    let format = ResponseFormat::negotiate(&headers, params.format.as_deref());
    let key = tenant.tenant_key();

    let permit = match services.gate.admit(key).await {
        Ok(Admission::Admitted(permit)) => permit,
        Ok(Admission::Rejected(rejection)) => {
            return respond::render(format, Outcome::rejected(&rejection), &services.flash, key)
                .await;
        }
        Err(e) => return errors::admission_error_to_response(e),
    };

    let kind = JobKind::sleep(
        params.duration_ms.unwrap_or(dto::DEFAULT_DEMO_DURATION_MS),
        params.fail.unwrap_or(false),
    );

    match services.runner.spawn_demo(permit, kind) {
        Ok(job_id) => respond::render(format, Outcome::enqueued(job_id), &services.flash, key).await,
        Err(e) => errors::job_store_error_to_response(e),
    }
}

/// GET /jobs
///
/// HTML page with the flash region, current usage and recent jobs; JSON
/// overview for API clients.
pub async fn list_jobs(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    headers: HeaderMap,
    Query(params): Query<FormatParams>,
) -> axum::response::Response {
    let format = ResponseFormat::negotiate(&headers, params.format.as_deref());
    let key = tenant.tenant_key();

    let active = match services.gate.in_flight(key).await {
        Ok(n) => n,
        Err(e) => return errors::admission_error_to_response(e),
    };
    let store = services.runner.store();
    let (jobs, stats) = match store
        .list(key, dto::JOB_LIST_LIMIT)
        .and_then(|jobs| Ok((jobs, store.stats(key)?)))
    {
        Ok(v) => v,
        Err(e) => return errors::job_store_error_to_response(e),
    };

    match format {
        ResponseFormat::Json => Json(JobsOverview {
            active,
            limit: services.limit(),
            stats,
            jobs,
        })
        .into_response(),
        ResponseFormat::Html | ResponseFormat::TurboStream => {
            let flashes = services.flash.take(key).await;
            Html(jobs_page(&flashes, active, services.limit(), &jobs)).into_response()
        }
    }
}

/// GET /jobs/:job_id
pub async fn get_job(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(job_id): Path<String>,
) -> axum::response::Response {
    let job_id: JobId = match job_id.parse() {
        Ok(id) => id,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match services.runner.store().get(tenant.tenant_key(), job_id) {
        Ok(Some(record)) => (StatusCode::OK, Json(record)).into_response(),
        Ok(None) => errors::json_error(StatusCode::NOT_FOUND, "not_found", "not found"),
        Err(e) => errors::job_store_error_to_response(e),
    }
}

/// DELETE /jobs/:job_id
///
/// Abort a running job; its slot is released as the task unwinds.
pub async fn cancel_job(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    headers: HeaderMap,
    Path(job_id): Path<String>,
    Query(params): Query<FormatParams>,
) -> axum::response::Response {
    let format = ResponseFormat::negotiate(&headers, params.format.as_deref());
    let job_id: JobId = match job_id.parse() {
        Ok(id) => id,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match services.runner.cancel(tenant.tenant_key(), job_id) {
        Ok(()) => {
            respond::render(
                format,
                Outcome::cancelling(job_id),
                &services.flash,
                tenant.tenant_key(),
            )
            .await
        }
        Err(e) => errors::job_store_error_to_response(e),
    }
}

fn jobs_page(flashes: &[Flash], active: u64, limit: u32, jobs: &[JobRecord]) -> String {
    let mut rows = String::new();
    for job in jobs {
        rows.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
            job.id,
            escape_html(job.kind.type_name()),
            job.status.label(),
            job.created_at.to_rfc3339(),
        ));
    }

    format!(
        concat!(
            "<!DOCTYPE html>",
            "<html><head><meta charset=\"utf-8\"><title>Background jobs</title></head><body>",
            "{flash}",
            "<h1>Background jobs</h1>",
            "<p id=\"usage\">Running {active} of {limit} allowed concurrent jobs</p>",
            "<form method=\"post\" action=\"/jobs\"><button type=\"submit\">Start demo job</button></form>",
            "<table id=\"jobs\"><thead><tr><th>ID</th><th>Kind</th><th>Status</th><th>Started</th></tr></thead>",
            "<tbody>{rows}</tbody></table>",
            "</body></html>"
        ),
        flash = respond::flash_region(flashes),
        active = active,
        limit = limit,
        rows = rows,
    )
}
