use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use tavern_core::DomainError;
use tavern_infra::admission::AdmissionError;
use tavern_infra::jobs::JobStoreError;

/// Infrastructure failure during admission: the job is not enqueued and the
/// caller sees a generic message (details are in the logs).
pub fn admission_error_to_response(err: AdmissionError) -> axum::response::Response {
    match err {
        AdmissionError::StoreUnavailable(_) => json_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "store_unavailable",
            "Job admission is temporarily unavailable, please try again later",
        ),
    }
}

pub fn job_store_error_to_response(err: JobStoreError) -> axum::response::Response {
    match err {
        JobStoreError::NotFound(_) => json_error(StatusCode::NOT_FOUND, "not_found", "not found"),
        JobStoreError::TenantIsolation => {
            json_error(StatusCode::FORBIDDEN, "tenant_isolation", "job belongs to another user")
        }
        JobStoreError::AlreadyExists(id) => {
            json_error(StatusCode::CONFLICT, "conflict", format!("job already exists: {id}"))
        }
        JobStoreError::AlreadyFinished(id) => json_error(
            StatusCode::CONFLICT,
            "already_finished",
            format!("job already finished: {id}"),
        ),
        JobStoreError::Storage(msg) => {
            tracing::error!(error = %msg, "job store failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", "job storage failure")
        }
    }
}

pub fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    match err {
        DomainError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        DomainError::InvalidId(msg) => json_error(StatusCode::BAD_REQUEST, "invalid_id", msg),
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
