use axum::{http::StatusCode, response::Redirect};

use crate::app::respond::JOBS_PAGE;

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn root() -> Redirect {
    Redirect::to(JOBS_PAGE)
}
