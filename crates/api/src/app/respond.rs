//! Content negotiation: one decision value, one thin adapter per format.
//!
//! Handlers build an `Outcome` without knowing how it will be shown; `render`
//! turns it into a redirect-with-flash, a turbo-stream fragment targeting the
//! `flash` region, or a JSON payload.

use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use serde_json::json;

use tavern_core::{JobId, TenantKey};
use tavern_infra::admission::Rejection;

use crate::app::flash::{Flash, FlashLevel, FlashStore};

pub const TURBO_STREAM_MIME: &str = "text/vnd.turbo-stream.html";

/// DOM id of the region flash messages are rendered into.
pub const FLASH_TARGET: &str = "flash";

/// Where HTML form submissions land after a redirect.
pub const JOBS_PAGE: &str = "/jobs";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseFormat {
    /// Full-page flow: 303 redirect plus a flash message.
    Html,
    /// Partial update of the flash region.
    TurboStream,
    /// Structured payload for API clients.
    Json,
}

impl ResponseFormat {
    /// Pick a format from an explicit `?format=` override, else the `Accept`
    /// header. Turbo lists its stream type first, so it wins over HTML.
    pub fn negotiate(headers: &HeaderMap, explicit: Option<&str>) -> Self {
        if let Some(format) = explicit.and_then(Self::from_name) {
            return format;
        }

        let accept = headers
            .get(header::ACCEPT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_ascii_lowercase();

        if accept.contains(TURBO_STREAM_MIME) {
            ResponseFormat::TurboStream
        } else if accept.contains("application/json") && !accept.contains("text/html") {
            ResponseFormat::Json
        } else {
            ResponseFormat::Html
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "html" => Some(ResponseFormat::Html),
            "turbo_stream" | "turbo-stream" => Some(ResponseFormat::TurboStream),
            "json" => Some(ResponseFormat::Json),
            _ => None,
        }
    }
}

/// A user-facing result of a request, independent of output format.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub level: FlashLevel,
    pub message: String,
    pub status: StatusCode,
    pub body: serde_json::Value,
}

impl Outcome {
    pub fn rejected(rejection: &Rejection) -> Self {
        let message = rejection.message();
        Self {
            level: FlashLevel::Alert,
            status: StatusCode::TOO_MANY_REQUESTS,
            body: json!({
                "error": "Job limit reached",
                "code": rejection.code(),
                "message": message,
                "limit": rejection.limit(),
            }),
            message,
        }
    }

    pub fn enqueued(job_id: JobId) -> Self {
        Self {
            level: FlashLevel::Notice,
            message: "Job enqueued".to_string(),
            status: StatusCode::ACCEPTED,
            body: json!({
                "job_id": job_id.to_string(),
                "status": "enqueued",
            }),
        }
    }

    pub fn cancelling(job_id: JobId) -> Self {
        Self {
            level: FlashLevel::Notice,
            message: "Job cancelled".to_string(),
            status: StatusCode::ACCEPTED,
            body: json!({
                "job_id": job_id.to_string(),
                "status": "cancelling",
            }),
        }
    }

    fn is_error(&self) -> bool {
        self.status.is_client_error() || self.status.is_server_error()
    }
}

/// Render `outcome` for `tenant` in `format`.
pub async fn render(
    format: ResponseFormat,
    outcome: Outcome,
    flash: &FlashStore,
    tenant: &TenantKey,
) -> Response {
    match format {
        ResponseFormat::Html => {
            flash
                .push(
                    tenant,
                    Flash {
                        level: outcome.level,
                        message: outcome.message,
                    },
                )
                .await;
            Redirect::to(JOBS_PAGE).into_response()
        }
        ResponseFormat::TurboStream => {
            let status = if outcome.is_error() {
                outcome.status
            } else {
                StatusCode::OK
            };
            let flash = Flash {
                level: outcome.level,
                message: outcome.message,
            };
            (
                status,
                [(header::CONTENT_TYPE, TURBO_STREAM_MIME)],
                turbo_stream_replace(FLASH_TARGET, &flash_region(&[flash])),
            )
                .into_response()
        }
        ResponseFormat::Json => (outcome.status, axum::Json(outcome.body)).into_response(),
    }
}

/// The `flash` region with the given messages.
pub fn flash_region(flashes: &[Flash]) -> String {
    let mut html = format!(r#"<div id="{FLASH_TARGET}">"#);
    for flash in flashes {
        html.push_str(&format!(
            r#"<p class="flash {}">{}</p>"#,
            flash.level.css_class(),
            escape_html(&flash.message)
        ));
    }
    html.push_str("</div>");
    html
}

pub fn turbo_stream_replace(target: &str, content: &str) -> String {
    format!(
        r#"<turbo-stream action="replace" target="{}"><template>{}</template></turbo-stream>"#,
        escape_html(target),
        content
    )
}

pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use tavern_infra::admission::{Admission, AdmissionGate, InMemoryCounterStore, JobPermit};

    fn accept(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::ACCEPT, HeaderValue::from_static(value));
        headers
    }

    fn rejection(limit: u32) -> (Option<JobPermit>, Rejection) {
        let gate = AdmissionGate::new(InMemoryCounterStore::arc(), limit);
        let key = TenantKey::new("u1").unwrap();
        let held = match gate.try_admit(&key).unwrap() {
            Admission::Admitted(p) => Some(p),
            Admission::Rejected(r) => return (None, r),
        };
        for _ in 1..limit {
            std::mem::forget(gate.try_admit(&key).unwrap());
        }
        match gate.try_admit(&key).unwrap() {
            Admission::Rejected(r) => (held, r),
            Admission::Admitted(_) => panic!("gate should be full"),
        }
    }

    #[test]
    fn negotiation_prefers_turbo_stream() {
        let headers = accept("text/vnd.turbo-stream.html, text/html, application/xhtml+xml");
        assert_eq!(ResponseFormat::negotiate(&headers, None), ResponseFormat::TurboStream);
    }

    #[test]
    fn negotiation_detects_json() {
        assert_eq!(
            ResponseFormat::negotiate(&accept("application/json"), None),
            ResponseFormat::Json
        );
    }

    #[test]
    fn negotiation_defaults_to_html() {
        assert_eq!(ResponseFormat::negotiate(&HeaderMap::new(), None), ResponseFormat::Html);
        assert_eq!(ResponseFormat::negotiate(&accept("*/*"), None), ResponseFormat::Html);
        assert_eq!(
            ResponseFormat::negotiate(&accept("text/html,application/json;q=0.9"), None),
            ResponseFormat::Html
        );
    }

    #[test]
    fn explicit_format_overrides_accept() {
        let headers = accept("text/html");
        assert_eq!(
            ResponseFormat::negotiate(&headers, Some("json")),
            ResponseFormat::Json
        );
        assert_eq!(
            ResponseFormat::negotiate(&headers, Some("unknown")),
            ResponseFormat::Html
        );
    }

    #[test]
    fn rejection_outcome_carries_limit() {
        let (_held, r) = rejection(2);
        let outcome = Outcome::rejected(&r);

        assert_eq!(outcome.status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(outcome.level, FlashLevel::Alert);
        assert_eq!(outcome.body["error"], "Job limit reached");
        assert_eq!(outcome.body["code"], "job_limit_reached");
        assert_eq!(outcome.body["limit"], 2);
        assert_eq!(
            outcome.message,
            "You have reached the maximum number of concurrent jobs (2)"
        );
    }

    #[test]
    fn zero_limit_rejection_renders() {
        let (held, r) = rejection(0);
        assert!(held.is_none());
        assert!(Outcome::rejected(&r).message.contains("(0)"));
    }

    #[test]
    fn flash_region_escapes_messages() {
        let html = flash_region(&[Flash {
            level: FlashLevel::Alert,
            message: "<script>".into(),
        }]);
        assert_eq!(
            html,
            r#"<div id="flash"><p class="flash alert">&lt;script&gt;</p></div>"#
        );
    }

    #[tokio::test]
    async fn html_render_redirects_and_stores_flash() {
        let (_held, r) = rejection(1);
        let flash = FlashStore::new();
        let tenant = TenantKey::new("u1").unwrap();

        let res = render(ResponseFormat::Html, Outcome::rejected(&r), &flash, &tenant).await;

        assert_eq!(res.status(), StatusCode::SEE_OTHER);
        assert_eq!(res.headers()[header::LOCATION], JOBS_PAGE);
        let pending = flash.take(&tenant).await;
        assert_eq!(pending.len(), 1);
        assert!(pending[0].message.contains("maximum number of concurrent jobs (1)"));
    }

    #[tokio::test]
    async fn turbo_stream_success_is_ok() {
        let flash = FlashStore::new();
        let tenant = TenantKey::new("u1").unwrap();

        let res = render(
            ResponseFormat::TurboStream,
            Outcome::enqueued(JobId::new()),
            &flash,
            &tenant,
        )
        .await;

        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.headers()[header::CONTENT_TYPE], TURBO_STREAM_MIME);
        assert!(flash.take(&tenant).await.is_empty());
    }
}
