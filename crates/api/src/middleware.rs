use axum::{
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};

use tavern_core::TenantKey;

use crate::context::TenantContext;

/// Header carrying the caller's user id (set by the fronting session layer).
pub const USER_ID_HEADER: &str = "x-user-id";

pub async fn tenant_middleware(
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let tenant_key = extract_user_id(req.headers())?;

    req.extensions_mut().insert(TenantContext::new(tenant_key));

    Ok(next.run(req).await)
}

fn extract_user_id(headers: &HeaderMap) -> Result<TenantKey, StatusCode> {
    let header = headers
        .get(USER_ID_HEADER)
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let header = header.to_str().map_err(|_| StatusCode::UNAUTHORIZED)?;

    TenantKey::new(header).map_err(|_| StatusCode::UNAUTHORIZED)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn missing_header_is_unauthorized() {
        assert_eq!(
            extract_user_id(&HeaderMap::new()).unwrap_err(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn blank_header_is_unauthorized() {
        let mut headers = HeaderMap::new();
        headers.insert(USER_ID_HEADER, HeaderValue::from_static("   "));
        assert_eq!(
            extract_user_id(&headers).unwrap_err(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn header_becomes_tenant_key() {
        let mut headers = HeaderMap::new();
        headers.insert(USER_ID_HEADER, HeaderValue::from_static("u1"));
        assert_eq!(extract_user_id(&headers).unwrap().as_str(), "u1");
    }
}
