//! Bearer-token gate for the admin control surface.
//!
//! The auth provider is consumed as a binary "is this caller an authorized
//! admin" check: a static token in the Authorization header.

use std::sync::Arc;

use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::debug;

pub async fn admin_auth_middleware(
    admin_token: Arc<String>,
    request: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    if bearer_token(&request) == Some(admin_token.as_str()) {
        return next.run(request).await;
    }

    debug!("rejected admin request without valid token");
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({ "error": "unauthorized" })),
    )
        .into_response()
}

fn bearer_token(request: &axum::http::Request<axum::body::Body>) -> Option<&str> {
    let header = request.headers().get("authorization")?.to_str().ok()?;
    Some(header.strip_prefix("Bearer ").unwrap_or(header))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request_with_auth(value: &str) -> axum::http::Request<axum::body::Body> {
        axum::http::Request::builder()
            .header("authorization", value)
            .body(axum::body::Body::empty())
            .unwrap()
    }

    #[test]
    fn bearer_prefix_is_stripped() {
        let request = request_with_auth("Bearer secret-token");
        assert_eq!(bearer_token(&request), Some("secret-token"));
    }

    #[test]
    fn raw_token_is_accepted() {
        let request = request_with_auth("secret-token");
        assert_eq!(bearer_token(&request), Some("secret-token"));
    }

    #[test]
    fn missing_header_yields_none() {
        let request = axum::http::Request::builder()
            .body(axum::body::Body::empty())
            .unwrap();
        assert_eq!(bearer_token(&request), None);
    }
}
