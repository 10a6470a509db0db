//! One-shot listing re-check: the only path that overwrites an existing
//! touchless verdict.

use axum::extract::{Extension, Path};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::common::ListingId;
use crate::domains::enrichment::classify_one;
use crate::server::app::AppState;

/// `POST /api/listings/:id/classify`
pub async fn classify_listing_handler(
    Extension(state): Extension<AppState>,
    Path(listing_id): Path<ListingId>,
) -> Response {
    match classify_one(listing_id, &state.kernel).await {
        Ok(listing) => Json(json!({ "listing": listing })).into_response(),
        Err(e) => {
            tracing::warn!(listing_id = %listing_id, error = %format!("{:#}", e), "one-shot classify failed");
            (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({ "error": format!("{:#}", e) })),
            )
                .into_response()
        }
    }
}
