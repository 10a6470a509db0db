//! SSE bridge: forwards a job's StreamHub frames to the admin UI.

use std::convert::Infallible;

use axum::extract::{Extension, Path};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

use crate::common::JobId;
use crate::kernel::StreamHub;
use crate::server::app::AppState;

/// `GET /api/enrichment/jobs/:id/stream`
///
/// Each frame's `type` field becomes the SSE event name
/// (`progress`, `done`, `batch_error`).
pub async fn job_stream_handler(
    Extension(state): Extension<AppState>,
    Path(job_id): Path<JobId>,
) -> impl IntoResponse {
    let rx = state
        .kernel
        .stream_hub
        .subscribe(&StreamHub::job_topic(job_id))
        .await;

    let stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(value) => {
            let event_type = value
                .get("type")
                .and_then(|t| t.as_str())
                .unwrap_or("message");
            Some(Ok::<_, Infallible>(
                Event::default().event(event_type).data(value.to_string()),
            ))
        }
        Err(tokio_stream::wrappers::errors::BroadcastStreamRecvError::Lagged(_)) => {
            Some(Ok(Event::default().event("lagged").data("{}")))
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
