//! Progress frames published to a job's stream topic.
//!
//! Frames are tagged JSON objects so SSE consumers can dispatch on the
//! `type` field without knowing every variant.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::common::JobId;
use crate::kernel::StreamHub;

use super::models::{JobKind, JobStatus};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobEvent {
    /// Emitted after each completed chunk.
    Progress {
        job_id: JobId,
        kind: JobKind,
        total: i64,
        processed: i64,
        changed: i64,
        failed: i64,
        /// 1-based chunk number
        batch: i64,
        total_batches: i64,
        /// Per-item change records from this chunk (e.g. vendor renames)
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        updates: Vec<Value>,
    },

    /// Emitted once when the run reaches a terminal state.
    Done {
        job_id: JobId,
        kind: JobKind,
        status: JobStatus,
        total: i64,
        processed: i64,
        changed: i64,
        failed: i64,
    },

    /// Emitted when a whole chunk errored (claim or counter update failed),
    /// distinct from individual task failures which roll into `failed`.
    BatchError {
        job_id: JobId,
        kind: JobKind,
        error: String,
    },
}

impl JobEvent {
    /// Serialize and publish to the job's topic. A frame with no subscribers
    /// is dropped: no one is watching.
    pub async fn publish(&self, hub: &StreamHub) {
        let job_id = match self {
            JobEvent::Progress { job_id, .. }
            | JobEvent::Done { job_id, .. }
            | JobEvent::BatchError { job_id, .. } => *job_id,
        };
        if let Ok(value) = serde_json::to_value(self) {
            hub.publish(&StreamHub::job_topic(job_id), value).await;
        }
    }
}
