//! Job manager: the start/pause/resume/cancel/status control surface.

use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::common::JobId;
use crate::kernel::ServerKernel;

use super::events::JobEvent;
use super::models::{EnrichmentJob, EnrichmentTask, JobKind, JobStatus, TaskStatus};
use super::registry::SharedHandlerRegistry;
use super::runner::JobRunner;

#[derive(Debug, Error)]
pub enum ControlError {
    #[error("a {0} job is already active")]
    AlreadyActive(JobKind),
    #[error("job does not allow {action} from its current status")]
    InvalidTransition { action: &'static str },
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Status payload returned to the admin UI.
#[derive(Debug, Serialize)]
pub struct JobStatusReport {
    #[serde(flatten)]
    pub job: EnrichmentJob,
    pub task_counts: Vec<TaskStatusCount>,
    pub recent_failures: Vec<TaskFailure>,
}

#[derive(Debug, Serialize)]
pub struct TaskStatusCount {
    pub status: TaskStatus,
    pub count: i64,
}

#[derive(Debug, Serialize)]
pub struct TaskFailure {
    pub target_id: uuid::Uuid,
    pub error: Option<String>,
}

pub struct JobManager {
    kernel: Arc<ServerKernel>,
    registry: SharedHandlerRegistry,
    runner: Arc<JobRunner>,
}

impl JobManager {
    pub fn new(kernel: Arc<ServerKernel>, registry: SharedHandlerRegistry) -> Self {
        let runner = Arc::new(JobRunner::new(kernel.clone(), registry.clone()));
        Self {
            kernel,
            registry,
            runner,
        }
    }

    /// Start a run of `kind`: fan out one task per target and kick off the
    /// first chunk. At most one active job per kind; the check-then-insert
    /// race is a tolerated minor risk, not a hard guarantee.
    pub async fn start(&self, kind: JobKind) -> Result<EnrichmentJob, ControlError> {
        let pool = &self.kernel.db_pool;

        if let Some(active) = EnrichmentJob::find_active_by_kind(kind, pool)
            .await
            .context("Failed to check for active jobs")?
        {
            info!(job_id = %active.id, kind = %kind, "refusing to start, job already active");
            return Err(ControlError::AlreadyActive(kind));
        }

        let handler = self.registry.get(kind)?;
        let targets = handler
            .targets(&self.kernel)
            .await
            .context("Failed to collect targets")?;

        let job = EnrichmentJob::new(kind, targets.len() as i64)
            .insert(pool)
            .await
            .context("Failed to create job")?;
        EnrichmentTask::fan_out(job.id, &targets, pool)
            .await
            .context("Failed to fan out tasks")?;
        EnrichmentJob::mark_running(job.id, pool)
            .await
            .context("Failed to mark job running")?;

        info!(job_id = %job.id, kind = %kind, total = targets.len(), "job started");
        self.runner.clone().start(job.id);
        EnrichmentJob::find_by_id(job.id, pool)
            .await
            .map_err(ControlError::Other)
    }

    /// Pause takes effect at the next chunk boundary.
    pub async fn pause(&self, job_id: JobId) -> Result<EnrichmentJob, ControlError> {
        let pool = &self.kernel.db_pool;
        if !EnrichmentJob::mark_paused(job_id, pool)
            .await
            .context("Failed to pause job")?
        {
            return Err(ControlError::InvalidTransition { action: "pause" });
        }
        info!(job_id = %job_id, "job paused");
        EnrichmentJob::find_by_id(job_id, pool)
            .await
            .map_err(ControlError::Other)
    }

    /// Resume a paused job: the only backward status edge.
    pub async fn resume(&self, job_id: JobId) -> Result<EnrichmentJob, ControlError> {
        let pool = &self.kernel.db_pool;
        let job = EnrichmentJob::find_by_id(job_id, pool)
            .await
            .context("Job not found")?;
        if job.status != JobStatus::Paused {
            return Err(ControlError::InvalidTransition { action: "resume" });
        }
        EnrichmentJob::mark_running(job_id, pool)
            .await
            .context("Failed to resume job")?;
        info!(job_id = %job_id, "job resumed");
        self.runner.clone().start(job_id);
        EnrichmentJob::find_by_id(job_id, pool)
            .await
            .map_err(ControlError::Other)
    }

    /// Cancel the job and all still-pending tasks. An in-flight chunk
    /// notices at its next boundary check; its writes still land.
    pub async fn cancel(&self, job_id: JobId) -> Result<EnrichmentJob, ControlError> {
        let pool = &self.kernel.db_pool;
        if !EnrichmentJob::cancel(job_id, pool)
            .await
            .context("Failed to cancel job")?
        {
            return Err(ControlError::InvalidTransition { action: "cancel" });
        }
        let job = EnrichmentJob::find_by_id(job_id, pool)
            .await
            .context("Job not found after cancel")?;
        info!(job_id = %job_id, processed = job.processed, "job cancelled");
        JobEvent::Done {
            job_id,
            kind: job.kind,
            status: job.status,
            total: job.total,
            processed: job.processed,
            changed: job.changed,
            failed: job.failed,
        }
        .publish(&self.kernel.stream_hub)
        .await;
        Ok(job)
    }

    pub async fn status(&self, job_id: JobId) -> Result<JobStatusReport> {
        let pool = &self.kernel.db_pool;
        let job = EnrichmentJob::find_by_id(job_id, pool)
            .await
            .context("Job not found")?;
        let task_counts = EnrichmentTask::status_counts(job_id, pool)
            .await?
            .into_iter()
            .map(|(status, count)| TaskStatusCount { status, count })
            .collect();
        let recent_failures = EnrichmentTask::recent_failures(job_id, 10, pool)
            .await?
            .into_iter()
            .map(|t| TaskFailure {
                target_id: t.target_id,
                error: t.error_message,
            })
            .collect();
        Ok(JobStatusReport {
            job,
            task_counts,
            recent_failures,
        })
    }
}
