//! Pipeline runner: the chunked, self-rescheduling control loop.
//!
//! Each invocation does a bounded amount of work: re-read the job status
//! (cooperative pause/cancel), claim one chunk of tasks, process them with
//! bounded concurrency, bump the ledger counters, publish a progress frame,
//! and hand off to a fresh invocation via `tokio::spawn`. Nothing loops
//! forever in one call; an in-flight chunk finishes even after a cancel, at
//! most one chunk of wasted work.
//!
//! Item failures are swallowed at the item boundary and surfaced through the
//! task row and the `failed` counter. A chunk-level error marks the whole
//! job failed.

use std::sync::Arc;

use anyhow::{Context, Result};
use futures::future::BoxFuture;
use futures::StreamExt;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::common::JobId;
use crate::kernel::ServerKernel;

use super::events::JobEvent;
use super::models::{EnrichmentJob, EnrichmentTask, JobStatus};
use super::registry::SharedHandlerRegistry;

/// Change records carried per progress frame, at most.
const MAX_FRAME_UPDATES: usize = 50;

pub struct JobRunner {
    kernel: Arc<ServerKernel>,
    registry: SharedHandlerRegistry,
}

impl JobRunner {
    pub fn new(kernel: Arc<ServerKernel>, registry: SharedHandlerRegistry) -> Self {
        Self { kernel, registry }
    }

    /// Kick off a job's first chunk in the background and return immediately.
    pub fn start(self: Arc<Self>, job_id: JobId) {
        self.spawn_chunk(job_id, 1);
    }

    fn spawn_chunk(self: Arc<Self>, job_id: JobId, batch: i64) {
        let runner = self;
        tokio::spawn(async move {
            if let Err(e) = runner.clone().run_chunk(job_id, batch).await {
                error!(job_id = %job_id, batch, error = %format!("{:#}", e), "chunk failed");
                runner.fail_job(job_id, &format!("{:#}", e)).await;
            }
        });
    }

    /// Boxed so the future type does not contain itself through the spawn.
    fn run_chunk(self: Arc<Self>, job_id: JobId, batch: i64) -> BoxFuture<'static, Result<()>> {
        Box::pin(async move {
            let pool = &self.kernel.db_pool;
            let job = EnrichmentJob::find_by_id(job_id, pool)
                .await
                .context("Job not found")?;

            // Cooperative cancel/pause: a non-running job schedules nothing
            if job.status != JobStatus::Running {
                debug!(job_id = %job_id, status = ?job.status, "job not running, stopping");
                return Ok(());
            }

            let handler = self.registry.get(job.kind)?;
            let tasks = EnrichmentTask::claim_batch(job_id, self.kernel.enrichment.chunk_size, pool)
                .await
                .context("Failed to claim tasks")?;

            if tasks.is_empty() {
                EnrichmentJob::mark_done(job_id, pool).await?;
                let job = EnrichmentJob::find_by_id(job_id, pool).await?;
                info!(
                    job_id = %job_id,
                    kind = %job.kind,
                    processed = job.processed,
                    changed = job.changed,
                    failed = job.failed,
                    "job done"
                );
                self.publish_done(&job).await;
                return Ok(());
            }

            debug!(job_id = %job_id, batch, count = tasks.len(), "processing chunk");

            let outcomes: Vec<(bool, bool, Option<Value>)> = futures::stream::iter(tasks)
                .map(|task| {
                    let handler = handler.clone();
                    let kernel = self.kernel.clone();
                    async move {
                        match handler.process(task.target_id, &kernel).await {
                            Ok(outcome) => {
                                if let Err(e) = EnrichmentTask::complete(
                                    task.id,
                                    outcome.changed,
                                    outcome.result.clone(),
                                    &kernel.db_pool,
                                )
                                .await
                                {
                                    error!(task_id = %task.id, error = %e, "failed to record task result");
                                    return (false, true, None);
                                }
                                let update = if outcome.changed { outcome.result } else { None };
                                (outcome.changed, false, update)
                            }
                            Err(e) => {
                                warn!(
                                    task_id = %task.id,
                                    target_id = %task.target_id,
                                    error = %format!("{:#}", e),
                                    "task failed"
                                );
                                if let Err(mark_err) =
                                    EnrichmentTask::fail(task.id, &format!("{:#}", e), &kernel.db_pool)
                                        .await
                                {
                                    error!(task_id = %task.id, error = %mark_err, "failed to mark task failed");
                                }
                                (false, true, None)
                            }
                        }
                    }
                })
                .buffer_unordered(self.kernel.enrichment.concurrency)
                .collect()
                .await;

            let processed = outcomes.len() as i64;
            let changed = outcomes.iter().filter(|(c, _, _)| *c).count() as i64;
            let failed = outcomes.iter().filter(|(_, f, _)| *f).count() as i64;
            let updates: Vec<Value> = outcomes
                .into_iter()
                .filter_map(|(_, _, update)| update)
                .take(MAX_FRAME_UPDATES)
                .collect();

            EnrichmentJob::increment_counters(job_id, processed, changed, failed, pool)
                .await
                .context("Failed to update job counters")?;

            let job = EnrichmentJob::find_by_id(job_id, pool).await?;
            let chunk_size = self.kernel.enrichment.chunk_size.max(1);
            JobEvent::Progress {
                job_id,
                kind: job.kind,
                total: job.total,
                processed: job.processed,
                changed: job.changed,
                failed: job.failed,
                batch,
                total_batches: (job.total + chunk_size - 1) / chunk_size,
                updates,
            }
            .publish(&self.kernel.stream_hub)
            .await;

            // Hand off to a fresh invocation rather than looping here
            self.spawn_chunk(job_id, batch + 1);
            Ok(())
        })
    }

    async fn fail_job(&self, job_id: JobId, error: &str) {
        let pool = &self.kernel.db_pool;
        if let Err(e) = EnrichmentJob::mark_failed(job_id, error, pool).await {
            error!(job_id = %job_id, error = %e, "failed to mark job failed");
            return;
        }
        if let Ok(job) = EnrichmentJob::find_by_id(job_id, pool).await {
            JobEvent::BatchError {
                job_id,
                kind: job.kind,
                error: error.to_string(),
            }
            .publish(&self.kernel.stream_hub)
            .await;
            self.publish_done(&job).await;
        }
    }

    async fn publish_done(&self, job: &EnrichmentJob) {
        JobEvent::Done {
            job_id: job.id,
            kind: job.kind,
            status: job.status,
            total: job.total,
            processed: job.processed,
            changed: job.changed,
            failed: job.failed,
        }
        .publish(&self.kernel.stream_hub)
        .await;
    }
}
