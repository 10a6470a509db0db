//! Task queue: one row per (job, target), claimed in batches.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::common::{JobId, TaskId};

use super::job::truncate_error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, Default)]
#[sqlx(type_name = "enrichment_task_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    InProgress,
    Done,
    Failed,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct EnrichmentTask {
    pub id: TaskId,
    pub job_id: JobId,
    /// The listing or vendor this task processes
    pub target_id: Uuid,
    pub status: TaskStatus,
    /// Whether processing wrote anything to the target
    pub changed: bool,
    /// Handler-specific outcome detail (verdict, amenities added, ...)
    pub result: Option<Value>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EnrichmentTask {
    /// Fan out one pending task per target. The unique (job_id, target_id)
    /// index plus ON CONFLICT DO NOTHING makes re-running fan-out a no-op,
    /// so a crash between insert batches cannot duplicate work.
    pub async fn fan_out(job_id: JobId, target_ids: &[Uuid], pool: &PgPool) -> Result<u64> {
        if target_ids.is_empty() {
            return Ok(0);
        }
        let result = sqlx::query(
            "INSERT INTO enrichment_tasks (id, job_id, target_id, status)
             SELECT gen_random_uuid(), $1, t.target_id, 'pending'
             FROM UNNEST($2::uuid[]) AS t(target_id)
             ON CONFLICT (job_id, target_id) DO NOTHING",
        )
        .bind(job_id)
        .bind(target_ids)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Claim up to `limit` pending tasks, marking them in progress.
    ///
    /// FOR UPDATE SKIP LOCKED keeps concurrent claimers from blocking on or
    /// double-claiming the same rows.
    pub async fn claim_batch(job_id: JobId, limit: i64, pool: &PgPool) -> Result<Vec<Self>> {
        let tasks = sqlx::query_as::<_, Self>(
            "UPDATE enrichment_tasks
             SET status = 'in_progress', updated_at = NOW()
             WHERE id IN (
                 SELECT id FROM enrichment_tasks
                 WHERE job_id = $1 AND status = 'pending'
                 ORDER BY created_at, id
                 LIMIT $2
                 FOR UPDATE SKIP LOCKED
             )
             RETURNING *",
        )
        .bind(job_id)
        .bind(limit)
        .fetch_all(pool)
        .await?;
        Ok(tasks)
    }

    pub async fn complete(
        id: TaskId,
        changed: bool,
        result: Option<Value>,
        pool: &PgPool,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE enrichment_tasks
             SET status = 'done', changed = $1, result = $2, updated_at = NOW()
             WHERE id = $3",
        )
        .bind(changed)
        .bind(result)
        .bind(id)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn fail(id: TaskId, error: &str, pool: &PgPool) -> Result<()> {
        sqlx::query(
            "UPDATE enrichment_tasks
             SET status = 'failed', error_message = $1, updated_at = NOW()
             WHERE id = $2",
        )
        .bind(truncate_error(error))
        .bind(id)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn count_pending(job_id: JobId, pool: &PgPool) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM enrichment_tasks WHERE job_id = $1 AND status = 'pending'",
        )
        .bind(job_id)
        .fetch_one(pool)
        .await?;
        Ok(count)
    }

    /// Per-status tallies for a job, used by the status endpoint.
    pub async fn status_counts(job_id: JobId, pool: &PgPool) -> Result<Vec<(TaskStatus, i64)>> {
        let rows = sqlx::query_as::<_, (TaskStatus, i64)>(
            "SELECT status, COUNT(*) FROM enrichment_tasks
             WHERE job_id = $1 GROUP BY status",
        )
        .bind(job_id)
        .fetch_all(pool)
        .await?;
        Ok(rows)
    }

    /// Recent failures for a job, newest first.
    pub async fn recent_failures(job_id: JobId, limit: i64, pool: &PgPool) -> Result<Vec<Self>> {
        let tasks = sqlx::query_as::<_, Self>(
            "SELECT * FROM enrichment_tasks
             WHERE job_id = $1 AND status = 'failed'
             ORDER BY updated_at DESC
             LIMIT $2",
        )
        .bind(job_id)
        .bind(limit)
        .fetch_all(pool)
        .await?;
        Ok(tasks)
    }
}
