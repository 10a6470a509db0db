//! Job ledger: one row per enrichment run.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use typed_builder::TypedBuilder;

use crate::common::JobId;

/// Longest error message stored on a job row.
const MAX_ERROR_LEN: usize = 500;

// ============================================================================
// Enums
// ============================================================================

/// The job families the pipeline runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "enrichment_job_kind", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// Touchless classification over unclassified listings
    Classification,
    /// Amenity extraction over listings with websites
    AmenityBackfill,
    /// Canonical brand-name cleanup over vendors
    VendorNameCleanup,
    /// Short description generation for listings missing one
    DescriptionGeneration,
    /// Fill missing listing websites from chain site maps
    ChainUrlBackfill,
    /// Hero photo selection and rehosting
    HeroPhotoSelection,
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobKind::Classification => write!(f, "classification"),
            JobKind::AmenityBackfill => write!(f, "amenity_backfill"),
            JobKind::VendorNameCleanup => write!(f, "vendor_name_cleanup"),
            JobKind::DescriptionGeneration => write!(f, "description_generation"),
            JobKind::ChainUrlBackfill => write!(f, "chain_url_backfill"),
            JobKind::HeroPhotoSelection => write!(f, "hero_photo_selection"),
        }
    }
}

impl std::str::FromStr for JobKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "classification" => Ok(JobKind::Classification),
            "amenity_backfill" => Ok(JobKind::AmenityBackfill),
            "vendor_name_cleanup" => Ok(JobKind::VendorNameCleanup),
            "description_generation" => Ok(JobKind::DescriptionGeneration),
            "chain_url_backfill" => Ok(JobKind::ChainUrlBackfill),
            "hero_photo_selection" => Ok(JobKind::HeroPhotoSelection),
            _ => Err(anyhow::anyhow!("Invalid job kind: {}", s)),
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, Default,
)]
#[sqlx(type_name = "enrichment_job_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    #[default]
    Pending,
    Running,
    Paused,
    Done,
    Failed,
    Cancelled,
}

impl JobStatus {
    /// Whether the job can move to `next`.
    ///
    /// Transitions form a DAG with one backward edge (`paused -> running`);
    /// nothing returns to `pending` once running has started.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, next),
            (Pending, Running)
                | (Pending, Cancelled)
                | (Running, Paused)
                | (Running, Done)
                | (Running, Failed)
                | (Running, Cancelled)
                | (Paused, Running)
                | (Paused, Cancelled)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Failed | JobStatus::Cancelled)
    }
}

// ============================================================================
// Job Model
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, TypedBuilder)]
#[builder(field_defaults(setter(into)))]
pub struct EnrichmentJob {
    #[builder(default = JobId::new())]
    pub id: JobId,
    pub kind: JobKind,

    #[builder(default)]
    pub status: JobStatus,

    // Aggregate counters — monotonically non-decreasing within a run
    #[builder(default = 0)]
    pub total: i64,
    #[builder(default = 0)]
    pub processed: i64,
    #[builder(default = 0)]
    pub changed: i64,
    #[builder(default = 0)]
    pub failed: i64,

    #[builder(default, setter(strip_option))]
    pub error_message: Option<String>,

    #[builder(default, setter(strip_option))]
    pub started_at: Option<DateTime<Utc>>,
    #[builder(default, setter(strip_option))]
    pub finished_at: Option<DateTime<Utc>>,

    #[builder(default = Utc::now())]
    pub created_at: DateTime<Utc>,
    #[builder(default = Utc::now())]
    pub updated_at: DateTime<Utc>,
}

impl EnrichmentJob {
    /// Create a pending job for a run of `kind` over `total` targets.
    pub fn new(kind: JobKind, total: i64) -> Self {
        Self::builder().kind(kind).total(total).build()
    }

    pub async fn find_by_id(id: JobId, pool: &PgPool) -> Result<Self> {
        let job = sqlx::query_as::<_, Self>("SELECT * FROM enrichment_jobs WHERE id = $1")
            .bind(id)
            .fetch_one(pool)
            .await?;
        Ok(job)
    }

    /// The active (non-terminal) job of a kind, if one exists.
    ///
    /// Used by the one-job-per-kind check before starting a run. The
    /// check-then-insert race is a tolerated minor risk, not a guarantee.
    pub async fn find_active_by_kind(kind: JobKind, pool: &PgPool) -> Result<Option<Self>> {
        let job = sqlx::query_as::<_, Self>(
            "SELECT * FROM enrichment_jobs
             WHERE kind = $1 AND status IN ('pending', 'running', 'paused')
             ORDER BY created_at DESC
             LIMIT 1",
        )
        .bind(kind)
        .fetch_optional(pool)
        .await?;
        Ok(job)
    }

    pub async fn insert(&self, pool: &PgPool) -> Result<Self> {
        let job = sqlx::query_as::<_, Self>(
            "INSERT INTO enrichment_jobs
                 (id, kind, status, total, processed, changed, failed,
                  error_message, started_at, finished_at, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
             RETURNING *",
        )
        .bind(self.id)
        .bind(self.kind)
        .bind(self.status)
        .bind(self.total)
        .bind(self.processed)
        .bind(self.changed)
        .bind(self.failed)
        .bind(&self.error_message)
        .bind(self.started_at)
        .bind(self.finished_at)
        .bind(self.created_at)
        .bind(self.updated_at)
        .fetch_one(pool)
        .await?;
        Ok(job)
    }

    /// Atomically add to the counters. Deltas are non-negative, so counters
    /// only move forward.
    pub async fn increment_counters(
        id: JobId,
        processed: i64,
        changed: i64,
        failed: i64,
        pool: &PgPool,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE enrichment_jobs
             SET processed = processed + $1,
                 changed = changed + $2,
                 failed = failed + $3,
                 updated_at = NOW()
             WHERE id = $4",
        )
        .bind(processed)
        .bind(changed)
        .bind(failed)
        .bind(id)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Move a pending or paused job to running.
    pub async fn mark_running(id: JobId, pool: &PgPool) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE enrichment_jobs
             SET status = 'running',
                 started_at = COALESCE(started_at, NOW()),
                 updated_at = NOW()
             WHERE id = $1 AND status IN ('pending', 'paused')",
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Pause a running job. Takes effect at the next chunk boundary.
    pub async fn mark_paused(id: JobId, pool: &PgPool) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE enrichment_jobs
             SET status = 'paused', updated_at = NOW()
             WHERE id = $1 AND status = 'running'",
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn mark_done(id: JobId, pool: &PgPool) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE enrichment_jobs
             SET status = 'done', finished_at = NOW(), updated_at = NOW()
             WHERE id = $1 AND status = 'running'",
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Mark the whole job failed with a truncated error message.
    pub async fn mark_failed(id: JobId, error: &str, pool: &PgPool) -> Result<()> {
        sqlx::query(
            "UPDATE enrichment_jobs
             SET status = 'failed',
                 error_message = $1,
                 finished_at = NOW(),
                 updated_at = NOW()
             WHERE id = $2 AND status NOT IN ('done', 'cancelled')",
        )
        .bind(truncate_error(error))
        .bind(id)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Cancel a job: flips the job and all of its still-pending tasks in one
    /// transaction. An in-flight chunk notices at its next boundary check.
    pub async fn cancel(id: JobId, pool: &PgPool) -> Result<bool> {
        let mut tx = pool.begin().await?;

        let result = sqlx::query(
            "UPDATE enrichment_jobs
             SET status = 'cancelled', finished_at = NOW(), updated_at = NOW()
             WHERE id = $1 AND status IN ('pending', 'running', 'paused')",
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query(
            "UPDATE enrichment_tasks
             SET status = 'cancelled', updated_at = NOW()
             WHERE job_id = $1 AND status = 'pending'",
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }
}

/// Truncate an error message to what fits in the ledger column.
pub fn truncate_error(error: &str) -> String {
    if error.len() <= MAX_ERROR_LEN {
        return error.to_string();
    }
    let mut end = MAX_ERROR_LEN;
    while !error.is_char_boundary(end) {
        end -= 1;
    }
    error[..end].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_job_starts_pending_with_zero_counters() {
        let job = EnrichmentJob::new(JobKind::Classification, 200);
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.total, 200);
        assert_eq!(job.processed, 0);
        assert_eq!(job.failed, 0);
    }

    #[test]
    fn status_dag_has_no_edge_back_to_pending() {
        for status in [
            JobStatus::Running,
            JobStatus::Paused,
            JobStatus::Done,
            JobStatus::Failed,
            JobStatus::Cancelled,
        ] {
            assert!(!status.can_transition_to(JobStatus::Pending));
        }
    }

    #[test]
    fn paused_to_running_is_the_only_backward_edge() {
        assert!(JobStatus::Paused.can_transition_to(JobStatus::Running));
        assert!(!JobStatus::Done.can_transition_to(JobStatus::Running));
        assert!(!JobStatus::Cancelled.can_transition_to(JobStatus::Running));
    }

    #[test]
    fn terminal_states_admit_no_transitions() {
        for terminal in [JobStatus::Done, JobStatus::Failed, JobStatus::Cancelled] {
            assert!(terminal.is_terminal());
            for next in [
                JobStatus::Pending,
                JobStatus::Running,
                JobStatus::Paused,
                JobStatus::Done,
                JobStatus::Failed,
                JobStatus::Cancelled,
            ] {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn job_kind_roundtrips_through_strings() {
        for kind in [
            JobKind::Classification,
            JobKind::AmenityBackfill,
            JobKind::VendorNameCleanup,
            JobKind::DescriptionGeneration,
            JobKind::ChainUrlBackfill,
            JobKind::HeroPhotoSelection,
        ] {
            let parsed: JobKind = kind.to_string().parse().unwrap();
            assert_eq!(parsed, kind);
        }
    }

    #[test]
    fn truncate_error_bounds_length() {
        let long = "x".repeat(2000);
        assert_eq!(truncate_error(&long).len(), 500);
        assert_eq!(truncate_error("short"), "short");
    }
}
