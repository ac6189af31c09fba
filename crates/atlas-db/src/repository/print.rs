//! # Parked Print Job Repository
//!
//! Persistence for print jobs the operator chose to "queue for later".
//!
//! This is the durable subset of print state: the in-memory history ring in
//! the print manager is ephemeral, but a parked job must survive a restart
//! so the operator can drain it once the printer is back. The rendered
//! artifact is stored with the job so a reprint never depends on the
//! original order still being around.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use atlas_core::{PrintFormat, PrintJob, PrintJobStatus, PrintJobType};

// =============================================================================
// Row Mapping
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct PrintQueueRow {
    id: String,
    order_id: String,
    order_number: String,
    job_type: PrintJobType,
    format: PrintFormat,
    status: PrintJobStatus,
    retry_count: i64,
    max_retries: i64,
    error: Option<String>,
    artifact: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl PrintQueueRow {
    fn into_parts(self) -> (PrintJob, String) {
        let job = PrintJob {
            id: self.id,
            order_id: self.order_id,
            order_number: self.order_number,
            job_type: self.job_type,
            format: self.format,
            status: self.status,
            retry_count: self.retry_count as u32,
            max_retries: self.max_retries as u32,
            error: self.error,
            created_at: self.created_at,
            updated_at: self.updated_at,
        };
        (job, self.artifact)
    }
}

// =============================================================================
// Print Queue Repository
// =============================================================================

/// Repository for parked print jobs.
#[derive(Debug, Clone)]
pub struct PrintQueueRepository {
    pool: SqlitePool,
}

impl PrintQueueRepository {
    /// Creates a new PrintQueueRepository.
    pub fn new(pool: SqlitePool) -> Self {
        PrintQueueRepository { pool }
    }

    /// Parks a job with its rendered artifact. Upserts by job id, so
    /// re-parking after another failed drain refreshes the stored error.
    pub async fn park(&self, job: &PrintJob, artifact: &str) -> DbResult<()> {
        debug!(id = %job.id, order = %job.order_number, "Parking print job");

        sqlx::query(
            r#"
            INSERT INTO print_queue (
                id, order_id, order_number, job_type, format, status,
                retry_count, max_retries, error, artifact, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            ON CONFLICT (id) DO UPDATE SET
                status = ?6,
                retry_count = ?7,
                error = ?9,
                updated_at = ?12
            "#,
        )
        .bind(&job.id)
        .bind(&job.order_id)
        .bind(&job.order_number)
        .bind(job.job_type)
        .bind(job.format)
        .bind(job.status)
        .bind(job.retry_count as i64)
        .bind(job.max_retries as i64)
        .bind(&job.error)
        .bind(artifact)
        .bind(job.created_at)
        .bind(job.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// All parked jobs with their artifacts, oldest first.
    pub async fn list_parked(&self) -> DbResult<Vec<(PrintJob, String)>> {
        let rows: Vec<PrintQueueRow> = sqlx::query_as(
            r#"
            SELECT id, order_id, order_number, job_type, format, status,
                   retry_count, max_retries, error, artifact, created_at, updated_at
            FROM print_queue
            ORDER BY created_at ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(PrintQueueRow::into_parts).collect())
    }

    /// Removes a job from the parked queue (after a successful drain or an
    /// operator abandon).
    pub async fn remove(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM print_queue WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("PrintJob", id));
        }

        Ok(())
    }

    /// Number of parked jobs.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM print_queue")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    fn failed_job() -> PrintJob {
        let mut job = PrintJob::new(
            "ord-1",
            "A-1001",
            PrintJobType::Receipt,
            PrintFormat::Thermal,
            2,
        );
        job.status = PrintJobStatus::Queued;
        job.retry_count = 2;
        job.error = Some("printer unreachable".to_string());
        job
    }

    #[tokio::test]
    async fn test_park_and_list_roundtrip() {
        let db = test_db().await;
        let repo = db.print_queue();

        let job = failed_job();
        repo.park(&job, "RECEIPT A-1001\nTOTAL 5.00").await.unwrap();

        let parked = repo.list_parked().await.unwrap();
        assert_eq!(parked.len(), 1);

        let (loaded, artifact) = &parked[0];
        assert_eq!(loaded.id, job.id);
        assert_eq!(loaded.status, PrintJobStatus::Queued);
        assert_eq!(loaded.retry_count, 2);
        assert_eq!(artifact, "RECEIPT A-1001\nTOTAL 5.00");
    }

    #[tokio::test]
    async fn test_park_upserts_by_id() {
        let db = test_db().await;
        let repo = db.print_queue();

        let mut job = failed_job();
        repo.park(&job, "artifact").await.unwrap();

        job.error = Some("still unreachable".to_string());
        repo.park(&job, "artifact").await.unwrap();

        let parked = repo.list_parked().await.unwrap();
        assert_eq!(parked.len(), 1);
        assert_eq!(
            parked[0].0.error.as_deref(),
            Some("still unreachable")
        );
    }

    #[tokio::test]
    async fn test_remove() {
        let db = test_db().await;
        let repo = db.print_queue();

        let job = failed_job();
        repo.park(&job, "artifact").await.unwrap();
        assert_eq!(repo.count().await.unwrap(), 1);

        repo.remove(&job.id).await.unwrap();
        assert_eq!(repo.count().await.unwrap(), 0);

        assert!(matches!(
            repo.remove(&job.id).await,
            Err(DbError::NotFound { .. })
        ));
    }
}
