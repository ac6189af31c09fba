//! # Sale Queue Repository
//!
//! The durable offline sale queue: crash-safe, at-least-once-submission
//! storage for sale payloads captured while the terminal may be offline.
//!
//! ## The Commit Point
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Offline Sale Queue                                   │
//! │                                                                         │
//! │  checkout confirmation                                                  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  enqueue(payload)  ◄── synchronous, authoritative commit point          │
//! │       │                fails ONLY on local storage I/O error            │
//! │       ▼                                                                 │
//! │  sale_queue row (status = 'queued')                                     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SYNC ENGINE (async, best-effort)                                       │
//! │    list_pending() ─► mark_syncing ─► remote call ─► mark_synced         │
//! │                                          │                              │
//! │                                          └─► mark_failed / rejected     │
//! │                                                                         │
//! │  GUARANTEES:                                                            │
//! │  • an accepted payload is never silently lost                           │
//! │  • payloads are never merged, mutated, or reordered after enqueue       │
//! │  • transitions are CAS-guarded in SQL, atomic w.r.t. concurrent reads   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use atlas_core::{QueuedSale, SalePayload, SaleStatus};

// =============================================================================
// Row Mapping
// =============================================================================

/// Raw `sale_queue` row; the payload column holds immutable JSON.
#[derive(Debug, sqlx::FromRow)]
struct SaleQueueRow {
    id: String,
    payload: String,
    status: SaleStatus,
    retry_count: i64,
    last_error: Option<String>,
    queued_at: DateTime<Utc>,
    attempted_at: Option<DateTime<Utc>>,
    synced_at: Option<DateTime<Utc>>,
}

impl SaleQueueRow {
    fn into_queued_sale(self) -> DbResult<QueuedSale> {
        let payload: SalePayload = serde_json::from_str(&self.payload)?;
        Ok(QueuedSale {
            id: self.id,
            payload,
            status: self.status,
            retry_count: self.retry_count,
            last_error: self.last_error,
            queued_at: self.queued_at,
            attempted_at: self.attempted_at,
            synced_at: self.synced_at,
        })
    }
}

const SELECT_COLUMNS: &str = "id, payload, status, retry_count, last_error, \
     queued_at, attempted_at, synced_at";

// =============================================================================
// Sale Queue Repository
// =============================================================================

/// Repository for the durable sale queue.
#[derive(Debug, Clone)]
pub struct SaleQueueRepository {
    pool: SqlitePool,
}

impl SaleQueueRepository {
    /// Creates a new SaleQueueRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SaleQueueRepository { pool }
    }

    /// Accepts a sale payload into the queue.
    ///
    /// Assigns a new unique id (the idempotency token for the remote call)
    /// and persists synchronously. Never touches the network; the only
    /// failure mode is a local storage error, which callers must surface to
    /// the cashier because it means the sale was NOT captured.
    pub async fn enqueue(&self, payload: &SalePayload) -> DbResult<QueuedSale> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let payload_json = serde_json::to_string(payload)?;

        debug!(id = %id, "Enqueuing sale");

        sqlx::query(
            r#"
            INSERT INTO sale_queue (
                id, payload, status, retry_count, last_error,
                queued_at, attempted_at, synced_at
            ) VALUES (?1, ?2, 'queued', 0, NULL, ?3, NULL, NULL)
            "#,
        )
        .bind(&id)
        .bind(&payload_json)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(QueuedSale {
            id,
            payload: payload.clone(),
            status: SaleStatus::Queued,
            retry_count: 0,
            last_error: None,
            queued_at: now,
            attempted_at: None,
            synced_at: None,
        })
    }

    /// Gets a queue item by id.
    pub async fn get(&self, id: &str) -> DbResult<Option<QueuedSale>> {
        let row: Option<SaleQueueRow> = sqlx::query_as(&format!(
            "SELECT {SELECT_COLUMNS} FROM sale_queue WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(SaleQueueRow::into_queued_sale).transpose()
    }

    /// Items a drain should pick up: queued or failed, FIFO by enqueue time.
    ///
    /// Rejected items are deliberately excluded; they re-enter the queue
    /// only through [`Self::requeue_rejected`].
    pub async fn list_pending(&self, limit: u32) -> DbResult<Vec<QueuedSale>> {
        let rows: Vec<SaleQueueRow> = sqlx::query_as(&format!(
            r#"
            SELECT {SELECT_COLUMNS} FROM sale_queue
            WHERE status IN ('queued', 'failed')
            ORDER BY queued_at ASC
            LIMIT ?1
            "#
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(SaleQueueRow::into_queued_sale)
            .collect()
    }

    /// Items parked by a remote business-rule rejection, newest first.
    pub async fn list_rejected(&self, limit: u32) -> DbResult<Vec<QueuedSale>> {
        let rows: Vec<SaleQueueRow> = sqlx::query_as(&format!(
            r#"
            SELECT {SELECT_COLUMNS} FROM sale_queue
            WHERE status = 'rejected'
            ORDER BY queued_at DESC
            LIMIT ?1
            "#
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(SaleQueueRow::into_queued_sale)
            .collect()
    }

    /// Claims an item for submission: Queued|Failed → Syncing.
    ///
    /// The status guard lives in the `WHERE` clause, so two overlapping
    /// drains can never both claim the same item; the loser gets
    /// [`DbError::InvalidTransition`] and must skip it.
    pub async fn mark_syncing(&self, id: &str) -> DbResult<()> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE sale_queue SET
                status = 'syncing',
                attempted_at = ?2
            WHERE id = ?1 AND status IN ('queued', 'failed')
            "#,
        )
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::invalid_transition("QueuedSale", id, "syncing"));
        }

        Ok(())
    }

    /// Records remote confirmation: Syncing → Synced.
    pub async fn mark_synced(&self, id: &str) -> DbResult<()> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE sale_queue SET
                status = 'synced',
                last_error = NULL,
                synced_at = ?2
            WHERE id = ?1 AND status = 'syncing'
            "#,
        )
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::invalid_transition("QueuedSale", id, "synced"));
        }

        Ok(())
    }

    /// Records a transport failure: Syncing → Failed, retry count bumped,
    /// error string retained for operator inspection.
    pub async fn mark_failed(&self, id: &str, error: &str) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE sale_queue SET
                status = 'failed',
                retry_count = retry_count + 1,
                last_error = ?2
            WHERE id = ?1 AND status = 'syncing'
            "#,
        )
        .bind(id)
        .bind(error)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::invalid_transition("QueuedSale", id, "failed"));
        }

        Ok(())
    }

    /// Records a remote business-rule rejection: Syncing → Rejected.
    /// Rejected items never re-enter automatic drains.
    pub async fn mark_rejected(&self, id: &str, error: &str) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE sale_queue SET
                status = 'rejected',
                retry_count = retry_count + 1,
                last_error = ?2
            WHERE id = ?1 AND status = 'syncing'
            "#,
        )
        .bind(id)
        .bind(error)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::invalid_transition("QueuedSale", id, "rejected"));
        }

        Ok(())
    }

    /// Explicit operator action: Rejected → Queued, eligible for the next
    /// drain again.
    pub async fn requeue_rejected(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE sale_queue SET
                status = 'queued'
            WHERE id = ?1 AND status = 'rejected'
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::invalid_transition("QueuedSale", id, "queued"));
        }

        Ok(())
    }

    /// Removes a confirmed item. Optional; history may be retained instead.
    pub async fn remove(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM sale_queue WHERE id = ?1 AND status = 'synced'")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("QueuedSale (synced)", id));
        }

        Ok(())
    }

    /// Counts items a drain would pick up.
    pub async fn count_pending(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sale_queue WHERE status IN ('queued', 'failed')",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    /// Deletes synced items older than the retention window.
    ///
    /// Returns the number of deleted rows. Failed and rejected items are
    /// never cleaned up automatically.
    pub async fn cleanup_synced(&self, days_old: u32) -> DbResult<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM sale_queue
            WHERE status = 'synced'
            AND synced_at < datetime('now', '-' || ?1 || ' days')
            "#,
        )
        .bind(days_old)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

// =============================================================================
// Tests
// =============================================================================
