//! # Pricing Snapshot Repository
//!
//! Persists the local materialized copy of pricing reference data together
//! with its sync cursor.
//!
//! ## Atomicity
//! The cursor and the data it describes are written in ONE transaction. A
//! crash between "data stored" and "cursor stored" would otherwise leave
//! the cursor ahead of the data, and the next delta sync would silently
//! skip changes forever. The merge itself is pure logic in `atlas-core`;
//! this repository only loads and stores whole snapshots.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;
use atlas_core::{CustomerAllocations, ListScope, PriceItem, PriceList, PricingSnapshot};

/// `sync_state` key under which the pricing cursor is stored.
const PRICING_CURSOR_KEY: &str = "pricing";

// =============================================================================
// Row Mapping
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct PriceListRow {
    id: String,
    name: String,
    priority: i64,
    scope: ListScope,
    valid_from: Option<DateTime<Utc>>,
    valid_until: Option<DateTime<Utc>>,
    is_active: bool,
}

impl From<PriceListRow> for PriceList {
    fn from(row: PriceListRow) -> Self {
        PriceList {
            id: row.id,
            name: row.name,
            priority: row.priority,
            scope: row.scope,
            valid_from: row.valid_from,
            valid_until: row.valid_until,
            is_active: row.is_active,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PriceItemRow {
    id: String,
    list_id: String,
    sku: String,
    unit_price_cents: i64,
}

impl From<PriceItemRow> for PriceItem {
    fn from(row: PriceItemRow) -> Self {
        PriceItem {
            id: row.id,
            list_id: row.list_id,
            sku: row.sku,
            unit_price_cents: row.unit_price_cents,
        }
    }
}

// =============================================================================
// Pricing Repository
// =============================================================================

/// Repository for the pricing snapshot and its cursor.
#[derive(Debug, Clone)]
pub struct PricingRepository {
    pool: SqlitePool,
}

impl PricingRepository {
    /// Creates a new PricingRepository.
    pub fn new(pool: SqlitePool) -> Self {
        PricingRepository { pool }
    }

    /// Loads the whole snapshot, cursor included.
    ///
    /// A terminal that has never synced gets an empty snapshot with no
    /// cursor, which steers the sync manager to a full fetch.
    pub async fn load(&self) -> DbResult<PricingSnapshot> {
        let list_rows: Vec<PriceListRow> = sqlx::query_as(
            "SELECT id, name, priority, scope, valid_from, valid_until, is_active \
             FROM price_lists ORDER BY priority DESC, id",
        )
        .fetch_all(&self.pool)
        .await?;

        let item_rows: Vec<PriceItemRow> = sqlx::query_as(
            "SELECT id, list_id, sku, unit_price_cents FROM price_items ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        let allocation_rows: Vec<(String, String)> = sqlx::query_as(
            "SELECT customer_id, list_id FROM customer_allocations ORDER BY customer_id, list_id",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut customer_allocations = CustomerAllocations::new();
        for (customer_id, list_id) in allocation_rows {
            customer_allocations
                .entry(customer_id)
                .or_default()
                .push(list_id);
        }

        let cursor = self.cursor().await?;

        Ok(PricingSnapshot {
            lists: list_rows.into_iter().map(PriceList::from).collect(),
            items: item_rows.into_iter().map(PriceItem::from).collect(),
            customer_allocations,
            cursor,
        })
    }

    /// Reads just the stored cursor.
    pub async fn cursor(&self) -> DbResult<Option<String>> {
        let cursor: Option<Option<String>> =
            sqlx::query_scalar("SELECT cursor FROM sync_state WHERE key = ?1")
                .bind(PRICING_CURSOR_KEY)
                .fetch_optional(&self.pool)
                .await?;

        Ok(cursor.flatten())
    }

    /// Replaces the stored snapshot, cursor included, in one transaction.
    ///
    /// Used after every successful merge (full or delta); the merged state
    /// is computed in memory first, so the store never holds a partially
    /// merged snapshot.
    pub async fn replace(&self, snapshot: &PricingSnapshot) -> DbResult<()> {
        let now = Utc::now();

        debug!(
            lists = snapshot.lists.len(),
            items = snapshot.items.len(),
            cursor = ?snapshot.cursor,
            "Persisting pricing snapshot"
        );

        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM price_lists").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM price_items").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM customer_allocations")
            .execute(&mut *tx)
            .await?;

        for list in &snapshot.lists {
            sqlx::query(
                r#"
                INSERT INTO price_lists (
                    id, name, priority, scope, valid_from, valid_until, is_active
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
            )
            .bind(&list.id)
            .bind(&list.name)
            .bind(list.priority)
            .bind(list.scope)
            .bind(list.valid_from)
            .bind(list.valid_until)
            .bind(list.is_active)
            .execute(&mut *tx)
            .await?;
        }

        for item in &snapshot.items {
            sqlx::query(
                r#"
                INSERT INTO price_items (id, list_id, sku, unit_price_cents)
                VALUES (?1, ?2, ?3, ?4)
                "#,
            )
            .bind(&item.id)
            .bind(&item.list_id)
            .bind(&item.sku)
            .bind(item.unit_price_cents)
            .execute(&mut *tx)
            .await?;
        }

        for (customer_id, list_ids) in &snapshot.customer_allocations {
            for list_id in list_ids {
                sqlx::query(
                    "INSERT INTO customer_allocations (customer_id, list_id) VALUES (?1, ?2)",
                )
                .bind(customer_id)
                .bind(list_id)
                .execute(&mut *tx)
                .await?;
            }
        }

        sqlx::query(
            r#"
            INSERT INTO sync_state (key, cursor, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT (key) DO UPDATE SET cursor = ?2, updated_at = ?3
            "#,
        )
        .bind(PRICING_CURSOR_KEY)
        .bind(&snapshot.cursor)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use atlas_core::{MergeOutcome, PricingUpdate};
    use std::collections::BTreeMap;

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    fn snapshot(cursor: &str) -> PricingSnapshot {
        PricingSnapshot {
            lists: vec![PriceList {
                id: "l1".to_string(),
                name: "Standard".to_string(),
                priority: 10,
                scope: ListScope::Global,
                valid_from: None,
                valid_until: None,
                is_active: true,
            }],
            items: vec![PriceItem {
                id: "sku-1".to_string(),
                list_id: "l1".to_string(),
                sku: "COKE-330".to_string(),
                unit_price_cents: 250,
            }],
            customer_allocations: BTreeMap::from([(
                "cust-1".to_string(),
                vec!["l1".to_string()],
            )]),
            cursor: Some(cursor.to_string()),
        }
    }

    #[tokio::test]
    async fn test_first_boot_is_empty_with_no_cursor() {
        let db = test_db().await;
        let repo = db.pricing();

        let loaded = repo.load().await.unwrap();
        assert!(loaded.lists.is_empty());
        assert!(loaded.items.is_empty());
        assert!(loaded.cursor.is_none());
    }

    #[tokio::test]
    async fn test_replace_and_load_roundtrip() {
        let db = test_db().await;
        let repo = db.pricing();

        let stored = snapshot("2026-01-31T10:00:00Z");
        repo.replace(&stored).await.unwrap();

        let loaded = repo.load().await.unwrap();
        assert_eq!(loaded.lists, stored.lists);
        assert_eq!(loaded.items, stored.items);
        assert_eq!(loaded.customer_allocations, stored.customer_allocations);
        assert_eq!(loaded.cursor, stored.cursor);
    }

    #[tokio::test]
    async fn test_replace_is_wholesale() {
        let db = test_db().await;
        let repo = db.pricing();

        repo.replace(&snapshot("t1")).await.unwrap();

        let mut next = snapshot("t2");
        next.items[0].id = "sku-2".to_string();
        next.items[0].sku = "FANTA-330".to_string();
        repo.replace(&next).await.unwrap();

        let loaded = repo.load().await.unwrap();
        assert_eq!(loaded.items.len(), 1);
        assert_eq!(loaded.items[0].id, "sku-2");
        assert_eq!(loaded.cursor.as_deref(), Some("t2"));
    }

    #[tokio::test]
    async fn test_merge_then_persist_keeps_cursor_with_data() {
        let db = test_db().await;
        let repo = db.pricing();

        repo.replace(&snapshot("t1")).await.unwrap();

        // Apply a delta the way the sync manager does: load, merge in
        // memory, store the result in one transaction.
        let mut current = repo.load().await.unwrap();
        let delta = PricingUpdate {
            cursor: "t2".to_string(),
            is_delta: true,
            lists: vec![],
            items: vec![PriceItem {
                id: "sku-2".to_string(),
                list_id: "l1".to_string(),
                sku: "FANTA-330".to_string(),
                unit_price_cents: 300,
            }],
            customer_allocations: BTreeMap::new(),
            deleted_item_ids: vec!["sku-1".to_string()],
        };
        assert_eq!(current.apply(&delta), MergeOutcome::Applied);
        repo.replace(&current).await.unwrap();

        let loaded = repo.load().await.unwrap();
        let ids: Vec<&str> = loaded.items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["sku-2"]);
        assert_eq!(loaded.cursor.as_deref(), Some("t2"));
    }
}
