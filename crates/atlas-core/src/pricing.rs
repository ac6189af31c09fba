//! # Pricing Snapshot and Merge
//!
//! The local materialized copy of pricing reference data and the merge
//! routine that keeps it current from full-snapshot or delta responses.
//!
//! ## Merge Order (fixed, not interchangeable)
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Delta Merge Pipeline                               │
//! │                                                                         │
//! │  1. TOMBSTONES   remove every local item whose id is in                 │
//! │                  deleted_item_ids                                       │
//! │        │                                                                │
//! │        ▼                                                                │
//! │  2. UPSERT       replace-or-insert the delta's lists and items by id    │
//! │        │                                                                │
//! │        ▼                                                                │
//! │  3. ALLOCATIONS  union the customer → list-id map, new entries          │
//! │                  overwrite by key                                       │
//! │        │                                                                │
//! │        ▼                                                                │
//! │  4. CURSOR       advance to the response cursor                         │
//! │                                                                         │
//! │  GUARD: response cursor == stored cursor → the whole merge is a no-op   │
//! │         (protects against duplicate delivery / replay)                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Tombstones run before the upsert, so an id present in both
//! `deleted_item_ids` and `items` ends up present: the deletion removes the
//! stale entry and the upsert installs the new one.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Price List / Item
// =============================================================================

/// Who a price list applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum ListScope {
    /// Applies to every customer.
    Global,
    /// Applies only to customers allocated to the list.
    Customer,
}

/// A price list record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceList {
    pub id: String,
    pub name: String,
    /// Higher priority wins when several lists cover the same SKU.
    pub priority: i64,
    pub scope: ListScope,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
    pub is_active: bool,
}

/// A SKU-level price entry. Belongs to exactly one list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceItem {
    pub id: String,
    pub list_id: String,
    pub sku: String,
    pub unit_price_cents: i64,
}

/// Customer id → price-list ids granting access.
pub type CustomerAllocations = BTreeMap<String, Vec<String>>;

// =============================================================================
// Pricing Update (wire shape)
// =============================================================================

/// A pricing sync response, either a full snapshot or a delta.
///
/// For a full snapshot `deleted_item_ids` is empty and the payload replaces
/// local state wholesale. For a delta the payload is merged per the fixed
/// pipeline above.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingUpdate {
    /// Opaque sync marker; stored only after the merge is persisted.
    pub cursor: String,
    pub is_delta: bool,
    pub lists: Vec<PriceList>,
    pub items: Vec<PriceItem>,
    pub customer_allocations: CustomerAllocations,
    #[serde(default)]
    pub deleted_item_ids: Vec<String>,
}

// =============================================================================
// Pricing Snapshot
// =============================================================================

/// Result of applying a [`PricingUpdate`] to a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The snapshot changed and must be persisted together with the cursor.
    Applied,
    /// The response cursor equals the stored cursor; nothing changed.
    AlreadyCurrent,
}

/// The local materialized copy of pricing reference data.
///
/// Created empty at first boot, replaced wholesale on a full sync, patched
/// on a delta sync. Mutated only through [`PricingSnapshot::apply`]; the
/// persistence layer writes the merged state and the cursor atomically.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PricingSnapshot {
    pub lists: Vec<PriceList>,
    pub items: Vec<PriceItem>,
    pub customer_allocations: CustomerAllocations,
    /// Absent until the first successful sync.
    pub cursor: Option<String>,
}

impl PricingSnapshot {
    /// The state of a terminal that has never synced.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Applies a sync response to this snapshot.
    ///
    /// Returns [`MergeOutcome::AlreadyCurrent`] without touching anything
    /// when the response cursor equals the stored cursor.
    pub fn apply(&mut self, update: &PricingUpdate) -> MergeOutcome {
        if self.cursor.as_deref() == Some(update.cursor.as_str()) {
            return MergeOutcome::AlreadyCurrent;
        }

        if update.is_delta {
            self.apply_delta(update);
        } else {
            self.apply_full(update);
        }

        self.cursor = Some(update.cursor.clone());
        MergeOutcome::Applied
    }

    /// Full snapshot: local state is replaced wholesale.
    fn apply_full(&mut self, update: &PricingUpdate) {
        self.lists = update.lists.clone();
        self.items = update.items.clone();
        self.customer_allocations = update.customer_allocations.clone();
    }

    /// Delta: tombstones, then upsert-by-id, then allocation union.
    fn apply_delta(&mut self, update: &PricingUpdate) {
        // 1. Tombstones. Absence from a delta does not imply deletion, so
        //    only ids listed here are removed.
        if !update.deleted_item_ids.is_empty() {
            self.items
                .retain(|item| !update.deleted_item_ids.contains(&item.id));
        }

        // 2. Upsert changed/added lists and items by id. An id present both
        //    locally and in the delta is replaced, never duplicated.
        for list in &update.lists {
            match self.lists.iter_mut().find(|l| l.id == list.id) {
                Some(existing) => *existing = list.clone(),
                None => self.lists.push(list.clone()),
            }
        }
        for item in &update.items {
            match self.items.iter_mut().find(|i| i.id == item.id) {
                Some(existing) => *existing = item.clone(),
                None => self.items.push(item.clone()),
            }
        }

        // 3. Allocation union; incoming entries overwrite by customer id.
        for (customer_id, list_ids) in &update.customer_allocations {
            self.customer_allocations
                .insert(customer_id.clone(), list_ids.clone());
        }
    }

    /// Price lists a customer may buy from: every active global list plus
    /// the customer's allocated lists.
    pub fn lists_for_customer(&self, customer_id: Option<&str>) -> Vec<&PriceList> {
        let allocated: &[String] = customer_id
            .and_then(|id| self.customer_allocations.get(id))
            .map(Vec::as_slice)
            .unwrap_or(&[]);

        self.lists
            .iter()
            .filter(|l| {
                l.is_active
                    && (matches!(l.scope, ListScope::Global) || allocated.contains(&l.id))
            })
            .collect()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn list(id: &str, priority: i64) -> PriceList {
        PriceList {
            id: id.to_string(),
            name: format!("List {id}"),
            priority,
            scope: ListScope::Global,
            valid_from: None,
            valid_until: None,
            is_active: true,
        }
    }

    fn item(id: &str, list_id: &str, cents: i64) -> PriceItem {
        PriceItem {
            id: id.to_string(),
            list_id: list_id.to_string(),
            sku: format!("sku-{id}"),
            unit_price_cents: cents,
        }
    }

    fn full_update(cursor: &str) -> PricingUpdate {
        PricingUpdate {
            cursor: cursor.to_string(),
            is_delta: false,
            lists: vec![list("l1", 10)],
            items: vec![item("sku-1", "l1", 500), item("sku-3", "l1", 300)],
            customer_allocations: BTreeMap::from([(
                "cust-1".to_string(),
                vec!["l1".to_string()],
            )]),
            deleted_item_ids: vec![],
        }
    }

    #[test]
    fn test_full_sync_replaces_wholesale() {
        let mut snapshot = PricingSnapshot::empty();
        snapshot.items = vec![item("stale", "l0", 1)];

        let outcome = snapshot.apply(&full_update("t1"));

        assert_eq!(outcome, MergeOutcome::Applied);
        assert_eq!(snapshot.cursor.as_deref(), Some("t1"));
        assert_eq!(snapshot.items.len(), 2);
        assert!(snapshot.items.iter().all(|i| i.id != "stale"));
    }

    #[test]
    fn test_delta_removes_tombstoned_and_adds_new() {
        let mut snapshot = PricingSnapshot::empty();
        snapshot.apply(&full_update("t1"));

        let delta = PricingUpdate {
            cursor: "t2".to_string(),
            is_delta: true,
            lists: vec![],
            items: vec![item("sku-2", "l1", 700)],
            customer_allocations: BTreeMap::new(),
            deleted_item_ids: vec!["sku-1".to_string()],
        };
        let outcome = snapshot.apply(&delta);

        assert_eq!(outcome, MergeOutcome::Applied);
        let ids: Vec<&str> = snapshot.items.iter().map(|i| i.id.as_str()).collect();
        assert!(!ids.contains(&"sku-1"));
        assert!(ids.contains(&"sku-2"));
        assert!(ids.contains(&"sku-3"));
        assert_eq!(snapshot.cursor.as_deref(), Some("t2"));
    }

    #[test]
    fn test_same_cursor_is_noop() {
        let mut snapshot = PricingSnapshot::empty();
        snapshot.apply(&full_update("t1"));
        let before = snapshot.clone();

        // Replayed delivery carries the cursor we already hold.
        let mut replay = full_update("t1");
        replay.items.push(item("sku-9", "l1", 999));
        let outcome = snapshot.apply(&replay);

        assert_eq!(outcome, MergeOutcome::AlreadyCurrent);
        assert_eq!(snapshot, before);
    }

    #[test]
    fn test_tombstone_then_upsert_order() {
        let mut snapshot = PricingSnapshot::empty();
        snapshot.apply(&full_update("t1"));

        // Same id deleted and re-sent: deletion applies first, then the
        // upsert installs the new entry.
        let delta = PricingUpdate {
            cursor: "t2".to_string(),
            is_delta: true,
            lists: vec![],
            items: vec![item("sku-1", "l1", 650)],
            customer_allocations: BTreeMap::new(),
            deleted_item_ids: vec!["sku-1".to_string()],
        };
        snapshot.apply(&delta);

        let survivors: Vec<&PriceItem> =
            snapshot.items.iter().filter(|i| i.id == "sku-1").collect();
        assert_eq!(survivors.len(), 1);
        assert_eq!(survivors[0].unit_price_cents, 650);
    }

    #[test]
    fn test_delta_upserts_changed_item_without_duplicating() {
        let mut snapshot = PricingSnapshot::empty();
        snapshot.apply(&full_update("t1"));

        let delta = PricingUpdate {
            cursor: "t2".to_string(),
            is_delta: true,
            lists: vec![list("l1", 20)],
            items: vec![item("sku-3", "l1", 350)],
            customer_allocations: BTreeMap::new(),
            deleted_item_ids: vec![],
        };
        snapshot.apply(&delta);

        assert_eq!(snapshot.items.iter().filter(|i| i.id == "sku-3").count(), 1);
        assert_eq!(
            snapshot.items.iter().find(|i| i.id == "sku-3").unwrap().unit_price_cents,
            350
        );
        assert_eq!(snapshot.lists.len(), 1);
        assert_eq!(snapshot.lists[0].priority, 20);
    }

    #[test]
    fn test_allocation_union_overwrites_by_key() {
        let mut snapshot = PricingSnapshot::empty();
        snapshot.apply(&full_update("t1"));

        let delta = PricingUpdate {
            cursor: "t2".to_string(),
            is_delta: true,
            lists: vec![],
            items: vec![],
            customer_allocations: BTreeMap::from([
                ("cust-1".to_string(), vec!["l2".to_string()]),
                ("cust-2".to_string(), vec!["l1".to_string()]),
            ]),
            deleted_item_ids: vec![],
        };
        snapshot.apply(&delta);

        assert_eq!(
            snapshot.customer_allocations.get("cust-1"),
            Some(&vec!["l2".to_string()])
        );
        assert_eq!(
            snapshot.customer_allocations.get("cust-2"),
            Some(&vec!["l1".to_string()])
        );
    }

    #[test]
    fn test_lists_for_customer() {
        let mut snapshot = PricingSnapshot::empty();
        let mut customer_list = list("l2", 50);
        customer_list.scope = ListScope::Customer;
        let mut inactive = list("l3", 99);
        inactive.is_active = false;

        snapshot.lists = vec![list("l1", 10), customer_list, inactive];
        snapshot
            .customer_allocations
            .insert("cust-1".to_string(), vec!["l2".to_string()]);

        let anon: Vec<&str> = snapshot
            .lists_for_customer(None)
            .iter()
            .map(|l| l.id.as_str())
            .collect();
        assert_eq!(anon, vec!["l1"]);

        let cust: Vec<&str> = snapshot
            .lists_for_customer(Some("cust-1"))
            .iter()
            .map(|l| l.id.as_str())
            .collect();
        assert_eq!(cust, vec!["l1", "l2"]);
    }
}
