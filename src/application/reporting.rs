use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::{Item, ItemId, Quantity, StockStatus, Transaction};

/// Snapshot of one owner's stock for dashboards and reports.
#[derive(Debug, Clone, Serialize)]
pub struct InventorySummary {
    pub generated_at: DateTime<Utc>,
    pub total_items: i64,
    pub total_units: Quantity,
    /// One entry per status, in `StockStatus::ALL` order, zeros included
    pub by_status: Vec<StatusCount>,
    pub by_category: Vec<CategoryCount>,
    /// Items at or below their reorder point, critical first
    pub reorder_alerts: Vec<ReorderAlert>,
}

impl InventorySummary {
    pub fn count(&self, status: StockStatus) -> i64 {
        self.by_status
            .iter()
            .find(|entry| entry.status == status)
            .map(|entry| entry.count)
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct StatusCount {
    pub status: StockStatus,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryCount {
    pub category: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReorderAlert {
    pub item_id: ItemId,
    pub sku: String,
    pub name: String,
    pub status: StockStatus,
    pub quantity: Quantity,
    pub reorder_point: Quantity,
    /// Units needed to get back above the reorder point
    pub shortfall: Quantity,
}

impl ReorderAlert {
    pub fn for_item(item: &Item) -> Self {
        Self {
            item_id: item.id,
            sku: item.sku.clone(),
            name: item.name.clone(),
            status: item.status(),
            quantity: item.quantity(),
            reorder_point: item.reorder_point(),
            shortfall: item.reorder_point() - item.quantity() + 1,
        }
    }
}

/// Result of replaying one item's ledger against its stored quantity.
#[derive(Debug, Clone, Serialize)]
pub struct LedgerReport {
    pub item: Item,
    /// Entries oldest first
    pub entries: Vec<Transaction>,
    pub replayed_quantity: Option<Quantity>,
    pub issues: Vec<String>,
}

impl LedgerReport {
    pub fn is_consistent(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Build the alert list: low and critical items, critical first, then by
/// how far below the reorder point they are.
pub fn reorder_alerts(items: &[Item]) -> Vec<ReorderAlert> {
    let mut alerts: Vec<ReorderAlert> = items
        .iter()
        .filter(|item| item.status().needs_reorder())
        .map(ReorderAlert::for_item)
        .collect();
    alerts.sort_by(|a, b| {
        let rank = |s: StockStatus| if s == StockStatus::Critical { 0 } else { 1 };
        rank(a.status)
            .cmp(&rank(b.status))
            .then(b.shortfall.cmp(&a.shortfall))
            .then(a.sku.cmp(&b.sku))
    });
    alerts
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::domain::NewItem;

    fn item(sku: &str, quantity: Quantity) -> Item {
        Item::new(Uuid::new_v4(), NewItem::new(sku, "Widget", quantity, "Shelf"))
    }

    #[test]
    fn test_alerts_skip_healthy_and_empty_stock() {
        let items = vec![item("OK-1", 50), item("OUT-1", 0), item("LOW-1", 8)];
        let alerts = reorder_alerts(&items);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].sku, "LOW-1");
        assert_eq!(alerts[0].shortfall, 3);
    }

    #[test]
    fn test_alerts_put_critical_first() {
        let items = vec![item("LOW-1", 9), item("CRIT-1", 4), item("LOW-2", 6), item("CRIT-2", 1)];
        let skus: Vec<String> = reorder_alerts(&items).into_iter().map(|a| a.sku).collect();
        assert_eq!(skus, vec!["CRIT-2", "CRIT-1", "LOW-2", "LOW-1"]);
    }
}
