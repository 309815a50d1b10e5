use chrono::Utc;
use tracing::{debug, info, instrument, warn};

use crate::domain::{
    Item, ItemId, ItemPatch, JsonQrCodec, NOTE_INITIAL_STOCK, NOTE_MANUAL_ADJUSTMENT,
    NOTE_QR_SCAN, NewItem, OwnerId, QrCodec, QrData, Quantity, ScanAction, StockStatus,
    Transaction, TransactionKind, ValidationErrors, normalize_sku, replay, scan_target,
    validate_scan,
};
use crate::storage::{Repository, is_unique_violation};

use super::reporting::{
    CategoryCount, InventorySummary, LedgerReport, StatusCount, reorder_alerts,
};
use super::AppError;

/// Number of entries returned by the recent-activity feed when no limit is given.
pub const DEFAULT_RECENT_LIMIT: usize = 50;

/// Application service owning items and their stock ledger.
/// This is the primary interface for any client (CLI, API, TUI, etc.).
///
/// Every operation takes the caller's identity explicitly and only ever
/// sees that caller's items.
pub struct InventoryService {
    repo: Repository,
    codec: Box<dyn QrCodec>,
}

/// Filter for querying the ledger
#[derive(Debug, Clone, Default)]
pub struct TransactionFilter {
    /// Only entries of this item (all of them unless `limit` is set)
    pub item: Option<ItemId>,
    pub limit: Option<usize>,
}

impl TransactionFilter {
    pub fn recent(limit: usize) -> Self {
        Self {
            item: None,
            limit: Some(limit),
        }
    }

    pub fn for_item(item: ItemId) -> Self {
        Self {
            item: Some(item),
            limit: None,
        }
    }
}

impl InventoryService {
    /// Create a new service with the given repository and the default codec.
    pub fn new(repo: Repository) -> Self {
        Self::with_codec(repo, Box::new(JsonQrCodec))
    }

    pub fn with_codec(repo: Repository, codec: Box<dyn QrCodec>) -> Self {
        Self { repo, codec }
    }

    /// Initialize a new database at the given path.
    pub async fn init(database_path: &str) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}?mode=rwc", database_path);
        let repo = Repository::init(&db_url).await?;
        Ok(Self::new(repo))
    }

    /// Connect to an existing database.
    pub async fn connect(database_path: &str) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}", database_path);
        let repo = Repository::connect(&db_url).await?;
        Ok(Self::new(repo))
    }

    pub fn codec(&self) -> &dyn QrCodec {
        self.codec.as_ref()
    }

    // ========================
    // Item operations
    // ========================

    /// Create an item and record its initial stock.
    #[instrument(skip(self, new_item), fields(sku = %new_item.sku))]
    pub async fn create_item(&self, owner: OwnerId, new_item: NewItem) -> Result<Item, AppError> {
        new_item.validate()?;

        let mut item = Item::new(owner, new_item);
        item.qr_payload = self.codec.encode(&QrData::for_item(&item))?;
        let mut entry =
            Transaction::record(&item, TransactionKind::Add, 0, owner, NOTE_INITIAL_STOCK);

        let mut tx = self.repo.begin().await?;
        if let Err(err) = self.repo.insert_item(&mut tx, &item).await {
            if is_unique_violation(&err) {
                warn!(sku = %item.sku, "SKU already in use");
                return Err(AppError::Conflict(item.sku));
            }
            return Err(err.into());
        }
        self.repo.append_transaction(&mut tx, &mut entry).await?;
        Repository::commit(tx).await?;

        info!(
            item_id = %item.id,
            sku = %item.sku,
            quantity = item.quantity(),
            status = %item.status(),
            "item created"
        );
        Ok(item)
    }

    /// Get one of the caller's items.
    pub async fn get_item(&self, owner: OwnerId, id: ItemId) -> Result<Item, AppError> {
        self.repo
            .find_item(owner, id, false)
            .await?
            .ok_or_else(|| AppError::not_found(id))
    }

    /// List the caller's items, newest first.
    pub async fn list_items(&self, owner: OwnerId) -> Result<Vec<Item>, AppError> {
        Ok(self.repo.list_items(owner).await?)
    }

    /// Search the caller's items by name, SKU or description.
    pub async fn search_items(&self, owner: OwnerId, query: &str) -> Result<Vec<Item>, AppError> {
        let query = query.trim();
        let mut errors = ValidationErrors::new();
        errors.check_length("query", "Search query", query, 1, 100);
        errors.into_result()?;

        let items = self.repo.search_items(owner, query).await?;
        debug!(query, matches = items.len(), "item search");
        Ok(items)
    }

    /// Merge `patch` into an item. A quantity change is recorded in the
    /// ledger in the same database transaction.
    #[instrument(skip(self, patch))]
    pub async fn update_item(
        &self,
        owner: OwnerId,
        id: ItemId,
        patch: ItemPatch,
    ) -> Result<Item, AppError> {
        let now = Utc::now();
        let mut tx = self.repo.begin().await?;
        let mut item = self
            .repo
            .lock_item(&mut tx, owner, id, now)
            .await?
            .ok_or_else(|| AppError::not_found(id))?;

        patch.validate_for(&item)?;

        if let Some(sku) = patch.sku.as_deref() {
            let sku = normalize_sku(sku);
            if sku != item.sku && self.repo.sku_taken(&mut tx, owner, &sku, item.id).await? {
                warn!(item_id = %item.id, sku = %sku, "SKU already in use");
                return Err(AppError::Conflict(sku));
            }
        }

        let previous_quantity = item.quantity();
        let relabel = patch.changes_label(&item);
        item.apply_patch(patch, now);
        if relabel {
            item.qr_payload = self.codec.encode(&QrData::for_item(&item))?;
        }

        match self.repo.save_item(&mut tx, &item, previous_quantity).await {
            Ok(true) => {}
            Ok(false) => {
                return Err(AppError::Storage(anyhow::anyhow!(
                    "Item {} changed while being updated",
                    id
                )));
            }
            Err(err) if is_unique_violation(&err) => return Err(AppError::Conflict(item.sku)),
            Err(err) => return Err(err.into()),
        }

        let entry = if item.quantity() != previous_quantity {
            let mut entry =
                Transaction::movement(&item, previous_quantity, owner, NOTE_MANUAL_ADJUSTMENT);
            self.repo.append_transaction(&mut tx, &mut entry).await?;
            Some(entry)
        } else {
            None
        };
        Repository::commit(tx).await?;

        match entry {
            Some(entry) => info!(
                item_id = %item.id,
                kind = %entry.kind,
                delta = entry.quantity,
                previous = entry.previous_quantity,
                new = entry.new_quantity,
                status = %item.status(),
                "item updated with stock change"
            ),
            None => info!(item_id = %item.id, status = %item.status(), "item updated"),
        }
        Ok(item)
    }

    /// Delete an item. It disappears from every item view; its ledger stays.
    #[instrument(skip(self))]
    pub async fn delete_item(&self, owner: OwnerId, id: ItemId) -> Result<(), AppError> {
        let now = Utc::now();
        let mut tx = self.repo.begin().await?;
        let item = self
            .repo
            .lock_item(&mut tx, owner, id, now)
            .await?
            .ok_or_else(|| AppError::not_found(id))?;
        self.repo.archive_item(&mut tx, item.id, now).await?;
        Repository::commit(tx).await?;

        info!(item_id = %item.id, sku = %item.sku, "item deleted");
        Ok(())
    }

    // ========================
    // Scanning
    // ========================

    /// Apply a scanner action to the caller's item with the given SKU.
    ///
    /// `view` is a plain read. `add`/`remove` move stock, stamp
    /// `last_scanned` and append a ledger entry. Removing more than is on
    /// hand empties the item rather than failing; the entry records the
    /// units actually removed.
    #[instrument(skip(self))]
    pub async fn apply_scan(
        &self,
        owner: OwnerId,
        sku: &str,
        action: ScanAction,
        quantity: Option<Quantity>,
    ) -> Result<Item, AppError> {
        let delta = validate_scan(sku, action, quantity)?;
        let sku = normalize_sku(sku);

        let Some(kind) = action.transaction_kind() else {
            let item = self
                .repo
                .find_item_by_sku(owner, &sku)
                .await?
                .ok_or_else(|| AppError::not_found(&sku))?;
            debug!(item_id = %item.id, "item viewed by scan");
            return Ok(item);
        };

        let now = Utc::now();
        let mut tx = self.repo.begin().await?;
        let mut item = self
            .repo
            .lock_item_by_sku(&mut tx, owner, &sku, now)
            .await?
            .ok_or_else(|| AppError::not_found(&sku))?;

        let previous_quantity = item.quantity();
        item.set_quantity(scan_target(previous_quantity, action, delta)?);
        item.last_scanned = Some(now);
        item.updated_at = now;

        if !self.repo.save_item(&mut tx, &item, previous_quantity).await? {
            return Err(AppError::Storage(anyhow::anyhow!(
                "Item {} changed while being scanned",
                item.id
            )));
        }
        let mut entry = Transaction::record(&item, kind, previous_quantity, owner, NOTE_QR_SCAN);
        self.repo.append_transaction(&mut tx, &mut entry).await?;
        Repository::commit(tx).await?;

        if entry.quantity < delta {
            info!(
                item_id = %item.id,
                requested = delta,
                removed = entry.quantity,
                "scan removal clamped at zero"
            );
        }
        info!(
            item_id = %item.id,
            action = %action,
            previous = previous_quantity,
            new = item.quantity(),
            status = %item.status(),
            "scan applied"
        );
        Ok(item)
    }

    /// Decode a scanned QR payload and apply the action to the item it names.
    pub async fn scan_payload(
        &self,
        owner: OwnerId,
        payload: &str,
        action: ScanAction,
        quantity: Option<Quantity>,
    ) -> Result<Item, AppError> {
        let sku = self.codec.decode(payload)?;
        self.apply_scan(owner, &sku, action, quantity).await
    }

    // ========================
    // Ledger
    // ========================

    /// List ledger entries, newest first.
    ///
    /// Without an item this is the recent-activity feed across the caller's
    /// items (deleted ones included). With an item it is that item's full
    /// history, which stays readable after the item is deleted.
    pub async fn list_transactions(
        &self,
        owner: OwnerId,
        filter: TransactionFilter,
    ) -> Result<Vec<Transaction>, AppError> {
        match filter.item {
            Some(item_id) => {
                self.repo
                    .find_item(owner, item_id, true)
                    .await?
                    .ok_or_else(|| AppError::not_found(item_id))?;
                let mut entries = self.repo.list_transactions_for_item(item_id).await?;
                if let Some(limit) = filter.limit {
                    entries.truncate(limit);
                }
                Ok(entries)
            }
            None => {
                let limit = filter.limit.unwrap_or(DEFAULT_RECENT_LIMIT);
                Ok(self.repo.list_recent_transactions(owner, limit).await?)
            }
        }
    }

    /// The caller's whole ledger, oldest first.
    pub async fn list_all_transactions(&self, owner: OwnerId) -> Result<Vec<Transaction>, AppError> {
        Ok(self.repo.list_all_transactions(owner).await?)
    }

    /// Replay an item's ledger and compare it with the stored quantity.
    pub async fn check_item_ledger(
        &self,
        owner: OwnerId,
        id: ItemId,
    ) -> Result<LedgerReport, AppError> {
        let item = self
            .repo
            .find_item(owner, id, true)
            .await?
            .ok_or_else(|| AppError::not_found(id))?;
        let mut entries = self.repo.list_transactions_for_item(id).await?;
        entries.reverse();

        let mut issues = Vec::new();
        let replayed_quantity = match replay(&entries) {
            Ok(quantity) => {
                if quantity != item.quantity() {
                    issues.push(format!(
                        "Ledger ends at {} but the item holds {}",
                        quantity,
                        item.quantity()
                    ));
                }
                Some(quantity)
            }
            Err(err) => {
                issues.push(err.to_string());
                None
            }
        };

        if !issues.is_empty() {
            warn!(item_id = %id, issues = issues.len(), "ledger inconsistent");
        }
        Ok(LedgerReport {
            item,
            entries,
            replayed_quantity,
            issues,
        })
    }

    // ========================
    // Reporting
    // ========================

    /// Counts and alerts for dashboards. Read-only.
    pub async fn inventory_summary(&self, owner: OwnerId) -> Result<InventorySummary, AppError> {
        let totals = self.repo.stock_totals(owner).await?;
        let status_counts = self.repo.count_by_status(owner).await?;
        let by_status = StockStatus::ALL
            .into_iter()
            .map(|status| StatusCount {
                status,
                count: status_counts
                    .iter()
                    .find(|(s, _)| *s == status)
                    .map(|(_, count)| *count)
                    .unwrap_or(0),
            })
            .collect();
        let by_category = self
            .repo
            .count_by_category(owner)
            .await?
            .into_iter()
            .map(|(category, count)| CategoryCount { category, count })
            .collect();
        let items = self.repo.list_items(owner).await?;

        Ok(InventorySummary {
            generated_at: Utc::now(),
            total_items: totals.items,
            total_units: totals.units,
            by_status,
            by_category,
            reorder_alerts: reorder_alerts(&items),
        })
    }
}
