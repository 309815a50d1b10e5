use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, Sqlite, SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::domain::{
    Item, ItemId, OwnerId, Quantity, StockStatus, Transaction, TransactionKind, derive_status,
};

use super::MIGRATION_001_INITIAL;

/// How long a writer waits for another writer's lock before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const ITEM_COLUMNS: &str = "id, owner_id, sku, name, description, quantity, location, \
    reorder_point, supplier, category, purchase_date, expiry_date, qr_payload, status, \
    last_scanned, created_at, updated_at, deleted_at";

const TRANSACTION_COLUMNS: &str = "id, sequence, item_id, item_name, sku, kind, quantity, \
    previous_quantity, new_quantity, note, performed_by, created_at";

const DATE_FORMAT: &str = "%Y-%m-%d";

/// An open database transaction. Dropping it without `commit` rolls back.
pub type DbTransaction = sqlx::Transaction<'static, Sqlite>;

/// Item counts and total units for one owner.
#[derive(Debug, Clone, Copy, Default)]
pub struct StockTotals {
    pub items: i64,
    pub units: Quantity,
}

/// Returns true if the error (or anything it wraps) is a unique index violation.
pub fn is_unique_violation(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        matches!(
            cause.downcast_ref::<sqlx::Error>(),
            Some(sqlx::Error::Database(db)) if db.is_unique_violation()
        )
    })
}

/// Timestamps are stored as fixed-width RFC 3339 so they sort as text.
fn timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(value: &str, what: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(value)
        .with_context(|| format!("Invalid {} timestamp", what))?
        .with_timezone(&Utc))
}

fn parse_optional_date(value: Option<String>, what: &str) -> Result<Option<NaiveDate>> {
    value
        .map(|s| NaiveDate::parse_from_str(&s, DATE_FORMAT))
        .transpose()
        .with_context(|| format!("Invalid {}", what))
}

/// Escape LIKE wildcards so user input matches literally.
fn like_pattern(query: &str) -> String {
    let escaped = query
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

/// Repository for persisting and querying items and their ledger.
///
/// Reads go through the pool. Writes take an open transaction so the caller
/// can commit an item change and its ledger entry together.
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given SQLite connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to a SQLite database.
    /// The file is only created when the URL carries `mode=rwc`.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .context("Invalid database URL")?
            .busy_timeout(BUSY_TIMEOUT);
        let pool = SqlitePoolOptions::new()
            .connect_with(options)
            .await
            .context("Failed to connect to database")?;
        Ok(Self::new(pool))
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(MIGRATION_001_INITIAL)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 001")?;
        Ok(())
    }

    /// Initialize a new database (connect + migrate).
    pub async fn init(database_url: &str) -> Result<Self> {
        let repo = Self::connect(database_url).await?;
        repo.migrate().await?;
        Ok(repo)
    }

    /// Start a database transaction.
    pub async fn begin(&self) -> Result<DbTransaction> {
        self.pool
            .begin()
            .await
            .context("Failed to start database transaction")
    }

    pub async fn commit(tx: DbTransaction) -> Result<()> {
        tx.commit()
            .await
            .context("Failed to commit database transaction")
    }

    // ========================
    // Item writes
    // ========================

    /// Insert a new item.
    pub async fn insert_item(&self, conn: &mut SqliteConnection, item: &Item) -> Result<()> {
        let sql = format!(
            "INSERT INTO items ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            ITEM_COLUMNS
        );
        sqlx::query(&sql)
            .bind(item.id.to_string())
            .bind(item.owner.to_string())
            .bind(&item.sku)
            .bind(&item.name)
            .bind(&item.description)
            .bind(item.quantity())
            .bind(&item.location)
            .bind(item.reorder_point())
            .bind(&item.supplier)
            .bind(&item.category)
            .bind(item.purchase_date.map(|d| d.format(DATE_FORMAT).to_string()))
            .bind(item.expiry_date.map(|d| d.format(DATE_FORMAT).to_string()))
            .bind(&item.qr_payload)
            .bind(item.status().as_str())
            .bind(item.last_scanned.map(timestamp))
            .bind(timestamp(item.created_at))
            .bind(timestamp(item.updated_at))
            .bind(item.deleted_at.map(timestamp))
            .execute(&mut *conn)
            .await
            .context("Failed to save item")?;
        Ok(())
    }

    /// Load an active item for modification, taking the database write lock
    /// before the current quantity is read.
    ///
    /// The lookup is itself a write (it stamps `updated_at`), so concurrent
    /// writers queue on the lock instead of reading a quantity that is about
    /// to change.
    pub async fn lock_item(
        &self,
        conn: &mut SqliteConnection,
        owner: OwnerId,
        id: ItemId,
        now: DateTime<Utc>,
    ) -> Result<Option<Item>> {
        let sql = format!(
            "UPDATE items SET updated_at = ? \
             WHERE id = ? AND owner_id = ? AND deleted_at IS NULL \
             RETURNING {}",
            ITEM_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(timestamp(now))
            .bind(id.to_string())
            .bind(owner.to_string())
            .fetch_optional(&mut *conn)
            .await
            .context("Failed to lock item")?;

        row.as_ref().map(Self::row_to_item).transpose()
    }

    /// Same as [`Repository::lock_item`], looking the item up by SKU.
    pub async fn lock_item_by_sku(
        &self,
        conn: &mut SqliteConnection,
        owner: OwnerId,
        sku: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Item>> {
        let sql = format!(
            "UPDATE items SET updated_at = ? \
             WHERE sku = ? AND owner_id = ? AND deleted_at IS NULL \
             RETURNING {}",
            ITEM_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(timestamp(now))
            .bind(sku)
            .bind(owner.to_string())
            .fetch_optional(&mut *conn)
            .await
            .context("Failed to lock item by SKU")?;

        row.as_ref().map(Self::row_to_item).transpose()
    }

    /// Persist every mutable column of an item, provided its stored quantity
    /// is still `expected_quantity`. Returns false if nothing matched.
    pub async fn save_item(
        &self,
        conn: &mut SqliteConnection,
        item: &Item,
        expected_quantity: Quantity,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE items
            SET sku = ?, name = ?, description = ?, quantity = ?, location = ?,
                reorder_point = ?, supplier = ?, category = ?, purchase_date = ?,
                expiry_date = ?, qr_payload = ?, status = ?, last_scanned = ?, updated_at = ?
            WHERE id = ? AND quantity = ? AND deleted_at IS NULL
            "#,
        )
        .bind(&item.sku)
        .bind(&item.name)
        .bind(&item.description)
        .bind(item.quantity())
        .bind(&item.location)
        .bind(item.reorder_point())
        .bind(&item.supplier)
        .bind(&item.category)
        .bind(item.purchase_date.map(|d| d.format(DATE_FORMAT).to_string()))
        .bind(item.expiry_date.map(|d| d.format(DATE_FORMAT).to_string()))
        .bind(&item.qr_payload)
        .bind(item.status().as_str())
        .bind(item.last_scanned.map(timestamp))
        .bind(timestamp(item.updated_at))
        .bind(item.id.to_string())
        .bind(expected_quantity)
        .execute(&mut *conn)
        .await
        .context("Failed to update item")?;

        Ok(result.rows_affected() == 1)
    }

    /// Archive an item (soft delete). Its ledger is left untouched.
    pub async fn archive_item(
        &self,
        conn: &mut SqliteConnection,
        id: ItemId,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let now = timestamp(now);
        sqlx::query("UPDATE items SET deleted_at = ?, updated_at = ? WHERE id = ?")
            .bind(&now)
            .bind(&now)
            .bind(id.to_string())
            .execute(&mut *conn)
            .await
            .context("Failed to archive item")?;
        Ok(())
    }

    /// Check whether another active item of the owner already uses `sku`.
    pub async fn sku_taken(
        &self,
        conn: &mut SqliteConnection,
        owner: OwnerId,
        sku: &str,
        except: ItemId,
    ) -> Result<bool> {
        let count: i64 = sqlx::query(
            r#"
            SELECT COUNT(*) as count
            FROM items
            WHERE owner_id = ? AND sku = ? AND id != ? AND deleted_at IS NULL
            "#,
        )
        .bind(owner.to_string())
        .bind(sku)
        .bind(except.to_string())
        .fetch_one(&mut *conn)
        .await
        .context("Failed to check SKU")?
        .get("count");

        Ok(count > 0)
    }

    // ========================
    // Item reads
    // ========================

    /// Get an item by ID. Archived items are only returned when asked for.
    pub async fn find_item(
        &self,
        owner: OwnerId,
        id: ItemId,
        include_deleted: bool,
    ) -> Result<Option<Item>> {
        let sql = if include_deleted {
            format!("SELECT {} FROM items WHERE id = ? AND owner_id = ?", ITEM_COLUMNS)
        } else {
            format!(
                "SELECT {} FROM items WHERE id = ? AND owner_id = ? AND deleted_at IS NULL",
                ITEM_COLUMNS
            )
        };
        let row = sqlx::query(&sql)
            .bind(id.to_string())
            .bind(owner.to_string())
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch item")?;

        row.as_ref().map(Self::row_to_item).transpose()
    }

    /// Get an active item by SKU.
    pub async fn find_item_by_sku(&self, owner: OwnerId, sku: &str) -> Result<Option<Item>> {
        let sql = format!(
            "SELECT {} FROM items WHERE sku = ? AND owner_id = ? AND deleted_at IS NULL",
            ITEM_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(sku)
            .bind(owner.to_string())
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch item by SKU")?;

        row.as_ref().map(Self::row_to_item).transpose()
    }

    /// List an owner's active items, newest first.
    pub async fn list_items(&self, owner: OwnerId) -> Result<Vec<Item>> {
        let sql = format!(
            "SELECT {} FROM items WHERE owner_id = ? AND deleted_at IS NULL \
             ORDER BY created_at DESC, rowid DESC",
            ITEM_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(owner.to_string())
            .fetch_all(&self.pool)
            .await
            .context("Failed to list items")?;

        rows.iter().map(Self::row_to_item).collect()
    }

    /// Case-insensitive substring search over name, SKU and description.
    pub async fn search_items(&self, owner: OwnerId, query: &str) -> Result<Vec<Item>> {
        let sql = format!(
            "SELECT {} FROM items WHERE owner_id = ? AND deleted_at IS NULL \
             AND (name LIKE ? ESCAPE '\\' OR sku LIKE ? ESCAPE '\\' \
                  OR description LIKE ? ESCAPE '\\') \
             ORDER BY created_at DESC, rowid DESC",
            ITEM_COLUMNS
        );
        let pattern = like_pattern(query);
        let rows = sqlx::query(&sql)
            .bind(owner.to_string())
            .bind(&pattern)
            .bind(&pattern)
            .bind(&pattern)
            .fetch_all(&self.pool)
            .await
            .context("Failed to search items")?;

        rows.iter().map(Self::row_to_item).collect()
    }

    /// Count active items per stored status.
    pub async fn count_by_status(&self, owner: OwnerId) -> Result<Vec<(StockStatus, i64)>> {
        let rows = sqlx::query(
            r#"
            SELECT status, COUNT(*) as count
            FROM items
            WHERE owner_id = ? AND deleted_at IS NULL
            GROUP BY status
            "#,
        )
        .bind(owner.to_string())
        .fetch_all(&self.pool)
        .await
        .context("Failed to count items by status")?;

        rows.iter()
            .map(|row| -> Result<(StockStatus, i64)> {
                let status: String = row.get("status");
                let status = StockStatus::from_str(&status).map_err(anyhow::Error::msg)?;
                Ok((status, row.get::<i64, _>("count")))
            })
            .collect()
    }

    /// Count active items per category, largest first.
    pub async fn count_by_category(&self, owner: OwnerId) -> Result<Vec<(String, i64)>> {
        let rows = sqlx::query(
            r#"
            SELECT COALESCE(category, 'Uncategorized') as category, COUNT(*) as count
            FROM items
            WHERE owner_id = ? AND deleted_at IS NULL
            GROUP BY COALESCE(category, 'Uncategorized')
            ORDER BY count DESC, category
            "#,
        )
        .bind(owner.to_string())
        .fetch_all(&self.pool)
        .await
        .context("Failed to count items by category")?;

        Ok(rows
            .iter()
            .map(|row| (row.get("category"), row.get("count")))
            .collect())
    }

    /// Number of active items and the units they hold.
    /// The unit total saturates instead of overflowing.
    pub async fn stock_totals(&self, owner: OwnerId) -> Result<StockTotals> {
        let quantities: Vec<Quantity> = sqlx::query_scalar(
            r#"
            SELECT quantity
            FROM items
            WHERE owner_id = ? AND deleted_at IS NULL
            "#,
        )
        .bind(owner.to_string())
        .fetch_all(&self.pool)
        .await
        .context("Failed to compute stock totals")?;

        Ok(StockTotals {
            items: quantities.len() as i64,
            units: quantities
                .iter()
                .fold(0, |total: Quantity, q| total.saturating_add(*q)),
        })
    }

    fn row_to_item(row: &SqliteRow) -> Result<Item> {
        let id_str: String = row.get("id");
        let owner_str: String = row.get("owner_id");
        let quantity: Quantity = row.get("quantity");
        let reorder_point: Quantity = row.get("reorder_point");
        let last_scanned: Option<String> = row.get("last_scanned");
        let created_at: String = row.get("created_at");
        let updated_at: String = row.get("updated_at");
        let deleted_at: Option<String> = row.get("deleted_at");

        Ok(Item {
            id: Uuid::parse_str(&id_str).context("Invalid item ID")?,
            owner: Uuid::parse_str(&owner_str).context("Invalid owner ID")?,
            sku: row.get("sku"),
            name: row.get("name"),
            description: row.get("description"),
            quantity,
            location: row.get("location"),
            reorder_point,
            supplier: row.get("supplier"),
            category: row.get("category"),
            purchase_date: parse_optional_date(row.get("purchase_date"), "purchase date")?,
            expiry_date: parse_optional_date(row.get("expiry_date"), "expiry date")?,
            qr_payload: row.get("qr_payload"),
            status: derive_status(quantity, reorder_point),
            last_scanned: last_scanned
                .map(|s| parse_timestamp(&s, "last_scanned"))
                .transpose()?,
            created_at: parse_timestamp(&created_at, "created_at")?,
            updated_at: parse_timestamp(&updated_at, "updated_at")?,
            deleted_at: deleted_at
                .map(|s| parse_timestamp(&s, "deleted_at"))
                .transpose()?,
        })
    }

    // ========================
    // Ledger
    // ========================

    /// Append a ledger entry.
    /// Automatically assigns the next sequence number.
    pub async fn append_transaction(
        &self,
        conn: &mut SqliteConnection,
        entry: &mut Transaction,
    ) -> Result<()> {
        entry.sequence = self.next_sequence(conn).await?;

        let sql = format!(
            "INSERT INTO transactions ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            TRANSACTION_COLUMNS
        );
        sqlx::query(&sql)
            .bind(entry.id.to_string())
            .bind(entry.sequence)
            .bind(entry.item_id.to_string())
            .bind(&entry.item_name)
            .bind(&entry.sku)
            .bind(entry.kind.as_str())
            .bind(entry.quantity)
            .bind(entry.previous_quantity)
            .bind(entry.new_quantity)
            .bind(&entry.note)
            .bind(entry.performed_by.to_string())
            .bind(timestamp(entry.created_at))
            .execute(&mut *conn)
            .await
            .context("Failed to append transaction")?;

        Ok(())
    }

    /// Get the next sequence number and increment the counter.
    async fn next_sequence(&self, conn: &mut SqliteConnection) -> Result<i64> {
        let row = sqlx::query(
            r#"
            UPDATE sequence_counter
            SET value = value + 1
            WHERE name = 'transaction_sequence'
            RETURNING value
            "#,
        )
        .fetch_one(&mut *conn)
        .await
        .context("Failed to get next sequence number")?;

        Ok(row.get("value"))
    }

    /// All ledger entries of one item, newest first.
    pub async fn list_transactions_for_item(&self, item_id: ItemId) -> Result<Vec<Transaction>> {
        let sql = format!(
            "SELECT {} FROM transactions WHERE item_id = ? ORDER BY sequence DESC",
            TRANSACTION_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(item_id.to_string())
            .fetch_all(&self.pool)
            .await
            .context("Failed to list transactions for item")?;

        rows.iter().map(Self::row_to_transaction).collect()
    }

    /// The most recent entries across an owner's items, archived ones included.
    pub async fn list_recent_transactions(
        &self,
        owner: OwnerId,
        limit: usize,
    ) -> Result<Vec<Transaction>> {
        let sql = format!(
            "SELECT {} FROM transactions \
             WHERE item_id IN (SELECT id FROM items WHERE owner_id = ?) \
             ORDER BY sequence DESC LIMIT ?",
            TRANSACTION_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(owner.to_string())
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .context("Failed to list recent transactions")?;

        rows.iter().map(Self::row_to_transaction).collect()
    }

    /// The owner's whole ledger, oldest first.
    pub async fn list_all_transactions(&self, owner: OwnerId) -> Result<Vec<Transaction>> {
        let sql = format!(
            "SELECT {} FROM transactions \
             WHERE item_id IN (SELECT id FROM items WHERE owner_id = ?) \
             ORDER BY sequence",
            TRANSACTION_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(owner.to_string())
            .fetch_all(&self.pool)
            .await
            .context("Failed to list transactions")?;

        rows.iter().map(Self::row_to_transaction).collect()
    }

    fn row_to_transaction(row: &SqliteRow) -> Result<Transaction> {
        let id_str: String = row.get("id");
        let item_id_str: String = row.get("item_id");
        let kind_str: String = row.get("kind");
        let performed_by_str: String = row.get("performed_by");
        let created_at: String = row.get("created_at");

        Ok(Transaction {
            id: Uuid::parse_str(&id_str).context("Invalid transaction ID")?,
            sequence: row.get("sequence"),
            item_id: Uuid::parse_str(&item_id_str).context("Invalid item ID")?,
            item_name: row.get("item_name"),
            sku: row.get("sku"),
            kind: TransactionKind::from_str(&kind_str).map_err(anyhow::Error::msg)?,
            quantity: row.get("quantity"),
            previous_quantity: row.get("previous_quantity"),
            new_quantity: row.get("new_quantity"),
            note: row.get("note"),
            performed_by: Uuid::parse_str(&performed_by_str).context("Invalid performer ID")?,
            created_at: parse_timestamp(&created_at, "created_at")?,
        })
    }
}
