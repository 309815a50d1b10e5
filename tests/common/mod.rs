// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use anyhow::Result;
use stockroom::application::InventoryService;
use stockroom::domain::{Item, NewItem, OwnerId, Quantity};
use sqlx::SqlitePool;
use tempfile::TempDir;
use uuid::Uuid;

/// Helper to create a test service with a temporary database
pub async fn test_service() -> Result<(InventoryService, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let service = InventoryService::init(db_path.to_str().unwrap()).await?;
    Ok((service, temp_dir))
}

/// URL of the database created by `test_service`
pub fn database_url(temp_dir: &TempDir) -> String {
    format!("sqlite:{}", temp_dir.path().join("test.db").display())
}

/// A second, independent connection pool on the test database
pub async fn raw_pool(temp_dir: &TempDir) -> Result<SqlitePool> {
    Ok(SqlitePool::connect(&database_url(temp_dir)).await?)
}

/// A fresh caller identity
pub fn owner() -> OwnerId {
    Uuid::new_v4()
}

/// Create an item with the default reorder point (10)
pub async fn stock_item(
    service: &InventoryService,
    owner: OwnerId,
    sku: &str,
    quantity: Quantity,
) -> Result<Item> {
    let item = service
        .create_item(owner, NewItem::new(sku, "Widget", quantity, "Shelf A"))
        .await?;
    Ok(item)
}
