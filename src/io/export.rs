use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io::Write;

use crate::application::InventoryService;
use crate::domain::{Item, OwnerId, Transaction};

/// Everything one owner has, for backups and hand-offs
#[derive(Debug, Clone, Serialize)]
pub struct InventorySnapshot {
    pub version: String,
    pub exported_at: DateTime<Utc>,
    pub items: Vec<Item>,
    /// Oldest first
    pub transactions: Vec<Transaction>,
}

/// Exporter for converting inventory data to various formats
pub struct Exporter<'a> {
    service: &'a InventoryService,
}

impl<'a> Exporter<'a> {
    pub fn new(service: &'a InventoryService) -> Self {
        Self { service }
    }

    /// Export the owner's active items to CSV format
    pub async fn export_items_csv<W: Write>(&self, owner: OwnerId, writer: W) -> Result<usize> {
        let items = self.service.list_items(owner).await?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record(["sku", "name", "quantity", "location", "status", "category"])?;

        for item in &items {
            csv_writer.write_record([
                item.sku.as_str(),
                item.name.as_str(),
                &item.quantity().to_string(),
                item.location.as_str(),
                item.status().as_str(),
                item.category.as_deref().unwrap_or("N/A"),
            ])?;
        }

        csv_writer.flush()?;
        Ok(items.len())
    }

    /// Export the owner's full ledger to CSV format, oldest entry first
    pub async fn export_transactions_csv<W: Write>(
        &self,
        owner: OwnerId,
        writer: W,
    ) -> Result<usize> {
        let entries = self.service.list_all_transactions(owner).await?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record([
            "id",
            "sequence",
            "timestamp",
            "sku",
            "item_name",
            "kind",
            "quantity",
            "previous_quantity",
            "new_quantity",
            "note",
        ])?;

        for entry in &entries {
            csv_writer.write_record([
                entry.id.to_string(),
                entry.sequence.to_string(),
                entry.created_at.to_rfc3339(),
                entry.sku.clone(),
                entry.item_name.clone(),
                entry.kind.to_string(),
                entry.quantity.to_string(),
                entry.previous_quantity.to_string(),
                entry.new_quantity.to_string(),
                entry.note.clone().unwrap_or_default(),
            ])?;
        }

        csv_writer.flush()?;
        Ok(entries.len())
    }

    /// Export items and ledger as one JSON document
    pub async fn export_full_json<W: Write>(
        &self,
        owner: OwnerId,
        mut writer: W,
    ) -> Result<InventorySnapshot> {
        let snapshot = InventorySnapshot {
            version: env!("CARGO_PKG_VERSION").to_string(),
            exported_at: Utc::now(),
            items: self.service.list_items(owner).await?,
            transactions: self.service.list_all_transactions(owner).await?,
        };

        let json = serde_json::to_string_pretty(&snapshot)?;
        writer.write_all(json.as_bytes())?;
        writer.flush()?;

        Ok(snapshot)
    }
}
