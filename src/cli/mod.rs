use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use uuid::Uuid;

use crate::application::{InventoryService, TransactionFilter};
use crate::domain::{Item, ItemId, ItemPatch, NewItem, OwnerId, Quantity, ScanAction};

/// Stockroom - Inventory Ledger
#[derive(Parser)]
#[command(name = "stockroom")]
#[command(about = "A local-first inventory tracker with QR scanning and a stock ledger")]
#[command(version)]
pub struct Cli {
    /// Database file path
    #[arg(short, long, env = "STOCKROOM_DATABASE", default_value = "stockroom.db")]
    pub database: String,

    /// Id of the user acting on the inventory
    #[arg(long, env = "STOCKROOM_OWNER", global = true)]
    pub owner: Option<Uuid>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new database
    Init,

    /// Item management commands
    #[command(subcommand)]
    Item(ItemCommands),

    /// Apply a scanner action to an item
    Scan {
        /// SKU, or the scanned QR payload with --payload
        code: String,

        /// Action: view, add, remove
        #[arg(short, long, default_value = "view")]
        action: ScanAction,

        /// Units to add or remove
        #[arg(short, long)]
        quantity: Option<Quantity>,

        /// Treat CODE as a QR payload instead of a SKU
        #[arg(long)]
        payload: bool,
    },

    /// Show stock movements, newest first
    History {
        /// Only movements of this item
        #[arg(long)]
        item: Option<ItemId>,

        /// Maximum number of movements to show
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Replay an item's ledger and compare it with its stock
    Check {
        /// Item ID
        id: ItemId,
    },

    /// Inventory summary with reorder alerts
    Report {
        /// Output format: table, json
        #[arg(long, default_value = "table")]
        format: String,
    },

    /// Export data to CSV or JSON
    Export {
        /// What to export: items, transactions, full
        export_type: String,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum ItemCommands {
    /// Create a new item
    Add {
        /// Stock-keeping unit (letters, digits, - and _)
        sku: String,

        /// Item name
        name: String,

        /// Units on hand
        #[arg(short, long, default_value = "0")]
        quantity: Quantity,

        /// Where the item is stored
        #[arg(short, long)]
        location: String,

        /// Stock level at which to reorder (default: 10)
        #[arg(long)]
        reorder_point: Option<Quantity>,

        #[arg(short, long)]
        description: Option<String>,

        #[arg(long)]
        supplier: Option<String>,

        #[arg(short, long)]
        category: Option<String>,

        /// Purchase date (YYYY-MM-DD)
        #[arg(long)]
        purchase_date: Option<NaiveDate>,

        /// Expiry date (YYYY-MM-DD)
        #[arg(long)]
        expiry_date: Option<NaiveDate>,
    },

    /// List items, newest first
    List,

    /// Show item details
    Show {
        /// Item ID
        id: ItemId,
    },

    /// Search items by name, SKU or description
    Search {
        query: String,
    },

    /// Update item fields (an empty string clears optional text)
    Update {
        /// Item ID
        id: ItemId,

        #[arg(long)]
        sku: Option<String>,

        #[arg(long)]
        name: Option<String>,

        /// Set the stock level; the change is recorded in the ledger
        #[arg(short, long)]
        quantity: Option<Quantity>,

        #[arg(short, long)]
        location: Option<String>,

        #[arg(long)]
        reorder_point: Option<Quantity>,

        #[arg(short, long)]
        description: Option<String>,

        #[arg(long)]
        supplier: Option<String>,

        #[arg(short, long)]
        category: Option<String>,

        #[arg(long)]
        purchase_date: Option<NaiveDate>,

        #[arg(long)]
        expiry_date: Option<NaiveDate>,
    },

    /// Delete an item (its movement history is kept)
    Delete {
        /// Item ID
        id: ItemId,
    },

    /// Print the QR payload of an item
    Qr {
        /// Item ID
        id: ItemId,
    },
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        let Cli {
            database,
            owner,
            command,
            ..
        } = self;

        let command = match command {
            Commands::Init => {
                InventoryService::init(&database).await?;
                println!("Database initialized: {}", database);
                return Ok(());
            }
            command => command,
        };

        let owner: OwnerId =
            owner.context("No owner given. Pass --owner <UUID> or set STOCKROOM_OWNER")?;
        let service = InventoryService::connect(&database)
            .await
            .with_context(|| format!("Failed to open database: {}", database))?;

        match command {
            Commands::Init => {}

            Commands::Item(item_cmd) => {
                run_item_command(&service, owner, item_cmd).await?;
            }

            Commands::Scan {
                code,
                action,
                quantity,
                payload,
            } => {
                let item = if payload {
                    service.scan_payload(owner, &code, action, quantity).await?
                } else {
                    service.apply_scan(owner, &code, action, quantity).await?
                };
                match action {
                    ScanAction::View => print_item(&item),
                    _ => println!(
                        "{} {}: {} on hand ({})",
                        item.sku,
                        item.name,
                        item.quantity(),
                        item.status()
                    ),
                }
            }

            Commands::History { item, limit } => {
                run_history_command(&service, owner, TransactionFilter { item, limit }).await?;
            }

            Commands::Check { id } => {
                run_check_command(&service, owner, id).await?;
            }

            Commands::Report { format } => {
                run_report_command(&service, owner, &format).await?;
            }

            Commands::Export {
                export_type,
                output,
            } => {
                run_export_command(&service, owner, &export_type, output.as_deref()).await?;
            }
        }

        Ok(())
    }
}

async fn run_item_command(
    service: &InventoryService,
    owner: OwnerId,
    cmd: ItemCommands,
) -> Result<()> {
    match cmd {
        ItemCommands::Add {
            sku,
            name,
            quantity,
            location,
            reorder_point,
            description,
            supplier,
            category,
            purchase_date,
            expiry_date,
        } => {
            let fields = NewItem {
                sku,
                name,
                description,
                quantity,
                location,
                reorder_point,
                supplier,
                category,
                purchase_date,
                expiry_date,
            };
            let item = service.create_item(owner, fields).await?;
            println!("Created item: {} {} ({})", item.sku, item.name, item.id);
            println!("  Stock: {} ({})", item.quantity(), item.status());
        }

        ItemCommands::List => {
            let items = service.list_items(owner).await?;
            print_item_table(&items);
        }

        ItemCommands::Show { id } => {
            let item = service.get_item(owner, id).await?;
            print_item(&item);
        }

        ItemCommands::Search { query } => {
            let items = service.search_items(owner, &query).await?;
            print_item_table(&items);
        }

        ItemCommands::Update {
            id,
            sku,
            name,
            quantity,
            location,
            reorder_point,
            description,
            supplier,
            category,
            purchase_date,
            expiry_date,
        } => {
            let patch = ItemPatch {
                sku,
                name,
                description,
                quantity,
                location,
                reorder_point,
                supplier,
                category,
                purchase_date,
                expiry_date,
            };
            if patch.is_empty() {
                anyhow::bail!("Nothing to update. Pass at least one field to change");
            }
            let item = service.update_item(owner, id, patch).await?;
            println!("Updated item: {} {}", item.sku, item.name);
            println!("  Stock: {} ({})", item.quantity(), item.status());
        }

        ItemCommands::Delete { id } => {
            service.delete_item(owner, id).await?;
            println!("Deleted item: {}", id);
        }

        ItemCommands::Qr { id } => {
            let item = service.get_item(owner, id).await?;
            println!("{}", item.qr_payload);
        }
    }
    Ok(())
}

async fn run_history_command(
    service: &InventoryService,
    owner: OwnerId,
    filter: TransactionFilter,
) -> Result<()> {
    let entries = service.list_transactions(owner, filter).await?;

    if entries.is_empty() {
        println!("No stock movements found.");
        return Ok(());
    }

    println!(
        "{:<17} {:<12} {:<7} {:>6} {:>13} NOTE",
        "DATE", "SKU", "KIND", "QTY", "STOCK"
    );
    println!("{}", "-".repeat(72));
    for entry in &entries {
        println!(
            "{:<17} {:<12} {:<7} {:>6} {:>13} {}",
            entry.created_at.format("%Y-%m-%d %H:%M"),
            truncate(&entry.sku, 12),
            entry.kind.as_str(),
            entry.quantity,
            format!("{} -> {}", entry.previous_quantity, entry.new_quantity),
            entry.note.as_deref().unwrap_or("")
        );
    }
    Ok(())
}

async fn run_check_command(service: &InventoryService, owner: OwnerId, id: ItemId) -> Result<()> {
    println!("Checking ledger of item {}...\n", id);

    let report = service.check_item_ledger(owner, id).await?;

    if report.item.is_deleted() {
        println!("Item:      {} {} (deleted)", report.item.sku, report.item.name);
    } else {
        println!("Item:      {} {}", report.item.sku, report.item.name);
    }
    println!("Entries:   {}", report.entries.len());
    println!("Stock:     {}", report.item.quantity());
    match report.replayed_quantity {
        Some(quantity) => println!("Replayed:  {}", quantity),
        None => println!("Replayed:  -"),
    }
    println!();

    if report.is_consistent() {
        println!("Ledger is consistent.");
    } else {
        println!("Issues found:");
        for issue in &report.issues {
            println!("  - {}", issue);
        }
        anyhow::bail!("Ledger check failed");
    }

    Ok(())
}

async fn run_report_command(service: &InventoryService, owner: OwnerId, format: &str) -> Result<()> {
    let summary = service.inventory_summary(owner).await?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        "table" => {
            println!("Inventory Summary");
            println!("{}", "=".repeat(40));
            println!("Items: {}", summary.total_items);
            println!("Units: {}", summary.total_units);
            println!();

            println!("By status:");
            for entry in &summary.by_status {
                println!("  {:<14} {:>6}", format!("{}:", entry.status), entry.count);
            }

            if !summary.by_category.is_empty() {
                println!();
                println!("By category:");
                for entry in &summary.by_category {
                    println!("  {:<20} {:>6}", truncate(&entry.category, 20), entry.count);
                }
            }

            println!();
            if summary.reorder_alerts.is_empty() {
                println!("No items need reordering.");
            } else {
                println!("Reorder alerts:");
                println!(
                    "  {:<12} {:<24} {:<10} {:>6} {:>8}",
                    "SKU", "NAME", "STATUS", "QTY", "ORDER"
                );
                for alert in &summary.reorder_alerts {
                    println!(
                        "  {:<12} {:<24} {:<10} {:>6} {:>8}",
                        truncate(&alert.sku, 12),
                        truncate(&alert.name, 24),
                        alert.status.as_str(),
                        alert.quantity,
                        alert.shortfall
                    );
                }
            }
        }
        _ => anyhow::bail!("Invalid format '{}'. Valid formats: table, json", format),
    }
    Ok(())
}

async fn run_export_command(
    service: &InventoryService,
    owner: OwnerId,
    export_type: &str,
    output: Option<&str>,
) -> Result<()> {
    use crate::io::Exporter;
    use std::fs::File;
    use std::io::{Write, stdout};

    let exporter = Exporter::new(service);

    let writer: Box<dyn Write> = match output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create output file: {}", path))?;
            Box::new(file)
        }
        None => Box::new(stdout()),
    };

    match export_type {
        "items" => {
            let count = exporter.export_items_csv(owner, writer).await?;
            if output.is_some() {
                eprintln!("Exported {} items", count);
            }
        }
        "transactions" => {
            let count = exporter.export_transactions_csv(owner, writer).await?;
            if output.is_some() {
                eprintln!("Exported {} transactions", count);
            }
        }
        "full" => {
            let snapshot = exporter.export_full_json(owner, writer).await?;
            if output.is_some() {
                eprintln!(
                    "Exported {} items and {} transactions",
                    snapshot.items.len(),
                    snapshot.transactions.len()
                );
            }
        }
        _ => {
            anyhow::bail!(
                "Invalid export type '{}'. Valid types: items, transactions, full",
                export_type
            );
        }
    }

    Ok(())
}

fn print_item_table(items: &[Item]) {
    if items.is_empty() {
        println!("No items found.");
        return;
    }

    println!(
        "{:<12} {:<24} {:>6} {:<16} {:<12}",
        "SKU", "NAME", "QTY", "LOCATION", "STATUS"
    );
    println!("{}", "-".repeat(74));
    for item in items {
        println!(
            "{:<12} {:<24} {:>6} {:<16} {:<12}",
            truncate(&item.sku, 12),
            truncate(&item.name, 24),
            item.quantity(),
            truncate(&item.location, 16),
            item.status().as_str()
        );
    }
}

fn print_item(item: &Item) {
    println!("Item: {} {}", item.sku, item.name);
    println!("  ID:            {}", item.id);
    println!("  Quantity:      {}", item.quantity());
    println!("  Reorder point: {}", item.reorder_point());
    println!("  Status:        {}", item.status());
    println!("  Location:      {}", item.location);
    if let Some(category) = &item.category {
        println!("  Category:      {}", category);
    }
    if let Some(supplier) = &item.supplier {
        println!("  Supplier:      {}", supplier);
    }
    if let Some(description) = &item.description {
        println!("  Description:   {}", description);
    }
    if let Some(date) = item.purchase_date {
        println!("  Purchased:     {}", date);
    }
    if let Some(date) = item.expiry_date {
        println!("  Expires:       {}", date);
    }
    if let Some(scanned) = item.last_scanned {
        println!("  Last scanned:  {}", scanned.format("%Y-%m-%d %H:%M:%S"));
    }
    println!(
        "  Created:       {}",
        item.created_at.format("%Y-%m-%d %H:%M:%S")
    );
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len - 3).collect();
        format!("{}...", head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_keeps_short_strings() {
        assert_eq!(truncate("SKU-1", 12), "SKU-1");
        assert_eq!(truncate("Industrial Widget", 10), "Industr...");
    }

    #[test]
    fn test_scan_arguments_parse() {
        let cli = Cli::try_parse_from([
            "stockroom",
            "--owner",
            "6f1c1e36-4d4b-4b8e-9a55-3b5d1f1f2b7a",
            "scan",
            "a-1",
            "--action",
            "remove",
            "--quantity",
            "3",
        ])
        .unwrap();
        assert!(cli.owner.is_some());
        match cli.command {
            Commands::Scan {
                code,
                action,
                quantity,
                payload,
            } => {
                assert_eq!(code, "a-1");
                assert_eq!(action, ScanAction::Remove);
                assert_eq!(quantity, Some(3));
                assert!(!payload);
            }
            _ => panic!("expected scan command"),
        }
    }

    #[test]
    fn test_unknown_scan_action_is_rejected() {
        let result = Cli::try_parse_from(["stockroom", "scan", "A-1", "--action", "restock"]);
        assert!(result.is_err());
    }
}
