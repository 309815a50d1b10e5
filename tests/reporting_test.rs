mod common;

use anyhow::Result;
use common::{owner, stock_item, test_service};
use stockroom::domain::{NewItem, Quantity, ScanAction, StockStatus};
use stockroom::io::Exporter;

#[tokio::test]
async fn test_summary_counts_every_status() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let alice = owner();
    let bob = owner();

    service
        .create_item(
            alice,
            NewItem::new("BOLT-1", "Bolt", 50, "Bin 1").with_category("Fasteners"),
        )
        .await?;
    service
        .create_item(
            alice,
            NewItem::new("NUT-1", "Nut", 8, "Bin 2").with_category("Fasteners"),
        )
        .await?;
    service
        .create_item(alice, NewItem::new("TAPE-1", "Tape", 2, "Drawer"))
        .await?;
    let gone = stock_item(&service, alice, "GLUE-1", 1).await?;
    service.delete_item(alice, gone.id).await?;
    stock_item(&service, bob, "BOLT-1", 3).await?;

    let summary = service.inventory_summary(alice).await?;
    assert_eq!(summary.total_items, 3);
    assert_eq!(summary.total_units, 60);

    let statuses: Vec<StockStatus> = summary.by_status.iter().map(|s| s.status).collect();
    assert_eq!(statuses, StockStatus::ALL.to_vec());
    assert_eq!(summary.count(StockStatus::InStock), 1);
    assert_eq!(summary.count(StockStatus::LowStock), 1);
    assert_eq!(summary.count(StockStatus::Critical), 1);
    assert_eq!(summary.count(StockStatus::OutOfStock), 0);

    let categories: Vec<(&str, i64)> = summary
        .by_category
        .iter()
        .map(|c| (c.category.as_str(), c.count))
        .collect();
    assert_eq!(categories, vec![("Fasteners", 2), ("Uncategorized", 1)]);

    let alerts: Vec<&str> = summary
        .reorder_alerts
        .iter()
        .map(|a| a.sku.as_str())
        .collect();
    assert_eq!(alerts, vec!["TAPE-1", "NUT-1"]);
    assert_eq!(summary.reorder_alerts[0].shortfall, 9);

    Ok(())
}

#[tokio::test]
async fn test_empty_inventory_summary() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let summary = service.inventory_summary(owner()).await?;

    assert_eq!(summary.total_items, 0);
    assert_eq!(summary.total_units, 0);
    assert_eq!(summary.by_status.len(), 4);
    assert!(summary.by_status.iter().all(|s| s.count == 0));
    assert!(summary.by_category.is_empty());
    assert!(summary.reorder_alerts.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_unit_total_saturates_on_huge_stock() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let alice = owner();
    stock_item(&service, alice, "BIG-1", Quantity::MAX).await?;
    stock_item(&service, alice, "BIG-2", Quantity::MAX).await?;

    let summary = service.inventory_summary(alice).await?;
    assert_eq!(summary.total_items, 2);
    assert_eq!(summary.total_units, Quantity::MAX);
    assert_eq!(summary.count(StockStatus::InStock), 2);

    Ok(())
}

#[tokio::test]
async fn test_export_items_csv() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let alice = owner();
    service
        .create_item(
            alice,
            NewItem::new("BOLT-1", "Hex bolt, M10", 50, "Bin 1").with_category("Fasteners"),
        )
        .await?;
    service
        .create_item(alice, NewItem::new("TAPE-1", "Tape", 2, "Drawer"))
        .await?;

    let mut buffer = Vec::new();
    let count = Exporter::new(&service)
        .export_items_csv(alice, &mut buffer)
        .await?;
    assert_eq!(count, 2);

    let csv = String::from_utf8(buffer)?;
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines[0], "sku,name,quantity,location,status,category");
    assert_eq!(lines[1], "TAPE-1,Tape,2,Drawer,Critical,N/A");
    assert_eq!(lines[2], "BOLT-1,\"Hex bolt, M10\",50,Bin 1,In Stock,Fasteners");

    Ok(())
}

#[tokio::test]
async fn test_export_transactions_oldest_first() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let alice = owner();
    stock_item(&service, alice, "A-1", 5).await?;
    service
        .apply_scan(alice, "A-1", ScanAction::Remove, Some(2))
        .await?;

    let mut buffer = Vec::new();
    let count = Exporter::new(&service)
        .export_transactions_csv(alice, &mut buffer)
        .await?;
    assert_eq!(count, 2);

    let mut reader = csv::Reader::from_reader(buffer.as_slice());
    let kinds: Vec<String> = reader
        .records()
        .map(|record| record.map(|r| r[5].to_string()))
        .collect::<Result<_, _>>()?;
    assert_eq!(kinds, vec!["add", "remove"]);

    let mut buffer = Vec::new();
    let snapshot = Exporter::new(&service)
        .export_full_json(alice, &mut buffer)
        .await?;
    assert_eq!(snapshot.items.len(), 1);
    assert_eq!(snapshot.transactions.len(), 2);
    let json: serde_json::Value = serde_json::from_slice(&buffer)?;
    assert_eq!(json["items"][0]["status"], "Critical");

    Ok(())
}
