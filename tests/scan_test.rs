mod common;

use anyhow::Result;
use common::{owner, stock_item, test_service};
use stockroom::application::{AppError, TransactionFilter};
use stockroom::domain::{Quantity, ScanAction, StockStatus, TransactionKind};

#[tokio::test]
async fn test_view_scan_changes_nothing() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let alice = owner();
    let item = stock_item(&service, alice, "A-1", 12).await?;

    let viewed = service.apply_scan(alice, "a-1", ScanAction::View, None).await?;
    let again = service
        .apply_scan(alice, "A-1", ScanAction::View, Some(99))
        .await?;

    for seen in [&viewed, &again] {
        assert_eq!(seen.id, item.id);
        assert_eq!(seen.quantity(), 12);
        assert!(seen.last_scanned.is_none());
    }

    let stored = service.get_item(alice, item.id).await?;
    assert_eq!(stored.quantity(), 12);
    assert!(stored.last_scanned.is_none());

    let entries = service
        .list_transactions(alice, TransactionFilter::for_item(item.id))
        .await?;
    assert_eq!(entries.len(), 1);

    Ok(())
}

#[tokio::test]
async fn test_add_scan_moves_stock_and_stamps_item() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let alice = owner();
    let item = stock_item(&service, alice, "A-1", 4).await?;
    assert_eq!(item.status(), StockStatus::Critical);

    let scanned = service
        .apply_scan(alice, "A-1", ScanAction::Add, Some(20))
        .await?;
    assert_eq!(scanned.quantity(), 24);
    assert_eq!(scanned.status(), StockStatus::InStock);
    assert!(scanned.last_scanned.is_some());

    let stored = service.get_item(alice, item.id).await?;
    assert_eq!(stored.quantity(), 24);
    assert_eq!(stored.status(), StockStatus::InStock);
    assert!(stored.last_scanned.is_some());

    let entries = service
        .list_transactions(alice, TransactionFilter::for_item(item.id))
        .await?;
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].kind, TransactionKind::Add);
    assert_eq!(entries[0].quantity, 20);
    assert_eq!(entries[0].previous_quantity, 4);
    assert_eq!(entries[0].new_quantity, 24);
    assert_eq!(entries[0].note.as_deref(), Some("QR scan"));

    Ok(())
}

#[tokio::test]
async fn test_remove_scan_clamps_at_zero() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let alice = owner();
    let item = stock_item(&service, alice, "A-1", 3).await?;

    let emptied = service
        .apply_scan(alice, "A-1", ScanAction::Remove, Some(8))
        .await?;
    assert_eq!(emptied.quantity(), 0);
    assert_eq!(emptied.status(), StockStatus::OutOfStock);

    // Removing from an empty item is still recorded, with nothing moved
    let still_empty = service
        .apply_scan(alice, "A-1", ScanAction::Remove, Some(2))
        .await?;
    assert_eq!(still_empty.quantity(), 0);

    let entries = service
        .list_transactions(alice, TransactionFilter::for_item(item.id))
        .await?;
    assert_eq!(entries.len(), 3);
    assert_eq!(entries[1].kind, TransactionKind::Remove);
    assert_eq!(entries[1].quantity, 3);
    assert_eq!(entries[1].new_quantity, 0);
    assert_eq!(entries[0].quantity, 0);
    assert_eq!(entries[0].previous_quantity, 0);

    Ok(())
}

#[tokio::test]
async fn test_scan_requires_positive_quantity() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let alice = owner();
    stock_item(&service, alice, "A-1", 3).await?;

    for (action, quantity) in [
        (ScanAction::Add, None),
        (ScanAction::Add, Some(0)),
        (ScanAction::Remove, Some(-4)),
    ] {
        let err = service
            .apply_scan(alice, "A-1", action, quantity)
            .await
            .unwrap_err();
        assert!(
            matches!(err, AppError::Validation(ref e) if e.has_field("quantity")),
            "{action} with {quantity:?} should be rejected"
        );
    }

    let err = service
        .apply_scan(alice, "  ", ScanAction::View, None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(ref e) if e.has_field("sku")));

    Ok(())
}

#[tokio::test]
async fn test_scan_only_finds_own_active_items() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let alice = owner();
    let bob = owner();
    let item = stock_item(&service, alice, "A-1", 3).await?;

    let err = service
        .apply_scan(bob, "A-1", ScanAction::Add, Some(1))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    service.delete_item(alice, item.id).await?;
    let err = service
        .apply_scan(alice, "A-1", ScanAction::View, None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    Ok(())
}

#[tokio::test]
async fn test_scan_payload_from_label() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let alice = owner();
    let item = stock_item(&service, alice, "A-1", 3).await?;

    let scanned = service
        .scan_payload(alice, &item.qr_payload, ScanAction::Add, Some(2))
        .await?;
    assert_eq!(scanned.id, item.id);
    assert_eq!(scanned.quantity(), 5);

    // What a camera reads off the printed label
    let raw = r#"{"id":"ignored","sku":"a-1","name":"Widget"}"#;
    let scanned = service
        .scan_payload(alice, raw, ScanAction::Remove, Some(1))
        .await?;
    assert_eq!(scanned.quantity(), 4);

    let err = service
        .scan_payload(alice, "data:application/json;base64,!!!", ScanAction::View, None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(ref e) if e.has_field("payload")));

    Ok(())
}

#[tokio::test]
async fn test_add_scan_past_maximum_is_rejected() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let alice = owner();
    let item = stock_item(&service, alice, "A-1", Quantity::MAX - 1).await?;

    let err = service
        .apply_scan(alice, "A-1", ScanAction::Add, Some(3))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(ref e) if e.has_field("quantity")));

    let stored = service.get_item(alice, item.id).await?;
    assert_eq!(stored.quantity(), Quantity::MAX - 1);
    assert!(stored.last_scanned.is_none());
    let entries = service
        .list_transactions(alice, TransactionFilter::for_item(item.id))
        .await?;
    assert_eq!(entries.len(), 1);

    // Filling up to the maximum exactly is fine
    let full = service
        .apply_scan(alice, "A-1", ScanAction::Add, Some(1))
        .await?;
    assert_eq!(full.quantity(), Quantity::MAX);

    Ok(())
}
