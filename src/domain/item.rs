use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ValidationErrors;

pub type ItemId = Uuid;

/// Identity of the authenticated caller. Supplied by whoever verified the
/// credentials; never checked here.
pub type OwnerId = Uuid;

/// Stock is counted in whole units.
pub type Quantity = i64;

pub const DEFAULT_REORDER_POINT: Quantity = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StockStatus {
    #[serde(rename = "In Stock")]
    InStock,
    #[serde(rename = "Low Stock")]
    LowStock,
    #[serde(rename = "Critical")]
    Critical,
    #[serde(rename = "Out of Stock")]
    OutOfStock,
}

impl StockStatus {
    pub const ALL: [StockStatus; 4] = [
        StockStatus::InStock,
        StockStatus::LowStock,
        StockStatus::Critical,
        StockStatus::OutOfStock,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StockStatus::InStock => "In Stock",
            StockStatus::LowStock => "Low Stock",
            StockStatus::Critical => "Critical",
            StockStatus::OutOfStock => "Out of Stock",
        }
    }

    /// Low and critical stock both call for a reorder.
    pub fn needs_reorder(&self) -> bool {
        matches!(self, StockStatus::LowStock | StockStatus::Critical)
    }
}

impl std::str::FromStr for StockStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StockStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown stock status '{}'", s))
    }
}

impl std::fmt::Display for StockStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Derive the stock status from the current quantity and reorder point.
///
/// The critical threshold is half the reorder point using real division,
/// so `2 * quantity <= reorder_point` keeps it exact for odd reorder points.
pub fn derive_status(quantity: Quantity, reorder_point: Quantity) -> StockStatus {
    if quantity <= 0 {
        StockStatus::OutOfStock
    } else if quantity.saturating_mul(2) <= reorder_point {
        StockStatus::Critical
    } else if quantity <= reorder_point {
        StockStatus::LowStock
    } else {
        StockStatus::InStock
    }
}

/// SKUs are compared trimmed and uppercased.
pub fn normalize_sku(raw: &str) -> String {
    raw.trim().to_uppercase()
}

fn validate_sku(errors: &mut ValidationErrors, raw: &str) {
    let sku = normalize_sku(raw);
    errors.check_length("sku", "SKU", &sku, 2, 50);
    if !sku.is_empty()
        && !sku
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '-' || c == '_')
    {
        errors.add(
            "sku",
            "SKU can only contain uppercase letters, numbers, hyphens, and underscores",
        );
    }
}

fn validate_dates(
    errors: &mut ValidationErrors,
    purchase_date: Option<NaiveDate>,
    expiry_date: Option<NaiveDate>,
) {
    if let (Some(purchase), Some(expiry)) = (purchase_date, expiry_date) {
        if expiry <= purchase {
            errors.add("expiry_date", "Expiry date must be after purchase date");
        }
    }
}

fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// An inventory item owned by a single user.
///
/// Quantity, reorder point and status are only changed through methods that
/// keep the status in line with the other two.
#[derive(Debug, Clone, Serialize)]
pub struct Item {
    pub id: ItemId,
    pub owner: OwnerId,
    pub sku: String,
    pub name: String,
    pub description: Option<String>,
    pub(crate) quantity: Quantity,
    pub location: String,
    pub(crate) reorder_point: Quantity,
    pub supplier: Option<String>,
    pub category: Option<String>,
    pub purchase_date: Option<NaiveDate>,
    pub expiry_date: Option<NaiveDate>,
    /// Opaque payload produced by the QR codec
    pub qr_payload: String,
    pub(crate) status: StockStatus,
    pub last_scanned: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Set when the item was deleted; its ledger stays behind
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Item {
    /// Build a new item from validated fields. The QR payload is filled in by
    /// the service once the id exists.
    pub fn new(owner: OwnerId, fields: NewItem) -> Self {
        let now = Utc::now();
        let reorder_point = fields.reorder_point.unwrap_or(DEFAULT_REORDER_POINT);
        Self {
            id: Uuid::new_v4(),
            owner,
            sku: normalize_sku(&fields.sku),
            name: fields.name.trim().to_string(),
            description: clean(fields.description),
            quantity: fields.quantity,
            location: fields.location.trim().to_string(),
            reorder_point,
            supplier: clean(fields.supplier),
            category: clean(fields.category),
            purchase_date: fields.purchase_date,
            expiry_date: fields.expiry_date,
            qr_payload: String::new(),
            status: derive_status(fields.quantity, reorder_point),
            last_scanned: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    pub fn quantity(&self) -> Quantity {
        self.quantity
    }

    pub fn reorder_point(&self) -> Quantity {
        self.reorder_point
    }

    pub fn status(&self) -> StockStatus {
        self.status
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub fn set_quantity(&mut self, quantity: Quantity) {
        self.quantity = quantity;
        self.status = derive_status(self.quantity, self.reorder_point);
    }

    /// Merge the supplied fields. The patch must already be validated
    /// against this item.
    pub fn apply_patch(&mut self, patch: ItemPatch, now: DateTime<Utc>) {
        if let Some(sku) = patch.sku {
            self.sku = normalize_sku(&sku);
        }
        if let Some(name) = patch.name {
            self.name = name.trim().to_string();
        }
        if let Some(location) = patch.location {
            self.location = location.trim().to_string();
        }
        // An empty string clears an optional text field
        if patch.description.is_some() {
            self.description = clean(patch.description);
        }
        if patch.supplier.is_some() {
            self.supplier = clean(patch.supplier);
        }
        if patch.category.is_some() {
            self.category = clean(patch.category);
        }
        if let Some(date) = patch.purchase_date {
            self.purchase_date = Some(date);
        }
        if let Some(date) = patch.expiry_date {
            self.expiry_date = Some(date);
        }
        if let Some(reorder_point) = patch.reorder_point {
            self.reorder_point = reorder_point;
        }
        if let Some(quantity) = patch.quantity {
            self.quantity = quantity;
        }
        self.status = derive_status(self.quantity, self.reorder_point);
        self.updated_at = now;
    }
}

/// Fields accepted when creating an item.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewItem {
    pub sku: String,
    pub name: String,
    pub description: Option<String>,
    pub quantity: Quantity,
    pub location: String,
    pub reorder_point: Option<Quantity>,
    pub supplier: Option<String>,
    pub category: Option<String>,
    pub purchase_date: Option<NaiveDate>,
    pub expiry_date: Option<NaiveDate>,
}

impl NewItem {
    pub fn new(
        sku: impl Into<String>,
        name: impl Into<String>,
        quantity: Quantity,
        location: impl Into<String>,
    ) -> Self {
        Self {
            sku: sku.into(),
            name: name.into(),
            quantity,
            location: location.into(),
            ..Self::default()
        }
    }

    pub fn with_reorder_point(mut self, reorder_point: Quantity) -> Self {
        self.reorder_point = Some(reorder_point);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_supplier(mut self, supplier: impl Into<String>) -> Self {
        self.supplier = Some(supplier.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_dates(mut self, purchase: Option<NaiveDate>, expiry: Option<NaiveDate>) -> Self {
        self.purchase_date = purchase;
        self.expiry_date = expiry;
        self
    }

    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        validate_sku(&mut errors, &self.sku);
        errors.check_length("name", "Item name", &self.name, 2, 100);
        if let Some(description) = &self.description {
            errors.check_length("description", "Description", description, 0, 500);
        }
        errors.check_non_negative("quantity", "Quantity", self.quantity);
        errors.check_length("location", "Location", &self.location, 1, 100);
        if let Some(reorder_point) = self.reorder_point {
            errors.check_non_negative("reorder_point", "Reorder point", reorder_point);
        }
        if let Some(supplier) = &self.supplier {
            errors.check_length("supplier", "Supplier", supplier, 0, 100);
        }
        if let Some(category) = &self.category {
            errors.check_length("category", "Category", category, 0, 50);
        }
        validate_dates(&mut errors, self.purchase_date, self.expiry_date);
        errors.into_result()
    }
}

/// Partial update. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ItemPatch {
    pub sku: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub quantity: Option<Quantity>,
    pub location: Option<String>,
    pub reorder_point: Option<Quantity>,
    pub supplier: Option<String>,
    pub category: Option<String>,
    pub purchase_date: Option<NaiveDate>,
    pub expiry_date: Option<NaiveDate>,
}

impl ItemPatch {
    pub fn quantity(quantity: Quantity) -> Self {
        Self {
            quantity: Some(quantity),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.sku.is_none()
            && self.name.is_none()
            && self.description.is_none()
            && self.quantity.is_none()
            && self.location.is_none()
            && self.reorder_point.is_none()
            && self.supplier.is_none()
            && self.category.is_none()
            && self.purchase_date.is_none()
            && self.expiry_date.is_none()
    }

    /// True when applying the patch would change what the QR payload encodes.
    pub fn changes_label(&self, item: &Item) -> bool {
        self.sku
            .as_deref()
            .is_some_and(|sku| normalize_sku(sku) != item.sku)
            || self
                .name
                .as_deref()
                .is_some_and(|name| name.trim() != item.name)
    }

    /// Validate the supplied fields, then the date ordering of the item as it
    /// would look after the merge.
    pub fn validate_for(&self, item: &Item) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if let Some(sku) = &self.sku {
            validate_sku(&mut errors, sku);
        }
        if let Some(name) = &self.name {
            errors.check_length("name", "Item name", name, 2, 100);
        }
        if let Some(description) = &self.description {
            errors.check_length("description", "Description", description, 0, 500);
        }
        if let Some(quantity) = self.quantity {
            errors.check_non_negative("quantity", "Quantity", quantity);
        }
        if let Some(location) = &self.location {
            errors.check_length("location", "Location", location, 1, 100);
        }
        if let Some(reorder_point) = self.reorder_point {
            errors.check_non_negative("reorder_point", "Reorder point", reorder_point);
        }
        if let Some(supplier) = &self.supplier {
            errors.check_length("supplier", "Supplier", supplier, 0, 100);
        }
        if let Some(category) = &self.category {
            errors.check_length("category", "Category", category, 0, 50);
        }
        validate_dates(
            &mut errors,
            self.purchase_date.or(item.purchase_date),
            self.expiry_date.or(item.expiry_date),
        );
        errors.into_result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_derive_status_boundaries() {
        // reorder point 10: critical up to 5, low up to 10
        assert_eq!(derive_status(0, 10), StockStatus::OutOfStock);
        assert_eq!(derive_status(1, 10), StockStatus::Critical);
        assert_eq!(derive_status(5, 10), StockStatus::Critical);
        assert_eq!(derive_status(6, 10), StockStatus::LowStock);
        assert_eq!(derive_status(10, 10), StockStatus::LowStock);
        assert_eq!(derive_status(11, 10), StockStatus::InStock);
    }

    #[test]
    fn test_derive_status_odd_reorder_point() {
        // 7 / 2 = 3.5, so 3 is critical and 4 is low
        assert_eq!(derive_status(3, 7), StockStatus::Critical);
        assert_eq!(derive_status(4, 7), StockStatus::LowStock);
        assert_eq!(derive_status(7, 7), StockStatus::LowStock);
        assert_eq!(derive_status(8, 7), StockStatus::InStock);
    }

    #[test]
    fn test_derive_status_zero_reorder_point() {
        assert_eq!(derive_status(0, 0), StockStatus::OutOfStock);
        assert_eq!(derive_status(1, 0), StockStatus::InStock);
    }

    #[test]
    fn test_derive_status_is_total() {
        for reorder_point in 0..=40 {
            for quantity in 0..=60 {
                let status = derive_status(quantity, reorder_point);
                let expected = if quantity == 0 {
                    StockStatus::OutOfStock
                } else if (quantity as f64) <= reorder_point as f64 / 2.0 {
                    StockStatus::Critical
                } else if quantity <= reorder_point {
                    StockStatus::LowStock
                } else {
                    StockStatus::InStock
                };
                assert_eq!(status, expected, "q={} r={}", quantity, reorder_point);
            }
        }
    }

    #[test]
    fn test_status_roundtrip() {
        for status in StockStatus::ALL {
            assert_eq!(status.as_str().parse::<StockStatus>().unwrap(), status);
        }
        assert!("Sold Out".parse::<StockStatus>().is_err());
    }

    #[test]
    fn test_new_item_normalizes_and_derives() {
        let fields = NewItem::new("  a-1 ", " Widget ", 20, "Shelf A").with_category("  ");
        let item = Item::new(Uuid::new_v4(), fields);

        assert_eq!(item.sku, "A-1");
        assert_eq!(item.name, "Widget");
        assert_eq!(item.reorder_point(), DEFAULT_REORDER_POINT);
        assert_eq!(item.status(), StockStatus::InStock);
        assert_eq!(item.category, None);
    }

    #[test]
    fn test_new_item_reports_all_violations() {
        let fields = NewItem {
            sku: "a".into(),
            name: String::new(),
            quantity: -3,
            location: "  ".into(),
            reorder_point: Some(-1),
            purchase_date: Some(date("2024-05-01")),
            expiry_date: Some(date("2024-05-01")),
            ..NewItem::default()
        };

        let errors = fields.validate().unwrap_err();
        for field in ["sku", "name", "quantity", "location", "reorder_point", "expiry_date"] {
            assert!(errors.has_field(field), "missing error for {}", field);
        }
    }

    #[test]
    fn test_sku_charset() {
        let fields = NewItem::new("ab c!", "Widget", 1, "Shelf");
        let errors = fields.validate().unwrap_err();
        assert!(errors.has_field("sku"));

        // lowercase input is fine once normalized
        assert!(NewItem::new("ab-c_1", "Widget", 1, "Shelf").validate().is_ok());
    }

    #[test]
    fn test_patch_updates_status() {
        let mut item = Item::new(Uuid::new_v4(), NewItem::new("A-1", "Widget", 20, "Shelf"));
        item.apply_patch(ItemPatch::quantity(4), Utc::now());
        assert_eq!(item.quantity(), 4);
        assert_eq!(item.status(), StockStatus::Critical);

        let patch = ItemPatch {
            reorder_point: Some(2),
            ..ItemPatch::default()
        };
        item.apply_patch(patch, Utc::now());
        assert_eq!(item.status(), StockStatus::InStock);
    }

    #[test]
    fn test_patch_clears_optional_text() {
        let fields = NewItem::new("A-1", "Widget", 1, "Shelf").with_supplier("Acme");
        let mut item = Item::new(Uuid::new_v4(), fields);
        let patch = ItemPatch {
            supplier: Some(String::new()),
            ..ItemPatch::default()
        };
        item.apply_patch(patch, Utc::now());
        assert_eq!(item.supplier, None);
    }

    #[test]
    fn test_patch_checks_merged_dates() {
        let fields = NewItem::new("A-1", "Widget", 1, "Shelf")
            .with_dates(Some(date("2024-01-01")), Some(date("2024-06-01")));
        let item = Item::new(Uuid::new_v4(), fields);

        let patch = ItemPatch {
            purchase_date: Some(date("2024-07-01")),
            ..ItemPatch::default()
        };
        let errors = patch.validate_for(&item).unwrap_err();
        assert!(errors.has_field("expiry_date"));
    }

    #[test]
    fn test_patch_changes_label() {
        let item = Item::new(Uuid::new_v4(), NewItem::new("A-1", "Widget", 1, "Shelf"));
        let same = ItemPatch {
            sku: Some("a-1".into()),
            ..ItemPatch::default()
        };
        assert!(!same.changes_label(&item));

        let renamed = ItemPatch {
            name: Some("Gadget".into()),
            ..ItemPatch::default()
        };
        assert!(renamed.changes_label(&item));
    }
}
