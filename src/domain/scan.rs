use serde::{Deserialize, Serialize};

use super::{Quantity, TransactionKind, ValidationErrors, normalize_sku};

/// What a scanner asks to do with the scanned item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanAction {
    View,
    Add,
    Remove,
}

impl ScanAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanAction::View => "view",
            ScanAction::Add => "add",
            ScanAction::Remove => "remove",
        }
    }

    /// Ledger kind written for this action, `None` for reads.
    pub fn transaction_kind(&self) -> Option<TransactionKind> {
        match self {
            ScanAction::View => None,
            ScanAction::Add => Some(TransactionKind::Add),
            ScanAction::Remove => Some(TransactionKind::Remove),
        }
    }
}

impl std::str::FromStr for ScanAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "view" => Ok(ScanAction::View),
            "add" => Ok(ScanAction::Add),
            "remove" => Ok(ScanAction::Remove),
            other => Err(format!(
                "action must be either \"add\", \"remove\", or \"view\" (got '{}')",
                other
            )),
        }
    }
}

impl std::fmt::Display for ScanAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Validate a scan request and return the units to move (zero for `view`).
pub fn validate_scan(
    sku: &str,
    action: ScanAction,
    quantity: Option<Quantity>,
) -> Result<Quantity, ValidationErrors> {
    let mut errors = ValidationErrors::new();
    if normalize_sku(sku).is_empty() {
        errors.add("sku", "SKU is required");
    }
    let delta = match (action, quantity) {
        (ScanAction::View, _) => 0,
        (_, None) => {
            errors.add("quantity", "Quantity is required for add/remove actions");
            0
        }
        (_, Some(q)) if q < 1 => {
            errors.add("quantity", "Quantity must be a positive integer");
            0
        }
        (_, Some(q)) => q,
    };
    errors.into_result().map(|_| delta)
}

/// Quantity after applying a scan. Removals floor at zero instead of
/// failing when more is taken than is on hand; an addition that would not
/// fit in a `Quantity` is rejected.
pub fn scan_target(
    current: Quantity,
    action: ScanAction,
    delta: Quantity,
) -> Result<Quantity, ValidationErrors> {
    match action {
        ScanAction::View => Ok(current),
        ScanAction::Add => current.checked_add(delta).ok_or_else(|| {
            ValidationErrors::single("quantity", "Quantity would exceed the maximum stock level")
        }),
        ScanAction::Remove => Ok(current.saturating_sub(delta).max(0)),
    }
}
