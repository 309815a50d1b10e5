use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Item, ItemId, OwnerId, Quantity};

pub type TransactionId = Uuid;

pub const NOTE_INITIAL_STOCK: &str = "Initial stock";
pub const NOTE_MANUAL_ADJUSTMENT: &str = "Manual adjustment";
pub const NOTE_QR_SCAN: &str = "QR scan";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    /// Stock received
    Add,
    /// Stock taken out
    Remove,
    /// Correction in either direction
    Adjust,
    /// Movement recorded by a scanner without a direction of its own
    Scan,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Add => "add",
            TransactionKind::Remove => "remove",
            TransactionKind::Adjust => "adjust",
            TransactionKind::Scan => "scan",
        }
    }

    /// Returns true if the direction of the kind is compatible with a move
    /// from `previous` to `new`.
    pub fn allows(&self, previous: Quantity, new: Quantity) -> bool {
        match self {
            TransactionKind::Add => new >= previous,
            TransactionKind::Remove => new <= previous,
            TransactionKind::Adjust | TransactionKind::Scan => true,
        }
    }
}

impl std::str::FromStr for TransactionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "add" => Ok(TransactionKind::Add),
            "remove" => Ok(TransactionKind::Remove),
            "adjust" => Ok(TransactionKind::Adjust),
            "scan" => Ok(TransactionKind::Scan),
            other => Err(format!("unknown transaction kind '{}'", other)),
        }
    }
}

impl std::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One entry of an item's stock ledger.
/// Entries are never edited - a later movement is the only correction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    /// Monotonically increasing sequence number for ordering
    pub sequence: i64,
    pub item_id: ItemId,
    /// Item name at the time of the movement
    pub item_name: String,
    /// Item SKU at the time of the movement
    pub sku: String,
    pub kind: TransactionKind,
    /// Units moved, always `|new_quantity - previous_quantity|`
    pub quantity: Quantity,
    pub previous_quantity: Quantity,
    pub new_quantity: Quantity,
    pub note: Option<String>,
    pub performed_by: OwnerId,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    /// Record the movement that brought `item` from `previous_quantity` to its
    /// current quantity. Sequence number must be assigned by the repository.
    pub fn record(
        item: &Item,
        kind: TransactionKind,
        previous_quantity: Quantity,
        performed_by: OwnerId,
        note: impl Into<String>,
    ) -> Self {
        let new_quantity = item.quantity();
        assert!(
            kind.allows(previous_quantity, new_quantity),
            "Movement direction does not match transaction kind"
        );
        Self {
            id: Uuid::new_v4(),
            sequence: 0, // Will be set by repository
            item_id: item.id,
            item_name: item.name.clone(),
            sku: item.sku.clone(),
            kind,
            quantity: (new_quantity - previous_quantity).abs(),
            previous_quantity,
            new_quantity,
            note: Some(note.into()),
            performed_by,
            created_at: Utc::now(),
        }
    }

    /// Record a movement, picking `add` or `remove` from its direction.
    pub fn movement(
        item: &Item,
        previous_quantity: Quantity,
        performed_by: OwnerId,
        note: impl Into<String>,
    ) -> Self {
        let kind = if item.quantity() >= previous_quantity {
            TransactionKind::Add
        } else {
            TransactionKind::Remove
        };
        Self::record(item, kind, previous_quantity, performed_by, note)
    }

    /// Change in stock caused by this entry.
    pub fn signed_delta(&self) -> Quantity {
        match self.kind {
            TransactionKind::Add => self.quantity,
            TransactionKind::Remove => -self.quantity,
            TransactionKind::Adjust | TransactionKind::Scan => {
                self.new_quantity - self.previous_quantity
            }
        }
    }
}
