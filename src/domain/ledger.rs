use serde::Serialize;

use super::{Quantity, Transaction, TransactionId};

/// Net change in stock across a set of ledger entries.
pub fn net_change(transactions: &[Transaction]) -> Quantity {
    transactions.iter().map(Transaction::signed_delta).sum()
}

/// Check a single entry: the recorded magnitude matches its before/after
/// quantities and the direction matches its kind.
pub fn verify_entry(entry: &Transaction) -> Result<(), LedgerError> {
    if entry.quantity != (entry.new_quantity - entry.previous_quantity).abs() {
        return Err(LedgerError::MagnitudeMismatch {
            transaction: entry.id,
            recorded: entry.quantity,
            previous: entry.previous_quantity,
            new: entry.new_quantity,
        });
    }
    if !entry.kind.allows(entry.previous_quantity, entry.new_quantity) {
        return Err(LedgerError::DirectionMismatch {
            transaction: entry.id,
        });
    }
    Ok(())
}

/// Replay an item's ledger (oldest first) and return the quantity it ends on.
///
/// Each entry must start where the previous one ended; the first one must
/// start from zero, since creation records the initial stock.
pub fn replay(entries: &[Transaction]) -> Result<Quantity, LedgerError> {
    let mut running: Quantity = 0;
    for entry in entries {
        verify_entry(entry)?;
        if entry.previous_quantity != running {
            return Err(LedgerError::Gap {
                transaction: entry.id,
                expected: running,
                found: entry.previous_quantity,
            });
        }
        running += entry.signed_delta();
    }
    Ok(running)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum LedgerError {
    MagnitudeMismatch {
        transaction: TransactionId,
        recorded: Quantity,
        previous: Quantity,
        new: Quantity,
    },
    DirectionMismatch {
        transaction: TransactionId,
    },
    Gap {
        transaction: TransactionId,
        expected: Quantity,
        found: Quantity,
    },
}

impl std::fmt::Display for LedgerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LedgerError::MagnitudeMismatch {
                transaction,
                recorded,
                previous,
                new,
            } => write!(
                f,
                "Transaction {} records {} units for a move from {} to {}",
                transaction, recorded, previous, new
            ),
            LedgerError::DirectionMismatch { transaction } => write!(
                f,
                "Transaction {} moves stock against its kind",
                transaction
            ),
            LedgerError::Gap {
                transaction,
                expected,
                found,
            } => write!(
                f,
                "Transaction {} starts at {} but the ledger stood at {}",
                transaction, found, expected
            ),
        }
    }
}

impl std::error::Error for LedgerError {}
