mod item;
mod ledger;
mod qr;
mod scan;
mod transaction;
mod validation;

pub use item::*;
pub use ledger::*;
pub use qr::*;
pub use scan::*;
pub use transaction::*;
pub use validation::*;
