//! Inventory engine: package fractioning, consumption and reconciliation.
//!
//! ```text
//! movement create/update/delete
//!            │
//!            ▼
//!   Reconciler (plan ledger actions from snapshots)
//!            │
//!            ▼
//!   StockItem::consume / revert ──► break vial/pack ──► break box
//!            │
//!            ▼
//!   guards (packaging ratios, non-negative stock)
//! ```

mod guards;
mod ledger;
mod reconcile;

pub use guards::*;
pub use ledger::*;
pub use reconcile::*;

use thiserror::Error;

/// Stock engine errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StockError {
    #[error("Insufficient stock of '{item}': requested {requested:.2} {unit}(s), available {available:.2}")]
    InsufficientStock {
        item: String,
        requested: f64,
        available: f64,
        unit: &'static str,
    },

    #[error("Not enough {container}s of '{item}' to fraction: requested {requested}, available {available}")]
    InsufficientPacks {
        item: String,
        container: &'static str,
        requested: i64,
        available: i64,
    },

    #[error("Not enough {container}es of '{item}' to fraction: requested {requested}, available {available}")]
    InsufficientBoxes {
        item: String,
        container: &'static str,
        requested: i64,
        available: i64,
    },

    #[error("Invalid packaging for '{item}': {reason}")]
    InvalidPackagingConfig { item: String, reason: String },

    #[error("Stock of {field} for '{item}' cannot be negative (got {value})")]
    NegativeStock {
        item: String,
        field: &'static str,
        value: f64,
    },

    #[error("Ledger invariant violated for '{item}': no containers left to fraction with {deficit} still missing")]
    StockFractioningExhausted { item: String, deficit: f64 },

    #[error("Invalid quantity: {0}")]
    InvalidQuantity(f64),

    #[error("Count of {field} for '{item}' is out of range")]
    CountOverflow { item: String, field: &'static str },
}

pub type StockResult<T> = Result<T, StockError>;
