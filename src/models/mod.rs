//! Domain models for the inventory ledger and document workflow

mod balance;
mod document;
mod movement;

pub use balance::StockBalance;
pub use document::{
    AdjustmentDirection, Document, DocumentLine, DocumentStatus, DocumentType,
};
pub use movement::{
    MovementDirection, MovementLedgerEntry, MovementReference, MovementType,
};
