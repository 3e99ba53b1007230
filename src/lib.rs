//! Warehouse inventory ledger and costing engine
//!
//! Keeps per-product, per-warehouse stock balances consistent under
//! concurrent goods-receipt, goods-issue, and adjustment transactions,
//! computes a running weighted-average unit cost, and drives each
//! transaction through a draft -> pending -> approved/cancelled approval
//! workflow before it may mutate stock.
//!
//! This crate is a library-level contract: HTTP routing, authentication,
//! report rendering, and notification delivery live in the surrounding
//! application, which supplies tenant/user identity and master data
//! through [`types::RequestContext`] and [`master_data::MasterData`].

pub mod config;
pub mod costing;
pub mod error;
pub mod lock;
pub mod master_data;
pub mod models;
pub mod services;
pub mod store;
pub mod types;

pub use config::EngineConfig;
pub use error::{AppError, AppResult};
pub use services::{CreateDocumentInput, DocumentService, LedgerPoster, MovementRequest};
pub use store::{InventoryStore, MemoryStore, PgStore};
