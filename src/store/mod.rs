//! Storage abstraction for balances, ledger entries, and documents
//!
//! The engine never talks to a database client directly; it is handed an
//! `InventoryStore`. Production uses the Postgres implementation, tests
//! substitute the in-memory one.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::{
    Document, DocumentStatus, DocumentType, MovementLedgerEntry, StockBalance,
};
use crate::types::{MovementFilter, Pagination, StockKey};

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// One atomic posting unit: balance updates, ledger appends, and an
/// optional document status write that must all land together or not at
/// all.
#[derive(Debug, Clone)]
pub struct PostingCommit {
    pub balances: Vec<StockBalance>,
    pub entries: Vec<MovementLedgerEntry>,
    pub document: Option<Document>,
}

/// Persistence operations the engine depends on.
///
/// `commit_posting` is the only write path for balances and ledger
/// entries; callers serialize per-key access through the lock manager
/// before invoking it.
#[async_trait]
pub trait InventoryStore: Send + Sync {
    /// Current balance for a key, if any movement has created it
    async fn get_balance(&self, key: &StockKey) -> AppResult<Option<StockBalance>>;

    /// Ledger entries for a tenant, filtered and paginated, newest first
    async fn list_movements(
        &self,
        tenant_id: Uuid,
        filter: &MovementFilter,
        page: &Pagination,
    ) -> AppResult<Vec<MovementLedgerEntry>>;

    async fn insert_document(&self, document: &Document) -> AppResult<()>;

    async fn get_document(&self, tenant_id: Uuid, document_id: Uuid)
        -> AppResult<Option<Document>>;

    /// Rewrite a document's header and lines, conditional on the stored
    /// status still being `expected`. Fails with
    /// `ConcurrentModification` when another writer got there first.
    /// Approval status writes go through `commit_posting` instead.
    async fn update_document(
        &self,
        document: &Document,
        expected: DocumentStatus,
    ) -> AppResult<()>;

    async fn list_documents(
        &self,
        tenant_id: Uuid,
        status: Option<DocumentStatus>,
        document_type: Option<DocumentType>,
        page: &Pagination,
    ) -> AppResult<Vec<Document>>;

    /// Next value of the per-tenant-per-type document counter
    async fn next_document_number(
        &self,
        tenant_id: Uuid,
        document_type: DocumentType,
    ) -> AppResult<i64>;

    /// Apply one posting unit atomically. When the unit carries a
    /// document, the status write is conditional on the stored document
    /// still being PENDING; a lost race fails the whole unit with
    /// `InvalidStatusTransition` and writes nothing.
    async fn commit_posting(&self, commit: &PostingCommit) -> AppResult<()>;
}
