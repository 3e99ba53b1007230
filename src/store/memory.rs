//! In-memory store for tests and embedded use

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{
    Document, DocumentStatus, DocumentType, MovementLedgerEntry, StockBalance,
};
use crate::types::{MovementFilter, Pagination, StockKey};

use super::{InventoryStore, PostingCommit};

#[derive(Default)]
struct MemoryInner {
    balances: HashMap<StockKey, StockBalance>,
    movements: Vec<MovementLedgerEntry>,
    documents: HashMap<Uuid, Document>,
    counters: HashMap<(Uuid, DocumentType), i64>,
}

/// HashMap-backed store. A single `RwLock` over the whole state makes
/// every `commit_posting` call trivially atomic.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<MemoryInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl InventoryStore for MemoryStore {
    async fn get_balance(&self, key: &StockKey) -> AppResult<Option<StockBalance>> {
        let inner = self.inner.read().await;
        Ok(inner.balances.get(key).cloned())
    }

    async fn list_movements(
        &self,
        tenant_id: Uuid,
        filter: &MovementFilter,
        page: &Pagination,
    ) -> AppResult<Vec<MovementLedgerEntry>> {
        let inner = self.inner.read().await;

        let mut entries: Vec<MovementLedgerEntry> = inner
            .movements
            .iter()
            .filter(|e| e.tenant_id == tenant_id)
            .filter(|e| filter.product_id.map_or(true, |p| e.product_id == p))
            .filter(|e| filter.warehouse_id.map_or(true, |w| e.warehouse_id == w))
            .filter(|e| filter.movement_type.map_or(true, |t| e.movement_type == t))
            .filter(|e| filter.from.map_or(true, |from| e.created_at >= from))
            .filter(|e| filter.to.map_or(true, |to| e.created_at <= to))
            .cloned()
            .collect();

        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(entries
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit() as usize)
            .collect())
    }

    async fn insert_document(&self, document: &Document) -> AppResult<()> {
        let mut inner = self.inner.write().await;
        inner.documents.insert(document.id, document.clone());
        Ok(())
    }

    async fn get_document(
        &self,
        tenant_id: Uuid,
        document_id: Uuid,
    ) -> AppResult<Option<Document>> {
        let inner = self.inner.read().await;
        Ok(inner
            .documents
            .get(&document_id)
            .filter(|d| d.tenant_id == tenant_id)
            .cloned())
    }

    async fn update_document(
        &self,
        document: &Document,
        expected: DocumentStatus,
    ) -> AppResult<()> {
        let mut inner = self.inner.write().await;

        let current = inner
            .documents
            .get(&document.id)
            .filter(|d| d.tenant_id == document.tenant_id)
            .ok_or_else(|| AppError::NotFound("Document".to_string()))?;
        if current.status != expected {
            return Err(AppError::ConcurrentModification(format!(
                "Document {} is {} now, expected {}",
                document.document_number,
                current.status.as_str(),
                expected.as_str()
            )));
        }

        inner.documents.insert(document.id, document.clone());
        Ok(())
    }

    async fn list_documents(
        &self,
        tenant_id: Uuid,
        status: Option<DocumentStatus>,
        document_type: Option<DocumentType>,
        page: &Pagination,
    ) -> AppResult<Vec<Document>> {
        let inner = self.inner.read().await;

        let mut documents: Vec<Document> = inner
            .documents
            .values()
            .filter(|d| d.tenant_id == tenant_id)
            .filter(|d| status.map_or(true, |s| d.status == s))
            .filter(|d| document_type.map_or(true, |t| d.document_type == t))
            .cloned()
            .collect();

        documents.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(documents
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit() as usize)
            .collect())
    }

    async fn next_document_number(
        &self,
        tenant_id: Uuid,
        document_type: DocumentType,
    ) -> AppResult<i64> {
        let mut inner = self.inner.write().await;
        let counter = inner.counters.entry((tenant_id, document_type)).or_insert(0);
        *counter += 1;
        Ok(*counter)
    }

    async fn commit_posting(&self, commit: &PostingCommit) -> AppResult<()> {
        let mut inner = self.inner.write().await;

        // The status claim decides the whole unit before anything lands
        if let Some(document) = &commit.document {
            let current = inner
                .documents
                .get(&document.id)
                .ok_or_else(|| AppError::NotFound("Document".to_string()))?;
            if current.status != DocumentStatus::Pending {
                return Err(AppError::InvalidStatusTransition(format!(
                    "Cannot approve a {} document",
                    current.status.as_str()
                )));
            }
        }

        for balance in &commit.balances {
            inner.balances.insert(balance.key(), balance.clone());
        }
        inner.movements.extend(commit.entries.iter().cloned());
        if let Some(document) = &commit.document {
            inner.documents.insert(document.id, document.clone());
        }

        Ok(())
    }
}
