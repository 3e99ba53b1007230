//! Shared test harness: in-memory engine wiring and input helpers
#![allow(dead_code)]

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use uuid::Uuid;

use warehouse_ledger::config::{PostingConfig, StockConfig, WorkflowConfig};
use warehouse_ledger::error::AppResult;
use warehouse_ledger::lock::LockManager;
use warehouse_ledger::master_data::MasterData;
use warehouse_ledger::models::{AdjustmentDirection, DocumentLine};
use warehouse_ledger::types::RequestContext;
use warehouse_ledger::{DocumentService, LedgerPoster, MemoryStore};

/// Helper to create Decimal from string
pub fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

pub fn ctx(tenant_id: Uuid, user_id: Uuid) -> RequestContext {
    RequestContext::new(tenant_id, user_id, "manager")
}

/// Master data where every product and warehouse resolves
pub struct AllKnown;

#[async_trait]
impl MasterData for AllKnown {
    async fn product_exists(&self, _tenant_id: Uuid, _product_id: Uuid) -> AppResult<bool> {
        Ok(true)
    }

    async fn warehouse_exists(&self, _tenant_id: Uuid, _warehouse_id: Uuid) -> AppResult<bool> {
        Ok(true)
    }
}

/// Master data with fixed product/warehouse sets
pub struct Fixed {
    pub products: Vec<Uuid>,
    pub warehouses: Vec<Uuid>,
}

#[async_trait]
impl MasterData for Fixed {
    async fn product_exists(&self, _tenant_id: Uuid, product_id: Uuid) -> AppResult<bool> {
        Ok(self.products.contains(&product_id))
    }

    async fn warehouse_exists(&self, _tenant_id: Uuid, warehouse_id: Uuid) -> AppResult<bool> {
        Ok(self.warehouses.contains(&warehouse_id))
    }
}

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub locks: Arc<LockManager>,
    pub poster: Arc<LedgerPoster>,
    pub service: DocumentService,
}

#[derive(Default)]
pub struct HarnessOptions {
    pub stock: StockConfig,
    pub posting: PostingConfig,
    pub workflow: WorkflowConfig,
}

pub fn harness() -> Harness {
    harness_with(HarnessOptions::default(), Arc::new(AllKnown))
}

pub fn harness_with(options: HarnessOptions, master_data: Arc<dyn MasterData>) -> Harness {
    let store = Arc::new(MemoryStore::new());
    let locks = Arc::new(LockManager::new(options.posting.lock_wait()));
    let poster = Arc::new(LedgerPoster::new(
        store.clone(),
        locks.clone(),
        options.posting,
        options.stock,
    ));
    let service = DocumentService::new(
        store.clone(),
        master_data,
        poster.clone(),
        options.workflow,
    );

    Harness {
        store,
        locks,
        poster,
        service,
    }
}

pub fn receipt_line(product_id: Uuid, quantity: &str, unit_cost: &str) -> DocumentLine {
    DocumentLine {
        product_id,
        quantity: dec(quantity),
        unit_cost: Some(dec(unit_cost)),
        direction: None,
        counted_quantity: None,
        reason: None,
    }
}

pub fn issue_line(product_id: Uuid, quantity: &str) -> DocumentLine {
    DocumentLine {
        product_id,
        quantity: dec(quantity),
        unit_cost: None,
        direction: None,
        counted_quantity: None,
        reason: None,
    }
}

pub fn adjustment_line(product_id: Uuid, direction: AdjustmentDirection, quantity: &str) -> DocumentLine {
    DocumentLine {
        product_id,
        quantity: dec(quantity),
        unit_cost: None,
        direction: Some(direction),
        counted_quantity: None,
        reason: Some("cycle count variance".to_string()),
    }
}

pub fn counted_line(product_id: Uuid, counted: &str) -> DocumentLine {
    DocumentLine {
        product_id,
        quantity: Decimal::ONE,
        unit_cost: None,
        direction: None,
        counted_quantity: Some(dec(counted)),
        reason: Some("physical count".to_string()),
    }
}
