//! Master data resolution supplied by the surrounding application
//!
//! The engine consumes product and warehouse identity as opaque inputs;
//! existence checks go through this trait so the caller decides where
//! master data lives.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::AppResult;

#[async_trait]
pub trait MasterData: Send + Sync {
    async fn product_exists(&self, tenant_id: Uuid, product_id: Uuid) -> AppResult<bool>;

    async fn warehouse_exists(&self, tenant_id: Uuid, warehouse_id: Uuid) -> AppResult<bool>;
}
