//! Common types used across the engine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::MovementType;

/// Tenant/user context supplied by the caller on every operation.
/// The engine does not authenticate; it trusts this identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestContext {
    pub tenant_id: Uuid,
    pub user_id: Uuid,
    pub role: String,
}

impl RequestContext {
    pub fn new(tenant_id: Uuid, user_id: Uuid, role: impl Into<String>) -> Self {
        Self {
            tenant_id,
            user_id,
            role: role.into(),
        }
    }
}

/// Key identifying one stock balance
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StockKey {
    pub tenant_id: Uuid,
    pub product_id: Uuid,
    pub warehouse_id: Uuid,
}

impl StockKey {
    pub fn new(tenant_id: Uuid, product_id: Uuid, warehouse_id: Uuid) -> Self {
        Self {
            tenant_id,
            product_id,
            warehouse_id,
        }
    }
}

/// Pagination parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pagination {
    pub page: u32,
    pub per_page: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: 20,
        }
    }
}

impl Pagination {
    pub fn offset(&self) -> i64 {
        (self.page.saturating_sub(1) as i64) * self.per_page as i64
    }

    pub fn limit(&self) -> i64 {
        self.per_page as i64
    }
}

/// Filters for listing movement ledger entries
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MovementFilter {
    pub product_id: Option<Uuid>,
    pub warehouse_id: Option<Uuid>,
    pub movement_type: Option<MovementType>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}
