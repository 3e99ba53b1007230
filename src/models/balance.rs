//! Stock balance: the materialized view of the movement ledger

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::types::StockKey;

/// Current on-hand quantity and average cost for a (product, warehouse)
/// pair. Created lazily on first movement, never deleted, and mutated
/// only through the posting coordinator.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct StockBalance {
    pub tenant_id: Uuid,
    pub product_id: Uuid,
    pub warehouse_id: Uuid,
    /// On-hand quantity, 2-decimal precision
    pub quantity: Decimal,
    /// Moving weighted-average unit cost, 4-decimal precision
    pub average_cost: Decimal,
    /// Always round(quantity * average_cost, 2), never stored drifted
    pub total_value: Decimal,
    pub last_movement_at: Option<DateTime<Utc>>,
}

impl StockBalance {
    /// Zero-valued balance for a key that has no movements yet
    pub fn empty(key: StockKey) -> Self {
        Self {
            tenant_id: key.tenant_id,
            product_id: key.product_id,
            warehouse_id: key.warehouse_id,
            quantity: Decimal::ZERO,
            average_cost: Decimal::ZERO,
            total_value: Decimal::ZERO,
            last_movement_at: None,
        }
    }

    pub fn key(&self) -> StockKey {
        StockKey::new(self.tenant_id, self.product_id, self.warehouse_id)
    }
}
