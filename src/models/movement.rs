//! Movement ledger entries: the append-only audit trail of stock changes

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Stock-affecting movement types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MovementType {
    Receipt,
    Issue,
    AdjustmentIn,
    AdjustmentOut,
    TransferIn,
    TransferOut,
}

/// Direction of a movement relative to the warehouse
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MovementDirection {
    Inbound,
    Outbound,
}

impl MovementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementType::Receipt => "receipt",
            MovementType::Issue => "issue",
            MovementType::AdjustmentIn => "adjustment_in",
            MovementType::AdjustmentOut => "adjustment_out",
            MovementType::TransferIn => "transfer_in",
            MovementType::TransferOut => "transfer_out",
        }
    }

    pub fn direction(&self) -> MovementDirection {
        match self {
            MovementType::Receipt | MovementType::AdjustmentIn | MovementType::TransferIn => {
                MovementDirection::Inbound
            }
            MovementType::Issue | MovementType::AdjustmentOut | MovementType::TransferOut => {
                MovementDirection::Outbound
            }
        }
    }
}

/// Link from a ledger entry back to the document or action that caused it
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MovementReference {
    pub reference_type: Option<String>,
    pub reference_id: Option<Uuid>,
    pub reference_number: Option<String>,
}

/// Immutable record of one stock-affecting event. Never updated or
/// deleted; corrections are new compensating entries.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MovementLedgerEntry {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub product_id: Uuid,
    pub warehouse_id: Uuid,
    pub movement_type: MovementType,
    /// Signed: positive for inbound, negative for outbound
    pub quantity: Decimal,
    /// Cost per unit applied by this movement; for outbound movements
    /// this is the average cost at posting time
    pub unit_cost: Decimal,
    /// On-hand quantity after applying this entry
    pub balance_after: Decimal,
    /// Average cost after applying this entry
    pub average_cost_after: Decimal,
    pub reference_type: Option<String>,
    pub reference_id: Option<Uuid>,
    pub reference_number: Option<String>,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
}
