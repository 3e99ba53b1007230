//! Approvable documents: goods receipts, goods issues, stock adjustments

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Document types gating stock movements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    GoodsReceipt,
    GoodsIssue,
    StockAdjustment,
}

impl DocumentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::GoodsReceipt => "goods_receipt",
            DocumentType::GoodsIssue => "goods_issue",
            DocumentType::StockAdjustment => "stock_adjustment",
        }
    }

    /// Prefix used in generated document numbers
    pub fn number_prefix(&self) -> &'static str {
        match self {
            DocumentType::GoodsReceipt => "GR",
            DocumentType::GoodsIssue => "GI",
            DocumentType::StockAdjustment => "ADJ",
        }
    }
}

/// Document workflow status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Draft,
    Pending,
    Approved,
    Cancelled,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Draft => "draft",
            DocumentStatus::Pending => "pending",
            DocumentStatus::Approved => "approved",
            DocumentStatus::Cancelled => "cancelled",
        }
    }

    /// Approved and cancelled documents accept no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(self, DocumentStatus::Approved | DocumentStatus::Cancelled)
    }
}

/// Direction of an adjustment line. Receipts are implicitly inbound and
/// issues outbound; only adjustments need an explicit direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR", rename_all = "snake_case")]
#[serde(rename_all = "lowercase")]
pub enum AdjustmentDirection {
    In,
    Out,
}

/// One line item of a document. Quantity is always positive at the line
/// level; direction comes from the parent document's semantics.
/// Absolute-count adjustment lines carry their meaning in
/// `counted_quantity` and leave `quantity` unused.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DocumentLine {
    pub product_id: Uuid,
    pub quantity: Decimal,
    /// Required on receipt lines; issues and relative adjustments derive
    /// their cost from the current average at approval time
    pub unit_cost: Option<Decimal>,
    /// Adjustment lines only
    pub direction: Option<AdjustmentDirection>,
    /// Adjustment lines only: absolute observed count. When set, the
    /// line posts an absolute adjustment instead of a relative delta.
    pub counted_quantity: Option<Decimal>,
    /// Adjustment lines only
    pub reason: Option<String>,
}

/// An approvable business transaction composed of line items, gated by
/// the workflow state machine before it may mutate stock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub document_type: DocumentType,
    /// Unique per tenant, e.g. GR-000042
    pub document_number: String,
    pub warehouse_id: Uuid,
    pub status: DocumentStatus,
    pub lines: Vec<DocumentLine>,
    /// Derived: sum of line quantity * unit_cost where the cost is known
    pub total_amount: Decimal,
    pub created_by: Uuid,
    pub approved_by: Option<Uuid>,
    pub approved_at: Option<DateTime<Utc>>,
    pub cancelled_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
