//! Document workflow service
//!
//! Drives goods receipts, goods issues, and stock adjustments through
//! draft -> pending -> approved/cancelled. Approval is the only
//! transition that touches the ledger, and it delegates to the posting
//! coordinator.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use crate::config::WorkflowConfig;
use crate::costing::round_value;
use crate::error::{AppError, AppResult};
use crate::master_data::MasterData;
use crate::models::{
    AdjustmentDirection, Document, DocumentLine, DocumentStatus, DocumentType,
    MovementLedgerEntry, StockBalance,
};
use crate::services::posting::LedgerPoster;
use crate::store::InventoryStore;
use crate::types::{MovementFilter, Pagination, RequestContext, StockKey};

/// Input for creating a document
#[derive(Debug, Deserialize)]
pub struct CreateDocumentInput {
    pub document_type: DocumentType,
    pub warehouse_id: Uuid,
    #[serde(default)]
    pub lines: Vec<DocumentLine>,
}

/// Document workflow service
pub struct DocumentService {
    store: Arc<dyn InventoryStore>,
    master_data: Arc<dyn MasterData>,
    poster: Arc<LedgerPoster>,
    workflow: WorkflowConfig,
}

impl DocumentService {
    pub fn new(
        store: Arc<dyn InventoryStore>,
        master_data: Arc<dyn MasterData>,
        poster: Arc<LedgerPoster>,
        workflow: WorkflowConfig,
    ) -> Self {
        Self {
            store,
            master_data,
            poster,
            workflow,
        }
    }

    /// Create a DRAFT document. Lines may be empty at this point; submit
    /// requires at least one.
    pub async fn create_document(
        &self,
        ctx: &RequestContext,
        input: CreateDocumentInput,
    ) -> AppResult<Document> {
        let warehouse_known = self
            .master_data
            .warehouse_exists(ctx.tenant_id, input.warehouse_id)
            .await?;
        if !warehouse_known {
            return Err(AppError::NotFound("Warehouse".to_string()));
        }

        validate_lines(input.document_type, &input.lines)?;

        let sequence = self
            .store
            .next_document_number(ctx.tenant_id, input.document_type)
            .await?;
        let document_number = format!("{}-{:06}", input.document_type.number_prefix(), sequence);

        let now = Utc::now();
        let document = Document {
            id: Uuid::new_v4(),
            tenant_id: ctx.tenant_id,
            document_type: input.document_type,
            document_number,
            warehouse_id: input.warehouse_id,
            status: DocumentStatus::Draft,
            total_amount: total_amount(&input.lines),
            lines: input.lines,
            created_by: ctx.user_id,
            approved_by: None,
            approved_at: None,
            cancelled_reason: None,
            created_at: now,
            updated_at: now,
        };

        self.store.insert_document(&document).await?;

        tracing::info!(
            document_number = %document.document_number,
            document_type = document.document_type.as_str(),
            "created document"
        );

        Ok(document)
    }

    /// Replace a document's lines. Legal while DRAFT; PENDING documents
    /// are frozen unless the workflow is configured otherwise.
    pub async fn update_lines(
        &self,
        ctx: &RequestContext,
        document_id: Uuid,
        lines: Vec<DocumentLine>,
    ) -> AppResult<Document> {
        let mut document = self.load_document(ctx, document_id).await?;
        let prior_status = document.status;

        let mutable = document.status == DocumentStatus::Draft
            || (document.status == DocumentStatus::Pending && self.workflow.pending_lines_mutable);
        if !mutable {
            return Err(AppError::InvalidStatusTransition(format!(
                "Cannot edit lines of a {} document",
                document.status.as_str()
            )));
        }

        validate_lines(document.document_type, &lines)?;

        document.total_amount = total_amount(&lines);
        document.lines = lines;
        document.updated_at = Utc::now();

        // A pending document already passed the submit-time checks; its
        // replacement lines have to pass them too
        if prior_status == DocumentStatus::Pending {
            self.check_products_resolve(ctx, &document).await?;
            if !self.poster.allows_negative_stock() {
                self.precheck_outbound(ctx, &document).await?;
            }
        }

        self.store.update_document(&document, prior_status).await?;

        Ok(document)
    }

    /// DRAFT -> PENDING. Checks lines are present, products resolve, and
    /// outbound quantities fit the balances as of now. The balance check
    /// is advisory; the authoritative one re-runs under lock at approval.
    pub async fn submit(&self, ctx: &RequestContext, document_id: Uuid) -> AppResult<Document> {
        let mut document = self.load_document(ctx, document_id).await?;

        if document.status != DocumentStatus::Draft {
            return Err(AppError::InvalidStatusTransition(format!(
                "Cannot submit a {} document",
                document.status.as_str()
            )));
        }

        if document.lines.is_empty() {
            return Err(AppError::ValidationError(
                "Cannot submit a document with no lines".to_string(),
            ));
        }

        self.check_products_resolve(ctx, &document).await?;

        if !self.poster.allows_negative_stock() {
            self.precheck_outbound(ctx, &document).await?;
        }

        document.status = DocumentStatus::Pending;
        document.updated_at = Utc::now();
        self.store
            .update_document(&document, DocumentStatus::Draft)
            .await?;

        tracing::info!(document_number = %document.document_number, "submitted document");

        Ok(document)
    }

    /// PENDING -> APPROVED. Posts all lines atomically; any line failure
    /// leaves balances and ledger untouched.
    pub async fn approve(&self, ctx: &RequestContext, document_id: Uuid) -> AppResult<Document> {
        let document = self.load_document(ctx, document_id).await?;

        if document.status != DocumentStatus::Pending {
            return Err(AppError::InvalidStatusTransition(format!(
                "Cannot approve a {} document",
                document.status.as_str()
            )));
        }

        if ctx.user_id == document.created_by {
            return Err(AppError::SelfApprovalNotAllowed(format!(
                "Document {} cannot be approved by its creator",
                document.document_number
            )));
        }

        let approved = self.poster.post_document(ctx, &document).await?;

        tracing::info!(
            document_number = %approved.document_number,
            approved_by = %ctx.user_id,
            "approved document"
        );

        Ok(approved)
    }

    /// {DRAFT, PENDING} -> CANCELLED. Nothing has been posted before
    /// approval, so cancellation never touches the ledger.
    pub async fn cancel(
        &self,
        ctx: &RequestContext,
        document_id: Uuid,
        reason: &str,
    ) -> AppResult<Document> {
        let document = self.load_document(ctx, document_id).await?;
        self.cancel_document(document, reason).await
    }

    /// Reject a PENDING document. Same mechanics as cancel, distinct
    /// label for the audit trail.
    pub async fn reject(
        &self,
        ctx: &RequestContext,
        document_id: Uuid,
        reason: &str,
    ) -> AppResult<Document> {
        let document = self.load_document(ctx, document_id).await?;

        if document.status != DocumentStatus::Pending {
            return Err(AppError::InvalidStatusTransition(format!(
                "Cannot reject a {} document",
                document.status.as_str()
            )));
        }

        tracing::info!(document_number = %document.document_number, "rejecting document");
        self.cancel_document(document, reason).await
    }

    /// Current balance for a product in a warehouse; zero-valued when no
    /// movement has created it yet
    pub async fn get_balance(
        &self,
        ctx: &RequestContext,
        product_id: Uuid,
        warehouse_id: Uuid,
    ) -> AppResult<StockBalance> {
        let key = StockKey::new(ctx.tenant_id, product_id, warehouse_id);
        Ok(self
            .store
            .get_balance(&key)
            .await?
            .unwrap_or_else(|| StockBalance::empty(key)))
    }

    /// Ledger entries for the tenant, filtered and paginated
    pub async fn list_movements(
        &self,
        ctx: &RequestContext,
        filter: &MovementFilter,
        page: &Pagination,
    ) -> AppResult<Vec<MovementLedgerEntry>> {
        self.store.list_movements(ctx.tenant_id, filter, page).await
    }

    pub async fn get_document(
        &self,
        ctx: &RequestContext,
        document_id: Uuid,
    ) -> AppResult<Document> {
        self.load_document(ctx, document_id).await
    }

    pub async fn list_documents(
        &self,
        ctx: &RequestContext,
        status: Option<DocumentStatus>,
        document_type: Option<DocumentType>,
        page: &Pagination,
    ) -> AppResult<Vec<Document>> {
        self.store
            .list_documents(ctx.tenant_id, status, document_type, page)
            .await
    }

    async fn load_document(
        &self,
        ctx: &RequestContext,
        document_id: Uuid,
    ) -> AppResult<Document> {
        self.store
            .get_document(ctx.tenant_id, document_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Document".to_string()))
    }

    async fn cancel_document(&self, mut document: Document, reason: &str) -> AppResult<Document> {
        if reason.trim().is_empty() {
            return Err(AppError::Validation {
                field: "reason".to_string(),
                message: "A cancellation reason is required".to_string(),
            });
        }

        if document.status.is_terminal() {
            return Err(AppError::InvalidStatusTransition(format!(
                "Cannot cancel a {} document",
                document.status.as_str()
            )));
        }

        let prior_status = document.status;
        document.status = DocumentStatus::Cancelled;
        document.cancelled_reason = Some(reason.trim().to_string());
        document.updated_at = Utc::now();
        self.store.update_document(&document, prior_status).await?;

        tracing::info!(document_number = %document.document_number, "cancelled document");

        Ok(document)
    }

    async fn check_products_resolve(
        &self,
        ctx: &RequestContext,
        document: &Document,
    ) -> AppResult<()> {
        for line in &document.lines {
            let known = self
                .master_data
                .product_exists(ctx.tenant_id, line.product_id)
                .await?;
            if !known {
                return Err(AppError::NotFound(format!("Product {}", line.product_id)));
            }
        }
        Ok(())
    }

    /// Check that outbound lines fit the balances as of submit time.
    /// Multiple lines on one product accumulate against a projected
    /// quantity.
    async fn precheck_outbound(&self, ctx: &RequestContext, document: &Document) -> AppResult<()> {
        let mut projected: HashMap<StockKey, Decimal> = HashMap::new();

        for line in &document.lines {
            let decrease = match document.document_type {
                DocumentType::GoodsIssue => line.quantity,
                DocumentType::StockAdjustment => match (line.counted_quantity, line.direction) {
                    // Absolute counts are >= 0 by validation; they can
                    // never drive the balance negative
                    (Some(_), _) => continue,
                    (None, Some(AdjustmentDirection::Out)) => line.quantity,
                    _ => continue,
                },
                DocumentType::GoodsReceipt => continue,
            };

            let key = StockKey::new(ctx.tenant_id, line.product_id, document.warehouse_id);
            let remaining = match projected.get(&key).copied() {
                Some(quantity) => quantity,
                None => self
                    .store
                    .get_balance(&key)
                    .await?
                    .map(|b| b.quantity)
                    .unwrap_or(Decimal::ZERO),
            };

            if decrease > remaining {
                return Err(AppError::InsufficientStock(format!(
                    "Product {}: requested {} but only {} on hand",
                    line.product_id, decrease, remaining
                )));
            }
            projected.insert(key, remaining - decrease);
        }

        Ok(())
    }
}

fn total_amount(lines: &[DocumentLine]) -> Decimal {
    let total = lines
        .iter()
        .filter_map(|line| line.unit_cost.map(|cost| line.quantity * cost))
        .sum();
    round_value(total)
}

fn validate_lines(document_type: DocumentType, lines: &[DocumentLine]) -> AppResult<()> {
    for line in lines {
        // Absolute-count adjustment lines carry their meaning in
        // counted_quantity; the quantity field is unused there
        if line.counted_quantity.is_none() && line.quantity <= Decimal::ZERO {
            return Err(AppError::Validation {
                field: "quantity".to_string(),
                message: "Line quantity must be positive".to_string(),
            });
        }

        if let Some(cost) = line.unit_cost {
            if cost < Decimal::ZERO {
                return Err(AppError::Validation {
                    field: "unit_cost".to_string(),
                    message: "Unit cost cannot be negative".to_string(),
                });
            }
        }

        match document_type {
            DocumentType::GoodsReceipt => {
                if line.unit_cost.is_none() {
                    return Err(AppError::Validation {
                        field: "unit_cost".to_string(),
                        message: "Receipt lines require a unit cost".to_string(),
                    });
                }
                if line.counted_quantity.is_some() || line.direction.is_some() {
                    return Err(AppError::Validation {
                        field: "counted_quantity".to_string(),
                        message: "Counted quantities and directions only apply to adjustments"
                            .to_string(),
                    });
                }
            }
            DocumentType::GoodsIssue => {
                if line.counted_quantity.is_some() || line.direction.is_some() {
                    return Err(AppError::Validation {
                        field: "counted_quantity".to_string(),
                        message: "Counted quantities and directions only apply to adjustments"
                            .to_string(),
                    });
                }
            }
            DocumentType::StockAdjustment => {
                if line.reason.as_deref().map_or(true, |r| r.trim().is_empty()) {
                    return Err(AppError::Validation {
                        field: "reason".to_string(),
                        message: "Adjustment lines require a reason".to_string(),
                    });
                }
                if line.direction.is_none() && line.counted_quantity.is_none() {
                    return Err(AppError::Validation {
                        field: "direction".to_string(),
                        message: "Adjustment lines need a direction or a counted quantity"
                            .to_string(),
                    });
                }
                if line.counted_quantity.map_or(false, |c| c < Decimal::ZERO) {
                    return Err(AppError::Validation {
                        field: "counted_quantity".to_string(),
                        message: "Counted quantity cannot be negative".to_string(),
                    });
                }
            }
        }
    }

    Ok(())
}
