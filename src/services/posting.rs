//! Ledger posting coordinator
//!
//! The sole writer of stock balances and movement ledger entries. For
//! each affected (tenant, product, warehouse) key the read-compute-write
//! cycle runs under the key's lock, and every posting unit commits
//! atomically through the store.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::config::{PostingConfig, StockConfig};
use crate::costing;
use crate::error::{AppError, AppResult};
use crate::lock::LockManager;
use crate::models::{
    AdjustmentDirection, Document, DocumentStatus, DocumentType, MovementLedgerEntry,
    MovementReference, MovementType, StockBalance,
};
use crate::store::{InventoryStore, PostingCommit};
use crate::types::{RequestContext, StockKey};

/// Input for posting a single movement outside the document workflow
#[derive(Debug, Clone)]
pub struct MovementRequest {
    pub product_id: Uuid,
    pub warehouse_id: Uuid,
    pub movement_type: MovementType,
    pub quantity: Decimal,
    /// Required for receipts; other inbound movements default to the
    /// current average cost
    pub unit_cost: Option<Decimal>,
    pub reference: MovementReference,
}

/// Ledger transaction coordinator
pub struct LedgerPoster {
    store: Arc<dyn InventoryStore>,
    locks: Arc<LockManager>,
    posting: PostingConfig,
    stock: StockConfig,
}

impl LedgerPoster {
    pub fn new(
        store: Arc<dyn InventoryStore>,
        locks: Arc<LockManager>,
        posting: PostingConfig,
        stock: StockConfig,
    ) -> Self {
        Self {
            store,
            locks,
            posting,
            stock,
        }
    }

    pub fn allows_negative_stock(&self) -> bool {
        self.stock.allow_negative_stock
    }

    /// Post one movement: lock the balance, run the costing function for
    /// the movement's direction, and commit balance update + ledger
    /// append as one atomic unit.
    pub async fn post_movement(
        &self,
        ctx: &RequestContext,
        request: MovementRequest,
    ) -> AppResult<MovementLedgerEntry> {
        if request.quantity <= Decimal::ZERO {
            return Err(AppError::Validation {
                field: "quantity".to_string(),
                message: "Quantity must be positive".to_string(),
            });
        }

        let key = StockKey::new(ctx.tenant_id, request.product_id, request.warehouse_id);
        let _guard = self.locks.acquire(&key).await?;

        let balance = self
            .store
            .get_balance(&key)
            .await?
            .unwrap_or_else(|| StockBalance::empty(key.clone()));

        let now = Utc::now();
        let (mut next, entry_cost, signed_quantity) = self.apply_movement(
            &balance,
            request.movement_type,
            request.quantity,
            request.unit_cost,
        )?;
        next.last_movement_at = Some(now);

        let entry = MovementLedgerEntry {
            id: Uuid::new_v4(),
            tenant_id: ctx.tenant_id,
            product_id: request.product_id,
            warehouse_id: request.warehouse_id,
            movement_type: request.movement_type,
            quantity: signed_quantity,
            unit_cost: entry_cost,
            balance_after: next.quantity,
            average_cost_after: next.average_cost,
            reference_type: request.reference.reference_type.clone(),
            reference_id: request.reference.reference_id,
            reference_number: request.reference.reference_number.clone(),
            user_id: ctx.user_id,
            created_at: now,
        };

        self.store
            .commit_posting(&PostingCommit {
                balances: vec![next],
                entries: vec![entry.clone()],
                document: None,
            })
            .await?;

        tracing::info!(
            movement_type = request.movement_type.as_str(),
            product_id = %request.product_id,
            warehouse_id = %request.warehouse_id,
            quantity = %signed_quantity,
            balance_after = %entry.balance_after,
            "posted movement"
        );

        Ok(entry)
    }

    /// Post all lines of a PENDING document and mark it approved, as one
    /// atomic unit. Retries internally on lock contention before
    /// surfacing `ConcurrentModification`.
    pub async fn post_document(
        &self,
        ctx: &RequestContext,
        document: &Document,
    ) -> AppResult<Document> {
        let mut attempt = 0;
        loop {
            match self.try_post_document(ctx, document).await {
                Err(AppError::ConcurrentModification(reason))
                    if attempt < self.posting.retry_attempts =>
                {
                    attempt += 1;
                    tracing::warn!(
                        document_number = %document.document_number,
                        attempt,
                        %reason,
                        "approval hit lock contention, retrying"
                    );
                    tokio::time::sleep(self.posting.retry_backoff() * attempt).await;
                }
                other => return other,
            }
        }
    }

    async fn try_post_document(
        &self,
        ctx: &RequestContext,
        document: &Document,
    ) -> AppResult<Document> {
        let fresh = self.load_pending(ctx, document.id).await?;
        let keys: Vec<StockKey> = fresh
            .lines
            .iter()
            .map(|line| StockKey::new(ctx.tenant_id, line.product_id, fresh.warehouse_id))
            .collect();
        let _guards = self.locks.acquire_many(&keys).await?;

        // Re-verify under the locks; a rival approval or cancellation
        // may have landed between load and acquisition
        let current = self.load_pending(ctx, document.id).await?;
        for line in &current.lines {
            let key = StockKey::new(ctx.tenant_id, line.product_id, current.warehouse_id);
            if !keys.contains(&key) {
                return Err(AppError::ConcurrentModification(format!(
                    "Document {} lines changed during approval",
                    current.document_number
                )));
            }
        }

        let mut working: HashMap<StockKey, StockBalance> = HashMap::new();
        for key in &keys {
            if !working.contains_key(key) {
                let balance = self
                    .store
                    .get_balance(key)
                    .await?
                    .unwrap_or_else(|| StockBalance::empty(key.clone()));
                working.insert(key.clone(), balance);
            }
        }

        let now = Utc::now();
        let mut entries = Vec::with_capacity(current.lines.len());
        let mut posted_value = Decimal::ZERO;

        let mut approved = current;
        approved.status = DocumentStatus::Approved;
        approved.approved_by = Some(ctx.user_id);
        approved.approved_at = Some(now);
        approved.updated_at = now;

        // Lines post in document order; any failure aborts the whole
        // approval with nothing written
        for idx in 0..approved.lines.len() {
            let line = approved.lines[idx].clone();
            let key = StockKey::new(ctx.tenant_id, line.product_id, approved.warehouse_id);
            let balance = working
                .get(&key)
                .cloned()
                .unwrap_or_else(|| StockBalance::empty(key.clone()));

            let outcome = match approved.document_type {
                DocumentType::GoodsReceipt => {
                    let cost = line.unit_cost.ok_or_else(|| AppError::Validation {
                        field: "unit_cost".to_string(),
                        message: "Receipt lines require a unit cost".to_string(),
                    })?;
                    let next = costing::apply_receipt(&balance, line.quantity, cost);
                    Some((next, costing::round_cost(cost), line.quantity, MovementType::Receipt))
                }
                DocumentType::GoodsIssue => {
                    let issued = costing::apply_issue(
                        &balance,
                        line.quantity,
                        self.stock.allow_negative_stock,
                    )?;
                    let cost = costing::round_cost(balance.average_cost);
                    Some((issued.balance, cost, -line.quantity, MovementType::Issue))
                }
                DocumentType::StockAdjustment => {
                    self.apply_adjustment_line(&balance, &line)?
                }
            };

            let Some((mut next, entry_cost, signed_quantity, movement_type)) = outcome else {
                // Count confirmed the book quantity; no stock effect,
                // but the line still records the cost it was valued at
                approved.lines[idx].unit_cost = Some(costing::round_cost(balance.average_cost));
                continue;
            };
            next.last_movement_at = Some(now);

            // Issue and adjustment costs are derived at approval time
            approved.lines[idx].unit_cost = Some(entry_cost);
            posted_value += signed_quantity.abs() * entry_cost;

            entries.push(MovementLedgerEntry {
                id: Uuid::new_v4(),
                tenant_id: ctx.tenant_id,
                product_id: line.product_id,
                warehouse_id: approved.warehouse_id,
                movement_type,
                quantity: signed_quantity,
                unit_cost: entry_cost,
                balance_after: next.quantity,
                average_cost_after: next.average_cost,
                reference_type: Some(approved.document_type.as_str().to_string()),
                reference_id: Some(approved.id),
                reference_number: Some(approved.document_number.clone()),
                user_id: ctx.user_id,
                created_at: now,
            });
            working.insert(key, next);
        }

        approved.total_amount = costing::round_value(posted_value);

        self.store
            .commit_posting(&PostingCommit {
                balances: working.into_values().collect(),
                entries,
                document: Some(approved.clone()),
            })
            .await?;

        tracing::info!(
            document_number = %approved.document_number,
            document_type = approved.document_type.as_str(),
            lines = approved.lines.len(),
            "posted document"
        );

        Ok(approved)
    }

    async fn load_pending(&self, ctx: &RequestContext, document_id: Uuid) -> AppResult<Document> {
        let document = self
            .store
            .get_document(ctx.tenant_id, document_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Document".to_string()))?;
        if document.status != DocumentStatus::Pending {
            return Err(AppError::InvalidStatusTransition(format!(
                "Cannot approve a {} document",
                document.status.as_str()
            )));
        }
        Ok(document)
    }

    fn apply_movement(
        &self,
        balance: &StockBalance,
        movement_type: MovementType,
        quantity: Decimal,
        unit_cost: Option<Decimal>,
    ) -> AppResult<(StockBalance, Decimal, Decimal)> {
        use crate::models::MovementDirection;

        match movement_type.direction() {
            MovementDirection::Inbound => {
                let cost = match unit_cost {
                    Some(cost) if cost >= Decimal::ZERO => cost,
                    Some(_) => {
                        return Err(AppError::Validation {
                            field: "unit_cost".to_string(),
                            message: "Unit cost cannot be negative".to_string(),
                        })
                    }
                    // Non-receipt inbound movements value stock at the
                    // current average when no cost is given
                    None if movement_type != MovementType::Receipt => balance.average_cost,
                    None => {
                        return Err(AppError::Validation {
                            field: "unit_cost".to_string(),
                            message: "Receipts require a unit cost".to_string(),
                        })
                    }
                };
                let next = costing::apply_receipt(balance, quantity, cost);
                Ok((next, costing::round_cost(cost), quantity))
            }
            MovementDirection::Outbound => {
                let issued =
                    costing::apply_issue(balance, quantity, self.stock.allow_negative_stock)?;
                let cost = costing::round_cost(balance.average_cost);
                Ok((issued.balance, cost, -quantity))
            }
        }
    }

    /// Adjustment lines come in two shapes: a relative delta with an
    /// explicit direction, or an absolute observed count. Returns None
    /// when an absolute count matches the book quantity exactly.
    fn apply_adjustment_line(
        &self,
        balance: &StockBalance,
        line: &crate::models::DocumentLine,
    ) -> AppResult<Option<(StockBalance, Decimal, Decimal, MovementType)>> {
        if let Some(counted) = line.counted_quantity {
            let outcome = costing::apply_absolute_adjustment(balance, counted);
            if outcome.quantity_delta.is_zero() {
                return Ok(None);
            }
            let movement_type = if outcome.quantity_delta > Decimal::ZERO {
                MovementType::AdjustmentIn
            } else {
                MovementType::AdjustmentOut
            };
            let cost = costing::round_cost(balance.average_cost);
            return Ok(Some((
                outcome.balance,
                cost,
                outcome.quantity_delta,
                movement_type,
            )));
        }

        match line.direction {
            Some(AdjustmentDirection::In) => {
                let cost = line.unit_cost.unwrap_or(balance.average_cost);
                let next = costing::apply_receipt(balance, line.quantity, cost);
                Ok(Some((
                    next,
                    costing::round_cost(cost),
                    line.quantity,
                    MovementType::AdjustmentIn,
                )))
            }
            Some(AdjustmentDirection::Out) => {
                let issued = costing::apply_issue(
                    balance,
                    line.quantity,
                    self.stock.allow_negative_stock,
                )?;
                let cost = costing::round_cost(balance.average_cost);
                Ok(Some((
                    issued.balance,
                    cost,
                    -line.quantity,
                    MovementType::AdjustmentOut,
                )))
            }
            None => Err(AppError::Validation {
                field: "direction".to_string(),
                message: "Adjustment lines need a direction or a counted quantity".to_string(),
            }),
        }
    }
}
