//! Postgres-backed store
//!
//! All posting writes happen inside one transaction with the affected
//! balance rows locked `FOR UPDATE`. The per-product stock cache is
//! refreshed in the same transaction as the ledger write, never
//! independently.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{
    Document, DocumentLine, DocumentStatus, DocumentType, MovementLedgerEntry, StockBalance,
};
use crate::types::{MovementFilter, Pagination, StockKey};

use super::{InventoryStore, PostingCommit};

/// Store backed by a PostgreSQL pool
#[derive(Clone)]
pub struct PgStore {
    db: PgPool,
}

#[derive(sqlx::FromRow)]
struct DocumentHeaderRow {
    id: Uuid,
    tenant_id: Uuid,
    document_type: DocumentType,
    document_number: String,
    warehouse_id: Uuid,
    status: DocumentStatus,
    total_amount: Decimal,
    created_by: Uuid,
    approved_by: Option<Uuid>,
    approved_at: Option<DateTime<Utc>>,
    cancelled_reason: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl PgStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    fn document_from_row(row: DocumentHeaderRow, lines: Vec<DocumentLine>) -> Document {
        Document {
            id: row.id,
            tenant_id: row.tenant_id,
            document_type: row.document_type,
            document_number: row.document_number,
            warehouse_id: row.warehouse_id,
            status: row.status,
            lines,
            total_amount: row.total_amount,
            created_by: row.created_by,
            approved_by: row.approved_by,
            approved_at: row.approved_at,
            cancelled_reason: row.cancelled_reason,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }

    async fn fetch_lines(&self, document_id: Uuid) -> AppResult<Vec<DocumentLine>> {
        let lines = sqlx::query_as::<_, DocumentLine>(
            r#"
            SELECT product_id, quantity, unit_cost, direction, counted_quantity, reason
            FROM document_lines
            WHERE document_id = $1
            ORDER BY line_no
            "#,
        )
        .bind(document_id)
        .fetch_all(&self.db)
        .await?;

        Ok(lines)
    }
}

#[async_trait]
impl InventoryStore for PgStore {
    async fn get_balance(&self, key: &StockKey) -> AppResult<Option<StockBalance>> {
        let balance = sqlx::query_as::<_, StockBalance>(
            r#"
            SELECT tenant_id, product_id, warehouse_id, quantity, average_cost,
                   total_value, last_movement_at
            FROM stock_balances
            WHERE tenant_id = $1 AND product_id = $2 AND warehouse_id = $3
            "#,
        )
        .bind(key.tenant_id)
        .bind(key.product_id)
        .bind(key.warehouse_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(balance)
    }

    async fn list_movements(
        &self,
        tenant_id: Uuid,
        filter: &MovementFilter,
        page: &Pagination,
    ) -> AppResult<Vec<MovementLedgerEntry>> {
        let entries = sqlx::query_as::<_, MovementLedgerEntry>(
            r#"
            SELECT id, tenant_id, product_id, warehouse_id, movement_type, quantity,
                   unit_cost, balance_after, average_cost_after, reference_type,
                   reference_id, reference_number, user_id, created_at
            FROM movement_ledger
            WHERE tenant_id = $1
              AND ($2::uuid IS NULL OR product_id = $2)
              AND ($3::uuid IS NULL OR warehouse_id = $3)
              AND ($4::varchar IS NULL OR movement_type = $4)
              AND ($5::timestamptz IS NULL OR created_at >= $5)
              AND ($6::timestamptz IS NULL OR created_at <= $6)
            ORDER BY created_at DESC, id DESC
            OFFSET $7 LIMIT $8
            "#,
        )
        .bind(tenant_id)
        .bind(filter.product_id)
        .bind(filter.warehouse_id)
        .bind(filter.movement_type.map(|t| t.as_str()))
        .bind(filter.from)
        .bind(filter.to)
        .bind(page.offset())
        .bind(page.limit())
        .fetch_all(&self.db)
        .await?;

        Ok(entries)
    }

    async fn insert_document(&self, document: &Document) -> AppResult<()> {
        let mut tx = self.db.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO documents (
                id, tenant_id, document_type, document_number, warehouse_id, status,
                total_amount, created_by, approved_by, approved_at, cancelled_reason,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(document.id)
        .bind(document.tenant_id)
        .bind(document.document_type)
        .bind(&document.document_number)
        .bind(document.warehouse_id)
        .bind(document.status)
        .bind(document.total_amount)
        .bind(document.created_by)
        .bind(document.approved_by)
        .bind(document.approved_at)
        .bind(&document.cancelled_reason)
        .bind(document.created_at)
        .bind(document.updated_at)
        .execute(&mut *tx)
        .await?;

        for (line_no, line) in document.lines.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO document_lines (
                    document_id, line_no, product_id, quantity, unit_cost,
                    direction, counted_quantity, reason
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(document.id)
            .bind(line_no as i32)
            .bind(line.product_id)
            .bind(line.quantity)
            .bind(line.unit_cost)
            .bind(line.direction)
            .bind(line.counted_quantity)
            .bind(&line.reason)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn get_document(
        &self,
        tenant_id: Uuid,
        document_id: Uuid,
    ) -> AppResult<Option<Document>> {
        let row = sqlx::query_as::<_, DocumentHeaderRow>(
            r#"
            SELECT id, tenant_id, document_type, document_number, warehouse_id, status,
                   total_amount, created_by, approved_by, approved_at, cancelled_reason,
                   created_at, updated_at
            FROM documents
            WHERE id = $1 AND tenant_id = $2
            "#,
        )
        .bind(document_id)
        .bind(tenant_id)
        .fetch_optional(&self.db)
        .await?;

        match row {
            Some(row) => {
                let lines = self.fetch_lines(document_id).await?;
                Ok(Some(Self::document_from_row(row, lines)))
            }
            None => Ok(None),
        }
    }

    async fn update_document(
        &self,
        document: &Document,
        expected: DocumentStatus,
    ) -> AppResult<()> {
        let mut tx = self.db.begin().await?;

        let updated = sqlx::query(
            r#"
            UPDATE documents
            SET status = $1, total_amount = $2, approved_by = $3, approved_at = $4,
                cancelled_reason = $5, updated_at = $6
            WHERE id = $7 AND tenant_id = $8 AND status = $9
            "#,
        )
        .bind(document.status)
        .bind(document.total_amount)
        .bind(document.approved_by)
        .bind(document.approved_at)
        .bind(&document.cancelled_reason)
        .bind(document.updated_at)
        .bind(document.id)
        .bind(document.tenant_id)
        .bind(expected)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(AppError::ConcurrentModification(format!(
                "Document {} is no longer {}",
                document.document_number,
                expected.as_str()
            )));
        }

        sqlx::query("DELETE FROM document_lines WHERE document_id = $1")
            .bind(document.id)
            .execute(&mut *tx)
            .await?;

        for (line_no, line) in document.lines.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO document_lines (
                    document_id, line_no, product_id, quantity, unit_cost,
                    direction, counted_quantity, reason
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(document.id)
            .bind(line_no as i32)
            .bind(line.product_id)
            .bind(line.quantity)
            .bind(line.unit_cost)
            .bind(line.direction)
            .bind(line.counted_quantity)
            .bind(&line.reason)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn list_documents(
        &self,
        tenant_id: Uuid,
        status: Option<DocumentStatus>,
        document_type: Option<DocumentType>,
        page: &Pagination,
    ) -> AppResult<Vec<Document>> {
        let rows = sqlx::query_as::<_, DocumentHeaderRow>(
            r#"
            SELECT id, tenant_id, document_type, document_number, warehouse_id, status,
                   total_amount, created_by, approved_by, approved_at, cancelled_reason,
                   created_at, updated_at
            FROM documents
            WHERE tenant_id = $1
              AND ($2::varchar IS NULL OR status = $2)
              AND ($3::varchar IS NULL OR document_type = $3)
            ORDER BY created_at DESC
            OFFSET $4 LIMIT $5
            "#,
        )
        .bind(tenant_id)
        .bind(status.map(|s| s.as_str()))
        .bind(document_type.map(|t| t.as_str()))
        .bind(page.offset())
        .bind(page.limit())
        .fetch_all(&self.db)
        .await?;

        let mut documents = Vec::with_capacity(rows.len());
        for row in rows {
            let lines = self.fetch_lines(row.id).await?;
            documents.push(Self::document_from_row(row, lines));
        }

        Ok(documents)
    }

    async fn next_document_number(
        &self,
        tenant_id: Uuid,
        document_type: DocumentType,
    ) -> AppResult<i64> {
        let next: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO document_counters (tenant_id, document_type, next_value)
            VALUES ($1, $2, 1)
            ON CONFLICT (tenant_id, document_type)
            DO UPDATE SET next_value = document_counters.next_value + 1
            RETURNING next_value
            "#,
        )
        .bind(tenant_id)
        .bind(document_type)
        .fetch_one(&self.db)
        .await?;

        Ok(next)
    }

    async fn commit_posting(&self, commit: &PostingCommit) -> AppResult<()> {
        let mut tx = self.db.begin().await?;

        // Claim the document first; losing the status race aborts the
        // whole unit before any stock write
        if let Some(document) = &commit.document {
            let claimed = sqlx::query(
                r#"
                UPDATE documents
                SET status = $1, total_amount = $2, approved_by = $3, approved_at = $4,
                    updated_at = $5
                WHERE id = $6 AND tenant_id = $7 AND status = $8
                "#,
            )
            .bind(document.status)
            .bind(document.total_amount)
            .bind(document.approved_by)
            .bind(document.approved_at)
            .bind(document.updated_at)
            .bind(document.id)
            .bind(document.tenant_id)
            .bind(DocumentStatus::Pending)
            .execute(&mut *tx)
            .await?;

            if claimed.rows_affected() == 0 {
                return Err(AppError::InvalidStatusTransition(format!(
                    "Document {} is no longer pending",
                    document.document_number
                )));
            }

            // Approval derives line costs; persist them with the header
            sqlx::query("DELETE FROM document_lines WHERE document_id = $1")
                .bind(document.id)
                .execute(&mut *tx)
                .await?;
            for (line_no, line) in document.lines.iter().enumerate() {
                sqlx::query(
                    r#"
                    INSERT INTO document_lines (
                        document_id, line_no, product_id, quantity, unit_cost,
                        direction, counted_quantity, reason
                    )
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                    "#,
                )
                .bind(document.id)
                .bind(line_no as i32)
                .bind(line.product_id)
                .bind(line.quantity)
                .bind(line.unit_cost)
                .bind(line.direction)
                .bind(line.counted_quantity)
                .bind(&line.reason)
                .execute(&mut *tx)
                .await?;
            }
        }

        for balance in &commit.balances {
            // Row lock in case another process writes outside the
            // in-process lock manager
            sqlx::query(
                r#"
                SELECT 1 FROM stock_balances
                WHERE tenant_id = $1 AND product_id = $2 AND warehouse_id = $3
                FOR UPDATE
                "#,
            )
            .bind(balance.tenant_id)
            .bind(balance.product_id)
            .bind(balance.warehouse_id)
            .execute(&mut *tx)
            .await?;

            sqlx::query(
                r#"
                INSERT INTO stock_balances (
                    tenant_id, product_id, warehouse_id, quantity, average_cost,
                    total_value, last_movement_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                ON CONFLICT (tenant_id, product_id, warehouse_id)
                DO UPDATE SET quantity = $4, average_cost = $5, total_value = $6,
                              last_movement_at = $7
                "#,
            )
            .bind(balance.tenant_id)
            .bind(balance.product_id)
            .bind(balance.warehouse_id)
            .bind(balance.quantity)
            .bind(balance.average_cost)
            .bind(balance.total_value)
            .bind(balance.last_movement_at)
            .execute(&mut *tx)
            .await?;
        }

        for entry in &commit.entries {
            sqlx::query(
                r#"
                INSERT INTO movement_ledger (
                    id, tenant_id, product_id, warehouse_id, movement_type, quantity,
                    unit_cost, balance_after, average_cost_after, reference_type,
                    reference_id, reference_number, user_id, created_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
                "#,
            )
            .bind(entry.id)
            .bind(entry.tenant_id)
            .bind(entry.product_id)
            .bind(entry.warehouse_id)
            .bind(entry.movement_type)
            .bind(entry.quantity)
            .bind(entry.unit_cost)
            .bind(entry.balance_after)
            .bind(entry.average_cost_after)
            .bind(&entry.reference_type)
            .bind(entry.reference_id)
            .bind(&entry.reference_number)
            .bind(entry.user_id)
            .bind(entry.created_at)
            .execute(&mut *tx)
            .await?;
        }

        // Refresh the per-product cache from the authoritative balances
        for balance in &commit.balances {
            sqlx::query(
                r#"
                INSERT INTO product_stock_cache (tenant_id, product_id, on_hand, average_cost, updated_at)
                SELECT tenant_id, product_id, SUM(quantity),
                       CASE WHEN SUM(quantity) > 0 THEN SUM(total_value) / SUM(quantity) ELSE 0 END,
                       NOW()
                FROM stock_balances
                WHERE tenant_id = $1 AND product_id = $2
                GROUP BY tenant_id, product_id
                ON CONFLICT (tenant_id, product_id)
                DO UPDATE SET on_hand = EXCLUDED.on_hand,
                              average_cost = EXCLUDED.average_cost,
                              updated_at = EXCLUDED.updated_at
                "#,
            )
            .bind(balance.tenant_id)
            .bind(balance.product_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}
