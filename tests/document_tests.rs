//! Document workflow tests
//!
//! State machine legality, document numbering, line validation, and the
//! approval scenario from end to end against the in-memory store.

use std::sync::Arc;

use uuid::Uuid;

use warehouse_ledger::config::WorkflowConfig;
use warehouse_ledger::models::{DocumentStatus, DocumentType};
use warehouse_ledger::types::Pagination;
use warehouse_ledger::{AppError, CreateDocumentInput, InventoryStore};

mod common;
use common::{ctx, dec, harness, harness_with, issue_line, receipt_line, Fixed, HarnessOptions};

fn receipt_input(warehouse_id: Uuid, lines: Vec<warehouse_ledger::models::DocumentLine>) -> CreateDocumentInput {
    CreateDocumentInput {
        document_type: DocumentType::GoodsReceipt,
        warehouse_id,
        lines,
    }
}

#[tokio::test]
async fn create_assigns_sequential_numbers_per_type() {
    let h = harness();
    let tenant = Uuid::new_v4();
    let user = Uuid::new_v4();
    let warehouse = Uuid::new_v4();
    let product = Uuid::new_v4();
    let ctx = ctx(tenant, user);

    let d1 = h
        .service
        .create_document(&ctx, receipt_input(warehouse, vec![receipt_line(product, "1", "10")]))
        .await
        .unwrap();
    let d2 = h
        .service
        .create_document(&ctx, receipt_input(warehouse, vec![receipt_line(product, "1", "10")]))
        .await
        .unwrap();
    let d3 = h
        .service
        .create_document(
            &ctx,
            CreateDocumentInput {
                document_type: DocumentType::StockAdjustment,
                warehouse_id: warehouse,
                lines: vec![],
            },
        )
        .await
        .unwrap();

    assert_eq!(d1.document_number, "GR-000001");
    assert_eq!(d2.document_number, "GR-000002");
    // Each type has its own counter
    assert_eq!(d3.document_number, "ADJ-000001");
    assert_eq!(d1.status, DocumentStatus::Draft);
    assert_eq!(d1.total_amount, dec("10.00"));
}

#[tokio::test]
async fn create_rejects_unknown_warehouse() {
    let known_warehouse = Uuid::new_v4();
    let h = harness_with(
        HarnessOptions::default(),
        Arc::new(Fixed {
            products: vec![],
            warehouses: vec![known_warehouse],
        }),
    );
    let ctx = ctx(Uuid::new_v4(), Uuid::new_v4());

    let err = h
        .service
        .create_document(&ctx, receipt_input(Uuid::new_v4(), vec![]))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn create_rejects_receipt_line_without_cost() {
    let h = harness();
    let ctx = ctx(Uuid::new_v4(), Uuid::new_v4());

    let err = h
        .service
        .create_document(
            &ctx,
            receipt_input(Uuid::new_v4(), vec![issue_line(Uuid::new_v4(), "5")]),
        )
        .await
        .unwrap_err();

    assert_eq!(err.code(), "VALIDATION_ERROR");
    let detail = err.detail();
    assert_eq!(detail.field.as_deref(), Some("unit_cost"));
}

#[tokio::test]
async fn update_lines_allowed_while_draft() {
    let h = harness();
    let ctx = ctx(Uuid::new_v4(), Uuid::new_v4());
    let warehouse = Uuid::new_v4();
    let product = Uuid::new_v4();

    let doc = h
        .service
        .create_document(&ctx, receipt_input(warehouse, vec![]))
        .await
        .unwrap();

    let updated = h
        .service
        .update_lines(&ctx, doc.id, vec![receipt_line(product, "3", "7.50")])
        .await
        .unwrap();

    assert_eq!(updated.lines.len(), 1);
    assert_eq!(updated.total_amount, dec("22.50"));
}

#[tokio::test]
async fn update_lines_frozen_once_pending() {
    let h = harness();
    let ctx = ctx(Uuid::new_v4(), Uuid::new_v4());
    let warehouse = Uuid::new_v4();
    let product = Uuid::new_v4();

    let doc = h
        .service
        .create_document(&ctx, receipt_input(warehouse, vec![receipt_line(product, "1", "5")]))
        .await
        .unwrap();
    h.service.submit(&ctx, doc.id).await.unwrap();

    let err = h
        .service
        .update_lines(&ctx, doc.id, vec![receipt_line(product, "2", "5")])
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::InvalidStatusTransition(_)));
}

#[tokio::test]
async fn update_lines_on_pending_allowed_when_configured() {
    let h = harness_with(
        HarnessOptions {
            workflow: WorkflowConfig {
                pending_lines_mutable: true,
            },
            ..Default::default()
        },
        Arc::new(common::AllKnown),
    );
    let ctx = ctx(Uuid::new_v4(), Uuid::new_v4());
    let warehouse = Uuid::new_v4();
    let product = Uuid::new_v4();

    let doc = h
        .service
        .create_document(&ctx, receipt_input(warehouse, vec![receipt_line(product, "1", "5")]))
        .await
        .unwrap();
    h.service.submit(&ctx, doc.id).await.unwrap();

    let updated = h
        .service
        .update_lines(&ctx, doc.id, vec![receipt_line(product, "2", "5")])
        .await
        .unwrap();

    assert_eq!(updated.lines[0].quantity, dec("2"));
}

#[tokio::test]
async fn update_lines_on_pending_re_runs_submit_checks() {
    let warehouse = Uuid::new_v4();
    let product = Uuid::new_v4();
    let h = harness_with(
        HarnessOptions {
            workflow: WorkflowConfig {
                pending_lines_mutable: true,
            },
            ..Default::default()
        },
        Arc::new(Fixed {
            products: vec![product],
            warehouses: vec![warehouse],
        }),
    );
    let ctx = ctx(Uuid::new_v4(), Uuid::new_v4());

    let receipt = h
        .service
        .create_document(&ctx, receipt_input(warehouse, vec![receipt_line(product, "1", "5")]))
        .await
        .unwrap();
    h.service.submit(&ctx, receipt.id).await.unwrap();

    // Swapping in an unresolvable product is caught just like at submit
    let err = h
        .service
        .update_lines(&ctx, receipt.id, vec![receipt_line(Uuid::new_v4(), "1", "5")])
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    // So is raising an outbound quantity past the current balance
    h.poster
        .post_movement(
            &ctx,
            warehouse_ledger::MovementRequest {
                product_id: product,
                warehouse_id: warehouse,
                movement_type: warehouse_ledger::models::MovementType::Receipt,
                quantity: dec("10"),
                unit_cost: Some(dec("1")),
                reference: warehouse_ledger::models::MovementReference::default(),
            },
        )
        .await
        .unwrap();
    let issue = h
        .service
        .create_document(
            &ctx,
            CreateDocumentInput {
                document_type: DocumentType::GoodsIssue,
                warehouse_id: warehouse,
                lines: vec![issue_line(product, "5")],
            },
        )
        .await
        .unwrap();
    h.service.submit(&ctx, issue.id).await.unwrap();

    let err = h
        .service
        .update_lines(&ctx, issue.id, vec![issue_line(product, "50")])
        .await
        .unwrap_err();
    assert_eq!(err.code(), "INSUFFICIENT_STOCK");
}

#[tokio::test]
async fn stale_status_write_is_rejected() {
    let h = harness();
    let ctx = ctx(Uuid::new_v4(), Uuid::new_v4());
    let warehouse = Uuid::new_v4();
    let product = Uuid::new_v4();

    let doc = h
        .service
        .create_document(&ctx, receipt_input(warehouse, vec![receipt_line(product, "1", "5")]))
        .await
        .unwrap();
    h.service.submit(&ctx, doc.id).await.unwrap();

    // A writer still holding the draft snapshot lost the race to submit
    let mut stale = doc.clone();
    stale.status = DocumentStatus::Cancelled;
    stale.cancelled_reason = Some("duplicate".to_string());
    let err = h
        .store
        .update_document(&stale, DocumentStatus::Draft)
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::ConcurrentModification(_)));

    let current = h.service.get_document(&ctx, doc.id).await.unwrap();
    assert_eq!(current.status, DocumentStatus::Pending);
}

#[tokio::test]
async fn submit_requires_lines() {
    let h = harness();
    let ctx = ctx(Uuid::new_v4(), Uuid::new_v4());

    let doc = h
        .service
        .create_document(&ctx, receipt_input(Uuid::new_v4(), vec![]))
        .await
        .unwrap();

    let err = h.service.submit(&ctx, doc.id).await.unwrap_err();
    assert_eq!(err.code(), "VALIDATION_ERROR");
}

#[tokio::test]
async fn submit_rejects_unknown_product() {
    let warehouse = Uuid::new_v4();
    let h = harness_with(
        HarnessOptions::default(),
        Arc::new(Fixed {
            products: vec![],
            warehouses: vec![warehouse],
        }),
    );
    let ctx = ctx(Uuid::new_v4(), Uuid::new_v4());

    let doc = h
        .service
        .create_document(
            &ctx,
            receipt_input(warehouse, vec![receipt_line(Uuid::new_v4(), "1", "5")]),
        )
        .await
        .unwrap();

    let err = h.service.submit(&ctx, doc.id).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn submit_prechecks_outbound_against_current_balance() {
    let h = harness();
    let ctx = ctx(Uuid::new_v4(), Uuid::new_v4());
    let warehouse = Uuid::new_v4();
    let product = Uuid::new_v4();

    let doc = h
        .service
        .create_document(
            &ctx,
            CreateDocumentInput {
                document_type: DocumentType::GoodsIssue,
                warehouse_id: warehouse,
                lines: vec![issue_line(product, "5")],
            },
        )
        .await
        .unwrap();

    // No stock has ever been received for this product
    let err = h.service.submit(&ctx, doc.id).await.unwrap_err();
    assert_eq!(err.code(), "INSUFFICIENT_STOCK");
}

#[tokio::test]
async fn approval_scenario_end_to_end() {
    let h = harness();
    let tenant = Uuid::new_v4();
    let user_a = Uuid::new_v4();
    let user_b = Uuid::new_v4();
    let warehouse = Uuid::new_v4();
    let product = Uuid::new_v4();
    let ctx_a = ctx(tenant, user_a);
    let ctx_b = ctx(tenant, user_b);

    // Goods receipt: 50 units of P at 10.00, created by A
    let doc = h
        .service
        .create_document(
            &ctx_a,
            receipt_input(warehouse, vec![receipt_line(product, "50", "10.00")]),
        )
        .await
        .unwrap();
    h.service.submit(&ctx_a, doc.id).await.unwrap();

    // A cannot approve their own document
    let err = h.service.approve(&ctx_a, doc.id).await.unwrap_err();
    assert!(matches!(err, AppError::SelfApprovalNotAllowed(_)));

    // B approves; the balance materializes
    let approved = h.service.approve(&ctx_b, doc.id).await.unwrap();
    assert_eq!(approved.status, DocumentStatus::Approved);
    assert_eq!(approved.approved_by, Some(user_b));
    assert!(approved.approved_at.is_some());

    let balance = h.service.get_balance(&ctx_a, product, warehouse).await.unwrap();
    assert_eq!(balance.quantity, dec("50"));
    assert_eq!(balance.average_cost, dec("10.0000"));
    assert_eq!(balance.total_value, dec("500.00"));

    // Approving an already approved document is illegal
    let err = h.service.approve(&ctx_b, doc.id).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidStatusTransition(_)));
}

#[tokio::test]
async fn approve_requires_pending_status() {
    let h = harness();
    let tenant = Uuid::new_v4();
    let ctx_a = ctx(tenant, Uuid::new_v4());
    let ctx_b = ctx(tenant, Uuid::new_v4());
    let warehouse = Uuid::new_v4();
    let product = Uuid::new_v4();

    let doc = h
        .service
        .create_document(
            &ctx_a,
            receipt_input(warehouse, vec![receipt_line(product, "1", "5")]),
        )
        .await
        .unwrap();

    // Still DRAFT
    let err = h.service.approve(&ctx_b, doc.id).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidStatusTransition(_)));
}

#[tokio::test]
async fn cancel_from_draft_and_pending() {
    let h = harness();
    let ctx = ctx(Uuid::new_v4(), Uuid::new_v4());
    let warehouse = Uuid::new_v4();
    let product = Uuid::new_v4();

    let draft = h
        .service
        .create_document(
            &ctx,
            receipt_input(warehouse, vec![receipt_line(product, "1", "5")]),
        )
        .await
        .unwrap();
    let cancelled = h
        .service
        .cancel(&ctx, draft.id, "ordered in error")
        .await
        .unwrap();
    assert_eq!(cancelled.status, DocumentStatus::Cancelled);
    assert_eq!(cancelled.cancelled_reason.as_deref(), Some("ordered in error"));

    let pending = h
        .service
        .create_document(
            &ctx,
            receipt_input(warehouse, vec![receipt_line(product, "1", "5")]),
        )
        .await
        .unwrap();
    h.service.submit(&ctx, pending.id).await.unwrap();
    let cancelled = h
        .service
        .cancel(&ctx, pending.id, "supplier cancelled")
        .await
        .unwrap();
    assert_eq!(cancelled.status, DocumentStatus::Cancelled);
}

#[tokio::test]
async fn cancel_requires_reason() {
    let h = harness();
    let ctx = ctx(Uuid::new_v4(), Uuid::new_v4());

    let doc = h
        .service
        .create_document(&ctx, receipt_input(Uuid::new_v4(), vec![]))
        .await
        .unwrap();

    let err = h.service.cancel(&ctx, doc.id, "  ").await.unwrap_err();
    assert_eq!(err.code(), "VALIDATION_ERROR");
}

#[tokio::test]
async fn cancel_rejected_once_terminal() {
    let h = harness();
    let tenant = Uuid::new_v4();
    let ctx_a = ctx(tenant, Uuid::new_v4());
    let ctx_b = ctx(tenant, Uuid::new_v4());
    let warehouse = Uuid::new_v4();
    let product = Uuid::new_v4();

    let doc = h
        .service
        .create_document(
            &ctx_a,
            receipt_input(warehouse, vec![receipt_line(product, "1", "5")]),
        )
        .await
        .unwrap();
    h.service.submit(&ctx_a, doc.id).await.unwrap();
    h.service.approve(&ctx_b, doc.id).await.unwrap();

    let err = h.service.cancel(&ctx_a, doc.id, "too late").await.unwrap_err();
    assert!(matches!(err, AppError::InvalidStatusTransition(_)));

    // Cancelling a cancelled document is just as illegal
    let doc2 = h
        .service
        .create_document(&ctx_a, receipt_input(warehouse, vec![]))
        .await
        .unwrap();
    h.service.cancel(&ctx_a, doc2.id, "duplicate").await.unwrap();
    let err = h.service.cancel(&ctx_a, doc2.id, "again").await.unwrap_err();
    assert!(matches!(err, AppError::InvalidStatusTransition(_)));
}

#[tokio::test]
async fn reject_only_applies_to_pending_documents() {
    let h = harness();
    let ctx = ctx(Uuid::new_v4(), Uuid::new_v4());
    let warehouse = Uuid::new_v4();
    let product = Uuid::new_v4();

    let draft = h
        .service
        .create_document(
            &ctx,
            receipt_input(warehouse, vec![receipt_line(product, "1", "5")]),
        )
        .await
        .unwrap();

    let err = h.service.reject(&ctx, draft.id, "not needed").await.unwrap_err();
    assert!(matches!(err, AppError::InvalidStatusTransition(_)));

    h.service.submit(&ctx, draft.id).await.unwrap();
    let rejected = h.service.reject(&ctx, draft.id, "not needed").await.unwrap();
    assert_eq!(rejected.status, DocumentStatus::Cancelled);
    assert_eq!(rejected.cancelled_reason.as_deref(), Some("not needed"));
}

#[tokio::test]
async fn documents_are_scoped_to_their_tenant() {
    let h = harness();
    let ctx_a = ctx(Uuid::new_v4(), Uuid::new_v4());
    let ctx_other = ctx(Uuid::new_v4(), Uuid::new_v4());

    let doc = h
        .service
        .create_document(&ctx_a, receipt_input(Uuid::new_v4(), vec![]))
        .await
        .unwrap();

    let err = h.service.get_document(&ctx_other, doc.id).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn list_documents_filters_by_status_and_type() {
    let h = harness();
    let ctx = ctx(Uuid::new_v4(), Uuid::new_v4());
    let warehouse = Uuid::new_v4();
    let product = Uuid::new_v4();

    let d1 = h
        .service
        .create_document(
            &ctx,
            receipt_input(warehouse, vec![receipt_line(product, "1", "5")]),
        )
        .await
        .unwrap();
    h.service.submit(&ctx, d1.id).await.unwrap();
    h.service
        .create_document(
            &ctx,
            CreateDocumentInput {
                document_type: DocumentType::GoodsIssue,
                warehouse_id: warehouse,
                lines: vec![],
            },
        )
        .await
        .unwrap();

    let pending = h
        .service
        .list_documents(&ctx, Some(DocumentStatus::Pending), None, &Pagination::default())
        .await
        .unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, d1.id);

    let receipts = h
        .service
        .list_documents(
            &ctx,
            None,
            Some(DocumentType::GoodsReceipt),
            &Pagination::default(),
        )
        .await
        .unwrap();
    assert_eq!(receipts.len(), 1);
}
