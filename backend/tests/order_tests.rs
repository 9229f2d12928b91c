//! Purchase order / sales order tests for the B2B commerce workflow
//!
//! Covers the 1:1 pairings, the sales order commit with its inventory
//! reservation, compensation when the inventory counter fails, and the
//! supplier-only issue ticket.

mod common;

use commerce_backend::error::AppError;
use common::*;
use rust_decimal::Decimal;
use shared::{IssueTicketStatus, PoStatus, SoStatus};

// ============================================================================
// Purchase orders
// ============================================================================

#[tokio::test]
async fn test_create_po_from_accepted_quotation() {
    let fx = Fixture::new();
    let quotation = fx.accepted_quotation().await;

    let purchase_order = fx
        .deps
        .orders()
        .create_po(BUYER, fx.po_input(quotation.id))
        .await
        .unwrap();

    assert_eq!(purchase_order.status, PoStatus::PendingConfirm);
    assert_eq!(purchase_order.quotation_id, quotation.id);
    assert_eq!(purchase_order.buyer_company_id, BUYER.company_id);
    assert_eq!(purchase_order.supplier_company_id, SUPPLIER.company_id);
    assert_eq!(purchase_order.delivery_address, "Buyer Dock 3, Bangna");
}

#[tokio::test]
async fn test_create_po_requires_accepted_quotation() {
    let fx = Fixture::new();
    let (_, quotation) = fx.quoted_rfq().await;

    let err = fx
        .deps
        .orders()
        .create_po(BUYER, fx.po_input(quotation.id))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidState(_)));
}

#[tokio::test]
async fn test_create_po_checks_roles_and_warehouse() {
    let fx = Fixture::new();
    let quotation = fx.accepted_quotation().await;

    let err = fx
        .deps
        .orders()
        .create_po(SUPPLIER, fx.po_input(quotation.id))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    let err = fx
        .deps
        .orders()
        .create_po(OUTSIDER, fx.po_input(quotation.id))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let mut input = fx.po_input(quotation.id);
    input.receive_warehouse_id = SUPPLIER_WAREHOUSE;
    let err = fx.deps.orders().create_po(BUYER, input).await.unwrap_err();
    assert!(matches!(err, AppError::Validation { ref field, .. } if field == "receive_warehouse_id"));

    let mut input = fx.po_input(quotation.id);
    input.delivery_address = "   ".into();
    let err = fx.deps.orders().create_po(BUYER, input).await.unwrap_err();
    assert!(matches!(err, AppError::Validation { .. }));
}

#[tokio::test]
async fn test_second_po_for_quotation_is_a_conflict() {
    let fx = Fixture::new();
    let purchase_order = fx.pending_po().await;

    let err = fx
        .deps
        .orders()
        .create_po(BUYER, fx.po_input(purchase_order.quotation_id))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict { .. }));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_po_creation_yields_exactly_one_po() {
    let fx = Fixture::new();
    let quotation = fx.accepted_quotation().await;

    let first = {
        let orders = fx.deps.orders();
        let input = fx.po_input(quotation.id);
        tokio::spawn(async move { orders.create_po(BUYER, input).await })
    };
    let second = {
        let orders = fx.deps.orders();
        let input = fx.po_input(quotation.id);
        tokio::spawn(async move { orders.create_po(BUYER, input).await })
    };
    let (first, second) = tokio::join!(first, second);
    let results = [first.unwrap(), second.unwrap()];

    let created = results.iter().filter(|r| r.is_ok()).count();
    let conflicts = results
        .iter()
        .filter(|r| matches!(r, Err(AppError::Conflict { .. })))
        .count();
    assert_eq!(created, 1);
    assert_eq!(conflicts, 1);
}

#[tokio::test]
async fn test_cancel_po_only_while_pending_confirm() {
    let fx = Fixture::new();
    let purchase_order = fx.pending_po().await;

    let err = fx.deps.orders().cancel_po(SUPPLIER, purchase_order.id).await.unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    let cancelled = fx.deps.orders().cancel_po(BUYER, purchase_order.id).await.unwrap();
    assert_eq!(cancelled.status, PoStatus::Cancelled);

    let err = fx
        .deps
        .orders()
        .create_so(SUPPLIER, purchase_order.id, fx.so_input())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidState(_)));
    assert!(fx.inventory.calls().is_empty());
}

#[tokio::test]
async fn test_confirmed_po_cannot_be_cancelled() {
    let fx = Fixture::new();
    let commit = fx.sales_order().await;

    let err = fx
        .deps
        .orders()
        .cancel_po(BUYER, commit.purchase_order.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidState(_)));
}

// ============================================================================
// Sales orders
// ============================================================================

#[tokio::test]
async fn test_create_so_commits_all_three_records() {
    let fx = Fixture::new();
    let purchase_order = fx.pending_po().await;

    let commit = fx
        .deps
        .orders()
        .create_so(SUPPLIER, purchase_order.id, fx.so_input())
        .await
        .unwrap();

    assert_eq!(commit.purchase_order.status, PoStatus::Confirmed);
    assert_eq!(commit.sales_order.status, SoStatus::AwaitingIssue);
    assert_eq!(commit.sales_order.purchase_order_id, purchase_order.id);
    assert_eq!(commit.sales_order.delivery_to_address, purchase_order.delivery_address);
    assert_eq!(commit.sales_order.delivery_from_address, "Supplier Warehouse, Rayong");
    assert_eq!(commit.sales_order.line_items.len(), 2);

    assert_eq!(commit.issue_ticket.status, IssueTicketStatus::Pending);
    assert_eq!(commit.issue_ticket.sales_order_id, commit.sales_order.id);
    assert_eq!(commit.issue_ticket.sales_order_code, commit.sales_order.code);
    assert_eq!(commit.issue_ticket.warehouse_id, SUPPLIER_WAREHOUSE);

    assert_eq!(fx.inventory.net(SUPPLIER_WAREHOUSE, SUPPLIER_ITEM_A), dec("10"));
    assert_eq!(fx.inventory.net(SUPPLIER_WAREHOUSE, SUPPLIER_ITEM_B), dec("5"));
}

#[tokio::test]
async fn test_retried_create_so_increases_inventory_once() {
    let fx = Fixture::new();
    let commit = fx.sales_order().await;

    let err = fx
        .deps
        .orders()
        .create_so(SUPPLIER, commit.purchase_order.id, fx.so_input())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict { .. }));

    assert_eq!(fx.inventory.increase_count(), 2);
    assert_eq!(fx.inventory.net(SUPPLIER_WAREHOUSE, SUPPLIER_ITEM_A), dec("10"));
}

#[tokio::test]
async fn test_failing_inventory_leaves_no_trace() {
    let fx = Fixture::with_inventory(RecordingInventory::failing_at(2));
    let purchase_order = fx.pending_po().await;

    let err = fx
        .deps
        .orders()
        .create_so(SUPPLIER, purchase_order.id, fx.so_input())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::AdapterError(_)));
    assert!(err.is_retryable());

    let reloaded = fx
        .deps
        .orders()
        .get_purchase_order(BUYER, purchase_order.id)
        .await
        .unwrap();
    assert_eq!(reloaded.status, PoStatus::PendingConfirm);
    assert!(fx
        .deps
        .store
        .find_sales_order_by_purchase_order(purchase_order.id)
        .await
        .unwrap()
        .is_none());
    assert!(fx
        .deps
        .orders()
        .list_issue_tickets(SUPPLIER, None)
        .await
        .unwrap()
        .is_empty());

    // The first line was reserved and then released
    assert_eq!(fx.inventory.net(SUPPLIER_WAREHOUSE, SUPPLIER_ITEM_A), Decimal::ZERO);
    assert_eq!(fx.inventory.net(SUPPLIER_WAREHOUSE, SUPPLIER_ITEM_B), Decimal::ZERO);
}

#[tokio::test]
async fn test_increase_applied_behind_a_timeout_is_released() {
    let fx = Fixture::with_inventory(RecordingInventory::losing_response_at(2));
    let purchase_order = fx.pending_po().await;

    let err = fx
        .deps
        .orders()
        .create_so(SUPPLIER, purchase_order.id, fx.so_input())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::AdapterError(_)));

    let reloaded = fx
        .deps
        .orders()
        .get_purchase_order(BUYER, purchase_order.id)
        .await
        .unwrap();
    assert_eq!(reloaded.status, PoStatus::PendingConfirm);

    // Both lines landed in the ledger and both were reversed
    assert_eq!(fx.inventory.increase_count(), 2);
    assert_eq!(fx.inventory.net(SUPPLIER_WAREHOUSE, SUPPLIER_ITEM_A), Decimal::ZERO);
    assert_eq!(fx.inventory.net(SUPPLIER_WAREHOUSE, SUPPLIER_ITEM_B), Decimal::ZERO);
}

#[tokio::test]
async fn test_po_cancelled_during_create_so_is_stale() {
    let fx = Fixture::new();
    let purchase_order = fx.pending_po().await;
    let id = purchase_order.id;

    let orders = fx.deps.orders();
    fx.inventory.before_first_increase(async move {
        orders.cancel_po(BUYER, id).await.unwrap();
    });

    let err = fx
        .deps
        .orders()
        .create_so(SUPPLIER, id, fx.so_input())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::StaleStatus(_)));
    assert!(err.is_retryable());

    let reloaded = fx.deps.orders().get_purchase_order(BUYER, id).await.unwrap();
    assert_eq!(reloaded.status, PoStatus::Cancelled);
    assert!(fx
        .deps
        .store
        .find_sales_order_by_purchase_order(id)
        .await
        .unwrap()
        .is_none());
    assert!(fx
        .deps
        .orders()
        .list_issue_tickets(SUPPLIER, None)
        .await
        .unwrap()
        .is_empty());
    assert_eq!(fx.inventory.increase_count(), 2);
    assert_eq!(fx.inventory.net(SUPPLIER_WAREHOUSE, SUPPLIER_ITEM_A), Decimal::ZERO);
    assert_eq!(fx.inventory.net(SUPPLIER_WAREHOUSE, SUPPLIER_ITEM_B), Decimal::ZERO);
}

#[tokio::test]
async fn test_create_so_after_inventory_failure_can_be_retried() {
    let fx = Fixture::with_inventory(RecordingInventory::failing_at(1));
    let purchase_order = fx.pending_po().await;

    assert!(fx
        .deps
        .orders()
        .create_so(SUPPLIER, purchase_order.id, fx.so_input())
        .await
        .is_err());
    assert!(fx.inventory.calls().is_empty());

    let commit = fx
        .deps
        .orders()
        .create_so(SUPPLIER, purchase_order.id, fx.so_input())
        .await
        .unwrap();
    assert_eq!(commit.purchase_order.status, PoStatus::Confirmed);
    assert_eq!(fx.inventory.net(SUPPLIER_WAREHOUSE, SUPPLIER_ITEM_B), dec("5"));
}

#[tokio::test]
async fn test_create_so_guards_run_before_inventory() {
    let fx = Fixture::new();
    let purchase_order = fx.pending_po().await;

    let err = fx
        .deps
        .orders()
        .create_so(BUYER, purchase_order.id, fx.so_input())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    let mut input = fx.so_input();
    input.issue_warehouse_id = BUYER_WAREHOUSE;
    let err = fx
        .deps
        .orders()
        .create_so(SUPPLIER, purchase_order.id, input)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation { ref field, .. } if field == "issue_warehouse_id"));

    assert!(fx.inventory.calls().is_empty());
}

#[tokio::test]
async fn test_sales_order_visible_to_both_parties_only() {
    let fx = Fixture::new();
    let commit = fx.sales_order().await;
    let id = commit.sales_order.id;

    assert!(fx.deps.orders().get_sales_order(BUYER, id).await.is_ok());
    assert!(fx.deps.orders().get_sales_order(SUPPLIER, id).await.is_ok());

    let err = fx.deps.orders().get_sales_order(OUTSIDER, id).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

// ============================================================================
// Issue tickets
// ============================================================================

#[tokio::test]
async fn test_confirm_issue_ticket_moves_sales_order() {
    let fx = Fixture::new();
    let commit = fx.sales_order().await;

    let (ticket, sales_order) = fx
        .deps
        .orders()
        .confirm_issue_ticket(SUPPLIER, commit.issue_ticket.id)
        .await
        .unwrap();
    assert_eq!(ticket.status, IssueTicketStatus::Confirmed);
    assert_eq!(sales_order.status, SoStatus::AwaitingShipment);

    let err = fx
        .deps
        .orders()
        .confirm_issue_ticket(SUPPLIER, commit.issue_ticket.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidState(_)));
}

#[tokio::test]
async fn test_issue_ticket_hidden_from_buyer() {
    let fx = Fixture::new();
    let commit = fx.sales_order().await;
    let ticket_id = commit.issue_ticket.id;

    let err = fx.deps.orders().get_issue_ticket(BUYER, ticket_id).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let err = fx
        .deps
        .orders()
        .confirm_issue_ticket(BUYER, ticket_id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    assert!(fx.deps.orders().list_issue_tickets(BUYER, None).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_list_issue_tickets_filters_by_status() {
    let fx = Fixture::new();
    let first = fx.sales_order().await;
    let second = fx.sales_order().await;

    fx.deps
        .orders()
        .confirm_issue_ticket(SUPPLIER, first.issue_ticket.id)
        .await
        .unwrap();

    let all = fx.deps.orders().list_issue_tickets(SUPPLIER, None).await.unwrap();
    assert_eq!(all.len(), 2);

    let pending = fx
        .deps
        .orders()
        .list_issue_tickets(SUPPLIER, Some(IssueTicketStatus::Pending))
        .await
        .unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, second.issue_ticket.id);
}
