//! RFQ and quotation tests for the B2B commerce workflow
//!
//! Covers raising, quoting, deciding, cancelling and expiring RFQs against the
//! in-memory store, including the mirrored RFQ/quotation statuses.

mod common;

use chrono::Duration;
use commerce_backend::error::AppError;
use common::*;
use rust_decimal::Decimal;
use shared::workflow::{self, QuotationDecision};
use shared::{QuotationStatus, RfqLineItem, RfqStatus};

// ============================================================================
// Raising an RFQ
// ============================================================================

#[tokio::test]
async fn test_create_rfq_starts_pending_quote() {
    let fx = Fixture::new();
    let rfq = fx.pending_rfq().await;

    assert_eq!(rfq.status, RfqStatus::PendingQuote);
    assert_eq!(rfq.buyer_company_id, BUYER.company_id);
    assert_eq!(rfq.supplier_company_id, SUPPLIER.company_id);
    assert_eq!(rfq.line_items.len(), 2);
    assert!(rfq.code.starts_with("RFQ-"));
}

#[tokio::test]
async fn test_create_rfq_rejects_empty_line_items() {
    let fx = Fixture::new();
    let mut input = fx.rfq_input();
    input.line_items.clear();

    let err = fx.deps.rfqs().create_rfq(BUYER, input).await.unwrap_err();
    assert!(matches!(err, AppError::Validation { ref field, .. } if field == "line_items"));
}

#[tokio::test]
async fn test_create_rfq_rejects_non_positive_quantity() {
    let fx = Fixture::new();
    let mut input = fx.rfq_input();
    input.line_items[1].quantity = Decimal::ZERO;

    let err = fx.deps.rfqs().create_rfq(BUYER, input).await.unwrap_err();
    assert!(matches!(err, AppError::Validation { .. }));
}

#[tokio::test]
async fn test_create_rfq_rejects_unknown_or_unsellable_items() {
    let fx = Fixture::new();

    let mut unknown_buyer_item = fx.rfq_input();
    unknown_buyer_item.line_items[0].buyer_item_id = 999;
    let err = fx.deps.rfqs().create_rfq(BUYER, unknown_buyer_item).await.unwrap_err();
    assert!(matches!(err, AppError::Validation { .. }));

    let mut unsellable = fx.rfq_input();
    unsellable.line_items.push(RfqLineItem {
        buyer_item_id: BUYER_ITEM_A,
        supplier_item_id: SUPPLIER_INTERNAL_ITEM,
        quantity: dec("1"),
        note: None,
    });
    let err = fx.deps.rfqs().create_rfq(BUYER, unsellable).await.unwrap_err();
    assert!(matches!(err, AppError::Validation { .. }));
}

#[tokio::test]
async fn test_create_rfq_rejects_self_supply_and_past_dates() {
    let fx = Fixture::new();

    let mut self_supply = fx.rfq_input();
    self_supply.supplier_company_id = BUYER.company_id;
    let err = fx.deps.rfqs().create_rfq(BUYER, self_supply).await.unwrap_err();
    assert!(matches!(err, AppError::Validation { ref field, .. } if field == "supplier_company_id"));

    let mut past = fx.rfq_input();
    past.need_by_date = fx.now() - Duration::hours(1);
    let err = fx.deps.rfqs().create_rfq(BUYER, past).await.unwrap_err();
    assert!(matches!(err, AppError::Validation { ref field, .. } if field == "need_by_date"));
}

// ============================================================================
// Quotation totals
// ============================================================================
// Quantities 10 and 5 at 100,000 and 50,000 with no discount and 10% tax
// yield 1,250,000 / 125,000 / 1,375,000.

#[tokio::test]
async fn test_quotation_totals_scenario() {
    let fx = Fixture::new();
    let (rfq, quotation) = fx.quoted_rfq().await;

    assert_eq!(quotation.sub_total, dec("1250000"));
    assert_eq!(quotation.tax_amount, dec("125000"));
    assert_eq!(quotation.total_amount, dec("1375000"));
    assert_eq!(quotation.status, QuotationStatus::Quoted);
    assert_eq!(quotation.rfq_id, rfq.id);

    let detail = fx.deps.rfqs().get_rfq(BUYER, rfq.id).await.unwrap();
    assert_eq!(detail.rfq.status, RfqStatus::Quoted);
    assert_eq!(detail.quotation.map(|q| q.id), Some(quotation.id));
}

#[tokio::test]
async fn test_quotation_discount_reduces_sub_total() {
    let fx = Fixture::new();
    let rfq = fx.pending_rfq().await;
    let mut input = fx.quotation_input();
    input.line_items[0].discount = dec("50000");

    let quotation = fx
        .deps
        .rfqs()
        .create_quotation(SUPPLIER, rfq.id, input)
        .await
        .unwrap();

    assert_eq!(quotation.sub_total, dec("1200000"));
    assert_eq!(quotation.tax_amount, dec("120000"));
    assert_eq!(quotation.total_amount, dec("1320000"));
}

#[tokio::test]
async fn test_quotation_amounts_out_of_range_are_rejected() {
    let fx = Fixture::new();
    let rfq = fx.pending_rfq().await;

    let mut input = fx.quotation_input();
    input.line_items[0].unit_price = Decimal::MAX;
    input.line_items[0].quantity = dec("2");
    let err = fx
        .deps
        .rfqs()
        .create_quotation(SUPPLIER, rfq.id, input)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation { ref field, .. } if field == "line_items"));

    // Lines fit, the tax on them does not
    let mut input = fx.quotation_input();
    input.tax_rate = Decimal::MAX;
    let err = fx
        .deps
        .rfqs()
        .create_quotation(SUPPLIER, rfq.id, input)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation { ref field, .. } if field == "line_items"));

    let detail = fx.deps.rfqs().get_rfq(BUYER, rfq.id).await.unwrap();
    assert_eq!(detail.rfq.status, RfqStatus::PendingQuote);
    assert!(detail.quotation.is_none());
}

#[tokio::test]
async fn test_quotation_must_quote_requested_items() {
    let fx = Fixture::new();
    let rfq = fx.pending_rfq().await;
    let mut input = fx.quotation_input();
    input.line_items[1].supplier_item_id = SUPPLIER_ITEM_A;

    let err = fx
        .deps
        .rfqs()
        .create_quotation(SUPPLIER, rfq.id, input)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation { .. }));

    let detail = fx.deps.rfqs().get_rfq(SUPPLIER, rfq.id).await.unwrap();
    assert_eq!(detail.rfq.status, RfqStatus::PendingQuote);
    assert!(detail.quotation.is_none());
}

#[tokio::test]
async fn test_second_quotation_is_a_conflict() {
    let fx = Fixture::new();
    let (rfq, _) = fx.quoted_rfq().await;

    let err = fx
        .deps
        .rfqs()
        .create_quotation(SUPPLIER, rfq.id, fx.quotation_input())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict { .. }));
}

// ============================================================================
// Decisions
// ============================================================================

#[tokio::test]
async fn test_accept_without_quotation_is_invalid_state_and_changes_nothing() {
    let fx = Fixture::new();
    let rfq = fx.pending_rfq().await;

    let err = fx.deps.rfqs().accept_quotation(BUYER, rfq.id).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidState(_)));

    let detail = fx.deps.rfqs().get_rfq(BUYER, rfq.id).await.unwrap();
    assert_eq!(detail.rfq.status, RfqStatus::PendingQuote);
    assert_eq!(detail.rfq.updated_at, rfq.updated_at);
}

#[tokio::test]
async fn test_accept_mirrors_onto_rfq() {
    let fx = Fixture::new();
    let (rfq, _) = fx.quoted_rfq().await;

    let quotation = fx.deps.rfqs().accept_quotation(BUYER, rfq.id).await.unwrap();
    assert_eq!(quotation.status, QuotationStatus::Accepted);

    let detail = fx.deps.rfqs().get_rfq(BUYER, rfq.id).await.unwrap();
    assert_eq!(detail.rfq.status, RfqStatus::Accepted);
    assert_eq!(detail.effective_status, RfqStatus::Accepted);
}

#[tokio::test]
async fn test_reject_mirrors_onto_rfq_and_is_final() {
    let fx = Fixture::new();
    let (rfq, _) = fx.quoted_rfq().await;

    let quotation = fx.deps.rfqs().reject_quotation(BUYER, rfq.id).await.unwrap();
    assert_eq!(quotation.status, QuotationStatus::Rejected);

    let detail = fx.deps.rfqs().get_rfq(BUYER, rfq.id).await.unwrap();
    assert_eq!(detail.rfq.status, RfqStatus::Rejected);

    let err = fx.deps.rfqs().accept_quotation(BUYER, rfq.id).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidState(_)));
}

#[tokio::test]
async fn test_decision_made_on_stale_statuses_changes_nothing() {
    let fx = Fixture::new();
    let (rfq, quotation) = fx.quoted_rfq().await;

    // Decided while both records read Quoted, then the buyer rejects first
    let accept = workflow::decide_quotation(
        RfqStatus::Quoted,
        QuotationStatus::Quoted,
        QuotationDecision::Accept,
    )
    .unwrap();
    fx.deps.rfqs().reject_quotation(BUYER, rfq.id).await.unwrap();

    let err = fx
        .deps
        .store
        .apply_quotation_decision(rfq.id, quotation.id, accept)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::StaleStatus(_)));
    assert!(err.is_retryable());

    let detail = fx.deps.rfqs().get_rfq(BUYER, rfq.id).await.unwrap();
    assert_eq!(detail.rfq.status, RfqStatus::Rejected);
    assert_eq!(detail.quotation.map(|q| q.status), Some(QuotationStatus::Rejected));
}

#[tokio::test]
async fn test_only_the_buyer_decides() {
    let fx = Fixture::new();
    let (rfq, _) = fx.quoted_rfq().await;

    let err = fx.deps.rfqs().accept_quotation(SUPPLIER, rfq.id).await.unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    let err = fx.deps.rfqs().accept_quotation(OUTSIDER, rfq.id).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

// ============================================================================
// Cancellation and expiry
// ============================================================================

#[tokio::test]
async fn test_cancel_pending_rfq() {
    let fx = Fixture::new();
    let rfq = fx.pending_rfq().await;

    let cancelled = fx.deps.rfqs().cancel_rfq(BUYER, rfq.id).await.unwrap();
    assert_eq!(cancelled.status, RfqStatus::Cancelled);

    let err = fx
        .deps
        .rfqs()
        .create_quotation(SUPPLIER, rfq.id, fx.quotation_input())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidState(_)));
}

#[tokio::test]
async fn test_cancel_after_decision_is_invalid_state() {
    let fx = Fixture::new();
    let quotation = fx.accepted_quotation().await;

    let err = fx.deps.rfqs().cancel_rfq(BUYER, quotation.rfq_id).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidState(_)));
}

#[tokio::test]
async fn test_supplier_cannot_cancel() {
    let fx = Fixture::new();
    let rfq = fx.pending_rfq().await;

    let err = fx.deps.rfqs().cancel_rfq(SUPPLIER, rfq.id).await.unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));
}

#[tokio::test]
async fn test_open_rfq_reads_expired_after_need_by_date() {
    let fx = Fixture::new();
    let rfq = fx.pending_rfq().await;

    fx.clock.advance(Duration::days(15));

    let detail = fx.deps.rfqs().get_rfq(BUYER, rfq.id).await.unwrap();
    assert_eq!(detail.rfq.status, RfqStatus::PendingQuote);
    assert_eq!(detail.effective_status, RfqStatus::Expired);

    let err = fx
        .deps
        .rfqs()
        .create_quotation(SUPPLIER, rfq.id, fx.quotation_input())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidState(_)));
}

#[tokio::test]
async fn test_quoted_rfq_cannot_be_accepted_once_expired() {
    let fx = Fixture::new();
    let (rfq, _) = fx.quoted_rfq().await;

    fx.clock.advance(Duration::days(15));

    let err = fx.deps.rfqs().accept_quotation(BUYER, rfq.id).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidState(_)));
}

#[tokio::test]
async fn test_decided_rfq_never_reads_expired() {
    let fx = Fixture::new();
    let quotation = fx.accepted_quotation().await;

    fx.clock.advance(Duration::days(30));

    let detail = fx.deps.rfqs().get_rfq(BUYER, quotation.rfq_id).await.unwrap();
    assert_eq!(detail.effective_status, RfqStatus::Accepted);
}

// ============================================================================
// Visibility
// ============================================================================

#[tokio::test]
async fn test_outsider_sees_nothing() {
    let fx = Fixture::new();
    let (rfq, quotation) = fx.quoted_rfq().await;

    let err = fx.deps.rfqs().get_rfq(OUTSIDER, rfq.id).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let err = fx.deps.rfqs().get_quotation(OUTSIDER, quotation.id).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    assert!(fx.deps.rfqs().get_quotation(BUYER, quotation.id).await.is_ok());
    assert!(fx.deps.rfqs().get_quotation(SUPPLIER, quotation.id).await.is_ok());
}

#[tokio::test]
async fn test_buyer_cannot_quote_own_rfq() {
    let fx = Fixture::new();
    let rfq = fx.pending_rfq().await;

    let err = fx
        .deps
        .rfqs()
        .create_quotation(BUYER, rfq.id, fx.quotation_input())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));
}

#[tokio::test]
async fn test_missing_rfq_is_not_found() {
    let fx = Fixture::new();
    let err = fx.deps.rfqs().get_rfq(BUYER, 4242).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}
