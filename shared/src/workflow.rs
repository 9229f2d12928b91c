//! Status transition rules for the order lifecycle
//!
//! Every status change of an RFQ, quotation, purchase order, sales order,
//! issue ticket or delivery order is decided by a function in this module.
//! Callers apply the returned target status with a compare-and-set on the
//! source status they read, so the tables here are the only place where the
//! lifecycle is spelled out.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::{
    DeliveryStatus, IssueTicketStatus, PoStatus, QuotationStatus, RfqStatus, SoStatus,
};

/// A transition that the state machine does not permit
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("{entity} cannot {action} while {status}")]
    NotAllowed {
        entity: &'static str,
        action: &'static str,
        status: &'static str,
    },

    #[error("delivery cannot be completed before arrival at the destination is recorded")]
    DestinationNotReached,
}

fn not_allowed(entity: &'static str, action: &'static str, status: &'static str) -> TransitionError {
    TransitionError::NotAllowed {
        entity,
        action,
        status,
    }
}

/// A guarded status change: apply `to` only if the record is still at `from`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusChange<S> {
    pub from: S,
    pub to: S,
}

impl<S> StatusChange<S> {
    pub fn new(from: S, to: S) -> Self {
        Self { from, to }
    }
}

// ============================================================================
// RFQ / Quotation
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RfqAction {
    /// Only reachable through quotation creation
    Quote,
    Accept,
    Reject,
    Cancel,
}

impl RfqAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            RfqAction::Quote => "be quoted",
            RfqAction::Accept => "be accepted",
            RfqAction::Reject => "be rejected",
            RfqAction::Cancel => "be cancelled",
        }
    }
}

pub fn rfq_transition(current: RfqStatus, action: RfqAction) -> Result<RfqStatus, TransitionError> {
    match (current, action) {
        (RfqStatus::PendingQuote, RfqAction::Quote) => Ok(RfqStatus::Quoted),
        (RfqStatus::PendingQuote, RfqAction::Cancel) => Ok(RfqStatus::Cancelled),
        (RfqStatus::Quoted, RfqAction::Accept) => Ok(RfqStatus::Accepted),
        (RfqStatus::Quoted, RfqAction::Reject) => Ok(RfqStatus::Rejected),
        (status, action) => Err(not_allowed("RFQ", action.as_str(), status.as_str())),
    }
}

/// Project the stored RFQ status onto `now`.
///
/// Open RFQs whose need-by date has passed read as `Expired`. The projection is
/// never written back.
pub fn rfq_effective_status(
    stored: RfqStatus,
    need_by_date: DateTime<Utc>,
    now: DateTime<Utc>,
) -> RfqStatus {
    if stored.is_open() && now > need_by_date {
        RfqStatus::Expired
    } else {
        stored
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotationDecision {
    Accept,
    Reject,
}

/// The paired RFQ and quotation changes produced by one buyer decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MirroredDecision {
    pub rfq: StatusChange<RfqStatus>,
    pub quotation: StatusChange<QuotationStatus>,
}

/// Decide a quotation. Both records move together or not at all.
pub fn decide_quotation(
    rfq: RfqStatus,
    quotation: QuotationStatus,
    decision: QuotationDecision,
) -> Result<MirroredDecision, TransitionError> {
    let (action, quotation_target) = match decision {
        QuotationDecision::Accept => (RfqAction::Accept, QuotationStatus::Accepted),
        QuotationDecision::Reject => (RfqAction::Reject, QuotationStatus::Rejected),
    };

    let rfq_target = rfq_transition(rfq, action)?;
    if quotation != QuotationStatus::Quoted {
        return Err(not_allowed("quotation", action.as_str(), quotation.as_str()));
    }

    Ok(MirroredDecision {
        rfq: StatusChange::new(rfq, rfq_target),
        quotation: StatusChange::new(quotation, quotation_target),
    })
}

/// Only accepted quotations can back a purchase order
pub fn ensure_quotation_orderable(status: QuotationStatus) -> Result<(), TransitionError> {
    match status {
        QuotationStatus::Accepted => Ok(()),
        other => Err(not_allowed("quotation", "be ordered", other.as_str())),
    }
}

// ============================================================================
// Purchase order / Sales order
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoAction {
    /// Only reachable through sales order creation
    Confirm,
    Dispatch,
    AwaitReceipt,
    Complete,
    Cancel,
}

impl PoAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            PoAction::Confirm => "be confirmed",
            PoAction::Dispatch => "be dispatched",
            PoAction::AwaitReceipt => "await receipt",
            PoAction::Complete => "be completed",
            PoAction::Cancel => "be cancelled",
        }
    }
}

pub fn po_transition(current: PoStatus, action: PoAction) -> Result<PoStatus, TransitionError> {
    match (current, action) {
        (PoStatus::PendingConfirm, PoAction::Confirm) => Ok(PoStatus::Confirmed),
        (PoStatus::PendingConfirm, PoAction::Cancel) => Ok(PoStatus::Cancelled),
        (PoStatus::Confirmed, PoAction::Dispatch) => Ok(PoStatus::InTransit),
        (PoStatus::InTransit, PoAction::AwaitReceipt) => Ok(PoStatus::AwaitingReceipt),
        (PoStatus::AwaitingReceipt, PoAction::Complete) => Ok(PoStatus::Completed),
        (status, action) => Err(not_allowed("purchase order", action.as_str(), status.as_str())),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoAction {
    /// The warehouse confirmed the issue ticket
    ConfirmIssue,
    Dispatch,
    Complete,
}

impl SoAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            SoAction::ConfirmIssue => "confirm its issue ticket",
            SoAction::Dispatch => "be dispatched",
            SoAction::Complete => "be completed",
        }
    }
}

pub fn so_transition(current: SoStatus, action: SoAction) -> Result<SoStatus, TransitionError> {
    match (current, action) {
        (SoStatus::AwaitingIssue, SoAction::ConfirmIssue) => Ok(SoStatus::AwaitingShipment),
        (SoStatus::AwaitingShipment, SoAction::Dispatch) => Ok(SoStatus::InTransit),
        (SoStatus::InTransit, SoAction::Complete) => Ok(SoStatus::Completed),
        (status, action) => Err(not_allowed("sales order", action.as_str(), status.as_str())),
    }
}

pub fn issue_ticket_confirm(current: IssueTicketStatus) -> Result<IssueTicketStatus, TransitionError> {
    match current {
        IssueTicketStatus::Pending => Ok(IssueTicketStatus::Confirmed),
        other => Err(not_allowed("issue ticket", "be confirmed", other.as_str())),
    }
}

/// A delivery can be opened once the warehouse has issued the goods
pub fn ensure_delivery_openable(sales_order: SoStatus) -> Result<(), TransitionError> {
    match sales_order {
        SoStatus::AwaitingShipment => Ok(()),
        other => Err(not_allowed("sales order", "open a delivery", other.as_str())),
    }
}

// ============================================================================
// Delivery
// ============================================================================

/// Every status change produced by one delivery step, applied as one unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryStep {
    pub delivery: StatusChange<DeliveryStatus>,
    pub sales_order: StatusChange<SoStatus>,
    pub purchase_order: StatusChange<PoStatus>,
}

fn advance_phrase(target: DeliveryStatus) -> &'static str {
    match target {
        DeliveryStatus::AwaitingPickup => "return to awaiting_pickup",
        DeliveryStatus::InTransit => "advance to in_transit",
        DeliveryStatus::Delivered => "advance to delivered",
    }
}

fn so_change(from: SoStatus, action: SoAction) -> Result<StatusChange<SoStatus>, TransitionError> {
    so_transition(from, action).map(|to| StatusChange::new(from, to))
}

fn po_change(from: PoStatus, action: PoAction) -> Result<StatusChange<PoStatus>, TransitionError> {
    po_transition(from, action).map(|to| StatusChange::new(from, to))
}

/// Advance a delivery one step forward.
///
/// `AwaitingPickup → InTransit` dispatches the sales order and purchase order;
/// `InTransit → Delivered` completes both and requires a destination arrival.
pub fn delivery_step(
    current: DeliveryStatus,
    target: DeliveryStatus,
    destination_reached: bool,
) -> Result<DeliveryStep, TransitionError> {
    match (current, target) {
        (DeliveryStatus::AwaitingPickup, DeliveryStatus::InTransit) => Ok(DeliveryStep {
            delivery: StatusChange::new(current, target),
            sales_order: so_change(SoStatus::AwaitingShipment, SoAction::Dispatch)?,
            purchase_order: po_change(PoStatus::Confirmed, PoAction::Dispatch)?,
        }),
        (DeliveryStatus::InTransit, DeliveryStatus::Delivered) => {
            if !destination_reached {
                return Err(TransitionError::DestinationNotReached);
            }
            Ok(DeliveryStep {
                delivery: StatusChange::new(current, target),
                sales_order: so_change(SoStatus::InTransit, SoAction::Complete)?,
                purchase_order: po_change(PoStatus::AwaitingReceipt, PoAction::Complete)?,
            })
        }
        (current, target) => Err(not_allowed("delivery", advance_phrase(target), current.as_str())),
    }
}

/// Record arrival at the destination; the buyer's PO starts awaiting receipt
pub fn destination_arrival(
    current: DeliveryStatus,
    destination_reached: bool,
) -> Result<StatusChange<PoStatus>, TransitionError> {
    if current != DeliveryStatus::InTransit {
        return Err(not_allowed("delivery", "record destination arrival", current.as_str()));
    }
    if destination_reached {
        return Err(not_allowed("delivery", "record destination arrival", "arrived"));
    }
    po_change(PoStatus::InTransit, PoAction::AwaitReceipt)
}

/// Stops can be appended until the destination has been reached
pub fn ensure_waypoint_appendable(
    current: DeliveryStatus,
    destination_reached: bool,
) -> Result<(), TransitionError> {
    if current == DeliveryStatus::Delivered {
        return Err(not_allowed("delivery", "add a waypoint", current.as_str()));
    }
    if destination_reached {
        return Err(not_allowed("delivery", "add a waypoint", "arrived"));
    }
    Ok(())
}
