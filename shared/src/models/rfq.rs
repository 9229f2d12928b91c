//! Request-for-quotation models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{CompanyId, EntityId, ItemId};

/// Status of an RFQ
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RfqStatus {
    PendingQuote,
    Quoted,
    Accepted,
    Rejected,
    Cancelled,
    /// Never stored; projected at read time once the need-by date has passed
    Expired,
}

impl RfqStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RfqStatus::PendingQuote => "pending_quote",
            RfqStatus::Quoted => "quoted",
            RfqStatus::Accepted => "accepted",
            RfqStatus::Rejected => "rejected",
            RfqStatus::Cancelled => "cancelled",
            RfqStatus::Expired => "expired",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending_quote" => Some(RfqStatus::PendingQuote),
            "quoted" => Some(RfqStatus::Quoted),
            "accepted" => Some(RfqStatus::Accepted),
            "rejected" => Some(RfqStatus::Rejected),
            "cancelled" => Some(RfqStatus::Cancelled),
            "expired" => Some(RfqStatus::Expired),
            _ => None,
        }
    }

    /// Whether the RFQ is still waiting on the supplier or the buyer
    pub fn is_open(&self) -> bool {
        matches!(self, RfqStatus::PendingQuote | RfqStatus::Quoted)
    }
}

impl std::fmt::Display for RfqStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RfqStatus::PendingQuote => write!(f, "Pending Quote"),
            RfqStatus::Quoted => write!(f, "Quoted"),
            RfqStatus::Accepted => write!(f, "Accepted"),
            RfqStatus::Rejected => write!(f, "Rejected"),
            RfqStatus::Cancelled => write!(f, "Cancelled"),
            RfqStatus::Expired => write!(f, "Expired"),
        }
    }
}

/// A requested item on an RFQ
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RfqLineItem {
    /// Item in the buyer's own catalog
    pub buyer_item_id: ItemId,
    /// Item in the supplier's sellable catalog
    pub supplier_item_id: ItemId,
    pub quantity: Decimal,
    pub note: Option<String>,
}

/// A buyer's solicitation for pricing from one supplier company
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rfq {
    pub id: EntityId,
    pub code: String,
    pub buyer_company_id: CompanyId,
    pub supplier_company_id: CompanyId,
    pub need_by_date: DateTime<Utc>,
    pub status: RfqStatus,
    pub line_items: Vec<RfqLineItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Rfq {
    /// Status as observed at `now`
    pub fn effective_status(&self, now: DateTime<Utc>) -> RfqStatus {
        crate::workflow::rfq_effective_status(self.status, self.need_by_date, now)
    }

    /// Whether a (buyer item, supplier item) pair was requested on this RFQ
    pub fn requests(&self, buyer_item_id: ItemId, supplier_item_id: ItemId) -> bool {
        self.line_items
            .iter()
            .any(|l| l.buyer_item_id == buyer_item_id && l.supplier_item_id == supplier_item_id)
    }
}
