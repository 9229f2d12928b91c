//! Quotation models and tax computation

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{CompanyId, EntityId, ItemId};

/// Status of a quotation, mirrored from its RFQ
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotationStatus {
    Quoted,
    Accepted,
    Rejected,
}

impl QuotationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuotationStatus::Quoted => "quoted",
            QuotationStatus::Accepted => "accepted",
            QuotationStatus::Rejected => "rejected",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "quoted" => Some(QuotationStatus::Quoted),
            "accepted" => Some(QuotationStatus::Accepted),
            "rejected" => Some(QuotationStatus::Rejected),
            _ => None,
        }
    }
}

impl std::fmt::Display for QuotationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QuotationStatus::Quoted => write!(f, "Quoted"),
            QuotationStatus::Accepted => write!(f, "Accepted"),
            QuotationStatus::Rejected => write!(f, "Rejected"),
        }
    }
}

/// A priced line on a quotation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuotationLineItem {
    pub buyer_item_id: ItemId,
    pub supplier_item_id: ItemId,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    /// Absolute discount on the whole line
    pub discount: Decimal,
    pub note: Option<String>,
}

impl QuotationLineItem {
    /// unit_price × quantity − discount; `None` when the amount is out of range
    pub fn line_total(&self) -> Option<Decimal> {
        self.unit_price
            .checked_mul(self.quantity)?
            .checked_sub(self.discount)
    }
}

/// Computed quotation amounts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotationTotals {
    pub sub_total: Decimal,
    pub tax_amount: Decimal,
    pub total_amount: Decimal,
}

impl QuotationTotals {
    /// Compute totals for a set of lines at a tax rate given in percent
    ///
    /// sub_total = Σ(unit_price × quantity − discount)
    /// tax_amount = sub_total × tax_rate / 100
    /// total_amount = sub_total + tax_amount
    ///
    /// Returns `None` if any amount overflows.
    pub fn compute(line_items: &[QuotationLineItem], tax_rate: Decimal) -> Option<Self> {
        let sub_total = line_items
            .iter()
            .try_fold(Decimal::ZERO, |acc, line| acc.checked_add(line.line_total()?))?;
        let tax_amount = sub_total
            .checked_mul(tax_rate)?
            .checked_div(Decimal::ONE_HUNDRED)?;

        Some(Self {
            sub_total,
            tax_amount,
            total_amount: sub_total.checked_add(tax_amount)?,
        })
    }
}

/// A supplier's priced response to an RFQ
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quotation {
    pub id: EntityId,
    pub code: String,
    pub rfq_id: EntityId,
    pub buyer_company_id: CompanyId,
    pub supplier_company_id: CompanyId,
    pub status: QuotationStatus,
    /// Tax rate in percent (e.g., 7 for 7%)
    pub tax_rate: Decimal,
    pub sub_total: Decimal,
    pub tax_amount: Decimal,
    pub total_amount: Decimal,
    pub line_items: Vec<QuotationLineItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Quotation {
    pub fn totals(&self) -> QuotationTotals {
        QuotationTotals {
            sub_total: self.sub_total,
            tax_amount: self.tax_amount,
            total_amount: self.total_amount,
        }
    }
}
