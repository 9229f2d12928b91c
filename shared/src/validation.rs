//! Validation utilities for the commerce workflow
//!
//! Pure input checks shared by the backend services and the browser bindings.
//! Catalog and warehouse lookups are not done here; they need the owning
//! company's master data.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::models::{QuotationLineItem, RfqLineItem};
use crate::types::CompanyId;

// ============================================================================
// RFQ Validations
// ============================================================================

/// Validate requested lines: at least one, every quantity positive
pub fn validate_rfq_line_items(line_items: &[RfqLineItem]) -> Result<(), &'static str> {
    if line_items.is_empty() {
        return Err("At least one line item is required");
    }
    if line_items.iter().any(|l| l.quantity <= Decimal::ZERO) {
        return Err("Line item quantity must be positive");
    }
    Ok(())
}

/// A company cannot request a quotation from itself
pub fn validate_distinct_parties(
    buyer_company_id: CompanyId,
    supplier_company_id: CompanyId,
) -> Result<(), &'static str> {
    if buyer_company_id == supplier_company_id {
        return Err("Supplier company must differ from the buyer company");
    }
    Ok(())
}

/// Need-by date must lie in the future when the RFQ is raised
pub fn validate_need_by_date(need_by_date: DateTime<Utc>, now: DateTime<Utc>) -> Result<(), &'static str> {
    if need_by_date <= now {
        return Err("Need-by date must be in the future");
    }
    Ok(())
}

// ============================================================================
// Quotation Validations
// ============================================================================

/// Validate priced lines
pub fn validate_quotation_line_items(line_items: &[QuotationLineItem]) -> Result<(), &'static str> {
    if line_items.is_empty() {
        return Err("At least one line item is required");
    }
    for line in line_items {
        if line.quantity <= Decimal::ZERO {
            return Err("Line item quantity must be positive");
        }
        if line.unit_price < Decimal::ZERO {
            return Err("Unit price cannot be negative");
        }
        if line.discount < Decimal::ZERO {
            return Err("Discount cannot be negative");
        }
        let Some(amount) = line.unit_price.checked_mul(line.quantity) else {
            return Err("Line amount out of range");
        };
        if line.discount > amount {
            return Err("Discount cannot exceed the line amount");
        }
    }
    Ok(())
}

/// Every quoted line must price an item pair the buyer asked for
pub fn validate_quoted_items(
    quoted: &[QuotationLineItem],
    requested: &[RfqLineItem],
) -> Result<(), &'static str> {
    let all_requested = quoted.iter().all(|q| {
        requested
            .iter()
            .any(|r| r.buyer_item_id == q.buyer_item_id && r.supplier_item_id == q.supplier_item_id)
    });
    if !all_requested {
        return Err("Quoted item was not requested on the RFQ");
    }
    Ok(())
}

/// Tax rate is a percentage and cannot be negative
pub fn validate_tax_rate(tax_rate: Decimal) -> Result<(), &'static str> {
    if tax_rate < Decimal::ZERO {
        return Err("Tax rate cannot be negative");
    }
    Ok(())
}

// ============================================================================
// General Validations
// ============================================================================

/// Free-text fields such as addresses and payment methods must not be blank
pub fn validate_required_text(value: &str) -> Result<(), &'static str> {
    if value.trim().is_empty() {
        return Err("Value is required");
    }
    Ok(())
}
