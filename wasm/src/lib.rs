//! WebAssembly module for the B2B commerce workflow
//!
//! Provides client-side computation for:
//! - Quotation totals while the supplier edits prices
//! - RFQ status as the user sees it (including expiry)
//! - Delivery progress-stepper position
//! - Offline line item validation

use std::str::FromStr;

use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use wasm_bindgen::prelude::*;

// Re-export shared types for use in JavaScript
pub use shared::models::*;
pub use shared::types::*;
pub use shared::validation::*;

/// Initialize the WASM module
#[wasm_bindgen(start)]
pub fn init() {
    // Set up panic hook for better error messages in browser console
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();

    web_sys::console::log_1(&JsValue::from_str("commerce-wasm ready"));
}

fn parse_time(value: &str, what: &str) -> Result<DateTime<Utc>, JsValue> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| JsValue::from_str(&format!("Invalid {}: {}", what, e)))
}

/// Compute quotation totals; returns `{sub_total, tax_amount, total_amount}` as JSON
#[wasm_bindgen]
pub fn calculate_quotation_totals(line_items_json: &str, tax_rate: &str) -> Result<String, JsValue> {
    let line_items: Vec<QuotationLineItem> = serde_json::from_str(line_items_json)
        .map_err(|e| JsValue::from_str(&format!("Invalid line items JSON: {}", e)))?;
    let tax_rate = Decimal::from_str(tax_rate)
        .map_err(|e| JsValue::from_str(&format!("Invalid tax rate: {}", e)))?;

    let totals = QuotationTotals::compute(&line_items, tax_rate)
        .ok_or_else(|| JsValue::from_str("Quotation amounts out of range"))?;
    serde_json::to_string(&totals).map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Status to show for an RFQ at `now`; open RFQs past their need-by date read as expired
#[wasm_bindgen]
pub fn rfq_display_status(status: &str, need_by_date: &str, now: &str) -> Result<String, JsValue> {
    let stored = RfqStatus::from_str(status)
        .ok_or_else(|| JsValue::from_str(&format!("Unknown RFQ status: {}", status)))?;
    let need_by_date = parse_time(need_by_date, "need-by date")?;
    let now = parse_time(now, "current time")?;

    Ok(shared::workflow::rfq_effective_status(stored, need_by_date, now)
        .as_str()
        .to_string())
}

/// `rfq_display_status` against the browser clock
#[wasm_bindgen]
pub fn rfq_display_status_now(status: &str, need_by_date: &str) -> Result<String, JsValue> {
    let now = Utc
        .timestamp_millis_opt(js_sys::Date::now() as i64)
        .single()
        .ok_or_else(|| JsValue::from_str("Browser clock out of range"))?;
    rfq_display_status(status, need_by_date, &now.to_rfc3339())
}

/// Position of a delivery status on the progress stepper (0-2)
#[wasm_bindgen]
pub fn delivery_step_index(status: &str) -> Result<u32, JsValue> {
    DeliveryStatus::from_str(status)
        .map(|s| s.step_index() as u32)
        .ok_or_else(|| JsValue::from_str(&format!("Unknown delivery status: {}", status)))
}

/// Validate RFQ line items; returns the first problem, if any
#[wasm_bindgen]
pub fn check_rfq_line_items(line_items_json: &str) -> Option<String> {
    match serde_json::from_str::<Vec<RfqLineItem>>(line_items_json) {
        Ok(line_items) => validate_rfq_line_items(&line_items).err().map(str::to_string),
        Err(e) => Some(format!("Invalid line items JSON: {}", e)),
    }
}

/// Validate quotation line items; returns the first problem, if any
#[wasm_bindgen]
pub fn check_quotation_line_items(line_items_json: &str) -> Option<String> {
    match serde_json::from_str::<Vec<QuotationLineItem>>(line_items_json) {
        Ok(line_items) => validate_quotation_line_items(&line_items).err().map(str::to_string),
        Err(e) => Some(format!("Invalid line items JSON: {}", e)),
    }
}
