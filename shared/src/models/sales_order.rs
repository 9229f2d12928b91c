//! Sales order models (supplier side)

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::quotation::QuotationLineItem;
use crate::types::{CompanyId, EntityId, ItemId, WarehouseId};

/// Status of a sales order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SoStatus {
    AwaitingIssue,
    AwaitingShipment,
    InTransit,
    Completed,
}

impl SoStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SoStatus::AwaitingIssue => "awaiting_issue",
            SoStatus::AwaitingShipment => "awaiting_shipment",
            SoStatus::InTransit => "in_transit",
            SoStatus::Completed => "completed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "awaiting_issue" => Some(SoStatus::AwaitingIssue),
            "awaiting_shipment" => Some(SoStatus::AwaitingShipment),
            "in_transit" => Some(SoStatus::InTransit),
            "completed" => Some(SoStatus::Completed),
            _ => None,
        }
    }
}

impl std::fmt::Display for SoStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SoStatus::AwaitingIssue => write!(f, "Awaiting Issue"),
            SoStatus::AwaitingShipment => write!(f, "Awaiting Shipment"),
            SoStatus::InTransit => write!(f, "In Transit"),
            SoStatus::Completed => write!(f, "Completed"),
        }
    }
}

/// A line to be issued from the supplier's warehouse
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalesOrderLineItem {
    pub supplier_item_id: ItemId,
    pub buyer_item_id: ItemId,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub discount: Decimal,
}

impl From<&QuotationLineItem> for SalesOrderLineItem {
    fn from(line: &QuotationLineItem) -> Self {
        Self {
            supplier_item_id: line.supplier_item_id,
            buyer_item_id: line.buyer_item_id,
            quantity: line.quantity,
            unit_price: line.unit_price,
            discount: line.discount,
        }
    }
}

/// Supplier-side mirror of a purchase order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SalesOrder {
    pub id: EntityId,
    pub code: String,
    pub supplier_company_id: CompanyId,
    pub buyer_company_id: CompanyId,
    pub purchase_order_id: EntityId,
    pub issue_warehouse_id: WarehouseId,
    pub payment_method: String,
    pub delivery_from_address: String,
    pub delivery_to_address: String,
    pub status: SoStatus,
    pub line_items: Vec<SalesOrderLineItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
