//! Purchase order models (buyer side)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{CompanyId, EntityId, WarehouseId};

/// Status of a purchase order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoStatus {
    PendingConfirm,
    Confirmed,
    InTransit,
    AwaitingReceipt,
    Completed,
    Cancelled,
}

impl PoStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PoStatus::PendingConfirm => "pending_confirm",
            PoStatus::Confirmed => "confirmed",
            PoStatus::InTransit => "in_transit",
            PoStatus::AwaitingReceipt => "awaiting_receipt",
            PoStatus::Completed => "completed",
            PoStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending_confirm" => Some(PoStatus::PendingConfirm),
            "confirmed" => Some(PoStatus::Confirmed),
            "in_transit" => Some(PoStatus::InTransit),
            "awaiting_receipt" => Some(PoStatus::AwaitingReceipt),
            "completed" => Some(PoStatus::Completed),
            "cancelled" => Some(PoStatus::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PoStatus::Completed | PoStatus::Cancelled)
    }
}

impl std::fmt::Display for PoStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PoStatus::PendingConfirm => write!(f, "Pending Confirmation"),
            PoStatus::Confirmed => write!(f, "Confirmed"),
            PoStatus::InTransit => write!(f, "In Transit"),
            PoStatus::AwaitingReceipt => write!(f, "Awaiting Receipt"),
            PoStatus::Completed => write!(f, "Completed"),
            PoStatus::Cancelled => write!(f, "Cancelled"),
        }
    }
}

/// Buyer-side commitment created from an accepted quotation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseOrder {
    pub id: EntityId,
    pub code: String,
    pub buyer_company_id: CompanyId,
    pub supplier_company_id: CompanyId,
    pub quotation_id: EntityId,
    pub receive_warehouse_id: WarehouseId,
    pub payment_method: String,
    pub delivery_address: String,
    pub status: PoStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
