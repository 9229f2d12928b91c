//! Warehouse issue tickets opened for sales orders

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{CompanyId, EntityId, WarehouseId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueTicketStatus {
    Pending,
    Confirmed,
}

impl IssueTicketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueTicketStatus::Pending => "pending",
            IssueTicketStatus::Confirmed => "confirmed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(IssueTicketStatus::Pending),
            "confirmed" => Some(IssueTicketStatus::Confirmed),
            _ => None,
        }
    }
}

/// Authorization for the warehouse to pull stock for a sales order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueTicket {
    pub id: EntityId,
    pub code: String,
    pub sales_order_id: EntityId,
    pub sales_order_code: String,
    pub warehouse_id: WarehouseId,
    pub supplier_company_id: CompanyId,
    pub status: IssueTicketStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
