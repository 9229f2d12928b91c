//! Common types used across the platform

use serde::{Deserialize, Serialize};

/// Opaque numeric identifier of a stored record
pub type EntityId = i64;

/// Identifier of a tenant company
pub type CompanyId = i64;

/// Identifier of a catalog item (scoped to its owning company)
pub type ItemId = i64;

/// Identifier of a warehouse (scoped to its owning company)
pub type WarehouseId = i64;

/// The company on whose behalf an operation is invoked.
///
/// Passed explicitly into every workflow operation; there is no ambient session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActingCompany {
    pub company_id: CompanyId,
}

impl ActingCompany {
    pub fn new(company_id: CompanyId) -> Self {
        Self { company_id }
    }

    /// Role this company plays on a buyer/supplier pair, if any
    pub fn party(&self, buyer_company_id: CompanyId, supplier_company_id: CompanyId) -> Option<Party> {
        if self.company_id == buyer_company_id {
            Some(Party::Buyer)
        } else if self.company_id == supplier_company_id {
            Some(Party::Supplier)
        } else {
            None
        }
    }
}

/// Side of a trade a company is acting on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Party {
    Buyer,
    Supplier,
}

impl std::fmt::Display for Party {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Party::Buyer => write!(f, "buyer"),
            Party::Supplier => write!(f, "supplier"),
        }
    }
}

/// Documents that carry a human-readable code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Rfq,
    Quotation,
    PurchaseOrder,
    SalesOrder,
    IssueTicket,
    DeliveryOrder,
}

impl DocumentKind {
    pub fn prefix(&self) -> &'static str {
        match self {
            DocumentKind::Rfq => "RFQ",
            DocumentKind::Quotation => "QT",
            DocumentKind::PurchaseOrder => "PO",
            DocumentKind::SalesOrder => "SO",
            DocumentKind::IssueTicket => "IT",
            DocumentKind::DeliveryOrder => "DO",
        }
    }
}

/// Generate a document code (e.g., "PO-2026-000042")
pub fn generate_document_code(kind: DocumentKind, year: i32, id: EntityId) -> String {
    format!("{}-{}-{:06}", kind.prefix(), year, id)
}
