//! Persistence contracts for the order lifecycle
//!
//! Every write method is one atomic unit of work. Guarded writes take the
//! status change the caller decided on and fail with `StaleStatus` when the
//! record is no longer at `from`; inserts of a 1:1 counterpart fail with
//! `Conflict` when the counterpart already exists.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use shared::workflow::{DeliveryStep, MirroredDecision, StatusChange};
use shared::{
    CompanyId, DeliveryOrder, EntityId, IssueTicket, IssueTicketStatus, ItemId, PoStatus,
    PurchaseOrder, Quotation, QuotationLineItem, QuotationStatus, QuotationTotals, Rfq,
    RfqLineItem, RfqStatus, SalesOrder, SalesOrderLineItem, SoStatus, WarehouseId, Waypoint,
};

use crate::error::{AppError, AppResult};

pub use memory::{MemoryCatalog, MemoryCommerceStore};
pub use postgres::{PgCatalog, PgCommerceStore};

// ============================================================================
// Inserts
// ============================================================================

#[derive(Debug, Clone)]
pub struct NewRfq {
    pub buyer_company_id: CompanyId,
    pub supplier_company_id: CompanyId,
    pub need_by_date: DateTime<Utc>,
    pub line_items: Vec<RfqLineItem>,
}

#[derive(Debug, Clone)]
pub struct NewQuotation {
    pub rfq_id: EntityId,
    pub buyer_company_id: CompanyId,
    pub supplier_company_id: CompanyId,
    pub tax_rate: Decimal,
    pub totals: QuotationTotals,
    pub line_items: Vec<QuotationLineItem>,
}

#[derive(Debug, Clone)]
pub struct NewPurchaseOrder {
    pub buyer_company_id: CompanyId,
    pub supplier_company_id: CompanyId,
    pub quotation_id: EntityId,
    pub receive_warehouse_id: WarehouseId,
    pub payment_method: String,
    pub delivery_address: String,
}

#[derive(Debug, Clone)]
pub struct NewSalesOrder {
    pub supplier_company_id: CompanyId,
    pub buyer_company_id: CompanyId,
    pub purchase_order_id: EntityId,
    pub issue_warehouse_id: WarehouseId,
    pub payment_method: String,
    pub delivery_from_address: String,
    pub delivery_to_address: String,
    pub line_items: Vec<SalesOrderLineItem>,
}

#[derive(Debug, Clone)]
pub struct NewDeliveryOrder {
    pub sales_order_id: EntityId,
    pub supplier_company_id: CompanyId,
    pub buyer_company_id: CompanyId,
    pub waypoints: Vec<Waypoint>,
}

// ============================================================================
// Commit results
// ============================================================================

/// Records written by sales order creation
#[derive(Debug, Clone)]
pub struct SalesOrderCommit {
    pub sales_order: SalesOrder,
    pub issue_ticket: IssueTicket,
    pub purchase_order: PurchaseOrder,
}

/// Records touched by a delivery step
#[derive(Debug, Clone)]
pub struct DeliveryProgress {
    pub delivery_order: DeliveryOrder,
    pub sales_order: SalesOrder,
    pub purchase_order: PurchaseOrder,
}

// ============================================================================
// Contracts
// ============================================================================

#[async_trait]
pub trait CommerceStore: Send + Sync {
    /// Connectivity check for health probes
    async fn ping(&self) -> AppResult<()>;

    // RFQ / Quotation
    async fn insert_rfq(&self, new: NewRfq) -> AppResult<Rfq>;
    async fn find_rfq(&self, id: EntityId) -> AppResult<Option<Rfq>>;
    async fn update_rfq_status(&self, id: EntityId, change: StatusChange<RfqStatus>) -> AppResult<Rfq>;

    /// Insert the quotation and move its RFQ to `Quoted` together
    async fn insert_quotation(
        &self,
        new: NewQuotation,
        rfq_change: StatusChange<RfqStatus>,
    ) -> AppResult<(Rfq, Quotation)>;
    async fn find_quotation(&self, id: EntityId) -> AppResult<Option<Quotation>>;
    async fn find_quotation_by_rfq(&self, rfq_id: EntityId) -> AppResult<Option<Quotation>>;

    /// Apply a buyer decision to the RFQ and its quotation together
    async fn apply_quotation_decision(
        &self,
        rfq_id: EntityId,
        quotation_id: EntityId,
        decision: MirroredDecision,
    ) -> AppResult<(Rfq, Quotation)>;

    // Purchase order / Sales order
    /// Insert a purchase order for a quotation that is still at `quotation_status`
    async fn insert_purchase_order(
        &self,
        new: NewPurchaseOrder,
        quotation_status: QuotationStatus,
    ) -> AppResult<PurchaseOrder>;
    async fn find_purchase_order(&self, id: EntityId) -> AppResult<Option<PurchaseOrder>>;
    async fn find_purchase_order_by_quotation(
        &self,
        quotation_id: EntityId,
    ) -> AppResult<Option<PurchaseOrder>>;
    async fn update_purchase_order_status(
        &self,
        id: EntityId,
        change: StatusChange<PoStatus>,
    ) -> AppResult<PurchaseOrder>;

    /// Insert the sales order and its issue ticket and confirm the purchase order
    async fn insert_sales_order(
        &self,
        new: NewSalesOrder,
        po_change: StatusChange<PoStatus>,
    ) -> AppResult<SalesOrderCommit>;
    async fn find_sales_order(&self, id: EntityId) -> AppResult<Option<SalesOrder>>;
    async fn find_sales_order_by_purchase_order(
        &self,
        purchase_order_id: EntityId,
    ) -> AppResult<Option<SalesOrder>>;

    // Issue tickets
    async fn find_issue_ticket(&self, id: EntityId) -> AppResult<Option<IssueTicket>>;
    async fn find_issue_ticket_by_sales_order(
        &self,
        sales_order_id: EntityId,
    ) -> AppResult<Option<IssueTicket>>;
    async fn list_issue_tickets(
        &self,
        supplier_company_id: CompanyId,
        status: Option<IssueTicketStatus>,
    ) -> AppResult<Vec<IssueTicket>>;

    /// Confirm the ticket and release its sales order for shipment together
    async fn confirm_issue_ticket(
        &self,
        ticket_id: EntityId,
        ticket_change: StatusChange<IssueTicketStatus>,
        sales_order_id: EntityId,
        so_change: StatusChange<SoStatus>,
    ) -> AppResult<(IssueTicket, SalesOrder)>;

    // Delivery
    /// Insert a delivery for a sales order that is still at `so_status`
    async fn insert_delivery_order(
        &self,
        new: NewDeliveryOrder,
        so_status: SoStatus,
    ) -> AppResult<DeliveryOrder>;
    async fn find_delivery_order(&self, id: EntityId) -> AppResult<Option<DeliveryOrder>>;
    async fn find_delivery_order_by_sales_order(
        &self,
        sales_order_id: EntityId,
    ) -> AppResult<Option<DeliveryOrder>>;

    /// Insert a stop before the destination, re-checking appendability on the locked record
    async fn append_waypoint(&self, id: EntityId, stop: Waypoint) -> AppResult<DeliveryOrder>;

    /// Stamp the destination arrival and move the purchase order together
    async fn record_destination_arrival(
        &self,
        id: EntityId,
        arrival_time: DateTime<Utc>,
        purchase_order_id: EntityId,
        po_change: StatusChange<PoStatus>,
    ) -> AppResult<(DeliveryOrder, PurchaseOrder)>;

    /// Apply one delivery step to the delivery, sales order and purchase order.
    /// `departed_at` stamps the origin when the step leaves `AwaitingPickup`.
    async fn apply_delivery_step(
        &self,
        id: EntityId,
        sales_order_id: EntityId,
        purchase_order_id: EntityId,
        step: DeliveryStep,
        departed_at: DateTime<Utc>,
    ) -> AppResult<DeliveryProgress>;
}

/// Master data lookups owned by the entity-master screens
#[async_trait]
pub trait Catalog: Send + Sync {
    async fn item_exists(&self, company_id: CompanyId, item_id: ItemId) -> AppResult<bool>;
    async fn item_is_sellable(&self, company_id: CompanyId, item_id: ItemId) -> AppResult<bool>;
    async fn warehouse_exists(&self, company_id: CompanyId, warehouse_id: WarehouseId) -> AppResult<bool>;
}

pub(crate) fn stale(entity: &str, id: EntityId, expected: &str) -> AppError {
    AppError::StaleStatus(format!("{} {} is no longer {}", entity, id, expected))
}

pub(crate) fn not_found(entity: &str, id: EntityId) -> AppError {
    AppError::NotFound(format!("{} {}", entity, id))
}
