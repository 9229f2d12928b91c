//! In-memory store
//!
//! All records live behind one `RwLock`; every write method holds the write
//! guard for its whole unit of work, so multi-record changes are atomic and
//! checks happen before any mutation.

use std::collections::{BTreeMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Utc};
use shared::workflow::{self, DeliveryStep, MirroredDecision, StatusChange};
use shared::{
    generate_document_code, insert_stop, stamp_destination, stamp_origin, CompanyId,
    DeliveryOrder, DeliveryStatus, DocumentKind, EntityId, IssueTicket, IssueTicketStatus,
    ItemId, PoStatus, PurchaseOrder, Quotation, QuotationStatus, Rfq, RfqStatus, SalesOrder,
    SoStatus, WarehouseId, Waypoint,
};
use tokio::sync::RwLock;

use super::{
    not_found, stale, Catalog, CommerceStore, DeliveryProgress, NewDeliveryOrder,
    NewPurchaseOrder, NewQuotation, NewRfq, NewSalesOrder, SalesOrderCommit,
};
use crate::error::{AppError, AppResult};

#[derive(Default)]
struct Sequences {
    rfq: EntityId,
    quotation: EntityId,
    purchase_order: EntityId,
    sales_order: EntityId,
    issue_ticket: EntityId,
    delivery_order: EntityId,
}

fn next(sequence: &mut EntityId) -> EntityId {
    *sequence += 1;
    *sequence
}

#[derive(Default)]
struct State {
    sequences: Sequences,
    rfqs: BTreeMap<EntityId, Rfq>,
    quotations: BTreeMap<EntityId, Quotation>,
    purchase_orders: BTreeMap<EntityId, PurchaseOrder>,
    sales_orders: BTreeMap<EntityId, SalesOrder>,
    issue_tickets: BTreeMap<EntityId, IssueTicket>,
    delivery_orders: BTreeMap<EntityId, DeliveryOrder>,
}

/// Commerce records kept in process memory
#[derive(Default)]
pub struct MemoryCommerceStore {
    state: RwLock<State>,
}

impl MemoryCommerceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CommerceStore for MemoryCommerceStore {
    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }

    // ========================================================================
    // RFQ / Quotation
    // ========================================================================

    async fn insert_rfq(&self, new: NewRfq) -> AppResult<Rfq> {
        let mut guard = self.state.write().await;
        let state = &mut *guard;
        let now = Utc::now();
        let id = next(&mut state.sequences.rfq);

        let rfq = Rfq {
            id,
            code: generate_document_code(DocumentKind::Rfq, now.year(), id),
            buyer_company_id: new.buyer_company_id,
            supplier_company_id: new.supplier_company_id,
            need_by_date: new.need_by_date,
            status: RfqStatus::PendingQuote,
            line_items: new.line_items,
            created_at: now,
            updated_at: now,
        };
        state.rfqs.insert(id, rfq.clone());
        Ok(rfq)
    }

    async fn find_rfq(&self, id: EntityId) -> AppResult<Option<Rfq>> {
        Ok(self.state.read().await.rfqs.get(&id).cloned())
    }

    async fn update_rfq_status(&self, id: EntityId, change: StatusChange<RfqStatus>) -> AppResult<Rfq> {
        let mut guard = self.state.write().await;
        let rfq = guard.rfqs.get_mut(&id).ok_or_else(|| not_found("RFQ", id))?;
        if rfq.status != change.from {
            return Err(stale("RFQ", id, change.from.as_str()));
        }
        rfq.status = change.to;
        rfq.updated_at = Utc::now();
        Ok(rfq.clone())
    }

    async fn insert_quotation(
        &self,
        new: NewQuotation,
        rfq_change: StatusChange<RfqStatus>,
    ) -> AppResult<(Rfq, Quotation)> {
        let mut guard = self.state.write().await;
        let state = &mut *guard;
        let now = Utc::now();

        if state.quotations.values().any(|q| q.rfq_id == new.rfq_id) {
            return Err(AppError::conflict("quotation", "RFQ already has a quotation"));
        }
        let rfq = state
            .rfqs
            .get_mut(&new.rfq_id)
            .ok_or_else(|| not_found("RFQ", new.rfq_id))?;
        if rfq.status != rfq_change.from {
            return Err(stale("RFQ", new.rfq_id, rfq_change.from.as_str()));
        }
        rfq.status = rfq_change.to;
        rfq.updated_at = now;

        let id = next(&mut state.sequences.quotation);
        let quotation = Quotation {
            id,
            code: generate_document_code(DocumentKind::Quotation, now.year(), id),
            rfq_id: new.rfq_id,
            buyer_company_id: new.buyer_company_id,
            supplier_company_id: new.supplier_company_id,
            status: QuotationStatus::Quoted,
            tax_rate: new.tax_rate,
            sub_total: new.totals.sub_total,
            tax_amount: new.totals.tax_amount,
            total_amount: new.totals.total_amount,
            line_items: new.line_items,
            created_at: now,
            updated_at: now,
        };
        let rfq = rfq.clone();
        state.quotations.insert(id, quotation.clone());
        Ok((rfq, quotation))
    }

    async fn find_quotation(&self, id: EntityId) -> AppResult<Option<Quotation>> {
        Ok(self.state.read().await.quotations.get(&id).cloned())
    }

    async fn find_quotation_by_rfq(&self, rfq_id: EntityId) -> AppResult<Option<Quotation>> {
        Ok(self
            .state
            .read()
            .await
            .quotations
            .values()
            .find(|q| q.rfq_id == rfq_id)
            .cloned())
    }

    async fn apply_quotation_decision(
        &self,
        rfq_id: EntityId,
        quotation_id: EntityId,
        decision: MirroredDecision,
    ) -> AppResult<(Rfq, Quotation)> {
        let mut guard = self.state.write().await;
        let state = &mut *guard;
        let now = Utc::now();

        let rfq = state.rfqs.get_mut(&rfq_id).ok_or_else(|| not_found("RFQ", rfq_id))?;
        let quotation = state
            .quotations
            .get_mut(&quotation_id)
            .ok_or_else(|| not_found("Quotation", quotation_id))?;
        if rfq.status != decision.rfq.from {
            return Err(stale("RFQ", rfq_id, decision.rfq.from.as_str()));
        }
        if quotation.status != decision.quotation.from {
            return Err(stale("Quotation", quotation_id, decision.quotation.from.as_str()));
        }

        rfq.status = decision.rfq.to;
        rfq.updated_at = now;
        quotation.status = decision.quotation.to;
        quotation.updated_at = now;
        Ok((rfq.clone(), quotation.clone()))
    }

    // ========================================================================
    // Purchase order / Sales order
    // ========================================================================

    async fn insert_purchase_order(
        &self,
        new: NewPurchaseOrder,
        quotation_status: QuotationStatus,
    ) -> AppResult<PurchaseOrder> {
        let mut guard = self.state.write().await;
        let state = &mut *guard;
        let now = Utc::now();

        if state
            .purchase_orders
            .values()
            .any(|po| po.quotation_id == new.quotation_id)
        {
            return Err(AppError::conflict("purchase_order", "Quotation already has a purchase order"));
        }
        let quotation = state
            .quotations
            .get(&new.quotation_id)
            .ok_or_else(|| not_found("Quotation", new.quotation_id))?;
        if quotation.status != quotation_status {
            return Err(stale("Quotation", new.quotation_id, quotation_status.as_str()));
        }

        let id = next(&mut state.sequences.purchase_order);
        let purchase_order = PurchaseOrder {
            id,
            code: generate_document_code(DocumentKind::PurchaseOrder, now.year(), id),
            buyer_company_id: new.buyer_company_id,
            supplier_company_id: new.supplier_company_id,
            quotation_id: new.quotation_id,
            receive_warehouse_id: new.receive_warehouse_id,
            payment_method: new.payment_method,
            delivery_address: new.delivery_address,
            status: PoStatus::PendingConfirm,
            created_at: now,
            updated_at: now,
        };
        state.purchase_orders.insert(id, purchase_order.clone());
        Ok(purchase_order)
    }

    async fn find_purchase_order(&self, id: EntityId) -> AppResult<Option<PurchaseOrder>> {
        Ok(self.state.read().await.purchase_orders.get(&id).cloned())
    }

    async fn find_purchase_order_by_quotation(
        &self,
        quotation_id: EntityId,
    ) -> AppResult<Option<PurchaseOrder>> {
        Ok(self
            .state
            .read()
            .await
            .purchase_orders
            .values()
            .find(|po| po.quotation_id == quotation_id)
            .cloned())
    }

    async fn update_purchase_order_status(
        &self,
        id: EntityId,
        change: StatusChange<PoStatus>,
    ) -> AppResult<PurchaseOrder> {
        let mut guard = self.state.write().await;
        let purchase_order = guard
            .purchase_orders
            .get_mut(&id)
            .ok_or_else(|| not_found("Purchase order", id))?;
        if purchase_order.status != change.from {
            return Err(stale("Purchase order", id, change.from.as_str()));
        }
        purchase_order.status = change.to;
        purchase_order.updated_at = Utc::now();
        Ok(purchase_order.clone())
    }

    async fn insert_sales_order(
        &self,
        new: NewSalesOrder,
        po_change: StatusChange<PoStatus>,
    ) -> AppResult<SalesOrderCommit> {
        let mut guard = self.state.write().await;
        let state = &mut *guard;
        let now = Utc::now();

        if state
            .sales_orders
            .values()
            .any(|so| so.purchase_order_id == new.purchase_order_id)
        {
            return Err(AppError::conflict("sales_order", "Purchase order already has a sales order"));
        }
        let purchase_order = state
            .purchase_orders
            .get_mut(&new.purchase_order_id)
            .ok_or_else(|| not_found("Purchase order", new.purchase_order_id))?;
        if purchase_order.status != po_change.from {
            return Err(stale("Purchase order", new.purchase_order_id, po_change.from.as_str()));
        }
        purchase_order.status = po_change.to;
        purchase_order.updated_at = now;
        let purchase_order = purchase_order.clone();

        let sales_order_id = next(&mut state.sequences.sales_order);
        let sales_order = SalesOrder {
            id: sales_order_id,
            code: generate_document_code(DocumentKind::SalesOrder, now.year(), sales_order_id),
            supplier_company_id: new.supplier_company_id,
            buyer_company_id: new.buyer_company_id,
            purchase_order_id: new.purchase_order_id,
            issue_warehouse_id: new.issue_warehouse_id,
            payment_method: new.payment_method,
            delivery_from_address: new.delivery_from_address,
            delivery_to_address: new.delivery_to_address,
            status: SoStatus::AwaitingIssue,
            line_items: new.line_items,
            created_at: now,
            updated_at: now,
        };

        let ticket_id = next(&mut state.sequences.issue_ticket);
        let issue_ticket = IssueTicket {
            id: ticket_id,
            code: generate_document_code(DocumentKind::IssueTicket, now.year(), ticket_id),
            sales_order_id,
            sales_order_code: sales_order.code.clone(),
            warehouse_id: sales_order.issue_warehouse_id,
            supplier_company_id: sales_order.supplier_company_id,
            status: IssueTicketStatus::Pending,
            created_at: now,
            updated_at: now,
        };

        state.sales_orders.insert(sales_order_id, sales_order.clone());
        state.issue_tickets.insert(ticket_id, issue_ticket.clone());
        Ok(SalesOrderCommit {
            sales_order,
            issue_ticket,
            purchase_order,
        })
    }

    async fn find_sales_order(&self, id: EntityId) -> AppResult<Option<SalesOrder>> {
        Ok(self.state.read().await.sales_orders.get(&id).cloned())
    }

    async fn find_sales_order_by_purchase_order(
        &self,
        purchase_order_id: EntityId,
    ) -> AppResult<Option<SalesOrder>> {
        Ok(self
            .state
            .read()
            .await
            .sales_orders
            .values()
            .find(|so| so.purchase_order_id == purchase_order_id)
            .cloned())
    }

    // ========================================================================
    // Issue tickets
    // ========================================================================

    async fn find_issue_ticket(&self, id: EntityId) -> AppResult<Option<IssueTicket>> {
        Ok(self.state.read().await.issue_tickets.get(&id).cloned())
    }

    async fn find_issue_ticket_by_sales_order(
        &self,
        sales_order_id: EntityId,
    ) -> AppResult<Option<IssueTicket>> {
        Ok(self
            .state
            .read()
            .await
            .issue_tickets
            .values()
            .find(|t| t.sales_order_id == sales_order_id)
            .cloned())
    }

    async fn list_issue_tickets(
        &self,
        supplier_company_id: CompanyId,
        status: Option<IssueTicketStatus>,
    ) -> AppResult<Vec<IssueTicket>> {
        Ok(self
            .state
            .read()
            .await
            .issue_tickets
            .values()
            .filter(|t| t.supplier_company_id == supplier_company_id)
            .filter(|t| status.map_or(true, |s| t.status == s))
            .cloned()
            .collect())
    }

    async fn confirm_issue_ticket(
        &self,
        ticket_id: EntityId,
        ticket_change: StatusChange<IssueTicketStatus>,
        sales_order_id: EntityId,
        so_change: StatusChange<SoStatus>,
    ) -> AppResult<(IssueTicket, SalesOrder)> {
        let mut guard = self.state.write().await;
        let state = &mut *guard;
        let now = Utc::now();

        let ticket = state
            .issue_tickets
            .get_mut(&ticket_id)
            .ok_or_else(|| not_found("Issue ticket", ticket_id))?;
        let sales_order = state
            .sales_orders
            .get_mut(&sales_order_id)
            .ok_or_else(|| not_found("Sales order", sales_order_id))?;
        if ticket.status != ticket_change.from {
            return Err(stale("Issue ticket", ticket_id, ticket_change.from.as_str()));
        }
        if sales_order.status != so_change.from {
            return Err(stale("Sales order", sales_order_id, so_change.from.as_str()));
        }

        ticket.status = ticket_change.to;
        ticket.updated_at = now;
        sales_order.status = so_change.to;
        sales_order.updated_at = now;
        Ok((ticket.clone(), sales_order.clone()))
    }

    // ========================================================================
    // Delivery
    // ========================================================================

    async fn insert_delivery_order(
        &self,
        new: NewDeliveryOrder,
        so_status: SoStatus,
    ) -> AppResult<DeliveryOrder> {
        let mut guard = self.state.write().await;
        let state = &mut *guard;
        let now = Utc::now();

        if state
            .delivery_orders
            .values()
            .any(|d| d.sales_order_id == new.sales_order_id)
        {
            return Err(AppError::conflict("delivery_order", "Sales order already has a delivery"));
        }
        let sales_order = state
            .sales_orders
            .get(&new.sales_order_id)
            .ok_or_else(|| not_found("Sales order", new.sales_order_id))?;
        if sales_order.status != so_status {
            return Err(stale("Sales order", new.sales_order_id, so_status.as_str()));
        }

        let id = next(&mut state.sequences.delivery_order);
        let delivery_order = DeliveryOrder {
            id,
            code: generate_document_code(DocumentKind::DeliveryOrder, now.year(), id),
            sales_order_id: new.sales_order_id,
            supplier_company_id: new.supplier_company_id,
            buyer_company_id: new.buyer_company_id,
            status: DeliveryStatus::AwaitingPickup,
            waypoints: new.waypoints,
            created_at: now,
            updated_at: now,
        };
        state.delivery_orders.insert(id, delivery_order.clone());
        Ok(delivery_order)
    }

    async fn find_delivery_order(&self, id: EntityId) -> AppResult<Option<DeliveryOrder>> {
        Ok(self.state.read().await.delivery_orders.get(&id).cloned())
    }

    async fn find_delivery_order_by_sales_order(
        &self,
        sales_order_id: EntityId,
    ) -> AppResult<Option<DeliveryOrder>> {
        Ok(self
            .state
            .read()
            .await
            .delivery_orders
            .values()
            .find(|d| d.sales_order_id == sales_order_id)
            .cloned())
    }

    async fn append_waypoint(&self, id: EntityId, stop: Waypoint) -> AppResult<DeliveryOrder> {
        let mut guard = self.state.write().await;
        let delivery_order = guard
            .delivery_orders
            .get_mut(&id)
            .ok_or_else(|| not_found("Delivery order", id))?;
        workflow::ensure_waypoint_appendable(
            delivery_order.status,
            delivery_order.destination_reached(),
        )?;

        insert_stop(&mut delivery_order.waypoints, stop);
        delivery_order.updated_at = Utc::now();
        Ok(delivery_order.clone())
    }

    async fn record_destination_arrival(
        &self,
        id: EntityId,
        arrival_time: DateTime<Utc>,
        purchase_order_id: EntityId,
        po_change: StatusChange<PoStatus>,
    ) -> AppResult<(DeliveryOrder, PurchaseOrder)> {
        let mut guard = self.state.write().await;
        let state = &mut *guard;
        let now = Utc::now();

        let delivery_order = state
            .delivery_orders
            .get_mut(&id)
            .ok_or_else(|| not_found("Delivery order", id))?;
        let purchase_order = state
            .purchase_orders
            .get_mut(&purchase_order_id)
            .ok_or_else(|| not_found("Purchase order", purchase_order_id))?;
        if delivery_order.status != DeliveryStatus::InTransit || delivery_order.destination_reached() {
            return Err(stale("Delivery order", id, "in transit"));
        }
        if purchase_order.status != po_change.from {
            return Err(stale("Purchase order", purchase_order_id, po_change.from.as_str()));
        }

        stamp_destination(&mut delivery_order.waypoints, arrival_time);
        delivery_order.updated_at = now;
        purchase_order.status = po_change.to;
        purchase_order.updated_at = now;
        Ok((delivery_order.clone(), purchase_order.clone()))
    }

    async fn apply_delivery_step(
        &self,
        id: EntityId,
        sales_order_id: EntityId,
        purchase_order_id: EntityId,
        step: DeliveryStep,
        departed_at: DateTime<Utc>,
    ) -> AppResult<DeliveryProgress> {
        let mut guard = self.state.write().await;
        let state = &mut *guard;
        let now = Utc::now();

        let delivery_order = state
            .delivery_orders
            .get_mut(&id)
            .ok_or_else(|| not_found("Delivery order", id))?;
        let sales_order = state
            .sales_orders
            .get_mut(&sales_order_id)
            .ok_or_else(|| not_found("Sales order", sales_order_id))?;
        let purchase_order = state
            .purchase_orders
            .get_mut(&purchase_order_id)
            .ok_or_else(|| not_found("Purchase order", purchase_order_id))?;

        if delivery_order.status != step.delivery.from {
            return Err(stale("Delivery order", id, step.delivery.from.as_str()));
        }
        if sales_order.status != step.sales_order.from {
            return Err(stale("Sales order", sales_order_id, step.sales_order.from.as_str()));
        }
        if purchase_order.status != step.purchase_order.from {
            return Err(stale("Purchase order", purchase_order_id, step.purchase_order.from.as_str()));
        }
        if step.delivery.to == DeliveryStatus::Delivered && !delivery_order.destination_reached() {
            return Err(workflow::TransitionError::DestinationNotReached.into());
        }

        if step.delivery.from == DeliveryStatus::AwaitingPickup {
            stamp_origin(&mut delivery_order.waypoints, departed_at);
        }
        delivery_order.status = step.delivery.to;
        delivery_order.updated_at = now;
        sales_order.status = step.sales_order.to;
        sales_order.updated_at = now;
        purchase_order.status = step.purchase_order.to;
        purchase_order.updated_at = now;

        Ok(DeliveryProgress {
            delivery_order: delivery_order.clone(),
            sales_order: sales_order.clone(),
            purchase_order: purchase_order.clone(),
        })
    }
}

// ============================================================================
// Catalog
// ============================================================================

/// Item and warehouse master data held in memory
#[derive(Debug, Default, Clone)]
pub struct MemoryCatalog {
    items: HashSet<(CompanyId, ItemId)>,
    sellable_items: HashSet<(CompanyId, ItemId)>,
    warehouses: HashSet<(CompanyId, WarehouseId)>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_item(mut self, company_id: CompanyId, item_id: ItemId) -> Self {
        self.items.insert((company_id, item_id));
        self
    }

    pub fn with_sellable_item(mut self, company_id: CompanyId, item_id: ItemId) -> Self {
        self.items.insert((company_id, item_id));
        self.sellable_items.insert((company_id, item_id));
        self
    }

    pub fn with_warehouse(mut self, company_id: CompanyId, warehouse_id: WarehouseId) -> Self {
        self.warehouses.insert((company_id, warehouse_id));
        self
    }
}

#[async_trait]
impl Catalog for MemoryCatalog {
    async fn item_exists(&self, company_id: CompanyId, item_id: ItemId) -> AppResult<bool> {
        Ok(self.items.contains(&(company_id, item_id)))
    }

    async fn item_is_sellable(&self, company_id: CompanyId, item_id: ItemId) -> AppResult<bool> {
        Ok(self.sellable_items.contains(&(company_id, item_id)))
    }

    async fn warehouse_exists(&self, company_id: CompanyId, warehouse_id: WarehouseId) -> AppResult<bool> {
        Ok(self.warehouses.contains(&(company_id, warehouse_id)))
    }
}
