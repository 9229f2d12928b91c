//! Purchase order / sales order pairing
//!
//! The buyer orders an accepted quotation; the supplier answers the purchase
//! order with exactly one sales order. Creating the sales order reserves stock
//! through the inventory counter, opens an issue ticket for the warehouse and
//! confirms the purchase order, with no partial effect on failure.

use serde::Deserialize;
use shared::workflow::{self, PoAction, SoAction, StatusChange};
use shared::{
    validate_required_text, ActingCompany, EntityId, IssueTicket, IssueTicketStatus, Party,
    PurchaseOrder, QuotationStatus, SalesOrder, SalesOrderLineItem, WarehouseId,
};
use uuid::Uuid;
use validator::Validate;

use super::{field_error, participant, require_party, CommerceDeps};
use crate::error::{AppError, AppResult};
use crate::external::OnDemandAdjustment;
use crate::store::{NewPurchaseOrder, NewSalesOrder, SalesOrderCommit};

/// Order service
#[derive(Clone)]
pub struct OrderService {
    deps: CommerceDeps,
}

/// Input for ordering an accepted quotation; the acting company is the buyer
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreatePurchaseOrderInput {
    pub quotation_id: EntityId,
    pub receive_warehouse_id: WarehouseId,
    #[validate(length(min = 1, max = 100, message = "Payment method is required"))]
    pub payment_method: String,
    #[validate(length(min = 1, max = 500, message = "Delivery address is required"))]
    pub delivery_address: String,
}

/// Input for answering a purchase order; the acting company is the supplier
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateSalesOrderInput {
    pub issue_warehouse_id: WarehouseId,
    #[validate(length(min = 1, max = 100, message = "Payment method is required"))]
    pub payment_method: String,
    #[validate(length(min = 1, max = 500, message = "Origin address is required"))]
    pub delivery_from_address: String,
}

/// One keyed reservation per line. Keys are unique per attempt so a losing
/// concurrent attempt only ever reverses its own increases.
fn reservations_for(
    purchase_order_id: EntityId,
    warehouse_id: WarehouseId,
    line_items: &[SalesOrderLineItem],
) -> Vec<OnDemandAdjustment> {
    let attempt = Uuid::new_v4();
    line_items
        .iter()
        .enumerate()
        .map(|(index, line)| OnDemandAdjustment {
            key: format!("po-{}-{}-line-{}", purchase_order_id, attempt, index),
            warehouse_id,
            item_id: line.supplier_item_id,
            quantity: line.quantity,
        })
        .collect()
}

impl OrderService {
    pub fn new(deps: CommerceDeps) -> Self {
        Self { deps }
    }

    async fn load_purchase_order(&self, id: EntityId) -> AppResult<PurchaseOrder> {
        self.deps
            .store
            .find_purchase_order(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Purchase order {}", id)))
    }

    async fn load_sales_order(&self, id: EntityId) -> AppResult<SalesOrder> {
        self.deps
            .store
            .find_sales_order(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Sales order {}", id)))
    }

    // ========================================================================
    // Purchase orders
    // ========================================================================

    pub async fn create_po(
        &self,
        actor: ActingCompany,
        input: CreatePurchaseOrderInput,
    ) -> AppResult<PurchaseOrder> {
        input.validate()?;
        validate_required_text(&input.payment_method).map_err(field_error("payment_method"))?;
        validate_required_text(&input.delivery_address).map_err(field_error("delivery_address"))?;

        let quotation = self
            .deps
            .store
            .find_quotation(input.quotation_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Quotation {}", input.quotation_id)))?;
        require_party(
            actor,
            quotation.buyer_company_id,
            quotation.supplier_company_id,
            Party::Buyer,
            "Quotation",
            quotation.id,
            "order a quotation",
        )?;

        if let Some(existing) = self
            .deps
            .store
            .find_purchase_order_by_quotation(quotation.id)
            .await?
        {
            return Err(AppError::conflict(
                "purchase_order",
                format!("Quotation {} is already ordered as {}", quotation.code, existing.code),
            ));
        }
        workflow::ensure_quotation_orderable(quotation.status)?;

        if !self
            .deps
            .catalog
            .warehouse_exists(actor.company_id, input.receive_warehouse_id)
            .await?
        {
            return Err(AppError::validation("receive_warehouse_id", "Unknown receiving warehouse"));
        }

        let purchase_order = self
            .deps
            .store
            .insert_purchase_order(
                NewPurchaseOrder {
                    buyer_company_id: quotation.buyer_company_id,
                    supplier_company_id: quotation.supplier_company_id,
                    quotation_id: quotation.id,
                    receive_warehouse_id: input.receive_warehouse_id,
                    payment_method: input.payment_method.trim().to_string(),
                    delivery_address: input.delivery_address.trim().to_string(),
                },
                QuotationStatus::Accepted,
            )
            .await?;

        tracing::info!("Purchase order {} placed for quotation {}", purchase_order.code, quotation.code);
        Ok(purchase_order)
    }

    pub async fn cancel_po(&self, actor: ActingCompany, id: EntityId) -> AppResult<PurchaseOrder> {
        let purchase_order = self.load_purchase_order(id).await?;
        require_party(
            actor,
            purchase_order.buyer_company_id,
            purchase_order.supplier_company_id,
            Party::Buyer,
            "Purchase order",
            id,
            "cancel a purchase order",
        )?;

        let target = workflow::po_transition(purchase_order.status, PoAction::Cancel)?;
        let purchase_order = self
            .deps
            .store
            .update_purchase_order_status(id, StatusChange::new(purchase_order.status, target))
            .await?;

        tracing::info!("Purchase order {} cancelled", purchase_order.code);
        Ok(purchase_order)
    }

    pub async fn get_purchase_order(&self, actor: ActingCompany, id: EntityId) -> AppResult<PurchaseOrder> {
        let purchase_order = self.load_purchase_order(id).await?;
        participant(
            actor,
            purchase_order.buyer_company_id,
            purchase_order.supplier_company_id,
            "Purchase order",
            id,
        )?;
        Ok(purchase_order)
    }

    // ========================================================================
    // Sales orders
    // ========================================================================

    /// Answer a purchase order with a sales order.
    ///
    /// Order of effects: guards, one on-demand increase per line, then a single
    /// commit of PO confirmation + sales order + issue ticket. Increases already
    /// applied are reversed if a later step fails.
    pub async fn create_so(
        &self,
        actor: ActingCompany,
        purchase_order_id: EntityId,
        input: CreateSalesOrderInput,
    ) -> AppResult<SalesOrderCommit> {
        input.validate()?;
        validate_required_text(&input.payment_method).map_err(field_error("payment_method"))?;
        validate_required_text(&input.delivery_from_address)
            .map_err(field_error("delivery_from_address"))?;

        let purchase_order = self.load_purchase_order(purchase_order_id).await?;
        require_party(
            actor,
            purchase_order.buyer_company_id,
            purchase_order.supplier_company_id,
            Party::Supplier,
            "Purchase order",
            purchase_order_id,
            "create a sales order",
        )?;

        if let Some(existing) = self
            .deps
            .store
            .find_sales_order_by_purchase_order(purchase_order_id)
            .await?
        {
            return Err(AppError::conflict(
                "sales_order",
                format!("Purchase order {} already has sales order {}", purchase_order.code, existing.code),
            ));
        }
        let target = workflow::po_transition(purchase_order.status, PoAction::Confirm)?;

        if !self
            .deps
            .catalog
            .warehouse_exists(actor.company_id, input.issue_warehouse_id)
            .await?
        {
            return Err(AppError::validation("issue_warehouse_id", "Unknown issuing warehouse"));
        }

        let quotation = self
            .deps
            .store
            .find_quotation(purchase_order.quotation_id)
            .await?
            .ok_or_else(|| {
                AppError::Internal(format!(
                    "Purchase order {} references missing quotation {}",
                    purchase_order.code, purchase_order.quotation_id
                ))
            })?;
        let line_items: Vec<SalesOrderLineItem> =
            quotation.line_items.iter().map(SalesOrderLineItem::from).collect();

        let warehouse_id = input.issue_warehouse_id;
        let reservations = reservations_for(purchase_order_id, warehouse_id, &line_items);
        self.reserve(&reservations).await?;

        let committed = self
            .deps
            .store
            .insert_sales_order(
                NewSalesOrder {
                    supplier_company_id: purchase_order.supplier_company_id,
                    buyer_company_id: purchase_order.buyer_company_id,
                    purchase_order_id,
                    issue_warehouse_id: warehouse_id,
                    payment_method: input.payment_method.trim().to_string(),
                    delivery_from_address: input.delivery_from_address.trim().to_string(),
                    delivery_to_address: purchase_order.delivery_address.clone(),
                    line_items,
                },
                StatusChange::new(purchase_order.status, target),
            )
            .await;

        match committed {
            Ok(commit) => {
                tracing::info!(
                    "Sales order {} confirms purchase order {}; issue ticket {} opened at warehouse {}",
                    commit.sales_order.code,
                    commit.purchase_order.code,
                    commit.issue_ticket.code,
                    warehouse_id
                );
                Ok(commit)
            }
            Err(e) => {
                tracing::warn!(
                    "Sales order for purchase order {} not committed, releasing reservations: {}",
                    purchase_order.code,
                    e
                );
                self.release(&reservations).await;
                Err(e)
            }
        }
    }

    /// Raise the on-demand counter for every line, undoing on the first failure.
    ///
    /// The failing line is released too: its increase may have landed even
    /// though the call reported an error.
    async fn reserve(&self, reservations: &[OnDemandAdjustment]) -> AppResult<()> {
        for (attempted, reservation) in reservations.iter().enumerate() {
            if let Err(e) = self.deps.inventory.increase_on_demand(reservation).await {
                tracing::warn!(
                    "On-demand increase {} failed for item {} at warehouse {}: {}",
                    reservation.key,
                    reservation.item_id,
                    reservation.warehouse_id,
                    e
                );
                self.release(&reservations[..=attempted]).await;
                return Err(match e {
                    AppError::AdapterError(_) => e,
                    other => AppError::AdapterError(other.to_string()),
                });
            }
        }
        Ok(())
    }

    /// Reverse increases in the opposite order they were applied
    async fn release(&self, reservations: &[OnDemandAdjustment]) {
        for reservation in reservations.iter().rev() {
            if let Err(e) = self.deps.inventory.decrease_on_demand(reservation).await {
                tracing::error!(
                    "Failed to release {} ({} of item {} at warehouse {}): {}",
                    reservation.key,
                    reservation.quantity,
                    reservation.item_id,
                    reservation.warehouse_id,
                    e
                );
            }
        }
    }

    pub async fn get_sales_order(&self, actor: ActingCompany, id: EntityId) -> AppResult<SalesOrder> {
        let sales_order = self.load_sales_order(id).await?;
        participant(
            actor,
            sales_order.buyer_company_id,
            sales_order.supplier_company_id,
            "Sales order",
            id,
        )?;
        Ok(sales_order)
    }

    // ========================================================================
    // Issue tickets
    // ========================================================================

    /// Warehouse confirmation: the goods are issued and the sales order can ship
    pub async fn confirm_issue_ticket(
        &self,
        actor: ActingCompany,
        ticket_id: EntityId,
    ) -> AppResult<(IssueTicket, SalesOrder)> {
        let ticket = self.get_issue_ticket(actor, ticket_id).await?;
        let sales_order = self.load_sales_order(ticket.sales_order_id).await?;

        let ticket_target = workflow::issue_ticket_confirm(ticket.status)?;
        let so_target = workflow::so_transition(sales_order.status, SoAction::ConfirmIssue)?;

        let (ticket, sales_order) = self
            .deps
            .store
            .confirm_issue_ticket(
                ticket_id,
                StatusChange::new(ticket.status, ticket_target),
                sales_order.id,
                StatusChange::new(sales_order.status, so_target),
            )
            .await?;

        tracing::info!("Issue ticket {} confirmed; sales order {} awaiting shipment", ticket.code, sales_order.code);
        Ok((ticket, sales_order))
    }

    /// Issue tickets are internal to the supplier; the buyer never sees them
    pub async fn get_issue_ticket(&self, actor: ActingCompany, ticket_id: EntityId) -> AppResult<IssueTicket> {
        self.deps
            .store
            .find_issue_ticket(ticket_id)
            .await?
            .filter(|t| t.supplier_company_id == actor.company_id)
            .ok_or_else(|| AppError::NotFound(format!("Issue ticket {}", ticket_id)))
    }

    pub async fn list_issue_tickets(
        &self,
        actor: ActingCompany,
        status: Option<IssueTicketStatus>,
    ) -> AppResult<Vec<IssueTicket>> {
        self.deps.store.list_issue_tickets(actor.company_id, status).await
    }
}
