//! Delivery tracking
//!
//! A delivery order follows one sales order from the issuing warehouse to the
//! buyer's address. Its waypoint timeline starts with the origin and ends with
//! the destination; intermediate stops are appended in between. Advancing the
//! delivery carries the sales order and purchase order along with it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::workflow;
use shared::{
    validate_required_text, ActingCompany, DeliveryOrder, DeliveryStatus, EntityId, Party,
    PurchaseOrder, SalesOrder, SoStatus, Waypoint,
};
use validator::Validate;

use super::{field_error, participant, require_party, CommerceDeps};
use crate::error::{AppError, AppResult};
use crate::store::{DeliveryProgress, NewDeliveryOrder};

/// Delivery service
#[derive(Clone)]
pub struct DeliveryService {
    deps: CommerceDeps,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AddWaypointInput {
    #[validate(length(min = 1, max = 500, message = "Location is required"))]
    pub location: String,
    pub arrival_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecordArrivalInput {
    /// Defaults to now
    pub arrival_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdvanceStatusInput {
    pub status: DeliveryStatus,
}

/// Delivery order with its progress-stepper position
#[derive(Debug, Clone, Serialize)]
pub struct DeliveryDetail {
    #[serde(flatten)]
    pub delivery_order: DeliveryOrder,
    pub step_index: usize,
}

impl From<DeliveryOrder> for DeliveryDetail {
    fn from(delivery_order: DeliveryOrder) -> Self {
        Self {
            step_index: delivery_order.step_index(),
            delivery_order,
        }
    }
}

impl DeliveryService {
    pub fn new(deps: CommerceDeps) -> Self {
        Self { deps }
    }

    async fn load(&self, id: EntityId) -> AppResult<DeliveryOrder> {
        self.deps
            .store
            .find_delivery_order(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Delivery order {}", id)))
    }

    async fn sales_order_of(&self, delivery_order: &DeliveryOrder) -> AppResult<SalesOrder> {
        self.deps
            .store
            .find_sales_order(delivery_order.sales_order_id)
            .await?
            .ok_or_else(|| {
                AppError::Internal(format!(
                    "Delivery order {} references missing sales order {}",
                    delivery_order.code, delivery_order.sales_order_id
                ))
            })
    }

    fn require_supplier(actor: ActingCompany, delivery_order: &DeliveryOrder, action: &str) -> AppResult<()> {
        require_party(
            actor,
            delivery_order.buyer_company_id,
            delivery_order.supplier_company_id,
            Party::Supplier,
            "Delivery order",
            delivery_order.id,
            action,
        )
    }

    /// Open the delivery of an issued sales order
    pub async fn open_delivery(&self, actor: ActingCompany, sales_order_id: EntityId) -> AppResult<DeliveryDetail> {
        let sales_order = self
            .deps
            .store
            .find_sales_order(sales_order_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Sales order {}", sales_order_id)))?;
        require_party(
            actor,
            sales_order.buyer_company_id,
            sales_order.supplier_company_id,
            Party::Supplier,
            "Sales order",
            sales_order_id,
            "open a delivery",
        )?;

        if let Some(existing) = self
            .deps
            .store
            .find_delivery_order_by_sales_order(sales_order_id)
            .await?
        {
            return Err(AppError::conflict(
                "delivery_order",
                format!("Sales order {} is already delivered by {}", sales_order.code, existing.code),
            ));
        }
        workflow::ensure_delivery_openable(sales_order.status)?;

        let delivery_order = self
            .deps
            .store
            .insert_delivery_order(
                NewDeliveryOrder {
                    sales_order_id,
                    supplier_company_id: sales_order.supplier_company_id,
                    buyer_company_id: sales_order.buyer_company_id,
                    waypoints: vec![
                        Waypoint::origin(sales_order.delivery_from_address.clone()),
                        Waypoint::destination(sales_order.delivery_to_address.clone()),
                    ],
                },
                SoStatus::AwaitingShipment,
            )
            .await?;

        tracing::info!("Delivery {} opened for sales order {}", delivery_order.code, sales_order.code);
        Ok(delivery_order.into())
    }

    /// Append an intermediate stop just before the destination
    pub async fn add_waypoint(
        &self,
        actor: ActingCompany,
        id: EntityId,
        input: AddWaypointInput,
    ) -> AppResult<DeliveryDetail> {
        input.validate()?;
        validate_required_text(&input.location).map_err(field_error("location"))?;

        let delivery_order = self.load(id).await?;
        Self::require_supplier(actor, &delivery_order, "add waypoints")?;
        workflow::ensure_waypoint_appendable(delivery_order.status, delivery_order.destination_reached())?;

        let delivery_order = self
            .deps
            .store
            .append_waypoint(id, Waypoint::stop(input.location.trim(), input.arrival_time))
            .await?;

        tracing::debug!("Waypoint added to delivery {}", delivery_order.code);
        Ok(delivery_order.into())
    }

    /// Stamp arrival at the destination; the purchase order starts awaiting receipt
    pub async fn record_destination_arrival(
        &self,
        actor: ActingCompany,
        id: EntityId,
        input: RecordArrivalInput,
    ) -> AppResult<(DeliveryDetail, PurchaseOrder)> {
        let delivery_order = self.load(id).await?;
        Self::require_supplier(actor, &delivery_order, "record arrival")?;

        let po_change =
            workflow::destination_arrival(delivery_order.status, delivery_order.destination_reached())?;
        let sales_order = self.sales_order_of(&delivery_order).await?;
        let arrival_time = input.arrival_time.unwrap_or_else(|| self.deps.clock.now());

        let (delivery_order, purchase_order) = self
            .deps
            .store
            .record_destination_arrival(id, arrival_time, sales_order.purchase_order_id, po_change)
            .await?;

        tracing::info!(
            "Delivery {} arrived at destination; purchase order {} awaiting receipt",
            delivery_order.code,
            purchase_order.code
        );
        Ok((delivery_order.into(), purchase_order))
    }

    /// Move the delivery one step forward.
    ///
    /// Either party may confirm `Delivered`; every other step is the supplier's.
    pub async fn advance_status(
        &self,
        actor: ActingCompany,
        id: EntityId,
        target: DeliveryStatus,
    ) -> AppResult<DeliveryProgress> {
        let delivery_order = self.load(id).await?;
        if target == DeliveryStatus::Delivered {
            participant(
                actor,
                delivery_order.buyer_company_id,
                delivery_order.supplier_company_id,
                "Delivery order",
                id,
            )?;
        } else {
            Self::require_supplier(actor, &delivery_order, "advance a delivery")?;
        }

        let step = workflow::delivery_step(
            delivery_order.status,
            target,
            delivery_order.destination_reached(),
        )?;
        let sales_order = self.sales_order_of(&delivery_order).await?;

        let progress = self
            .deps
            .store
            .apply_delivery_step(
                id,
                sales_order.id,
                sales_order.purchase_order_id,
                step,
                self.deps.clock.now(),
            )
            .await
            .map_err(|e| {
                if matches!(e, AppError::StaleStatus(_)) {
                    tracing::warn!("Delivery {} changed while advancing to {}", id, target);
                }
                e
            })?;

        tracing::info!(
            "Delivery {} is {}; sales order {} is {}; purchase order {} is {}",
            progress.delivery_order.code,
            progress.delivery_order.status.as_str(),
            progress.sales_order.code,
            progress.sales_order.status.as_str(),
            progress.purchase_order.code,
            progress.purchase_order.status.as_str()
        );
        Ok(progress)
    }

    pub async fn get_delivery(&self, actor: ActingCompany, id: EntityId) -> AppResult<DeliveryDetail> {
        let delivery_order = self.load(id).await?;
        participant(
            actor,
            delivery_order.buyer_company_id,
            delivery_order.supplier_company_id,
            "Delivery order",
            id,
        )?;
        Ok(delivery_order.into())
    }
}
