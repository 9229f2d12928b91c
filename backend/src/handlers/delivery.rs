//! Delivery tracking HTTP handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use shared::EntityId;

use crate::middleware::CurrentCompany;
use crate::services::delivery::{AddWaypointInput, AdvanceStatusInput, RecordArrivalInput};
use crate::AppState;

/// Open the delivery of a sales order
pub async fn open_delivery(
    State(state): State<AppState>,
    CurrentCompany(actor): CurrentCompany,
    Path(sales_order_id): Path<EntityId>,
) -> impl IntoResponse {
    match state.commerce.deliveries().open_delivery(actor, sales_order_id).await {
        Ok(delivery) => (StatusCode::CREATED, Json(delivery)).into_response(),
        Err(e) => e.into_response(),
    }
}

pub async fn get_delivery(
    State(state): State<AppState>,
    CurrentCompany(actor): CurrentCompany,
    Path(id): Path<EntityId>,
) -> impl IntoResponse {
    match state.commerce.deliveries().get_delivery(actor, id).await {
        Ok(delivery) => (StatusCode::OK, Json(delivery)).into_response(),
        Err(e) => e.into_response(),
    }
}

pub async fn add_waypoint(
    State(state): State<AppState>,
    CurrentCompany(actor): CurrentCompany,
    Path(id): Path<EntityId>,
    Json(input): Json<AddWaypointInput>,
) -> impl IntoResponse {
    match state.commerce.deliveries().add_waypoint(actor, id, input).await {
        Ok(delivery) => (StatusCode::OK, Json(delivery)).into_response(),
        Err(e) => e.into_response(),
    }
}

pub async fn record_arrival(
    State(state): State<AppState>,
    CurrentCompany(actor): CurrentCompany,
    Path(id): Path<EntityId>,
    Json(input): Json<RecordArrivalInput>,
) -> impl IntoResponse {
    match state
        .commerce
        .deliveries()
        .record_destination_arrival(actor, id, input)
        .await
    {
        Ok((delivery, purchase_order)) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "delivery": delivery,
                "purchase_order": purchase_order,
            })),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

/// Advance the delivery; SO and PO follow in the same step
pub async fn advance_status(
    State(state): State<AppState>,
    CurrentCompany(actor): CurrentCompany,
    Path(id): Path<EntityId>,
    Json(input): Json<AdvanceStatusInput>,
) -> impl IntoResponse {
    match state.commerce.deliveries().advance_status(actor, id, input.status).await {
        Ok(progress) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "delivery": crate::services::delivery::DeliveryDetail::from(progress.delivery_order),
                "sales_order": progress.sales_order,
                "purchase_order": progress.purchase_order,
            })),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}
