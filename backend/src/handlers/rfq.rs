//! RFQ and quotation HTTP handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use shared::EntityId;

use crate::middleware::CurrentCompany;
use crate::services::rfq::{CreateQuotationInput, CreateRfqInput};
use crate::AppState;

/// Raise an RFQ as the buyer
pub async fn create_rfq(
    State(state): State<AppState>,
    CurrentCompany(actor): CurrentCompany,
    Json(input): Json<CreateRfqInput>,
) -> impl IntoResponse {
    match state.commerce.rfqs().create_rfq(actor, input).await {
        Ok(rfq) => (StatusCode::CREATED, Json(rfq)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Get an RFQ with its derived status and quotation
pub async fn get_rfq(
    State(state): State<AppState>,
    CurrentCompany(actor): CurrentCompany,
    Path(rfq_id): Path<EntityId>,
) -> impl IntoResponse {
    match state.commerce.rfqs().get_rfq(actor, rfq_id).await {
        Ok(detail) => (StatusCode::OK, Json(detail)).into_response(),
        Err(e) => e.into_response(),
    }
}

pub async fn cancel_rfq(
    State(state): State<AppState>,
    CurrentCompany(actor): CurrentCompany,
    Path(rfq_id): Path<EntityId>,
) -> impl IntoResponse {
    match state.commerce.rfqs().cancel_rfq(actor, rfq_id).await {
        Ok(rfq) => (StatusCode::OK, Json(rfq)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Quote an RFQ as the supplier
pub async fn create_quotation(
    State(state): State<AppState>,
    CurrentCompany(actor): CurrentCompany,
    Path(rfq_id): Path<EntityId>,
    Json(input): Json<CreateQuotationInput>,
) -> impl IntoResponse {
    match state.commerce.rfqs().create_quotation(actor, rfq_id, input).await {
        Ok(quotation) => (StatusCode::CREATED, Json(quotation)).into_response(),
        Err(e) => e.into_response(),
    }
}

pub async fn accept_quotation(
    State(state): State<AppState>,
    CurrentCompany(actor): CurrentCompany,
    Path(rfq_id): Path<EntityId>,
) -> impl IntoResponse {
    match state.commerce.rfqs().accept_quotation(actor, rfq_id).await {
        Ok(quotation) => (StatusCode::OK, Json(quotation)).into_response(),
        Err(e) => e.into_response(),
    }
}

pub async fn reject_quotation(
    State(state): State<AppState>,
    CurrentCompany(actor): CurrentCompany,
    Path(rfq_id): Path<EntityId>,
) -> impl IntoResponse {
    match state.commerce.rfqs().reject_quotation(actor, rfq_id).await {
        Ok(quotation) => (StatusCode::OK, Json(quotation)).into_response(),
        Err(e) => e.into_response(),
    }
}

pub async fn get_quotation(
    State(state): State<AppState>,
    CurrentCompany(actor): CurrentCompany,
    Path(quotation_id): Path<EntityId>,
) -> impl IntoResponse {
    match state.commerce.rfqs().get_quotation(actor, quotation_id).await {
        Ok(quotation) => (StatusCode::OK, Json(quotation)).into_response(),
        Err(e) => e.into_response(),
    }
}
