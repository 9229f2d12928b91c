//! Purchase order, sales order and issue ticket HTTP handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use shared::{EntityId, IssueTicketStatus};

use crate::middleware::CurrentCompany;
use crate::services::orders::{CreatePurchaseOrderInput, CreateSalesOrderInput};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct IssueTicketQuery {
    pub status: Option<IssueTicketStatus>,
}

/// Order an accepted quotation as the buyer
pub async fn create_purchase_order(
    State(state): State<AppState>,
    CurrentCompany(actor): CurrentCompany,
    Json(input): Json<CreatePurchaseOrderInput>,
) -> impl IntoResponse {
    match state.commerce.orders().create_po(actor, input).await {
        Ok(purchase_order) => (StatusCode::CREATED, Json(purchase_order)).into_response(),
        Err(e) => e.into_response(),
    }
}

pub async fn get_purchase_order(
    State(state): State<AppState>,
    CurrentCompany(actor): CurrentCompany,
    Path(id): Path<EntityId>,
) -> impl IntoResponse {
    match state.commerce.orders().get_purchase_order(actor, id).await {
        Ok(purchase_order) => (StatusCode::OK, Json(purchase_order)).into_response(),
        Err(e) => e.into_response(),
    }
}

pub async fn cancel_purchase_order(
    State(state): State<AppState>,
    CurrentCompany(actor): CurrentCompany,
    Path(id): Path<EntityId>,
) -> impl IntoResponse {
    match state.commerce.orders().cancel_po(actor, id).await {
        Ok(purchase_order) => (StatusCode::OK, Json(purchase_order)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Answer a purchase order with a sales order as the supplier
pub async fn create_sales_order(
    State(state): State<AppState>,
    CurrentCompany(actor): CurrentCompany,
    Path(purchase_order_id): Path<EntityId>,
    Json(input): Json<CreateSalesOrderInput>,
) -> impl IntoResponse {
    match state.commerce.orders().create_so(actor, purchase_order_id, input).await {
        Ok(commit) => (
            StatusCode::CREATED,
            Json(serde_json::json!({
                "sales_order": commit.sales_order,
                "issue_ticket": commit.issue_ticket,
                "purchase_order": commit.purchase_order,
            })),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

pub async fn get_sales_order(
    State(state): State<AppState>,
    CurrentCompany(actor): CurrentCompany,
    Path(id): Path<EntityId>,
) -> impl IntoResponse {
    match state.commerce.orders().get_sales_order(actor, id).await {
        Ok(sales_order) => (StatusCode::OK, Json(sales_order)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// List the acting supplier's issue tickets
pub async fn list_issue_tickets(
    State(state): State<AppState>,
    CurrentCompany(actor): CurrentCompany,
    Query(query): Query<IssueTicketQuery>,
) -> impl IntoResponse {
    match state.commerce.orders().list_issue_tickets(actor, query.status).await {
        Ok(tickets) => (StatusCode::OK, Json(serde_json::json!({ "issue_tickets": tickets }))).into_response(),
        Err(e) => e.into_response(),
    }
}

pub async fn get_issue_ticket(
    State(state): State<AppState>,
    CurrentCompany(actor): CurrentCompany,
    Path(id): Path<EntityId>,
) -> impl IntoResponse {
    match state.commerce.orders().get_issue_ticket(actor, id).await {
        Ok(ticket) => (StatusCode::OK, Json(ticket)).into_response(),
        Err(e) => e.into_response(),
    }
}

pub async fn confirm_issue_ticket(
    State(state): State<AppState>,
    CurrentCompany(actor): CurrentCompany,
    Path(id): Path<EntityId>,
) -> impl IntoResponse {
    match state.commerce.orders().confirm_issue_ticket(actor, id).await {
        Ok((ticket, sales_order)) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "issue_ticket": ticket,
                "sales_order": sales_order,
            })),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}
