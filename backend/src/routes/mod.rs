//! Route definitions for the B2B commerce workflow

use axum::{
    routing::{get, post},
    Router,
};

use crate::{handlers, AppState};

/// Create API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/rfqs", rfq_routes())
        .route("/quotations/:id", get(handlers::get_quotation))
        .nest("/purchase-orders", purchase_order_routes())
        .nest("/sales-orders", sales_order_routes())
        .nest("/issue-tickets", issue_ticket_routes())
        .nest("/deliveries", delivery_routes())
}

/// RFQ routes; a quotation is addressed through its RFQ
fn rfq_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(handlers::create_rfq))
        .route("/:id", get(handlers::get_rfq))
        .route("/:id/cancel", post(handlers::cancel_rfq))
        .route("/:id/quotation", post(handlers::create_quotation))
        .route("/:id/quotation/accept", post(handlers::accept_quotation))
        .route("/:id/quotation/reject", post(handlers::reject_quotation))
}

fn purchase_order_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(handlers::create_purchase_order))
        .route("/:id", get(handlers::get_purchase_order))
        .route("/:id/cancel", post(handlers::cancel_purchase_order))
        .route("/:id/sales-order", post(handlers::create_sales_order))
}

fn sales_order_routes() -> Router<AppState> {
    Router::new()
        .route("/:id", get(handlers::get_sales_order))
        .route("/:id/delivery", post(handlers::open_delivery))
}

fn issue_ticket_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_issue_tickets))
        .route("/:id", get(handlers::get_issue_ticket))
        .route("/:id/confirm", post(handlers::confirm_issue_ticket))
}

fn delivery_routes() -> Router<AppState> {
    Router::new()
        .route("/:id", get(handlers::get_delivery))
        .route("/:id/waypoints", post(handlers::add_waypoint))
        .route("/:id/arrival", post(handlers::record_arrival))
        .route("/:id/status", post(handlers::advance_status))
}
