//! B2B Commerce Workflow - Backend
//!
//! Cross-company order lifecycle: RFQ → Quotation → Purchase Order →
//! Sales Order → Delivery, with each company seeing only its half of the trade.

use axum::{routing::get, Router};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub mod config;
pub mod error;
pub mod external;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod store;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use services::{CommerceDeps, DeliveryService, OrderService, RfqService};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub commerce: CommerceDeps,
}

/// Create the application router with all routes and middleware
pub fn create_app(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .nest("/api/v1", routes::api_routes())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Root endpoint
async fn root() -> &'static str {
    "B2B Commerce Workflow API v1"
}

/// Liveness probe
async fn health_check() -> &'static str {
    "OK"
}
