//! B2B Commerce Workflow - Backend Server

use std::{net::SocketAddr, sync::Arc, time::Duration};

use commerce_backend::{
    create_app,
    external::{InMemoryInventory, InventoryClient, InventoryCounter},
    store::{PgCatalog, PgCommerceStore},
    AppState, CommerceDeps, Config,
};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "commerce_server=debug,commerce_backend=debug,tower_http=debug,sqlx=warn".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::load()?;

    tracing::info!("Starting B2B Commerce Workflow Server");
    tracing::info!("Environment: {}", config.environment);

    // Create database connection pool
    tracing::info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .acquire_timeout(Duration::from_secs(30))
        .connect(&config.database.url)
        .await?;

    tracing::info!("Database connection established");

    // Run migrations in development
    if config.is_development() {
        tracing::info!("Running database migrations...");
        sqlx::migrate!("./migrations").run(&db_pool).await?;
        tracing::info!("Migrations completed");
    }

    let inventory: Arc<dyn InventoryCounter> = if config.inventory.is_configured() {
        tracing::info!("Inventory ledger at {}", config.inventory.base_url);
        Arc::new(InventoryClient::new(&config.inventory)?)
    } else {
        tracing::warn!("No inventory ledger configured; on-demand counts are kept in memory");
        Arc::new(InMemoryInventory::new())
    };

    // Create application state
    let commerce = CommerceDeps::new(
        Arc::new(PgCommerceStore::new(db_pool.clone())),
        Arc::new(PgCatalog::new(db_pool)),
        inventory,
    );
    let state = AppState { commerce };

    // Build application
    let app = create_app(state);

    // Start server
    let host: std::net::IpAddr = config.server.host.parse()?;
    let addr = SocketAddr::from((host, config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
