//! mrt-migrate: apply the Mill Roll Tracking schema to the configured database

use mill_roll_backend::{config::Config, PgStore};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::load()?;

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "mill_roll_backend=debug,mrt_migrate=debug,sqlx=warn".into());
    let registry = tracing_subscriber::registry().with(filter);
    if config.logging.format == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    tracing::info!("Starting Mill Roll Tracking migrations");
    tracing::info!("Environment: {}", config.environment);

    tracing::info!("Connecting to database...");
    let store = PgStore::connect(&config.database).await?;
    tracing::info!("Database connection established");

    tracing::info!("Running database migrations...");
    store.migrate().await?;
    tracing::info!("Migrations completed");

    Ok(())
}
