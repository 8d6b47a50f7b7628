use tracing::{info, instrument};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use weather_dashboard_service::app::Application;
use weather_dashboard_service::config::Config;
use weather_dashboard_service::db;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing with environment filter support
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,weather_dashboard_service=debug")),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_line_number(true),
        )
        .init();

    dotenvy::dotenv().ok();

    let config = Config::from_env()?;
    info!("Starting weather dashboard service with config: {:?}", config);

    let pool = db::connect(&config.database_url, config.database_max_connections).await?;
    db::run_migrations(&pool).await?;

    let application = Application::build(config, pool).await?;
    application.run_until_stopped().await
}
