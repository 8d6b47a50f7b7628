use sqlx::PgPool;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::api::{create_router, AppState};
use crate::config::Config;
use crate::db::{
    AchievementRepository, ObservationRepository, PreferenceRepository, SearchHistoryRepository,
};
use crate::services::{AchievementService, AnalyticsService, PreferenceService, SearchService};
use crate::weather_api::WeatherApiClient;

/// Wire repositories, services and the provider client into router state
pub fn build_state(
    pool: PgPool,
    weather_client: WeatherApiClient,
) -> AppState {
    let observation_repo = ObservationRepository::new(pool.clone());
    let achievement_repo = AchievementRepository::new(pool.clone());
    let preference_repo = PreferenceRepository::new(pool.clone());
    let history_repo = SearchHistoryRepository::new(pool);

    AppState {
        analytics_service: AnalyticsService::new(observation_repo.clone()),
        achievement_service: AchievementService::new(achievement_repo),
        preference_service: PreferenceService::new(preference_repo),
        search_service: SearchService::new(observation_repo, history_repo, weather_client),
    }
}

/// Running HTTP server
pub struct Application {
    pub server_handle: JoinHandle<Result<(), std::io::Error>>,
}

impl Application {
    /// Build and initialize the application and spawn the Axum server
    pub async fn build(config: Config, pool: PgPool) -> Result<Self, Box<dyn std::error::Error>> {
        info!("Initializing application components");

        let weather_client = WeatherApiClient::new(
            config.weather_api_url.clone(),
            config.weather_api_key.clone(),
            config.weather_api_timeout(),
        )?;

        let app = create_router(build_state(pool, weather_client)).layer(TraceLayer::new_for_http());

        let addr = config.server_addr();
        info!("Starting HTTP server on {}", addr);

        let server_handle = tokio::spawn(async move {
            let listener = tokio::net::TcpListener::bind(&addr).await?;
            axum::serve(listener, app).await
        });

        info!("Application initialized successfully");

        Ok(Self { server_handle })
    }

    /// Run until the server stops (which runs indefinitely unless error)
    pub async fn run_until_stopped(self) -> Result<(), Box<dyn std::error::Error>> {
        self.server_handle.await??;
        Ok(())
    }
}
