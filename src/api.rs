use axum::{
    extract::{FromRequest, FromRequestParts, Path, Query, Request, State},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{NaiveDate, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, error, info, instrument, warn};
use utoipa::{IntoParams, OpenApi, ToSchema};

use crate::db::{
    AchievementType, CityStats, ConditionCount, DbError, NewAchievement, ObservationRecord,
    ObservationStats, PreferenceUpdate, SearchHistoryEntry, SearchSource, TemperatureUnit, Theme,
    UserAchievement, UserPreference, WeatherCondition,
};
use crate::services::achievement_service::{
    AchievementSummary, AchievementView, Milestone, DEFAULT_USER_ID,
};
use crate::services::analytics_service::{
    CityAnalytics, CityTrend, ComparisonContext, DashboardContext, TrendsContext,
    DEFAULT_WINDOW_DAYS,
};
use crate::services::{
    AchievementService, AnalyticsService, PreferenceService, SearchError, SearchResult,
    SearchService,
};
use crate::weather_api::CurrentConditions;

pub const MAX_WINDOW_DAYS: u32 = 3650;
pub const DEFAULT_HISTORY_LIMIT: i64 = 20;
pub const MAX_HISTORY_LIMIT: i64 = 100;

#[derive(Clone)]
pub struct AppState {
    pub analytics_service: AnalyticsService,
    pub achievement_service: AchievementService,
    pub preference_service: PreferenceService,
    pub search_service: SearchService,
}

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}

/// Handler failure, rendered as a status code and `{"error": ...}` body
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m),
            ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m),
            ApiError::Conflict(m) => (StatusCode::CONFLICT, m),
            ApiError::Internal(m) => (StatusCode::INTERNAL_SERVER_ERROR, m),
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Duplicate(m) => ApiError::Conflict(m),
            DbError::Invalid(v) => ApiError::BadRequest(v.to_string()),
            DbError::SqlxError(e) => {
                error!("Database failure: {}", e);
                ApiError::Internal("Internal server error".to_string())
            }
        }
    }
}

impl From<SearchError> for ApiError {
    fn from(err: SearchError) -> Self {
        match err {
            SearchError::Validation(m) => ApiError::BadRequest(m),
            e @ SearchError::NotFound(_) => ApiError::NotFound(e.to_string()),
            e @ SearchError::Upstream(_) => ApiError::Internal(e.to_string()),
            SearchError::Db(e) => ApiError::from(e),
        }
    }
}

/// `Query` whose rejection is an `ApiError` JSON body
pub struct ApiQuery<T>(pub T);

impl<S, T> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Query::<T>::from_request_parts(parts, state).await {
            Ok(Query(value)) => Ok(ApiQuery(value)),
            Err(rejection) => Err(ApiError::BadRequest(rejection.body_text())),
        }
    }
}

/// `Path` whose rejection is an `ApiError` JSON body
pub struct ApiPath<T>(pub T);

impl<S, T> FromRequestParts<S> for ApiPath<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Path::<T>::from_request_parts(parts, state).await {
            Ok(Path(value)) => Ok(ApiPath(value)),
            Err(rejection) => Err(ApiError::BadRequest(rejection.body_text())),
        }
    }
}

/// `Json` request body whose rejection is an `ApiError` JSON body
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(ApiJson(value)),
            Err(rejection) => Err(ApiError::BadRequest(rejection.body_text())),
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct WindowParams {
    /// Trailing window length in days (default 30)
    pub days: Option<u32>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AchievementParams {
    /// Defaults to user 1
    pub user_id: Option<i32>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct WeatherDataParams {
    /// Case-insensitive city filter
    pub city: Option<String>,
    /// Trailing window length in days (default 30)
    pub days: Option<u32>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SearchParams {
    /// Free-text location, required
    pub location: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct HistoryParams {
    /// Only entries for this location, case-insensitive
    pub location: Option<String>,
    /// Number of entries (default 20, max 100)
    pub limit: Option<i64>,
}

/// Window length from an optional query value, bounded to 1..=3650 days
pub fn resolve_days(days: Option<u32>) -> Result<u32, ApiError> {
    let days = days.unwrap_or(DEFAULT_WINDOW_DAYS);
    if days == 0 || days > MAX_WINDOW_DAYS {
        return Err(ApiError::BadRequest(format!(
            "days must be between 1 and {MAX_WINDOW_DAYS}"
        )));
    }
    Ok(days)
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

pub fn create_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health))
        .route("/weather", get(weather_data))
        .route("/search", get(search_location))
        .route("/search/history", get(search_history))
        .route("/achievements", post(award_achievement))
        .route(
            "/preferences/{user_id}",
            get(get_preference).put(put_preference),
        );

    Router::new()
        .route("/", get(dashboard))
        .route("/analytics/{city}", get(city_analytics))
        .route("/comparison", get(weather_comparison))
        .route("/trends", get(weather_trends))
        .route("/achievements", get(user_achievements))
        .nest("/api", api_routes)
        .with_state(state)
}

#[utoipa::path(get, path = "/api/health", tag = "system",
    responses((status = 200, description = "Service is healthy", body = HealthResponse)))]
#[instrument]
async fn health() -> impl IntoResponse {
    debug!("Health check requested");
    let response = HealthResponse {
        status: "healthy".to_string(),
    };
    (StatusCode::OK, Json(response))
}

#[utoipa::path(get, path = "/", tag = "pages",
    responses(
        (status = 200, description = "Dashboard context", body = DashboardContext),
        (status = 500, description = "Database failure", body = ErrorResponse)
    ))]
#[instrument(skip(state))]
async fn dashboard(State(state): State<AppState>) -> Result<Json<DashboardContext>, ApiError> {
    let context = state.analytics_service.dashboard(today()).await?;

    info!(
        "Built dashboard with {} cities, {} observations in window",
        context.cities.len(),
        context.overall.record_count
    );
    Ok(Json(context))
}

#[utoipa::path(get, path = "/analytics/{city}", tag = "pages",
    params(("city" = String, Path, description = "City name, case-insensitive"), WindowParams),
    responses(
        (status = 200, description = "Per-city analytics", body = CityAnalytics),
        (status = 400, description = "Invalid window", body = ErrorResponse)
    ))]
#[instrument(skip(state), fields(city = %city))]
async fn city_analytics(
    State(state): State<AppState>,
    ApiPath(city): ApiPath<String>,
    ApiQuery(params): ApiQuery<WindowParams>,
) -> Result<Json<CityAnalytics>, ApiError> {
    let days = resolve_days(params.days)?;
    let analytics = state
        .analytics_service
        .city_analytics(&city, days, today())
        .await?;

    if analytics.stats.record_count == 0 {
        warn!("No observations for {} in the last {} days", city, days);
    } else {
        info!(
            "Aggregated {} observations for {} over {} days",
            analytics.stats.record_count, city, days
        );
    }
    Ok(Json(analytics))
}

#[utoipa::path(get, path = "/comparison", tag = "pages",
    params(WindowParams),
    responses(
        (status = 200, description = "Per-city stats, alphabetical", body = ComparisonContext),
        (status = 400, description = "Invalid window", body = ErrorResponse)
    ))]
#[instrument(skip(state))]
async fn weather_comparison(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<WindowParams>,
) -> Result<Json<ComparisonContext>, ApiError> {
    let days = resolve_days(params.days)?;
    let context = state.analytics_service.comparison(days, today()).await?;

    info!("Compared {} cities over {} days", context.cities.len(), days);
    Ok(Json(context))
}

#[utoipa::path(get, path = "/trends", tag = "pages",
    responses((status = 200, description = "30 and 60 day trends per city", body = TrendsContext)))]
#[instrument(skip(state))]
async fn weather_trends(State(state): State<AppState>) -> Result<Json<TrendsContext>, ApiError> {
    let context = state.analytics_service.trends(today()).await?;

    info!("Built trends for {} cities", context.trends.len());
    Ok(Json(context))
}

#[utoipa::path(get, path = "/achievements", tag = "pages",
    params(AchievementParams),
    responses((status = 200, description = "Achievements and next milestone", body = AchievementSummary)))]
#[instrument(skip(state))]
async fn user_achievements(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<AchievementParams>,
) -> Result<Json<AchievementSummary>, ApiError> {
    let user_id = params.user_id.unwrap_or(DEFAULT_USER_ID);
    let summary = state.achievement_service.summary(user_id).await?;

    info!(
        "User {} has {} points, {} to go for {}",
        user_id,
        summary.total_points,
        summary.next_milestone.remaining,
        summary.next_milestone.points
    );
    Ok(Json(summary))
}

#[utoipa::path(post, path = "/api/achievements", tag = "achievements",
    request_body = NewAchievement,
    responses(
        (status = 201, description = "Achievement awarded", body = UserAchievement),
        (status = 400, description = "Invalid achievement", body = ErrorResponse),
        (status = 409, description = "Already awarded", body = ErrorResponse)
    ))]
#[instrument(skip(state, achievement), fields(user_id = %achievement.user_id))]
async fn award_achievement(
    State(state): State<AppState>,
    ApiJson(achievement): ApiJson<NewAchievement>,
) -> Result<(StatusCode, Json<UserAchievement>), ApiError> {
    let awarded = state.achievement_service.award(&achievement).await?;

    info!("Awarded {:?} to user {}", awarded.achievement_type, awarded.user_id);
    Ok((StatusCode::CREATED, Json(awarded)))
}

#[utoipa::path(get, path = "/api/weather", tag = "weather",
    params(WeatherDataParams),
    responses(
        (status = 200, description = "Observation records, newest first", body = Vec<ObservationRecord>),
        (status = 400, description = "Invalid window", body = ErrorResponse)
    ))]
#[instrument(skip(state))]
async fn weather_data(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<WeatherDataParams>,
) -> Result<Json<Vec<ObservationRecord>>, ApiError> {
    let days = resolve_days(params.days)?;
    let city = params
        .city
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty());

    let records = state
        .analytics_service
        .weather_data(city, days, today())
        .await?;

    info!("Returning {} observation records", records.len());
    Ok(Json(records))
}

#[utoipa::path(get, path = "/api/search", tag = "weather",
    params(SearchParams),
    responses(
        (status = 200, description = "Local or external result", body = SearchResult),
        (status = 400, description = "Missing location", body = ErrorResponse),
        (status = 404, description = "Location unknown locally and to the provider", body = ErrorResponse),
        (status = 500, description = "Weather provider failure", body = ErrorResponse)
    ))]
#[instrument(skip(state))]
async fn search_location(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<SearchParams>,
) -> Result<Json<SearchResult>, ApiError> {
    let location = params.location.unwrap_or_default();
    let result = state.search_service.search(&location).await?;

    match &result {
        SearchResult::LocalStorage { records, .. } => {
            info!("Search for '{}' served {} stored records", location, records.len())
        }
        SearchResult::ExternalApi { location: resolved, .. } => {
            info!("Search for '{}' resolved by provider as {}", location, resolved)
        }
    }
    Ok(Json(result))
}

#[utoipa::path(get, path = "/api/search/history", tag = "weather",
    params(HistoryParams),
    responses((status = 200, description = "Most recent searches", body = Vec<SearchHistoryEntry>)))]
#[instrument(skip(state))]
async fn search_history(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<HistoryParams>,
) -> Result<Json<Vec<SearchHistoryEntry>>, ApiError> {
    let limit = params
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .clamp(1, MAX_HISTORY_LIMIT);
    let location = params
        .location
        .as_deref()
        .map(str::trim)
        .filter(|l| !l.is_empty());
    let entries = state
        .search_service
        .recent_history(location, limit)
        .await?;

    debug!("Returning {} history entries", entries.len());
    Ok(Json(entries))
}

#[utoipa::path(get, path = "/api/preferences/{user_id}", tag = "preferences",
    params(("user_id" = i32, Path, description = "User id")),
    responses((status = 200, description = "Stored or default preference", body = UserPreference)))]
#[instrument(skip(state), fields(user_id = %user_id))]
async fn get_preference(
    State(state): State<AppState>,
    ApiPath(user_id): ApiPath<i32>,
) -> Result<Json<UserPreference>, ApiError> {
    let preference = state.preference_service.get_or_default(user_id).await?;
    Ok(Json(preference))
}

#[utoipa::path(put, path = "/api/preferences/{user_id}", tag = "preferences",
    params(("user_id" = i32, Path, description = "User id")),
    request_body = PreferenceUpdate,
    responses(
        (status = 200, description = "Saved preference", body = UserPreference),
        (status = 400, description = "Invalid preference", body = ErrorResponse)
    ))]
#[instrument(skip(state, update), fields(user_id = %user_id))]
async fn put_preference(
    State(state): State<AppState>,
    ApiPath(user_id): ApiPath<i32>,
    ApiJson(update): ApiJson<PreferenceUpdate>,
) -> Result<Json<UserPreference>, ApiError> {
    let preference = state.preference_service.save(user_id, &update).await?;

    info!("Saved preference for user {}", user_id);
    Ok(Json(preference))
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health,
        dashboard,
        city_analytics,
        weather_comparison,
        weather_trends,
        user_achievements,
        award_achievement,
        weather_data,
        search_location,
        search_history,
        get_preference,
        put_preference,
    ),
    components(schemas(
        HealthResponse,
        ErrorResponse,
        ObservationRecord,
        ObservationStats,
        CityStats,
        ConditionCount,
        WeatherCondition,
        DashboardContext,
        CityAnalytics,
        ComparisonContext,
        CityTrend,
        TrendsContext,
        AchievementType,
        UserAchievement,
        NewAchievement,
        AchievementView,
        AchievementSummary,
        Milestone,
        TemperatureUnit,
        Theme,
        UserPreference,
        PreferenceUpdate,
        SearchSource,
        SearchHistoryEntry,
        SearchResult,
        CurrentConditions,
    )),
    tags(
        (name = "pages", description = "Dashboard page contexts"),
        (name = "weather", description = "Observation data and location search"),
        (name = "achievements", description = "Gamification records"),
        (name = "preferences", description = "Per-user display preferences"),
        (name = "system", description = "Health checks"),
    )
)]
pub struct ApiDoc;

pub fn generate_openapi_spec() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::ValidationError;
    use http_body_util::BodyExt;

    async fn body_json(response: Response) -> serde_json::Value {
        let body = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&body).unwrap()
    }

    #[test]
    fn test_resolve_days() {
        assert_eq!(resolve_days(None).unwrap(), 30);
        assert_eq!(resolve_days(Some(60)).unwrap(), 60);
        assert!(matches!(resolve_days(Some(0)), Err(ApiError::BadRequest(_))));
        assert!(matches!(resolve_days(Some(3651)), Err(ApiError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_search_errors_map_to_status_codes() {
        let cases = [
            (SearchError::Validation("Location parameter is required".into()), StatusCode::BAD_REQUEST),
            (SearchError::NotFound("Atlantis".into()), StatusCode::NOT_FOUND),
            (SearchError::Upstream("connection refused".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (err, expected) in cases {
            let response = ApiError::from(err).into_response();
            assert_eq!(response.status(), expected);
        }
    }

    #[tokio::test]
    async fn test_not_found_body_names_location() {
        let response = ApiError::from(SearchError::NotFound("Atlantis".into())).into_response();
        let json = body_json(response).await;
        assert!(json["error"].as_str().unwrap().contains("Atlantis"));
    }

    #[tokio::test]
    async fn test_upstream_body_surfaces_reason() {
        let response =
            ApiError::from(SearchError::Upstream("operation timed out".into())).into_response();
        let json = body_json(response).await;
        assert!(json["error"].as_str().unwrap().contains("operation timed out"));
    }

    #[tokio::test]
    async fn test_db_errors_map_to_status_codes() {
        let duplicate = ApiError::from(DbError::Duplicate("city/date".into())).into_response();
        assert_eq!(duplicate.status(), StatusCode::CONFLICT);

        let invalid = ApiError::from(DbError::Invalid(ValidationError::new(
            "humidity",
            "must be between 0 and 100",
        )))
        .into_response();
        assert_eq!(invalid.status(), StatusCode::BAD_REQUEST);
        let json = body_json(invalid).await;
        assert_eq!(json["error"], "humidity: must be between 0 and 100");

        let internal = ApiError::from(DbError::SqlxError(sqlx::Error::RowNotFound)).into_response();
        assert_eq!(internal.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_openapi_lists_search_path() {
        let spec = generate_openapi_spec();
        assert!(spec.paths.paths.contains_key("/api/search"));
        assert!(spec.paths.paths.contains_key("/analytics/{city}"));
    }
}
