use serde::Serialize;
use tracing::{debug, info, instrument, warn};
use utoipa::ToSchema;

use crate::db::{
    DbError, NewSearchHistoryEntry, ObservationRecord, ObservationRepository, SearchHistoryEntry,
    SearchHistoryRepository, SearchSource,
};
use crate::weather_api::{CurrentConditions, ProviderOutcome, WeatherApiClient};

/// Stored rows returned for a local hit
pub const LOCAL_RESULT_LIMIT: i64 = 7;

#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("{0}")]
    Validation(String),
    #[error("Location '{0}' not found")]
    NotFound(String),
    #[error("Weather provider error: {0}")]
    Upstream(String),
    #[error(transparent)]
    Db(#[from] DbError),
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(tag = "source")]
pub enum SearchResult {
    #[serde(rename = "local-storage")]
    LocalStorage {
        location: String,
        records: Vec<ObservationRecord>,
    },
    #[serde(rename = "external-api")]
    ExternalApi {
        location: String,
        current: CurrentConditions,
    },
}

/// Terminal state of one search: a local hit, or whatever the provider said
/// after a local miss
#[derive(Debug, Clone, PartialEq)]
pub enum SearchResolution {
    LocalHit(Vec<ObservationRecord>),
    External(ProviderOutcome),
}

impl SearchResolution {
    /// The history row this resolution must append
    pub fn history_entry(&self, location: &str) -> NewSearchHistoryEntry {
        let (source, result_count, found) = match self {
            SearchResolution::LocalHit(records) => (
                SearchSource::LocalStorage,
                i32::try_from(records.len()).unwrap_or(i32::MAX),
                true,
            ),
            SearchResolution::External(ProviderOutcome::Success(_)) => {
                (SearchSource::ExternalApi, 1, true)
            }
            SearchResolution::External(ProviderOutcome::NotFound)
            | SearchResolution::External(ProviderOutcome::UpstreamError(_)) => {
                (SearchSource::ExternalApi, 0, false)
            }
        };

        NewSearchHistoryEntry {
            location: location.to_string(),
            source,
            result_count,
            found,
        }
    }

    pub fn into_result(self, location: &str) -> Result<SearchResult, SearchError> {
        match self {
            SearchResolution::LocalHit(records) => Ok(SearchResult::LocalStorage {
                location: location.to_string(),
                records,
            }),
            SearchResolution::External(ProviderOutcome::Success(current)) => {
                Ok(SearchResult::ExternalApi {
                    location: current.location.clone(),
                    current,
                })
            }
            SearchResolution::External(ProviderOutcome::NotFound) => {
                Err(SearchError::NotFound(location.to_string()))
            }
            SearchResolution::External(ProviderOutcome::UpstreamError(reason)) => {
                Err(SearchError::Upstream(reason))
            }
        }
    }
}

/// Trimmed location, or a validation error when nothing is left
pub fn validate_location(location: &str) -> Result<&str, SearchError> {
    let trimmed = location.trim();
    if trimmed.is_empty() {
        return Err(SearchError::Validation(
            "Location parameter is required".to_string(),
        ));
    }
    Ok(trimmed)
}

#[derive(Clone)]
pub struct SearchService {
    observation_repo: ObservationRepository,
    history_repo: SearchHistoryRepository,
    weather_client: WeatherApiClient,
}

impl SearchService {
    pub fn new(
        observation_repo: ObservationRepository,
        history_repo: SearchHistoryRepository,
        weather_client: WeatherApiClient,
    ) -> Self {
        Self {
            observation_repo,
            history_repo,
            weather_client,
        }
    }

    /// Resolve a location from stored observations, falling back to the
    /// external provider. Every call that passes validation appends exactly
    /// one history entry before returning.
    #[instrument(skip(self), fields(location = %location))]
    pub async fn search(&self, location: &str) -> Result<SearchResult, SearchError> {
        let location = validate_location(location)?;

        let local = self
            .observation_repo
            .find_latest_for_city(location, LOCAL_RESULT_LIMIT)
            .await?;

        let resolution = if local.is_empty() {
            debug!("No stored observations, querying weather provider");
            SearchResolution::External(self.weather_client.current_conditions(location).await)
        } else {
            info!("Local hit with {} observations", local.len());
            SearchResolution::LocalHit(local.into_iter().map(ObservationRecord::from).collect())
        };

        let entry = resolution.history_entry(location);
        self.history_repo.record(&entry).await?;

        let result = resolution.into_result(location);
        if let Err(e) = &result {
            warn!("Search failed: {}", e);
        }
        result
    }

    /// Most recent history entries, optionally for a single location
    #[instrument(skip(self))]
    pub async fn recent_history(
        &self,
        location: Option<&str>,
        limit: i64,
    ) -> Result<Vec<SearchHistoryEntry>, DbError> {
        match location {
            Some(location) => self.history_repo.find_by_location(location, limit).await,
            None => self.history_repo.recent(limit).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::WeatherCondition;
    use chrono::NaiveDate;

    fn london_record() -> ObservationRecord {
        ObservationRecord {
            city: "London".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            temp_high: 10.0,
            temp_low: 2.0,
            temp_avg: 6.0,
            precipitation: None,
            humidity: Some(75),
            wind_speed: Some(8.0),
            condition: WeatherCondition::Rainy,
            condition_label: "Rainy".to_string(),
        }
    }

    fn conditions() -> CurrentConditions {
        CurrentConditions {
            location: "Reykjavik".to_string(),
            temperature: 1.5,
            temp_high: 3.0,
            temp_low: -1.0,
            humidity: 88,
            wind_speed: None,
            condition: "Snow".to_string(),
            description: "light snow".to_string(),
        }
    }

    #[test]
    fn test_validate_location() {
        assert_eq!(validate_location("  london ").unwrap(), "london");
        assert!(matches!(validate_location(""), Err(SearchError::Validation(_))));
        assert!(matches!(validate_location(" \t "), Err(SearchError::Validation(_))));
    }

    #[test]
    fn test_local_hit_history_and_result() {
        let resolution = SearchResolution::LocalHit(vec![london_record()]);

        assert_eq!(
            resolution.history_entry("london"),
            NewSearchHistoryEntry {
                location: "london".to_string(),
                source: SearchSource::LocalStorage,
                result_count: 1,
                found: true,
            }
        );

        match resolution.into_result("london").unwrap() {
            SearchResult::LocalStorage { location, records } => {
                assert_eq!(location, "london");
                assert_eq!(records.len(), 1);
                assert_eq!(records[0].condition_label, "Rainy");
            }
            other => panic!("Expected local result, got {:?}", other),
        }
    }

    #[test]
    fn test_external_success_history_and_result() {
        let resolution = SearchResolution::External(ProviderOutcome::Success(conditions()));

        let entry = resolution.history_entry("reykjavik");
        assert_eq!(entry.source, SearchSource::ExternalApi);
        assert_eq!(entry.result_count, 1);
        assert!(entry.found);

        match resolution.into_result("reykjavik").unwrap() {
            SearchResult::ExternalApi { location, current } => {
                assert_eq!(location, "Reykjavik");
                assert_eq!(current.description, "light snow");
            }
            other => panic!("Expected external result, got {:?}", other),
        }
    }

    #[test]
    fn test_external_not_found_history_and_error() {
        let resolution = SearchResolution::External(ProviderOutcome::NotFound);

        let entry = resolution.history_entry("Atlantis");
        assert_eq!(entry.source, SearchSource::ExternalApi);
        assert_eq!(entry.result_count, 0);
        assert!(!entry.found);

        match resolution.into_result("Atlantis") {
            Err(SearchError::NotFound(location)) => assert_eq!(location, "Atlantis"),
            other => panic!("Expected NotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_external_error_history_and_error() {
        let resolution =
            SearchResolution::External(ProviderOutcome::UpstreamError("timed out".to_string()));

        let entry = resolution.history_entry("Nowhere");
        assert_eq!(entry.source, SearchSource::ExternalApi);
        assert_eq!(entry.result_count, 0);
        assert!(!entry.found);

        match resolution.into_result("Nowhere") {
            Err(SearchError::Upstream(reason)) => assert_eq!(reason, "timed out"),
            other => panic!("Expected Upstream, got {:?}", other),
        }
    }

    #[test]
    fn test_search_result_serialization() {
        let result = SearchResult::LocalStorage {
            location: "london".to_string(),
            records: vec![london_record()],
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["source"], "local-storage");
        assert_eq!(json["location"], "london");
        assert_eq!(json["records"][0]["city"], "London");
        assert_eq!(json["records"][0]["date"], "2024-01-01");

        let result = SearchResult::ExternalApi {
            location: "Reykjavik".to_string(),
            current: conditions(),
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["source"], "external-api");
        assert_eq!(json["current"]["temperature"], 1.5);
        assert!(json["current"]["wind_speed"].is_null());
    }
}
