use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate};
use serde::Serialize;
use tracing::{debug, instrument};
use utoipa::ToSchema;

use crate::db::{
    CityStats, ConditionCount, DbError, ObservationFilter, ObservationRecord,
    ObservationRepository, ObservationStats,
};

pub const DEFAULT_WINDOW_DAYS: u32 = 30;
pub const LONG_WINDOW_DAYS: u32 = 60;
pub const DASHBOARD_RECENT_LIMIT: i64 = 30;

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DashboardContext {
    pub window_days: u32,
    pub cities: Vec<String>,
    pub overall: ObservationStats,
    pub conditions: Vec<ConditionCount>,
    pub recent_observations: Vec<ObservationRecord>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CityAnalytics {
    pub city: String,
    pub window_days: u32,
    pub stats: ObservationStats,
    pub conditions: Vec<ConditionCount>,
    pub observations: Vec<ObservationRecord>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ComparisonContext {
    pub window_days: u32,
    pub cities: Vec<CityStats>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct CityTrend {
    pub city: String,
    pub last_30_days: ObservationStats,
    pub last_60_days: ObservationStats,
    /// 30-day average minus 60-day average
    pub avg_temp_change: Option<f64>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TrendsContext {
    pub trends: Vec<CityTrend>,
}

/// First date inside a trailing window of `days` ending at `today`
pub fn window_start(today: NaiveDate, days: u32) -> NaiveDate {
    today - Duration::days(i64::from(days))
}

#[derive(Clone)]
pub struct AnalyticsService {
    observation_repo: ObservationRepository,
}

impl AnalyticsService {
    pub fn new(observation_repo: ObservationRepository) -> Self {
        Self { observation_repo }
    }

    #[instrument(skip(self))]
    pub async fn dashboard(&self, today: NaiveDate) -> Result<DashboardContext, DbError> {
        let since = window_start(today, DEFAULT_WINDOW_DAYS);

        let recent = self
            .observation_repo
            .find(&ObservationFilter {
                limit: Some(DASHBOARD_RECENT_LIMIT),
                ..Default::default()
            })
            .await?;
        let cities = self.observation_repo.distinct_cities().await?;
        let overall = self.observation_repo.overall_stats(since).await?;
        let conditions = self.observation_repo.condition_counts(None, since).await?;

        debug!(
            "Dashboard built from {} cities and {} recent observations",
            cities.len(),
            recent.len()
        );

        Ok(DashboardContext {
            window_days: DEFAULT_WINDOW_DAYS,
            cities,
            overall,
            conditions,
            recent_observations: recent.into_iter().map(ObservationRecord::from).collect(),
        })
    }

    /// Analytics for one city. An unknown city yields empty aggregates.
    #[instrument(skip(self), fields(city = %city))]
    pub async fn city_analytics(
        &self,
        city: &str,
        days: u32,
        today: NaiveDate,
    ) -> Result<CityAnalytics, DbError> {
        let since = window_start(today, days);

        let stats = self.observation_repo.stats_for_city(city, since).await?;
        let conditions = self
            .observation_repo
            .condition_counts(Some(city), since)
            .await?;
        let observations = self
            .observation_repo
            .find(&ObservationFilter {
                city: Some(city.to_string()),
                since: Some(since),
                limit: None,
            })
            .await?;

        Ok(CityAnalytics {
            city: city.to_string(),
            window_days: days,
            stats,
            conditions,
            observations: observations.into_iter().map(ObservationRecord::from).collect(),
        })
    }

    #[instrument(skip(self))]
    pub async fn comparison(&self, days: u32, today: NaiveDate) -> Result<ComparisonContext, DbError> {
        let cities = self
            .observation_repo
            .stats_by_city(window_start(today, days))
            .await?;

        Ok(ComparisonContext {
            window_days: days,
            cities,
        })
    }

    #[instrument(skip(self))]
    pub async fn trends(&self, today: NaiveDate) -> Result<TrendsContext, DbError> {
        let short = self
            .observation_repo
            .stats_by_city(window_start(today, DEFAULT_WINDOW_DAYS))
            .await?;
        let long = self
            .observation_repo
            .stats_by_city(window_start(today, LONG_WINDOW_DAYS))
            .await?;

        Ok(TrendsContext {
            trends: Self::merge_trends(short, long),
        })
    }

    /// Observation records for the weather-data API
    #[instrument(skip(self))]
    pub async fn weather_data(
        &self,
        city: Option<&str>,
        days: u32,
        today: NaiveDate,
    ) -> Result<Vec<ObservationRecord>, DbError> {
        let observations = self
            .observation_repo
            .find(&ObservationFilter {
                city: city.map(str::to_string),
                since: Some(window_start(today, days)),
                limit: None,
            })
            .await?;

        Ok(observations.into_iter().map(ObservationRecord::from).collect())
    }

    // Business logic helpers (private)

    /// Pair 30- and 60-day rollups by city, alphabetical. A city only in the
    /// 60-day window gets empty 30-day stats.
    fn merge_trends(short: Vec<CityStats>, long: Vec<CityStats>) -> Vec<CityTrend> {
        let mut short_by_city: BTreeMap<String, ObservationStats> =
            short.into_iter().map(|s| (s.city, s.stats)).collect();

        let mut merged: BTreeMap<String, CityTrend> = BTreeMap::new();
        for CityStats { city, stats } in long {
            let last_30_days = short_by_city.remove(&city).unwrap_or_default();
            merged.insert(
                city.clone(),
                CityTrend {
                    avg_temp_change: Self::temp_change(&last_30_days, &stats),
                    city,
                    last_30_days,
                    last_60_days: stats,
                },
            );
        }

        // The 60-day window contains the 30-day one, so this only fires on racing inserts
        for (city, stats) in short_by_city {
            merged.insert(
                city.clone(),
                CityTrend {
                    avg_temp_change: None,
                    city,
                    last_30_days: stats,
                    last_60_days: ObservationStats::default(),
                },
            );
        }

        merged.into_values().collect()
    }

    fn temp_change(short: &ObservationStats, long: &ObservationStats) -> Option<f64> {
        match (short.avg_temp, long.avg_temp) {
            (Some(s), Some(l)) => Some(s - l),
            _ => None,
        }
    }
}
