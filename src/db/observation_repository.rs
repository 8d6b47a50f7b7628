use chrono::NaiveDate;
use sqlx::PgPool;
use tracing::{debug, error, info, instrument};

use crate::db::{
    CityStats, ConditionCount, DbError, NewObservation, ObservationFilter, ObservationStats,
    WeatherObservation,
};

const OBSERVATION_COLUMNS: &str = r#"
    id, city, date, temp_high, temp_low, temp_avg,
    precipitation, humidity, wind_speed, condition, created_at
"#;

// humidity is INTEGER, so its average comes back as NUMERIC unless cast
const STATS_COLUMNS: &str = r#"
    AVG(temp_avg) AS avg_temp,
    MAX(temp_high) AS max_temp,
    MIN(temp_low) AS min_temp,
    AVG(precipitation) AS avg_precipitation,
    AVG(humidity)::DOUBLE PRECISION AS avg_humidity,
    AVG(wind_speed) AS avg_wind_speed,
    COUNT(*) AS record_count
"#;

#[derive(Clone)]
pub struct ObservationRepository {
    pool: PgPool,
}

impl ObservationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a validated observation. A second row for the same city and
    /// date fails with `DbError::Duplicate`; existing rows are never overwritten.
    #[instrument(skip(self, observation), fields(city = %observation.city, date = %observation.date))]
    pub async fn insert(&self, observation: &NewObservation) -> Result<WeatherObservation, DbError> {
        observation.validate()?;
        let temp_avg = observation.resolved_temp_avg();

        debug!("Inserting observation with temp_avg={:.1}", temp_avg);

        let sql = format!(
            r#"
            INSERT INTO weather_observations (
                city, date, temp_high, temp_low, temp_avg,
                precipitation, humidity, wind_speed, condition
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {OBSERVATION_COLUMNS}
            "#
        );

        let inserted = sqlx::query_as::<_, WeatherObservation>(&sql)
            .bind(observation.city.trim())
            .bind(observation.date)
            .bind(observation.temp_high)
            .bind(observation.temp_low)
            .bind(temp_avg)
            .bind(observation.precipitation)
            .bind(observation.humidity)
            .bind(observation.wind_speed)
            .bind(observation.condition)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                let err = DbError::from(e);
                if !matches!(err, DbError::Duplicate(_)) {
                    error!(error = %err, "Failed to insert observation");
                }
                err
            })?;

        info!("Inserted observation {}", inserted.id);
        Ok(inserted)
    }

    /// List observations matching the filter, newest first
    #[instrument(skip(self))]
    pub async fn find(&self, filter: &ObservationFilter) -> Result<Vec<WeatherObservation>, DbError> {
        debug!("Querying observations");

        // LIMIT NULL is LIMIT ALL in Postgres
        let sql = format!(
            r#"
            SELECT {OBSERVATION_COLUMNS}
            FROM weather_observations
            WHERE ($1::TEXT IS NULL OR LOWER(city) = LOWER($1))
              AND ($2::DATE IS NULL OR date >= $2)
            ORDER BY date DESC, city ASC
            LIMIT $3
            "#
        );

        let observations = sqlx::query_as::<_, WeatherObservation>(&sql)
            .bind(filter.city.as_deref())
            .bind(filter.since)
            .bind(filter.limit)
            .fetch_all(&self.pool)
            .await?;

        debug!("Found {} observations", observations.len());
        Ok(observations)
    }

    /// Most recent observations for a city, matched case-insensitively
    #[instrument(skip(self), fields(city = %city))]
    pub async fn find_latest_for_city(
        &self,
        city: &str,
        limit: i64,
    ) -> Result<Vec<WeatherObservation>, DbError> {
        self.find(&ObservationFilter {
            city: Some(city.to_string()),
            since: None,
            limit: Some(limit),
        })
        .await
    }

    /// All known city names, alphabetical
    #[instrument(skip(self))]
    pub async fn distinct_cities(&self) -> Result<Vec<String>, DbError> {
        let cities = sqlx::query_scalar::<_, String>(
            "SELECT DISTINCT city FROM weather_observations ORDER BY city ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        debug!("Found {} distinct cities", cities.len());
        Ok(cities)
    }

    /// Rollup for one city over `date >= since`
    #[instrument(skip(self), fields(city = %city, since = %since))]
    pub async fn stats_for_city(
        &self,
        city: &str,
        since: NaiveDate,
    ) -> Result<ObservationStats, DbError> {
        let sql = format!(
            r#"
            SELECT {STATS_COLUMNS}
            FROM weather_observations
            WHERE LOWER(city) = LOWER($1) AND date >= $2
            "#
        );

        let stats = sqlx::query_as::<_, ObservationStats>(&sql)
            .bind(city)
            .bind(since)
            .fetch_one(&self.pool)
            .await?;

        debug!("Aggregated {} observations", stats.record_count);
        Ok(stats)
    }

    /// Rollup across every city over `date >= since`
    #[instrument(skip(self), fields(since = %since))]
    pub async fn overall_stats(&self, since: NaiveDate) -> Result<ObservationStats, DbError> {
        let sql = format!(
            r#"
            SELECT {STATS_COLUMNS}
            FROM weather_observations
            WHERE date >= $1
            "#
        );

        let stats = sqlx::query_as::<_, ObservationStats>(&sql)
            .bind(since)
            .fetch_one(&self.pool)
            .await?;

        Ok(stats)
    }

    /// Per-city rollups over `date >= since`, ordered alphabetically by city
    #[instrument(skip(self), fields(since = %since))]
    pub async fn stats_by_city(&self, since: NaiveDate) -> Result<Vec<CityStats>, DbError> {
        let sql = format!(
            r#"
            SELECT city, {STATS_COLUMNS}
            FROM weather_observations
            WHERE date >= $1
            GROUP BY city
            ORDER BY city ASC
            "#
        );

        let stats = sqlx::query_as::<_, CityStats>(&sql)
            .bind(since)
            .fetch_all(&self.pool)
            .await?;

        debug!("Aggregated stats for {} cities", stats.len());
        Ok(stats)
    }

    /// Count of observations per condition, most frequent first
    #[instrument(skip(self))]
    pub async fn condition_counts(
        &self,
        city: Option<&str>,
        since: NaiveDate,
    ) -> Result<Vec<ConditionCount>, DbError> {
        let counts = sqlx::query_as::<_, ConditionCount>(
            r#"
            SELECT condition, COUNT(*) AS count
            FROM weather_observations
            WHERE ($1::TEXT IS NULL OR LOWER(city) = LOWER($1))
              AND date >= $2
            GROUP BY condition
            ORDER BY count DESC, condition ASC
            "#,
        )
        .bind(city)
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        Ok(counts)
    }
}
