use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use crate::db::ValidationError;

pub const MAX_CITY_LENGTH: usize = 100;
pub const DEFAULT_ACHIEVEMENT_POINTS: i32 = 10;

/// Sky condition recorded for an observation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, sqlx::Type, Serialize, Deserialize, ToSchema)]
#[sqlx(type_name = "weather_condition", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum WeatherCondition {
    Sunny,
    Cloudy,
    Rainy,
    Snowy,
    Stormy,
    Foggy,
}

impl WeatherCondition {
    /// Human-readable label shown on pages and in search results
    pub fn label(&self) -> &'static str {
        match self {
            WeatherCondition::Sunny => "Sunny",
            WeatherCondition::Cloudy => "Cloudy",
            WeatherCondition::Rainy => "Rainy",
            WeatherCondition::Snowy => "Snowy",
            WeatherCondition::Stormy => "Stormy",
            WeatherCondition::Foggy => "Foggy",
        }
    }
}

// Database entity models
#[derive(Debug, Clone, FromRow, Serialize, ToSchema)]
pub struct WeatherObservation {
    pub id: i64,
    pub city: String,
    pub date: NaiveDate,
    pub temp_high: f64,
    pub temp_low: f64,
    pub temp_avg: f64,
    pub precipitation: Option<f64>,
    pub humidity: Option<i32>,
    pub wind_speed: Option<f64>,
    pub condition: WeatherCondition,
    pub created_at: DateTime<Utc>,
}

/// Observation as supplied by ingestion, before the average is derived
#[derive(Debug, Clone, Deserialize)]
pub struct NewObservation {
    pub city: String,
    pub date: NaiveDate,
    pub temp_high: f64,
    pub temp_low: f64,
    pub temp_avg: Option<f64>,
    pub precipitation: Option<f64>,
    pub humidity: Option<i32>,
    pub wind_speed: Option<f64>,
    pub condition: WeatherCondition,
}

impl NewObservation {
    /// Supplied average, or the midpoint of high and low
    pub fn resolved_temp_avg(&self) -> f64 {
        self.temp_avg
            .unwrap_or((self.temp_high + self.temp_low) / 2.0)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let city = self.city.trim();
        if city.is_empty() {
            return Err(ValidationError::new("city", "must not be blank"));
        }
        if city.chars().count() > MAX_CITY_LENGTH {
            return Err(ValidationError::new(
                "city",
                format!("must be at most {MAX_CITY_LENGTH} characters"),
            ));
        }

        for (field, value) in [
            ("temp_high", Some(self.temp_high)),
            ("temp_low", Some(self.temp_low)),
            ("temp_avg", self.temp_avg),
        ] {
            if let Some(v) = value {
                if !v.is_finite() {
                    return Err(ValidationError::new(field, "must be a finite number"));
                }
            }
        }

        if let Some(p) = self.precipitation {
            if !p.is_finite() || p < 0.0 {
                return Err(ValidationError::new("precipitation", "must be >= 0"));
            }
        }
        if let Some(h) = self.humidity {
            if !(0..=100).contains(&h) {
                return Err(ValidationError::new("humidity", "must be between 0 and 100"));
            }
        }
        if let Some(w) = self.wind_speed {
            if !w.is_finite() || w < 0.0 {
                return Err(ValidationError::new("wind_speed", "must be >= 0"));
            }
        }

        Ok(())
    }
}

/// Typed filter for observation listings; `None` fields do not constrain
#[derive(Debug, Clone, Default)]
pub struct ObservationFilter {
    pub city: Option<String>,
    pub since: Option<NaiveDate>,
    pub limit: Option<i64>,
}

/// Aggregate rollup over a set of observations. Every average is `None`
/// when no rows matched.
#[derive(Debug, Clone, Default, PartialEq, FromRow, Serialize, ToSchema)]
pub struct ObservationStats {
    pub avg_temp: Option<f64>,
    pub max_temp: Option<f64>,
    pub min_temp: Option<f64>,
    pub avg_precipitation: Option<f64>,
    pub avg_humidity: Option<f64>,
    pub avg_wind_speed: Option<f64>,
    pub record_count: i64,
}

#[derive(Debug, Clone, FromRow, Serialize, ToSchema)]
pub struct CityStats {
    pub city: String,
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub stats: ObservationStats,
}

#[derive(Debug, Clone, FromRow, Serialize, ToSchema)]
pub struct ConditionCount {
    pub condition: WeatherCondition,
    pub count: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, sqlx::Type, Serialize, Deserialize, ToSchema)]
#[sqlx(type_name = "temperature_unit", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TemperatureUnit {
    #[default]
    Celsius,
    Fahrenheit,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, sqlx::Type, Serialize, Deserialize, ToSchema)]
#[sqlx(type_name = "theme_preference", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

#[derive(Debug, Clone, FromRow, Serialize, ToSchema)]
pub struct UserPreference {
    pub user_id: i32,
    pub favorite_city: Option<String>,
    pub temperature_unit: TemperatureUnit,
    pub theme: Theme,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl UserPreference {
    /// Preference reported for a user that never saved one
    pub fn default_for(user_id: i32) -> Self {
        Self {
            user_id,
            favorite_city: None,
            temperature_unit: TemperatureUnit::default(),
            theme: Theme::default(),
            created_at: None,
            updated_at: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct PreferenceUpdate {
    pub favorite_city: Option<String>,
    pub temperature_unit: TemperatureUnit,
    pub theme: Theme,
}

impl PreferenceUpdate {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(city) = &self.favorite_city {
            if city.chars().count() > MAX_CITY_LENGTH {
                return Err(ValidationError::new(
                    "favorite_city",
                    format!("must be at most {MAX_CITY_LENGTH} characters"),
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize, Deserialize, ToSchema)]
#[sqlx(type_name = "achievement_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AchievementType {
    FirstSearch,
    CityExplorer,
    WeatherWatcher,
    TrendAnalyst,
    ComparisonMaster,
    EarlyBird,
}

impl AchievementType {
    pub fn label(&self) -> &'static str {
        match self {
            AchievementType::FirstSearch => "First Search",
            AchievementType::CityExplorer => "City Explorer",
            AchievementType::WeatherWatcher => "Weather Watcher",
            AchievementType::TrendAnalyst => "Trend Analyst",
            AchievementType::ComparisonMaster => "Comparison Master",
            AchievementType::EarlyBird => "Early Bird",
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize, ToSchema)]
pub struct UserAchievement {
    pub id: i64,
    pub user_id: i32,
    pub achievement_type: AchievementType,
    pub description: String,
    pub points: i32,
    pub achieved_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct NewAchievement {
    pub user_id: i32,
    pub achievement_type: AchievementType,
    pub description: String,
    pub points: Option<i32>,
}

impl NewAchievement {
    pub fn resolved_points(&self) -> i32 {
        self.points.unwrap_or(DEFAULT_ACHIEVEMENT_POINTS)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.description.trim().is_empty() {
            return Err(ValidationError::new("description", "must not be blank"));
        }
        if self.resolved_points() < 0 {
            return Err(ValidationError::new("points", "must be >= 0"));
        }
        Ok(())
    }
}

/// Where a search was resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize, Deserialize, ToSchema)]
#[sqlx(type_name = "search_source", rename_all = "snake_case")]
#[serde(rename_all = "kebab-case")]
pub enum SearchSource {
    LocalStorage,
    ExternalApi,
}

#[derive(Debug, Clone, FromRow, Serialize, ToSchema)]
pub struct SearchHistoryEntry {
    pub id: i64,
    pub location: String,
    pub source: SearchSource,
    pub result_count: i32,
    pub found: bool,
    pub searched_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSearchHistoryEntry {
    pub location: String,
    pub source: SearchSource,
    pub result_count: i32,
    pub found: bool,
}

// API response DTOs (to avoid circular dependency between services and api modules)
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ObservationRecord {
    pub city: String,
    pub date: NaiveDate,
    pub temp_high: f64,
    pub temp_low: f64,
    pub temp_avg: f64,
    pub precipitation: Option<f64>,
    pub humidity: Option<i32>,
    pub wind_speed: Option<f64>,
    pub condition: WeatherCondition,
    pub condition_label: String,
}

impl From<WeatherObservation> for ObservationRecord {
    fn from(obs: WeatherObservation) -> Self {
        Self {
            condition_label: obs.condition.label().to_string(),
            city: obs.city,
            date: obs.date,
            temp_high: obs.temp_high,
            temp_low: obs.temp_low,
            temp_avg: obs.temp_avg,
            precipitation: obs.precipitation,
            humidity: obs.humidity,
            wind_speed: obs.wind_speed,
            condition: obs.condition,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn london() -> NewObservation {
        NewObservation {
            city: "London".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            temp_high: 10.0,
            temp_low: 2.0,
            temp_avg: None,
            precipitation: Some(1.2),
            humidity: Some(80),
            wind_speed: Some(12.5),
            condition: WeatherCondition::Cloudy,
        }
    }

    #[test]
    fn test_temp_avg_derived_from_high_and_low() {
        assert_eq!(london().resolved_temp_avg(), 6.0);
    }

    #[test]
    fn test_supplied_temp_avg_is_kept() {
        let obs = NewObservation {
            temp_avg: Some(7.5),
            ..london()
        };
        assert_eq!(obs.resolved_temp_avg(), 7.5);
    }

    #[test]
    fn test_validate_accepts_optional_fields_missing() {
        let obs = NewObservation {
            precipitation: None,
            humidity: None,
            wind_speed: None,
            ..london()
        };
        assert!(obs.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_out_of_range_fields() {
        let blank = NewObservation {
            city: "   ".to_string(),
            ..london()
        };
        assert_eq!(blank.validate().unwrap_err().field, "city");

        let humid = NewObservation {
            humidity: Some(101),
            ..london()
        };
        assert_eq!(humid.validate().unwrap_err().field, "humidity");

        let dry = NewObservation {
            precipitation: Some(-0.1),
            ..london()
        };
        assert_eq!(dry.validate().unwrap_err().field, "precipitation");

        let calm = NewObservation {
            wind_speed: Some(-3.0),
            ..london()
        };
        assert_eq!(calm.validate().unwrap_err().field, "wind_speed");

        let hot = NewObservation {
            temp_high: f64::NAN,
            ..london()
        };
        assert_eq!(hot.validate().unwrap_err().field, "temp_high");
    }

    #[test]
    fn test_validate_rejects_long_city() {
        let obs = NewObservation {
            city: "x".repeat(MAX_CITY_LENGTH + 1),
            ..london()
        };
        assert!(obs.validate().is_err());
    }

    #[test]
    fn test_new_achievement_defaults_to_ten_points() {
        let achievement = NewAchievement {
            user_id: 1,
            achievement_type: AchievementType::FirstSearch,
            description: "Searched for the first time".to_string(),
            points: None,
        };
        assert_eq!(achievement.resolved_points(), 10);
        assert!(achievement.validate().is_ok());

        let negative = NewAchievement {
            points: Some(-5),
            ..achievement
        };
        assert!(negative.validate().is_err());
    }

    #[test]
    fn test_observation_record_carries_condition_label() {
        let obs = WeatherObservation {
            id: 1,
            city: "London".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            temp_high: 10.0,
            temp_low: 2.0,
            temp_avg: 6.0,
            precipitation: None,
            humidity: Some(70),
            wind_speed: None,
            condition: WeatherCondition::Stormy,
            created_at: Utc::now(),
        };
        let record = ObservationRecord::from(obs);
        assert_eq!(record.condition_label, "Stormy");
        assert_eq!(record.temp_avg, 6.0);
    }

    #[test]
    fn test_search_source_serializes_kebab_case() {
        let json = serde_json::to_string(&SearchSource::LocalStorage).unwrap();
        assert_eq!(json, "\"local-storage\"");
        let json = serde_json::to_string(&SearchSource::ExternalApi).unwrap();
        assert_eq!(json, "\"external-api\"");
    }
}
