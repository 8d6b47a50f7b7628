use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, instrument, warn};
use utoipa::ToSchema;

use crate::fetch_error::FetchError;

/// Normalized current conditions from the external provider
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct CurrentConditions {
    pub location: String,
    pub temperature: f64,
    pub temp_high: f64,
    pub temp_low: f64,
    pub humidity: i32,
    pub wind_speed: Option<f64>,
    pub condition: String,
    pub description: String,
}

/// Result of one provider lookup. Every failure mode collapses into
/// `NotFound` or `UpstreamError`; the caller never sees a transport error.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderOutcome {
    Success(CurrentConditions),
    NotFound,
    UpstreamError(String),
}

// Wire format of an OpenWeatherMap-style current weather response
#[derive(Debug, Deserialize)]
struct ProviderResponse {
    #[serde(default)]
    cod: Option<Value>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    main: Option<ProviderMain>,
    #[serde(default)]
    wind: Option<ProviderWind>,
    #[serde(default)]
    weather: Vec<ProviderWeather>,
}

#[derive(Debug, Deserialize)]
struct ProviderMain {
    temp: f64,
    temp_min: f64,
    temp_max: f64,
    humidity: i32,
}

#[derive(Debug, Deserialize)]
struct ProviderWind {
    #[serde(default)]
    speed: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ProviderWeather {
    main: String,
    #[serde(default)]
    description: String,
}

#[derive(Clone)]
pub struct WeatherApiClient {
    client: reqwest::Client,
    url: String,
    api_key: String,
}

impl WeatherApiClient {
    pub fn new(url: String, api_key: String, timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url,
            api_key,
        })
    }

    /// Fetch current conditions for a free-text location. Makes exactly
    /// one request; there are no retries.
    #[instrument(skip(self), fields(url = %self.url, location = %location))]
    pub async fn current_conditions(&self, location: &str) -> ProviderOutcome {
        match self.fetch_current(location).await {
            Ok(conditions) => {
                debug!("Provider resolved location to {}", conditions.location);
                ProviderOutcome::Success(conditions)
            }
            Err(FetchError::NotFound) => {
                warn!("Provider has no data for location");
                ProviderOutcome::NotFound
            }
            Err(e) => {
                error!("Weather provider request failed: {}", e);
                ProviderOutcome::UpstreamError(e.to_string())
            }
        }
    }

    // The request URL carries the API key, so it is stripped from reqwest errors
    async fn fetch_current(&self, location: &str) -> Result<CurrentConditions, FetchError> {
        debug!("Sending HTTP request to weather provider");
        let response = self
            .client
            .get(&self.url)
            .query(&[
                ("q", location),
                ("appid", self.api_key.as_str()),
                ("units", "metric"),
            ])
            .send()
            .await
            .map_err(|e| FetchError::Request(e.without_url()))?;

        let status = response.status().as_u16();
        debug!("Received HTTP response with status: {}", status);

        let body = response
            .text()
            .await
            .map_err(|e| FetchError::Request(e.without_url()))?;
        debug!("Retrieved response body, size: {} bytes", body.len());

        parse_response(status, &body, location)
    }
}

/// Provider status code, which arrives as a number on success and as a
/// string on errors
fn cod_value(cod: &Value) -> Option<u16> {
    match cod {
        Value::Number(n) => n.as_u64().and_then(|n| u16::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn parse_response(status: u16, body: &str, location: &str) -> Result<CurrentConditions, FetchError> {
    if status == 404 {
        return Err(FetchError::NotFound);
    }

    let parsed: ProviderResponse = match serde_json::from_str(body) {
        Ok(parsed) => parsed,
        Err(e) if (200..300).contains(&status) => {
            return Err(FetchError::Decode(e.to_string()));
        }
        Err(_) => {
            return Err(FetchError::Status {
                status,
                message: body.chars().take(200).collect(),
            });
        }
    };

    let cod = parsed.cod.as_ref().and_then(cod_value);
    if cod == Some(404) {
        return Err(FetchError::NotFound);
    }

    if !(200..300).contains(&status) || cod.is_some_and(|c| c != 200) {
        return Err(FetchError::Status {
            status: cod.unwrap_or(status),
            message: parsed
                .message
                .unwrap_or_else(|| "unexpected provider response".to_string()),
        });
    }

    let main = parsed
        .main
        .ok_or_else(|| FetchError::Decode("missing `main` block".to_string()))?;
    let weather = parsed
        .weather
        .into_iter()
        .next()
        .ok_or_else(|| FetchError::Decode("missing `weather` entry".to_string()))?;

    Ok(CurrentConditions {
        location: parsed
            .name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| location.to_string()),
        temperature: main.temp,
        temp_high: main.temp_max,
        temp_low: main.temp_min,
        humidity: main.humidity,
        wind_speed: parsed.wind.and_then(|w| w.speed),
        condition: weather.main,
        description: weather.description,
    })
}
