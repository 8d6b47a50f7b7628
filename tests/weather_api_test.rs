// Tests for WeatherApiClient against a mocked provider
// Uses mockito for HTTP mocking

mod common;

use std::time::Duration;

use mockito::{Matcher, Server};
use tokio::net::TcpListener;
use weather_dashboard_service::weather_api::{ProviderOutcome, WeatherApiClient};

const PARIS_BODY: &str = r#"{
    "weather": [{"id": 800, "main": "Clear", "description": "clear sky", "icon": "01d"}],
    "main": {"temp": 18.4, "feels_like": 17.9, "temp_min": 16.0, "temp_max": 20.1, "pressure": 1020, "humidity": 55},
    "wind": {"speed": 3.6, "deg": 200},
    "name": "Paris",
    "cod": 200
}"#;

#[tokio::test]
async fn test_current_conditions_success() {
    let mut server = Server::new_async().await;

    let mock = server
        .mock("GET", "/weather")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("q".into(), "paris".into()),
            Matcher::UrlEncoded("appid".into(), common::TEST_API_KEY.into()),
            Matcher::UrlEncoded("units".into(), "metric".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(PARIS_BODY)
        .create_async()
        .await;

    let client = common::weather_client(format!("{}/weather", server.url()));
    let outcome = client.current_conditions("paris").await;

    match outcome {
        ProviderOutcome::Success(current) => {
            assert_eq!(current.location, "Paris");
            assert_eq!(current.temperature, 18.4);
            assert_eq!(current.temp_high, 20.1);
            assert_eq!(current.temp_low, 16.0);
            assert_eq!(current.humidity, 55);
            assert_eq!(current.wind_speed, Some(3.6));
            assert_eq!(current.condition, "Clear");
            assert_eq!(current.description, "clear sky");
        }
        other => panic!("Expected success, got {:?}", other),
    }

    mock.assert_async().await;
}

#[tokio::test]
async fn test_current_conditions_not_found() {
    let mut server = Server::new_async().await;

    let mock = server
        .mock("GET", "/weather")
        .match_query(Matcher::Any)
        .with_status(404)
        .with_body(r#"{"cod": "404", "message": "city not found"}"#)
        .create_async()
        .await;

    let client = common::weather_client(format!("{}/weather", server.url()));
    assert_eq!(
        client.current_conditions("Atlantis").await,
        ProviderOutcome::NotFound
    );

    mock.assert_async().await;
}

#[tokio::test]
async fn test_current_conditions_server_error() {
    let mut server = Server::new_async().await;

    let mock = server
        .mock("GET", "/weather")
        .match_query(Matcher::Any)
        .with_status(500)
        .with_body("Internal Server Error")
        .create_async()
        .await;

    let client = common::weather_client(format!("{}/weather", server.url()));
    match client.current_conditions("London").await {
        ProviderOutcome::UpstreamError(reason) => assert!(reason.contains("500")),
        other => panic!("Expected upstream error, got {:?}", other),
    }

    mock.assert_async().await;
}

#[tokio::test]
async fn test_current_conditions_invalid_key() {
    let mut server = Server::new_async().await;

    let mock = server
        .mock("GET", "/weather")
        .match_query(Matcher::Any)
        .with_status(401)
        .with_body(r#"{"cod": 401, "message": "Invalid API key"}"#)
        .create_async()
        .await;

    let client = common::weather_client(format!("{}/weather", server.url()));
    match client.current_conditions("London").await {
        ProviderOutcome::UpstreamError(reason) => assert!(reason.contains("Invalid API key")),
        other => panic!("Expected upstream error, got {:?}", other),
    }

    mock.assert_async().await;
}

#[tokio::test]
async fn test_current_conditions_transport_failure() {
    // Nothing listens on port 1
    let client = common::weather_client("http://127.0.0.1:1/weather".to_string());

    match client.current_conditions("London").await {
        ProviderOutcome::UpstreamError(reason) => {
            assert!(reason.contains("HTTP request failed"), "got: {reason}");
            // The request URL carries appid=<key>
            assert!(!reason.contains(common::TEST_API_KEY), "API key leaked: {reason}");
        }
        other => panic!("Expected upstream error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_current_conditions_timeout_is_upstream_error() {
    // Accepts connections and never answers
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let silent = tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });

    let client = WeatherApiClient::new(
        format!("http://{addr}/weather"),
        common::TEST_API_KEY.to_string(),
        Duration::from_millis(200),
    )
    .unwrap();

    match client.current_conditions("London").await {
        ProviderOutcome::UpstreamError(reason) => {
            assert!(reason.contains("HTTP request failed"), "got: {reason}");
            assert!(!reason.contains(common::TEST_API_KEY), "API key leaked: {reason}");
        }
        other => panic!("Expected upstream error, got {:?}", other),
    }

    silent.abort();
}
