//! Integration tests for the upstream clients and coordinator using wiremock.

use std::sync::Arc;
use std::time::Duration;

use aerodash_sources::{
    ClientConfig, FetchCoordinator, PollenClient, PollenType, ProxyDerivation, RetryConfig,
    Severity, UpstreamError, UpstreamSource, WeatherClient, WeatherCondition,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Fast retries so tests don't wait on real backoff.
fn config(base_url: &str) -> ClientConfig {
    ClientConfig::new(base_url).with_retry(RetryConfig::new(3, 1, 5))
}

fn forecast_body() -> serde_json::Value {
    serde_json::json!({
        "latitude": 40.78,
        "longitude": -73.97,
        "current": {
            "time": "2026-05-01T12:00",
            "temperature_2m": 18.4,
            "apparent_temperature": 17.9,
            "relative_humidity_2m": 62,
            "pressure_msl": 1016.1,
            "wind_speed_10m": 9.7,
            "wind_direction_10m": 200,
            "precipitation": 0.0,
            "uv_index": 4.2,
            "cloud_cover": 75,
            "weather_code": 3
        }
    })
}

fn air_quality_body() -> serde_json::Value {
    serde_json::json!({
        "current": {
            "pm10": 14.0,
            "pm2_5": 6.1,
            "european_aqi": 22,
            "alder_pollen": 0.0,
            "birch_pollen": 40.0,
            "olive_pollen": 0.0,
            "grass_pollen": 2.0,
            "mugwort_pollen": 0.5,
            "ragweed_pollen": 60.0
        }
    })
}

#[tokio::test]
async fn test_weather_fetch_success() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/forecast"))
        .and(query_param("latitude", "40.78"))
        .and(query_param("longitude", "-73.97"))
        .respond_with(ResponseTemplate::new(200).set_body_json(forecast_body()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = WeatherClient::new(config(&mock_server.uri())).unwrap();
    let reading = client.fetch(40.78, -73.97).await.unwrap();

    assert_eq!(reading.temperature, Some(18.4));
    assert_eq!(reading.humidity, Some(62.0));
    assert_eq!(reading.condition, Some(WeatherCondition::Cloudy));
    assert_eq!(reading.location.longitude, -73.97);
    assert!(!reading.stale);
}

#[tokio::test]
async fn test_retries_transient_status_then_succeeds() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/forecast"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1/forecast"))
        .respond_with(ResponseTemplate::new(200).set_body_json(forecast_body()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = WeatherClient::new(config(&mock_server.uri())).unwrap();
    let reading = client.fetch(40.78, -73.97).await.unwrap();
    assert_eq!(reading.temperature, Some(18.4));
}

#[tokio::test]
async fn test_rate_limit_is_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/air-quality"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1/air-quality"))
        .respond_with(ResponseTemplate::new(200).set_body_json(air_quality_body()))
        .mount(&mock_server)
        .await;

    let client = PollenClient::new(config(&mock_server.uri())).unwrap();
    assert!(client.fetch(52.52, 13.41).await.is_ok());
}

#[tokio::test]
async fn test_retries_exhausted_reports_last_cause() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/forecast"))
        .respond_with(ResponseTemplate::new(502))
        .expect(4)
        .mount(&mock_server)
        .await;

    let client = WeatherClient::new(config(&mock_server.uri())).unwrap();
    let err = client.fetch(40.78, -73.97).await.unwrap_err();

    assert_eq!(
        err,
        UpstreamError::RetriesExhausted {
            source_name: "weather",
            attempts: 4,
            last_cause: "HTTP 502".to_string(),
        }
    );
}

#[tokio::test]
async fn test_client_error_is_not_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/forecast"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = WeatherClient::new(config(&mock_server.uri())).unwrap();
    let err = client.fetch(40.78, -73.97).await.unwrap_err();
    assert!(matches!(err, UpstreamError::Status { status: 404, .. }), "{err}");
}

#[tokio::test]
async fn test_malformed_body_fails_immediately() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/forecast"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = WeatherClient::new(config(&mock_server.uri())).unwrap();
    let err = client.fetch(40.78, -73.97).await.unwrap_err();
    assert!(matches!(err, UpstreamError::Malformed { source_name: "weather", .. }), "{err}");
}

#[tokio::test]
async fn test_timeout_counts_as_transient() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/forecast"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(forecast_body())
                .set_delay(Duration::from_millis(500)),
        )
        .expect(2)
        .mount(&mock_server)
        .await;

    let config = ClientConfig::new(mock_server.uri())
        .with_timeout(Duration::from_millis(50))
        .with_retry(RetryConfig::new(1, 1, 5));
    let client = WeatherClient::new(config).unwrap();

    let err = client.fetch(40.78, -73.97).await.unwrap_err();
    assert!(matches!(err, UpstreamError::RetriesExhausted { attempts: 2, .. }), "{err}");
}

/// Serves one response per entry in `responses`, in order, then stops.
/// Returns the base URL and a handle resolving to the number of connections served.
async fn scripted_server(responses: Vec<String>) -> (String, tokio::task::JoinHandle<usize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());

    let handle = tokio::spawn(async move {
        let mut served = 0;
        for response in responses {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
            served += 1;
        }
        served
    });

    (base_url, handle)
}

#[tokio::test]
async fn test_truncated_body_is_retried() {
    let body = forecast_body().to_string();
    let truncated = format!(
        "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
        body.len(),
        &body[..body.len() / 2]
    );
    let complete = format!(
        "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
        body.len(),
        body
    );
    let (base_url, server) = scripted_server(vec![truncated, complete]).await;

    let client = WeatherClient::new(config(&base_url)).unwrap();
    let reading = client.fetch(40.78, -73.97).await.unwrap();
    assert_eq!(reading.temperature, Some(18.4));
    assert_eq!(server.await.unwrap(), 2);
}

#[tokio::test]
async fn test_truncated_body_exhausts_retries() {
    let truncated = "HTTP/1.1 200 OK\r\ncontent-length: 64\r\nconnection: close\r\n\r\n{\"current\":".to_string();
    let (base_url, server) = scripted_server(vec![truncated; 2]).await;

    let config = ClientConfig::new(base_url).with_retry(RetryConfig::new(1, 1, 5));
    let client = WeatherClient::new(config).unwrap();

    let err = client.fetch(40.78, -73.97).await.unwrap_err();
    assert!(matches!(err, UpstreamError::RetriesExhausted { attempts: 2, .. }), "{err}");
    assert_eq!(server.await.unwrap(), 2);
}

#[tokio::test]
async fn test_unbounded_retry_budget_does_not_overflow() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/forecast"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1/forecast"))
        .respond_with(ResponseTemplate::new(200).set_body_json(forecast_body()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = ClientConfig::new(mock_server.uri()).with_retry(RetryConfig::new(u32::MAX, 1, 5));
    let client = WeatherClient::new(config).unwrap();
    let reading = client.fetch(40.78, -73.97).await.unwrap();
    assert_eq!(reading.temperature, Some(18.4));
}

#[tokio::test]
async fn test_sparse_payload_is_normalized() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/air-quality"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"current": {}})))
        .mount(&mock_server)
        .await;

    let client = PollenClient::new(config(&mock_server.uri())).unwrap();
    let reading = client.fetch(52.52, 13.41).await.unwrap();

    assert_eq!(reading.pollen.len(), 5);
    assert_eq!(reading.pm10, None);
}

#[tokio::test]
async fn test_pollen_fetch_with_direct_and_proxy_derivation() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/air-quality"))
        .respond_with(ResponseTemplate::new(200).set_body_json(air_quality_body()))
        .mount(&mock_server)
        .await;

    let direct = PollenClient::new(config(&mock_server.uri())).unwrap();
    let reading = direct.fetch(52.52, 13.41).await.unwrap();
    assert_eq!(reading.pollen[&PollenType::Tree].concentration, 40.0);
    assert_eq!(reading.pollen[&PollenType::Ragweed].severity, Severity::High);
    assert_eq!(reading.air_quality_index, Some(22.0));

    let proxy = PollenClient::with_derivation(
        config(&mock_server.uri()),
        Arc::new(ProxyDerivation::new("pm10")),
    )
    .unwrap();
    let reading = proxy.fetch(52.52, 13.41).await.unwrap();
    assert_eq!(reading.pollen[&PollenType::Tree].concentration, 21.0);
    assert_eq!(proxy.derivation_name(), "proxy");
}

#[tokio::test]
async fn test_coordinator_returns_partial_success() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/forecast"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1/air-quality"))
        .respond_with(ResponseTemplate::new(200).set_body_json(air_quality_body()))
        .mount(&mock_server)
        .await;

    let coordinator = FetchCoordinator::new(
        Arc::new(WeatherClient::new(config(&mock_server.uri())).unwrap()),
        Arc::new(PollenClient::new(config(&mock_server.uri())).unwrap()),
    );

    let results = coordinator.fetch_all(52.52, 13.41).await.unwrap();
    assert!(results.weather.is_none());
    assert!(results.pollen.is_some());
    assert!(matches!(
        results.errors.weather,
        Some(UpstreamError::RetriesExhausted { source_name: "weather", .. })
    ));
}

#[tokio::test]
async fn test_coordinator_both_down() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;

    let coordinator = FetchCoordinator::new(
        Arc::new(WeatherClient::new(config(&mock_server.uri())).unwrap()),
        Arc::new(PollenClient::new(config(&mock_server.uri())).unwrap()),
    );

    let err = coordinator.fetch_all(52.52, 13.41).await.unwrap_err();
    assert!(err.to_string().contains("HTTP 503"));
}
