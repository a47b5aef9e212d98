//! End-to-end tests: a mock provider, the real proxy and the real client, all
//! on ephemeral local ports.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    routing::get,
    Router,
};
use chrono::{NaiveDate, Utc};
use serde_json::{json, Value};
use tokio::net::TcpListener;

use flighttrack::flight::FlightStatusQuery;
use flighttrack::poller::{self, Phase};
use flighttrack::provider::{AccessKey, AviationStackProvider};
use flighttrack::proxy::{self, FlightProxy};
use flighttrack::{FlightProgress, ProxyClient};

const USER_AGENT: &str = "flighttrack-tests/1.0";

#[derive(Debug, Clone)]
struct SeenRequest {
    params: HashMap<String, String>,
    user_agent: Option<String>,
}

#[derive(Clone)]
struct MockProvider {
    status: StatusCode,
    body: String,
    delay: Duration,
    seen: Arc<Mutex<Vec<SeenRequest>>>,
}

async fn flights(
    State(mock): State<MockProvider>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> (StatusCode, [(header::HeaderName, &'static str); 1], String) {
    mock.seen.lock().unwrap().push(SeenRequest {
        params,
        user_agent: headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
    });
    tokio::time::sleep(mock.delay).await;
    (
        mock.status,
        [(header::CONTENT_TYPE, "application/json")],
        mock.body.clone(),
    )
}

/// Start a mock provider; returns its base URL and the request log.
async fn start_provider(
    status: StatusCode,
    body: impl Into<String>,
    delay: Duration,
) -> (String, Arc<Mutex<Vec<SeenRequest>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let mock = MockProvider {
        status,
        body: body.into(),
        delay,
        seen: Arc::clone(&seen),
    };
    let app = Router::new()
        .route("/v1/flights", get(flights))
        .with_state(mock);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

    (format!("http://{addr}/v1"), seen)
}

/// Start the proxy in front of `provider_url`; returns its base URL.
async fn start_proxy(provider_url: &str, timeout: Duration, key: Option<&str>) -> String {
    let provider = AviationStackProvider::new(provider_url, timeout, USER_AGENT).unwrap();
    let access_key = AccessKey::Fixed(key.map(str::to_string));
    let app = Arc::new(FlightProxy::new(Arc::new(provider), access_key));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = proxy::serve(listener, app, std::future::pending());
    tokio::spawn(server);

    format!("http://{addr}")
}

async fn get_json(url: &str) -> (u16, Value) {
    let response = reqwest::get(url).await.unwrap();
    let status = response.status().as_u16();
    (status, response.json().await.unwrap())
}

fn record(status: &str) -> Value {
    json!({
        "flight_date": "2025-03-14",
        "flight_status": status,
        "departure": {
            "airport": "King Khalid International",
            "iata": "RUH",
            "terminal": "1",
            "scheduled": "2025-03-14T01:00:00+00:00",
            "actual": "2025-03-14T01:12:00+00:00"
        },
        "arrival": {
            "airport": "Calicut International",
            "iata": "CCJ",
            "scheduled": "2025-03-14T05:30:00+00:00",
            "estimated": "2025-03-14T05:20:00+00:00",
            "actual": null,
            "baggage": "4"
        },
        "airline": { "name": "Air India Express", "iata": "IX", "icao": "AXB" },
        "flight": { "number": "322", "iata": "IX322", "codeshared": null },
        "aircraft": null,
        "live": null
    })
}

fn unused_port_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}/v1")
}

#[tokio::test]
async fn test_record_passes_through_unchanged() {
    let (provider, seen) = start_provider(
        StatusCode::OK,
        json!({"pagination": {"limit": 1}, "data": [record("active")]}).to_string(),
        Duration::ZERO,
    )
    .await;
    let proxy = start_proxy(&provider, Duration::from_secs(5), Some("secret")).await;

    let (status, body) = get_json(&format!("{proxy}/api/flight?flight=IX322")).await;

    assert_eq!(status, 200);
    assert_eq!(body["flight"], record("active"));
    assert!(body["timestamp"].is_string());
    assert!(body.get("requestedDate").is_none());

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].params["access_key"], "secret");
    assert_eq!(seen[0].params["flight_iata"], "IX322");
    assert_eq!(seen[0].params["limit"], "1");
    assert!(!seen[0].params.contains_key("flight_date"));
    assert_eq!(seen[0].user_agent.as_deref(), Some(USER_AGENT));
}

#[tokio::test]
async fn test_date_is_forwarded_and_echoed() {
    let (provider, seen) = start_provider(
        StatusCode::OK,
        json!({"data": [record("scheduled")]}).to_string(),
        Duration::ZERO,
    )
    .await;
    let proxy = start_proxy(&provider, Duration::from_secs(5), Some("secret")).await;

    let url = format!("{proxy}/api/flight?flight=IX322&date=2025-03-14");
    let (status, body) = get_json(&url).await;

    assert_eq!(status, 200);
    assert_eq!(body["requestedDate"], "2025-03-14");
    assert_eq!(seen.lock().unwrap()[0].params["flight_date"], "2025-03-14");
}

#[tokio::test]
async fn test_missing_flight_param_defaults() {
    let (provider, seen) = start_provider(
        StatusCode::OK,
        json!({"data": [record("active")]}).to_string(),
        Duration::ZERO,
    )
    .await;
    let proxy = start_proxy(&provider, Duration::from_secs(5), Some("secret")).await;

    let (status, _) = get_json(&format!("{proxy}/api/flight")).await;

    assert_eq!(status, 200);
    assert_eq!(seen.lock().unwrap()[0].params["flight_iata"], "IX322");
}

#[tokio::test]
async fn test_empty_data_is_not_found() {
    let (provider, _) = start_provider(StatusCode::OK, r#"{"data": []}"#, Duration::ZERO).await;
    let proxy = start_proxy(&provider, Duration::from_secs(5), Some("secret")).await;

    let url = format!("{proxy}/api/flight?flight=IX322&date=2025-03-14");
    let (status, body) = get_json(&url).await;

    assert_eq!(status, 404);
    assert_eq!(
        body["error"],
        "Flight IX322 not found for 2025-03-14. Please check the flight number and try again."
    );
}

#[tokio::test]
async fn test_provider_timeout_is_408() {
    let (provider, _) = start_provider(
        StatusCode::OK,
        json!({"data": [record("active")]}).to_string(),
        Duration::from_secs(3),
    )
    .await;
    let proxy = start_proxy(&provider, Duration::from_millis(200), Some("secret")).await;

    let (status, body) = get_json(&format!("{proxy}/api/flight?flight=IX322")).await;

    assert_eq!(status, 408);
    assert_eq!(body["error"], "Request timeout. Please try again.");
}

#[tokio::test]
async fn test_unreachable_provider_is_503() {
    let proxy = start_proxy(&unused_port_url(), Duration::from_secs(5), Some("secret")).await;

    let (status, body) = get_json(&format!("{proxy}/api/flight?flight=IX322")).await;

    assert_eq!(status, 503);
    assert_eq!(
        body["error"],
        "Network error. Please check your connection."
    );
}

#[tokio::test]
async fn test_provider_error_status_carries_message() {
    let (provider, _) = start_provider(
        StatusCode::UNAUTHORIZED,
        json!({
            "error": {
                "code": "invalid_access_key",
                "message": "You have not supplied a valid API Access Key."
            }
        })
        .to_string(),
        Duration::ZERO,
    )
    .await;
    let proxy = start_proxy(&provider, Duration::from_secs(5), Some("wrong")).await;

    let (status, body) = get_json(&format!("{proxy}/api/flight?flight=IX322")).await;

    assert_eq!(status, 400);
    assert_eq!(
        body["error"],
        "You have not supplied a valid API Access Key."
    );
}

#[tokio::test]
async fn test_provider_error_status_without_message_is_generic() {
    let (provider, _) =
        start_provider(StatusCode::BAD_GATEWAY, "upstream broke", Duration::ZERO).await;
    let proxy = start_proxy(&provider, Duration::from_secs(5), Some("secret")).await;

    let (status, body) = get_json(&format!("{proxy}/api/flight?flight=IX322")).await;

    assert_eq!(status, 400);
    assert_eq!(body["error"], "Flight data service unavailable");
}

#[tokio::test]
async fn test_embedded_error_in_ok_body_is_400() {
    let (provider, _) = start_provider(
        StatusCode::OK,
        json!({
            "error": {
                "code": "usage_limit_reached",
                "message": "Your monthly usage limit has been reached."
            }
        })
        .to_string(),
        Duration::ZERO,
    )
    .await;
    let proxy = start_proxy(&provider, Duration::from_secs(5), Some("secret")).await;

    let (status, body) = get_json(&format!("{proxy}/api/flight?flight=IX322")).await;

    assert_eq!(status, 400);
    assert_eq!(body["error"], "Your monthly usage limit has been reached.");
}

#[tokio::test]
async fn test_string_error_in_ok_body_is_generic_400() {
    let body = json!({"error": "invalid_access_key"}).to_string();
    let (provider, _) = start_provider(StatusCode::OK, body, Duration::ZERO).await;
    let proxy = start_proxy(&provider, Duration::from_secs(5), Some("secret")).await;

    let (status, body) = get_json(&format!("{proxy}/api/flight?flight=IX322")).await;

    assert_eq!(status, 400);
    assert_eq!(body["error"], "Flight data service unavailable");
}

#[tokio::test]
async fn test_undecodable_provider_body_is_500() {
    let (provider, _) = start_provider(StatusCode::OK, "<html>oops</html>", Duration::ZERO).await;
    let proxy = start_proxy(&provider, Duration::from_secs(5), Some("secret")).await;

    let (status, body) = get_json(&format!("{proxy}/api/flight?flight=IX322")).await;

    assert_eq!(status, 500);
    assert_eq!(
        body["error"],
        "An unexpected error occurred. Please try again later."
    );
}

#[tokio::test]
async fn test_missing_key_fails_before_outbound_call() {
    let (provider, seen) = start_provider(
        StatusCode::OK,
        json!({"data": [record("active")]}).to_string(),
        Duration::ZERO,
    )
    .await;
    let proxy = start_proxy(&provider, Duration::from_secs(5), None).await;

    let (status, body) = get_json(&format!("{proxy}/api/flight?flight=IX322")).await;

    assert_eq!(status, 500);
    assert_eq!(
        body["error"],
        "API key not configured. Please check your environment variables."
    );
    assert!(seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_invalid_input_fails_before_outbound_call() {
    let (provider, seen) = start_provider(
        StatusCode::OK,
        json!({"data": [record("active")]}).to_string(),
        Duration::ZERO,
    )
    .await;
    let proxy = start_proxy(&provider, Duration::from_secs(5), Some("secret")).await;

    let (status, body) = get_json(&format!("{proxy}/api/flight?flight=X")).await;
    assert_eq!(status, 400);
    assert_eq!(body["error"], "Invalid flight number format");

    let url = format!("{proxy}/api/flight?flight=IX322&date=2025-02-30");
    let (status, _) = get_json(&url).await;
    assert_eq!(status, 400);

    assert!(seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_client_decodes_landed_flight() {
    let (provider, _) = start_provider(
        StatusCode::OK,
        json!({"data": [record("landed")]}).to_string(),
        Duration::ZERO,
    )
    .await;
    let proxy = start_proxy(&provider, Duration::from_secs(5), Some("secret")).await;

    let date = NaiveDate::from_ymd_opt(2025, 3, 14);
    let query = FlightStatusQuery::new("IX322", date);
    let client = ProxyClient::new(&proxy, query, Duration::from_secs(15)).unwrap();
    let envelope = client.fetch_envelope().await.unwrap();

    let progress = FlightProgress::compute(&envelope.flight, Utc::now());
    assert_eq!(envelope.requested_date, date);
    assert_eq!(envelope.flight.flight.iata.as_deref(), Some("IX322"));
    assert_eq!(progress.percent, 100);
}

#[tokio::test]
async fn test_client_accepts_null_sections() {
    let mut flight = record("scheduled");
    flight["departure"] = Value::Null;
    flight["airline"] = Value::Null;
    let body = json!({"data": [flight]}).to_string();
    let (provider, _) = start_provider(StatusCode::OK, body, Duration::ZERO).await;
    let proxy = start_proxy(&provider, Duration::from_secs(5), Some("secret")).await;

    let query = FlightStatusQuery::new("IX322", None);
    let client = ProxyClient::new(&proxy, query, Duration::from_secs(15)).unwrap();
    let envelope = client.fetch_envelope().await.unwrap();

    assert!(envelope.flight.departure.iata.is_none());
    assert!(envelope.flight.airline.name.is_none());
    assert_eq!(envelope.flight.arrival.iata.as_deref(), Some("CCJ"));
}

#[tokio::test]
async fn test_poller_surfaces_not_found() {
    let (provider, _) = start_provider(StatusCode::OK, r#"{"data": []}"#, Duration::ZERO).await;
    let proxy = start_proxy(&provider, Duration::from_secs(5), Some("secret")).await;

    let client = ProxyClient::new(
        &proxy,
        FlightStatusQuery::new("IX322", None),
        Duration::from_secs(15),
    )
    .unwrap();
    let handle = poller::spawn(Arc::new(client), Duration::from_secs(300));
    let mut states = handle.subscribe();

    let state = tokio::time::timeout(
        Duration::from_secs(10),
        states.wait_for(|s| s.phase == Phase::Error),
    )
    .await
    .unwrap()
    .unwrap()
    .clone();

    let message = state.error.unwrap();
    assert!(message.contains("IX322"), "message: {message}");
    assert!(state.flight.is_none());
    handle.stop().await;
}

#[tokio::test]
async fn test_client_timeout_message() {
    let (provider, _) = start_provider(
        StatusCode::OK,
        json!({"data": [record("active")]}).to_string(),
        Duration::from_secs(3),
    )
    .await;
    let proxy = start_proxy(&provider, Duration::from_secs(10), Some("secret")).await;

    let client = ProxyClient::new(
        &proxy,
        FlightStatusQuery::new("IX322", None),
        Duration::from_millis(200),
    )
    .unwrap();
    let err = client.fetch_envelope().await.unwrap_err();

    assert_eq!(err.to_string(), "Request timed out. Please try again.");
}
