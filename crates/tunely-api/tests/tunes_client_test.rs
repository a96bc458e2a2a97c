#![allow(clippy::unwrap_used)]
// Integration tests for `TunesClient` using wiremock.

use std::time::Duration;

use chrono::{TimeZone, Utc};
use pretty_assertions::assert_eq;
use secrecy::SecretString;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use tunely_api::models::{MeasurementType, NodeType};
use tunely_api::{Credential, Error, TunesClient};

// ── Helpers ─────────────────────────────────────────────────────────

fn token(raw: &str) -> Option<SecretString> {
    Some(SecretString::from(raw.to_string()))
}

async fn setup() -> (MockServer, TunesClient) {
    let server = MockServer::start().await;
    let client = TunesClient::from_reqwest(
        &format!("{}/api/v3", server.uri()),
        reqwest::Client::new(),
        Credential::new(token("secret")),
    )
    .unwrap();
    (server, client)
}

fn rooms_body() -> serde_json::Value {
    json!([
        { "uuid": "r1", "name": "Hall", "nodeUuid": "n1", "activeControl": true, "targetTemperature": 21.0 },
        { "uuid": "r2", "name": "Attic", "nodeUuid": "n2", "activeControl": false, "targetTemperature": 18.0 }
    ])
}

// ── Topology ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_list_tunes_sends_bearer_token() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/v3/tunes"))
        .and(header("Authorization", "Bearer secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "tuneUuid": "t1", "tuneName": "Villa" }
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let tunes = client.list_tunes().await.unwrap();
    assert_eq!(tunes.len(), 1);
    assert_eq!(tunes[0].tune_uuid, "t1");
    assert_eq!(tunes[0].tune_name, "Villa");
}

#[tokio::test]
async fn test_get_tune_topology() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/v3/tunes/t1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "uuid": "t1",
            "name": "Villa",
            "gateway": {
                "uuid": "g1",
                "children": [
                    { "uuid": "s1", "type": 0, "device": { "type": 4 } },
                    { "uuid": "c1", "type": 1, "device": { "type": 5 } },
                    { "uuid": "h1", "type": 0, "device": { "type": 11 } }
                ]
            },
            "rooms": rooms_body()
        })))
        .mount(&server)
        .await;

    let tune = client.get_tune("t1").await.unwrap();
    assert_eq!(tune.gateway.children.len(), 3);
    assert_eq!(tune.gateway.children[2].node_type, NodeType::Sensor);
    assert_eq!(tune.controller_uuid(), Some("c1"));
    assert_eq!(tune.rooms[0].node_uuid, "n1");
}

// ── Rooms ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_set_rooms_puts_full_list() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/v3/tunes/t1/rooms"))
        .respond_with(ResponseTemplate::new(200).set_body_json(rooms_body()))
        .mount(&server)
        .await;

    let mut expected = rooms_body();
    expected[1]["activeControl"] = json!(true);

    Mock::given(method("PUT"))
        .and(path("/api/v3/tunes/t1/rooms"))
        .and(body_json(&expected))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let mut rooms = client.get_rooms("t1").await.unwrap();
    rooms[1].active_control = true;
    client.set_rooms("t1", &rooms).await.unwrap();
}

// ── Measurements ────────────────────────────────────────────────────

#[tokio::test]
async fn test_latest_measurement_uses_type_query() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/v3/tunes/t1/measurements/n1/latest"))
        .and(query_param("type", "temperature_C"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": 21.4, "timestamp": "2024-02-01T10:00:00Z", "type": "temperature_C"
        })))
        .mount(&server)
        .await;

    let m = client
        .latest_measurement("t1", "n1", MeasurementType::Temperature)
        .await
        .unwrap()
        .unwrap();
    assert!((m.value - 21.4).abs() < f64::EPSILON);
}

#[tokio::test]
async fn test_latest_measurement_no_content_is_none() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/v3/tunes/t1/measurements/n1/latest"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let m = client
        .latest_measurement("t1", "n1", MeasurementType::Humidity)
        .await
        .unwrap();
    assert!(m.is_none());
}

#[tokio::test]
async fn test_measurement_series_range_params() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/v3/tunes/t1/measurements/h1"))
        .and(query_param("type", "energy_kWH"))
        .and(query_param("from", "2024-01-31T23:00:00.000Z"))
        .and(query_param("to", "2024-02-01T08:30:00.000Z"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "value": 12.5 })))
        .mount(&server)
        .await;

    let from = Utc.with_ymd_and_hms(2024, 1, 31, 23, 0, 0).unwrap();
    let to = Utc.with_ymd_and_hms(2024, 2, 1, 8, 30, 0).unwrap();
    let series = client
        .measurement_series("t1", "h1", MeasurementType::Energy, from, to)
        .await
        .unwrap()
        .unwrap();
    assert!((series.total() - 12.5).abs() < f64::EPSILON);
}

#[tokio::test]
async fn test_node_status_filters_by_node() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/v3/tunes/t1/nodestatus"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "nodeUuid": "a", "battery": 1, "maxBattery": 4, "radioStatus": 2, "maxRadioStatus": 5 },
            { "nodeUuid": "b", "battery": 3, "maxBattery": 4, "radioStatus": 4, "maxRadioStatus": 5 }
        ])))
        .mount(&server)
        .await;

    let status = client.node_status("t1", "b").await.unwrap().unwrap();
    assert!((status.battery_percent() - 75.0).abs() < f64::EPSILON);
    assert_eq!(status.signal_percent(), Some(80.0));

    assert!(client.node_status("t1", "zzz").await.unwrap().is_none());
}

#[tokio::test]
async fn test_measurement_types_lists_names() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/v3/tunes/t1/measurements/n1/types"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!(["temperature_C", "humidity_relative_percent"])),
        )
        .mount(&server)
        .await;

    let types = client.measurement_types("t1", "n1").await.unwrap();
    assert_eq!(types, vec!["temperature_C", "humidity_relative_percent"]);
}

#[tokio::test]
async fn test_setpoint_schedules_passthrough() {
    let (server, client) = setup().await;
    let body = json!([{ "name": "Weekdays", "lowerTemperature": 18.0 }]);

    Mock::given(method("GET"))
        .and(path("/api/v3/tunes/t1/setpointschedules"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body.clone()))
        .mount(&server)
        .await;

    assert_eq!(client.setpoint_schedules("t1").await.unwrap(), body);
}

// ── Error mapping ───────────────────────────────────────────────────

#[tokio::test]
async fn test_unauthorized() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/v3/tunes"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let result = client.list_tunes().await;
    assert!(
        matches!(result, Err(Error::Unauthorized)),
        "expected Unauthorized, got: {result:?}"
    );
}

#[tokio::test]
async fn test_rate_limited_reads_retry_after() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/v3/tunes/t1/rooms"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "120"))
        .mount(&server)
        .await;

    let err = client.get_rooms("t1").await.unwrap_err();
    assert!(
        matches!(
            err,
            Error::RateLimited {
                retry_after_secs: Some(120)
            }
        ),
        "got: {err:?}"
    );
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_not_found_and_server_error() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/v3/tunes/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v3/tunes/broken"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    assert!(client.get_tune("missing").await.unwrap_err().is_not_found());
    let err = client.get_tune("broken").await.unwrap_err();
    assert!(
        matches!(err, Error::Http { status: 500, ref message } if message == "boom"),
        "got: {err:?}"
    );
}

#[tokio::test]
async fn test_missing_credential_never_hits_network() {
    let server = MockServer::start().await;
    let client = TunesClient::from_reqwest(
        &server.uri(),
        reqwest::Client::new(),
        Credential::default(),
    )
    .unwrap();

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    assert!(matches!(
        client.list_tunes().await,
        Err(Error::MissingCredential)
    ));
}

// ── Credential rotation ─────────────────────────────────────────────

#[tokio::test]
async fn test_credential_rotation_applies_to_next_call() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/v3/tunes/t1/rooms"))
        .and(header("Authorization", "Bearer secret"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(rooms_body())
                .set_delay(Duration::from_millis(300)),
        )
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/v3/tunes/t1/rooms"))
        .and(header("Authorization", "Bearer rotated"))
        .respond_with(ResponseTemplate::new(200).set_body_json(rooms_body()))
        .expect(1)
        .mount(&server)
        .await;

    // Poll the first call once so its request is built with the old token.
    let in_flight = client.get_rooms("t1");
    tokio::pin!(in_flight);
    tokio::select! {
        biased;
        _ = &mut in_flight => panic!("delayed response should still be pending"),
        () = std::future::ready(()) => {}
    }

    // A second handle shares the same slot.
    let other = client.clone();
    other
        .credential()
        .update_credential(token("rotated"));

    let fresh = client.get_rooms("t1").await.unwrap();
    assert_eq!(fresh.len(), 2);

    let stale = in_flight.await.unwrap();
    assert_eq!(stale.len(), 2);
}
