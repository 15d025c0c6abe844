// Reconciliation and serial addition against a wiremock bridge.

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::json;
use url::Url;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use lumigate_api::Session;
use lumigate_core::{
    Bridge, ClientSettings, CoreError, Credentials, GatewayClient, MatchRule,
    MemoryCredentialStore, Reachability, Reconciler, SerialMatchSource,
};

const BRIDGE_ID: &str = "001788FFFE0A0B0C";
const DESK_ID: &str = "3f2a1b00-0000-4000-8000-000000000001";
const HALL_ID: &str = "3f2a1b00-0000-4000-8000-000000aabbcc";

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, GatewayClient) {
    let server = MockServer::start().await;
    let base = Url::parse(&format!("{}/", server.uri())).unwrap();
    let session = Session::with_clients(
        reqwest::Client::new(),
        reqwest::Client::new(),
        base.clone(),
        base,
        Duration::from_secs(2),
    );
    let settings = ClientSettings {
        serial_poll_interval: Duration::from_millis(20),
        serial_search_timeout: Duration::from_millis(500),
        retry_base_delay: Duration::from_millis(10),
        ..ClientSettings::default()
    };
    let store = MemoryCredentialStore::new().with_entry(BRIDGE_ID, Credentials::new("app-key"));
    let gateway = GatewayClient::with_session(
        Bridge::manual(BRIDGE_ID, "127.0.0.1", server.address().port()),
        session,
        settings,
        Arc::new(store),
    )
    .unwrap();
    (server, gateway)
}

fn modern_light(id: &str, name: &str) -> serde_json::Value {
    json!({
        "id": id,
        "type": "light",
        "owner": {"rid": "dev-1", "rtype": "device"},
        "metadata": {"name": name, "archetype": "sultan_bulb"},
        "on": {"on": true},
        "dimming": {"brightness": 80.0}
    })
}

async fn mount_modern(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/clip/v2/resource/light"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "errors": [],
            "data": [modern_light(DESK_ID, "Desk"), modern_light(HALL_ID, "Hallway")]
        })))
        .mount(server)
        .await;
}

fn legacy_lights() -> serde_json::Value {
    json!({
        "1": {"name": "Desk", "uniqueid": "00:17:88:01:00:12:34:56-0b",
              "state": {"on": true, "bri": 254, "reachable": true}},
        "2": {"name": "Hall lamp", "uniqueid": "00:17:88:01:00:aa:bb:cc-0b",
              "state": {"on": false, "reachable": false}},
        "3": {"name": "Porch 0A0B0C", "uniqueid": "00:17:88:01:00:0a:0b:0c-0b",
              "state": {"on": false, "reachable": true}}
    })
}

// ── Reachability overlay ────────────────────────────────────────────

#[tokio::test]
async fn test_reachability_overlaid_from_legacy() {
    let (server, gateway) = setup().await;
    mount_modern(&server).await;
    Mock::given(method("GET"))
        .and(path("/api/app-key/lights"))
        .respond_with(ResponseTemplate::new(200).set_body_json(legacy_lights()))
        .mount(&server)
        .await;

    let (lights, mappings) = Reconciler::new(&gateway).lights().await.unwrap();

    assert_eq!(lights.len(), 2);
    assert_eq!(lights[0].reachability, Reachability::Online);
    assert_eq!(lights[1].reachability, Reachability::Offline);

    assert_eq!(mappings.len(), 2);
    assert_eq!(mappings[0].modern_id, DESK_ID);
    assert_eq!(mappings[0].legacy_id, "1");
    assert_eq!(mappings[0].rule, MatchRule::Name);
    assert_eq!(mappings[1].legacy_id, "2");
    assert_eq!(mappings[1].rule, MatchRule::MacSuffix);
}

#[tokio::test]
async fn test_legacy_failure_degrades_to_unknown() {
    let (server, gateway) = setup().await;
    mount_modern(&server).await;
    Mock::given(method("GET"))
        .and(path("/api/app-key/lights"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let (lights, mappings) = Reconciler::new(&gateway).lights().await.unwrap();

    assert_eq!(lights.len(), 2);
    assert!(lights.iter().all(|l| l.reachability == Reachability::Unknown));
    assert!(mappings.is_empty());
}

#[tokio::test]
async fn test_mappings_require_both_protocols() {
    let (server, gateway) = setup().await;
    mount_modern(&server).await;
    Mock::given(method("GET"))
        .and(path("/api/app-key/lights"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let err = Reconciler::new(&gateway).mappings().await.unwrap_err();
    assert!(matches!(err, CoreError::HttpStatus { status: 500, .. }));
}

// ── Serial addition ─────────────────────────────────────────────────

#[tokio::test]
async fn test_serial_search_reports_new_lights() {
    let (server, gateway) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/app-key/lights"))
        .and(body_json(json!({"deviceid": ["0A0B0C"]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"success": {"/lights": "Searching for new devices"}}
        ])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/app-key/lights/new"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"lastscan": "active"})))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/app-key/lights/new"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "7": {"name": "Hue color lamp 7"},
            "lastscan": "2026-10-16T19:00:00"
        })))
        .mount(&server)
        .await;

    let found = Reconciler::new(&gateway).add_by_serial("0a:0b-0c").await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].legacy_id, "7");
    assert_eq!(found[0].serial, "0A0B0C");
    assert_eq!(found[0].source, SerialMatchSource::Search);
}

#[tokio::test]
async fn test_serial_falls_back_to_existing_lights() {
    let (server, gateway) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/app-key/lights"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"success": {"/lights": "Searching for new devices"}}
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/app-key/lights/new"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"lastscan": "2026-10-16T19:00:00"})),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/app-key/lights"))
        .respond_with(ResponseTemplate::new(200).set_body_json(legacy_lights()))
        .mount(&server)
        .await;

    let found = Reconciler::new(&gateway).add_by_serial("0A0B0C").await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].legacy_id, "3");
    assert_eq!(found[0].source, SerialMatchSource::Existing);
}

#[tokio::test]
async fn test_serial_not_found_after_timeout() {
    let (server, gateway) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/app-key/lights"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"success": {"/lights": "Searching for new devices"}}
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/app-key/lights/new"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"lastscan": "active"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/app-key/lights"))
        .respond_with(ResponseTemplate::new(200).set_body_json(legacy_lights()))
        .mount(&server)
        .await;

    let err = Reconciler::new(&gateway).add_by_serial("FFEE11").await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_invalid_serial_makes_no_request() {
    let (server, gateway) = setup().await;

    let err = Reconciler::new(&gateway).add_by_serial("12345").await.unwrap_err();
    assert!(matches!(err, CoreError::InvalidSerial { .. }));
    assert!(server.received_requests().await.unwrap().is_empty());
}
