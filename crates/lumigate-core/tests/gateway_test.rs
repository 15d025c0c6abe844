// Integration tests for `GatewayClient` against a wiremock bridge.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use futures_util::future::join_all;
use pretty_assertions::assert_eq;
use secrecy::ExposeSecret;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use url::Url;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

use lumigate_api::Session;
use lumigate_core::{
    BatchItem, Bridge, ClientSettings, CoreError, CredentialRepository, Credentials,
    GatewayClient, LightUpdate, MemoryCredentialStore, ResourceKind,
};

const BRIDGE_ID: &str = "001788FFFE0A0B0C";

// ── Helpers ─────────────────────────────────────────────────────────

fn test_settings() -> ClientSettings {
    ClientSettings {
        resource_interval: Duration::from_millis(100),
        group_interval: Duration::from_millis(200),
        retry_base_delay: Duration::from_millis(10),
        blink_interval: Duration::from_millis(50),
        pairing_poll_interval: Duration::from_millis(20),
        request_timeout: Duration::from_secs(2),
        ..ClientSettings::default()
    }
}

fn session_for(server: &MockServer) -> Session {
    let base = Url::parse(&format!("{}/", server.uri())).unwrap();
    Session::with_clients(
        reqwest::Client::new(),
        reqwest::Client::new(),
        base.clone(),
        base,
        Duration::from_secs(2),
    )
}

async fn setup_with(
    store: MemoryCredentialStore,
) -> (MockServer, GatewayClient, Arc<MemoryCredentialStore>) {
    let server = MockServer::start().await;
    let store = Arc::new(store);
    let bridge = Bridge::manual(BRIDGE_ID, "127.0.0.1", server.address().port());
    let gateway = GatewayClient::with_session(
        bridge,
        session_for(&server),
        test_settings(),
        store.clone(),
    )
    .unwrap();
    (server, gateway, store)
}

async fn setup() -> (MockServer, GatewayClient) {
    let store = MemoryCredentialStore::new().with_entry(BRIDGE_ID, Credentials::new("app-key"));
    let (server, gateway, _) = setup_with(store).await;
    (server, gateway)
}

fn ok_refs(id: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "errors": [],
        "data": [{"rid": id, "rtype": "light"}]
    }))
}

fn light_body(id: &str, on: bool) -> serde_json::Value {
    json!({
        "errors": [],
        "data": [{
            "id": id,
            "type": "light",
            "owner": {"rid": "dev-1", "rtype": "device"},
            "metadata": {"name": "Desk", "archetype": "sultan_bulb"},
            "on": {"on": on},
            "dimming": {"brightness": 40.0},
            "color_temperature": {"mirek": 366}
        }]
    })
}

async fn requests_with_method(server: &MockServer, verb: &str) -> Vec<wiremock::Request> {
    server
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .filter(|r| r.method.as_str() == verb)
        .collect()
}

/// Arrival times of every request a responder has answered.
#[derive(Clone, Default)]
struct Arrivals(Arc<Mutex<Vec<Instant>>>);

impl Arrivals {
    fn record(&self) -> usize {
        let mut stamps = self.0.lock().unwrap();
        stamps.push(Instant::now());
        stamps.len()
    }

    fn gaps(&self) -> Vec<Duration> {
        let stamps = self.0.lock().unwrap();
        stamps.windows(2).map(|w| w[1] - w[0]).collect()
    }
}

/// Answers the first `failures` requests with 503, the rest with `ok`.
fn flaky(
    arrivals: &Arrivals,
    failures: usize,
    ok: ResponseTemplate,
) -> impl Fn(&Request) -> ResponseTemplate + Send + Sync + 'static {
    let arrivals = arrivals.clone();
    move |_: &Request| {
        if arrivals.record() <= failures {
            ResponseTemplate::new(503)
        } else {
            ok.clone()
        }
    }
}

// Network jitter between the throttle and the mock.
const SLACK: Duration = Duration::from_millis(20);

fn assert_spaced(gaps: &[Duration], interval: Duration) {
    for gap in gaps {
        assert!(*gap + SLACK >= interval, "gap {gap:?} below {interval:?}: {gaps:?}");
    }
}

// ── Authentication ──────────────────────────────────────────────────

#[tokio::test]
async fn test_unpaired_calls_fail_without_network() {
    let (server, gateway, _) = setup_with(MemoryCredentialStore::new()).await;

    let err = gateway.list_lights().await.unwrap_err();
    assert!(matches!(err, CoreError::NotAuthenticated { ref bridge_id } if bridge_id == BRIDGE_ID));
    assert!(err.is_auth_error());

    let err = gateway
        .update_light("a1", &LightUpdate::new().on(true))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::NotAuthenticated { .. }));

    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_pairing_persists_credentials() {
    let (server, gateway, store) = setup_with(MemoryCredentialStore::new()).await;

    Mock::given(method("POST"))
        .and(path("/api"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"success": {"username": "fresh-key", "clientkey": "AABBCC"}}
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/clip/v2/resource/light"))
        .and(header("hue-application-key", "fresh-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"errors": [], "data": []})))
        .expect(1)
        .mount(&server)
        .await;

    assert!(!gateway.is_paired().await);
    gateway.pair("lumigate#test").await.unwrap();
    assert!(gateway.is_paired().await);

    let stored = store.get(&BRIDGE_ID.to_lowercase()).unwrap().unwrap();
    assert_eq!(stored.token.expose_secret(), "fresh-key");

    assert!(gateway.list_lights().await.unwrap().is_empty());

    gateway.forget().await.unwrap();
    assert!(!gateway.is_paired().await);
    assert!(store.get(BRIDGE_ID).unwrap().is_none());
}

#[tokio::test]
async fn test_pair_until_confirmed_stops_on_cancel() {
    let (server, gateway, _) = setup_with(MemoryCredentialStore::new()).await;

    Mock::given(method("POST"))
        .and(path("/api"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"error": {"type": 101, "address": "", "description": "link button not pressed"}}
        ])))
        .mount(&server)
        .await;

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(150)).await;
        trigger.cancel();
    });

    let err = gateway
        .pair_until_confirmed("lumigate#test", &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Cancelled));
    assert!(server.received_requests().await.unwrap().len() >= 2);
}

#[tokio::test]
async fn test_pair_until_confirmed_returns_once_pressed() {
    let (server, gateway, _) = setup_with(MemoryCredentialStore::new()).await;

    Mock::given(method("POST"))
        .and(path("/api"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"error": {"type": 101, "address": "", "description": "link button not pressed"}}
        ])))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"success": {"username": "pressed-key"}}
        ])))
        .mount(&server)
        .await;

    let creds = gateway
        .pair_until_confirmed("lumigate#test", &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(creds.token.expose_secret(), "pressed-key");
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
}

// ── Throttling ──────────────────────────────────────────────────────

#[tokio::test]
async fn test_concurrent_updates_are_spaced() {
    let (server, gateway) = setup().await;

    Mock::given(method("PUT"))
        .and(path("/clip/v2/resource/light/a1"))
        .respond_with(ok_refs("a1"))
        .expect(5)
        .mount(&server)
        .await;

    let update = LightUpdate::new().brightness(30.0);
    let start = Instant::now();
    let results = join_all((0..5).map(|_| gateway.update_light("a1", &update))).await;
    let elapsed = start.elapsed();

    assert!(results.iter().all(Result::is_ok));
    // Five dispatches at 100 ms spacing: the last goes out >= 400 ms
    // after the first.
    assert!(elapsed >= Duration::from_millis(400), "took {elapsed:?}");
}

#[tokio::test]
async fn test_retried_group_update_waits_for_group_slot() {
    let (server, gateway) = setup().await;
    let arrivals = Arrivals::default();

    Mock::given(method("PUT"))
        .and(path("/clip/v2/resource/grouped_light/g1"))
        .respond_with(flaky(&arrivals, 1, ok_refs("g1")))
        .mount(&server)
        .await;

    gateway
        .update(ResourceKind::GroupedLight, "g1", &json!({"on": {"on": true}}))
        .await
        .unwrap();

    let gaps = arrivals.gaps();
    assert_eq!(gaps.len(), 1);
    assert_spaced(&gaps, gateway.settings().group_interval);
}

#[tokio::test]
async fn test_retried_light_update_waits_for_resource_slot() {
    let (server, gateway) = setup().await;
    let arrivals = Arrivals::default();

    Mock::given(method("PUT"))
        .and(path("/clip/v2/resource/light/a1"))
        .respond_with(flaky(&arrivals, 2, ok_refs("a1")))
        .mount(&server)
        .await;

    gateway
        .update_light("a1", &LightUpdate::new().on(true))
        .await
        .unwrap();

    let gaps = arrivals.gaps();
    assert_eq!(gaps.len(), 2);
    assert_spaced(&gaps, gateway.settings().resource_interval);
}

#[tokio::test]
async fn test_batch_update_continues_past_failures() {
    let (server, gateway) = setup().await;
    let arrivals = Arrivals::default();

    let recorder = arrivals.clone();
    Mock::given(method("PUT"))
        .respond_with(move |request: &Request| {
            recorder.record();
            match request.url.path().rsplit('/').next() {
                Some("missing") => ResponseTemplate::new(404).set_body_json(json!({
                    "errors": [{"description": "Not Found"}], "data": []
                })),
                Some(id) => ok_refs(id),
                None => ResponseTemplate::new(400),
            }
        })
        .mount(&server)
        .await;

    let items: Vec<BatchItem> = ["g1", "missing", "g2"]
        .into_iter()
        .map(|id| BatchItem {
            kind: ResourceKind::GroupedLight,
            id: id.into(),
            body: json!({"on": {"on": false}}),
        })
        .collect();

    let outcome = gateway.batch_update(&items).await.unwrap();
    assert_eq!(outcome.applied, ["g1", "g2"]);
    assert_eq!(outcome.failed.len(), 1);
    assert_eq!(outcome.failed[0].0, "missing");
    assert!(outcome.failed[0].1.is_not_found());
    assert!(!outcome.is_complete());

    // Group items are bulk mutations: one group interval apart.
    let gaps = arrivals.gaps();
    assert_eq!(gaps.len(), 2);
    assert_spaced(&gaps, gateway.settings().group_interval);
}

// ── Retries ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_put_retries_on_overload() {
    let (server, gateway) = setup().await;

    Mock::given(method("PUT"))
        .and(path("/clip/v2/resource/light/a1"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/clip/v2/resource/light/a1"))
        .respond_with(ok_refs("a1"))
        .mount(&server)
        .await;

    gateway
        .update_light("a1", &LightUpdate::new().on(true))
        .await
        .unwrap();
    assert_eq!(requests_with_method(&server, "PUT").await.len(), 3);
}

#[tokio::test]
async fn test_post_is_never_retried() {
    let (server, gateway) = setup().await;

    Mock::given(method("POST"))
        .and(path("/clip/v2/resource/scene"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = gateway
        .create(ResourceKind::Scene, &json!({"metadata": {"name": "Evening"}}))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Overloaded));
    assert_eq!(requests_with_method(&server, "POST").await.len(), 1);
}

#[tokio::test]
async fn test_empty_update_is_rejected_locally() {
    let (server, gateway) = setup().await;

    let err = gateway.update_light("a1", &LightUpdate::new()).await.unwrap_err();
    assert!(matches!(err, CoreError::ValidationFailed { .. }));
    assert!(server.received_requests().await.unwrap().is_empty());
}

// ── Blink ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_blink_restores_previous_state() {
    let (server, gateway) = setup().await;

    Mock::given(method("GET"))
        .and(path("/clip/v2/resource/light/a1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(light_body("a1", true)))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/clip/v2/resource/light/a1"))
        .and(body_json(json!({"on": {"on": false}})))
        .respond_with(ok_refs("a1"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/clip/v2/resource/light/a1"))
        .and(body_json(json!({
            "on": {"on": true},
            "dimming": {"brightness": 40.0},
            "color_temperature": {"mirek": 366}
        })))
        .respond_with(ok_refs("a1"))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = gateway.blink("a1").await.unwrap();
    assert!(outcome.flashed());
    assert!(outcome.restored());
    assert_eq!(outcome.light_id, "a1");
}

#[tokio::test]
async fn test_blink_reports_restore_failure() {
    let (server, gateway) = setup().await;

    Mock::given(method("GET"))
        .and(path("/clip/v2/resource/light/a1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(light_body("a1", false)))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/clip/v2/resource/light/a1"))
        .and(body_json(json!({"on": {"on": true}, "dimming": {"brightness": 100.0}})))
        .respond_with(ok_refs("a1"))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/clip/v2/resource/light/a1"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "errors": [{"description": "internal error"}], "data": []
        })))
        .mount(&server)
        .await;

    let outcome = gateway.blink("a1").await.unwrap();
    assert!(!outcome.restored());
    assert!(matches!(
        outcome.restore_error,
        Some(CoreError::HttpStatus { status: 500, .. })
    ));
}

#[tokio::test]
async fn test_blink_reports_both_failures() {
    let (server, gateway) = setup().await;

    Mock::given(method("GET"))
        .and(path("/clip/v2/resource/light/a1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(light_body("a1", true)))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/clip/v2/resource/light/a1"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "errors": [{"description": "device is busy"}], "data": []
        })))
        .mount(&server)
        .await;

    let outcome = gateway.blink("a1").await.unwrap();
    assert!(!outcome.flashed());
    assert!(!outcome.restored());
    assert!(matches!(
        outcome.transient_error,
        Some(CoreError::ConflictingResourceState { .. })
    ));
    assert!(matches!(
        outcome.restore_error,
        Some(CoreError::ConflictingResourceState { .. })
    ));
    // One transient attempt and one restore attempt; 409 is not retried.
    assert_eq!(requests_with_method(&server, "PUT").await.len(), 2);
}

#[tokio::test]
async fn test_blink_aborts_when_read_fails() {
    let (server, gateway) = setup().await;

    Mock::given(method("GET"))
        .and(path("/clip/v2/resource/light/gone"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = gateway.blink("gone").await.unwrap_err();
    assert!(err.is_not_found());
    assert!(requests_with_method(&server, "PUT").await.is_empty());
}

// ── Firmware and legacy operations ──────────────────────────────────

#[tokio::test]
async fn test_firmware_check() {
    let (server, gateway) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/0/config"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "Bridge",
            "bridgeid": BRIDGE_ID,
            "modelid": "BSB002",
            "apiversion": "1.39.0"
        })))
        .mount(&server)
        .await;

    let err = gateway.check_firmware().await.unwrap_err();
    assert!(matches!(
        err,
        CoreError::FirmwareTooOld { ref found, ref required } if found == "1.39.0" && required == "1.46.0"
    ));
}

#[tokio::test]
async fn test_touchlink_uses_legacy_config() {
    let (server, gateway) = setup().await;

    Mock::given(method("PUT"))
        .and(path("/api/app-key/config"))
        .and(body_json(json!({"touchlink": true})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"success": {"/config/touchlink": true}}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    gateway.touchlink().await.unwrap();
}
