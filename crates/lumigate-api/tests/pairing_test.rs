// Pairing against a mock bridge: link button not pressed, then pressed.

use std::time::Duration;

use secrecy::ExposeSecret;
use serde_json::json;
use url::Url;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use lumigate_api::{Error, Session};

async fn setup() -> (MockServer, Session) {
    let server = MockServer::start().await;
    let base = Url::parse(&format!("{}/", server.uri())).unwrap();
    let session = Session::with_clients(
        reqwest::Client::new(),
        reqwest::Client::new(),
        base.clone(),
        base,
        Duration::from_secs(2),
    );
    (server, session)
}

#[tokio::test]
async fn test_pair_before_and_after_button_press() {
    let (server, session) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api"))
        .and(body_json(json!({"devicetype": "lumigate#test", "generateclientkey": true})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"error": {"type": 101, "address": "", "description": "link button not pressed"}}
        ])))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"success": {"username": "83b7780291a6ceffbe0bd049104df", "clientkey": "33DDAD"}}
        ])))
        .mount(&server)
        .await;

    let first = session.pair("lumigate#test").await.unwrap_err();
    assert!(matches!(first, Error::PairingNotConfirmed));

    let creds = session.pair("lumigate#test").await.unwrap();
    assert_eq!(creds.token.expose_secret(), "83b7780291a6ceffbe0bd049104df");
    assert_eq!(
        creds.client_key.as_ref().map(|k| k.expose_secret().to_owned()),
        Some("33DDAD".to_owned())
    );
}

#[tokio::test]
async fn test_pair_other_error_is_fatal() {
    let (server, session) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"error": {"type": 7, "address": "/devicetype", "description": "invalid value"}}
        ])))
        .mount(&server)
        .await;

    let err = session.pair("lumigate#test").await.unwrap_err();
    assert!(matches!(err, Error::Unknown(_)));
}

#[tokio::test]
async fn test_pair_empty_response() {
    let (server, session) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let err = session.pair("lumigate#test").await.unwrap_err();
    assert!(matches!(err, Error::InvalidServerResponse(_)));
}
