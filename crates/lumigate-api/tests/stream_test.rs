// Event stream against a mock bridge that sends a finite body.

use std::time::Duration;

use secrecy::SecretString;
use serde_json::json;
use url::Url;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use lumigate_api::stream::EventStream;
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

fn sse_body() -> String {
    let first = json!([{
        "creationtime": "2024-05-01T10:00:00Z",
        "id": "e1",
        "type": "update",
        "data": [
            {"id": "l1", "type": "light", "on": {"on": false}},
            {"id": "l2", "type": "light", "dimming": {"brightness": 12.5}}
        ]
    }]);
    let second = json!([{
        "creationtime": "2024-05-01T10:00:01Z",
        "id": "e2",
        "type": "update",
        "data": [{"id": "z1", "type": "zigbee_connectivity", "status": "connectivity_issue"}]
    }]);
    format!(": hi\n\nid: 1:0\ndata: {first}\n\nid: 2:0\ndata: {second}\n\nid: 3:0\ndata: [{{\"partial")
}

#[tokio::test]
async fn test_events_in_order_then_closed() {
    let (server, session) = setup().await;

    Mock::given(method("GET"))
        .and(path("/eventstream/clip/v2"))
        .and(header("hue-application-key", "app-key"))
        .and(header("accept", "text/event-stream"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string(sse_body()),
        )
        .mount(&server)
        .await;

    let mut stream = EventStream::open(&session, &SecretString::from("app-key"))
        .await
        .unwrap();

    let mut ids = Vec::new();
    while let Some(event) = stream.recv().await {
        ids.push((event.id.clone(), event.kind.clone()));
    }

    assert_eq!(
        ids,
        [
            ("l1".to_owned(), "light".to_owned()),
            ("l2".to_owned(), "light".to_owned()),
            ("z1".to_owned(), "zigbee_connectivity".to_owned()),
        ]
    );

    stream.closed().await;
    assert!(stream.is_finished());
}

#[tokio::test]
async fn test_open_surfaces_auth_failure() {
    let (server, session) = setup().await;

    Mock::given(method("GET"))
        .and(path("/eventstream/clip/v2"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let result = EventStream::open(&session, &SecretString::from("bad")).await;
    assert!(matches!(result, Err(Error::NotAuthenticated)));
}

#[tokio::test]
async fn test_cancel_stops_reader() {
    let (server, session) = setup().await;

    Mock::given(method("GET"))
        .and(path("/eventstream/clip/v2"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(": hi\n\n")
                .set_delay(Duration::from_millis(50)),
        )
        .mount(&server)
        .await;

    let mut stream = EventStream::open(&session, &SecretString::from("k"))
        .await
        .unwrap();
    stream.cancel();
    stream.closed().await;
    assert!(stream.recv().await.is_none());
}
