// Engine over the HTTP/event-hub transport, with the backend mocked by wiremock.
#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use tether_api::{ApiClient, EventHub, TransportConfig};
use tether_core::{
    Action, EndpointResolver, EndpointsMapping, EngineOptions, ExposedState, Frame, Props, Remote,
    Subscribed,
};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, Remote) {
    let server = MockServer::start().await;
    let client = ApiClient::new(Url::parse(&server.uri()).unwrap(), &TransportConfig::default())
        .unwrap();
    let hub = EventHub::detached(CancellationToken::new());
    (server, Remote::new(client, hub))
}

fn render(state: &ExposedState) -> Value {
    Value::Object(state.values.clone())
}

// ── Tests ───────────────────────────────────────────────────────────

#[tokio::test]
async fn loads_over_http_and_applies_pushed_frames() {
    let (server, remote) = setup().await;
    Mock::given(method("GET"))
        .and(path("/api/account/btc/transactions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let mut engine = Subscribed::new(
        render,
        Arc::new(remote.clone()),
        EndpointResolver::fixed(
            EndpointsMapping::new().with("transactions", "account/btc/transactions"),
        ),
        EngineOptions::default(),
    );
    engine.mount(Props::new()).unwrap();

    let mut exposed = engine.watch();
    tokio::time::timeout(Duration::from_secs(5), async {
        while !engine.is_ready() {
            let msg = engine.next_inbound().await.unwrap();
            engine.dispatch(msg);
        }
    })
    .await
    .unwrap();
    assert!(exposed.changed().await.unwrap().is_ready());

    // Give the forwarding task a chance to subscribe to the hub.
    tokio::task::yield_now().await;
    remote.hub().publish(Frame::new(
        "account/btc/transactions",
        Action::Append,
        json!({ "id": "tx1" }),
    ));

    let msg = tokio::time::timeout(Duration::from_secs(5), engine.next_inbound())
        .await
        .unwrap()
        .unwrap();
    assert!(engine.dispatch(msg));
    assert_eq!(
        engine.render(),
        Some(json!({ "transactions": [{ "id": "tx1" }] }))
    );

    engine.teardown();
    remote.shutdown();
}

#[tokio::test]
async fn http_error_becomes_key_failure() {
    let (server, remote) = setup().await;
    Mock::given(method("GET"))
        .and(path("/api/devices/x/status"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let mut engine = Subscribed::new(
        render,
        Arc::new(remote),
        EndpointResolver::fixed(EndpointsMapping::new().with("status", "devices/x/status")),
        EngineOptions::default(),
    );
    engine.mount(Props::new()).unwrap();
    let msg = tokio::time::timeout(Duration::from_secs(5), engine.next_inbound())
        .await
        .unwrap()
        .unwrap();
    engine.dispatch(msg);

    let state = engine.exposed();
    assert!(state.is_ready());
    let failure = state.failure("status").unwrap();
    assert!(failure.message.contains("500"), "{}", failure.message);
}
