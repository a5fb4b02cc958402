#![allow(clippy::unwrap_used)]
// Integration tests for `ApiClient` using wiremock.

use serde_json::json;
use url::Url;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use tether_api::{ApiClient, Endpoint, Error, TransportConfig};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, ApiClient) {
    let server = MockServer::start().await;
    let base_url = Url::parse(&server.uri()).unwrap();
    let client = ApiClient::with_client(reqwest::Client::new(), base_url);
    (server, client)
}

// ── Fetch tests ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_fetch_returns_json_body() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/account/btc/transactions"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([{ "id": "tx1" }, { "id": "tx2" }])),
        )
        .mount(&server)
        .await;

    let value = client
        .fetch(&Endpoint::from("account/btc/transactions"))
        .await
        .unwrap();

    assert_eq!(value, json!([{ "id": "tx1" }, { "id": "tx2" }]));
}

#[tokio::test]
async fn test_fetch_scalar_value() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/account/btc/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!("accountSynced")))
        .mount(&server)
        .await;

    let value = client.fetch(&Endpoint::from("account/btc/status")).await.unwrap();
    assert_eq!(value, json!("accountSynced"));
}

#[tokio::test]
async fn test_fetch_not_found() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_string("no such endpoint"))
        .mount(&server)
        .await;

    let err = client.fetch(&Endpoint::from("missing")).await.unwrap_err();
    assert!(err.is_not_found(), "expected 404, got: {err:?}");
}

#[tokio::test]
async fn test_fetch_unauthorized() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/devices/registered"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let result = client.fetch(&Endpoint::from("devices/registered")).await;
    assert!(
        matches!(result, Err(Error::Unauthorized)),
        "expected Unauthorized, got: {result:?}"
    );
}

#[tokio::test]
async fn test_fetch_invalid_json() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/broken"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{not json"))
        .mount(&server)
        .await;

    let result = client.fetch(&Endpoint::from("broken")).await;
    assert!(
        matches!(result, Err(Error::Deserialization { ref body, .. }) if body == "{not json"),
        "expected Deserialization, got: {result:?}"
    );
}

#[tokio::test]
async fn test_token_sent_as_bearer() {
    let server = MockServer::start().await;
    let transport =
        TransportConfig::default().with_token(secrecy::SecretString::from("s3cret"));
    let client = ApiClient::new(Url::parse(&server.uri()).unwrap(), &transport).unwrap();

    Mock::given(method("GET"))
        .and(path("/api/version"))
        .and(header("Authorization", "Bearer s3cret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!("4.2.0")))
        .mount(&server)
        .await;

    let value = client.fetch(&Endpoint::from("version")).await.unwrap();
    assert_eq!(value, json!("4.2.0"));
}
