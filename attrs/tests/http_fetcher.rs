#![allow(clippy::unwrap_used)]
//! HTTP transport tests against a local mock server

use std::sync::Arc;
use std::time::Duration;

use lotto_attrs::{
    AttrsConfig, Engine, ErrorCategory, HttpPayloadFetcher, NumberRange, PayloadFetcher, TableKey,
    encode,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::Mock;
use wiremock::MockServer;
use wiremock::ResponseTemplate;
use wiremock::matchers::method;
use wiremock::matchers::path;
use wiremock::matchers::query_param;

const TS: i64 = 1_718_432_110;

fn fetcher_for(server: &MockServer) -> HttpPayloadFetcher {
    HttpPayloadFetcher::new(format!("{}/api/attribute", server.uri()), Duration::from_secs(2)).unwrap()
}

#[tokio::test]
async fn test_fetch_sends_year_and_range() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/attribute"))
        .and(query_param("year", "2024"))
        .and(query_param("number_type", "60"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "checkstr": "1718437",
            "timestamp": "1718432110",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let payload = fetcher_for(&server)
        .fetch(TableKey::new(2024, NumberRange::R60))
        .await
        .unwrap();

    assert_eq!(payload.checkstr, "1718437");
    assert_eq!(payload.timestamp, TS);
}

#[tokio::test]
async fn test_non_success_status_is_fetch_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = fetcher_for(&server)
        .fetch(TableKey::new(2024, NumberRange::R49))
        .await
        .unwrap_err();

    assert_eq!(err.category(), ErrorCategory::FetchError);
    assert!(err.to_string().contains("202449"));
}

#[tokio::test]
async fn test_malformed_body_is_fetch_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>busy</html>"))
        .mount(&server)
        .await;

    let err = fetcher_for(&server)
        .fetch(TableKey::new(2024, NumberRange::R49))
        .await
        .unwrap_err();

    assert_eq!(err.category(), ErrorCategory::FetchError);
}

#[tokio::test]
async fn test_slow_response_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_millis(500))
                .set_body_json(json!({ "checkstr": "", "timestamp": TS })),
        )
        .mount(&server)
        .await;

    let fetcher = HttpPayloadFetcher::new(server.uri(), Duration::from_millis(50)).unwrap();
    let err = fetcher
        .fetch(TableKey::new(2024, NumberRange::R49))
        .await
        .unwrap_err();

    assert_eq!(err.category(), ErrorCategory::FetchError);
}

#[tokio::test]
async fn test_engine_loads_over_http() {
    let server = MockServer::start().await;
    let document = r#"{"3":{"红":{"type":"波色","name":"红","content1":"07"},"绿":{"type":"波色","name":"绿","content1":"11"}}}"#;
    Mock::given(method("GET"))
        .and(path("/api/attribute"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "checkstr": encode(document, TS).unwrap(),
            "timestamp": TS,
        })))
        .expect(4)
        .mount(&server)
        .await;

    let cfg = AttrsConfig {
        endpoint: format!("{}/api/attribute", server.uri()),
        ..AttrsConfig::default()
    };
    let fetcher = HttpPayloadFetcher::from_config(&cfg).unwrap();
    let engine = Engine::with_fetcher(Arc::new(fetcher));

    assert!(engine.ensure_year_loaded(2024).await);
    assert_eq!(engine.color(11, NumberRange::R49, 2024), "绿");
    assert_eq!(engine.color(11, NumberRange::R60, 2023), "绿");
}
