//! Tests for the HTTP module

use super::*;
use crate::types::Method;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn request_to(server: &MockServer, method: Method, path: &str) -> HttpRequest {
    let (scheme, host, path) = parse_raw_url(&format!("{}{}", server.uri(), path)).unwrap();
    HttpRequest {
        method,
        scheme,
        host,
        path,
        headers: vec![],
        cookies: vec![],
        query_parameters: vec![],
        body_text: None,
        body_json: None,
        proxy: None,
        timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
    }
}

#[test]
fn test_header_merge_is_case_insensitive() {
    let merged = merge_headers(
        &[HttpHeader::new("Content-Type", "a")],
        &[HttpHeader::new("content-type", "b")],
    );

    assert_eq!(merged.len(), 1);
    assert_eq!(merged[0].name, "content-type");
    assert_eq!(merged[0].value(), "a, b");
}

#[test]
fn test_header_merge_deduplicates_values() {
    let merged = merge_headers(
        &[HttpHeader::new("Authorization", "Bearer x")],
        &[
            HttpHeader::new("authorization", "Bearer x"),
            HttpHeader::new("X-Other", "1"),
        ],
    );

    assert_eq!(merged.len(), 2);
    assert_eq!(merged[0].values, vec!["Bearer x".to_string()]);
    assert_eq!(merged[1].name, "X-Other");
}

#[test]
fn test_cookie_merge_is_case_sensitive() {
    let merged = merge_cookies(
        &[HttpCookie::new("session", "a")],
        &[HttpCookie::new("Session", "b")],
    );
    assert_eq!(merged.len(), 2);
}

#[test]
fn test_query_parameter_merge() {
    let merged = merge_query_parameters(
        &[HttpQueryParameter::new("token", "a")],
        &[HttpQueryParameter::new("token", "b")],
    );
    assert_eq!(merged.len(), 1);
    assert_eq!(merged[0].value(), "a,b");
}

#[test]
fn test_merge_bodies_deep_overlay_wins() {
    let base = json!({"user": {"name": "a", "role": "admin"}, "keep": 1});
    let overlay = json!({"user": {"name": "b"}, "extra": true});

    let merged = merge_bodies(Some(&base), Some(&overlay)).unwrap();
    assert_eq!(
        merged,
        json!({"user": {"name": "b", "role": "admin"}, "keep": 1, "extra": true})
    );
}

#[test]
fn test_merge_bodies_non_objects() {
    assert_eq!(merge_bodies(None, None), None);
    assert_eq!(merge_bodies(Some(&json!("a=b")), None), Some(json!("a=b")));
    assert_eq!(merge_bodies(None, Some(&json!({"k": 1}))), Some(json!({"k": 1})));
    assert_eq!(
        merge_bodies(Some(&json!("raw")), Some(&json!({"k": 1}))),
        Some(json!({"k": 1}))
    );
}

#[test]
fn test_parse_raw_url() {
    let (scheme, host, path) = parse_raw_url("https://api.example.com/v1/login").unwrap();
    assert_eq!(scheme, Scheme::Https);
    assert_eq!(host, "api.example.com");
    assert_eq!(path, "/v1/login");

    let (scheme, host, path) = parse_raw_url("http://127.0.0.1:8080").unwrap();
    assert_eq!(scheme, Scheme::Http);
    assert_eq!(host, "127.0.0.1:8080");
    assert_eq!(path, "/");
}

#[test]
fn test_parse_raw_query() {
    let query = parse_raw_query("https://example.com/login?next=%2Fhome&tag=a&tag=b").unwrap();
    assert_eq!(
        query,
        vec![
            HttpQueryParameter::new("next", "/home"),
            HttpQueryParameter {
                name: "tag".to_string(),
                values: vec!["a".to_string(), "b".to_string()],
            },
        ]
    );
    assert!(parse_raw_query("https://example.com/").unwrap().is_empty());
}

#[test]
fn test_parse_raw_url_rejects_other_schemes() {
    assert!(parse_raw_url("ftp://example.com/file").is_err());
    assert!(parse_raw_url("not a url").is_err());
}

#[test]
fn test_failure_reason_display() {
    assert_eq!(FailureReason::ConnectionError.to_string(), "connection_error");
    assert_eq!(
        TransportError::Timeout("slow".to_string()).reason(),
        FailureReason::Timeout
    );
}

#[tokio::test]
async fn test_reqwest_transport_sends_request_parts() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/login"))
        .and(header("X-Client", "scanner"))
        .and(header("Cookie", "lang=en"))
        .and(query_param("tenant", "acme"))
        .and(body_json(json!({"user": "alice"})))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("X-Token", "abc")
                .insert_header("Set-Cookie", "sid=xyz; Path=/")
                .set_body_json(json!({"ok": true})),
        )
        .mount(&mock_server)
        .await;

    let mut request = request_to(&mock_server, Method::POST, "/login");
    request.headers = vec![HttpHeader::new("X-Client", "scanner")];
    request.cookies = vec![HttpCookie::new("lang", "en")];
    request.query_parameters = vec![HttpQueryParameter::new("tenant", "acme")];
    request.body_text = Some(r#"{"user":"alice"}"#.to_string());
    request.body_json = Some(json!({"user": "alice"}));

    let response = ReqwestTransport::new().send(&request).await.unwrap();

    assert_eq!(response.status_code, 200);
    assert_eq!(response.reason, "OK");
    assert_eq!(response.body_json, Some(json!({"ok": true})));
    assert!(response
        .headers
        .iter()
        .any(|h| h.name_matches("x-token") && h.value() == "abc"));
    assert_eq!(response.cookies, vec![HttpCookie::new("sid", "xyz")]);
}

#[tokio::test]
async fn test_reqwest_transport_returns_error_statuses() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_string("nope"))
        .mount(&mock_server)
        .await;

    let request = request_to(&mock_server, Method::GET, "/missing");
    let response = ReqwestTransport::new().send(&request).await.unwrap();

    assert_eq!(response.status_code, 404);
    assert!(response.is_error());
    assert_eq!(response.body_text.as_deref(), Some("nope"));
    assert_eq!(response.body_json, None);
}

#[tokio::test]
async fn test_reqwest_transport_classifies_timeout() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&mock_server)
        .await;

    let mut request = request_to(&mock_server, Method::GET, "/slow");
    request.timeout_seconds = 1;

    let err = ReqwestTransport::new().send(&request).await.unwrap_err();
    assert_eq!(err.reason(), FailureReason::Timeout);
}

#[tokio::test]
async fn test_reqwest_transport_classifies_connection_error() {
    let request = HttpRequest {
        method: Method::GET,
        scheme: Scheme::Http,
        host: "127.0.0.1:1".to_string(),
        path: "/".to_string(),
        headers: vec![],
        cookies: vec![],
        query_parameters: vec![],
        body_text: None,
        body_json: None,
        proxy: None,
        timeout_seconds: 2,
    };

    let err = ReqwestTransport::new().send(&request).await.unwrap_err();
    assert_eq!(err.reason(), FailureReason::ConnectionError);
}
