//! Tests for the extraction module

use super::*;
use pretty_assertions::assert_eq;
use serde_json::json;
use test_case::test_case;

fn body(name: &str, key: &str) -> HttpExtraction {
    HttpExtraction::Body {
        name: name.to_string(),
        key: key.to_string(),
    }
}

#[test]
fn test_extraction_deserializes_by_location() {
    let extraction: HttpExtraction =
        serde_json::from_value(json!({"location": "cookie", "key": "sid", "name": "session"}))
            .unwrap();
    assert_eq!(
        extraction,
        HttpExtraction::Cookie {
            name: "session".to_string(),
            key: "sid".to_string(),
        }
    );
    assert_eq!(extraction.location(), "cookie");
}

#[test]
fn test_search_prefers_shallow_key() {
    let value = json!({"a": {"b": {"token": "x"}}, "token": "y"});
    assert_eq!(search_key(&value, "token"), Some(&json!("y")));
}

#[test]
fn test_search_is_depth_first_in_declaration_order() {
    let value = json!({"a": {"b": {"token": "x"}}, "c": {"token": "z"}});
    assert_eq!(search_key(&value, "token"), Some(&json!("x")));

    let value = json!({"c": {"token": "z"}, "a": {"b": {"token": "x"}}});
    assert_eq!(search_key(&value, "token"), Some(&json!("z")));
}

#[test]
fn test_search_descends_into_arrays() {
    let value = json!({"data": [{"id": 1}, {"session": {"token": "in-array"}}]});
    assert_eq!(search_key(&value, "token"), Some(&json!("in-array")));
}

#[test]
fn test_search_skips_null() {
    let value = json!({"token": null, "nested": {"token": "real"}});
    assert_eq!(search_key(&value, "token"), Some(&json!("real")));
}

#[test_case(json!({"token": 42}), "42" ; "number")]
#[test_case(json!({"token": true}), "true" ; "boolean")]
#[test_case(json!({"token": {"a": 1}}), "{\"a\":1}" ; "object")]
#[test_case(json!({"token": "plain"}), "plain" ; "string")]
fn test_body_values_are_stringified(payload: JsonValue, expected: &str) {
    let response = HttpResponse::new(200).with_json(payload);
    let outcome = extract(&response, &[body("t", "token")]);
    assert_eq!(outcome.variables, vec![Variable::new("t", expected)]);
}

#[test]
fn test_extract_header_and_cookie() {
    let response = HttpResponse::new(200)
        .with_header("x-csrf", "one")
        .with_header("X-Csrf", "two")
        .with_cookie("sid", "abc");

    let outcome = extract(
        &response,
        &[
            HttpExtraction::Header {
                name: "csrf".to_string(),
                key: "X-CSRF".to_string(),
            },
            HttpExtraction::Cookie {
                name: "session".to_string(),
                key: "sid".to_string(),
            },
        ],
    );

    assert_eq!(
        outcome.variables,
        vec![Variable::new("csrf", "one,two"), Variable::new("session", "abc")]
    );
    assert_eq!(outcome.events.count("extraction"), 2);
    assert!(outcome.misses.is_empty());
}

#[test]
fn test_cookie_match_is_case_sensitive() {
    let response = HttpResponse::new(200).with_cookie("SID", "abc");
    let outcome = extract(
        &response,
        &[HttpExtraction::Cookie {
            name: "session".to_string(),
            key: "sid".to_string(),
        }],
    );
    assert!(outcome.variables.is_empty());
    assert_eq!(outcome.misses.len(), 1);
}

#[test]
fn test_misses_produce_no_variables() {
    let response = HttpResponse::new(200).with_json(json!({"other": 1}));
    let outcome = extract(&response, &[body("token", "access_token")]);

    assert!(outcome.variables.is_empty());
    assert!(outcome.events.is_empty());
    assert_eq!(outcome.misses, vec![body("token", "access_token")]);
}

#[test]
fn test_body_extraction_requires_object_body() {
    let response = HttpResponse::new(200).with_json(json!([{"token": "x"}]));
    let outcome = extract(&response, &[body("token", "token")]);
    assert!(outcome.variables.is_empty());

    let mut text_only = HttpResponse::new(200);
    text_only.body_text = Some("token=x".to_string());
    let outcome = extract(&text_only, &[body("token", "token")]);
    assert!(outcome.variables.is_empty());
}
