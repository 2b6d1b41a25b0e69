//! Integration tests using wiremock to simulate HTTP servers.

use fetchwise::retry::RetryOn5xx;
use fetchwise::schema::{self, Issue, SerdeSchema};
use fetchwise::{
    BodyEncoding, CancellationToken, Error, ExecutionContext, Fetcher, FetcherErrorKind,
    FetcherOptions, QueryParams, SiteConfig,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use wiremock::matchers::{
    body_json, body_string, header, method, path, query_param, query_param_is_missing,
};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Debug, Serialize, Deserialize, PartialEq)]
struct Message {
    id: u64,
    body: String,
}

fn fetcher() -> Fetcher {
    Fetcher::builder()
        .site_config(SiteConfig::default())
        .build()
        .unwrap()
}

fn fast_retries(retries: u32) -> FetcherOptions {
    FetcherOptions::new()
        .retries(retries)
        .retry_delay(Duration::from_millis(10))
}

#[tokio::test]
async fn test_get_without_schema_returns_raw_json() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": 1, "body": "hi" }])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let url = format!("{}/api/v1/messages", mock_server.uri());
    let response = fetcher().get(&url, FetcherOptions::new(), None).await.unwrap();

    assert_eq!(response.data, json!([{ "id": 1, "body": "hi" }]));
    assert_eq!(response.status.as_u16(), 200);
    assert_eq!(response.attempts, 1);
    assert!(!response.was_retried());
}

#[tokio::test]
async fn test_get_with_schema_returns_typed_value() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": 1, "body": "hi" }])))
        .mount(&mock_server)
        .await;

    let url = format!("{}/api/v1/messages", mock_server.uri());
    let response = fetcher()
        .get(
            &url,
            FetcherOptions::new().schema(SerdeSchema::<Vec<Message>>::new()),
            None,
        )
        .await
        .unwrap();

    assert_eq!(
        response.data,
        vec![Message {
            id: 1,
            body: "hi".to_string()
        }]
    );
}

#[tokio::test]
async fn test_schema_mismatch_is_validation_error_on_first_attempt() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "unexpected": true })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let url = format!("{}/api/v1/messages", mock_server.uri());
    let result = fetcher()
        .get(
            &url,
            fast_retries(3).schema(SerdeSchema::<Vec<Message>>::new()),
            None,
        )
        .await;

    match result {
        Err(Error::Validation(err)) => {
            assert_eq!(err.attempt, Some(1));
            assert_eq!(err.url, url);
            assert!(!err.issues.is_empty());
            assert!(!err.problems.is_empty());
            assert_eq!(err.response_data, json!({ "unexpected": true }));
        }
        other => panic!("Expected ValidationError, got {:?}", other),
    }
}

#[tokio::test]
async fn test_custom_schema_reports_paths() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/profile"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "name": 42 })))
        .mount(&mock_server)
        .await;

    let name = schema::from_fn(|value: &Value| {
        value
            .get("name")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| Issue::new(vec!["name".into()], "expected string").into())
    });

    let url = format!("{}/profile", mock_server.uri());
    let err = fetcher()
        .get(&url, FetcherOptions::new().schema(name), None)
        .await
        .unwrap_err();

    match err {
        Error::Validation(err) => {
            assert_eq!(err.problems, "└─ [\"name\"]\n   └─ expected string");
        }
        other => panic!("Expected ValidationError, got {:?}", other),
    }
}

#[tokio::test]
async fn test_rate_limit_retried_until_budget_spent() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/x"))
        .respond_with(ResponseTemplate::new(429).set_body_string("Too Many Requests"))
        .expect(3)
        .mount(&mock_server)
        .await;

    let url = format!("{}/x", mock_server.uri());
    let result = fetcher().get(&url, fast_retries(2), None).await;

    match result {
        Err(Error::Fetcher(err)) => {
            assert_eq!(err.kind, FetcherErrorKind::HttpStatus);
            assert_eq!(err.status.map(|s| s.as_u16()), Some(429));
            assert_eq!(err.attempt, Some(3));
            assert!(err.message.contains("Rate limit exceeded"));
        }
        other => panic!("Expected FetcherError, got {:?}", other),
    }
}

#[tokio::test]
async fn test_client_errors_are_not_retried() {
    for status in [400u16, 401, 403, 404, 409, 422] {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(
                ResponseTemplate::new(status).set_body_json(json!({ "message": "nope" })),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let url = format!("{}/missing", mock_server.uri());
        let err = fetcher().get(&url, fast_retries(3), None).await.unwrap_err();

        assert_eq!(err.status().map(|s| s.as_u16()), Some(status));
        assert_eq!(err.attempt(), Some(1));
        assert_eq!(err.response_data(), Some(&json!({ "message": "nope" })));
        match err {
            Error::Fetcher(err) => assert_eq!(err.message, "nope"),
            other => panic!("Expected FetcherError, got {:?}", other),
        }
    }
}

#[tokio::test]
async fn test_server_errors_retried_until_success() {
    let mock_server = MockServer::start().await;
    let attempt_count = Arc::new(AtomicUsize::new(0));
    let attempt_count_clone = attempt_count.clone();

    // First two requests fail with 503, third succeeds
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(move |_req: &wiremock::Request| {
            let count = attempt_count_clone.fetch_add(1, Ordering::SeqCst);
            if count < 2 {
                ResponseTemplate::new(503).set_body_string("Service Unavailable")
            } else {
                ResponseTemplate::new(200).set_body_json(json!({ "ok": true }))
            }
        })
        .mount(&mock_server)
        .await;

    let url = format!("{}/flaky", mock_server.uri());
    let response = fetcher().get(&url, fast_retries(3), None).await.unwrap();

    assert_eq!(response.data, json!({ "ok": true }));
    assert_eq!(response.attempts, 3);
    assert!(response.was_retried());
    assert_eq!(attempt_count.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_attempts_never_exceed_budget() {
    for retries in 0..=3u32 {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/down"))
            .respond_with(ResponseTemplate::new(500))
            .expect(u64::from(retries) + 1)
            .mount(&mock_server)
            .await;

        let url = format!("{}/down", mock_server.uri());
        let err = fetcher().get(&url, fast_retries(retries), None).await.unwrap_err();

        assert_eq!(err.attempt(), Some(retries as usize + 1));
        assert_eq!(err.status().map(|s| s.as_u16()), Some(500));
    }
}

#[tokio::test]
async fn test_backoff_grows_exponentially() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/down"))
        .respond_with(ResponseTemplate::new(502))
        .expect(3)
        .mount(&mock_server)
        .await;

    let url = format!("{}/down", mock_server.uri());
    let start = Instant::now();
    let options = FetcherOptions::new()
        .retries(2)
        .retry_delay(Duration::from_millis(100));
    let _ = fetcher().get(&url, options, None).await;

    // 100ms + 200ms of backoff
    assert!(start.elapsed() >= Duration::from_millis(300));
}

#[tokio::test]
async fn test_timeout_is_classified() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/y"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "ok": true }))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&mock_server)
        .await;

    let url = format!("{}/y", mock_server.uri());
    let start = Instant::now();
    let err = fetcher()
        .get(
            &url,
            FetcherOptions::new().timeout(Duration::from_millis(50)),
            None,
        )
        .await
        .unwrap_err();

    assert!(start.elapsed() < Duration::from_millis(450));
    match err {
        Error::Fetcher(err) => {
            assert_eq!(err.kind, FetcherErrorKind::Timeout);
            assert_eq!(err.attempt, Some(1));
            assert_eq!(err.status, None);
        }
        other => panic!("Expected FetcherError, got {:?}", other),
    }
}

#[tokio::test]
async fn test_timeout_is_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/y"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
        .expect(2)
        .mount(&mock_server)
        .await;

    let url = format!("{}/y", mock_server.uri());
    let err = fetcher()
        .get(
            &url,
            fast_retries(1).timeout(Duration::from_millis(50)),
            None,
        )
        .await
        .unwrap_err();

    assert_eq!(err.kind(), Some(FetcherErrorKind::Timeout));
    assert_eq!(err.attempt(), Some(2));
}

#[tokio::test]
async fn test_post_json_body() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/z"))
        .and(header("content-type", "application/json"))
        .and(body_json(json!({ "a": 1 })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "ok": true })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let url = format!("{}/z", mock_server.uri());
    let response = fetcher()
        .post(&url, Some(&json!({ "a": 1 })), FetcherOptions::new(), None)
        .await
        .unwrap();

    assert_eq!(response.data, json!({ "ok": true }));
    assert_eq!(response.status.as_u16(), 201);
}

#[tokio::test]
async fn test_text_body_encoding() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/notes/1"))
        .and(header("content-type", "text/plain;charset=UTF-8"))
        .and(body_string("hello there"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "saved": true })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let url = format!("{}/notes/1", mock_server.uri());
    let response = fetcher()
        .put(
            &url,
            Some("hello there"),
            FetcherOptions::new().body_encoding(BodyEncoding::Text),
            None,
        )
        .await
        .unwrap();

    assert_eq!(response.data, json!({ "saved": true }));
}

#[tokio::test]
async fn test_caller_content_type_overrides_default() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PATCH"))
        .and(path("/items/7"))
        .and(header("content-type", "application/merge-patch+json"))
        .and(body_json(json!({ "title": "new" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": 7 })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let url = format!("{}/items/7", mock_server.uri());
    let options = FetcherOptions::new()
        .header("content-type", "application/merge-patch+json")
        .unwrap();
    let response = fetcher()
        .patch(&url, Some(&json!({ "title": "new" })), options, None)
        .await
        .unwrap();

    assert_eq!(response.data, json!({ "id": 7 }));
}

#[tokio::test]
async fn test_serialization_error_sends_nothing() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let mut body = std::collections::HashMap::new();
    body.insert((1, 2), "tuple keys are not valid JSON object keys");

    let url = format!("{}/z", mock_server.uri());
    let err = fetcher()
        .post(&url, Some(&body), fast_retries(3), None)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), Some(FetcherErrorKind::Serialization));
    assert_eq!(err.attempt(), None);
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_non_json_body_attaches_preview() {
    let mock_server = MockServer::start().await;
    let html = format!("<html>{}</html>", "x".repeat(400));

    Mock::given(method("GET"))
        .and(path("/page"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(html.clone(), "text/html"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let url = format!("{}/page", mock_server.uri());
    let err = fetcher().get(&url, FetcherOptions::new(), None).await.unwrap_err();

    match err {
        Error::Fetcher(err) => {
            assert_eq!(err.kind, FetcherErrorKind::Parse);
            assert_eq!(err.content_type.as_deref(), Some("text/html"));
            let preview = err.body_preview.unwrap();
            assert_eq!(preview.chars().count(), 200);
            assert!(html.starts_with(&preview));
        }
        other => panic!("Expected FetcherError, got {:?}", other),
    }
}

#[tokio::test]
async fn test_implicit_decode_mismatch_is_parse_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/message"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "one" })))
        .mount(&mock_server)
        .await;

    let url = format!("{}/message", mock_server.uri());
    let err = fetcher()
        .get(&url, FetcherOptions::new().decode_as::<Message>(), None)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), Some(FetcherErrorKind::Parse));
    assert_eq!(err.response_data(), Some(&json!({ "id": "one" })));
}

#[tokio::test]
async fn test_empty_responses_decode_as_null() {
    let mock_server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/items/1"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&mock_server)
        .await;

    Mock::given(method("HEAD"))
        .and(path("/items/1"))
        .respond_with(ResponseTemplate::new(200).insert_header("x-count", "3"))
        .mount(&mock_server)
        .await;

    let url = format!("{}/items/1", mock_server.uri());
    let deleted = fetcher()
        .delete(&url, FetcherOptions::new(), None)
        .await
        .unwrap();
    assert_eq!(deleted.data, Value::Null);
    assert_eq!(deleted.status.as_u16(), 204);

    let head = fetcher().head(&url, FetcherOptions::new(), None).await.unwrap();
    assert_eq!(head.data, Value::Null);
    assert_eq!(head.header("x-count"), Some("3"));
}

#[tokio::test]
async fn test_options_request() {
    let mock_server = MockServer::start().await;

    Mock::given(method("OPTIONS"))
        .and(path("/api"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "methods": ["GET"] })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let url = format!("{}/api", mock_server.uri());
    let response = fetcher().options(&url, FetcherOptions::new(), None).await.unwrap();
    assert_eq!(response.data["methods"], json!(["GET"]));
}

#[tokio::test]
async fn test_query_parameters() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("a", "1"))
        .and(query_param("a", "2"))
        .and(query_param("c", "x"))
        .and(query_param_is_missing("b"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let query = QueryParams::new()
        .with("a", vec![1, 2])
        .with("b", None::<&str>)
        .with("c", "x");

    let url = format!("{}/search", mock_server.uri());
    let response = fetcher()
        .get(&url, FetcherOptions::new(), Some(&query))
        .await
        .unwrap();
    assert_eq!(response.data, json!([]));
}

#[tokio::test]
async fn test_relative_paths_resolve_against_site_url() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let fetcher = Fetcher::builder()
        .context(ExecutionContext::Server)
        .site_config(
            SiteConfig::default()
                .site_url(mock_server.uri())
                .deployment_url("unused.example.app"),
        )
        .build()
        .unwrap();

    let response = fetcher
        .get("/api/v1/messages", FetcherOptions::new(), None)
        .await
        .unwrap();
    assert_eq!(response.data, json!([]));
}

#[tokio::test]
async fn test_default_and_call_headers() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/h"))
        .and(header("user-agent", "portfolio-test"))
        .and(header("x-request-source", "call"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let fetcher = Fetcher::builder()
        .site_config(SiteConfig::default())
        .default_header("user-agent", "portfolio-test")
        .unwrap()
        .default_header("x-request-source", "default")
        .unwrap()
        .build()
        .unwrap();

    let url = format!("{}/h", mock_server.uri());
    let options = FetcherOptions::new()
        .header("x-request-source", "call")
        .unwrap();
    fetcher.get(&url, options, None).await.unwrap();
}

#[tokio::test]
async fn test_identical_gets_yield_equal_values() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/stable"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": 1, "body": "same" })))
        .expect(2)
        .mount(&mock_server)
        .await;

    let url = format!("{}/stable", mock_server.uri());
    let fetcher = fetcher();
    let first = fetcher
        .get(&url, FetcherOptions::new().decode_as::<Message>(), None)
        .await
        .unwrap();
    let second = fetcher
        .get(&url, FetcherOptions::new().decode_as::<Message>(), None)
        .await
        .unwrap();

    assert_eq!(first.data, second.data);
}

#[tokio::test]
async fn test_cancellation_aborts_attempt_without_retry() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .expect(1)
        .mount(&mock_server)
        .await;

    let token = CancellationToken::new();
    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        canceller.cancel();
    });

    let url = format!("{}/slow", mock_server.uri());
    let start = Instant::now();
    let err = fetcher()
        .get(&url, fast_retries(3).cancel_token(token), None)
        .await
        .unwrap_err();

    assert!(start.elapsed() < Duration::from_secs(1));
    assert_eq!(err.kind(), Some(FetcherErrorKind::Cancelled));
    assert_eq!(err.attempt(), Some(1));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_cancellation_during_backoff() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/down"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&mock_server)
        .await;

    let token = CancellationToken::new();
    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        canceller.cancel();
    });

    let url = format!("{}/down", mock_server.uri());
    let start = Instant::now();
    let options = FetcherOptions::new()
        .retries(3)
        .retry_delay(Duration::from_secs(5))
        .cancel_token(token);
    let err = fetcher().get(&url, options, None).await.unwrap_err();

    assert!(start.elapsed() < Duration::from_secs(2));
    assert_eq!(err.kind(), Some(FetcherErrorKind::Cancelled));
    assert_eq!(err.attempt(), Some(1));
}

#[tokio::test]
async fn test_on_error_fires_once_with_terminal_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/down"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&mock_server)
        .await;

    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_clone = seen.clone();

    let url = format!("{}/down", mock_server.uri());
    let options = fast_retries(2).on_error(move |err| {
        seen_clone.lock().unwrap().push(err.to_string());
    });
    let err = fetcher().get(&url, options, None).await.unwrap_err();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0], err.to_string());
    assert!(seen[0].contains("status: 503"));
    assert!(seen[0].contains("attempt: 3"));
}

#[tokio::test]
async fn test_on_error_not_called_on_success() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/ok"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&mock_server)
        .await;

    let calls = Arc::new(AtomicUsize::new(0));
    let calls_clone = calls.clone();

    let url = format!("{}/ok", mock_server.uri());
    let options = FetcherOptions::new().on_error(move |_| {
        calls_clone.fetch_add(1, Ordering::SeqCst);
    });
    fetcher().get(&url, options, None).await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_retry_predicate_narrows_policy() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/limited"))
        .respond_with(ResponseTemplate::new(429))
        .expect(1)
        .mount(&mock_server)
        .await;

    let url = format!("{}/limited", mock_server.uri());
    let err = fetcher()
        .get(&url, fast_retries(3).retry_predicate(RetryOn5xx), None)
        .await
        .unwrap_err();

    assert_eq!(err.status().map(|s| s.as_u16()), Some(429));
    assert_eq!(err.attempt(), Some(1));
}

#[tokio::test]
async fn test_respect_retry_after() {
    let mock_server = MockServer::start().await;
    let attempt_count = Arc::new(AtomicUsize::new(0));
    let attempt_count_clone = attempt_count.clone();

    // First request returns 429 with Retry-After, second succeeds
    Mock::given(method("GET"))
        .and(path("/limited"))
        .respond_with(move |_req: &wiremock::Request| {
            let count = attempt_count_clone.fetch_add(1, Ordering::SeqCst);
            if count == 0 {
                ResponseTemplate::new(429).insert_header("retry-after", "1")
            } else {
                ResponseTemplate::new(200).set_body_json(json!({ "ok": true }))
            }
        })
        .mount(&mock_server)
        .await;

    let url = format!("{}/limited", mock_server.uri());
    let start = Instant::now();
    let response = fetcher()
        .get(&url, fast_retries(2).respect_retry_after(true), None)
        .await
        .unwrap();

    assert_eq!(response.attempts, 2);
    assert!(start.elapsed() >= Duration::from_millis(900));
}

#[tokio::test]
async fn test_rate_limit_hint_recorded_on_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/limited"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "30"))
        .mount(&mock_server)
        .await;

    let url = format!("{}/limited", mock_server.uri());
    let err = fetcher().get(&url, FetcherOptions::new(), None).await.unwrap_err();

    match err {
        Error::Fetcher(err) => {
            assert_eq!(err.retry_after, Some(Duration::from_secs(30)));
            assert!(err.message.contains("retry after 30s"));
        }
        other => panic!("Expected FetcherError, got {:?}", other),
    }
}

#[tokio::test]
async fn test_oversized_reset_header_yields_typed_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/limited"))
        .respond_with(
            ResponseTemplate::new(429).insert_header("x-ratelimit-reset", "18446744073709551615"),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let url = format!("{}/limited", mock_server.uri());
    let err = fetcher().get(&url, FetcherOptions::new(), None).await.unwrap_err();

    match err {
        Error::Fetcher(err) => {
            assert_eq!(err.status.map(|s| s.as_u16()), Some(429));
            assert_eq!(err.retry_after, None);
        }
        other => panic!("Expected FetcherError, got {:?}", other),
    }
}

#[tokio::test]
async fn test_maximal_timeout_means_no_deadline() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/ok"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let url = format!("{}/ok", mock_server.uri());
    let response = fetcher()
        .get(&url, FetcherOptions::new().timeout(Duration::MAX), None)
        .await
        .unwrap();

    assert_eq!(response.data, json!({ "ok": true }));
}

#[tokio::test]
async fn test_connection_refused_is_network_error() {
    // Bind then drop a listener so the port is very likely closed.
    let addr = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };

    let err = fetcher()
        .get(&format!("http://{}/gone", addr), FetcherOptions::new(), None)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), Some(FetcherErrorKind::Network));
    assert!(err.is_retryable());
}
