//! Integration tests for the client pipeline.
//!
//! These tests verify hook ordering, middleware dispatch, retry behavior and
//! body negotiation against mock HTTP servers.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use reqkit::{Client, Error, HookStage, Middleware, Next, Request, Response};
use serde::Deserialize;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_get_query_echo() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/get"))
        .and(query_param("k", "v"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(r#"{"k":"v"}"#, "application/json"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = Client::builder().build().unwrap();
    let uri = format!("{}/get", server.uri());
    let body: serde_json::Value = client.get_decode(&uri, [("k", "v")]).await.unwrap();
    assert_eq!(body["k"], "v");
}

#[tokio::test]
async fn test_post_as_json_sends_header_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/post"))
        .and(header("content-type", "application/json; charset=UTF-8"))
        .and(body_string_contains(r#""name":"go""#))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let client = Client::builder().as_json().build().unwrap();
    let response = client
        .post(
            &format!("{}/post", server.uri()),
            serde_json::json!({"name": "go"}),
        )
        .await
        .unwrap();
    assert!(response.is_success());
}

#[tokio::test]
async fn test_error_status_does_not_fail_the_pipeline() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = Client::builder().build().unwrap();
    let response = client
        .get(&format!("{}/missing", server.uri()), ())
        .await
        .unwrap();
    assert!(response.is_error());
    assert!(!response.is_success());

    let error = response.error_for_status().unwrap_err();
    assert!(matches!(error, Error::Status { status: 404, .. }));
}

#[tokio::test]
async fn test_retry_exhaustion_counts_attempts() {
    // Bind then drop a listener so the port refuses connections quickly.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = Client::builder()
        .retry(2, Duration::from_millis(10))
        .build()
        .unwrap();
    let error = client.get(&format!("http://{addr}/x"), ()).await.unwrap_err();
    let Error::Transport { attempts, .. } = error else {
        panic!("expected transport error, got {error:?}");
    };
    assert_eq!(attempts, 3, "2 retries means 3 attempts total");
    assert_eq!(client.attempts(), 3);
}

/// Reads one HTTP request from the socket and returns its body bytes.
async fn read_request_body(socket: &mut tokio::net::TcpStream) -> Vec<u8> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let head_end = loop {
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
        let n = socket.read(&mut chunk).await.unwrap();
        assert!(n > 0, "peer closed before the headers were complete");
        buf.extend_from_slice(&chunk[..n]);
    };
    let head = String::from_utf8_lossy(&buf[..head_end]).to_ascii_lowercase();
    let length: usize = head
        .lines()
        .find_map(|line| line.strip_prefix("content-length:"))
        .map_or(0, |v| v.trim().parse().unwrap());
    while buf.len() < head_end + length {
        let n = socket.read(&mut chunk).await.unwrap();
        assert!(n > 0, "peer closed before the body was complete");
        buf.extend_from_slice(&chunk[..n]);
    }
    buf[head_end..head_end + length].to_vec()
}

#[tokio::test]
async fn test_retry_replays_the_body_byte_for_byte() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let received = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&received);
    tokio::spawn(async move {
        // The first connection dies before a response is written, forcing a
        // retry; the second one records the body and answers.
        let (first, _) = listener.accept().await.unwrap();
        drop(first);
        let (mut second, _) = listener.accept().await.unwrap();
        *sink.lock().unwrap() = read_request_body(&mut second).await;
        second
            .write_all(b"HTTP/1.1 200 OK\r\ncontent-length: 0\r\nconnection: close\r\n\r\n")
            .await
            .unwrap();
        second.shutdown().await.unwrap();
    });

    let payload = r#"{"name":"go","n":1}"#;
    let client = Client::builder()
        .as_json()
        .retry(3, Duration::from_millis(10))
        .build()
        .unwrap();
    let response = client
        .post(&format!("http://{addr}/replay"), payload)
        .await
        .unwrap();

    assert!(response.is_success());
    assert_eq!(response.attempt(), 2, "one failure plus one success");
    assert_eq!(response.request_body(), payload.as_bytes());
    assert_eq!(
        *received.lock().unwrap(),
        payload.as_bytes(),
        "the retried attempt must carry the identical body"
    );
}

#[tokio::test]
async fn test_successful_call_fires_each_hook_exactly_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ok"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let before = Arc::new(AtomicU32::new(0));
    let after = Arc::new(AtomicU32::new(0));
    let on_response = Arc::new(AtomicU32::new(0));
    let success = Arc::new(AtomicU32::new(0));
    let failure = Arc::new(AtomicU32::new(0));

    let client = {
        let before = Arc::clone(&before);
        let after = Arc::clone(&after);
        let on_response = Arc::clone(&on_response);
        let success = Arc::clone(&success);
        let failure = Arc::clone(&failure);
        Client::builder()
            .on_before_request(move |_| {
                before.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .on_after_request(move |_, _| {
                after.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .on_response(move |_, _, _| {
                on_response.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .on_success(move |_, _| {
                success.fetch_add(1, Ordering::SeqCst);
            })
            .on_error(move |_, _, _| {
                failure.fetch_add(1, Ordering::SeqCst);
            })
            .build()
            .unwrap()
    };

    client
        .get(&format!("{}/ok", server.uri()), ())
        .await
        .unwrap();

    assert_eq!(before.load(Ordering::SeqCst), 1);
    assert_eq!(after.load(Ordering::SeqCst), 1);
    assert_eq!(on_response.load(Ordering::SeqCst), 1);
    assert_eq!(success.load(Ordering::SeqCst), 1);
    assert_eq!(failure.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_failing_before_hook_aborts_without_sending() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let saw_request = Arc::new(Mutex::new(None::<bool>));
    let client = {
        let saw_request = Arc::clone(&saw_request);
        Client::builder()
            .on_before_request(|_| Err("not today".into()))
            .on_error(move |_, request, _| {
                *saw_request.lock().unwrap() = Some(request.is_some());
            })
            .build()
            .unwrap()
    };

    let error = client
        .get(&format!("{}/never", server.uri()), ())
        .await
        .unwrap_err();
    assert!(matches!(
        error,
        Error::Hook {
            stage: HookStage::BeforeRequest,
            ..
        }
    ));
    // The failure happened before the request was built.
    assert_eq!(*saw_request.lock().unwrap(), Some(false));
}

#[tokio::test]
async fn test_after_request_hook_can_mutate_the_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/traced"))
        .and(header("x-trace-id", "t-42"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let client = Client::builder()
        .on_after_request(|_, request| {
            request.set_header("x-trace-id", "t-42")?;
            Ok(())
        })
        .build()
        .unwrap();
    client
        .get(&format!("{}/traced", server.uri()), ())
        .await
        .unwrap();
}

struct RecordingMiddleware {
    name: &'static str,
    log: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl Middleware for RecordingMiddleware {
    async fn handle(
        &self,
        _client: &Client,
        mut request: Request,
        next: Next<'_>,
    ) -> Result<Response, Error> {
        self.log.lock().unwrap().push(format!("{}:enter", self.name));
        request.set_header(&format!("x-mw-{}", self.name), "1")?;
        let response = next.run(request).await;
        self.log.lock().unwrap().push(format!("{}:exit", self.name));
        response
    }
}

#[tokio::test]
async fn test_middlewares_run_in_registration_order() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/mw"))
        .and(header("x-mw-outer", "1"))
        .and(header("x-mw-inner", "1"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let log = Arc::new(Mutex::new(Vec::new()));
    let client = Client::builder()
        .middleware(RecordingMiddleware {
            name: "outer",
            log: Arc::clone(&log),
        })
        .middleware(RecordingMiddleware {
            name: "inner",
            log: Arc::clone(&log),
        })
        .build()
        .unwrap();

    client
        .get(&format!("{}/mw", server.uri()), ())
        .await
        .unwrap();

    assert_eq!(
        *log.lock().unwrap(),
        vec!["outer:enter", "inner:enter", "inner:exit", "outer:exit"]
    );
}

struct ShortCircuit;

#[async_trait]
impl Middleware for ShortCircuit {
    async fn handle(
        &self,
        _client: &Client,
        request: Request,
        _next: Next<'_>,
    ) -> Result<Response, Error> {
        Err(Error::status(
            request.method().as_str(),
            request.url().as_str(),
            503,
        ))
    }
}

#[tokio::test]
async fn test_middleware_short_circuit_skips_the_transport() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = Client::builder().middleware(ShortCircuit).build().unwrap();
    let error = client
        .get(&format!("{}/blocked", server.uri()), ())
        .await
        .unwrap_err();
    assert!(matches!(error, Error::Status { status: 503, .. }));
}

#[derive(Debug, Deserialize, PartialEq)]
struct User {
    name: String,
    id: u32,
}

#[tokio::test]
async fn test_decode_json_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/user"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(r#"{"name":"ada","id":7}"#, "application/json; charset=utf-8"),
        )
        .mount(&server)
        .await;

    let client = Client::builder().build().unwrap();
    let user: User = client
        .get_decode(&format!("{}/user", server.uri()), ())
        .await
        .unwrap();
    assert_eq!(
        user,
        User {
            name: "ada".to_string(),
            id: 7
        }
    );
}

#[tokio::test]
async fn test_decode_xml_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/user.xml"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw("<User><name>ada</name><id>7</id></User>", "application/xml"),
        )
        .mount(&server)
        .await;

    let client = Client::builder().build().unwrap();
    let user: User = client
        .get_decode(&format!("{}/user.xml", server.uri()), ())
        .await
        .unwrap();
    assert_eq!(user.name, "ada");
    assert_eq!(user.id, 7);
}

#[tokio::test]
async fn test_decode_unsupported_content_type_fails() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/plain")
                .set_body_string("just text"),
        )
        .mount(&server)
        .await;

    let client = Client::builder().build().unwrap();
    let result: Result<serde_json::Value, _> = client
        .get_decode(&format!("{}/plain", server.uri()), ())
        .await;
    assert!(matches!(result, Err(Error::Decode { .. })));
}

#[tokio::test]
async fn test_client_cookies_are_sent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/c"))
        .and(header("cookie", "a=1; b=2"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let client = Client::builder()
        .cookie("a", "1")
        .cookie("b", "2")
        .build()
        .unwrap();
    client.get(&format!("{}/c", server.uri()), ()).await.unwrap();
}

#[tokio::test]
async fn test_post_form_sends_multipart_fields() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/form"))
        .and(body_string_contains("name=\"checkType\""))
        .and(body_string_contains("none"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let client = Client::builder().build().unwrap();
    let response = client
        .post_form(&format!("{}/form", server.uri()), [("checkType", "none")])
        .await
        .unwrap();
    assert!(response.is_success());
    assert!(response
        .request_body()
        .windows(b"checkType".len())
        .any(|w| w == b"checkType"));
}

#[tokio::test]
async fn test_post_form_with_files_attaches_file_parts() {
    let dir = tempfile::tempdir().unwrap();
    let file_path = dir.path().join("payload.txt");
    std::fs::write(&file_path, b"file-content").unwrap();

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/upload"))
        .and(body_string_contains("filename=\"upload\""))
        .and(body_string_contains("file-content"))
        .and(body_string_contains("name=\"plain\""))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let client = Client::builder().build().unwrap();
    client
        .post_form_with_files(
            &format!("{}/upload", server.uri()),
            [
                ("upload", format!("@file:{}", file_path.display()).as_str()),
                ("plain", "value"),
            ],
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn test_read_lines_streams_the_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/lines"))
        .respond_with(ResponseTemplate::new(200).set_body_string("alpha\nbeta\r\ngamma"))
        .mount(&server)
        .await;

    let client = Client::builder().build().unwrap();
    let response = client
        .get(&format!("{}/lines", server.uri()), ())
        .await
        .unwrap();

    let lines = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&lines);
    let count = response
        .read_lines(move |line, _index| {
            sink.lock()
                .unwrap()
                .push(String::from_utf8_lossy(line).into_owned());
        })
        .await
        .unwrap();

    assert_eq!(count, 3);
    assert_eq!(*lines.lock().unwrap(), vec!["alpha", "beta", "gamma"]);
}

#[tokio::test]
async fn test_base_url_and_default_headers_apply() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/ping"))
        .and(header("x-app", "reqkit-test"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let client = Client::builder()
        .base_url(server.uri())
        .header("x-app", "reqkit-test")
        .build()
        .unwrap();
    client.get("/api/ping", ()).await.unwrap();
}

#[tokio::test]
async fn test_debug_mode_logs_without_changing_the_response() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("reqkit=debug")
        .with_test_writer()
        .try_init();

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/dbg"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .expect(1)
        .mount(&server)
        .await;

    let client = Client::builder().debug(true).build().unwrap();
    let response = client
        .get(&format!("{}/dbg", server.uri()), ())
        .await
        .unwrap();
    assert!(response.is_success());
    assert_eq!(response.attempt(), 1);
}

#[tokio::test]
async fn test_redirect_none_returns_the_redirect_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/from"))
        .respond_with(ResponseTemplate::new(302).insert_header("location", "/to"))
        .mount(&server)
        .await;

    let client = Client::builder()
        .redirect(reqkit::RedirectPolicy::none())
        .build()
        .unwrap();
    let response = client
        .get(&format!("{}/from", server.uri()), ())
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 302);
}

#[tokio::test]
async fn test_redirect_limit_follows_within_budget() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/hop1"))
        .respond_with(ResponseTemplate::new(302).insert_header("location", "/hop2"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/hop2"))
        .respond_with(ResponseTemplate::new(200).set_body_string("landed"))
        .mount(&server)
        .await;

    let client = Client::builder()
        .redirect(reqkit::RedirectPolicy::limit(3))
        .build()
        .unwrap();
    let response = client
        .get(&format!("{}/hop1", server.uri()), ())
        .await
        .unwrap();
    assert!(response.is_success());
    assert_eq!(response.final_url().path(), "/hop2");
}

#[tokio::test]
async fn test_redirect_limit_exceeded_fails_the_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/loop1"))
        .respond_with(ResponseTemplate::new(302).insert_header("location", "/loop2"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/loop2"))
        .respond_with(ResponseTemplate::new(302).insert_header("location", "/loop3"))
        .mount(&server)
        .await;

    let client = Client::builder()
        .redirect(reqkit::RedirectPolicy::limit(1))
        .retry(0, Duration::from_millis(1))
        .build()
        .unwrap();
    let error = client
        .get(&format!("{}/loop1", server.uri()), ())
        .await
        .unwrap_err();
    assert!(matches!(error, Error::Transport { .. }), "got {error:?}");
}
