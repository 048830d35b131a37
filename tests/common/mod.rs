//! Common test utilities for integration tests.
//!
//! # Example
//!
//! ```ignore
//! let server = MockServer::start().await;
//! mount_stream(&server, "key-one", &[json!({"type": "incident.created"})]).await;
//! let events = record_events(&bus);
//! ```

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use pulsefeed::bus::EventBus;
use pulsefeed::event::Event;
use serde_json::Value;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

pub const STREAM_PATH: &str = "/api/stream";
pub const CREDENTIAL_KEY: &str = "pulseops_api_key";

/// Encode events as an SSE body, one `data:` frame each.
pub fn sse_body(events: &[Value]) -> String {
    events
        .iter()
        .map(|event| format!("data: {}\n\n", event))
        .collect()
}

/// Serve `events` to stream requests carrying `api_key`. The body ends after
/// the last event, so clients reconnect.
pub async fn mount_stream(server: &MockServer, api_key: &str, events: &[Value]) {
    Mock::given(method("GET"))
        .and(path(STREAM_PATH))
        .and(query_param("apiKey", api_key))
        .and(header("accept", "text/event-stream"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string(sse_body(events)),
        )
        .mount(server)
        .await;
}

/// Reject every stream request not matched by a more specific mock.
pub async fn mount_rejection(server: &MockServer, status: u16) {
    Mock::given(method("GET"))
        .and(path(STREAM_PATH))
        .respond_with(ResponseTemplate::new(status))
        .with_priority(u8::MAX)
        .mount(server)
        .await;
}

pub fn stream_url(server: &MockServer) -> String {
    format!("{}{}", server.uri(), STREAM_PATH)
}

/// `apiKey` query values of the requests the server has seen, in order.
pub async fn requested_keys(server: &MockServer) -> Vec<String> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter_map(api_key_of)
        .collect()
}

fn api_key_of(request: &Request) -> Option<String> {
    request
        .url
        .query_pairs()
        .find(|(name, _)| name == "apiKey")
        .map(|(_, value)| value.into_owned())
}

/// Record every event published on `bus`.
pub fn record_events(bus: &EventBus) -> Arc<Mutex<Vec<Event>>> {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    bus.subscribe_named("test-recorder", move |event| {
        sink.lock().unwrap().push(event.clone());
        Ok(())
    });
    events
}

/// Poll `condition` until it holds, panicking after `timeout`.
pub async fn wait_until<F>(timeout: Duration, mut condition: F)
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not met within {:?}",
            timeout
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
