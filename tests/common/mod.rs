#![allow(dead_code)]

use axum::{
    body::Body,
    extract::State,
    http::{header::CONTENT_TYPE, Request, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use paynow_relay::api::{create_router, AppState};
use paynow_relay::config::Config;
use paynow_relay::payments::integrity::{IntegrityScheme, IntegritySigner};
use paynow_relay::payments::providers::PaynowGateway;
use paynow_relay::payments::{BroadcastEventSink, InMemoryTransactionStore};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tower::ServiceExt;

pub const INTEGRATION_ID: &str = "1201";
pub const INTEGRATION_KEY: &str = "it-integration-key";

/// Canned behaviour of the simulated gateway
pub enum Reply {
    Json(serde_json::Value),
    Form(String),
    Status(StatusCode),
    Delayed(Duration, serde_json::Value),
}

#[derive(Clone)]
struct MockState {
    reply: Arc<Reply>,
    received: Arc<Mutex<Vec<Vec<(String, String)>>>>,
}

pub struct MockGateway {
    pub url: String,
    received: Arc<Mutex<Vec<Vec<(String, String)>>>>,
}

impl MockGateway {
    pub fn calls(&self) -> usize {
        self.received.lock().unwrap().len()
    }

    pub fn last_request(&self) -> Vec<(String, String)> {
        self.received.lock().unwrap().last().cloned().unwrap_or_default()
    }
}

async fn initiate(State(state): State<MockState>, body: String) -> Response {
    let fields: Vec<(String, String)> = serde_urlencoded::from_str(&body).unwrap_or_default();
    state.received.lock().unwrap().push(fields);

    match &*state.reply {
        Reply::Json(value) => Json(value.clone()).into_response(),
        Reply::Form(body) => ([(CONTENT_TYPE, "text/plain")], body.clone()).into_response(),
        Reply::Status(code) => (*code, "gateway down").into_response(),
        Reply::Delayed(delay, value) => {
            tokio::time::sleep(*delay).await;
            Json(value.clone()).into_response()
        }
    }
}

pub async fn spawn_gateway(reply: Reply) -> MockGateway {
    let received = Arc::new(Mutex::new(Vec::new()));
    let state = MockState {
        reply: Arc::new(reply),
        received: received.clone(),
    };
    let router = Router::new()
        .route("/interface/initiatetransaction", post(initiate))
        .with_state(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    MockGateway {
        url: format!("http://{}/interface/initiatetransaction", addr),
        received,
    }
}

/// A gateway that answers 200 but drops the connection partway through
/// the body.
pub async fn spawn_truncating_gateway() -> String {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap_or(0);
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
                if request_complete(&request) {
                    break;
                }
            }
            let _ = socket
                .write_all(
                    b"HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: 120\r\n\r\nstatus=Ok&browserurl=",
                )
                .await;
            let _ = socket.shutdown().await;
        }
    });

    format!("http://{}/interface/initiatetransaction", addr)
}

fn request_complete(request: &[u8]) -> bool {
    let text = String::from_utf8_lossy(request);
    let Some(header_end) = text.find("\r\n\r\n") else {
        return false;
    };
    let content_length = text[..header_end]
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            name.eq_ignore_ascii_case("content-length")
                .then(|| value.trim().parse::<usize>().ok())
                .flatten()
        })
        .unwrap_or(0);
    request.len() >= header_end + 4 + content_length
}

/// A URL nothing is listening on
pub fn unreachable_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}/interface/initiatetransaction", addr)
}

pub fn config(gateway_url: &str) -> Config {
    config_with(gateway_url, &[])
}

/// Test configuration with extra variables layered on top
pub fn config_with(gateway_url: &str, overrides: &[(&str, &str)]) -> Config {
    let vars: HashMap<String, String> = [
        ("PORT", "8080"),
        ("PAYNOW_INTEGRATION_ID", INTEGRATION_ID),
        ("PAYNOW_INTEGRATION_KEY", INTEGRATION_KEY),
        ("PAYNOW_INITIATE_URL", gateway_url),
        ("PAYNOW_TIMEOUT_SECS", "1"),
        ("PUBLIC_BASE_URL", "https://shop.example"),
        ("PAYMENT_DESCRIPTION", "Premium Subscription"),
        ("PAYMENT_REFERENCE_PREFIX", "SHOP"),
    ]
    .iter()
    .chain(overrides.iter())
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();
    Config::from_map(&vars).unwrap()
}

pub struct TestApp {
    pub router: Router,
    pub store: Arc<InMemoryTransactionStore>,
    pub events: BroadcastEventSink,
}

pub fn build_app(config: Config) -> TestApp {
    let store = Arc::new(InMemoryTransactionStore::new());
    let events = BroadcastEventSink::default();
    let gateway = PaynowGateway::new(config.paynow.clone()).unwrap();
    let state = AppState::new(
        config,
        Arc::new(gateway),
        store.clone(),
        Arc::new(events.clone()),
    );

    TestApp {
        router: create_router(state),
        store,
        events,
    }
}

impl TestApp {
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, value)
    }

    pub async fn post_json(
        &self,
        uri: &str,
        body: serde_json::Value,
    ) -> (StatusCode, serde_json::Value) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    pub async fn post_form(&self, uri: &str, body: String) -> (StatusCode, serde_json::Value) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body))
            .unwrap();
        self.send(request).await
    }
}

pub fn signer() -> IntegritySigner {
    IntegritySigner::new(IntegrityScheme::Sha512, INTEGRATION_KEY)
}

/// Fields of a gateway status update, signed with `signer`
pub fn signed_fields_with(
    signer: &IntegritySigner,
    fields: &[(&str, &str)],
) -> Vec<(String, String)> {
    let mut fields: Vec<(String, String)> = fields
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    let hash = signer
        .sign(fields.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .unwrap();
    fields.push(("hash".to_string(), hash));
    fields
}

pub fn signed_fields(reference: &str, status: &str) -> Vec<(String, String)> {
    signed_fields_with(
        &signer(),
        &[
            ("reference", reference),
            ("paynowreference", "4455667"),
            ("amount", "25.00"),
            ("status", status),
            ("pollurl", "https://gw/poll/xyz"),
        ],
    )
}

/// Form body of a gateway status update, signed with the integration key
pub fn signed_callback(reference: &str, status: &str) -> String {
    serde_urlencoded::to_string(signed_fields(reference, status)).unwrap()
}

/// The same fields as a JSON object, in delivery order
pub fn json_object(fields: &[(String, String)]) -> serde_json::Value {
    let object: serde_json::Map<String, serde_json::Value> = fields
        .iter()
        .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
        .collect();
    serde_json::Value::Object(object)
}

pub fn ecocash_request() -> serde_json::Value {
    serde_json::json!({
        "email": "a@b.com",
        "phone": "0771234567",
        "amount": 25.00,
        "method": "ecocash"
    })
}

pub fn field<'a>(fields: &'a [(String, String)], name: &str) -> Option<&'a str> {
    fields
        .iter()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.as_str())
}
