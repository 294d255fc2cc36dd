//! HTTP behaviour of the router, driven through `tower::ServiceExt::oneshot`
//! and, for the server loop, a real socket.

use axum::body::{to_bytes, Body};
use axum::extract::ConnectInfo;
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use serde_json::{json, Value};
use std::io::Write;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tower::ServiceExt;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use visitlog_core::ip::IpHasher;
use visitlog_core::{Salt, SchemaProfile, ServerConfig};
use visitlog_logging::LogSink;
use visitlog_server::{create_router, AppState, VisitServer};

const SALT: &str = "integration-salt";

#[derive(Clone, Default)]
struct Stdout(Arc<Mutex<Vec<u8>>>);

impl Stdout {
    fn records(&self) -> Vec<Value> {
        let bytes = self.0.lock().unwrap().clone();
        String::from_utf8(bytes)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }
}

impl Write for Stdout {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

struct Harness {
    state: Arc<AppState>,
    stdout: Stdout,
}

impl Harness {
    fn new(config: ServerConfig) -> Self {
        let stdout = Stdout::default();
        let writer = stdout.clone();
        let sink = LogSink::from_config(&config)
            .unwrap()
            .with_console(BoxMakeWriter::new(move || writer.clone()));

        Self {
            state: Arc::new(AppState::new(Arc::new(config), sink)),
            stdout,
        }
    }

    fn minimal() -> Self {
        Self::new(config())
    }

    async fn send(&self, request: Request<Body>) -> Response {
        create_router(Arc::clone(&self.state))
            .oneshot(request)
            .await
            .unwrap()
    }

    /// Wait for background record writes, then return what reached stdout
    async fn records(&self) -> Vec<Value> {
        self.state.drain().await;
        self.stdout.records()
    }
}

fn config() -> ServerConfig {
    ServerConfig {
        salt: Salt::new(SALT),
        ..ServerConfig::default()
    }
}

fn from_socket(mut request: Request<Body>, addr: &str) -> Request<Body> {
    let addr: SocketAddr = addr.parse().unwrap();
    request.extensions_mut().insert(ConnectInfo(addr));
    request
}

fn telemetry_request(body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/telemetry")
        .header(header::CONTENT_TYPE, "text/plain;charset=UTF-8")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap()
}

fn minimal_payload() -> Value {
    json!({
        "screen": {"width": 390, "height": 844, "pixelRatio": 3, "colorDepth": 24},
        "timezone": "Asia/Tokyo",
        "platform": "iPhone",
        "language": "ja-JP",
        "languages": ["ja-JP", "en-US"]
    })
}

fn hash(ip: &str) -> String {
    IpHasher::new(Salt::new(SALT)).hash(ip).unwrap()
}

async fn body_json(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn healthz_is_not_recorded() {
    let harness = Harness::minimal();

    let response = harness
        .send(Request::get("/healthz").body(Body::empty()).unwrap())
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({"status": "ok"}));
    assert!(harness.records().await.is_empty());
}

#[tokio::test]
async fn pageview_hashes_socket_address() {
    let harness = Harness::minimal();
    let request = Request::get("/")
        .header(header::USER_AGENT, "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36")
        .header(header::COOKIE, "session=secret")
        .body(Body::empty())
        .unwrap();

    let response = harness.send(from_socket(request, "203.0.113.5:51000")).await;

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers()[header::CONTENT_TYPE].to_str().unwrap();
    assert!(content_type.starts_with("text/html"));

    let records = harness.records().await;
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record["event"], "pageview");
    assert_eq!(record["method"], "GET");
    assert_eq!(record["path"], "/");
    assert_eq!(record["hashedIp"], hash("203.0.113.5"));
    assert_eq!(record["userAgent"]["browser"]["name"], "Chrome");
    assert!(record["headers"].get("cookie").is_none());
    assert!(record["requestId"].as_str().is_some_and(|id| id.len() == 36));
    assert!(record.get("telemetry").is_none());
}

#[tokio::test]
async fn forwarded_for_wins_over_socket() {
    let harness = Harness::minimal();
    let request = Request::get("/")
        .header("x-forwarded-for", " ::ffff:198.51.100.7 , 10.0.0.1")
        .body(Body::empty())
        .unwrap();

    harness.send(from_socket(request, "10.0.0.254:443")).await;

    let records = harness.records().await;
    assert_eq!(records[0]["hashedIp"], hash("198.51.100.7"));
}

#[tokio::test]
async fn missing_client_address_records_null_hash() {
    let harness = Harness::minimal();

    harness
        .send(Request::get("/").body(Body::empty()).unwrap())
        .await;

    let records = harness.records().await;
    assert_eq!(records[0]["hashedIp"], Value::Null);
}

#[tokio::test]
async fn empty_payload_rejected_and_not_recorded() {
    let harness = Harness::minimal();

    let response = harness.send(telemetry_request(&json!({}))).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"], "Invalid telemetry payload");
    assert_eq!(body["details"][0]["path"], "screen");
    assert!(harness.records().await.is_empty());
}

#[tokio::test]
async fn malformed_body_rejected() {
    let harness = Harness::minimal();
    let request = Request::post("/api/telemetry")
        .body(Body::from("screen=1"))
        .unwrap();

    let response = harness.send(request).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["details"][0]["path"], "$");
}

#[tokio::test]
async fn minimal_payload_recorded_verbatim() {
    let temp_dir = TempDir::new().unwrap();
    let harness = Harness::new(ServerConfig {
        file_logging: true,
        log_dir: temp_dir.path().to_path_buf(),
        ..config()
    });
    let request = from_socket(telemetry_request(&minimal_payload()), "192.0.2.10:1234");

    let response = harness.send(request).await;

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let records = harness.records().await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["event"], "telemetry");
    assert_eq!(records[0]["telemetry"], minimal_payload());
    assert_eq!(records[0]["schema"], "minimal");

    let files = visitlog_logging::RecordFileManager::find_record_files(temp_dir.path()).unwrap();
    assert_eq!(files.len(), 2);
    let jsonl = files
        .iter()
        .find(|f| f.format == visitlog_logging::RecordFormat::JsonLines)
        .unwrap();
    let stored: Value =
        serde_json::from_str(std::fs::read_to_string(&jsonl.path).unwrap().trim_end()).unwrap();
    assert_eq!(stored, records[0]);
}

#[tokio::test]
async fn unwritable_directory_does_not_affect_response() {
    let temp_dir = TempDir::new().unwrap();
    let log_dir = temp_dir.path().join("records");
    let harness = Harness::new(ServerConfig {
        file_logging: true,
        log_dir: log_dir.clone(),
        ..config()
    });

    std::fs::remove_dir_all(&log_dir).unwrap();
    std::fs::write(&log_dir, "blocked").unwrap();

    let response = harness.send(telemetry_request(&minimal_payload())).await;

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let records = harness.records().await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["event"], "telemetry");
}

#[tokio::test]
async fn rich_profile_rejects_minimal_shape() {
    let harness = Harness::new(ServerConfig {
        schema: SchemaProfile::Rich,
        ..config()
    });

    let response = harness.send(telemetry_request(&minimal_payload())).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let rich = json!({
        "identifiers": {"sessionId": "abc"},
        "system": {"timezone": "UTC", "cookiesEnabled": true}
    });
    let response = harness.send(telemetry_request(&rich)).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let records = harness.records().await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["schema"], "rich");
    assert_eq!(records[0]["telemetry"], rich);
}

/// Shape the landing page script sends under the rich profile
fn rich_browser_payload() -> Value {
    json!({
        "identifiers": {
            "sessionId": "0f8fad5b-d9cb-469f-a165-70867728950e",
            "visitorId": "7c9e6679-7425-40de-944b-e07fc1f90ae7",
            "pageLoadId": "lq2x7k4mrz0b9c"
        },
        "system": {
            "platform": "MacIntel",
            "language": "en-GB",
            "languages": ["en-GB", "en"],
            "timezone": "Europe/London",
            "timezoneOffset": -60,
            "cookiesEnabled": true,
            "doNotTrack": "1"
        },
        "network": {
            "effectiveType": "4g",
            "downlink": 9.6,
            "rtt": 50,
            "saveData": false,
            "online": true
        },
        "hardware": {
            "screen": {
                "width": 1920.0,
                "height": 1080,
                "availWidth": 1920,
                "availHeight": 1055,
                "colorDepth": 30,
                "pixelRatio": 2
            },
            "deviceMemory": 8,
            "hardwareConcurrency": 10,
            "maxTouchPoints": 0
        },
        "features": {
            "cookies": true,
            "localStorage": true,
            "sessionStorage": true,
            "indexedDb": true,
            "serviceWorker": true,
            "webgl": true,
            "webgl2": true,
            "webAssembly": true,
            "touch": false
        }
    })
}

#[tokio::test]
async fn rich_landing_page_and_its_payload_are_accepted() {
    let harness = Harness::new(ServerConfig {
        schema: SchemaProfile::Rich,
        ..config()
    });

    let page = harness
        .send(Request::get("/").body(Body::empty()).unwrap())
        .await;
    let html = to_bytes(page.into_body(), usize::MAX).await.unwrap();
    let html = String::from_utf8(html.to_vec()).unwrap();
    assert!(html.contains("data-schema=\"rich\""));
    assert!(html.contains("identifiers:"));

    let response = harness.send(telemetry_request(&rich_browser_payload())).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let records = harness.records().await;
    assert_eq!(records.len(), 2);
    let telemetry = records.iter().find(|r| r["event"] == "telemetry").unwrap();
    assert_eq!(telemetry["schema"], "rich");
    assert_eq!(telemetry["telemetry"], rich_browser_payload());
}

#[tokio::test]
async fn minimal_landing_page_declares_its_profile() {
    let harness = Harness::minimal();

    let page = harness
        .send(Request::get("/").body(Body::empty()).unwrap())
        .await;
    let html = to_bytes(page.into_body(), usize::MAX).await.unwrap();
    let html = String::from_utf8(html.to_vec()).unwrap();

    assert!(html.contains("data-schema=\"minimal\""));
}

#[tokio::test]
async fn consent_gating() {
    let harness = Harness::new(ServerConfig {
        require_consent: true,
        ..config()
    });

    let page = harness
        .send(Request::get("/").body(Body::empty()).unwrap())
        .await;
    let html = to_bytes(page.into_body(), usize::MAX).await.unwrap();
    let html = String::from_utf8(html.to_vec()).unwrap();
    assert!(html.contains("data-require-consent=\"true\""));

    let response = harness.send(telemetry_request(&minimal_payload())).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["details"][0]["path"], "consent");

    let mut consented = minimal_payload();
    consented["consent"] = json!(true);
    let response = harness.send(telemetry_request(&consented)).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let events: Vec<Value> = harness
        .records()
        .await
        .into_iter()
        .map(|r| r["event"].clone())
        .collect();
    assert_eq!(events, vec![json!("pageview"), json!("telemetry")]);
}

#[tokio::test]
async fn oversized_body_rejected_by_limit() {
    let harness = Harness::new(ServerConfig {
        body_limit_bytes: 64,
        ..config()
    });
    let mut payload = minimal_payload();
    payload["timezone"] = json!("x".repeat(200));

    let response = harness.send(telemetry_request(&payload)).await;

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert!(harness.records().await.is_empty());
}

#[tokio::test]
async fn unknown_route_is_generic_404() {
    let harness = Harness::minimal();

    let response = harness
        .send(Request::get("/admin").body(Body::empty()).unwrap())
        .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await, json!({"error": "Not found"}));
    assert!(harness.records().await.is_empty());
}

#[tokio::test]
async fn wrong_method_on_known_path_is_generic_404() {
    let harness = Harness::minimal();

    for request in [
        Request::get("/api/telemetry").body(Body::empty()).unwrap(),
        Request::post("/").body(Body::from("{}")).unwrap(),
    ] {
        let response = harness.send(request).await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await, json!({"error": "Not found"}));
    }
    assert!(harness.records().await.is_empty());
}

#[tokio::test]
async fn server_drains_records_on_shutdown() {
    let stdout = Stdout::default();
    let writer = stdout.clone();
    let sink = LogSink::console_only().with_console(BoxMakeWriter::new(move || writer.clone()));
    let state = Arc::new(AppState::new(Arc::new(config()), sink));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    let server = tokio::spawn(VisitServer::new(state).serve(listener, async {
        let _ = shutdown_rx.await;
    }));

    let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(b"GET / HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
        .await
        .unwrap();
    let mut response = Vec::new();
    stream.read_to_end(&mut response).await.unwrap();
    assert!(String::from_utf8_lossy(&response).starts_with("HTTP/1.1 200 OK"));

    shutdown_tx.send(()).unwrap();
    server.await.unwrap().unwrap();

    let records = stdout.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["hashedIp"], hash("127.0.0.1"));
}
