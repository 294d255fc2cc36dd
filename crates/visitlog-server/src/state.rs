//! Shared application state

use axum::body::Bytes;
use std::sync::Arc;
use tokio_util::task::TaskTracker;
use visitlog_core::ip::IpHasher;
use visitlog_core::{LogEntry, ServerConfig, TelemetryValidator};
use visitlog_logging::LogSink;

const LANDING_TEMPLATE: &str = include_str!("../assets/index.html");
const CONSENT_PLACEHOLDER: &str = "{{REQUIRE_CONSENT}}";
const SCHEMA_PLACEHOLDER: &str = "{{SCHEMA}}";

/// Everything a handler needs, built once from the startup configuration
#[derive(Debug)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub hasher: IpHasher,
    pub validator: TelemetryValidator,
    sink: Arc<LogSink>,
    tasks: TaskTracker,
    landing_page: Bytes,
}

impl AppState {
    pub fn new(config: Arc<ServerConfig>, sink: LogSink) -> Self {
        let hasher = IpHasher::new(config.salt.clone());
        let validator =
            TelemetryValidator::new(config.schema).with_required_consent(config.require_consent);
        let landing_page = Bytes::from(render_landing_page(&config));

        Self {
            config,
            hasher,
            validator,
            sink: Arc::new(sink),
            tasks: TaskTracker::new(),
            landing_page,
        }
    }

    pub fn landing_page(&self) -> Bytes {
        self.landing_page.clone()
    }

    /// Persist an entry in the background. The caller does not wait and
    /// never sees the outcome; failures surface on the operational log.
    pub fn record(&self, entry: LogEntry) {
        let sink = Arc::clone(&self.sink);
        self.tasks.spawn(async move {
            sink.record(&entry).await;
        });
    }

    /// Wait for every pending record write. Called once the listener has
    /// stopped, so nothing new is spawned afterwards.
    pub async fn drain(&self) {
        self.tasks.close();
        tracing::info!(
            visitlog.event = "draining_records",
            pending = self.tasks.len(),
            "Waiting for pending record writes"
        );
        self.tasks.wait().await;
    }
}

/// The landing page script reads the consent requirement and the payload
/// profile from attributes on `<body>`.
fn render_landing_page(config: &ServerConfig) -> String {
    LANDING_TEMPLATE
        .replace(CONSENT_PLACEHOLDER, &config.require_consent.to_string())
        .replace(SCHEMA_PLACEHOLDER, config.schema.as_str())
}
