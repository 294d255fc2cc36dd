//! HTTP server loop with graceful shutdown

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::error::ApiError;
use crate::routes::create_router;
use crate::state::AppState;

/// Visit recording server
pub struct VisitServer {
    state: Arc<AppState>,
}

impl VisitServer {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    /// Bind the configured address and serve until `shutdown_signal` resolves.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is invalid or cannot be bound.
    pub async fn run_with_shutdown(
        self,
        shutdown_signal: impl Future<Output = ()> + Send + 'static,
    ) -> Result<(), ApiError> {
        let addr = self
            .state
            .config
            .bind_address()
            .map_err(|e| ApiError::Internal(format!("Invalid bind address: {e}")))?;

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ApiError::Internal(format!("Failed to bind to {addr}: {e}")))?;

        self.serve(listener, shutdown_signal).await
    }

    /// Serve on an already bound listener. Once the signal fires, in-flight
    /// requests finish and pending record writes are drained before returning.
    pub async fn serve(
        self,
        listener: TcpListener,
        shutdown_signal: impl Future<Output = ()> + Send + 'static,
    ) -> Result<(), ApiError> {
        let local_addr = listener
            .local_addr()
            .map_err(|e| ApiError::Internal(format!("Listener has no local address: {e}")))?;

        let app = create_router(Arc::clone(&self.state));

        info!(
            visitlog.event = "server_listening",
            address = %local_addr,
            schema = %self.state.config.schema,
            file_logging = self.state.config.file_logging,
            "Visit server listening"
        );

        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal)
        .await
        .map_err(|e| ApiError::Internal(format!("Server error: {e}")))?;

        warn!(visitlog.event = "server_stopping", "Visit server shutting down");
        self.state.drain().await;
        info!(visitlog.event = "server_stopped", "All records flushed");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use visitlog_core::{Salt, ServerConfig};
    use visitlog_logging::LogSink;

    #[test]
    fn test_server_keeps_state() {
        let config = Arc::new(ServerConfig {
            salt: Salt::new("pepper"),
            ..ServerConfig::default()
        });
        let state = Arc::new(AppState::new(config, LogSink::console_only()));
        let server = VisitServer::new(Arc::clone(&state));

        assert!(Arc::ptr_eq(server.state(), &state));
    }

    #[tokio::test]
    async fn test_invalid_host_is_reported() {
        let config = Arc::new(ServerConfig {
            host: "not-an-ip".to_string(),
            salt: Salt::new("pepper"),
            ..ServerConfig::default()
        });
        let state = Arc::new(AppState::new(config, LogSink::console_only()));

        let result = VisitServer::new(state)
            .run_with_shutdown(std::future::ready(()))
            .await;
        assert!(matches!(result, Err(ApiError::Internal(_))));
    }
}
