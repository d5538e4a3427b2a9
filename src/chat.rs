//! Transport to the query backend
//!
//! Routes each request either to the local simulator or to the real HTTP
//! service, and normalizes both into one response shape or a `TransportError`.

mod canned;
mod error;
mod http;
mod simulator;
mod types;

pub use error::{TransportError, TransportErrorKind, UNREACHABLE_MESSAGE};
pub use http::HttpBackend;
pub use simulator::{Simulator, DEFAULT_LATENCY_MS};
pub use types::*;

use crate::config::ChatConfig;
use async_trait::async_trait;
use std::sync::Arc;

/// Sends one prompt and returns the backend's answer
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(
        &self,
        prompt: &str,
        conversation_id: &str,
        config: &ChatConfig,
    ) -> Result<QueryResponse, TransportError>;
}

/// Production transport: simulator when `use_mock` is set, HTTP otherwise
pub struct ChatClient {
    http: HttpBackend,
    simulator: Simulator,
}

impl ChatClient {
    pub fn new(http: HttpBackend, simulator: Simulator) -> Self {
        Self { http, simulator }
    }
}

#[async_trait]
impl Transport for ChatClient {
    async fn send(
        &self,
        prompt: &str,
        conversation_id: &str,
        config: &ChatConfig,
    ) -> Result<QueryResponse, TransportError> {
        if config.use_mock {
            return Ok(self.simulator.simulate(prompt, conversation_id).await);
        }
        self.http.send(prompt, conversation_id, config).await
    }
}

/// Logging wrapper for transports
pub struct LoggingTransport {
    inner: Arc<dyn Transport>,
}

impl LoggingTransport {
    pub fn new(inner: Arc<dyn Transport>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl Transport for LoggingTransport {
    async fn send(
        &self,
        prompt: &str,
        conversation_id: &str,
        config: &ChatConfig,
    ) -> Result<QueryResponse, TransportError> {
        let mode = if config.use_mock { "mock" } else { "http" };
        let start = std::time::Instant::now();
        let result = self.inner.send(prompt, conversation_id, config).await;
        let duration = start.elapsed();

        match &result {
            Ok(response) => {
                if !response.success {
                    tracing::warn!(
                        conversation_id = %conversation_id,
                        message = %response.message,
                        "Backend flagged response as unsuccessful"
                    );
                }
                tracing::info!(
                    mode,
                    conversation_id = %conversation_id,
                    duration_ms = %duration.as_millis(),
                    tokens = response.data.tokens,
                    sql_queries = response.data.sql_queries.len(),
                    "Query completed"
                );
            }
            Err(e) => {
                tracing::error!(
                    mode,
                    conversation_id = %conversation_id,
                    duration_ms = %duration.as_millis(),
                    kind = e.kind.label(),
                    error = %e.message,
                    "Query failed"
                );
            }
        }

        result
    }
}
