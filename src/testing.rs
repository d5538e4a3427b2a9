//! Test doubles for the transport and configuration seams

use crate::chat::{QueryData, QueryResponse, Transport, TransportError};
use crate::config::{ChatConfig, ConfigError, ConfigRepository};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use tokio::sync::Notify;

/// A request as seen by a test transport
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub prompt: String,
    pub conversation_id: String,
    pub config: ChatConfig,
}

/// Successful envelope with the given answer, traces and request date
pub fn answer_response(answer: &str, sql_queries: Vec<String>, request_date: &str) -> QueryResponse {
    QueryResponse {
        data: QueryData {
            answer: answer.to_string(),
            sql_queries,
            request_date: request_date.to_string(),
            ..Default::default()
        },
        success: true,
        message: String::new(),
        links: serde_json::json!({}),
    }
}

// ============================================================================
// Scripted Transport
// ============================================================================

/// Transport that returns queued results in order
pub struct ScriptedTransport {
    results: Mutex<VecDeque<Result<QueryResponse, TransportError>>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self {
            results: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn queue_response(&self, response: QueryResponse) {
        self.results.lock().unwrap().push_back(Ok(response));
    }

    pub fn queue_error(&self, error: TransportError) {
        self.results.lock().unwrap().push_back(Err(error));
    }

    pub fn recorded_requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(
        &self,
        prompt: &str,
        conversation_id: &str,
        config: &ChatConfig,
    ) -> Result<QueryResponse, TransportError> {
        self.requests.lock().unwrap().push(RecordedRequest {
            prompt: prompt.to_string(),
            conversation_id: conversation_id.to_string(),
            config: config.clone(),
        });
        self.results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::unknown("No scripted result queued")))
    }
}

// ============================================================================
// Gated Transport
// ============================================================================

/// Transport that parks every request until the test releases it
pub struct GatedTransport {
    result: Result<QueryResponse, TransportError>,
    /// Signalled once a request has arrived
    pub started: Notify,
    /// Notify once to let the parked request complete
    pub release: Notify,
}

impl GatedTransport {
    pub fn new(result: Result<QueryResponse, TransportError>) -> Self {
        Self {
            result,
            started: Notify::new(),
            release: Notify::new(),
        }
    }
}

#[async_trait]
impl Transport for GatedTransport {
    async fn send(
        &self,
        _prompt: &str,
        _conversation_id: &str,
        _config: &ChatConfig,
    ) -> Result<QueryResponse, TransportError> {
        self.started.notify_one();
        self.release.notified().await;
        self.result.clone()
    }
}

// ============================================================================
// Memory Config Repository
// ============================================================================

/// In-memory configuration repository, optionally failing every save
pub struct MemoryConfigRepository {
    stored: Mutex<Option<ChatConfig>>,
    fail_saves: bool,
}

impl MemoryConfigRepository {
    pub fn new(config: Option<ChatConfig>) -> Self {
        Self {
            stored: Mutex::new(config),
            fail_saves: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            stored: Mutex::new(None),
            fail_saves: true,
        }
    }

    pub fn saved(&self) -> Option<ChatConfig> {
        self.stored.lock().unwrap().clone()
    }
}

impl ConfigRepository for MemoryConfigRepository {
    fn load(&self) -> Result<Option<ChatConfig>, ConfigError> {
        Ok(self.saved())
    }

    fn save(&self, config: &ChatConfig) -> Result<(), ConfigError> {
        if self.fail_saves {
            return Err(ConfigError::Io {
                path: "memory".into(),
                source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
            });
        }
        *self.stored.lock().unwrap() = Some(config.clone());
        Ok(())
    }
}
