//! HTTP transport to the real query service

use super::error::TransportError;
use super::types::{ErrorBody, QueryRequest, QueryResponse};
use crate::config::ChatConfig;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode};
use std::time::Duration;

const QUERY_PATH: &str = "/api/query";

/// HTTP backend for `POST {service_url}/api/query`
pub struct HttpBackend {
    client: Client,
}

impl HttpBackend {
    /// `timeout` bounds the whole exchange, connect through body
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::unknown(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// Endpoint for a configured base URL
    pub fn query_url(service_url: &str) -> String {
        format!("{}{QUERY_PATH}", service_url.trim().trim_end_matches('/'))
    }

    /// Send one query. Exactly one network attempt.
    pub async fn send(
        &self,
        prompt: &str,
        conversation_id: &str,
        config: &ChatConfig,
    ) -> Result<QueryResponse, TransportError> {
        let body = QueryRequest {
            prompt: prompt.to_string(),
            conversation_id: conversation_id.to_string(),
        };

        let response = self
            .client
            .post(Self::query_url(&config.service_url))
            .header("UserId", &config.user_id)
            .header("UserEmail", config.user_email_or_default())
            .header("AttachmentUri", config.attachment_uri_or_default())
            .header(CONTENT_TYPE, "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| classify_send_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            // The status alone is enough when the body can't be read
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &body));
        }

        let body = response
            .text()
            .await
            .map_err(|e| TransportError::unknown(format!("Failed to read response: {e}")))?;

        serde_json::from_str::<QueryResponse>(&body)
            .map_err(|e| TransportError::unknown(format!("Failed to parse response: {e}")))
    }
}

/// Map a non-success status and its body
pub(crate) fn classify_status(status: StatusCode, body: &str) -> TransportError {
    let server_message = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.message);
    TransportError::server(status.as_u16(), server_message.as_deref())
}

/// Map a failure that happened before any response arrived
pub(crate) fn classify_send_error(e: &reqwest::Error) -> TransportError {
    if e.is_builder() {
        // Malformed URL or header value: nothing was sent
        TransportError::unknown(e.to_string())
    } else if e.is_timeout() || e.is_connect() || e.is_request() {
        TransportError::unreachable()
    } else {
        TransportError::unknown(e.to_string())
    }
}
