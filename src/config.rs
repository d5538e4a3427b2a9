//! User configuration
//!
//! `ChatConfig` is the identity/endpoint/mode record the user submits from the
//! configuration form. It is persisted by a `ConfigRepository`; process-level
//! knobs live in `Settings`.

mod settings;
mod store;

pub use settings::Settings;
pub use store::{ConfigError, ConfigRepository, FileConfigStore};

use reqwest::Url;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Pre-filled service URL in the configuration form
pub const DEFAULT_SERVICE_URL: &str = "http://localhost:7071";
/// Sent as `UserEmail` when none is configured
pub const DEFAULT_USER_EMAIL: &str = "oscar.vivas@arkanosoft.com";
/// Sent as `AttachmentUri` when none is configured
pub const DEFAULT_ATTACHMENT_URI: &str = "localhost";

/// Identity, endpoint and mode for outgoing queries
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatConfig {
    pub user_id: String,
    #[serde(default)]
    pub service_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment_uri: Option<String>,
    /// Answer from the local simulator instead of the service
    #[serde(default)]
    pub use_mock: bool,
}

impl ChatConfig {
    pub fn new(user_id: impl Into<String>, service_url: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            service_url: service_url.into(),
            ..Default::default()
        }
    }

    pub fn user_email_or_default(&self) -> &str {
        non_empty(self.user_email.as_deref()).unwrap_or(DEFAULT_USER_EMAIL)
    }

    pub fn attachment_uri_or_default(&self) -> &str {
        non_empty(self.attachment_uri.as_deref()).unwrap_or(DEFAULT_ATTACHMENT_URI)
    }

    /// Check the invariants the configuration form enforces.
    ///
    /// `user_id` is always required. Outside simulation mode `service_url`
    /// must be a non-empty absolute URL.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.user_id.trim().is_empty() {
            return Err(ValidationError::MissingUserId);
        }
        if self.use_mock {
            return Ok(());
        }

        let url = self.service_url.trim();
        if url.is_empty() {
            return Err(ValidationError::MissingServiceUrl);
        }
        let parsed = Url::parse(url).map_err(|e| ValidationError::InvalidServiceUrl(e.to_string()))?;
        if parsed.cannot_be_a_base() {
            return Err(ValidationError::InvalidServiceUrl(format!(
                "{url} is not a base URL"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
impl ChatConfig {
    /// Simulation-mode config; the service URL is not needed
    pub fn mock(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            use_mock: true,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_user_email(mut self, email: impl Into<String>) -> Self {
        self.user_email = Some(email.into());
        self
    }

    #[must_use]
    pub fn with_attachment_uri(mut self, uri: impl Into<String>) -> Self {
        self.attachment_uri = Some(uri.into());
        self
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

/// Rejected configuration form input
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Please enter a UserId")]
    MissingUserId,
    #[error("Please enter the service URL")]
    MissingServiceUrl,
    #[error("The service URL is not valid: {0}")]
    InvalidServiceUrl(String),
}
