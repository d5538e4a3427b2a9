//! Wire types for the query endpoint

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Body of `POST {base}/api/query`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryRequest {
    #[serde(rename = "Prompt")]
    pub prompt: String,
    #[serde(rename = "ConversationId")]
    pub conversation_id: String,
}

/// Success envelope, shared by the real backend and the simulator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub data: QueryData,
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: String,
    #[serde(rename = "_links", default)]
    pub links: Value,
}

/// Answer payload
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QueryData {
    pub prompt: String,
    pub answer: String,
    pub tokens: u64,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    /// ISO-8601 timestamp as sent by the server
    pub request_date: String,
    pub request_id: String,
    pub suggested_questions: Vec<String>,
    /// Server-side processing time in milliseconds
    pub request_time: f64,
    pub conversation_id: String,
    pub suggested_prompt: String,
    pub sql_queries: Vec<String>,
}

impl QueryData {
    /// Parse `request_date`, if the server sent a usable one
    pub fn requested_at(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.request_date)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }
}

/// Body of a non-success response
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub message: Option<String>,
}
