//! Local stand-in for the query backend
//!
//! Produces responses with the same envelope as the real service, after an
//! artificial delay, so the console can be exercised without a backend.

use super::canned;
use super::types::{QueryData, QueryResponse};
use crate::ids::new_id;
use chrono::{SecondsFormat, Utc};
use rand::{thread_rng, Rng};
use serde_json::{Map, Value};
use std::ops::Range;
use std::time::Duration;

/// Default artificial latency, in milliseconds
pub const DEFAULT_LATENCY_MS: Range<u64> = 1000..3000;

/// Simulated backend
#[derive(Debug, Clone)]
pub struct Simulator {
    latency_ms: Range<u64>,
}

impl Default for Simulator {
    fn default() -> Self {
        Self::new(DEFAULT_LATENCY_MS)
    }
}

impl Simulator {
    pub fn new(latency_ms: Range<u64>) -> Self {
        Self { latency_ms }
    }

    /// Simulator that answers without delay
    #[allow(dead_code)] // Used in tests
    pub fn instant() -> Self {
        Self::new(0..0)
    }

    fn sample_latency(&self) -> Duration {
        if self.latency_ms.is_empty() {
            return Duration::ZERO;
        }
        Duration::from_millis(thread_rng().gen_range(self.latency_ms.clone()))
    }

    /// Answer `prompt` as the backend would. Never fails.
    pub async fn simulate(&self, prompt: &str, conversation_id: &str) -> QueryResponse {
        let delay = self.sample_latency();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let now = Utc::now();
        let (answer, sql_queries) = canned::respond(prompt, conversation_id, now);
        let mut rng = thread_rng();

        QueryResponse {
            data: QueryData {
                prompt: prompt.to_string(),
                answer,
                tokens: rng.gen_range(10_000..15_000),
                prompt_tokens: rng.gen_range(8_000..11_000),
                completion_tokens: rng.gen_range(1_000..3_000),
                request_date: now.to_rfc3339_opts(SecondsFormat::Millis, true),
                request_id: new_id(),
                suggested_questions: vec![],
                request_time: rng.gen_range(100.0..300.0),
                conversation_id: conversation_id.to_string(),
                suggested_prompt: prompt.to_string(),
                sql_queries,
            },
            success: true,
            message: String::new(),
            links: Value::Object(Map::new()),
        }
    }
}
