//! Events that drive the exchange state machine
//!
//! Identifiers and timestamps are minted by the caller so the transition
//! function stays pure.

use chrono::{DateTime, Utc};

#[derive(Debug, Clone)]
pub enum Event {
    // User events
    Submit {
        prompt: String,
        conversation_id: String,
        message_id: String,
        at: DateTime<Utc>,
    },
    Reset {
        conversation_id: String,
    },
    ClearError,

    // Transport events
    Answered {
        message_id: String,
        answer: String,
        sql_queries: Vec<String>,
        at: DateTime<Utc>,
    },
    Failed {
        message_id: String,
        error: String,
        at: DateTime<Utc>,
    },
}
