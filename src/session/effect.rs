//! Effects produced by state transitions

use super::state::Message;

/// Changes to apply to the session after a transition
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Push onto the timeline
    AppendMessage(Message),

    SetConversationId(String),

    /// Replace the session-level error; `None` clears it
    SetError(Option<String>),

    /// Drop every timeline entry
    ClearTimeline,

    /// Send the prompt through the transport
    Dispatch {
        prompt: String,
        conversation_id: String,
    },
}

impl Effect {
    pub fn record_error(message: impl Into<String>) -> Self {
        Effect::SetError(Some(message.into()))
    }

    pub fn clear_error() -> Self {
        Effect::SetError(None)
    }
}
