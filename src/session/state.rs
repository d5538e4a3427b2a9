//! Session state types

use super::effect::Effect;
use super::event::Event;
use super::transition::{transition, TransitionError};
use crate::config::ChatConfig;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who wrote a timeline entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Author {
    User,
    System,
}

/// One entry in the message timeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    /// Prompt text; system entries repeat the prompt they answer
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sql_queries: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub author: Author,
}

impl Message {
    pub fn user(id: impl Into<String>, prompt: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            prompt: prompt.into(),
            answer: None,
            sql_queries: None,
            error: None,
            timestamp: at,
            author: Author::User,
        }
    }

    pub fn answer(
        id: impl Into<String>,
        prompt: impl Into<String>,
        answer: impl Into<String>,
        sql_queries: Vec<String>,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            prompt: prompt.into(),
            answer: Some(answer.into()),
            sql_queries: Some(sql_queries),
            error: None,
            timestamp: at,
            author: Author::System,
        }
    }

    pub fn failure(
        id: impl Into<String>,
        prompt: impl Into<String>,
        error: impl Into<String>,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            prompt: prompt.into(),
            answer: None,
            sql_queries: None,
            error: Some(error.into()),
            timestamp: at,
            author: Author::System,
        }
    }

    pub fn is_user(&self) -> bool {
        self.author == Author::User
    }

    /// Query traces, empty when there are none
    pub fn traces(&self) -> &[String] {
        self.sql_queries.as_deref().unwrap_or_default()
    }
}

/// Where the single request-response exchange stands
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExchangeState {
    /// Ready for a prompt
    #[default]
    Idle,
    /// Request in flight
    Dispatched {
        conversation_id: String,
        prompt: String,
    },
}

impl ExchangeState {
    pub fn is_loading(&self) -> bool {
        matches!(self, ExchangeState::Dispatched { .. })
    }
}

/// Notifications for the presentation layer
#[derive(Debug, Clone, PartialEq)]
pub enum SessionUpdate {
    MessageAppended(Message),
    LoadingChanged(bool),
    ErrorChanged(Option<String>),
    TimelineCleared { conversation_id: String },
    ConfigurationChanged(ChatConfig),
}

/// A request the caller must now send
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatch {
    pub prompt: String,
    pub conversation_id: String,
}

/// Outcome of feeding one event into the state
#[derive(Debug, Default)]
pub struct Processed {
    pub updates: Vec<SessionUpdate>,
    pub dispatch: Option<Dispatch>,
}

impl Processed {
    /// The system or user message this step appended, if any
    pub fn appended(&self) -> Option<&Message> {
        self.updates.iter().rev().find_map(|u| match u {
            SessionUpdate::MessageAppended(m) => Some(m),
            _ => None,
        })
    }
}

/// Everything the conversation store owns
#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    pub config: Option<ChatConfig>,
    pub messages: Vec<Message>,
    pub conversation_id: String,
    pub exchange: ExchangeState,
    pub error: Option<String>,
}

impl SessionState {
    pub fn new(conversation_id: impl Into<String>) -> Self {
        Self {
            config: None,
            messages: Vec::new(),
            conversation_id: conversation_id.into(),
            exchange: ExchangeState::Idle,
            error: None,
        }
    }

    pub fn is_loading(&self) -> bool {
        self.exchange.is_loading()
    }

    /// Run `event` through the exchange state machine and apply its effects.
    ///
    /// On error nothing is changed.
    pub fn process(&mut self, event: Event) -> Result<Processed, TransitionError> {
        let was_loading = self.is_loading();
        let result = transition(&self.exchange, event)?;
        self.exchange = result.new_state;

        let mut processed = Processed::default();
        for effect in result.effects {
            if let Some(update) = self.apply(effect, &mut processed.dispatch) {
                processed.updates.push(update);
            }
        }
        if was_loading != self.is_loading() {
            processed
                .updates
                .push(SessionUpdate::LoadingChanged(self.is_loading()));
        }
        Ok(processed)
    }

    /// Set the session error without touching the exchange
    pub fn record_error(&mut self, error: impl Into<String>) -> Option<SessionUpdate> {
        self.apply(Effect::record_error(error), &mut None)
    }

    fn apply(&mut self, effect: Effect, dispatch: &mut Option<Dispatch>) -> Option<SessionUpdate> {
        match effect {
            Effect::AppendMessage(message) => {
                self.messages.push(message.clone());
                Some(SessionUpdate::MessageAppended(message))
            }
            Effect::SetConversationId(id) => {
                self.conversation_id = id;
                None
            }
            Effect::SetError(error) => {
                if self.error == error {
                    return None;
                }
                self.error.clone_from(&error);
                Some(SessionUpdate::ErrorChanged(error))
            }
            Effect::ClearTimeline => {
                self.messages.clear();
                Some(SessionUpdate::TimelineCleared {
                    conversation_id: self.conversation_id.clone(),
                })
            }
            Effect::Dispatch {
                prompt,
                conversation_id,
            } => {
                *dispatch = Some(Dispatch {
                    prompt,
                    conversation_id,
                });
                None
            }
        }
    }
}
