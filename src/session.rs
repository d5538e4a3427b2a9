//! Conversation orchestration
//!
//! `ConversationStore` is the single owner of the session: configuration,
//! message timeline, conversation id, loading flag and last error. Every
//! mutation goes through the pure exchange state machine in `transition`.

mod effect;
mod event;
mod state;
mod transition;

#[cfg(test)]
mod proptests;

pub use effect::Effect;
pub use event::Event;
pub use state::{Author, ExchangeState, Message, SessionState, SessionUpdate};
pub use transition::{transition, TransitionError, TransitionResult};

use crate::chat::Transport;
use crate::config::{ChatConfig, ConfigError, ConfigRepository};
use crate::ids::new_id;
use chrono::Utc;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tokio::sync::broadcast;

/// Session error recorded when a prompt arrives before any configuration
pub const CONFIGURATION_MISSING: &str = "Please configure the UserId and service URL first";

/// Recorded when the caller stops waiting for an answer
pub const REQUEST_CANCELLED: &str = "Request cancelled before an answer arrived";

const UPDATE_CHANNEL_CAPACITY: usize = 128;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Please configure the UserId and service URL first")]
    ConfigurationMissing,
    #[error("A request is already in flight, wait for the answer before sending another prompt")]
    Busy,
    #[error("Cannot start a new conversation while a request is in flight")]
    ExchangeInFlight,
    #[error("Configuration was applied but could not be saved: {0}")]
    Persist(#[from] ConfigError),
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
}

impl From<TransitionError> for SessionError {
    fn from(e: TransitionError) -> Self {
        match e {
            TransitionError::Busy => SessionError::Busy,
            TransitionError::ExchangeInFlight => SessionError::ExchangeInFlight,
            TransitionError::InvalidTransition(msg) => SessionError::InvalidTransition(msg),
        }
    }
}

struct Inner {
    state: SessionState,
    config_loaded: bool,
}

/// Fails the dispatched exchange if `submit` is dropped before the
/// transport returns, so the session never stays `Dispatched`.
struct InFlight<'a> {
    store: &'a ConversationStore,
    armed: bool,
}

impl InFlight<'_> {
    fn complete(mut self, event: Event) -> Result<Option<Message>, SessionError> {
        self.armed = false;
        self.store.finish(event)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        tracing::warn!("Request abandoned before an answer arrived");
        let cancelled = Event::Failed {
            message_id: new_id(),
            error: REQUEST_CANCELLED.to_string(),
            at: Utc::now(),
        };
        if let Err(e) = self.store.finish(cancelled) {
            tracing::error!(error = %e, "Failed to close abandoned request");
        }
    }
}

/// Authoritative holder of the session state
pub struct ConversationStore {
    inner: Mutex<Inner>,
    transport: Arc<dyn Transport>,
    repository: Arc<dyn ConfigRepository>,
    updates: broadcast::Sender<SessionUpdate>,
}

impl ConversationStore {
    pub fn new(transport: Arc<dyn Transport>, repository: Arc<dyn ConfigRepository>) -> Self {
        let (updates, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        Self {
            inner: Mutex::new(Inner {
                state: SessionState::new(new_id()),
                config_loaded: false,
            }),
            transport,
            repository,
            updates,
        }
    }

    // The guard is never held across an await, so a poisoned lock only means
    // a panic elsewhere; the state itself is still consistent.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, updates: Vec<SessionUpdate>) {
        for update in updates {
            // No receivers is fine
            let _ = self.updates.send(update);
        }
    }

    /// Current configuration, read from the repository on first access
    pub fn get_configuration(&self) -> Option<ChatConfig> {
        let mut inner = self.lock();
        if !inner.config_loaded {
            inner.config_loaded = true;
            inner.state.config = match self.repository.load() {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!(error = %e, "Ignoring unreadable configuration");
                    None
                }
            };
        }
        inner.state.config.clone()
    }

    /// Replace the configuration and persist it.
    ///
    /// The in-memory update stands even when the write fails.
    pub fn set_configuration(&self, config: ChatConfig) -> Result<(), SessionError> {
        {
            let mut inner = self.lock();
            inner.config_loaded = true;
            inner.state.config = Some(config.clone());
        }
        self.publish(vec![SessionUpdate::ConfigurationChanged(config.clone())]);

        if let Err(e) = self.repository.save(&config) {
            tracing::error!(error = %e, "Failed to persist configuration");
            return Err(SessionError::Persist(e));
        }
        tracing::info!(user_id = %config.user_id, use_mock = config.use_mock, "Configuration updated");
        Ok(())
    }

    /// Send one prompt and wait for the answer.
    ///
    /// Returns the system message appended for the answer or failure, or
    /// `None` when the prompt was blank. Transport failures are not errors
    /// here: they end up in the timeline and in the session error.
    pub async fn submit(&self, prompt: &str) -> Result<Option<Message>, SessionError> {
        let Some(config) = self.get_configuration() else {
            let update = self.lock().state.record_error(CONFIGURATION_MISSING);
            self.publish(update.into_iter().collect());
            return Err(SessionError::ConfigurationMissing);
        };

        if prompt.trim().is_empty() {
            return Ok(None);
        }

        let processed = self.lock().state.process(Event::Submit {
            prompt: prompt.to_string(),
            conversation_id: new_id(),
            message_id: new_id(),
            at: Utc::now(),
        })?;
        let dispatch = processed.dispatch.clone();
        self.publish(processed.updates);

        let Some(dispatch) = dispatch else {
            return Err(SessionError::InvalidTransition(
                "submit produced no request".to_string(),
            ));
        };

        tracing::debug!(conversation_id = %dispatch.conversation_id, "Dispatching prompt");
        let in_flight = InFlight {
            store: self,
            armed: true,
        };
        let event = match self
            .transport
            .send(&dispatch.prompt, &dispatch.conversation_id, &config)
            .await
        {
            Ok(response) => Event::Answered {
                message_id: new_id(),
                at: response.data.requested_at().unwrap_or_else(Utc::now),
                answer: response.data.answer,
                sql_queries: response.data.sql_queries,
            },
            Err(e) => Event::Failed {
                message_id: new_id(),
                error: e.message,
                at: Utc::now(),
            },
        };
        in_flight.complete(event)
    }

    /// Feed the outcome of the dispatched request back into the session
    fn finish(&self, event: Event) -> Result<Option<Message>, SessionError> {
        let processed = self.lock().state.process(event)?;
        let appended = processed.appended().cloned();
        self.publish(processed.updates);
        Ok(appended)
    }

    /// Start over with an empty timeline and a fresh conversation id
    pub fn reset_conversation(&self) -> Result<(), SessionError> {
        let processed = self.lock().state.process(Event::Reset {
            conversation_id: new_id(),
        })?;
        self.publish(processed.updates);
        Ok(())
    }

    pub fn clear_error(&self) {
        // ClearError is accepted in every exchange state
        if let Ok(processed) = self.lock().state.process(Event::ClearError) {
            self.publish(processed.updates);
        }
    }

    pub fn snapshot(&self) -> SessionState {
        self.lock().state.clone()
    }

    pub fn messages(&self) -> Vec<Message> {
        self.lock().state.messages.clone()
    }

    pub fn conversation_id(&self) -> String {
        self.lock().state.conversation_id.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.lock().state.is_loading()
    }

    pub fn error(&self) -> Option<String> {
        self.lock().state.error.clone()
    }

    /// Receive every state change from now on
    pub fn subscribe(&self) -> broadcast::Receiver<SessionUpdate> {
        self.updates.subscribe()
    }
}
