//! Pure state transition function
//!
//! `Idle -> Dispatched -> Idle`. At most one exchange is in flight; the
//! store relies on the rejections here to serialize submissions.

use super::effect::Effect;
use super::event::Event;
use super::state::{ExchangeState, Message};
use thiserror::Error;

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: ExchangeState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: ExchangeState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }
}

/// Errors that can occur during transition
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("A request is already in flight, wait for the answer before sending another prompt")]
    Busy,
    #[error("Cannot start a new conversation while a request is in flight")]
    ExchangeInFlight,
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
}

/// Given the same inputs, always produces the same outputs, with no I/O.
pub fn transition(
    state: &ExchangeState,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    match (state, event) {
        // Idle + Submit -> Dispatched
        (
            ExchangeState::Idle,
            Event::Submit {
                prompt,
                conversation_id,
                message_id,
                at,
            },
        ) => Ok(TransitionResult::new(ExchangeState::Dispatched {
            conversation_id: conversation_id.clone(),
            prompt: prompt.clone(),
        })
        .with_effect(Effect::SetConversationId(conversation_id.clone()))
        .with_effect(Effect::AppendMessage(Message::user(
            message_id,
            prompt.clone(),
            at,
        )))
        .with_effect(Effect::clear_error())
        .with_effect(Effect::Dispatch {
            prompt,
            conversation_id,
        })),

        (ExchangeState::Dispatched { .. }, Event::Submit { .. }) => Err(TransitionError::Busy),

        // Dispatched + Answered -> Idle
        (
            ExchangeState::Dispatched { prompt, .. },
            Event::Answered {
                message_id,
                answer,
                sql_queries,
                at,
            },
        ) => Ok(TransitionResult::new(ExchangeState::Idle).with_effect(
            Effect::AppendMessage(Message::answer(
                message_id,
                prompt.clone(),
                answer,
                sql_queries,
                at,
            )),
        )),

        // Dispatched + Failed -> Idle, error shown both inline and as a notice
        (
            ExchangeState::Dispatched { prompt, .. },
            Event::Failed {
                message_id,
                error,
                at,
            },
        ) => Ok(TransitionResult::new(ExchangeState::Idle)
            .with_effect(Effect::record_error(error.clone()))
            .with_effect(Effect::AppendMessage(Message::failure(
                message_id,
                prompt.clone(),
                error,
                at,
            )))),

        (ExchangeState::Idle, Event::Answered { .. } | Event::Failed { .. }) => Err(
            TransitionError::InvalidTransition("no request in flight".to_string()),
        ),

        // Idle + Reset -> Idle with an empty timeline
        (ExchangeState::Idle, Event::Reset { conversation_id }) => {
            Ok(TransitionResult::new(ExchangeState::Idle)
                .with_effect(Effect::SetConversationId(conversation_id))
                .with_effect(Effect::ClearTimeline)
                .with_effect(Effect::clear_error()))
        }

        (ExchangeState::Dispatched { .. }, Event::Reset { .. }) => {
            Err(TransitionError::ExchangeInFlight)
        }

        (state, Event::ClearError) => {
            Ok(TransitionResult::new(state.clone()).with_effect(Effect::clear_error()))
        }
    }
}
