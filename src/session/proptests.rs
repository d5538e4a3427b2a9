//! Property-based tests for the exchange state machine
//!
//! Random event sequences are fed through `SessionState::process`, the same
//! path the store uses.

use super::*;
use chrono::{TimeZone, Utc};
use proptest::prelude::*;
use std::collections::HashSet;

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_at() -> impl Strategy<Value = chrono::DateTime<Utc>> {
    (1_600_000_000i64..1_900_000_000).prop_map(|secs| {
        Utc.timestamp_opt(secs, 0)
            .single()
            .unwrap_or_else(Utc::now)
    })
}

fn arb_submit() -> impl Strategy<Value = Event> {
    ("[a-zA-Z ]{0,20}", "[a-f0-9]{8}", "[a-f0-9]{8}", arb_at()).prop_map(
        |(prompt, conversation_id, message_id, at)| Event::Submit {
            prompt,
            conversation_id,
            message_id,
            at,
        },
    )
}

fn arb_answered() -> impl Strategy<Value = Event> {
    (
        "[a-f0-9]{8}",
        "[a-zA-Z#* ]{0,40}",
        proptest::collection::vec("SELECT [a-z]{1,8}", 0..3),
        arb_at(),
    )
        .prop_map(|(message_id, answer, sql_queries, at)| Event::Answered {
            message_id,
            answer,
            sql_queries,
            at,
        })
}

fn arb_failed() -> impl Strategy<Value = Event> {
    ("[a-f0-9]{8}", "[a-zA-Z ]{1,30}", arb_at()).prop_map(|(message_id, error, at)| {
        Event::Failed {
            message_id,
            error,
            at,
        }
    })
}

fn arb_event() -> impl Strategy<Value = Event> {
    prop_oneof![
        3 => arb_submit(),
        2 => arb_answered(),
        2 => arb_failed(),
        1 => "[a-f0-9]{8}".prop_map(|conversation_id| Event::Reset { conversation_id }),
        1 => Just(Event::ClearError),
    ]
}

fn system_replies(messages: &[Message]) -> usize {
    messages.iter().filter(|m| !m.is_user()).count()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    // Users and replies alternate; at most one reply is outstanding
    #[test]
    fn prop_timeline_pairs_user_and_reply(events in proptest::collection::vec(arb_event(), 0..40)) {
        let mut state = SessionState::new("initial");

        for event in events {
            let _ = state.process(event);

            let users = state.messages.len() - system_replies(&state.messages);
            let replies = system_replies(&state.messages);
            if state.is_loading() {
                prop_assert_eq!(users, replies + 1);
                prop_assert!(state.messages.last().is_some_and(Message::is_user));
            } else {
                prop_assert_eq!(users, replies);
            }
            for pair in state.messages.chunks(2) {
                prop_assert!(pair[0].is_user());
                if let Some(reply) = pair.get(1) {
                    prop_assert!(!reply.is_user());
                    prop_assert_eq!(&reply.prompt, &pair[0].prompt);
                    prop_assert!(reply.answer.is_some() != reply.error.is_some());
                }
            }
        }
    }

    // A rejected event leaves the whole session untouched
    #[test]
    fn prop_rejected_events_change_nothing(events in proptest::collection::vec(arb_event(), 0..40)) {
        let mut state = SessionState::new("initial");

        for event in events {
            let before = state.clone();
            if state.process(event).is_err() {
                prop_assert_eq!(&state, &before);
            }
        }
    }

    // Loading is true exactly while Dispatched, and every flip is announced
    #[test]
    fn prop_loading_changes_are_announced(events in proptest::collection::vec(arb_event(), 0..40)) {
        let mut state = SessionState::new("initial");

        for event in events {
            let was_loading = state.is_loading();
            let Ok(processed) = state.process(event) else { continue };

            let announced: Vec<bool> = processed
                .updates
                .iter()
                .filter_map(|u| match u {
                    SessionUpdate::LoadingChanged(loading) => Some(*loading),
                    _ => None,
                })
                .collect();
            if was_loading == state.is_loading() {
                prop_assert!(announced.is_empty());
            } else {
                prop_assert_eq!(announced, vec![state.is_loading()]);
            }
            prop_assert_eq!(processed.dispatch.is_some(), !was_loading && state.is_loading());
        }
    }

    // Reset always leaves an empty timeline under the new id
    #[test]
    fn prop_reset_empties_timeline(
        events in proptest::collection::vec(arb_event(), 0..20),
        fresh in "[g-z]{8}",
    ) {
        let mut state = SessionState::new("initial");
        for event in events {
            let _ = state.process(event);
        }

        let result = state.process(Event::Reset { conversation_id: fresh.clone() });
        if state.is_loading() {
            prop_assert_eq!(result.unwrap_err(), TransitionError::ExchangeInFlight);
        } else {
            prop_assert!(result.is_ok());
            prop_assert!(state.messages.is_empty());
            prop_assert_eq!(&state.conversation_id, &fresh);
            prop_assert_eq!(state.error, None);
        }
    }

    // Successive submits carry the ids they were given, so ids never repeat
    // when the caller mints fresh ones
    #[test]
    fn prop_conversation_id_follows_submit(prompts in proptest::collection::vec("[a-z]{1,10}", 1..10)) {
        let mut state = SessionState::new("initial");
        let mut seen = HashSet::new();

        for (i, prompt) in prompts.into_iter().enumerate() {
            let conversation_id = format!("conv-{i}");
            state
                .process(Event::Submit {
                    prompt,
                    conversation_id: conversation_id.clone(),
                    message_id: format!("u-{i}"),
                    at: Utc::now(),
                })
                .unwrap();
            prop_assert_eq!(&state.conversation_id, &conversation_id);
            prop_assert!(seen.insert(state.conversation_id.clone()));

            state
                .process(Event::Failed {
                    message_id: format!("s-{i}"),
                    error: "offline".to_string(),
                    at: Utc::now(),
                })
                .unwrap();
            prop_assert_eq!(state.error.as_deref(), Some("offline"));
        }
    }
}
