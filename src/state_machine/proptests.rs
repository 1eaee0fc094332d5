//! Property-based tests for the state machine
//!
//! These tests verify key invariants hold across all possible inputs.

use super::notice::{failure_notice, CANCELLED_BY_USER};
use super::state::{NewMessage, TurnIds};
use super::*;
use crate::transport::{Request, RequestKind, TransportError, TransportErrorKind};
use crate::upload::UploadFile;
use proptest::prelude::*;

// ============================================================================
// Test Helpers
// ============================================================================

fn test_context() -> SessionContext {
    SessionContext::default()
}

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_message_id() -> impl Strategy<Value = MessageId> {
    (0u64..12).prop_map(MessageId)
}

fn arb_turn_ids() -> impl Strategy<Value = TurnIds> {
    (0u64..4).prop_map(|n| TurnIds {
        prompt: MessageId(n * 3),
        notice: MessageId(n * 3 + 1),
        reply: MessageId(n * 3 + 2),
    })
}

fn arb_request_kind() -> impl Strategy<Value = RequestKind> {
    prop_oneof![Just(RequestKind::Text), Just(RequestKind::File)]
}

fn arb_error_kind() -> impl Strategy<Value = TransportErrorKind> {
    prop_oneof![
        Just(TransportErrorKind::Cancelled),
        Just(TransportErrorKind::Timeout),
        (100u16..600).prop_map(|status| TransportErrorKind::ServerError { status }),
        Just(TransportErrorKind::Network),
        Just(TransportErrorKind::InvalidResponse),
    ]
}

fn arb_request() -> impl Strategy<Value = Request> {
    prop_oneof![
        "[a-zA-Z ?]{0,30}".prop_map(|prompt: String| Request::text(prompt)),
        (
            "[a-z]{1,8}",
            prop_oneof![Just(".py"), Just(".cpp")],
            proptest::option::of("[a-z ]{0,20}"),
        )
            .prop_map(|(stem, ext, prompt)| {
                let file = UploadFile::new(format!("{stem}{ext}"), b"print(1)".to_vec()).unwrap();
                Request::file(file, prompt)
            }),
    ]
}

fn arb_busy_state() -> impl Strategy<Value = TurnState> {
    prop_oneof![
        (arb_request_kind(), arb_message_id())
            .prop_map(|(kind, reply_id)| TurnState::AwaitingResponse { kind, reply_id }),
        arb_message_id().prop_map(|message_id| TurnState::Revealing { message_id }),
    ]
}

fn arb_cancelling_state() -> impl Strategy<Value = TurnState> {
    prop_oneof![
        (arb_request_kind(), arb_message_id())
            .prop_map(|(kind, reply_id)| TurnState::CancellingRequest { kind, reply_id }),
        arb_message_id().prop_map(|message_id| TurnState::CancellingReveal { message_id }),
    ]
}

fn arb_state() -> impl Strategy<Value = TurnState> {
    prop_oneof![Just(TurnState::Idle), arb_busy_state(), arb_cancelling_state()]
}

fn arb_event() -> impl Strategy<Value = Event> {
    prop_oneof![
        (arb_request(), arb_turn_ids()).prop_map(|(request, ids)| Event::Submit { request, ids }),
        Just(Event::Stop),
        "[a-zA-Z ]{0,20}".prop_map(|text| Event::RequestSucceeded { text }),
        arb_error_kind().prop_map(|kind| Event::RequestFailed {
            error: TransportError::new(kind, "generated failure"),
        }),
        (arb_message_id(), "[a-zA-Z ]{0,20}")
            .prop_map(|(message_id, chunk)| Event::RevealProgress { message_id, chunk }),
        arb_message_id().prop_map(|message_id| Event::RevealCompleted { message_id }),
        arb_message_id().prop_map(|message_id| Event::StopGraceElapsed { message_id }),
    ]
}

fn appended(effects: &[Effect]) -> Vec<&NewMessage> {
    effects
        .iter()
        .filter_map(|e| match e {
            Effect::AppendMessage(m) => Some(m),
            _ => None,
        })
        .collect()
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    // Busy states reject submits without side effects
    #[test]
    fn prop_busy_rejects_submits(
        state in arb_busy_state(),
        request in arb_request(),
        ids in arb_turn_ids()
    ) {
        let result = transition(&state, &test_context(), Event::Submit { request, ids });
        prop_assert_eq!(result.unwrap_err(), TransitionError::TurnInProgress);
    }

    #[test]
    fn prop_cancelling_rejects_submits(
        state in arb_cancelling_state(),
        request in arb_request(),
        ids in arb_turn_ids()
    ) {
        let result = transition(&state, &test_context(), Event::Submit { request, ids });
        prop_assert_eq!(result.unwrap_err(), TransitionError::CancellationInProgress);
    }

    // Stop never fails, and only does work when there is something to stop
    #[test]
    fn prop_stop_is_total(state in arb_state()) {
        let result = transition(&state, &test_context(), Event::Stop);
        prop_assert!(result.is_ok(), "Stop failed in {:?}", state);
        let result = result.unwrap();

        if state.accepts_stop() {
            prop_assert!(result.new_state.is_cancellation_requested());
            prop_assert!(!result.new_state.accepts_stop());
            prop_assert!(result.new_state.can_stop());
        } else {
            prop_assert_eq!(&result.new_state, &state);
            prop_assert!(result.effects.is_empty());
        }
    }

    // Every failure maps to some message; cancellation always reads the same
    #[test]
    fn prop_classification_is_total(kind in arb_error_kind(), request in arb_request_kind()) {
        let notice = failure_notice(kind, request);
        prop_assert!(!notice.is_empty());
        if kind == TransportErrorKind::Cancelled {
            prop_assert_eq!(notice, CANCELLED_BY_USER);
        }
    }

    // Progress only ever writes to the current streaming target
    #[test]
    fn prop_progress_only_touches_target(state in arb_state(), event in arb_event()) {
        if let Ok(result) = transition(&state, &test_context(), event) {
            for effect in &result.effects {
                if let Effect::AppendContent { message_id, .. } = effect {
                    prop_assert_eq!(
                        &state,
                        &TurnState::Revealing { message_id: *message_id },
                        "content update outside an active reveal"
                    );
                }
            }
        }
    }

    // A failed request always ends the turn with one error message in the reserved slot
    #[test]
    fn prop_failure_ends_turn_with_error_message(
        kind in arb_request_kind(),
        reply_id in arb_message_id(),
        error_kind in arb_error_kind()
    ) {
        let state = TurnState::AwaitingResponse { kind, reply_id };
        let event = Event::RequestFailed { error: TransportError::new(error_kind, "x") };

        let result = transition(&state, &test_context(), event).unwrap();
        prop_assert_eq!(&result.new_state, &TurnState::Idle);

        let messages = appended(&result.effects);
        prop_assert_eq!(messages.len(), 1);
        prop_assert!(messages[0].is_error);
        prop_assert_eq!(messages[0].id, reply_id);
        prop_assert_eq!(messages[0].role, Role::Bot);
    }

    #[test]
    fn prop_idle_accepts_non_blank_text(text in "[a-zA-Z][a-zA-Z ]{0,30}", ids in arb_turn_ids()) {
        let result = transition(
            &TurnState::Idle,
            &test_context(),
            Event::Submit { request: Request::text(text), ids },
        );
        prop_assert!(result.is_ok(), "Idle should accept prompts: {:?}", result);
        let result = result.unwrap();
        prop_assert!(result.new_state.is_loading());
        prop_assert_eq!(
            result.effects.iter().filter(|e| matches!(e, Effect::SendRequest { .. })).count(),
            1
        );
    }

    // Across any event sequence: one request and one reveal at most, and the
    // state flags agree with the handles the effects have opened
    #[test]
    fn prop_event_sequences_keep_single_operation(
        events in proptest::collection::vec(arb_event(), 0..40)
    ) {
        let context = test_context();
        let mut state = TurnState::Idle;
        let mut requests = 0i32;
        let mut reveals = 0i32;

        for event in events {
            // Rejected events leave the state untouched
            if let Ok(result) = transition(&state, &context, event) {
                for effect in &result.effects {
                    match effect {
                        Effect::SendRequest { .. } => requests += 1,
                        Effect::ReleaseRequest => requests -= 1,
                        Effect::StartReveal { .. } => reveals += 1,
                        Effect::ReleaseReveal => reveals -= 1,
                        _ => {}
                    }
                }
                state = result.new_state;
            }

            prop_assert!((0..=1).contains(&requests), "requests = {}", requests);
            prop_assert!((0..=1).contains(&reveals), "reveals = {}", reveals);
            prop_assert!(requests + reveals <= 1);
            prop_assert_eq!(state.is_loading(), requests == 1);
            prop_assert_eq!(state.streaming_target().is_some(), reveals == 1);
        }
    }
}
