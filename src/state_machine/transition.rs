//! Pure state transition function
//!
//! Given the same state, context, and event this always produces the same
//! new state and effects. All I/O happens in the executor.

use super::notice::{failure_notice, upload_notice, ANALYZING_FILE, CANCELLED_BY_USER};
use super::state::{AttachedFile, NewMessage, SessionContext, TurnOutcome, TurnState};
use super::{Effect, Event};
use crate::transport::{Request, RequestKind, TransportErrorKind};
use thiserror::Error;

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: TurnState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: TurnState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    /// Keep the current state and do nothing
    pub fn unchanged(state: &TurnState) -> Self {
        Self::new(state.clone())
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn with_effects(mut self, effects: impl IntoIterator<Item = Effect>) -> Self {
        self.effects.extend(effects);
        self
    }
}

/// Errors that can occur during transition
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("A response is still in progress (stop it first)")]
    TurnInProgress,
    #[error("Cancellation in progress")]
    CancellationInProgress,
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
}

/// Pure transition function
#[allow(clippy::too_many_lines)] // One arm per state/event pair
pub fn transition(
    state: &TurnState,
    context: &SessionContext,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    match (state, event) {
        // ============================================================
        // Submit
        // ============================================================

        (TurnState::Idle, Event::Submit { request, ids }) => match request {
            Request::Text { prompt } => {
                let prompt = prompt.trim();
                if prompt.is_empty() {
                    return Ok(TransitionResult::unchanged(state));
                }
                let prompt = prompt.to_string();
                Ok(TransitionResult::new(TurnState::AwaitingResponse {
                    kind: RequestKind::Text,
                    reply_id: ids.reply,
                })
                .with_effect(Effect::append(NewMessage::user(ids.prompt, prompt.clone())))
                .with_effect(Effect::PublishState)
                .with_effect(Effect::SendRequest {
                    request: Request::Text { prompt },
                }))
            }
            Request::File { file, prompt } => {
                let prompt = prompt
                    .map(|p| p.trim().to_string())
                    .filter(|p| !p.is_empty());
                let attached = AttachedFile {
                    name: file.name().to_string(),
                    kind: file.kind(),
                };
                let notice = upload_notice(file.name(), prompt.as_deref());
                Ok(TransitionResult::new(TurnState::AwaitingResponse {
                    kind: RequestKind::File,
                    reply_id: ids.reply,
                })
                .with_effects([
                    Effect::append(
                        NewMessage::system(ids.prompt, notice).with_attachment(attached),
                    ),
                    Effect::append(NewMessage::system(ids.notice, ANALYZING_FILE)),
                    Effect::PublishState,
                    Effect::SendRequest {
                        request: Request::File { file, prompt },
                    },
                ]))
            }
        },

        (
            TurnState::AwaitingResponse { .. } | TurnState::Revealing { .. },
            Event::Submit { .. },
        ) => Err(TransitionError::TurnInProgress),

        (
            TurnState::CancellingRequest { .. } | TurnState::CancellingReveal { .. },
            Event::Submit { .. },
        ) => Err(TransitionError::CancellationInProgress),

        // ============================================================
        // Request Resolution
        // ============================================================

        (TurnState::AwaitingResponse { reply_id, .. }, Event::RequestSucceeded { text }) => {
            Ok(TransitionResult::new(TurnState::Revealing {
                message_id: *reply_id,
            })
            .with_effects([
                Effect::ReleaseRequest,
                Effect::append(NewMessage::bot(*reply_id, "")),
                Effect::PublishState,
                Effect::StartReveal {
                    message_id: *reply_id,
                    text,
                },
            ]))
        }

        (TurnState::AwaitingResponse { kind, reply_id }, Event::RequestFailed { error }) => {
            let outcome = if error.kind == TransportErrorKind::Cancelled {
                TurnOutcome::CancelledDuringRequest
            } else {
                TurnOutcome::Failed
            };
            Ok(TransitionResult::new(TurnState::Idle).with_effects([
                Effect::ReleaseRequest,
                Effect::append(NewMessage::bot_error(
                    *reply_id,
                    failure_notice(error.kind, *kind),
                )),
                Effect::PublishState,
                Effect::turn_finished(outcome),
            ]))
        }

        // Whatever the request produced after Stop is discarded
        (
            TurnState::CancellingRequest { reply_id, .. },
            Event::RequestSucceeded { .. } | Event::RequestFailed { .. },
        ) => Ok(TransitionResult::new(TurnState::Idle).with_effects([
            Effect::ReleaseRequest,
            Effect::append(NewMessage::bot_error(*reply_id, CANCELLED_BY_USER)),
            Effect::PublishState,
            Effect::turn_finished(TurnOutcome::CancelledDuringRequest),
        ])),

        (
            TurnState::Idle | TurnState::Revealing { .. } | TurnState::CancellingReveal { .. },
            Event::RequestSucceeded { .. } | Event::RequestFailed { .. },
        ) => Err(TransitionError::InvalidTransition(format!(
            "request resolved with no request in flight ({state:?})"
        ))),

        // ============================================================
        // Reveal Progress
        // ============================================================

        (
            TurnState::Revealing { message_id },
            Event::RevealProgress {
                message_id: target,
                chunk,
            },
        ) if *message_id == target => {
            Ok(TransitionResult::unchanged(state).with_effect(Effect::AppendContent {
                message_id: target,
                chunk,
            }))
        }

        (TurnState::Revealing { message_id }, Event::RevealCompleted { message_id: target })
            if *message_id == target =>
        {
            Ok(TransitionResult::new(TurnState::Idle).with_effects([
                Effect::ReleaseReveal,
                Effect::PublishState,
                Effect::turn_finished(TurnOutcome::Answered),
            ]))
        }

        // Stale reveal events: stopped reveal, or an earlier turn's target
        (_, Event::RevealProgress { .. } | Event::RevealCompleted { .. }) => {
            Ok(TransitionResult::unchanged(state))
        }

        // ============================================================
        // Stop
        // ============================================================

        (TurnState::AwaitingResponse { kind, reply_id }, Event::Stop) => {
            Ok(TransitionResult::new(TurnState::CancellingRequest {
                kind: *kind,
                reply_id: *reply_id,
            })
            .with_effects([Effect::AbortRequest, Effect::PublishState]))
        }

        (TurnState::Revealing { message_id }, Event::Stop) => {
            Ok(TransitionResult::new(TurnState::CancellingReveal {
                message_id: *message_id,
            })
            .with_effects([
                Effect::StopReveal,
                Effect::PublishState,
                Effect::ScheduleStreamRelease {
                    message_id: *message_id,
                    delay: context.stop_grace,
                },
            ]))
        }

        // Nothing to stop, or already stopping
        (
            TurnState::Idle
            | TurnState::CancellingRequest { .. }
            | TurnState::CancellingReveal { .. },
            Event::Stop,
        ) => Ok(TransitionResult::unchanged(state)),

        // ============================================================
        // Stop Grace
        // ============================================================

        (TurnState::CancellingReveal { message_id }, Event::StopGraceElapsed { message_id: target })
            if *message_id == target =>
        {
            Ok(TransitionResult::new(TurnState::Idle).with_effects([
                Effect::ReleaseReveal,
                Effect::PublishState,
                Effect::turn_finished(TurnOutcome::CancelledDuringReveal),
            ]))
        }

        (_, Event::StopGraceElapsed { .. }) => Ok(TransitionResult::unchanged(state)),
    }
}
