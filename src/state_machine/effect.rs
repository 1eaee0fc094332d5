//! Effects produced by state transitions

use super::state::{MessageId, NewMessage, TurnOutcome};
use crate::transport::Request;
use std::time::Duration;

/// Effects to be executed after state transition
#[derive(Debug, Clone)]
pub enum Effect {
    /// Append a message to the log
    AppendMessage(NewMessage),

    /// Extend the content of the streaming target
    AppendContent {
        message_id: MessageId,
        chunk: String,
    },

    /// Start the backend request (spawns as background task)
    SendRequest { request: Request },

    /// Cancel the in-flight request through its token
    AbortRequest,

    /// Drop the request's cancellation handle
    ReleaseRequest,

    /// Start revealing `text` into `message_id`
    StartReveal { message_id: MessageId, text: String },

    /// Freeze the active reveal
    StopReveal,

    /// Drop the reveal handle
    ReleaseReveal,

    /// Fire `StopGraceElapsed` after `delay`
    ScheduleStreamRelease {
        message_id: MessageId,
        delay: Duration,
    },

    /// Publish the new state flags to observers
    PublishState,

    NotifyTurnFinished { outcome: TurnOutcome },
}

impl Effect {
    pub fn append(message: NewMessage) -> Self {
        Effect::AppendMessage(message)
    }

    pub fn turn_finished(outcome: TurnOutcome) -> Self {
        Effect::NotifyTurnFinished { outcome }
    }
}
