//! Session controller: owns the message log and drives turns
//!
//! The controller applies pure transitions from [`crate::state_machine`] and
//! executes the resulting effects: spawning the backend request, starting
//! and freezing reveals, and publishing what observers see.

mod controller;

#[cfg(test)]
pub mod testing;

pub use controller::SessionController;

use crate::state_machine::{Message, MessageId, TransitionError, TurnOutcome, TurnState};
use serde::Serialize;
use thiserror::Error;

/// Snapshot of everything a front-end renders
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub messages: Vec<Message>,
    pub loading: bool,
    pub streaming_target: Option<MessageId>,
    pub cancellation_requested: bool,
    pub can_stop: bool,
}

impl SessionView {
    fn apply_state(&mut self, state: &TurnState) {
        self.loading = state.is_loading();
        self.streaming_target = state.streaming_target();
        self.cancellation_requested = state.is_cancellation_requested();
        self.can_stop = state.can_stop();
    }
}

/// Incremental change notifications, in the order they happened
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionUpdate {
    MessageAppended(Message),
    /// Newly revealed text for the streaming target
    ContentAppended {
        message_id: MessageId,
        /// Byte length of the content before this chunk
        offset: usize,
        chunk: String,
    },
    StateChanged(TurnState),
    TurnFinished {
        outcome: TurnOutcome,
    },
    /// A submit was refused; nothing was appended or sent
    Rejected {
        reason: String,
    },
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("{0}")]
    Rejected(#[from] TransitionError),
}
