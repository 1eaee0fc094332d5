//! Session state types

use crate::transport::RequestKind;
use crate::upload::FileKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

// ============================================================================
// Message Model
// ============================================================================

/// Per-session message identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub u64);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Monotonic id source; never reuses an id within a session
#[derive(Debug, Default)]
pub struct MessageIdSequence {
    next: u64,
}

impl MessageIdSequence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve the ids a single turn may need.
    ///
    /// Unused ids are simply skipped; ids only need to be unique and
    /// increasing, not dense.
    pub fn next_turn(&mut self) -> TurnIds {
        let base = self.next;
        self.next += 3;
        TurnIds {
            prompt: MessageId(base),
            notice: MessageId(base + 1),
            reply: MessageId(base + 2),
        }
    }
}

/// Ids reserved for the messages of one turn, in log order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TurnIds {
    /// User prompt, or the upload notice of a file turn
    pub prompt: MessageId,
    /// "Analyzing your file..." (file turns only)
    pub notice: MessageId,
    /// Bot reply, error, or cancellation notice
    pub reply: MessageId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Bot,
    System,
}

/// Upload metadata surfaced on the message that introduced the file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachedFile {
    pub name: String,
    pub kind: FileKind,
}

/// A message in the session log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: MessageId,
    pub role: Role,
    pub content: String,
    /// Display-only creation time; absent for system messages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_error: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attached_file: Option<AttachedFile>,
}

/// A message decided by a transition, before the executor stamps it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub id: MessageId,
    pub role: Role,
    pub content: String,
    pub is_error: bool,
    pub attached_file: Option<AttachedFile>,
}

impl NewMessage {
    fn new(id: MessageId, role: Role, content: impl Into<String>) -> Self {
        Self {
            id,
            role,
            content: content.into(),
            is_error: false,
            attached_file: None,
        }
    }

    pub fn user(id: MessageId, content: impl Into<String>) -> Self {
        Self::new(id, Role::User, content)
    }

    pub fn bot(id: MessageId, content: impl Into<String>) -> Self {
        Self::new(id, Role::Bot, content)
    }

    pub fn bot_error(id: MessageId, content: impl Into<String>) -> Self {
        Self {
            is_error: true,
            ..Self::new(id, Role::Bot, content)
        }
    }

    pub fn system(id: MessageId, content: impl Into<String>) -> Self {
        Self::new(id, Role::System, content)
    }

    pub fn with_attachment(mut self, attached: AttachedFile) -> Self {
        self.attached_file = Some(attached);
        self
    }

    /// Finalize into a log entry. System messages carry no timestamp.
    pub fn into_message(self, now: DateTime<Utc>) -> Message {
        let timestamp = match self.role {
            Role::System => None,
            Role::User | Role::Bot => Some(now),
        };
        Message {
            id: self.id,
            role: self.role,
            content: self.content,
            timestamp,
            is_error: self.is_error,
            attached_file: self.attached_file,
        }
    }
}

// ============================================================================
// Turn State
// ============================================================================

/// Where the current turn is in its lifecycle
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnState {
    /// No turn active; ready for a submit
    #[default]
    Idle,

    /// Request in flight; `reply_id` is reserved for whatever the turn ends with
    AwaitingResponse {
        kind: RequestKind,
        reply_id: MessageId,
    },

    /// Stop requested while in flight, waiting for the request task to wind down
    CancellingRequest {
        kind: RequestKind,
        reply_id: MessageId,
    },

    /// Bot reply is being revealed into `message_id`
    Revealing { message_id: MessageId },

    /// Reveal frozen by Stop, streaming target kept until the grace delay passes
    CancellingReveal { message_id: MessageId },
}

impl TurnState {
    /// True exactly while a network request is outstanding
    pub fn is_loading(&self) -> bool {
        matches!(
            self,
            TurnState::AwaitingResponse { .. } | TurnState::CancellingRequest { .. }
        )
    }

    pub fn streaming_target(&self) -> Option<MessageId> {
        match self {
            TurnState::Revealing { message_id } | TurnState::CancellingReveal { message_id } => {
                Some(*message_id)
            }
            _ => None,
        }
    }

    pub fn is_cancellation_requested(&self) -> bool {
        matches!(
            self,
            TurnState::CancellingRequest { .. } | TurnState::CancellingReveal { .. }
        )
    }

    /// A request is held or a reply is on screen, including while a stop is
    /// being honored
    pub fn can_stop(&self) -> bool {
        self.is_loading() || self.streaming_target().is_some()
    }

    /// Whether Stop would do anything right now
    pub fn accepts_stop(&self) -> bool {
        matches!(
            self,
            TurnState::AwaitingResponse { .. } | TurnState::Revealing { .. }
        )
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, TurnState::Idle)
    }
}

/// How a turn ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnOutcome {
    /// Reply fully revealed
    Answered,
    /// Request failed; an error message was appended
    Failed,
    CancelledDuringRequest,
    CancelledDuringReveal,
}

/// Default delay between freezing a reveal and releasing its streaming target
pub const DEFAULT_STOP_GRACE: Duration = Duration::from_millis(100);

/// Immutable session configuration seen by transitions
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub stop_grace: Duration,
}

impl Default for SessionContext {
    fn default() -> Self {
        Self {
            stop_grace: DEFAULT_STOP_GRACE,
        }
    }
}
