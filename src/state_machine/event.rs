//! Events that drive a session turn

use super::state::{MessageId, TurnIds};
use crate::transport::{Request, TransportError};

/// Events that trigger state transitions
#[derive(Debug, Clone)]
pub enum Event {
    // User events
    Submit {
        request: Request,
        ids: TurnIds,
    },
    Stop,

    // Transport events
    RequestSucceeded {
        text: String,
    },
    RequestFailed {
        error: TransportError,
    },

    // Reveal events
    RevealProgress {
        message_id: MessageId,
        /// Characters revealed since the previous progress event
        chunk: String,
    },
    RevealCompleted {
        message_id: MessageId,
    },
    StopGraceElapsed {
        message_id: MessageId,
    },
}
