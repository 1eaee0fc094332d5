//! Turn lifecycle state machine
//!
//! Implements the Elm Architecture pattern with pure state transitions.

mod effect;
pub mod event;
pub mod notice;
pub mod state;
pub(crate) mod transition;

#[cfg(test)]
mod proptests;

pub use effect::Effect;
pub use event::Event;
pub use state::{
    Message, MessageId, MessageIdSequence, Role, SessionContext, TurnOutcome, TurnState,
};
pub use transition::{transition, TransitionError};
