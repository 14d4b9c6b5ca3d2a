//! Core conversation engine
//!
//! Implements the Elm Architecture pattern with pure state transitions. The
//! engine keeps nothing between events: pending actions and counters are read
//! from the stores through effects whose results come back as events.

mod command;
mod context;
mod effect;
mod event;
pub mod reply;
mod transition;

#[cfg(test)]
mod proptests;

pub use command::{is_command, CallbackAction, CallbackVerb};
pub use context::ConvContext;
pub use effect::Effect;
pub use event::{Event, MessageHandle};
pub use reply::{Keyboard, Reply};
pub use transition::{transition, TransitionResult};
