//! Events that can occur in a conversation

use super::command::{CallbackAction, CallbackVerb};
use crate::db::{Counter, PendingKind};

/// Transport handle of a message the bot sent earlier and may edit in place
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageHandle(pub i64);

/// Events that trigger state transitions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    // Inbound events from the transport
    Command {
        text: String,
    },
    FreeText {
        text: String,
    },
    Callback {
        reply_to: Option<MessageHandle>,
        payload: String,
    },

    // Store read results
    CountersTallied {
        total: u64,
    },
    PendingLoaded {
        pending: Option<PendingKind>,
        text: String,
    },
    CounterLoaded {
        action: CallbackAction,
        counter: Option<Counter>,
        reply_to: Option<MessageHandle>,
    },
    ActiveListLoaded {
        verb: CallbackVerb,
        counters: Vec<Counter>,
    },
    ArchivedListLoaded {
        counters: Vec<Counter>,
    },

    // Store write results
    CounterCreated {
        counter: Counter,
    },
    /// The pending action vanished between load and creation
    CreationAbandoned,
    CounterSaved {
        counter: Counter,
        reply_to: Option<MessageHandle>,
    },
}

impl Event {
    /// Short name for logs
    pub fn kind(&self) -> &'static str {
        match self {
            Event::Command { .. } => "command",
            Event::FreeText { .. } => "free_text",
            Event::Callback { .. } => "callback",
            Event::CountersTallied { .. } => "counters_tallied",
            Event::PendingLoaded { .. } => "pending_loaded",
            Event::CounterLoaded { .. } => "counter_loaded",
            Event::ActiveListLoaded { .. } => "active_list_loaded",
            Event::ArchivedListLoaded { .. } => "archived_list_loaded",
            Event::CounterCreated { .. } => "counter_created",
            Event::CreationAbandoned => "creation_abandoned",
            Event::CounterSaved { .. } => "counter_saved",
        }
    }
}
