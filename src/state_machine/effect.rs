//! Effects produced by state transitions

use super::command::{CallbackAction, CallbackVerb};
use super::event::MessageHandle;
use super::reply::Reply;
use crate::db::{Counter, PendingKind};

/// Effects to be executed after a transition, in order.
///
/// Reads report back through an [`super::Event`]; a failed store effect
/// abandons the effects after it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Count every counter of the conversation, archived included
    TallyCounters,

    /// Load the pending action to interpret `text` against it
    LoadPending { text: String },

    /// Resolve the counter a callback targets
    LoadCounter {
        action: CallbackAction,
        reply_to: Option<MessageHandle>,
    },

    /// Load active counters for a list reply
    LoadActiveList { verb: CallbackVerb },

    LoadArchivedList,

    /// Replace whatever is pending with `kind`
    ReplacePending { kind: PendingKind },

    /// Next id, clear pending, insert: one atomic unit
    CompleteCreation { name: String },

    /// Persist a mutated counter
    SaveCounter {
        counter: Counter,
        reply_to: Option<MessageHandle>,
    },

    /// Hand a directive to the transport
    Reply(Reply),
}

impl Effect {
    /// True for effects that write to a store
    #[allow(dead_code)] // Used in tests
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            Effect::ReplacePending { .. } | Effect::CompleteCreation { .. } | Effect::SaveCounter { .. }
        )
    }

    pub fn unknown() -> Self {
        Effect::Reply(Reply::Unknown)
    }

    pub fn text(body: impl Into<String>) -> Self {
        Effect::Reply(Reply::text(body))
    }

    pub fn detail(counter: Counter, reply_to: Option<MessageHandle>) -> Self {
        Effect::Reply(Reply::Detail { reply_to, counter })
    }
}
