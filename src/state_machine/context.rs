//! Per-conversation context handed to every transition
//!
//! Conversation state itself is not held here: it lives in the stores and is
//! re-read for every event.

use crate::db::ConversationId;

/// Counters shown in an active list, and the creation warning threshold
pub const MAX_ACTIVE_COUNTERS: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvContext {
    pub conversation_id: ConversationId,
    pub max_active_counters: usize,
}

impl ConvContext {
    pub fn new(conversation_id: ConversationId) -> Self {
        Self {
            conversation_id,
            max_active_counters: MAX_ACTIVE_COUNTERS,
        }
    }

    /// Advisory only, and counts archived counters too: creation goes ahead
    /// either way. Strictly greater, so the warning first appears once the
    /// conversation already holds `max + 1` counters.
    pub fn over_capacity(&self, total_counters: u64) -> bool {
        total_counters > self.max_active_counters as u64
    }
}
