//! Database schema and types

use std::fmt;
use std::str::FromStr;

/// SQL schema for initialization
pub const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS counters (
    id INTEGER NOT NULL,
    conversation_id INTEGER NOT NULL,
    name TEXT NOT NULL,
    row_count INTEGER NOT NULL DEFAULT 0,
    archived BOOLEAN NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,

    PRIMARY KEY (id, conversation_id)
);

CREATE INDEX IF NOT EXISTS idx_counters_conversation ON counters(conversation_id);

CREATE TABLE IF NOT EXISTS pending_actions (
    conversation_id INTEGER PRIMARY KEY,
    kind TEXT NOT NULL,
    created_at TEXT NOT NULL
);
";

/// Stable numeric id of a chat
pub type ConversationId = i64;

/// Counter id, unique only within its conversation
pub type CounterId = u32;

/// Counter record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Counter {
    pub id: CounterId,
    pub conversation_id: ConversationId,
    pub name: String,
    pub count: u32,
    pub archived: bool,
}

impl Counter {
    pub fn new(id: CounterId, conversation_id: ConversationId, name: impl Into<String>) -> Self {
        Self {
            id,
            conversation_id,
            name: name.into(),
            count: 0,
            archived: false,
        }
    }

    pub fn increase(&mut self) {
        self.count = self.count.saturating_add(1);
    }

    /// Never goes below zero
    pub fn decrease(&mut self) {
        self.count = self.count.saturating_sub(1);
    }

    /// One-way: there is no unarchive
    pub fn archive(&mut self) {
        self.archived = true;
    }
}

/// What the next free-text message of a conversation is expected to be.
///
/// Only `AwaitingCounterName` has a wired transition. The confirm states are
/// persisted and loaded like any other kind but no command creates them, and
/// free text arriving while one is pending is answered as unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PendingKind {
    AwaitingCounterName,
    AwaitingArchiveConfirm,
    AwaitingUnarchiveConfirm,
}

impl PendingKind {
    pub fn as_str(self) -> &'static str {
        match self {
            PendingKind::AwaitingCounterName => "awaiting_counter_name",
            PendingKind::AwaitingArchiveConfirm => "awaiting_archive_confirm",
            PendingKind::AwaitingUnarchiveConfirm => "awaiting_unarchive_confirm",
        }
    }
}

impl fmt::Display for PendingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PendingKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "awaiting_counter_name" => Ok(PendingKind::AwaitingCounterName),
            "awaiting_archive_confirm" => Ok(PendingKind::AwaitingArchiveConfirm),
            "awaiting_unarchive_confirm" => Ok(PendingKind::AwaitingUnarchiveConfirm),
            other => Err(format!("unknown pending kind: {other}")),
        }
    }
}

/// At most one per conversation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingAction {
    pub conversation_id: ConversationId,
    pub kind: PendingKind,
}
