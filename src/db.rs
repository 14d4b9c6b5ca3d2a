//! Database module for the row counter bot
//!
//! Provides persistence for counters and pending actions.

mod schema;

pub use schema::*;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Counter not found: {conversation_id}/{id}")]
    CounterNotFound {
        conversation_id: ConversationId,
        id: CounterId,
    },
    #[error("Invalid stored value: {0}")]
    InvalidValue(String),
    #[error("Database connection lock poisoned")]
    LockPoisoned,
}

pub type DbResult<T> = Result<T, DbError>;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const COUNTER_COLUMNS: &str = "id, conversation_id, name, row_count, archived";

/// Thread-safe database handle
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    /// Open an in-memory database (for testing)
    #[allow(dead_code)] // Used in tests
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    fn conn(&self) -> DbResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| DbError::LockPoisoned)
    }

    /// Idempotent: safe to run on every startup
    fn run_migrations(&self) -> DbResult<()> {
        let conn = self.conn()?;
        conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    // ==================== Counter Operations ====================

    /// Create a counter with the next free id of the conversation
    pub fn create_counter(&self, conversation_id: ConversationId, name: &str) -> DbResult<Counter> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let counter = insert_next_counter(&tx, conversation_id, name)?;
        tx.commit()?;
        Ok(counter)
    }

    /// Get a counter by its conversation-local id
    pub fn get_counter(&self, conversation_id: ConversationId, id: CounterId) -> DbResult<Counter> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {COUNTER_COLUMNS} FROM counters WHERE conversation_id = ?1 AND id = ?2"
        );
        conn.query_row(&sql, params![conversation_id, id], counter_from_row)
            .optional()?
            .ok_or(DbError::CounterNotFound { conversation_id, id })
    }

    /// Non-archived counters, newest first, at most `limit`
    pub fn list_active_counters(
        &self,
        conversation_id: ConversationId,
        limit: usize,
    ) -> DbResult<Vec<Counter>> {
        let conn = self.conn()?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let sql = format!(
            "SELECT {COUNTER_COLUMNS} FROM counters
             WHERE conversation_id = ?1 AND archived = 0
             ORDER BY id DESC
             LIMIT ?2"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![conversation_id, limit], counter_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Archived counters, newest first
    pub fn list_archived_counters(&self, conversation_id: ConversationId) -> DbResult<Vec<Counter>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {COUNTER_COLUMNS} FROM counters
             WHERE conversation_id = ?1 AND archived = 1
             ORDER BY id DESC"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![conversation_id], counter_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Number of counters in the conversation, archived ones included
    pub fn count_counters(&self, conversation_id: ConversationId) -> DbResult<u64> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM counters WHERE conversation_id = ?1",
            params![conversation_id],
            |row| row.get(0),
        )?;
        u64::try_from(count).map_err(|e| DbError::InvalidValue(e.to_string()))
    }

    /// Persist the mutable fields of a counter. The name is immutable.
    pub fn save_counter(&self, counter: &Counter) -> DbResult<()> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE counters SET row_count = ?1, archived = ?2
             WHERE conversation_id = ?3 AND id = ?4",
            params![counter.count, counter.archived, counter.conversation_id, counter.id],
        )?;
        if updated == 0 {
            return Err(DbError::CounterNotFound {
                conversation_id: counter.conversation_id,
                id: counter.id,
            });
        }
        Ok(())
    }

    // ==================== Pending Action Operations ====================

    pub fn get_pending_action(
        &self,
        conversation_id: ConversationId,
    ) -> DbResult<Option<PendingAction>> {
        let conn = self.conn()?;
        let kind: Option<String> = conn
            .query_row(
                "SELECT kind FROM pending_actions WHERE conversation_id = ?1",
                params![conversation_id],
                |row| row.get(0),
            )
            .optional()?;

        kind.map(|kind| -> DbResult<PendingAction> {
            Ok(PendingAction {
                conversation_id,
                kind: kind.parse().map_err(DbError::InvalidValue)?,
            })
        })
        .transpose()
    }

    /// Replace whatever is pending for the conversation in one statement
    pub fn replace_pending_action(
        &self,
        conversation_id: ConversationId,
        kind: PendingKind,
    ) -> DbResult<PendingAction> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO pending_actions (conversation_id, kind, created_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(conversation_id) DO UPDATE
             SET kind = excluded.kind, created_at = excluded.created_at",
            params![conversation_id, kind.as_str(), Utc::now().to_rfc3339()],
        )?;
        Ok(PendingAction {
            conversation_id,
            kind,
        })
    }

    /// Returns whether a record was removed
    pub fn clear_pending_action(&self, conversation_id: ConversationId) -> DbResult<bool> {
        let conn = self.conn()?;
        let removed = conn.execute(
            "DELETE FROM pending_actions WHERE conversation_id = ?1",
            params![conversation_id],
        )?;
        Ok(removed > 0)
    }

    /// Consume an `AwaitingCounterName` pending action and create the counter.
    ///
    /// Id computation, pending removal and insert commit together. Returns
    /// `None` (and changes nothing) when no such pending action exists.
    pub fn complete_pending_creation(
        &self,
        conversation_id: ConversationId,
        name: &str,
    ) -> DbResult<Option<Counter>> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let removed = tx.execute(
            "DELETE FROM pending_actions WHERE conversation_id = ?1 AND kind = ?2",
            params![conversation_id, PendingKind::AwaitingCounterName.as_str()],
        )?;
        if removed == 0 {
            // Dropping the transaction rolls it back
            return Ok(None);
        }

        let counter = insert_next_counter(&tx, conversation_id, name)?;
        tx.commit()?;
        Ok(Some(counter))
    }
}

fn insert_next_counter(
    tx: &Transaction<'_>,
    conversation_id: ConversationId,
    name: &str,
) -> DbResult<Counter> {
    let next_id: i64 = tx.query_row(
        "SELECT COALESCE(MAX(id), -1) + 1 FROM counters WHERE conversation_id = ?1",
        params![conversation_id],
        |row| row.get(0),
    )?;
    let id = CounterId::try_from(next_id).map_err(|e| DbError::InvalidValue(e.to_string()))?;

    tx.execute(
        "INSERT INTO counters (id, conversation_id, name, row_count, archived, created_at)
         VALUES (?1, ?2, ?3, 0, 0, ?4)",
        params![id, conversation_id, name, Utc::now().to_rfc3339()],
    )?;

    Ok(Counter::new(id, conversation_id, name))
}

fn counter_from_row(row: &Row<'_>) -> rusqlite::Result<Counter> {
    Ok(Counter {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        name: row.get(2)?,
        count: row.get(3)?,
        archived: row.get(4)?,
    })
}
