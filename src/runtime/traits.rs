//! Trait abstractions for runtime I/O
//!
//! These traits enable testing the executor with mock implementations.

use crate::db::{
    ConversationId, Counter, CounterId, Database, DbError, PendingAction, PendingKind,
};
use crate::state_machine::Reply;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Transient store failure. Never fatal; the event is answered with a
/// generic failure or dropped.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store call timed out after {0:?}")]
    Timeout(Duration),
    #[error("store failure: {0}")]
    Backend(String),
}

impl From<DbError> for StoreError {
    fn from(e: DbError) -> Self {
        StoreError::Backend(e.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Outbound send was rejected or could not be made
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API rejected {method}: {description}")]
    Rejected { method: String, description: String },
}

/// Storage for counters. Pure CRUD, no business rules.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Create with the next free id of the conversation
    async fn create_counter(&self, conv_id: ConversationId, name: &str) -> StoreResult<Counter>;

    /// `None` when the id does not resolve in this conversation
    async fn get_counter(
        &self,
        conv_id: ConversationId,
        id: CounterId,
    ) -> StoreResult<Option<Counter>>;

    /// Newest first, archived excluded
    async fn list_active(&self, conv_id: ConversationId, limit: usize)
        -> StoreResult<Vec<Counter>>;

    /// Newest first
    async fn list_archived(&self, conv_id: ConversationId) -> StoreResult<Vec<Counter>>;

    /// Archived included
    async fn count_all(&self, conv_id: ConversationId) -> StoreResult<u64>;

    async fn save_counter(&self, counter: &Counter) -> StoreResult<()>;
}

/// Storage for the single pending action of each conversation
#[async_trait]
pub trait PendingStore: Send + Sync {
    async fn get_pending(&self, conv_id: ConversationId) -> StoreResult<Option<PendingAction>>;

    /// Atomic delete-then-insert
    async fn replace_pending(&self, conv_id: ConversationId, kind: PendingKind)
        -> StoreResult<()>;

    #[allow(dead_code)] // API completeness; creation clears as part of its unit
    async fn clear_pending(&self, conv_id: ConversationId) -> StoreResult<()>;

    /// Consume an `AwaitingCounterName` action and create the counter as one
    /// unit. `None` when nothing was pending.
    async fn complete_pending_creation(
        &self,
        conv_id: ConversationId,
        name: &str,
    ) -> StoreResult<Option<Counter>>;
}

/// Outbound half of the transport adapter
#[async_trait]
pub trait ReplySink: Send + Sync {
    async fn deliver(&self, conv_id: ConversationId, reply: &Reply) -> Result<(), DeliveryError>;
}

/// Combined storage trait for convenience
pub trait Storage: CounterStore + PendingStore {}
impl<T: CounterStore + PendingStore> Storage for T {}

// ============================================================================
// Arc implementations for trait objects
// ============================================================================

#[async_trait]
impl<T: ReplySink + ?Sized> ReplySink for Arc<T> {
    async fn deliver(&self, conv_id: ConversationId, reply: &Reply) -> Result<(), DeliveryError> {
        (**self).deliver(conv_id, reply).await
    }
}

// ============================================================================
// Production Adapters
// ============================================================================

/// Adapter to use Database as Storage. SQLite calls run on the blocking pool.
#[derive(Clone)]
pub struct DatabaseStorage {
    db: Database,
}

impl DatabaseStorage {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    #[allow(dead_code)] // Useful for tests
    pub fn inner(&self) -> &Database {
        &self.db
    }

    async fn blocking<T, F>(&self, f: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Database) -> Result<T, DbError> + Send + 'static,
    {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || f(&db))
            .await
            .map_err(|e| StoreError::Backend(format!("store task failed: {e}")))?
            .map_err(StoreError::from)
    }
}

#[async_trait]
impl CounterStore for DatabaseStorage {
    async fn create_counter(&self, conv_id: ConversationId, name: &str) -> StoreResult<Counter> {
        let name = name.to_string();
        self.blocking(move |db| db.create_counter(conv_id, &name))
            .await
    }

    async fn get_counter(
        &self,
        conv_id: ConversationId,
        id: CounterId,
    ) -> StoreResult<Option<Counter>> {
        self.blocking(move |db| match db.get_counter(conv_id, id) {
            Ok(counter) => Ok(Some(counter)),
            Err(DbError::CounterNotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        })
        .await
    }

    async fn list_active(
        &self,
        conv_id: ConversationId,
        limit: usize,
    ) -> StoreResult<Vec<Counter>> {
        self.blocking(move |db| db.list_active_counters(conv_id, limit))
            .await
    }

    async fn list_archived(&self, conv_id: ConversationId) -> StoreResult<Vec<Counter>> {
        self.blocking(move |db| db.list_archived_counters(conv_id))
            .await
    }

    async fn count_all(&self, conv_id: ConversationId) -> StoreResult<u64> {
        self.blocking(move |db| db.count_counters(conv_id)).await
    }

    async fn save_counter(&self, counter: &Counter) -> StoreResult<()> {
        let counter = counter.clone();
        self.blocking(move |db| db.save_counter(&counter)).await
    }
}

#[async_trait]
impl PendingStore for DatabaseStorage {
    async fn get_pending(&self, conv_id: ConversationId) -> StoreResult<Option<PendingAction>> {
        self.blocking(move |db| db.get_pending_action(conv_id))
            .await
    }

    async fn replace_pending(
        &self,
        conv_id: ConversationId,
        kind: PendingKind,
    ) -> StoreResult<()> {
        self.blocking(move |db| db.replace_pending_action(conv_id, kind).map(|_| ()))
            .await
    }

    async fn clear_pending(&self, conv_id: ConversationId) -> StoreResult<()> {
        self.blocking(move |db| db.clear_pending_action(conv_id).map(|_| ()))
            .await
    }

    async fn complete_pending_creation(
        &self,
        conv_id: ConversationId,
        name: &str,
    ) -> StoreResult<Option<Counter>> {
        let name = name.to_string();
        self.blocking(move |db| db.complete_pending_creation(conv_id, &name))
            .await
    }
}
