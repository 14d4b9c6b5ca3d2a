//! Runtime for executing conversations
//!
//! Keeps an arena of single-writer runtimes keyed by conversation id.
//! Conversations run in parallel; events of one conversation never do.

mod executor;
pub mod traits;


pub use executor::ConversationRuntime;
pub use traits::*;

use crate::db::ConversationId;
use crate::state_machine::{ConvContext, Event};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot, RwLock};
use tokio::task::JoinHandle;

/// Events buffered per conversation; `dispatch` rejects beyond this
const EVENT_BUFFER: usize = 32;

/// A runtime with no events for this long shuts down; the next event for
/// its conversation starts a fresh one
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(600);

/// An event plus an optional completion signal
pub struct Envelope {
    pub event: Event,
    pub done: Option<oneshot::Sender<()>>,
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("conversation {0} runtime is not accepting events")]
    Closed(ConversationId),
    #[error("conversation {0} runtime stopped before finishing the event")]
    Dropped(ConversationId),
    #[error("conversation {0} event queue is full")]
    Busy(ConversationId),
}

/// Handle to interact with a running conversation
#[derive(Clone)]
pub struct ConversationHandle {
    pub event_tx: mpsc::Sender<Envelope>,
}

struct RuntimeEntry {
    handle: ConversationHandle,
    task: JoinHandle<()>,
}

impl RuntimeEntry {
    /// Closed and done: nothing left that could touch the conversation
    fn is_gone(&self) -> bool {
        self.handle.event_tx.is_closed() && self.task.is_finished()
    }
}

/// Manager for all conversation runtimes
pub struct RuntimeManager<S, R>
where
    S: Storage + 'static,
    R: ReplySink + 'static,
{
    storage: Arc<S>,
    replies: Arc<R>,
    store_timeout: Duration,
    idle_timeout: Duration,
    runtimes: RwLock<HashMap<ConversationId, RuntimeEntry>>,
}

impl<S, R> RuntimeManager<S, R>
where
    S: Storage + 'static,
    R: ReplySink + 'static,
{
    pub fn new(storage: Arc<S>, replies: Arc<R>, store_timeout: Duration) -> Self {
        Self {
            storage,
            replies,
            store_timeout,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            runtimes: RwLock::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    /// Get or create a runtime for a conversation
    pub async fn get_or_create(&self, conversation_id: ConversationId) -> ConversationHandle {
        // Check if already running
        {
            let runtimes = self.runtimes.read().await;
            if let Some(entry) = runtimes.get(&conversation_id) {
                if !entry.handle.event_tx.is_closed() {
                    return entry.handle.clone();
                }
            }
        }

        let mut runtimes = self.runtimes.write().await;
        // Another task may have started it while we waited for the lock
        let previous = match runtimes.remove(&conversation_id) {
            Some(entry) if !entry.handle.event_tx.is_closed() => {
                let handle = entry.handle.clone();
                runtimes.insert(conversation_id, entry);
                return handle;
            }
            Some(entry) => Some(entry.task),
            None => None,
        };
        runtimes.retain(|_, entry| !entry.is_gone());

        let (event_tx, event_rx) = mpsc::channel(EVENT_BUFFER);
        let runtime = ConversationRuntime::new(
            ConvContext::new(conversation_id),
            self.storage.clone(),
            self.replies.clone(),
            self.store_timeout,
            self.idle_timeout,
            event_rx,
        );

        let task = tokio::spawn(async move {
            // A closing runtime may still be draining its queue
            if let Some(previous) = previous {
                if let Err(e) = previous.await {
                    tracing::warn!(conv_id = %conversation_id, error = %e, "Previous runtime failed");
                }
            }
            runtime.run().await;
            tracing::debug!(conv_id = %conversation_id, "Conversation runtime finished");
        });

        let handle = ConversationHandle { event_tx };
        runtimes.insert(
            conversation_id,
            RuntimeEntry {
                handle: handle.clone(),
                task,
            },
        );
        handle
    }

    /// Queue an event without waiting for it to be handled.
    ///
    /// Never waits for queue room: a conversation stuck on a slow store or
    /// transport must not hold up callers feeding other conversations.
    pub async fn dispatch(
        &self,
        conversation_id: ConversationId,
        event: Event,
    ) -> Result<(), DispatchError> {
        let envelope = Envelope { event, done: None };
        let handle = self.get_or_create(conversation_id).await;
        let envelope = match handle.event_tx.try_send(envelope) {
            Ok(()) => return Ok(()),
            Err(TrySendError::Full(_)) => return Err(DispatchError::Busy(conversation_id)),
            Err(TrySendError::Closed(envelope)) => envelope,
        };

        // Runtime closed between lookup and send; one retry on a fresh one
        let handle = self.get_or_create(conversation_id).await;
        handle.event_tx.try_send(envelope).map_err(|e| match e {
            TrySendError::Full(_) => DispatchError::Busy(conversation_id),
            TrySendError::Closed(_) => DispatchError::Closed(conversation_id),
        })
    }

    /// Queue an event and wait until it and its follow-ups are handled
    #[allow(dead_code)] // Used in tests
    pub async fn handle(
        &self,
        conversation_id: ConversationId,
        event: Event,
    ) -> Result<(), DispatchError> {
        let (done_tx, done_rx) = oneshot::channel();
        let envelope = Envelope {
            event,
            done: Some(done_tx),
        };
        let handle = self.get_or_create(conversation_id).await;
        if let Err(mpsc::error::SendError(envelope)) = handle.event_tx.send(envelope).await {
            let handle = self.get_or_create(conversation_id).await;
            handle
                .event_tx
                .send(envelope)
                .await
                .map_err(|_| DispatchError::Closed(conversation_id))?;
        }
        done_rx
            .await
            .map_err(|_| DispatchError::Dropped(conversation_id))
    }

    /// Number of conversations with a runtime accepting events
    #[allow(dead_code)] // Used in tests
    pub async fn active_conversations(&self) -> usize {
        self.runtimes
            .read()
            .await
            .values()
            .filter(|entry| !entry.handle.event_tx.is_closed())
            .count()
    }

    /// Number of conversations still tracked, closed ones included
    #[allow(dead_code)] // Used in tests
    pub async fn tracked_conversations(&self) -> usize {
        self.runtimes.read().await.len()
    }
}
