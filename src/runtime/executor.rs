//! Conversation runtime executor
//!
//! One runtime per conversation. It takes events off its channel one at a
//! time and runs each to completion, so every read-then-write of a
//! conversation's pending action or counters is serialized.

use super::traits::{ReplySink, Storage, StoreError, StoreResult};
use super::Envelope;
use crate::state_machine::{transition, ConvContext, Effect, Event, Reply};
use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Generic conversation runtime that can work with any storage and transport
pub struct ConversationRuntime<S, R>
where
    S: Storage + 'static,
    R: ReplySink + 'static,
{
    context: ConvContext,
    storage: Arc<S>,
    replies: Arc<R>,
    store_timeout: Duration,
    idle_timeout: Duration,
    event_rx: mpsc::Receiver<Envelope>,
}

impl<S, R> ConversationRuntime<S, R>
where
    S: Storage + 'static,
    R: ReplySink + 'static,
{
    pub fn new(
        context: ConvContext,
        storage: Arc<S>,
        replies: Arc<R>,
        store_timeout: Duration,
        idle_timeout: Duration,
        event_rx: mpsc::Receiver<Envelope>,
    ) -> Self {
        Self {
            context,
            storage,
            replies,
            store_timeout,
            idle_timeout,
            event_rx,
        }
    }

    pub async fn run(mut self) {
        tracing::debug!(conv_id = %self.context.conversation_id, "Starting conversation runtime");

        loop {
            let envelope =
                match tokio::time::timeout(self.idle_timeout, self.event_rx.recv()).await {
                    Ok(Some(envelope)) => envelope,
                    Ok(None) => break,
                    Err(_) => {
                        tracing::debug!(
                            conv_id = %self.context.conversation_id,
                            "Conversation idle, closing runtime"
                        );
                        // Senders fail from here on; queued events still run
                        self.event_rx.close();
                        continue;
                    }
                };

            if let Err(e) = self.process_event(envelope.event).await {
                tracing::error!(
                    conv_id = %self.context.conversation_id,
                    error = %e,
                    "Error handling event"
                );
            }
            if let Some(done) = envelope.done {
                let _ = done.send(());
            }
        }

        tracing::debug!(conv_id = %self.context.conversation_id, "Conversation runtime stopped");
    }

    /// Run one inbound event and every event its effects generate.
    ///
    /// A store failure stops the chain after a best-effort failure reply;
    /// writes that already committed stay committed.
    pub(crate) async fn process_event(&self, event: Event) -> StoreResult<()> {
        tracing::debug!(
            conv_id = %self.context.conversation_id,
            event = event.kind(),
            "Processing event"
        );

        let mut events_to_process = VecDeque::from([event]);

        while let Some(current_event) = events_to_process.pop_front() {
            let result = transition(&self.context, current_event);

            for effect in result.effects {
                match self.execute_effect(effect).await {
                    Ok(Some(generated_event)) => events_to_process.push_back(generated_event),
                    Ok(None) => {}
                    Err(e) => {
                        // Timeouts are answered inside `bounded`
                        if !matches!(e, StoreError::Timeout(_)) {
                            self.deliver(&Reply::Failure).await;
                        }
                        return Err(e);
                    }
                }
            }
        }

        Ok(())
    }

    async fn execute_effect(&self, effect: Effect) -> StoreResult<Option<Event>> {
        let conv_id = self.context.conversation_id;

        match effect {
            Effect::TallyCounters => {
                let total = self.bounded(self.storage.count_all(conv_id)).await?;
                Ok(Some(Event::CountersTallied { total }))
            }

            Effect::LoadPending { text } => {
                let pending = self
                    .bounded(self.storage.get_pending(conv_id))
                    .await?
                    .map(|p| p.kind);
                Ok(Some(Event::PendingLoaded { pending, text }))
            }

            Effect::LoadCounter { action, reply_to } => {
                let counter = self
                    .bounded(self.storage.get_counter(conv_id, action.counter_id))
                    .await?;
                if counter.is_none() {
                    tracing::debug!(
                        conv_id = %conv_id,
                        counter_id = action.counter_id,
                        "Callback targets unknown counter"
                    );
                }
                Ok(Some(Event::CounterLoaded {
                    action,
                    counter,
                    reply_to,
                }))
            }

            Effect::LoadActiveList { verb } => {
                let counters = self
                    .bounded(
                        self.storage
                            .list_active(conv_id, self.context.max_active_counters),
                    )
                    .await?;
                Ok(Some(Event::ActiveListLoaded { verb, counters }))
            }

            Effect::LoadArchivedList => {
                let counters = self.bounded(self.storage.list_archived(conv_id)).await?;
                Ok(Some(Event::ArchivedListLoaded { counters }))
            }

            Effect::ReplacePending { kind } => {
                self.bounded(self.storage.replace_pending(conv_id, kind))
                    .await?;
                tracing::debug!(conv_id = %conv_id, kind = %kind, "Pending action replaced");
                Ok(None)
            }

            Effect::CompleteCreation { name } => {
                let created = self
                    .bounded(self.storage.complete_pending_creation(conv_id, &name))
                    .await?;
                match created {
                    Some(counter) => {
                        tracing::info!(
                            conv_id = %conv_id,
                            counter_id = counter.id,
                            "Counter created"
                        );
                        Ok(Some(Event::CounterCreated { counter }))
                    }
                    None => Ok(Some(Event::CreationAbandoned)),
                }
            }

            Effect::SaveCounter { counter, reply_to } => {
                self.bounded(self.storage.save_counter(&counter)).await?;
                Ok(Some(Event::CounterSaved { counter, reply_to }))
            }

            Effect::Reply(reply) => {
                self.deliver(&reply).await;
                Ok(None)
            }
        }
    }

    /// Delivery is best effort: failures are logged and never retried
    async fn deliver(&self, reply: &Reply) {
        if let Err(e) = self
            .replies
            .deliver(self.context.conversation_id, reply)
            .await
        {
            tracing::warn!(
                conv_id = %self.context.conversation_id,
                reply = reply.kind(),
                error = %e,
                "Failed to deliver reply"
            );
        }
    }

    /// Bound a store call by the store timeout.
    ///
    /// On timeout the user gets the failure reply straight away, but the call
    /// itself is still driven to completion: a write on the blocking pool
    /// cannot be cancelled, and it must land before this conversation's next
    /// event reads the same rows.
    async fn bounded<T>(&self, call: impl Future<Output = StoreResult<T>>) -> StoreResult<T> {
        tokio::pin!(call);
        match tokio::time::timeout(self.store_timeout, &mut call).await {
            Ok(result) => result,
            Err(_) => {
                self.deliver(&Reply::Failure).await;
                let late = call.await;
                tracing::warn!(
                    conv_id = %self.context.conversation_id,
                    timeout = ?self.store_timeout,
                    completed = late.is_ok(),
                    "Store call outlived its timeout"
                );
                Err(StoreError::Timeout(self.store_timeout))
            }
        }
    }
}
