//! Telegram transport adapter
//!
//! Long-polls `getUpdates`, turns messages and callback queries into engine
//! events, and renders reply directives back into Bot API calls.

pub mod render;

use crate::db::ConversationId;
use crate::runtime::{DeliveryError, DispatchError, ReplySink, RuntimeManager, Storage};
use crate::state_machine::{is_command, Event, MessageHandle, Reply};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const API_ROOT: &str = "https://api.telegram.org";
const POLL_ERROR_BACKOFF: Duration = Duration::from_secs(5);
/// Slack on top of the long-poll timeout before the HTTP client gives up
const POLL_HTTP_SLACK_SECS: u64 = 10;
/// Edits that would not change anything are rejected with this description
const NOT_MODIFIED: &str = "message is not modified";

// ─── Bot API types ───────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<TelegramMessage>,
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Deserialize)]
pub struct TelegramMessage {
    pub message_id: i64,
    pub chat: TelegramChat,
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TelegramChat {
    pub id: i64,
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub message: Option<TelegramMessage>,
    pub data: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BotUser {
    username: Option<String>,
}

#[derive(Serialize)]
struct GetUpdates<'a> {
    offset: i64,
    timeout: u64,
    allowed_updates: &'a [&'a str],
}

#[derive(Serialize)]
struct AnswerCallbackQuery<'a> {
    callback_query_id: &'a str,
}

/// An update the engine has something to do with
#[derive(Debug, PartialEq, Eq)]
pub struct Inbound {
    pub conversation_id: ConversationId,
    pub event: Event,
    /// Must be answered so the client stops its spinner
    pub callback_query_id: Option<String>,
}

/// Map an update to an engine event. Non-text messages and callbacks
/// without an origin message are ignored.
pub fn classify(update: Update) -> Option<Inbound> {
    if let Some(message) = update.message {
        let text = message.text?;
        let event = if is_command(&text) {
            Event::Command { text }
        } else {
            Event::FreeText { text }
        };
        return Some(Inbound {
            conversation_id: message.chat.id,
            event,
            callback_query_id: None,
        });
    }

    let query = update.callback_query?;
    let message = query.message?;
    Some(Inbound {
        conversation_id: message.chat.id,
        event: Event::Callback {
            reply_to: Some(MessageHandle(message.message_id)),
            payload: query.data.unwrap_or_default(),
        },
        callback_query_id: Some(query.id),
    })
}

// ─── API client ──────────────────────────────────────────────────────────────

pub struct TelegramApi {
    client: reqwest::Client,
    api_base: String,
}

impl TelegramApi {
    /// The HTTP timeout covers a full long poll
    pub fn new(token: &str, poll_timeout_secs: u64) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(http_timeout(poll_timeout_secs))
            .build()?;
        Ok(Self {
            client,
            api_base: format!("{API_ROOT}/bot{token}"),
        })
    }

    pub async fn call<B, T>(&self, method: &str, body: &B) -> Result<T, DeliveryError>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let response: ApiResponse<T> = self
            .client
            .post(format!("{}/{method}", self.api_base))
            .json(body)
            .send()
            .await?
            .json()
            .await?;

        match response {
            ApiResponse {
                ok: true,
                result: Some(result),
                ..
            } => Ok(result),
            ApiResponse { description, .. } => Err(DeliveryError::Rejected {
                method: method.to_string(),
                description: description.unwrap_or_else(|| "no description".to_string()),
            }),
        }
    }

    /// Bot username, for the startup log
    pub async fn username(&self) -> Result<String, DeliveryError> {
        let me: BotUser = self.call("getMe", &serde_json::json!({})).await?;
        Ok(me.username.unwrap_or_default())
    }

    async fn get_updates(&self, offset: i64, timeout: u64) -> Result<Vec<Update>, DeliveryError> {
        self.call(
            "getUpdates",
            &GetUpdates {
                offset,
                timeout,
                allowed_updates: &["message", "callback_query"],
            },
        )
        .await
    }

    async fn answer_callback_query(&self, id: &str) -> Result<(), DeliveryError> {
        let _: Value = self
            .call(
                "answerCallbackQuery",
                &AnswerCallbackQuery {
                    callback_query_id: id,
                },
            )
            .await?;
        Ok(())
    }
}

fn http_timeout(poll_timeout_secs: u64) -> Duration {
    Duration::from_secs(poll_timeout_secs.saturating_add(POLL_HTTP_SLACK_SECS))
}

// ─── Outbound ────────────────────────────────────────────────────────────────

pub struct TelegramReplySink {
    api: Arc<TelegramApi>,
    onboarding_animation: String,
}

impl TelegramReplySink {
    pub fn new(api: Arc<TelegramApi>, onboarding_animation: String) -> Self {
        Self {
            api,
            onboarding_animation,
        }
    }
}

#[async_trait]
impl ReplySink for TelegramReplySink {
    async fn deliver(&self, conv_id: ConversationId, reply: &Reply) -> Result<(), DeliveryError> {
        for call in render::render(conv_id, reply, &self.onboarding_animation) {
            match self.api.call::<_, Value>(call.method(), &call).await {
                Ok(_) => {}
                Err(DeliveryError::Rejected { description, .. })
                    if description.contains(NOT_MODIFIED) =>
                {
                    tracing::debug!(conv_id = %conv_id, "Edit left message unchanged");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

// ─── Bot loop ────────────────────────────────────────────────────────────────

/// Poll until `cancel` fires, feeding every update to the runtime manager.
///
/// Updates are dispatched in arrival order so events of one chat reach its
/// runtime in the order Telegram delivered them. Dispatch never waits on a
/// busy chat.
pub async fn run_polling<S, R>(
    api: Arc<TelegramApi>,
    manager: Arc<RuntimeManager<S, R>>,
    poll_timeout_secs: u64,
    cancel: CancellationToken,
) where
    S: Storage + 'static,
    R: ReplySink + 'static,
{
    let mut offset: i64 = 0;

    loop {
        let updates = tokio::select! {
            () = cancel.cancelled() => break,
            result = api.get_updates(offset, poll_timeout_secs) => match result {
                Ok(updates) => updates,
                Err(e) => {
                    tracing::warn!(error = %e, "getUpdates failed");
                    tokio::select! {
                        () = cancel.cancelled() => break,
                        () = tokio::time::sleep(POLL_ERROR_BACKOFF) => continue,
                    }
                }
            },
        };

        for update in updates {
            offset = offset.max(update.update_id + 1);

            let Some(inbound) = classify(update) else {
                continue;
            };

            tracing::info!(
                conv_id = %inbound.conversation_id,
                event = inbound.event.kind(),
                "Received update"
            );

            if let Some(query_id) = inbound.callback_query_id {
                let api = api.clone();
                tokio::spawn(async move {
                    if let Err(e) = api.answer_callback_query(&query_id).await {
                        tracing::debug!(error = %e, "Failed to answer callback query");
                    }
                });
            }

            match manager
                .dispatch(inbound.conversation_id, inbound.event)
                .await
            {
                Ok(()) => {}
                Err(e @ DispatchError::Busy(_)) => {
                    tracing::warn!(error = %e, "Conversation backlogged, update dropped");
                }
                Err(e) => tracing::error!(error = %e, "Failed to dispatch event"),
            }
        }
    }

    tracing::info!("Telegram polling stopped");
}
