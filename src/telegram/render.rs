//! Rendering of reply directives into Bot API calls

use crate::db::{ConversationId, Counter};
use crate::state_machine::reply::counter_label;
use crate::state_machine::{CallbackAction, CallbackVerb, Keyboard, Reply};
use serde::Serialize;

pub const UNKNOWN_TEXT: &str = "Could not parse your message 🤷‍♂️";
pub const ONBOARDING_TEXT: &str = "Now you can set your counters! 🧶";
pub const FAILURE_TEXT: &str = "Something went wrong, please try again later.";
pub const LIST_TEXT: &str = "Here are your counters, pick one: ";

const MARKDOWN_V2: &str = "MarkdownV2";
const DEFAULT_KEYBOARD: [[&str; 2]; 2] = [["/new", "/counters"], ["/archive", "/archived"]];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InlineKeyboardButton {
    pub text: String,
    pub callback_data: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InlineKeyboardMarkup {
    pub inline_keyboard: Vec<Vec<InlineKeyboardButton>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyboardButton {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplyKeyboardMarkup {
    pub keyboard: Vec<Vec<KeyboardButton>>,
    pub resize_keyboard: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ReplyMarkup {
    Inline(InlineKeyboardMarkup),
    Keyboard(ReplyKeyboardMarkup),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SendMessage {
    pub chat_id: ConversationId,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parse_mode: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_markup: Option<ReplyMarkup>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EditMessageText {
    pub chat_id: ConversationId,
    pub message_id: i64,
    pub text: String,
    pub parse_mode: &'static str,
    pub reply_markup: InlineKeyboardMarkup,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SendAnimation {
    pub chat_id: ConversationId,
    pub animation: String,
}

/// One Bot API request; serializes as its method's body
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ApiCall {
    SendMessage(SendMessage),
    EditMessageText(EditMessageText),
    SendAnimation(SendAnimation),
}

impl ApiCall {
    pub fn method(&self) -> &'static str {
        match self {
            ApiCall::SendMessage(_) => "sendMessage",
            ApiCall::EditMessageText(_) => "editMessageText",
            ApiCall::SendAnimation(_) => "sendAnimation",
        }
    }
}

/// Requests that show `reply`, in send order
pub fn render(chat_id: ConversationId, reply: &Reply, onboarding_animation: &str) -> Vec<ApiCall> {
    match reply {
        Reply::Text { body, keyboard } => vec![plain(chat_id, body, keyboard.map(reply_keyboard))],
        Reply::Detail { reply_to, counter } => {
            let text = detail_text(counter);
            let controls = detail_controls(counter);
            match reply_to {
                Some(handle) => vec![ApiCall::EditMessageText(EditMessageText {
                    chat_id,
                    message_id: handle.0,
                    text,
                    parse_mode: MARKDOWN_V2,
                    reply_markup: controls,
                })],
                None => vec![ApiCall::SendMessage(SendMessage {
                    chat_id,
                    text,
                    parse_mode: Some(MARKDOWN_V2),
                    reply_markup: Some(ReplyMarkup::Inline(controls)),
                })],
            }
        }
        Reply::List { verb, counters } => {
            vec![plain(chat_id, LIST_TEXT, Some(list_keyboard(*verb, counters)))]
        }
        Reply::Unknown => vec![plain(chat_id, UNKNOWN_TEXT, Some(reply_keyboard(Keyboard::Default)))],
        Reply::Onboarding => vec![
            ApiCall::SendAnimation(SendAnimation {
                chat_id,
                animation: onboarding_animation.to_string(),
            }),
            plain(chat_id, ONBOARDING_TEXT, Some(reply_keyboard(Keyboard::Default))),
        ],
        Reply::Failure => vec![plain(chat_id, FAILURE_TEXT, Some(reply_keyboard(Keyboard::Default)))],
    }
}

fn plain(chat_id: ConversationId, text: &str, reply_markup: Option<ReplyMarkup>) -> ApiCall {
    ApiCall::SendMessage(SendMessage {
        chat_id,
        text: text.to_string(),
        parse_mode: None,
        reply_markup,
    })
}

fn reply_keyboard(keyboard: Keyboard) -> ReplyMarkup {
    match keyboard {
        Keyboard::Default => ReplyMarkup::Keyboard(ReplyKeyboardMarkup {
            keyboard: DEFAULT_KEYBOARD
                .iter()
                .map(|row| {
                    row.iter()
                        .map(|text| KeyboardButton {
                            text: (*text).to_string(),
                        })
                        .collect()
                })
                .collect(),
            resize_keyboard: true,
        }),
    }
}

fn list_keyboard(verb: CallbackVerb, counters: &[Counter]) -> ReplyMarkup {
    ReplyMarkup::Inline(InlineKeyboardMarkup {
        inline_keyboard: counters
            .iter()
            .map(|counter| {
                vec![InlineKeyboardButton {
                    text: counter_label(counter),
                    callback_data: CallbackAction::new(verb, counter.id).payload(),
                }]
            })
            .collect(),
    })
}

fn detail_text(counter: &Counter) -> String {
    format!(
        "🧶 *{}* 🧶\n\nRows count: *{}*",
        escape_markdown(&counter.name),
        counter.count
    )
}

fn detail_controls(counter: &Counter) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup {
        inline_keyboard: vec![vec![
            InlineKeyboardButton {
                text: "◀️".to_string(),
                callback_data: CallbackAction::new(CallbackVerb::Decrease, counter.id).payload(),
            },
            InlineKeyboardButton {
                text: "▶️".to_string(),
                callback_data: CallbackAction::new(CallbackVerb::Increase, counter.id).payload(),
            },
        ]],
    }
}

/// Escape user text for MarkdownV2
pub fn escape_markdown(text: &str) -> String {
    const SPECIAL: &str = r"\_*[]()~`>#+-=|{}.!";
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if SPECIAL.contains(c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
