//! Rendering-agnostic reply directives

use super::command::CallbackVerb;
use super::event::MessageHandle;
use crate::db::Counter;

pub const NAME_PROMPT: &str = "Cool! How will you call it?";
pub const CAPACITY_WARNING: &str = "We have no buttons left for your counters 🤷‍♂️! \n \
                                    Archive some counters to free our buttons.";
pub const NO_ACTIVE_COUNTERS: &str = "You have no active counters. 🤷‍♂️ Let's create a new one!";
pub const NO_ARCHIVED_COUNTERS: &str =
    "You have no archived counters. 🤷‍♂️ Let's create a new one!";
pub const ARCHIVED_HEADER: &str = "Your archived counters 🗑:\n\n";

/// Keyboard attached to a plain text reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyboard {
    /// The persistent command menu
    Default,
}

/// What the transport should show the conversation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Text {
        body: String,
        keyboard: Option<Keyboard>,
    },
    /// Name, count and increment/decrement controls. Edits `reply_to` in
    /// place when present, otherwise sends a new message.
    Detail {
        reply_to: Option<MessageHandle>,
        counter: Counter,
    },
    /// One selectable entry per counter, tagged `"<verb> <id>"`
    List {
        verb: CallbackVerb,
        counters: Vec<Counter>,
    },
    Unknown,
    Onboarding,
    /// Generic notice after a transient store failure
    Failure,
}

impl Reply {
    pub fn text(body: impl Into<String>) -> Self {
        Reply::Text {
            body: body.into(),
            keyboard: Some(Keyboard::Default),
        }
    }

    /// Short name for logs
    pub fn kind(&self) -> &'static str {
        match self {
            Reply::Text { .. } => "text",
            Reply::Detail { .. } => "detail",
            Reply::List { .. } => "list",
            Reply::Unknown => "unknown",
            Reply::Onboarding => "onboarding",
            Reply::Failure => "failure",
        }
    }
}

/// One line per counter, under the archive header
pub fn archived_listing(counters: &[Counter]) -> String {
    let mut body = String::from(ARCHIVED_HEADER);
    for counter in counters {
        body.push_str(&counter_label(counter));
        body.push('\n');
    }
    body
}

/// `"<name> (<count> rows)"`
pub fn counter_label(counter: &Counter) -> String {
    format!("{} ({} rows)", counter.name, counter.count)
}
