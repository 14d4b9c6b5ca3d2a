//! Command and callback grammars

use crate::db::CounterId;
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

/// Prefix that turns a text message into a command
pub const COMMAND_MARKER: char = '/';

/// The closed set of commands, matched by exact string equality
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Start,
    New,
    /// Active counters, picked for viewing
    ListActive,
    /// Active counters, picked for archiving
    ListArchiveTrigger,
    ListArchived,
}

impl Command {
    pub const ALL: [Command; 5] = [
        Command::Start,
        Command::New,
        Command::ListActive,
        Command::ListArchiveTrigger,
        Command::ListArchived,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Command::Start => "/start",
            Command::New => "/new",
            Command::ListActive => "/counters",
            Command::ListArchiveTrigger => "/archive",
            Command::ListArchived => "/archived",
        }
    }

    /// `None` for anything outside the command table, including `/new@bot`
    pub fn parse(text: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|command| command.as_str() == text)
    }
}

pub fn is_command(text: &str) -> bool {
    text.starts_with(COMMAND_MARKER)
}

/// Action half of a callback payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallbackVerb {
    Increase,
    Decrease,
    Select,
    Archive,
}

impl CallbackVerb {
    pub fn as_str(self) -> &'static str {
        match self {
            CallbackVerb::Increase => "increase",
            CallbackVerb::Decrease => "decrease",
            CallbackVerb::Select => "select",
            CallbackVerb::Archive => "archive",
        }
    }

    fn from_word(word: &str) -> Option<Self> {
        match word.to_ascii_lowercase().as_str() {
            "increase" => Some(CallbackVerb::Increase),
            "decrease" => Some(CallbackVerb::Decrease),
            "select" => Some(CallbackVerb::Select),
            "archive" => Some(CallbackVerb::Archive),
            _ => None,
        }
    }
}

impl fmt::Display for CallbackVerb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A well-formed `"<verb> <counter id>"` payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallbackAction {
    pub verb: CallbackVerb,
    pub counter_id: CounterId,
}

static CALLBACK_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?i)(increase|decrease|select|archive) ([0-9]+)$")
        .expect("callback pattern is valid")
});

impl CallbackAction {
    pub fn new(verb: CallbackVerb, counter_id: CounterId) -> Self {
        Self { verb, counter_id }
    }

    /// Case-insensitive on the verb. Ids that overflow `CounterId` are malformed.
    pub fn parse(payload: &str) -> Option<Self> {
        let captures = CALLBACK_PATTERN.captures(payload)?;
        let verb = CallbackVerb::from_word(captures.get(1)?.as_str())?;
        let counter_id = captures.get(2)?.as_str().parse().ok()?;
        Some(Self { verb, counter_id })
    }

    /// Payload the transport attaches to a button
    pub fn payload(&self) -> String {
        format!("{} {}", self.verb, self.counter_id)
    }
}
