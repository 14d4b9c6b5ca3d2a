//! Pure state transition function
//!
//! Dispatch precedence: commands, then free text against the pending action,
//! then callbacks. Store reads come back as internal events, so each step
//! here decides from data that was current when the read ran.

use super::command::{is_command, CallbackAction, CallbackVerb, Command};
use super::reply::{self, Reply};
use super::{ConvContext, Effect, Event};
use crate::db::PendingKind;

/// Result of a state transition
#[derive(Debug, Default, PartialEq, Eq)]
pub struct TransitionResult {
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn with_effects(mut self, effects: impl IntoIterator<Item = Effect>) -> Self {
        self.effects.extend(effects);
        self
    }
}

/// Pure transition function
///
/// Given the same inputs it always produces the same effects, with no I/O.
pub fn transition(context: &ConvContext, event: Event) -> TransitionResult {
    match event {
        // ============================================================
        // Inbound events
        // ============================================================

        // Commands never consult or clear the pending action.
        Event::Command { text } => on_command(&text),

        Event::FreeText { text } => {
            if is_command(&text) {
                // Transport misclassified it; commands take precedence
                return on_command(&text);
            }
            TransitionResult::new().with_effect(Effect::LoadPending { text })
        }

        Event::Callback { reply_to, payload } => match CallbackAction::parse(&payload) {
            Some(action) => {
                TransitionResult::new().with_effect(Effect::LoadCounter { action, reply_to })
            }
            None => TransitionResult::new().with_effect(Effect::unknown()),
        },

        // ============================================================
        // Counter creation
        // ============================================================
        Event::CountersTallied { total } => {
            let warning = context
                .over_capacity(total)
                .then(|| Effect::text(reply::CAPACITY_WARNING));
            TransitionResult::new()
                .with_effects(warning)
                .with_effect(Effect::ReplacePending {
                    kind: PendingKind::AwaitingCounterName,
                })
                .with_effect(Effect::text(reply::NAME_PROMPT))
        }

        Event::PendingLoaded { pending, text } => match pending {
            Some(PendingKind::AwaitingCounterName) if !text.trim().is_empty() => {
                TransitionResult::new().with_effect(Effect::CompleteCreation { name: text })
            }
            // No pending action, blank name, or a confirm state nothing drives
            _ => TransitionResult::new().with_effect(Effect::unknown()),
        },

        Event::CounterCreated { counter } => {
            TransitionResult::new().with_effect(Effect::detail(counter, None))
        }

        Event::CreationAbandoned => TransitionResult::new().with_effect(Effect::unknown()),

        // ============================================================
        // Callback actions
        // ============================================================
        Event::CounterLoaded {
            action,
            counter,
            reply_to,
        } => {
            let Some(mut counter) = counter else {
                return TransitionResult::new().with_effect(Effect::unknown());
            };

            match action.verb {
                CallbackVerb::Select => {
                    // Always a fresh message, never an edit
                    TransitionResult::new().with_effect(Effect::detail(counter, None))
                }
                CallbackVerb::Increase | CallbackVerb::Decrease if counter.archived => {
                    TransitionResult::new().with_effect(Effect::unknown())
                }
                CallbackVerb::Increase => {
                    counter.increase();
                    TransitionResult::new().with_effect(Effect::SaveCounter { counter, reply_to })
                }
                CallbackVerb::Decrease => {
                    counter.decrease();
                    TransitionResult::new().with_effect(Effect::SaveCounter { counter, reply_to })
                }
                CallbackVerb::Archive => {
                    counter.archive();
                    TransitionResult::new().with_effect(Effect::SaveCounter { counter, reply_to })
                }
            }
        }

        // The reply follows the saved outcome, not the requested verb
        Event::CounterSaved { counter, reply_to } => {
            if counter.archived {
                TransitionResult::new().with_effect(Effect::LoadActiveList {
                    verb: CallbackVerb::Select,
                })
            } else {
                TransitionResult::new().with_effect(Effect::detail(counter, reply_to))
            }
        }

        // ============================================================
        // Lists
        // ============================================================
        Event::ActiveListLoaded { verb, counters } => {
            if counters.is_empty() {
                TransitionResult::new().with_effect(Effect::text(reply::NO_ACTIVE_COUNTERS))
            } else {
                TransitionResult::new().with_effect(Effect::Reply(Reply::List { verb, counters }))
            }
        }

        Event::ArchivedListLoaded { counters } => {
            if counters.is_empty() {
                TransitionResult::new().with_effect(Effect::text(reply::NO_ARCHIVED_COUNTERS))
            } else {
                TransitionResult::new()
                    .with_effect(Effect::text(reply::archived_listing(&counters)))
            }
        }
    }
}

fn on_command(text: &str) -> TransitionResult {
    let effect = match Command::parse(text) {
        Some(Command::Start) => Effect::Reply(Reply::Onboarding),
        Some(Command::New) => Effect::TallyCounters,
        Some(Command::ListActive) => Effect::LoadActiveList {
            verb: CallbackVerb::Select,
        },
        Some(Command::ListArchiveTrigger) => Effect::LoadActiveList {
            verb: CallbackVerb::Archive,
        },
        Some(Command::ListArchived) => Effect::LoadArchivedList,
        None => Effect::unknown(),
    };
    TransitionResult::new().with_effect(effect)
}
