//! Property-based tests for the conversation engine
//!
//! A small in-process model executes effects so whole event sequences can be
//! driven through the pure transition function.

use super::*;
use crate::db::{Counter, CounterId, PendingKind};
use proptest::prelude::*;
use std::collections::VecDeque;

const CHAT: i64 = 7;

// ============================================================================
// Effect Model
// ============================================================================

#[derive(Default)]
struct Model {
    counters: Vec<Counter>,
    pending: Option<PendingKind>,
    replies: Vec<Reply>,
}

impl Model {
    fn counter(&self, id: CounterId) -> Option<&Counter> {
        self.counters.iter().find(|c| c.id == id)
    }

    fn apply(&mut self, ctx: &ConvContext, event: Event) {
        let mut queue = VecDeque::from([event]);
        while let Some(event) = queue.pop_front() {
            for effect in transition(ctx, event).effects {
                if let Some(next) = self.execute(ctx, effect) {
                    queue.push_back(next);
                }
            }
        }
    }

    fn execute(&mut self, ctx: &ConvContext, effect: Effect) -> Option<Event> {
        match effect {
            Effect::TallyCounters => Some(Event::CountersTallied {
                total: self.counters.len() as u64,
            }),
            Effect::LoadPending { text } => Some(Event::PendingLoaded {
                pending: self.pending,
                text,
            }),
            Effect::LoadCounter { action, reply_to } => Some(Event::CounterLoaded {
                action,
                counter: self.counter(action.counter_id).cloned(),
                reply_to,
            }),
            Effect::LoadActiveList { verb } => {
                let mut counters: Vec<_> =
                    self.counters.iter().filter(|c| !c.archived).cloned().collect();
                counters.reverse();
                counters.truncate(ctx.max_active_counters);
                Some(Event::ActiveListLoaded { verb, counters })
            }
            Effect::LoadArchivedList => {
                let mut counters: Vec<_> =
                    self.counters.iter().filter(|c| c.archived).cloned().collect();
                counters.reverse();
                Some(Event::ArchivedListLoaded { counters })
            }
            Effect::ReplacePending { kind } => {
                self.pending = Some(kind);
                None
            }
            Effect::CompleteCreation { name } => {
                if self.pending != Some(PendingKind::AwaitingCounterName) {
                    return Some(Event::CreationAbandoned);
                }
                self.pending = None;
                let id = self.counters.iter().map(|c| c.id + 1).max().unwrap_or(0);
                let counter = Counter::new(id, CHAT, name);
                self.counters.push(counter.clone());
                Some(Event::CounterCreated { counter })
            }
            Effect::SaveCounter { counter, reply_to } => {
                let slot = self.counters.iter_mut().find(|c| c.id == counter.id)?;
                *slot = counter.clone();
                Some(Event::CounterSaved { counter, reply_to })
            }
            Effect::Reply(reply) => {
                self.replies.push(reply);
                None
            }
        }
    }
}

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_verb() -> impl Strategy<Value = CallbackVerb> {
    prop_oneof![
        Just(CallbackVerb::Increase),
        Just(CallbackVerb::Decrease),
        Just(CallbackVerb::Select),
        Just(CallbackVerb::Archive),
    ]
}

fn arb_counter() -> impl Strategy<Value = Counter> {
    (0u32..20, "[a-zA-Z]{1,12}", any::<u32>(), any::<bool>()).prop_map(
        |(id, name, count, archived)| Counter {
            id,
            conversation_id: CHAT,
            name,
            count,
            archived,
        },
    )
}

fn arb_event() -> impl Strategy<Value = Event> {
    prop_oneof![
        prop::sample::select(vec!["/start", "/new", "/counters", "/archive", "/archived", "/x"])
            .prop_map(|text| Event::Command { text: text.into() }),
        "[a-zA-Z ]{0,10}".prop_map(|text| Event::FreeText { text }),
        (arb_verb(), 0u32..6).prop_map(|(verb, id)| Event::Callback {
            reply_to: Some(MessageHandle(1)),
            payload: CallbackAction::new(verb, id).payload(),
        }),
        ".{0,16}".prop_map(|payload| Event::Callback {
            reply_to: None,
            payload,
        }),
    ]
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    // Count follows saturating steps and equals max(0, inc - dec) when
    // increments come first
    #[test]
    fn prop_count_is_saturating(steps in proptest::collection::vec(any::<bool>(), 0..60)) {
        let ctx = ConvContext::new(CHAT);
        let mut model = Model::default();
        model.counters.push(Counter::new(0, CHAT, "Scarf"));

        let mut expected: u32 = 0;
        for increase in steps {
            let verb = if increase { CallbackVerb::Increase } else { CallbackVerb::Decrease };
            model.apply(&ctx, Event::Callback {
                reply_to: Some(MessageHandle(1)),
                payload: CallbackAction::new(verb, 0).payload(),
            });
            expected = if increase { expected + 1 } else { expected.saturating_sub(1) };
            prop_assert_eq!(model.counters[0].count, expected);
        }
    }

    #[test]
    fn prop_count_matches_ordered_totals(increments in 0u32..30, decrements in 0u32..30) {
        let ctx = ConvContext::new(CHAT);
        let mut model = Model::default();
        model.counters.push(Counter::new(0, CHAT, "Scarf"));

        for (verb, times) in [(CallbackVerb::Increase, increments), (CallbackVerb::Decrease, decrements)] {
            for _ in 0..times {
                model.apply(&ctx, Event::Callback {
                    reply_to: None,
                    payload: CallbackAction::new(verb, 0).payload(),
                });
            }
        }
        prop_assert_eq!(model.counters[0].count, increments.saturating_sub(decrements));
    }

    // Select and unparseable callbacks never touch a store
    #[test]
    fn prop_select_and_malformed_never_mutate(counter in arb_counter(), payload in ".{0,24}") {
        let ctx = ConvContext::new(CHAT);

        let select = transition(&ctx, Event::CounterLoaded {
            action: CallbackAction::new(CallbackVerb::Select, counter.id),
            counter: Some(counter),
            reply_to: None,
        });
        prop_assert!(!select.effects.iter().any(Effect::is_mutation));

        if CallbackAction::parse(&payload).is_none() {
            let result = transition(&ctx, Event::Callback { reply_to: None, payload });
            prop_assert_eq!(result.effects, vec![Effect::unknown()]);
        }
    }

    // Archiving is one-way
    #[test]
    fn prop_archived_stays_archived(counter in arb_counter(), verb in arb_verb()) {
        let ctx = ConvContext::new(CHAT);
        let was_archived = counter.archived;
        let result = transition(&ctx, Event::CounterLoaded {
            action: CallbackAction::new(verb, counter.id),
            counter: Some(counter),
            reply_to: None,
        });
        for effect in result.effects {
            if let Effect::SaveCounter { counter, .. } = effect {
                prop_assert!(counter.archived || !was_archived);
            }
        }
    }

    // Ids stay gap-free from zero under any event sequence
    #[test]
    fn prop_ids_are_gap_free(events in proptest::collection::vec(arb_event(), 0..40)) {
        let ctx = ConvContext::new(CHAT);
        let mut model = Model::default();
        for event in events {
            model.apply(&ctx, event);
        }

        let ids: Vec<CounterId> = model.counters.iter().map(|c| c.id).collect();
        let expected: Vec<CounterId> = (0..).take(ids.len()).collect();
        prop_assert_eq!(ids, expected);
    }

    // Every inbound event gets at least one reply
    #[test]
    fn prop_every_event_is_answered(events in proptest::collection::vec(arb_event(), 1..20)) {
        let ctx = ConvContext::new(CHAT);
        let mut model = Model::default();
        for event in events {
            let before = model.replies.len();
            model.apply(&ctx, event);
            prop_assert!(model.replies.len() > before);
        }
    }
}
