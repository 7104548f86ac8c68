//! Property-based tests for the configuration grammar and core memory bounds.
//!
//! Run with: cargo test -p character_sim --test config_properties

use chrono::Utc;
use proptest::prelude::*;

use character_sim::{
    parse, Comparison, CoreMemory, EventTriggerDef, MilestoneDef, SimulationConfig, StatDelta,
    StatusDef, Threshold,
};

fn word() -> impl Strategy<Value = String> {
    "[a-z]{3,8}".prop_filter("reserved word", |w| w != "when")
}

fn phrase() -> impl Strategy<Value = String> {
    "[A-Z][a-z]{1,8}( [a-z]{1,8}){0,3}"
}

fn comparison() -> impl Strategy<Value = Comparison> {
    prop::sample::select(vec![
        Comparison::AtLeast,
        Comparison::AtMost,
        Comparison::Above,
        Comparison::Below,
        Comparison::Equal,
    ])
}

fn status_def(name: String) -> impl Strategy<Value = StatusDef> {
    (-50i32..50, 0i32..100, 0i32..100, prop::option::of(phrase())).prop_map(
        move |(min, span, offset, description)| {
            let def = StatusDef::new(name.clone(), f64::from(min), f64::from(min + span))
                .with_default(f64::from(min + offset.min(span)));
            match description {
                Some(description) => def.with_description(description),
                None => def,
            }
        },
    )
}

fn stat_delta(names: Vec<String>) -> impl Strategy<Value = StatDelta> {
    (prop::sample::select(names), -20i32..20)
        .prop_map(|(stat, delta)| StatDelta::new(stat, f64::from(delta)))
}

fn milestone_def(id: String, names: Vec<String>) -> impl Strategy<Value = MilestoneDef> {
    let threshold = (prop::sample::select(names.clone()), comparison(), -50i32..150)
        .prop_map(|(stat, comparison, value)| Threshold::new(stat, comparison, f64::from(value)));

    (
        phrase(),
        0u8..3,
        prop::collection::btree_set(word(), 1..3),
        prop::collection::vec(threshold, 1..3),
        prop::collection::vec(stat_delta(names), 0..3),
    )
        .prop_map(move |(description, kind, keywords, thresholds, rewards)| {
            let mut def = MilestoneDef::new(id.clone(), description);
            match kind {
                0 => {}
                1 => def = def.with_keywords(keywords),
                _ => {
                    def = def.with_keywords(keywords);
                    for threshold in thresholds {
                        def = def.with_threshold(threshold);
                    }
                }
            }
            def.reward_deltas = rewards;
            def
        })
}

fn trigger_def(base: String, names: Vec<String>) -> impl Strategy<Value = EventTriggerDef> {
    (
        prop::option::of(word()),
        prop::collection::vec(stat_delta(names), 1..3),
        prop::collection::btree_map(word(), word(), 0..2),
    )
        .prop_map(move |(alternative, impact, labels)| {
            let name = match alternative {
                Some(alternative) => format!("{}|{}", base, alternative),
                None => base.clone(),
            };
            let mut def = EventTriggerDef::new(name);
            def.impact = impact;
            def.labels = labels;
            def
        })
}

fn config() -> impl Strategy<Value = SimulationConfig> {
    (
        prop::collection::btree_set(word(), 1..4),
        prop::collection::btree_set(word(), 0..3),
        prop::collection::btree_set(word(), 0..3),
        prop::option::of(phrase()),
        prop::option::of(phrase()),
    )
        .prop_flat_map(|(names, milestone_ids, trigger_names, compression, template)| {
            let names: Vec<String> = names.into_iter().collect();
            let statuses: Vec<_> = names.iter().cloned().map(status_def).collect();
            let milestones: Vec<_> = milestone_ids
                .into_iter()
                .map(|id| milestone_def(id, names.clone()))
                .collect();
            let triggers: Vec<_> = trigger_names
                .into_iter()
                .map(|base| trigger_def(base, names.clone()))
                .collect();

            (statuses, milestones, triggers).prop_map(move |(status_defs, milestone_defs, event_trigger_defs)| {
                SimulationConfig {
                    status_defs,
                    milestone_defs,
                    event_trigger_defs,
                    compression_prompt: compression.clone().unwrap_or_default(),
                    injection_template: template.clone().unwrap_or_default(),
                }
            })
        })
}

mod grammar_tests {
    use super::*;

    proptest! {
        /// Invariant: parse never panics, whatever the input
        #[test]
        fn never_panics(s in "\\PC*") {
            let _ = parse(&s);
        }

        /// Invariant: writing a config and parsing it back yields the same config
        #[test]
        fn writer_round_trip(config in config()) {
            let text = config.to_config_text();
            let parsed = parse(&text);
            prop_assert!(!parsed.has_errors(), "{}\n{:?}", text, parsed.errors());
            prop_assert_eq!(parsed.config, config);
        }

        /// Invariant: whitespace-only text is an empty, clean config
        #[test]
        fn blank_text_is_clean(s in "[ \\t\\n]*") {
            let parsed = parse(&s);
            prop_assert!(parsed.is_clean());
            prop_assert!(parsed.config.is_empty());
        }

        /// Invariant: prose outside any section is always reported
        #[test]
        fn garbage_is_reported(s in "[a-zA-Z][a-zA-Z0-9 ]{0,30}") {
            let parsed = parse(&s);
            prop_assert!(parsed.config.is_empty());
            prop_assert!(!parsed.diagnostics.is_empty());
        }
    }
}

mod bounds_tests {
    use super::*;

    proptest! {
        /// Invariant: every status stays inside its range under any sequence of deltas
        #[test]
        fn statuses_stay_in_bounds(
            config in config(),
            deltas in prop::collection::vec((0usize..4, -250i32..250), 0..40),
        ) {
            let mut memory = CoreMemory::from_config("u".into(), "c".into(), &config, Utc::now());
            prop_assert!(memory.within_bounds());

            for (index, delta) in deltas {
                let stat = &config.status_defs[index % config.status_defs.len()].name;
                memory.apply_deltas(&[StatDelta::new(stat.clone(), f64::from(delta))]);
                prop_assert!(memory.within_bounds());
            }
            for trigger in &config.event_trigger_defs {
                memory.apply_trigger(trigger, Utc::now());
                prop_assert!(memory.within_bounds());
            }
        }

        /// Invariant: a milestone's rewards are granted at most once
        #[test]
        fn milestones_are_one_way(config in config()) {
            let mut memory = CoreMemory::from_config("u".into(), "c".into(), &config, Utc::now());
            for def in &config.milestone_defs {
                prop_assert!(memory.achieve_milestone(&def.id, Utc::now()).is_some());
                let before = memory.clone();
                prop_assert!(memory.achieve_milestone(&def.id, Utc::now()).is_none());
                prop_assert_eq!(&memory, &before);
            }
        }
    }
}
