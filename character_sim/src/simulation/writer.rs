//! Serializer back into the configuration grammar, so edited configs can be shown to authors.

use std::fmt::Write;

use super::{MilestoneDef, SimulationConfig, StatDelta};

pub(super) fn write_config(config: &SimulationConfig) -> String {
    let mut out = String::new();

    if !config.status_defs.is_empty() {
        out.push_str("# Status Values\n");
        for def in &config.status_defs {
            let _ = write!(
                out,
                "{}: {}-{}, default={}",
                def.name,
                number(def.min),
                number(def.max),
                number(def.default)
            );
            if !def.description.is_empty() {
                let _ = write!(out, ", {}", quote(&def.description));
            }
            out.push('\n');
        }
        out.push('\n');
    }

    if !config.milestone_defs.is_empty() {
        out.push_str("# Milestones\n");
        for def in &config.milestone_defs {
            let _ = write!(out, "{}: {}", def.id, quote(&def.description));
            if !def.has_implicit_condition() {
                let _ = write!(out, " when {}", condition(def));
            }
            let _ = writeln!(out, " -> {}", deltas(&def.reward_deltas));
        }
        out.push('\n');
    }

    if !config.event_trigger_defs.is_empty() {
        out.push_str("# Event Triggers\n");
        for def in &config.event_trigger_defs {
            let mut impacts: Vec<String> = def.impact.iter().map(delta).collect();
            impacts.extend(
                def.labels
                    .iter()
                    .map(|(key, value)| format!("{}={}", key, quote(value))),
            );
            let _ = writeln!(out, "{} -> {}", def.name, impacts.join(", "));
        }
        out.push('\n');
    }

    if !config.compression_prompt.is_empty() {
        out.push_str("# Memory Compression Prompt\n");
        out.push_str(&config.compression_prompt);
        out.push_str("\n\n");
    }

    if !config.injection_template.is_empty() {
        out.push_str("# Prompt Injection Template\n");
        out.push_str(&config.injection_template);
        out.push('\n');
    }

    out
}

fn condition(def: &MilestoneDef) -> String {
    let mut items = Vec::new();
    if !def.condition_keywords.is_empty() {
        let alternatives: Vec<String> = def
            .condition_keywords
            .iter()
            .map(|k| keyword(k))
            .collect();
        items.push(alternatives.join("|"));
    }
    items.extend(def.thresholds.iter().map(|t| {
        format!("{}{}{}", t.stat, t.comparison.symbol(), number(t.value))
    }));
    items.join(", ")
}

fn deltas(deltas: &[StatDelta]) -> String {
    deltas.iter().map(delta).collect::<Vec<_>>().join(", ")
}

fn delta(d: &StatDelta) -> String {
    if d.delta < 0.0 {
        format!("{}-{}", d.stat, number(-d.delta))
    } else {
        format!("{}+{}", d.stat, number(d.delta))
    }
}

/// Keywords are written bare unless they would be misread by the parser.
fn keyword(k: &str) -> String {
    let needs_quotes = k.contains([',', '|', '"', '\\'])
        || k.contains("->")
        || k != k.trim()
        || super::parser::is_threshold_like(k);
    if needs_quotes {
        quote(k)
    } else {
        k.to_string()
    }
}

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

fn number(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        format!("{}", v)
    }
}

#[cfg(test)]
mod tests {
    use crate::simulation::{
        parse, Comparison, EventTriggerDef, MilestoneDef, SimulationConfig, StatusDef, Threshold,
    };

    fn sample_config() -> SimulationConfig {
        SimulationConfig {
            status_defs: vec![
                StatusDef::new("affection", 0.0, 100.0)
                    .with_default(50.0)
                    .with_description("Fondness, \"warmth\""),
                StatusDef::new("mood_level", -10.0, 10.0).with_default(0.5),
            ],
            milestone_defs: vec![
                MilestoneDef::new("first_date", "Went on a date").with_reward("affection", 10.0),
                MilestoneDef::new("close", "Grew close")
                    .with_keywords(Vec::<String>::new())
                    .with_threshold(Threshold::new("affection", Comparison::AtLeast, 80.0))
                    .with_reward("affection", 20.0)
                    .with_reward("affection", -5.0),
                MilestoneDef::new("promise", "Made a promise").with_keywords(["pinky, swear", "promise"]),
            ],
            event_trigger_defs: vec![EventTriggerDef::new("compliment|say_thanks")
                .with_delta("affection", 5.0)
                .with_delta("mood_level", -1.5)
                .with_label("mood", "happy")],
            compression_prompt: "Summarize briefly.".to_string(),
            injection_template: "Affection: {affection}\nFacts: {persistent_facts}".to_string(),
        }
    }

    #[test]
    fn test_write_then_parse_is_equivalent() {
        let config = sample_config();
        let text = config.to_config_text();
        let parsed = parse(&text);

        assert!(parsed.is_clean(), "{:?}\n{}", parsed.errors(), text);
        assert_eq!(parsed.config, config);
    }

    #[test]
    fn test_control_characters_stay_on_one_line() {
        let config = SimulationConfig {
            status_defs: vec![StatusDef::new("affection", 0.0, 100.0)
                .with_description("Fondness\nacross\tlines\r")],
            event_trigger_defs: vec![EventTriggerDef::new("hug")
                .with_delta("affection", 1.0)
                .with_label("mood", "warm\nand \\n cozy")],
            ..Default::default()
        };
        let text = config.to_config_text();
        assert!(text.contains("\"Fondness\\nacross\\tlines\\r\""));

        let parsed = parse(&text);
        assert!(parsed.is_clean(), "{:?}\n{}", parsed.errors(), text);
        assert_eq!(parsed.config, config);
    }

    #[test]
    fn test_written_text_shape() {
        let text = sample_config().to_config_text();

        assert!(text.starts_with("# Status Values\n"));
        assert!(text.contains("affection: 0-100, default=50, \"Fondness, \\\"warmth\\\"\""));
        assert!(text.contains("mood_level: -10-10, default=0.5\n"));
        assert!(text.contains("first_date: \"Went on a date\" -> affection+10\n"));
        assert!(text.contains("close: \"Grew close\" when affection>=80 -> affection+20, affection-5\n"));
        assert!(text.contains("compliment|say_thanks -> affection+5, mood_level-1.5, mood=\"happy\"\n"));
    }

    #[test]
    fn test_empty_config_writes_nothing() {
        assert_eq!(SimulationConfig::default().to_config_text(), "");
    }
}
