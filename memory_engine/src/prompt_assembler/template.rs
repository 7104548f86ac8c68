//! Rendering of the prompt injection template against a core memory.
//!
//! Placeholders are `{name}`. Reserved names come first:
//! `{milestones}`, `{persistent_facts}`, `{compressed_history}`, `{conversation_count}`.
//! Any other name is looked up as a status value, then as a label. Unknown placeholders are
//! left in place verbatim.

use character_sim::{format_number, CoreMemory};

/// Render `template`, or a default status summary when the template is blank.
pub fn render_memory(template: &str, memory: &CoreMemory) -> String {
    if template.trim().is_empty() {
        default_summary(memory)
    } else {
        render_template(template, memory)
    }
}

/// Substitute every known placeholder in `template`.
pub fn render_template(template: &str, memory: &CoreMemory) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];

        let name_len = after
            .find(|c: char| !(c.is_alphanumeric() || c == '_'))
            .unwrap_or(after.len());
        let closed = after[name_len..].starts_with('}');

        match (closed && name_len > 0)
            .then(|| placeholder_value(&after[..name_len], memory))
            .flatten()
        {
            Some(value) => {
                out.push_str(&value);
                rest = &after[name_len + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

fn placeholder_value(name: &str, memory: &CoreMemory) -> Option<String> {
    let value = match name {
        "milestones" => {
            let achieved: Vec<&str> = memory
                .achieved_milestones()
                .map(|m| m.description.as_str())
                .collect();
            if achieved.is_empty() {
                "none yet".to_string()
            } else {
                achieved.join(", ")
            }
        }
        "persistent_facts" => {
            if memory.persistent_facts.is_empty() {
                "none".to_string()
            } else {
                memory
                    .persistent_facts
                    .iter()
                    .map(String::as_str)
                    .collect::<Vec<_>>()
                    .join("; ")
            }
        }
        "compressed_history" => memory.compressed_history.clone().unwrap_or_default(),
        "conversation_count" => memory.conversation_count.to_string(),
        _ => {
            if let Some(value) = memory.status_value(name) {
                format_number(value)
            } else {
                memory.labels.get(name)?.clone()
            }
        }
    };
    Some(value)
}

/// Summary used when the character has no injection template.
pub fn default_summary(memory: &CoreMemory) -> String {
    let mut lines = Vec::new();

    for status in memory.status_values.values() {
        lines.push(format!(
            "- {}: {} ({}-{})",
            status.name,
            format_number(status.current()),
            format_number(status.min()),
            format_number(status.max())
        ));
    }
    for (key, value) in &memory.labels {
        lines.push(format!("- {}: {}", key, value));
    }

    let achieved: Vec<&str> = memory
        .achieved_milestones()
        .map(|m| m.description.as_str())
        .collect();
    if !achieved.is_empty() {
        lines.push(format!("Milestones: {}", achieved.join(", ")));
    }
    if !memory.persistent_facts.is_empty() {
        let facts: Vec<&str> = memory.persistent_facts.iter().map(String::as_str).collect();
        lines.push(format!("Known facts: {}", facts.join("; ")));
    }
    if let Some(summary) = &memory.compressed_history {
        lines.push(format!("Earlier: {}", summary));
    }

    lines.join("\n")
}
