//! Line-oriented parser for the character configuration grammar.
//!
//! ```text
//! # Status Values
//! affection: 0-100, default=50, "How fond she is of the user"
//!
//! # Milestones
//! first_date: "Went on a first date" when date|movie, affection>=60 -> affection+10, trust+5
//!
//! # Event Triggers
//! compliment|praise -> affection+5, mood="happy"
//!
//! # Memory Compression Prompt
//! Summarize the conversation ...
//!
//! # Prompt Injection Template
//! Affection: {affection}. Milestones: {milestones}.
//! ```
//!
//! Parsing is best-effort: a malformed line is skipped and reported as a [`ConfigDiagnostic`],
//! and the lines after it are still parsed.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::{
    implicit_keyword, trigger_keywords, Comparison, EventTriggerDef, MilestoneDef,
    SimulationConfig, StatDelta, StatusDef, Threshold,
};

static RANGE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(-?\d+(?:\.\d+)?)\s*-\s*(-?\d+(?:\.\d+)?)$").expect("range pattern is valid")
});

static DELTA_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([\p{L}\p{N}_]+)\s*([+-])\s*(\d+(?:\.\d+)?)$").expect("delta pattern is valid")
});

static LABEL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^([\p{L}\p{N}_]+)\s*=\s*"((?:[^"\\]|\\.)*)"$"#).expect("label pattern is valid")
});

static THRESHOLD_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([\p{L}\p{N}_]+)\s*(>=|<=|==|=|>|<)\s*(-?\d+(?:\.\d+)?)$")
        .expect("threshold pattern is valid")
});

static WHEN_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?:^|\s+)when(?:\s+|$)").expect("when pattern is valid"));

/// How serious a configuration diagnostic is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    /// The line (or part of it) was dropped.
    Error,
    /// The line was kept but something in it will be ignored at runtime.
    Warning,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Error => f.write_str("error"),
            Severity::Warning => f.write_str("warning"),
        }
    }
}

/// A problem found while parsing, reported back to the character author.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigDiagnostic {
    /// 1-based line number.
    pub line: usize,
    pub severity: Severity,
    pub message: String,
}

impl std::fmt::Display for ConfigDiagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}: {}: {}", self.line, self.severity, self.message)
    }
}

/// Result of parsing: a (possibly partial) configuration plus diagnostics.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedConfig {
    pub config: SimulationConfig,
    pub diagnostics: Vec<ConfigDiagnostic>,
}

impl ParsedConfig {
    /// Diagnostics rendered for display to the author.
    pub fn errors(&self) -> Vec<String> {
        self.diagnostics.iter().map(ToString::to_string).collect()
    }

    /// Whether any line was dropped.
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

/// Parse character configuration text. Never panics; see the module docs for the grammar.
pub fn parse(text: &str) -> ParsedConfig {
    ConfigParser::default().run(text)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
enum Section {
    #[default]
    Preamble,
    StatusValues,
    Milestones,
    EventTriggers,
    CompressionPrompt,
    InjectionTemplate,
    Unknown,
}

impl Section {
    fn from_marker(line: &str) -> Option<Self> {
        let name = line.trim_start_matches('#').trim().to_lowercase();
        match name.as_str() {
            "status values" => Some(Section::StatusValues),
            "milestones" => Some(Section::Milestones),
            "event triggers" => Some(Section::EventTriggers),
            "memory compression prompt" => Some(Section::CompressionPrompt),
            "prompt injection template" => Some(Section::InjectionTemplate),
            _ => None,
        }
    }

    fn is_free_text(&self) -> bool {
        matches!(self, Section::CompressionPrompt | Section::InjectionTemplate)
    }
}

/// A stat name used by a milestone or trigger, checked once every status is known.
struct StatReference {
    line: usize,
    stat: String,
    owner: String,
}

#[derive(Default)]
struct ConfigParser {
    config: SimulationConfig,
    diagnostics: Vec<ConfigDiagnostic>,
    section: Section,
    seen_sections: HashSet<Section>,
    compression_lines: Vec<String>,
    template_lines: Vec<String>,
    milestone_ids: HashSet<String>,
    trigger_names: HashSet<String>,
    references: Vec<StatReference>,
}

impl ConfigParser {
    fn run(mut self, text: &str) -> ParsedConfig {
        for (index, raw) in text.lines().enumerate() {
            let line_no = index + 1;
            let trimmed = raw.trim();

            if trimmed.starts_with('#') {
                if let Some(section) = Section::from_marker(trimmed) {
                    self.enter(section, line_no);
                    continue;
                }
                if !self.section.is_free_text() {
                    self.error(line_no, format!("unknown section `{}`", trimmed));
                    self.section = Section::Unknown;
                    continue;
                }
            }

            match self.section {
                Section::CompressionPrompt => self.compression_lines.push(raw.to_string()),
                Section::InjectionTemplate => self.template_lines.push(raw.to_string()),
                _ if trimmed.is_empty() || trimmed.starts_with("//") => {}
                Section::Preamble => {
                    self.error(line_no, "line is outside of any section".to_string())
                }
                Section::Unknown => {}
                Section::StatusValues => self.parse_status(line_no, trimmed),
                Section::Milestones => self.parse_milestone(line_no, trimmed),
                Section::EventTriggers => self.parse_trigger(line_no, trimmed),
            }
        }

        self.finish()
    }

    fn enter(&mut self, section: Section, line_no: usize) {
        if section.is_free_text() && !self.seen_sections.insert(section) {
            self.warning(
                line_no,
                "section repeated; its text replaces the earlier one".to_string(),
            );
            match section {
                Section::CompressionPrompt => self.compression_lines.clear(),
                Section::InjectionTemplate => self.template_lines.clear(),
                _ => {}
            }
        }
        self.section = section;
    }

    fn parse_status(&mut self, line_no: usize, line: &str) {
        let Some((name, rest)) = line.split_once(':') else {
            self.error(
                line_no,
                "expected `name: min-max, default=D, \"description\"`".to_string(),
            );
            return;
        };
        let name = name.trim();
        if !is_identifier(name) {
            self.error(line_no, format!("invalid status name `{}`", name));
            return;
        }
        if self.config.has_status(name) {
            self.error(line_no, format!("duplicate status `{}`", name));
            return;
        }

        let mut parts = split_top_level(rest, ',').into_iter().map(str::trim);
        let range = parts.next().unwrap_or_default();
        let Some((min, max)) = parse_range(range) else {
            self.error(
                line_no,
                format!("non-numeric bounds `{}` for status `{}`", range, name),
            );
            return;
        };
        if min > max {
            self.error(
                line_no,
                format!("status `{}` has min {} greater than max {}", name, min, max),
            );
            return;
        }

        let mut default = None;
        let mut description = String::new();
        for part in parts.filter(|p| !p.is_empty()) {
            if let Some(value) = strip_key(part, "default") {
                match number(value) {
                    Some(v) => default = Some(v),
                    None => {
                        self.error(
                            line_no,
                            format!("non-numeric default `{}` for status `{}`", value, name),
                        );
                        return;
                    }
                }
            } else if let Some(text) = unquote(part) {
                description = text;
            } else {
                self.warning(
                    line_no,
                    format!("ignored unrecognised attribute `{}` on status `{}`", part, name),
                );
            }
        }

        let default = default.unwrap_or(min);
        if default < min || default > max {
            self.error(
                line_no,
                format!(
                    "default {} of status `{}` is outside its range {}-{}",
                    default, name, min, max
                ),
            );
            return;
        }

        self.config.status_defs.push(StatusDef {
            name: name.to_string(),
            min,
            max,
            default,
            description,
        });
    }

    fn parse_milestone(&mut self, line_no: usize, line: &str) {
        let Some((id, rest)) = line.split_once(':') else {
            self.error(
                line_no,
                "expected `id: \"description\" -> stat+delta, ...`".to_string(),
            );
            return;
        };
        let id = id.trim();
        if !is_identifier(id) {
            self.error(line_no, format!("invalid milestone id `{}`", id));
            return;
        }
        if self.milestone_ids.contains(id) {
            self.error(line_no, format!("duplicate milestone `{}`", id));
            return;
        }

        let (head, rewards) = match find_top_level(rest, "->") {
            Some(at) => (&rest[..at], Some(&rest[at + 2..])),
            None => (rest, None),
        };

        let (description, condition) = match self.split_description(line_no, head.trim()) {
            Some(parts) => parts,
            None => return,
        };

        let (condition_keywords, thresholds) = match condition {
            None => (vec![implicit_keyword(id)], Vec::new()),
            Some(clause) => self.parse_condition(line_no, id, clause),
        };

        let mut reward_deltas = Vec::new();
        for item in rewards
            .map(|r| split_top_level(r, ','))
            .unwrap_or_default()
            .into_iter()
            .map(str::trim)
            .filter(|i| !i.is_empty())
        {
            if let Some(delta) = parse_delta(item) {
                self.reference(line_no, &delta.stat, format!("milestone `{}`", id));
                reward_deltas.push(delta);
            } else if LABEL_PATTERN.is_match(item) {
                self.error(
                    line_no,
                    format!(
                        "string impact `{}` is only allowed on event triggers",
                        item
                    ),
                );
            } else {
                self.error(
                    line_no,
                    format!("unrecognised reward `{}` on milestone `{}`", item, id),
                );
            }
        }

        self.milestone_ids.insert(id.to_string());
        self.config.milestone_defs.push(MilestoneDef {
            id: id.to_string(),
            description,
            condition_keywords,
            thresholds,
            reward_deltas,
        });
    }

    /// Split `"description" when ...` into the description and the raw condition clause.
    fn split_description<'a>(
        &mut self,
        line_no: usize,
        head: &'a str,
    ) -> Option<(String, Option<&'a str>)> {
        if head.starts_with('"') {
            let Some(end) = closing_quote(head) else {
                self.error(line_no, "unterminated description".to_string());
                return None;
            };
            let description = unescape(&head[1..end]);
            let remainder = head[end + 1..].trim();
            if remainder.is_empty() {
                return Some((description, None));
            }
            match WHEN_PATTERN.find(remainder) {
                Some(m) if m.start() == 0 => Some((description, Some(&remainder[m.end()..]))),
                _ => {
                    self.warning(
                        line_no,
                        format!("ignored unexpected text `{}` after description", remainder),
                    );
                    Some((description, None))
                }
            }
        } else {
            match WHEN_PATTERN.find(head) {
                Some(m) => Some((head[..m.start()].trim().to_string(), Some(&head[m.end()..]))),
                None => Some((head.to_string(), None)),
            }
        }
    }

    fn parse_condition(
        &mut self,
        line_no: usize,
        id: &str,
        clause: &str,
    ) -> (Vec<String>, Vec<Threshold>) {
        let mut keywords = Vec::new();
        let mut thresholds = Vec::new();

        for item in split_top_level(clause, ',')
            .into_iter()
            .map(str::trim)
            .filter(|i| !i.is_empty())
        {
            if let Some(threshold) = parse_threshold(item) {
                self.reference(line_no, &threshold.stat, format!("milestone `{}`", id));
                thresholds.push(threshold);
                continue;
            }
            for alternative in split_top_level(item, '|') {
                let alternative = alternative.trim();
                let keyword = unquote(alternative).unwrap_or_else(|| alternative.to_string());
                if !keyword.is_empty() {
                    keywords.push(keyword);
                }
            }
        }

        if keywords.is_empty() && thresholds.is_empty() {
            self.warning(
                line_no,
                format!("empty `when` clause; milestone `{}` can never be achieved", id),
            );
        }
        (keywords, thresholds)
    }

    fn parse_trigger(&mut self, line_no: usize, line: &str) {
        let Some(at) = find_top_level(line, "->") else {
            self.error(
                line_no,
                "expected `trigger -> stat+delta, label=\"value\"`".to_string(),
            );
            return;
        };
        let name = line[..at].trim();
        let keywords = trigger_keywords(name);
        if keywords.is_empty() {
            self.error(line_no, "event trigger has no name".to_string());
            return;
        }
        if self.trigger_names.contains(name) {
            self.error(line_no, format!("duplicate event trigger `{}`", name));
            return;
        }

        let mut trigger = EventTriggerDef {
            name: name.to_string(),
            trigger_keywords: keywords,
            impact: Vec::new(),
            labels: Default::default(),
        };

        for item in split_top_level(&line[at + 2..], ',')
            .into_iter()
            .map(str::trim)
            .filter(|i| !i.is_empty())
        {
            if let Some(delta) = parse_delta(item) {
                self.reference(line_no, &delta.stat, format!("event trigger `{}`", name));
                trigger.impact.push(delta);
            } else if let Some(caps) = LABEL_PATTERN.captures(item) {
                let key = caps[1].to_string();
                if trigger
                    .labels
                    .insert(key.clone(), unescape(&caps[2]))
                    .is_some()
                {
                    self.warning(
                        line_no,
                        format!("label `{}` given twice; the last value wins", key),
                    );
                }
            } else {
                self.error(
                    line_no,
                    format!("unrecognised impact `{}` on event trigger `{}`", item, name),
                );
            }
        }

        self.trigger_names.insert(name.to_string());
        self.config.event_trigger_defs.push(trigger);
    }

    fn reference(&mut self, line: usize, stat: &str, owner: String) {
        self.references.push(StatReference {
            line,
            stat: stat.to_string(),
            owner,
        });
    }

    fn finish(mut self) -> ParsedConfig {
        self.config.compression_prompt = self.compression_lines.join("\n").trim().to_string();
        self.config.injection_template = self.template_lines.join("\n").trim().to_string();

        let references = std::mem::take(&mut self.references);
        for r in references {
            if !self.config.has_status(&r.stat) {
                self.warning(
                    r.line,
                    format!(
                        "unknown status `{}` in {}; it will be ignored",
                        r.stat, r.owner
                    ),
                );
            }
        }

        self.diagnostics.sort_by_key(|d| d.line);
        ParsedConfig {
            config: self.config,
            diagnostics: self.diagnostics,
        }
    }

    fn error(&mut self, line: usize, message: String) {
        self.diagnostics.push(ConfigDiagnostic {
            line,
            severity: Severity::Error,
            message,
        });
    }

    fn warning(&mut self, line: usize, message: String) {
        self.diagnostics.push(ConfigDiagnostic {
            line,
            severity: Severity::Warning,
            message,
        });
    }
}

fn is_identifier(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_alphanumeric() || c == '_')
}

fn number(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

fn parse_range(s: &str) -> Option<(f64, f64)> {
    let caps = RANGE_PATTERN.captures(s)?;
    Some((number(&caps[1])?, number(&caps[2])?))
}

fn parse_delta(s: &str) -> Option<StatDelta> {
    let caps = DELTA_PATTERN.captures(s)?;
    let magnitude = number(&caps[3])?;
    let delta = if &caps[2] == "-" { -magnitude } else { magnitude };
    Some(StatDelta::new(&caps[1], delta))
}

fn parse_threshold(s: &str) -> Option<Threshold> {
    let caps = THRESHOLD_PATTERN.captures(s)?;
    Some(Threshold::new(
        &caps[1],
        Comparison::from_symbol(&caps[2])?,
        number(&caps[3])?,
    ))
}

/// Whether a bare condition item would be read as a threshold rather than a keyword.
pub(crate) fn is_threshold_like(s: &str) -> bool {
    parse_threshold(s.trim()).is_some()
}

/// `key=value` -> `value`, with the key matched case-insensitively.
fn strip_key<'a>(part: &'a str, key: &str) -> Option<&'a str> {
    let (k, v) = part.split_once('=')?;
    k.trim().eq_ignore_ascii_case(key).then(|| v.trim())
}

/// Split on `sep`, ignoring separators inside double quotes.
pub(crate) fn split_top_level(s: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut in_quotes = false;
    let mut escaped = false;
    for (i, c) in s.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            c if c == sep && !in_quotes => {
                parts.push(&s[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&s[start..]);
    parts
}

/// Byte offset of `pattern` outside double quotes.
fn find_top_level(s: &str, pattern: &str) -> Option<usize> {
    let mut in_quotes = false;
    let mut escaped = false;
    for (i, c) in s.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            _ if !in_quotes && s[i..].starts_with(pattern) => return Some(i),
            _ => {}
        }
    }
    None
}

/// Byte offset of the quote closing the one at offset 0.
fn closing_quote(s: &str) -> Option<usize> {
    let mut escaped = false;
    for (i, c) in s.char_indices().skip(1) {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '"' => return Some(i),
            _ => {}
        }
    }
    None
}

fn unquote(s: &str) -> Option<String> {
    if s.len() >= 2 && s.starts_with('"') && closing_quote(s) == Some(s.len() - 1) {
        Some(unescape(&s[1..s.len() - 1]))
    } else {
        None
    }
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(match next {
                    'n' => '\n',
                    'r' => '\r',
                    't' => '\t',
                    other => other,
                });
                continue;
            }
        }
        out.push(c);
    }
    out
}
