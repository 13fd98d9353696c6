// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Ordered text validation rules.
//!
//! A [`RuleSet`] holds hard-reject rules followed by soft-rewrite rules.
//! Hard rejects are matched against the text with HTML entities decoded, so
//! an entity-encoded payload is judged like the raw one. Rewrites escape
//! rather than strip, and every rewrite is a fixed point: running the set
//! over its own output changes nothing.
//!
//! Detection is heuristic pattern matching. False positives are accepted
//! in exchange for fewer false negatives.

use crate::config::ValidationConfig;
use crate::error::ConfigError;
use regex::Regex;
use std::borrow::Cow;
use thiserror::Error;

/// Why a piece of text was refused.
///
/// The display text is generic and never echoes the input.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextRejection {
    #[error("Message is empty")]
    Empty,

    #[error("Message is too long")]
    TooLong,

    #[error("Message contains potentially dangerous content")]
    ScriptInjection,

    #[error("Message contains suspicious content")]
    SqlLike,

    #[error("Message contains disallowed markup")]
    HtmlAbuse,
}

impl TextRejection {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::TooLong => "too_long",
            Self::ScriptInjection => "script_injection",
            Self::SqlLike => "sql_like",
            Self::HtmlAbuse => "html_abuse",
        }
    }
}

/// Whether a rule refuses input or rewrites it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Reject,
    Rewrite,
}

/// Outcome of a single rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Rule has nothing to say
    Pass,
    /// Input is acceptable once replaced by this text
    Rewrite(String),
    /// Input is refused
    Reject(TextRejection),
}

/// A single named validation rule. Rules hold no per-request state.
pub trait ValidationRule: Send + Sync {
    fn name(&self) -> &'static str;
    fn severity(&self) -> Severity;
    fn evaluate(&self, input: &str) -> Verdict;
}

/// Hard-reject rule backed by a regular expression.
pub struct PatternRule {
    name: &'static str,
    regex: Regex,
    reason: TextRejection,
}

impl PatternRule {
    pub fn new(
        name: &'static str,
        pattern: &str,
        reason: TextRejection,
    ) -> Result<Self, ConfigError> {
        let regex = Regex::new(pattern).map_err(|source| ConfigError::InvalidPattern {
            rule: name.to_string(),
            source,
        })?;
        Ok(Self {
            name,
            regex,
            reason,
        })
    }
}

impl ValidationRule for PatternRule {
    fn name(&self) -> &'static str {
        self.name
    }

    fn severity(&self) -> Severity {
        Severity::Reject
    }

    fn evaluate(&self, input: &str) -> Verdict {
        if self.regex.is_match(input) {
            Verdict::Reject(self.reason)
        } else {
            Verdict::Pass
        }
    }
}

/// Script injection patterns, most specific first.
const SCRIPT_PATTERNS: &[(&str, &str)] = &[
    ("script_block", r"(?is)<\s*script\b[^>]*>.*?<\s*/\s*script\s*>"),
    ("script_tag", r"(?i)<\s*/?\s*script\b"),
    ("script_scheme", r"(?i)\b(?:java|vb|live)script\s*:"),
    ("data_uri", r"(?i)\bdata:(?:[a-z]+/[a-z0-9.+\-]+|[;,])"),
    (
        "event_handler",
        r"(?i)\bon(?:abort|animation\w*|begin|blur|change|click|contextmenu|copy|cut|dblclick|drag\w*|drop|end|error|focus\w*|hashchange|input|invalid|key\w*|load|message|mouse\w*|paste|pause|play\w*|pointer\w*|popstate|reset|resize|scroll|select|submit|toggle|touch\w*|transition\w*|unload|wheel)\s*=",
    ),
    ("tag_event_handler", r"(?i)<[a-z][a-z0-9\-]*\b[^>]*\son[a-z]+\s*="),
];

/// Markup abuse patterns.
const HTML_PATTERNS: &[(&str, &str)] = &[
    (
        "embedding_tag",
        r"(?i)<\s*/?\s*(?:iframe|frameset|frame|object|embed|applet|meta|link|base|form|style|svg|math|template)\b",
    ),
    ("css_expression", r#"(?i)\bstyle\s*=\s*["']?[^"'>]*expression\s*\("#),
];

/// Built-in SQL injection heuristics: a keyword combined with
/// statement-termination, comment or tautology syntax.
pub const DEFAULT_SQL_PATTERNS: &[(&str, &str)] = &[
    ("sql_union_select", r"(?i)\bunion\s+(?:all\s+)?select\b"),
    (
        "sql_stacked_statement",
        r"(?i);\s*(?:(?:drop|truncate|alter|create)\s+(?:table|database|schema|index|view|user)\b|delete\s+from\b|insert\s+into\b|update\s+\w+\s+set\b|exec(?:ute)?\s+\w+)",
    ),
    ("sql_drop_table", r"(?i)\bdrop\s+(?:table|database)\b"),
    (
        "sql_tautology",
        r#"(?i)['"]\s*\)?\s*(?:or|and)\s+['"]?\w+['"]?\s*=\s*['"]?\w+"#,
    ),
    ("sql_quote_comment", r#"['"];?\s*(?:--|/\*)"#),
    (
        "sql_select_comment",
        r"(?i)\bselect\s+[\w*,\s]+?\s+from\s+\w+[^\n]*(?:--|/\*|;)",
    ),
];

/// Markers that can be repeated to flood formatting.
const FLOOD_MARKERS: &[char] = &['*', '_', '`', '~', '#'];

/// Characters with meaning in chat markdown.
const MARKDOWN_SPECIALS: &[char] = &['\\', '`', '*', '_', '~', '[', ']', '(', ')', '#', '|'];

/// Shortens runs of one markdown marker to at most `max_run` characters.
pub struct FormattingFloodRule {
    max_run: usize,
}

impl FormattingFloodRule {
    pub fn new(max_run: usize) -> Self {
        Self {
            max_run: max_run.max(1),
        }
    }
}

impl ValidationRule for FormattingFloodRule {
    fn name(&self) -> &'static str {
        "formatting_flood"
    }

    fn severity(&self) -> Severity {
        Severity::Rewrite
    }

    fn evaluate(&self, input: &str) -> Verdict {
        let mut out = String::with_capacity(input.len());
        let mut changed = false;
        let mut run_char = None;
        let mut run_len = 0usize;

        for ch in input.chars() {
            if Some(ch) == run_char {
                run_len += 1;
            } else {
                run_char = FLOOD_MARKERS.contains(&ch).then_some(ch);
                run_len = 1;
            }

            if run_char.is_some() && run_len > self.max_run {
                changed = true;
                continue;
            }
            out.push(ch);
        }

        if changed {
            Verdict::Rewrite(out)
        } else {
            Verdict::Pass
        }
    }
}

/// Escapes characters the platform could read as HTML.
/// `&` that already starts an entity is kept.
pub struct HtmlEscapeRule;

impl ValidationRule for HtmlEscapeRule {
    fn name(&self) -> &'static str {
        "html_escape"
    }

    fn severity(&self) -> Severity {
        Severity::Rewrite
    }

    fn evaluate(&self, input: &str) -> Verdict {
        if !input.contains(['&', '<', '>', '"']) {
            return Verdict::Pass;
        }

        let mut out = String::with_capacity(input.len() + 16);
        for (i, ch) in input.char_indices() {
            match ch {
                '&' if entity_len(&input[i..]).is_some() => out.push('&'),
                '&' => out.push_str("&amp;"),
                '<' => out.push_str("&lt;"),
                '>' => out.push_str("&gt;"),
                '"' => out.push_str("&quot;"),
                _ => out.push(ch),
            }
        }

        if out == input {
            Verdict::Pass
        } else {
            Verdict::Rewrite(out)
        }
    }
}

/// Backslash-escapes markdown specials so they render literally.
/// Existing `\X` escapes and HTML entities are left as they are.
pub struct MarkdownEscapeRule;

impl ValidationRule for MarkdownEscapeRule {
    fn name(&self) -> &'static str {
        "markdown_escape"
    }

    fn severity(&self) -> Severity {
        Severity::Rewrite
    }

    fn evaluate(&self, input: &str) -> Verdict {
        let mut out = String::with_capacity(input.len() + 16);
        let mut rest = input;

        while let Some(ch) = rest.chars().next() {
            if ch == '&' {
                if let Some(len) = entity_len(rest) {
                    out.push_str(&rest[..len]);
                    rest = &rest[len..];
                    continue;
                }
            }

            if ch == '\\' {
                if let Some(next) = rest[1..].chars().next() {
                    if MARKDOWN_SPECIALS.contains(&next) {
                        out.push('\\');
                        out.push(next);
                        rest = &rest[1 + next.len_utf8()..];
                        continue;
                    }
                }
            }

            if MARKDOWN_SPECIALS.contains(&ch) {
                out.push('\\');
            }
            out.push(ch);
            rest = &rest[ch.len_utf8()..];
        }

        if out == input {
            Verdict::Pass
        } else {
            Verdict::Rewrite(out)
        }
    }
}

const NAMED_ENTITIES: &[(&str, char)] = &[
    ("amp", '&'),
    ("lt", '<'),
    ("gt", '>'),
    ("quot", '"'),
    ("apos", '\''),
    ("nbsp", '\u{a0}'),
];

/// Length in bytes of the entity starting at `s`, if `s` starts with one.
fn entity_len(s: &str) -> Option<usize> {
    entity_at(s).map(|(len, _)| len)
}

/// Bytes searched for the `;` that ends an entity.
const MAX_ENTITY_BODY: usize = 10;

fn entity_at(s: &str) -> Option<(usize, char)> {
    let body = s.strip_prefix('&')?;
    let end = body
        .bytes()
        .take(MAX_ENTITY_BODY)
        .position(|b| b == b';')?;
    let name = &body[..end];

    let ch = if let Some(num) = name.strip_prefix('#') {
        let code = match num.strip_prefix(['x', 'X']) {
            Some(hex) if (1..=6).contains(&hex.len()) => u32::from_str_radix(hex, 16).ok()?,
            Some(_) => return None,
            None if (1..=7).contains(&num.len()) => num.parse::<u32>().ok()?,
            None => return None,
        };
        char::from_u32(code)?
    } else {
        NAMED_ENTITIES
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, c)| *c)?
    };

    Some((end + 2, ch))
}

/// Length in characters as a reader sees it: a recognised entity or a
/// `\X` markdown escape counts as one. Escaping never grows this count,
/// so sanitized output passes the same length ceiling as its input.
pub fn visible_len(s: &str) -> usize {
    let mut count = 0;
    let mut rest = s;
    while let Some(ch) = rest.chars().next() {
        let step = match ch {
            '&' => entity_len(rest).unwrap_or(1),
            '\\' => match rest[1..].chars().next() {
                Some(next) if MARKDOWN_SPECIALS.contains(&next) => 1 + next.len_utf8(),
                _ => 1,
            },
            _ => ch.len_utf8(),
        };
        count += 1;
        rest = &rest[step..];
    }
    count
}

/// Decode the entities this module recognises, one level deep.
pub fn decode_entities(input: &str) -> Cow<'_, str> {
    if !input.contains('&') {
        return Cow::Borrowed(input);
    }

    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        rest = &rest[pos..];
        match entity_at(rest) {
            Some((len, ch)) => {
                out.push(ch);
                rest = &rest[len..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    Cow::Owned(out)
}

/// Text after a rule set has run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleOutcome {
    pub text: String,
    /// Names of rewrite rules that changed the text, in order
    pub applied: Vec<&'static str>,
}

/// Immutable ordered rule list.
pub struct RuleSet {
    rules: Vec<Box<dyn ValidationRule>>,
}

impl RuleSet {
    /// Build a rule set. Reject rules are moved ahead of rewrite rules;
    /// relative order within each class is kept.
    pub fn new(mut rules: Vec<Box<dyn ValidationRule>>) -> Self {
        rules.sort_by_key(|r| r.severity());
        Self { rules }
    }

    /// The default rules: script injection, markup abuse and SQL-like
    /// rejects, then formatting flood, HTML and markdown rewrites.
    pub fn default_rules(config: &ValidationConfig) -> Result<Self, ConfigError> {
        let mut rules: Vec<Box<dyn ValidationRule>> = Vec::new();

        for (name, pattern) in SCRIPT_PATTERNS {
            rules.push(Box::new(PatternRule::new(
                name,
                pattern,
                TextRejection::ScriptInjection,
            )?));
        }
        for (name, pattern) in HTML_PATTERNS {
            rules.push(Box::new(PatternRule::new(
                name,
                pattern,
                TextRejection::HtmlAbuse,
            )?));
        }
        if config.sql_patterns.is_empty() {
            for (name, pattern) in DEFAULT_SQL_PATTERNS {
                rules.push(Box::new(PatternRule::new(name, pattern, TextRejection::SqlLike)?));
            }
        } else {
            for pattern in &config.sql_patterns {
                rules.push(Box::new(PatternRule::new(
                    "sql_configured",
                    pattern,
                    TextRejection::SqlLike,
                )?));
            }
        }

        rules.push(Box::new(FormattingFloodRule::new(config.max_marker_run)));
        rules.push(Box::new(HtmlEscapeRule));
        rules.push(Box::new(MarkdownEscapeRule));

        Ok(Self::new(rules))
    }

    /// Rule names in evaluation order.
    pub fn names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    /// Run every rule in order. The first rejection wins.
    pub fn apply(&self, text: &str) -> Result<RuleOutcome, (&'static str, TextRejection)> {
        let decoded = decode_entities(text);
        let mut current = text.to_string();
        let mut applied = Vec::new();

        for rule in &self.rules {
            let input = match rule.severity() {
                Severity::Reject => decoded.as_ref(),
                Severity::Rewrite => current.as_str(),
            };
            match rule.evaluate(input) {
                Verdict::Pass => {}
                Verdict::Rewrite(rewritten) => {
                    current = rewritten;
                    applied.push(rule.name());
                }
                Verdict::Reject(reason) => return Err((rule.name(), reason)),
            }
        }

        Ok(RuleOutcome {
            text: current,
            applied,
        })
    }
}
