//! Line-oriented `key=value` settings text.
//!
//! Accepted syntax: `key=value` or `key:value` pairs, `#` and `!` comment
//! lines, a trailing odd run of backslashes continuing the logical line, and
//! backslash escapes (`\t`, `\n`, `\r`, `\\`, or any escaped literal).

use std::collections::BTreeMap;
use std::fmt::Write as _;

/// Ordered key/value pairs parsed from settings text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Properties {
    entries: BTreeMap<String, String>,
}

impl Properties {
    /// Empty property set.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Parse settings text; later duplicates override earlier keys.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let mut entries = BTreeMap::new();
        for line in logical_lines(text) {
            let (key, value) = split_pair(&line);
            if key.is_empty() {
                continue;
            }
            entries.insert(unescape(key), unescape(value));
        }
        Self { entries }
    }

    /// Value stored under `key`, if present.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Store `value` under `key`, replacing any previous value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    /// Iterate over keys in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Number of stored pairs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no pairs are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Render the pairs back to text, one `key=value` per line, after an
    /// optional `#` header comment.
    #[must_use]
    pub fn render(&self, header: Option<&str>) -> String {
        let mut out = String::new();
        if let Some(header) = header {
            for line in header.lines() {
                let _ = writeln!(out, "# {line}");
            }
        }
        for (key, value) in &self.entries {
            let _ = writeln!(out, "{}={}", escape(key, true), escape(value, false));
        }
        out
    }
}

fn logical_lines(text: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let mut pending: Option<String> = None;

    for raw in text.lines() {
        let trimmed = raw.trim_start();
        let continuing = pending.is_some();
        if !continuing && (trimmed.is_empty() || trimmed.starts_with(['#', '!'])) {
            continue;
        }

        let content = trimmed.trim_end();
        let (body, continues) = strip_continuation(content);
        let buffer = pending.get_or_insert_with(String::new);
        buffer.push_str(body);

        if !continues {
            if let Some(line) = pending.take() {
                lines.push(line);
            }
        }
    }

    if let Some(line) = pending {
        lines.push(line);
    }
    lines
}

fn strip_continuation(line: &str) -> (&str, bool) {
    let trailing = line.chars().rev().take_while(|ch| *ch == '\\').count();
    if trailing % 2 == 1 {
        (&line[..line.len() - 1], true)
    } else {
        (line, false)
    }
}

fn split_pair(line: &str) -> (&str, &str) {
    let mut escaped = false;
    for (index, ch) in line.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' => escaped = true,
            '=' | ':' => {
                let key = line[..index].trim();
                let value = line[index + ch.len_utf8()..].trim();
                return (key, value);
            }
            _ => {}
        }
    }
    (line.trim(), "")
}

fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}

fn escape(text: &str, is_key: bool) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '=' | ':' | ' ' if is_key => {
                out.push('\\');
                out.push(ch);
            }
            _ => out.push(ch),
        }
    }
    out
}
