//! Generic Markdown (as LLMs write it) ⇄ Telegram Markdown.
//!
//! Telegram's dialects have no headings, no `**bold**` and no list syntax.
//! Outbound text is rewritten line by line (headings become a bold line,
//! `**x**` becomes `*x*`, list markers become `•`) and then escaped. Lines
//! inside fenced code are never touched.

use std::{ops::Range, sync::LazyLock};

use regex::Regex;

use crate::formatting::{
    policy::EscapePolicy,
    spans::{code_fence_ranges, tokenize, SpanKind, TokenizeOptions},
};

const BULLET: &str = "•";

static HEADING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s{0,3}#{1,6}\s+(.+?)(?:\s+#+)?\s*$").expect("valid regex")
});

static BULLET_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\s*)[-*+]\s+(.*)$").expect("valid regex"));

static DOUBLE_STAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*(.+?)\*\*").expect("valid regex"));

static SINGLE_STAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*([^*\s][^*]*?)\*").expect("valid regex"));

/// Convert generic Markdown to escaped Telegram MarkdownV2.
pub fn convert_from_generic_markdown(text: &str) -> String {
    EscapePolicy::default().convert_from_generic_markdown(text)
}

/// Best-effort inverse of [`convert_from_generic_markdown`].
pub fn convert_to_generic_markdown(text: &str) -> String {
    EscapePolicy::default().convert_to_generic_markdown(text)
}

impl EscapePolicy {
    pub fn convert_from_generic_markdown(&self, text: &str) -> String {
        let fences = code_fence_ranges(text, self, false);
        let rewritten = map_lines_outside(text, &fences, |line| self.rewrite_generic_line(line));
        self.escape(&rewritten, true)
    }

    /// Lossy: a standalone bold line comes back as a level-2 heading, and
    /// every heading level comes back as level 2.
    pub fn convert_to_generic_markdown(&self, text: &str) -> String {
        let fences = code_fence_ranges(text, self, true);
        map_lines_outside(text, &fences, |line| self.rewrite_telegram_line(line))
    }

    fn rewrite_generic_line(&self, line: &str) -> String {
        if let Some(caps) = HEADING_RE.captures(line) {
            let title = strip_emphasis(caps[1].trim());
            if !title.is_empty() {
                return format!("*{title}*");
            }
        }

        if let Some(caps) = BULLET_RE.captures(line) {
            let rest = self.collapse_double_stars(&caps[2]);
            return format!("{}{BULLET} {rest}", &caps[1]);
        }

        self.collapse_double_stars(line)
    }

    /// `**x**` → `*x*`, pairing `**` markers that sit outside code and links.
    fn collapse_double_stars(&self, line: &str) -> String {
        let mut markers = Vec::new();
        for span in tokenize(line, self, TokenizeOptions::default()) {
            if span.kind == SpanKind::Plain {
                markers.extend(span.text.match_indices("**").map(|(i, _)| span.start + i));
            }
        }
        if markers.len() < 2 {
            return line.to_string();
        }

        let paired = &markers[..markers.len() - markers.len() % 2];
        let mut out = String::with_capacity(line.len());
        let mut last = 0usize;
        for &at in paired {
            out.push_str(&line[last..at]);
            out.push('*');
            last = at + 2;
        }
        out.push_str(&line[last..]);
        out
    }

    fn rewrite_telegram_line(&self, line: &str) -> String {
        let rest = line.trim_start();
        let indent = &line[..line.len() - rest.len()];

        if let Some(item) = rest.strip_prefix(BULLET).and_then(|r| r.strip_prefix(' ')) {
            return format!("{indent}- {}", self.restore(item));
        }

        let opts = TokenizeOptions {
            emphasis: true,
            escaped: true,
        };
        let spans = tokenize(rest, self, opts);
        if let [only] = spans.as_slice() {
            if only.delimiter() == Some('*') {
                return format!("{indent}## {}", self.restore(only.inner()));
            }
        }

        format!("{indent}{}", self.restore(rest))
    }

    fn restore(&self, text: &str) -> String {
        let opts = TokenizeOptions {
            emphasis: true,
            escaped: true,
        };
        let mut out = String::with_capacity(text.len());
        for span in tokenize(text, self, opts) {
            match span.kind {
                SpanKind::CodeFence | SpanKind::InlineCode | SpanKind::Link => {
                    out.push_str(span.text)
                }
                SpanKind::Emphasis => {
                    let marker = match span.delimiter() {
                        Some('*') => "**".to_string(),
                        Some(d) => d.to_string(),
                        None => String::new(),
                    };
                    out.push_str(&marker);
                    out.push_str(&self.restore(span.inner()));
                    out.push_str(&marker);
                }
                SpanKind::Plain => self.unescape_plain(&mut out, span.text),
            }
        }
        out
    }
}

/// Headings become one bold span, so inner emphasis markers are dropped.
fn strip_emphasis(title: &str) -> String {
    let once = DOUBLE_STAR_RE.replace_all(title, "$1");
    SINGLE_STAR_RE.replace_all(&once, "$1").into_owned()
}

/// Apply `f` to every line (without its newline) that does not touch a
/// fenced code block; other lines are copied as is.
fn map_lines_outside<F>(text: &str, fences: &[Range<usize>], f: F) -> String
where
    F: Fn(&str) -> String,
{
    let mut out = String::with_capacity(text.len() + 16);
    let mut offset = 0usize;

    for line in text.split_inclusive('\n') {
        let start = offset;
        let end = offset + line.len();
        offset = end;

        if fences.iter().any(|r| r.start < end && start < r.end) {
            out.push_str(line);
            continue;
        }

        match line.strip_suffix('\n') {
            Some(body) => {
                out.push_str(&f(body));
                out.push('\n');
            }
            None => out.push_str(&f(line)),
        }
    }

    out
}
