//! Escaping raw text for Telegram Markdown.

use crate::formatting::{
    policy::{EscapePolicy, ESCAPE_MARKER},
    spans::{tokenize, SpanKind, TokenizeOptions},
};

/// Escape `text` for the default (MarkdownV2) dialect.
///
/// Code fences, inline code and links pass through untouched. With
/// `protect_formatting`, intentional emphasis such as `_word_` keeps its
/// delimiters while `snake_case` underscores are escaped. Applying this twice
/// double-escapes.
pub fn escape(text: &str, protect_formatting: bool) -> String {
    EscapePolicy::default().escape(text, protect_formatting)
}

impl EscapePolicy {
    pub fn escape(&self, text: &str, protect_formatting: bool) -> String {
        let mut out = String::with_capacity(text.len() + text.len() / 8);
        self.escape_into(&mut out, text, protect_formatting);
        out
    }

    fn escape_into(&self, out: &mut String, text: &str, protect_formatting: bool) {
        let opts = TokenizeOptions {
            emphasis: protect_formatting,
            escaped: false,
        };

        for span in tokenize(text, self, opts) {
            match span.kind {
                SpanKind::CodeFence | SpanKind::InlineCode | SpanKind::Link => {
                    out.push_str(span.text)
                }
                SpanKind::Emphasis => {
                    let Some(delim) = span.delimiter() else {
                        continue;
                    };
                    out.push(delim);
                    self.escape_into(out, span.inner(), protect_formatting);
                    out.push(delim);
                }
                SpanKind::Plain => self.escape_plain(out, span.text),
            }
        }
    }

    fn escape_plain(&self, out: &mut String, text: &str) {
        for c in text.chars() {
            if self.needs_escape(c) {
                out.push(ESCAPE_MARKER);
            }
            out.push(c);
        }
    }

    /// Drop escape markers in unprotected text.
    pub(crate) fn unescape_plain(&self, out: &mut String, text: &str) {
        let mut chars = text.chars().peekable();
        while let Some(c) = chars.next() {
            if c == ESCAPE_MARKER {
                if let Some(&next) = chars.peek() {
                    if self.needs_escape(next) {
                        out.push(next);
                        chars.next();
                        continue;
                    }
                }
            }
            out.push(c);
        }
    }
}
