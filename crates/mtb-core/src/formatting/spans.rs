//! Left-to-right span tokenizer.
//!
//! At every position the matchers are tried in priority order: fenced code,
//! inline code, link, then (optionally) single-delimiter emphasis. The first
//! one that matches consumes its span; anything no matcher claims
//! accumulates into `Plain` spans. The resulting spans are ordered,
//! non-overlapping and concatenate back to the input.

use std::ops::Range;

use serde::Serialize;

use crate::formatting::policy::{EscapePolicy, ESCAPE_MARKER};

const FENCE: &str = "```";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SpanKind {
    CodeFence,
    InlineCode,
    Link,
    Emphasis,
    Plain,
}

impl SpanKind {
    /// Protected spans are copied to the output verbatim.
    pub fn is_protected(self) -> bool {
        matches!(
            self,
            SpanKind::CodeFence | SpanKind::InlineCode | SpanKind::Link
        )
    }
}

/// A classified slice of the input. `start` is a byte offset.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Span<'a> {
    pub kind: SpanKind,
    pub start: usize,
    pub text: &'a str,
}

impl<'a> Span<'a> {
    pub fn end(&self) -> usize {
        self.start + self.text.len()
    }

    pub fn range(&self) -> Range<usize> {
        self.start..self.end()
    }

    /// The emphasis delimiter, for `Emphasis` spans.
    pub fn delimiter(&self) -> Option<char> {
        match self.kind {
            SpanKind::Emphasis => self.text.chars().next(),
            _ => None,
        }
    }

    /// Content without the surrounding delimiters.
    pub fn inner(&self) -> &'a str {
        match self.kind {
            SpanKind::CodeFence => &self.text[FENCE.len()..self.text.len() - FENCE.len()],
            SpanKind::InlineCode => &self.text[1..self.text.len() - 1],
            SpanKind::Emphasis => {
                let width = self.delimiter().map(char::len_utf8).unwrap_or(0);
                &self.text[width..self.text.len() - width]
            }
            SpanKind::Link | SpanKind::Plain => self.text,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TokenizeOptions {
    /// Recognise intentional single-delimiter emphasis.
    pub emphasis: bool,
    /// Input is already escaped: a marker followed by a special character is
    /// a literal pair that never opens or closes a span.
    pub escaped: bool,
}

pub fn tokenize<'a>(text: &'a str, policy: &EscapePolicy, opts: TokenizeOptions) -> Vec<Span<'a>> {
    let mut spans = Vec::new();
    let mut plain_start = 0usize;
    let mut pos = 0usize;

    while let Some(c) = text[pos..].chars().next() {
        if skips_escape_pairs(policy, opts) {
            if let Some(width) = escape_pair_width(text, pos, policy) {
                pos += width;
                continue;
            }
        }

        let matched = match_protected(text, pos).or_else(|| {
            if opts.emphasis && policy.is_emphasis_delimiter(c) {
                match_emphasis(text, pos, c, policy, opts).map(|end| (SpanKind::Emphasis, end))
            } else {
                None
            }
        });

        if let Some((kind, end)) = matched {
            if plain_start < pos {
                spans.push(Span {
                    kind: SpanKind::Plain,
                    start: plain_start,
                    text: &text[plain_start..pos],
                });
            }
            spans.push(Span {
                kind,
                start: pos,
                text: &text[pos..end],
            });
            pos = end;
            plain_start = end;
            continue;
        }

        pos += c.len_utf8();
    }

    if plain_start < text.len() {
        spans.push(Span {
            kind: SpanKind::Plain,
            start: plain_start,
            text: &text[plain_start..],
        });
    }

    spans
}

/// Byte ranges of fenced code blocks.
pub fn code_fence_ranges(text: &str, policy: &EscapePolicy, escaped: bool) -> Vec<Range<usize>> {
    let opts = TokenizeOptions {
        emphasis: false,
        escaped,
    };
    tokenize(text, policy, opts)
        .into_iter()
        .filter(|s| s.kind == SpanKind::CodeFence)
        .map(|s| s.range())
        .collect()
}

/// Pretty JSON dump of a tokenization (used by the CLI's `spans` command).
pub fn to_json(spans: &[Span<'_>]) -> crate::Result<String> {
    Ok(serde_json::to_string_pretty(spans)?)
}

pub(crate) fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Escaped input always pairs markers. Raw input does too when the dialect
/// cannot escape the marker itself (legacy Markdown reads `\_` as a literal
/// `_` no matter what), so such a pair never opens or closes a span.
fn skips_escape_pairs(policy: &EscapePolicy, opts: TokenizeOptions) -> bool {
    opts.escaped || !policy.needs_escape(ESCAPE_MARKER)
}

/// Width of an escape pair (marker + special char) starting at `pos`.
pub(crate) fn escape_pair_width(text: &str, pos: usize, policy: &EscapePolicy) -> Option<usize> {
    let rest = &text[pos..];
    let mut chars = rest.chars();
    if chars.next()? != ESCAPE_MARKER {
        return None;
    }
    let next = chars.next()?;
    policy
        .needs_escape(next)
        .then(|| ESCAPE_MARKER.len_utf8() + next.len_utf8())
}

fn match_protected(text: &str, pos: usize) -> Option<(SpanKind, usize)> {
    match_code_fence(text, pos)
        .map(|end| (SpanKind::CodeFence, end))
        .or_else(|| match_inline_code(text, pos).map(|end| (SpanKind::InlineCode, end)))
        .or_else(|| match_link(text, pos).map(|end| (SpanKind::Link, end)))
}

fn match_code_fence(text: &str, pos: usize) -> Option<usize> {
    if !text[pos..].starts_with(FENCE) {
        return None;
    }
    let body = pos + FENCE.len();
    text[body..]
        .find(FENCE)
        .map(|rel| body + rel + FENCE.len())
}

fn match_inline_code(text: &str, pos: usize) -> Option<usize> {
    if !text[pos..].starts_with('`') {
        return None;
    }
    let body = pos + 1;
    for (i, ch) in text[body..].char_indices() {
        match ch {
            '`' if i == 0 => return None,
            '`' => return Some(body + i + 1),
            '\n' => return None,
            _ => {}
        }
    }
    None
}

/// `[text](url)` with no `]` in the text and no `)` in the url.
fn match_link(text: &str, pos: usize) -> Option<usize> {
    if !text[pos..].starts_with('[') {
        return None;
    }
    let label_start = pos + 1;
    let label_len = text[label_start..].find(']')?;
    if label_len == 0 {
        return None;
    }
    let close = label_start + label_len;
    if !text[close + 1..].starts_with('(') {
        return None;
    }
    let url_start = close + 2;
    let url_len = text[url_start..].find(')')?;
    if url_len == 0 {
        return None;
    }
    Some(url_start + url_len + 1)
}

/// Single-delimiter emphasis such as `_word_` or `*word*`.
///
/// The opening delimiter must sit on a word boundary and hug its content;
/// the closing one is the next unescaped, unprotected occurrence in the same
/// paragraph and must also hug the content and be followed by a word
/// boundary. Single newlines are crossed; a blank line ends the search.
fn match_emphasis(
    text: &str,
    pos: usize,
    delim: char,
    policy: &EscapePolicy,
    opts: TokenizeOptions,
) -> Option<usize> {
    if !opens_emphasis(text, pos, delim) {
        return None;
    }

    let mut j = pos + delim.len_utf8();
    while let Some(ch) = text[j..].chars().next() {
        if ch == '\n' && starts_blank_line(&text[j + 1..]) {
            return None;
        }
        if skips_escape_pairs(policy, opts) {
            if let Some(width) = escape_pair_width(text, j, policy) {
                j += width;
                continue;
            }
        }
        if let Some((_, end)) = match_protected(text, j) {
            j = end;
            continue;
        }
        if ch == delim {
            let prev = text[..j].chars().next_back()?;
            if prev.is_whitespace() {
                return None;
            }
            let end = j + delim.len_utf8();
            return match text[end..].chars().next() {
                Some(after) if is_word_char(after) || after == delim => None,
                _ => Some(end),
            };
        }
        j += ch.len_utf8();
    }

    None
}

/// Whether `delim` at `pos` could open emphasis: it sits on a word boundary
/// and is followed by non-whitespace content.
pub(crate) fn opens_emphasis(text: &str, pos: usize, delim: char) -> bool {
    if let Some(before) = text[..pos].chars().next_back() {
        if is_word_char(before) || before == delim {
            return false;
        }
    }
    match text[pos + delim.len_utf8()..].chars().next() {
        Some(first) => !first.is_whitespace() && first != delim,
        None => false,
    }
}

fn starts_blank_line(rest: &str) -> bool {
    rest.trim_start_matches([' ', '\t', '\r']).starts_with('\n')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(text: &str, opts: TokenizeOptions) -> Vec<(SpanKind, String)> {
        tokenize(text, &EscapePolicy::markdown_v2(), opts)
            .into_iter()
            .map(|s| (s.kind, s.text.to_string()))
            .collect()
    }

    const EMPH: TokenizeOptions = TokenizeOptions {
        emphasis: true,
        escaped: false,
    };

    #[test]
    fn spans_cover_input_in_order() {
        let text = "a `b` [c](d) ```e``` _f_ g";
        let spans = tokenize(text, &EscapePolicy::default(), EMPH);
        let joined: String = spans.iter().map(|s| s.text).collect();
        assert_eq!(joined, text);
        for pair in spans.windows(2) {
            assert_eq!(pair[0].end(), pair[1].start);
        }
    }

    #[test]
    fn fence_beats_inline_code() {
        let got = kinds("x ```let a = `b`;``` y", EMPH);
        assert_eq!(
            got,
            vec![
                (SpanKind::Plain, "x ".to_string()),
                (SpanKind::CodeFence, "```let a = `b`;```".to_string()),
                (SpanKind::Plain, " y".to_string()),
            ]
        );
    }

    #[test]
    fn unclosed_fence_is_not_protected() {
        let got = kinds("```rust\nfn main() {}", EMPH);
        assert!(got.iter().all(|(k, _)| *k == SpanKind::Plain));
    }

    #[test]
    fn inline_code_stops_at_newline() {
        let got = kinds("`a\nb`", EMPH);
        assert!(got.iter().all(|(k, _)| *k == SpanKind::Plain));
    }

    #[test]
    fn link_requires_both_parts() {
        assert_eq!(kinds("[a](b)", EMPH), vec![(SpanKind::Link, "[a](b)".to_string())]);
        assert!(kinds("[a] (b)", EMPH).iter().all(|(k, _)| *k == SpanKind::Plain));
        assert!(kinds("[](b)", EMPH).iter().all(|(k, _)| *k == SpanKind::Plain));
    }

    #[test]
    fn emphasis_needs_word_boundaries() {
        assert_eq!(
            kinds("_italic_", EMPH),
            vec![(SpanKind::Emphasis, "_italic_".to_string())]
        );
        assert!(kinds("snake_case_name", EMPH)
            .iter()
            .all(|(k, _)| *k == SpanKind::Plain));
        assert!(kinds("_ spaced _", EMPH)
            .iter()
            .all(|(k, _)| *k == SpanKind::Plain));
        assert!(kinds("__init__", EMPH)
            .iter()
            .all(|(k, _)| *k == SpanKind::Plain));
        assert!(kinds("**bold**", EMPH)
            .iter()
            .all(|(k, _)| *k == SpanKind::Plain));
    }

    #[test]
    fn emphasis_disabled_without_option() {
        let got = kinds("_italic_", TokenizeOptions::default());
        assert_eq!(got, vec![(SpanKind::Plain, "_italic_".to_string())]);
    }

    #[test]
    fn emphasis_does_not_close_inside_code() {
        let got = kinds("*run `a*b` now*", EMPH);
        assert_eq!(
            got,
            vec![(SpanKind::Emphasis, "*run `a*b` now*".to_string())]
        );
    }

    #[test]
    fn escaped_mode_skips_marker_pairs() {
        let opts = TokenizeOptions {
            emphasis: true,
            escaped: true,
        };
        let got = kinds(r"\`not code\` *a\*b*", opts);
        assert_eq!(
            got,
            vec![
                (SpanKind::Plain, r"\`not code\` ".to_string()),
                (SpanKind::Emphasis, r"*a\*b*".to_string()),
            ]
        );
    }

    #[test]
    fn emphasis_spans_lines_within_a_paragraph() {
        assert_eq!(
            kinds("_first\nsecond_", EMPH),
            vec![(SpanKind::Emphasis, "_first\nsecond_".to_string())]
        );
        assert!(kinds("_first\n\nsecond_", EMPH)
            .iter()
            .all(|(k, _)| *k == SpanKind::Plain));
        assert!(kinds("*first\n  \nsecond*", EMPH)
            .iter()
            .all(|(k, _)| *k == SpanKind::Plain));
    }

    #[test]
    fn legacy_raw_escape_pair_is_literal() {
        let got: Vec<_> = tokenize(r"\_b_ c", &EscapePolicy::legacy(), EMPH)
            .into_iter()
            .map(|s| s.kind)
            .collect();
        assert_eq!(got, vec![SpanKind::Plain]);
    }

    #[test]
    fn opener_needs_boundary_and_content() {
        assert!(opens_emphasis("*bold*", 0, '*'));
        assert!(opens_emphasis("(*x", 1, '*'));
        assert!(!opens_emphasis("* item", 0, '*'));
        assert!(!opens_emphasis("5*3", 1, '*'));
        assert!(!opens_emphasis("**", 0, '*'));
        assert!(!opens_emphasis("end *", 4, '*'));
    }

    #[test]
    fn inner_strips_delimiters() {
        let spans = tokenize("```x``` `y` ~z~", &EscapePolicy::markdown_v2(), EMPH);
        let inners: Vec<_> = spans
            .iter()
            .filter(|s| s.kind != SpanKind::Plain)
            .map(|s| s.inner())
            .collect();
        assert_eq!(inners, vec!["x", "y", "z"]);
    }

    #[test]
    fn fence_ranges_are_byte_offsets() {
        let text = "é ```a``` b";
        let ranges = code_fence_ranges(text, &EscapePolicy::default(), false);
        assert_eq!(ranges.len(), 1);
        assert_eq!(&text[ranges[0].clone()], "```a```");
    }

    #[test]
    fn spans_serialize_to_json() {
        let spans = tokenize("`a`", &EscapePolicy::default(), EMPH);
        let json = to_json(&spans).unwrap();
        assert!(json.contains("\"kind\": \"inline_code\""));
        assert!(json.contains("\"start\": 0"));
    }
}
