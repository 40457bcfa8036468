//! Fitting text into Telegram's per-message length limit.
//!
//! All lengths are counted in `char`s.

use crate::formatting::{
    policy::{EscapePolicy, ESCAPE_MARKER},
    spans::{opens_emphasis, tokenize, SpanKind, TokenizeOptions},
};

const FENCE: &str = "```";
const FENCE_CLOSE: &str = "\n```";

/// Below this limit chunks are cut hard, without fence repair.
const MIN_LIMIT_FOR_FENCE_REPAIR: usize = 16;

/// Split `text` into chunks of at most `max_chars` characters.
///
/// Cuts prefer the last newline, then the last whitespace, in the second
/// half of the window. An escape pair is never split. When a cut lands inside
/// a fenced code block the fence is closed at the end of the chunk and
/// reopened (with its language tag) at the start of the next one.
pub fn split_message(text: &str, max_chars: usize) -> Vec<String> {
    if text.is_empty() || max_chars == 0 {
        return Vec::new();
    }

    let mut chunks = Vec::new();
    let mut rest = text;
    let mut reopen = String::new();

    loop {
        let mut prefix = std::mem::take(&mut reopen);
        let mut reserve = if max_chars > MIN_LIMIT_FOR_FENCE_REPAIR {
            FENCE_CLOSE.len()
        } else {
            0
        };
        if prefix.chars().count() + reserve + 1 > max_chars {
            prefix.clear();
            reserve = 0;
        }

        let avail = max_chars - prefix.chars().count();
        if rest.chars().count() <= avail {
            prefix.push_str(rest);
            chunks.push(prefix);
            break;
        }

        let cut = choose_cut(rest, avail - reserve);
        let (head, tail) = rest.split_at(cut);
        let mut chunk = prefix;
        chunk.push_str(head);

        if reserve > 0 {
            if let Some(opener) = open_fence_opener(&chunk) {
                if !chunk.ends_with('\n') {
                    chunk.push('\n');
                }
                chunk.push_str(FENCE);
                reopen = format!("{opener}\n");
            }
        }

        chunks.push(chunk);
        rest = tail;
        if rest.is_empty() {
            break;
        }
    }

    chunks
}

/// Split raw Markdown so every chunk still fits `limit` after conversion
/// with `policy`. Returns the raw chunks.
pub fn split_for_markup(raw: &str, limit: usize, policy: &EscapePolicy) -> Vec<String> {
    let mut out = Vec::new();
    for chunk in split_message(raw, limit) {
        push_fitting(&mut out, chunk, limit, policy);
    }
    out
}

fn push_fitting(out: &mut Vec<String>, chunk: String, limit: usize, policy: &EscapePolicy) {
    let len = chunk.chars().count();
    let rendered = policy.convert_from_generic_markdown(&chunk).chars().count();
    if rendered <= limit || len <= 1 {
        out.push(chunk);
        return;
    }
    for piece in split_message(&chunk, (len / 2).max(1)) {
        push_fitting(out, piece, limit, policy);
    }
}

/// Truncate `text` to at most `max_chars` characters ending in `indicator`,
/// closing any fence, inline code or `*` emphasis the cut leaves open.
pub fn truncate_safely(text: &str, max_chars: usize, indicator: &str) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }

    let indicator_len = indicator.chars().count();
    if indicator_len >= max_chars {
        return indicator.chars().take(max_chars).collect();
    }

    let mut keep = max_chars - indicator_len;
    loop {
        let head: String = text.chars().take(keep).collect();
        let closers = closing_markers(&head);
        if keep == 0 || keep + closers.chars().count() + indicator_len <= max_chars {
            return format!("{head}{closers}{indicator}");
        }
        keep -= 1;
    }
}

/// Like [`truncate_safely`], but shrinks further until the converted form
/// fits `limit` as well. Returns the raw (unconverted) preview.
pub fn truncate_for_markup(
    raw: &str,
    limit: usize,
    policy: &EscapePolicy,
    indicator: &str,
) -> String {
    let mut budget = limit;
    loop {
        let preview = truncate_safely(raw, budget, indicator);
        let rendered = policy.convert_from_generic_markdown(&preview).chars().count();
        if rendered <= limit || budget <= 1 {
            return preview;
        }
        budget = (budget / 2).max(1).min(budget - 1);
    }
}

fn choose_cut(rest: &str, window: usize) -> usize {
    let window = window.max(1);
    let hard = rest
        .char_indices()
        .nth(window)
        .map(|(i, _)| i)
        .unwrap_or(rest.len());
    let head = &rest[..hard];
    let half = head.len() / 2;

    if let Some(i) = head.rfind('\n') {
        if i >= half && i > 0 {
            return i + 1;
        }
    }
    if let Some((i, c)) = head.char_indices().rev().find(|(_, c)| c.is_whitespace()) {
        if i >= half && i > 0 {
            return i + c.len_utf8();
        }
    }

    let trailing_markers = head.chars().rev().take_while(|&c| c == ESCAPE_MARKER).count();
    if trailing_markers % 2 == 1 && hard > ESCAPE_MARKER.len_utf8() {
        return hard - ESCAPE_MARKER.len_utf8();
    }
    hard
}

/// `"```lang"` of the last fence in `chunk` if that fence is left open.
fn open_fence_opener(chunk: &str) -> Option<String> {
    let fences: Vec<usize> = chunk.match_indices(FENCE).map(|(i, _)| i).collect();
    if fences.len() % 2 == 0 {
        return None;
    }
    let at = *fences.last()?;
    let lang: String = chunk[at + FENCE.len()..]
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect();
    Some(format!("{FENCE}{lang}"))
}

fn closing_markers(head: &str) -> String {
    let mut closers = String::new();

    let fences: Vec<usize> = head.match_indices(FENCE).map(|(i, _)| i).collect();
    let prose = if fences.len() % 2 == 1 {
        closers.push_str(FENCE_CLOSE);
        fences.last().map_or(head, |&at| &head[..at])
    } else {
        head
    };

    let opts = TokenizeOptions {
        emphasis: true,
        escaped: false,
    };
    let loose: Vec<(usize, char)> = tokenize(prose, &EscapePolicy::default(), opts)
        .into_iter()
        .filter(|s| s.kind == SpanKind::Plain)
        .flat_map(|s| {
            s.text
                .char_indices()
                .map(move |(i, c)| (s.start + i, c))
                .filter(|&(_, c)| c == '`' || c == '*')
        })
        .collect();

    let ticks: Vec<usize> = loose
        .iter()
        .filter(|&&(_, c)| c == '`')
        .map(|&(at, _)| at)
        .collect();
    let code_start = match ticks.last() {
        Some(&at) if ticks.len() % 2 == 1 => {
            closers.push('`');
            at
        }
        _ => prose.len(),
    };

    // Only a `*` that could open emphasis needs a partner; bullets and
    // arithmetic do not.
    let openers = loose
        .iter()
        .filter(|&&(at, c)| c == '*' && at < code_start && opens_emphasis(prose, at, '*'))
        .count();
    if openers % 2 == 1 {
        closers.push('*');
    }

    closers
}
