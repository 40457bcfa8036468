use crate::formatting::{Dialect, EscapePolicy};

/// How the messenger should interpret outgoing text.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ParseMode {
    Plain,
    Markdown(Dialect),
}

impl ParseMode {
    /// Value of Telegram's `parse_mode` parameter, `None` for plain text.
    pub fn as_telegram(self) -> Option<&'static str> {
        match self {
            ParseMode::Plain => None,
            ParseMode::Markdown(d) => Some(d.parse_mode()),
        }
    }
}

impl From<Dialect> for ParseMode {
    fn from(d: Dialect) -> Self {
        ParseMode::Markdown(d)
    }
}

/// Outgoing "chat action" (typing indicator).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChatAction {
    Typing,
}

/// A message body ready to send: the markup plus the raw text used when the
/// messenger rejects the markup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutgoingText {
    pub markup: String,
    pub plain: String,
    pub mode: ParseMode,
}

impl OutgoingText {
    /// Convert generic Markdown with `policy`.
    pub fn markdown(raw: &str, policy: &EscapePolicy) -> Self {
        Self {
            markup: policy.convert_from_generic_markdown(raw),
            plain: raw.to_string(),
            mode: policy.dialect().into(),
        }
    }

    pub fn plain(text: &str) -> Self {
        Self {
            markup: text.to_string(),
            plain: text.to_string(),
            mode: ParseMode::Plain,
        }
    }

    pub fn is_plain(&self) -> bool {
        self.mode == ParseMode::Plain
    }
}

/// Capabilities / limits of a messenger implementation.
#[derive(Clone, Copy, Debug)]
pub struct MessagingCapabilities {
    pub supports_markdown: bool,
    pub supports_edit: bool,
    pub max_message_len: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markdown_text_carries_parse_mode_and_fallback() {
        let out = OutgoingText::markdown("**hi** my_var", &EscapePolicy::markdown_v2());
        assert_eq!(out.markup, "*hi* my\\_var");
        assert_eq!(out.plain, "**hi** my_var");
        assert_eq!(out.mode.as_telegram(), Some("MarkdownV2"));
        assert!(!out.is_plain());
    }

    #[test]
    fn plain_text_has_no_parse_mode() {
        let out = OutgoingText::plain("a_b");
        assert_eq!(out.markup, "a_b");
        assert_eq!(out.mode.as_telegram(), None);
    }
}
