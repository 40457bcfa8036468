//! Target markup dialects and their escape rules.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::errors::Error;

/// Prefix marking a literal occurrence of a special character.
pub const ESCAPE_MARKER: char = '\\';

const MARKDOWN_V2_SPECIALS: &[char] = &[
    '_', '*', '[', ']', '(', ')', '~', '`', '>', '#', '+', '-', '=', '|', '{', '}', '.', '!',
    '\\',
];

const LEGACY_SPECIALS: &[char] = &['_', '*', '`', '[', ']'];

const MARKDOWN_V2_EMPHASIS: &[char] = &['_', '*', '~'];

const LEGACY_EMPHASIS: &[char] = &['_', '*'];

/// Telegram's two Markdown parse modes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dialect {
    /// `parse_mode = "Markdown"`.
    #[serde(rename = "Markdown")]
    Legacy,
    /// `parse_mode = "MarkdownV2"`.
    #[default]
    #[serde(rename = "MarkdownV2")]
    MarkdownV2,
}

impl Dialect {
    /// Value of Telegram's `parse_mode` parameter.
    pub fn parse_mode(self) -> &'static str {
        match self {
            Dialect::Legacy => "Markdown",
            Dialect::MarkdownV2 => "MarkdownV2",
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.parse_mode())
    }
}

impl FromStr for Dialect {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "markdown" | "legacy" => Ok(Dialect::Legacy),
            "markdownv2" | "markdown_v2" | "v2" => Ok(Dialect::MarkdownV2),
            other => Err(Error::Config(format!("unknown parse mode: {other}"))),
        }
    }
}

/// Which characters need the escape marker outside protected spans, and
/// which single-character delimiters count as intentional emphasis.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EscapePolicy {
    dialect: Dialect,
    specials: &'static [char],
    emphasis: &'static [char],
}

impl EscapePolicy {
    pub fn new(dialect: Dialect) -> Self {
        match dialect {
            Dialect::Legacy => Self {
                dialect,
                specials: LEGACY_SPECIALS,
                emphasis: LEGACY_EMPHASIS,
            },
            Dialect::MarkdownV2 => Self {
                dialect,
                specials: MARKDOWN_V2_SPECIALS,
                emphasis: MARKDOWN_V2_EMPHASIS,
            },
        }
    }

    pub fn legacy() -> Self {
        Self::new(Dialect::Legacy)
    }

    pub fn markdown_v2() -> Self {
        Self::new(Dialect::MarkdownV2)
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn needs_escape(&self, c: char) -> bool {
        self.specials.contains(&c)
    }

    pub fn is_emphasis_delimiter(&self, c: char) -> bool {
        self.emphasis.contains(&c)
    }
}

impl Default for EscapePolicy {
    fn default() -> Self {
        Self::new(Dialect::default())
    }
}

impl From<Dialect> for EscapePolicy {
    fn from(dialect: Dialect) -> Self {
        Self::new(dialect)
    }
}
