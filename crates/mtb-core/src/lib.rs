//! Telegram-safe Markdown for bot replies.
//!
//! Model output is generic Markdown; Telegram accepts only its own dialects and
//! rejects messages with unbalanced or unescaped markup. This crate escapes,
//! converts, splits and streams text so that replies render (or degrade to
//! plain text) instead of failing. Messengers live behind
//! [`messaging::port::MessagingPort`].

pub mod config;
pub mod domain;
pub mod errors;
pub mod formatting;
pub mod logging;
pub mod messaging;
pub mod streaming;

#[cfg(test)]
mod testing;

pub use errors::{Error, Result};
