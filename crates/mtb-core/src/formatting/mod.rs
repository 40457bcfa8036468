//! Telegram-safe Markdown: escaping, dialect conversion, chunking.

pub mod convert;
pub mod escape;
pub mod policy;
pub mod spans;
pub mod split;

pub use convert::{convert_from_generic_markdown, convert_to_generic_markdown};
pub use escape::escape;
pub use policy::{Dialect, EscapePolicy, ESCAPE_MARKER};
pub use spans::{tokenize, Span, SpanKind, TokenizeOptions};
pub use split::{split_for_markup, split_message, truncate_for_markup, truncate_safely};
