use std::time::Duration;

/// Core error type.
///
/// Messenger adapters map their transport errors into this type so delivery
/// code can tell retryable failures (rate limits, markup rejections) from
/// fatal ones.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Flood control: the server asked us to wait before the next call.
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    /// The messenger rejected the markup ("can't parse entities").
    #[error("markup rejected: {0}")]
    Parse(String),

    /// An edit carried exactly the text the message already has.
    #[error("message is not modified")]
    NotModified,

    #[error("external error: {0}")]
    External(String),
}

impl Error {
    /// Server-requested back-off, for rate-limit errors.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Error::RateLimited { retry_after } => Some(*retry_after),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
