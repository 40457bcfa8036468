//! Sending and editing with retries and a plain-text fallback.

use std::{future::Future, sync::Arc, time::Duration};

use tokio::time::sleep;

use crate::{
    domain::{ChatId, MessageRef},
    messaging::{
        port::MessagingPort,
        types::{ChatAction, OutgoingText, ParseMode},
    },
    Error, Result,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per call (including the first one).
    pub max_attempts: u32,
    /// Added on top of the server's `retry_after`.
    pub extra_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            extra_delay: Duration::from_millis(500),
        }
    }
}

/// Delivery front-end over a [`MessagingPort`].
///
/// - rate limits are retried after `retry_after + extra_delay`
/// - rejected markup is resent once as plain text
/// - an edit that changes nothing counts as success
pub struct SafeMessenger {
    inner: Arc<dyn MessagingPort>,
    retry: RetryPolicy,
}

impl SafeMessenger {
    pub fn new(inner: Arc<dyn MessagingPort>, retry: RetryPolicy) -> Self {
        Self { inner, retry }
    }

    pub async fn send(&self, chat_id: ChatId, text: &OutgoingText) -> Result<MessageRef> {
        let first = self
            .with_retry("send", || self.inner.send_text(chat_id, &text.markup, text.mode))
            .await;

        match first {
            Err(Error::Parse(reason)) if !text.is_plain() => {
                tracing::warn!(chat_id = chat_id.0, %reason, "markup rejected, sending plain text");
                self.with_retry("send", || {
                    self.inner.send_text(chat_id, &text.plain, ParseMode::Plain)
                })
                .await
            }
            other => other,
        }
    }

    pub async fn edit(&self, msg: MessageRef, text: &OutgoingText) -> Result<()> {
        let first = self
            .with_retry("edit", || self.inner.edit_text(msg, &text.markup, text.mode))
            .await;

        let result = match first {
            Err(Error::Parse(reason)) if !text.is_plain() => {
                tracing::warn!(
                    chat_id = msg.chat_id.0,
                    message_id = msg.message_id.0,
                    %reason,
                    "markup rejected, editing with plain text"
                );
                self.with_retry("edit", || {
                    self.inner.edit_text(msg, &text.plain, ParseMode::Plain)
                })
                .await
            }
            other => other,
        };

        match result {
            Err(Error::NotModified) => Ok(()),
            other => other,
        }
    }

    /// Typing indicator; failures are only logged.
    pub async fn typing(&self, chat_id: ChatId) {
        if let Err(e) = self.inner.send_chat_action(chat_id, ChatAction::Typing).await {
            tracing::debug!(chat_id = chat_id.0, error = %e, "chat action failed");
        }
    }

    async fn with_retry<T, F, Fut>(&self, op: &str, mut call: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 1u32;
        loop {
            let err = match call().await {
                Ok(v) => return Ok(v),
                Err(e) => e,
            };

            let Some(retry_after) = err.retry_after() else {
                return Err(err);
            };
            if attempt >= self.retry.max_attempts {
                tracing::warn!(op, attempt, "rate limited, giving up");
                return Err(err);
            }

            let wait = retry_after + self.retry.extra_delay;
            tracing::warn!(
                op,
                attempt,
                wait_ms = wait.as_millis() as u64,
                "rate limited, retrying"
            );
            sleep(wait).await;
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formatting::EscapePolicy;
    use crate::testing::FakeMessenger;
    use tokio::time::Instant;

    fn rate_limited(secs: u64) -> Error {
        Error::RateLimited {
            retry_after: Duration::from_secs(secs),
        }
    }

    fn setup() -> (Arc<FakeMessenger>, SafeMessenger) {
        let fake = Arc::new(FakeMessenger::new());
        let safe = SafeMessenger::new(fake.clone(), RetryPolicy::default());
        (fake, safe)
    }

    fn text() -> OutgoingText {
        OutgoingText::markdown("test_text", &EscapePolicy::markdown_v2())
    }

    #[tokio::test]
    async fn sends_markup_once_on_success() {
        let (fake, safe) = setup();
        safe.send(ChatId(1), &text()).await.unwrap();

        let sends = fake.sends.lock().unwrap().clone();
        assert_eq!(sends.len(), 1);
        assert_eq!(sends[0].text, "test\\_text");
        assert_eq!(sends[0].mode.as_telegram(), Some("MarkdownV2"));
    }

    #[tokio::test(start_paused = true)]
    async fn retries_after_rate_limit() {
        let (fake, safe) = setup();
        fake.fail_sends([rate_limited(1)]);
        let start = Instant::now();

        safe.send(ChatId(1), &text()).await.unwrap();

        assert_eq!(fake.send_attempts(), 2);
        assert!(start.elapsed() >= Duration::from_millis(1500));
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_attempts() {
        let (fake, safe) = setup();
        fake.fail_sends((0..5).map(|_| rate_limited(2)));
        let start = Instant::now();

        let err = safe.send(ChatId(1), &text()).await.unwrap_err();

        assert!(matches!(err, Error::RateLimited { .. }));
        assert_eq!(fake.send_attempts(), 3);
        // two sleeps of 2.5s, none after the last attempt
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(5000));
        assert!(elapsed < Duration::from_millis(7500));
    }

    #[tokio::test]
    async fn falls_back_to_plain_on_parse_error() {
        let (fake, safe) = setup();
        fake.fail_sends([Error::Parse("can't parse entities".to_string())]);

        safe.send(ChatId(1), &text()).await.unwrap();

        let sends = fake.sends.lock().unwrap().clone();
        assert_eq!(sends.len(), 2);
        assert_eq!(sends[1].text, "test_text");
        assert_eq!(sends[1].mode, ParseMode::Plain);
    }

    #[tokio::test]
    async fn plain_text_is_not_retried_on_parse_error() {
        let (fake, safe) = setup();
        fake.fail_sends([Error::Parse("bad".to_string())]);

        let err = safe
            .send(ChatId(1), &OutgoingText::plain("x"))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Parse(_)));
        assert_eq!(fake.send_attempts(), 1);
    }

    #[tokio::test]
    async fn other_errors_are_not_retried() {
        let (fake, safe) = setup();
        fake.fail_sends([Error::External("network down".to_string())]);

        assert!(safe.send(ChatId(1), &text()).await.is_err());
        assert_eq!(fake.send_attempts(), 1);
    }

    #[tokio::test]
    async fn edit_not_modified_is_success() {
        let (fake, safe) = setup();
        let msg = safe.send(ChatId(1), &text()).await.unwrap();
        fake.fail_edits([Error::NotModified]);

        safe.edit(msg, &text()).await.unwrap();
        assert_eq!(fake.edit_attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn edit_retries_and_falls_back() {
        let (fake, safe) = setup();
        let msg = safe.send(ChatId(1), &text()).await.unwrap();
        fake.fail_edits([rate_limited(1), Error::Parse("bad".to_string())]);

        safe.edit(msg, &text()).await.unwrap();

        assert_eq!(fake.edit_attempts(), 3);
        assert_eq!(fake.edited_texts(), vec!["test_text"]);
    }

    #[tokio::test]
    async fn typing_is_best_effort() {
        let (fake, safe) = setup();
        safe.typing(ChatId(7)).await;
        assert_eq!(
            fake.actions.lock().unwrap().as_slice(),
            &[(ChatId(7), ChatAction::Typing)]
        );
    }
}
