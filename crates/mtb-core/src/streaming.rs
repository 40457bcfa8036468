//! Streaming reply state machine (provider-agnostic).
//!
//! Model output arrives as deltas. The reply is delivered as:
//! - nothing until the text reaches the streaming threshold
//! - one live message, edited at most once per update interval
//! - on finish, the full text split into as many messages as it needs

use std::time::{Duration, Instant};

use crate::{
    domain::{ChatId, MessageRef},
    formatting::{split_for_markup, truncate_for_markup, EscapePolicy},
    messaging::{delivery::SafeMessenger, types::OutgoingText},
    Result,
};

const PREVIEW_INDICATOR: &str = "…";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StreamingConfig {
    /// When false, deltas are only buffered and sent on finish.
    pub enabled: bool,
    /// Characters accumulated before the first message goes out.
    pub threshold: usize,
    /// Minimum spacing between edits of the live message.
    pub update_interval: Duration,
    /// Budget for a single message after conversion.
    pub safe_message_len: usize,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold: 100,
            update_interval: Duration::from_secs(1),
            safe_message_len: 4000,
        }
    }
}

#[derive(Debug)]
pub struct StreamingReply {
    chat_id: ChatId,
    cfg: StreamingConfig,
    policy: EscapePolicy,

    buffer: String,
    typing_sent: bool,
    live: Option<MessageRef>,
    last_edit: Option<Instant>,
    last_markup: Option<String>,
}

impl StreamingReply {
    pub fn new(chat_id: ChatId, cfg: StreamingConfig, policy: EscapePolicy) -> Self {
        Self {
            chat_id,
            cfg,
            policy,
            buffer: String::new(),
            typing_sent: false,
            live: None,
            last_edit: None,
            last_markup: None,
        }
    }

    /// Raw text received so far.
    pub fn text(&self) -> &str {
        &self.buffer
    }

    pub fn live_message(&self) -> Option<MessageRef> {
        self.live
    }

    pub async fn push(&mut self, api: &SafeMessenger, delta: &str) -> Result<()> {
        self.push_at(api, delta, Instant::now()).await
    }

    pub async fn push_at(&mut self, api: &SafeMessenger, delta: &str, now: Instant) -> Result<()> {
        self.buffer.push_str(delta);

        if !self.typing_sent {
            api.typing(self.chat_id).await;
            self.typing_sent = true;
        }

        if !self.cfg.enabled {
            return Ok(());
        }

        let Some(msg) = self.live else {
            if self.buffer.chars().count() < self.cfg.threshold {
                return Ok(());
            }
            let preview = self.preview();
            let msg = api.send(self.chat_id, &preview).await?;
            tracing::debug!(
                chat_id = self.chat_id.0,
                message_id = msg.message_id.0,
                "streaming started"
            );
            self.live = Some(msg);
            self.last_edit = Some(now);
            self.last_markup = Some(preview.markup);
            return Ok(());
        };

        if let Some(last) = self.last_edit {
            if now.saturating_duration_since(last) < self.cfg.update_interval {
                return Ok(());
            }
        }

        let preview = self.preview();
        if self.last_markup.as_deref() == Some(preview.markup.as_str()) {
            return Ok(());
        }

        // A failed preview edit is not fatal; the next push or `finish`
        // retries since `last_markup` still names what the chat shows.
        self.last_edit = Some(now);
        match api.edit(msg, &preview).await {
            Ok(()) => self.last_markup = Some(preview.markup),
            Err(e) => {
                tracing::warn!(chat_id = self.chat_id.0, error = %e, "streaming edit failed")
            }
        }
        Ok(())
    }

    /// Deliver the complete reply. Returns every message that now holds part
    /// of it, in order.
    pub async fn finish(&mut self, api: &SafeMessenger) -> Result<Vec<MessageRef>> {
        let mut sent = Vec::new();
        if self.buffer.is_empty() {
            return Ok(sent);
        }

        let mut chunks = split_for_markup(&self.buffer, self.cfg.safe_message_len, &self.policy)
            .into_iter()
            .map(|raw| OutgoingText::markdown(&raw, &self.policy));

        if let Some(msg) = self.live.take() {
            if let Some(first) = chunks.next() {
                if self.last_markup.as_deref() != Some(first.markup.as_str()) {
                    api.edit(msg, &first).await?;
                }
                sent.push(msg);
            }
        }

        for text in chunks {
            sent.push(api.send(self.chat_id, &text).await?);
        }

        tracing::debug!(
            chat_id = self.chat_id.0,
            messages = sent.len(),
            chars = self.buffer.chars().count(),
            "streaming finished"
        );
        Ok(sent)
    }

    fn preview(&self) -> OutgoingText {
        let raw = truncate_for_markup(
            &self.buffer,
            self.cfg.safe_message_len,
            &self.policy,
            PREVIEW_INDICATOR,
        );
        OutgoingText::markdown(&raw, &self.policy)
    }
}
