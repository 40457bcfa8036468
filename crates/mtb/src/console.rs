//! Console adapter: implements the `mtb-core` MessagingPort by printing.
//!
//! Enforces the same limits Telegram does (message length, no-op edits) so
//! delivery behaviour can be watched locally.

use std::{
    collections::HashMap,
    io::Write,
    sync::{
        atomic::{AtomicI32, Ordering},
        Mutex, MutexGuard,
    },
};

use async_trait::async_trait;

use mtb_core::{
    domain::{ChatId, MessageId, MessageRef},
    errors::Error,
    messaging::{
        port::MessagingPort,
        types::{ChatAction, MessagingCapabilities, ParseMode},
    },
    Result,
};

pub struct ConsoleMessenger<W> {
    out: Mutex<W>,
    max_message_len: usize,
    next_id: AtomicI32,
    current: Mutex<HashMap<(i64, i32), String>>,
}

impl<W: Write + Send> ConsoleMessenger<W> {
    pub fn new(out: W, max_message_len: usize) -> Self {
        Self {
            out: Mutex::new(out),
            max_message_len,
            next_id: AtomicI32::new(1),
            current: Mutex::new(HashMap::new()),
        }
    }

    fn check_len(&self, text: &str) -> Result<()> {
        let len = text.chars().count();
        if len > self.max_message_len {
            return Err(Error::External(format!(
                "message is too long ({len} > {})",
                self.max_message_len
            )));
        }
        Ok(())
    }

    fn print(&self, header: String, body: &str) -> Result<()> {
        let mut out = self
            .out
            .lock()
            .map_err(|_| Error::External("console writer poisoned".to_string()))?;
        writeln!(out, "{header}")?;
        writeln!(out, "{body}")?;
        out.flush()?;
        Ok(())
    }

    fn messages(&self) -> Result<MutexGuard<'_, HashMap<(i64, i32), String>>> {
        self.current
            .lock()
            .map_err(|_| Error::External("message map poisoned".to_string()))
    }

    fn label(mode: ParseMode) -> &'static str {
        mode.as_telegram().unwrap_or("plain")
    }
}

#[async_trait]
impl<W: Write + Send> MessagingPort for ConsoleMessenger<W> {
    fn capabilities(&self) -> MessagingCapabilities {
        MessagingCapabilities {
            supports_markdown: true,
            supports_edit: true,
            max_message_len: self.max_message_len,
        }
    }

    async fn send_text(&self, chat_id: ChatId, text: &str, mode: ParseMode) -> Result<MessageRef> {
        self.check_len(text)?;
        let mut current = self.messages()?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.print(
            format!("--- send #{id} chat={} [{}]", chat_id.0, Self::label(mode)),
            text,
        )?;
        current.insert((chat_id.0, id), text.to_string());
        Ok(MessageRef {
            chat_id,
            message_id: MessageId(id),
        })
    }

    async fn edit_text(&self, msg: MessageRef, text: &str, mode: ParseMode) -> Result<()> {
        self.check_len(text)?;
        let key = (msg.chat_id.0, msg.message_id.0);
        {
            let mut current = self.messages()?;
            if current.get(&key).map(String::as_str) == Some(text) {
                return Err(Error::NotModified);
            }
            current.insert(key, text.to_string());
        }
        self.print(
            format!("--- edit #{} [{}]", msg.message_id.0, Self::label(mode)),
            text,
        )
    }

    async fn delete_message(&self, msg: MessageRef) -> Result<()> {
        self.messages()?.remove(&(msg.chat_id.0, msg.message_id.0));
        self.print(format!("--- delete #{}", msg.message_id.0), "")
    }

    async fn send_chat_action(&self, chat_id: ChatId, action: ChatAction) -> Result<()> {
        let name = match action {
            ChatAction::Typing => "typing",
        };
        tracing::debug!(chat_id = chat_id.0, action = name, "chat action");
        Ok(())
    }
}
