//! In-memory messenger for tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::{
    domain::{ChatId, MessageId, MessageRef},
    messaging::{
        port::MessagingPort,
        types::{ChatAction, MessagingCapabilities, ParseMode},
    },
    Error, Result,
};

#[derive(Clone, Debug)]
pub(crate) struct Call {
    pub text: String,
    pub mode: ParseMode,
    pub ok: bool,
}

/// Records every call; scripted failures are returned first, in order.
pub(crate) struct FakeMessenger {
    next_id: Mutex<i32>,
    pub sends: Mutex<Vec<Call>>,
    pub edits: Mutex<Vec<(MessageRef, Call)>>,
    pub deletes: Mutex<Vec<MessageRef>>,
    pub actions: Mutex<Vec<(ChatId, ChatAction)>>,
    send_failures: Mutex<VecDeque<Error>>,
    edit_failures: Mutex<VecDeque<Error>>,
}

impl FakeMessenger {
    pub fn new() -> Self {
        Self {
            next_id: Mutex::new(1),
            sends: Mutex::new(Vec::new()),
            edits: Mutex::new(Vec::new()),
            deletes: Mutex::new(Vec::new()),
            actions: Mutex::new(Vec::new()),
            send_failures: Mutex::new(VecDeque::new()),
            edit_failures: Mutex::new(VecDeque::new()),
        }
    }

    pub fn fail_sends(&self, errors: impl IntoIterator<Item = Error>) {
        self.send_failures.lock().unwrap().extend(errors);
    }

    pub fn fail_edits(&self, errors: impl IntoIterator<Item = Error>) {
        self.edit_failures.lock().unwrap().extend(errors);
    }

    pub fn sent_texts(&self) -> Vec<String> {
        self.sends
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.ok)
            .map(|c| c.text.clone())
            .collect()
    }

    pub fn edited_texts(&self) -> Vec<String> {
        self.edits
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, c)| c.ok)
            .map(|(_, c)| c.text.clone())
            .collect()
    }

    pub fn send_attempts(&self) -> usize {
        self.sends.lock().unwrap().len()
    }

    pub fn edit_attempts(&self) -> usize {
        self.edits.lock().unwrap().len()
    }

    fn alloc(&self, chat_id: ChatId) -> MessageRef {
        let mut guard = self.next_id.lock().unwrap();
        let id = *guard;
        *guard += 1;
        MessageRef {
            chat_id,
            message_id: MessageId(id),
        }
    }
}

#[async_trait]
impl MessagingPort for FakeMessenger {
    fn capabilities(&self) -> MessagingCapabilities {
        MessagingCapabilities {
            supports_markdown: true,
            supports_edit: true,
            max_message_len: 4096,
        }
    }

    async fn send_text(&self, chat_id: ChatId, text: &str, mode: ParseMode) -> Result<MessageRef> {
        let failure = self.send_failures.lock().unwrap().pop_front();
        self.sends.lock().unwrap().push(Call {
            text: text.to_string(),
            mode,
            ok: failure.is_none(),
        });
        match failure {
            Some(e) => Err(e),
            None => Ok(self.alloc(chat_id)),
        }
    }

    async fn edit_text(&self, msg: MessageRef, text: &str, mode: ParseMode) -> Result<()> {
        let failure = self.edit_failures.lock().unwrap().pop_front();
        self.edits.lock().unwrap().push((
            msg,
            Call {
                text: text.to_string(),
                mode,
                ok: failure.is_none(),
            },
        ));
        match failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn delete_message(&self, msg: MessageRef) -> Result<()> {
        self.deletes.lock().unwrap().push(msg);
        Ok(())
    }

    async fn send_chat_action(&self, chat_id: ChatId, action: ChatAction) -> Result<()> {
        self.actions.lock().unwrap().push((chat_id, action));
        Ok(())
    }
}
