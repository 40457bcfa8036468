use async_trait::async_trait;

use crate::{
    domain::{ChatId, MessageRef},
    messaging::types::{ChatAction, MessagingCapabilities, ParseMode},
    Result,
};

/// Outbound chat surface.
///
/// Transport adapters implement this and map their failures into
/// [`crate::Error`]: flood control into `RateLimited`, rejected markup into
/// `Parse`, no-op edits into `NotModified`.
#[async_trait]
pub trait MessagingPort: Send + Sync {
    fn capabilities(&self) -> MessagingCapabilities;

    async fn send_text(&self, chat_id: ChatId, text: &str, mode: ParseMode) -> Result<MessageRef>;
    async fn edit_text(&self, msg: MessageRef, text: &str, mode: ParseMode) -> Result<()>;
    async fn delete_message(&self, msg: MessageRef) -> Result<()>;

    async fn send_chat_action(&self, chat_id: ChatId, action: ChatAction) -> Result<()>;
}
