use async_trait::async_trait;

use crate::{domain::MessageRef, messaging::types::MessagingCapabilities, Result};

/// Outbound chat port: every message the relay sends is a reply to a prior
/// message in the originating conversation.
#[async_trait]
pub trait MessagingPort: Send + Sync {
    fn capabilities(&self) -> MessagingCapabilities;

    async fn reply_text(&self, to: MessageRef, text: &str) -> Result<MessageRef>;
    async fn reply_html(&self, to: MessageRef, html: &str) -> Result<MessageRef>;
}
