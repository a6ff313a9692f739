/// Outbound side of the chat platform, as needed by the welcome service.
use serenity::async_trait;
use thiserror::Error;

use crate::core::events::MemberInfo;

#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("missing permission")]
    Forbidden,
    #[error("{0}")]
    Other(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub filename: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub content: String,
    pub attachment: Option<Attachment>,
}

impl OutboundMessage {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            attachment: None,
        }
    }

    pub fn with_attachment(
        content: impl Into<String>,
        filename: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            content: content.into(),
            attachment: Some(Attachment {
                filename: filename.into(),
                bytes,
            }),
        }
    }
}

#[async_trait]
pub trait ChatPlatform: Send + Sync + 'static {
    /// Post a message, returning its id
    async fn send_message(
        &self,
        channel_id: u64,
        message: OutboundMessage,
    ) -> Result<u64, PlatformError>;

    async fn delete_message(&self, channel_id: u64, message_id: u64) -> Result<(), PlatformError>;

    async fn channel_name(&self, channel_id: u64) -> Option<String>;

    async fn member(&self, guild_id: u64, user_id: u64) -> Option<MemberInfo>;

    fn channel_mention(&self, channel_id: u64) -> String {
        format!("<#{channel_id}>")
    }
}
