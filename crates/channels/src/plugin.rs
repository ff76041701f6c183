use {
    crate::{
        Result,
        event::{ChatId, ControlAction, MessageId},
    },
    async_trait::async_trait,
};

/// An inline button attached to a menu message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuButton {
    pub label: String,
    pub action: ControlAction,
}

impl MenuButton {
    pub fn new(label: impl Into<String>, action: ControlAction) -> Self {
        Self {
            label: label.into(),
            action,
        }
    }
}

/// Send messages to a chat.
#[async_trait]
pub trait ChannelOutbound: Send + Sync {
    /// Send one formatted message. `is_continuation` marks the second and later
    /// parts of a split reply.
    async fn send_message(&self, chat_id: ChatId, text: &str, is_continuation: bool) -> Result<()>;

    /// Send a message with one inline button per row.
    async fn send_menu(&self, chat_id: ChatId, text: &str, buttons: &[MenuButton]) -> Result<()>;

    /// Send a "typing" indicator. No-op by default.
    async fn send_typing(&self, _chat_id: ChatId) -> Result<()> {
        Ok(())
    }

    /// Replace the text of a message the bot sent earlier.
    async fn edit_message(&self, chat_id: ChatId, message_id: MessageId, text: &str) -> Result<()>;
}

/// Fetch media attached to inbound messages.
#[async_trait]
pub trait ChannelMedia: Send + Sync {
    /// Download the file behind a platform file id.
    async fn download(&self, file_id: &str) -> Result<Vec<u8>>;
}
