//! Inbound events, as delivered by a transport to the dispatcher.

use {
    courier_sessions::UserId,
    serde::{Deserialize, Serialize},
};

/// Chat a message came from and replies go to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatId(pub i64);

impl std::fmt::Display for ChatId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A message previously sent by the bot, used to edit it in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub i32);

/// One resolution of an uploaded photo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoVariant {
    pub file_id: String,
    pub width: u32,
    pub height: u32,
    pub file_size: Option<u32>,
}

impl PhotoVariant {
    fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

/// Pick the largest-resolution variant. Ties go to the larger file, then to
/// the later entry (Telegram lists sizes in ascending order).
pub fn largest_variant(variants: &[PhotoVariant]) -> Option<&PhotoVariant> {
    variants
        .iter()
        .max_by_key(|v| (v.area(), v.file_size.unwrap_or(0)))
}

/// Bot commands understood by the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    Start,
    Help,
    New,
    Unknown(String),
}

impl Command {
    /// Commands registered with the platform for autocomplete.
    pub const REGISTERED: [(&'static str, &'static str); 3] = [
        ("start", "Start the bot"),
        ("help", "Show help"),
        ("new", "Start a new conversation"),
    ];

    /// Parse a message body such as `/help` or `/new@my_bot extra`.
    ///
    /// The name must follow the slash directly and may carry an `@bot`
    /// suffix. Returns `None` when the text is not a command, e.g. `/ hi`.
    pub fn parse(text: &str) -> Option<Self> {
        let rest = text.trim_start().strip_prefix('/')?;
        let word = rest.split(char::is_whitespace).next().unwrap_or_default();
        let (name, bot) = match word.split_once('@') {
            Some((name, bot)) => (name, Some(bot)),
            None => (word, None),
        };
        if !is_command_word(name) || bot.is_some_and(|b| !is_command_word(b)) {
            return None;
        }
        Some(match name.to_ascii_lowercase().as_str() {
            "start" => Self::Start,
            "help" => Self::Help,
            "new" => Self::New,
            other => Self::Unknown(other.to_string()),
        })
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Start => "start",
            Self::Help => "help",
            Self::New => "new",
            Self::Unknown(name) => name,
        }
    }
}

fn is_command_word(word: &str) -> bool {
    !word.is_empty() && word.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Inline-button actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlAction {
    NewChat,
    Help,
    Settings,
}

impl ControlAction {
    /// Callback payload carried by the button.
    #[must_use]
    pub fn callback_data(self) -> &'static str {
        match self {
            Self::NewChat => "new_chat",
            Self::Help => "help",
            Self::Settings => "settings",
        }
    }

    pub fn from_callback_data(data: &str) -> Option<Self> {
        match data {
            "new_chat" => Some(Self::NewChat),
            "help" => Some(Self::Help),
            "settings" => Some(Self::Settings),
            _ => None,
        }
    }
}

/// An event received from the chat platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InboundEvent {
    Text {
        user_id: UserId,
        chat_id: ChatId,
        text: String,
    },
    Photo {
        user_id: UserId,
        chat_id: ChatId,
        variants: Vec<PhotoVariant>,
        caption: Option<String>,
    },
    Command {
        user_id: UserId,
        chat_id: ChatId,
        command: Command,
    },
    Control {
        user_id: UserId,
        chat_id: ChatId,
        message_id: Option<MessageId>,
        action: ControlAction,
    },
}

impl InboundEvent {
    pub fn user_id(&self) -> UserId {
        match self {
            Self::Text { user_id, .. }
            | Self::Photo { user_id, .. }
            | Self::Command { user_id, .. }
            | Self::Control { user_id, .. } => *user_id,
        }
    }

    pub fn chat_id(&self) -> ChatId {
        match self {
            Self::Text { chat_id, .. }
            | Self::Photo { chat_id, .. }
            | Self::Command { chat_id, .. }
            | Self::Control { chat_id, .. } => *chat_id,
        }
    }

    /// Short label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text { .. } => "text",
            Self::Photo { .. } => "photo",
            Self::Command { .. } => "command",
            Self::Control { .. } => "control",
        }
    }
}
