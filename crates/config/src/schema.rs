//! Config schema: Telegram transport, Gemini backend and chat behaviour.

use {
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
};

pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CourierConfig {
    pub telegram: TelegramConfig,
    pub gemini: GeminiConfig,
    pub chat: ChatConfig,
}

/// Telegram bot settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    /// Bot token from BotFather. `TELEGRAM_BOT_TOKEN` takes precedence.
    #[serde(
        serialize_with = "serialize_option_secret",
        skip_serializing_if = "Option::is_none"
    )]
    pub token: Option<Secret<String>>,
    /// Long-poll timeout passed to `getUpdates`, in seconds.
    pub poll_timeout_secs: u32,
    /// Register `/start`, `/help` and `/new` for command autocomplete at startup.
    pub register_commands: bool,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            token: None,
            poll_timeout_secs: 30,
            register_commands: true,
        }
    }
}

/// Gemini backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeminiConfig {
    #[serde(
        serialize_with = "serialize_option_secret",
        skip_serializing_if = "Option::is_none"
    )]
    pub api_key: Option<Secret<String>>,
    /// Model used for text conversations.
    pub model: String,
    /// Model used for image descriptions.
    pub vision_model: String,
    pub base_url: String,
    /// Whole-request timeout for generation calls. Default 120.
    pub request_timeout_secs: u64,
    pub max_output_tokens: u32,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "gemini-1.5-flash".into(),
            vision_model: "gemini-1.5-pro".into(),
            base_url: DEFAULT_GEMINI_BASE_URL.into(),
            request_timeout_secs: 120,
            max_output_tokens: 8192,
        }
    }
}

/// Chat behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Maximum characters per outgoing message (Telegram allows 4096).
    pub max_message_len: usize,
    /// Prompt for photos without a caption. Unset uses the built-in prompt.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_prompt: Option<String>,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            max_message_len: 4096,
            image_prompt: None,
        }
    }
}

// ── Serde helpers for Secret<String> ────────────────────────────────────────

fn serialize_option_secret<S: serde::Serializer>(
    secret: &Option<Secret<String>>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match secret {
        Some(s) => serializer.serialize_some(s.expose_secret()),
        None => serializer.serialize_none(),
    }
}
