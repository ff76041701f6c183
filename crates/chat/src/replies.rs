//! User-facing texts. All of them are Telegram (legacy) Markdown.

use courier_channels::{ControlAction, MenuButton};

pub const WELCOME: &str = "🤖 *Welcome to Courier!*

I can:
• 💬 answer any question
• 🖼️ analyze images
• 📝 help with writing
• 🧠 solve problems

Just send me a message or a photo!";

pub const HELP: &str = "🔍 *Commands:*

/start - start the bot
/help - show this help
/new - new conversation (clears the history)

📝 *How to use:*
• write your question
• send a photo to have it analyzed, with an optional caption as the question
• use /new to reset the context";

pub const CONVERSATION_RESET: &str =
    "🔄 *Conversation cleared!*\n\nYou can start a new conversation now.";

pub const SETTINGS_UNAVAILABLE: &str = "⚙️ *Settings are not available yet*";

/// Label prefixed to image descriptions.
pub const IMAGE_ANALYSIS_LABEL: &str = "🖼️ *Image analysis:*\n\n";

/// Room kept free in each chunk for the continuation marker.
pub const CONTINUATION_RESERVE: usize = 32;

/// Buttons shown under the welcome message.
pub fn start_menu() -> Vec<MenuButton> {
    vec![
        MenuButton::new("🤖 New chat", ControlAction::NewChat),
        MenuButton::new("📋 Help", ControlAction::Help),
        MenuButton::new("🔧 Settings", ControlAction::Settings),
    ]
}

/// Prefix a continuation part with its position, e.g. `(continuation 2/3)`.
pub fn continuation(index: usize, total: usize, text: &str) -> String {
    format!("_(continuation {index}/{total})_\n\n{text}")
}

pub fn image_analysis(description: &str) -> String {
    format!("{IMAGE_ANALYSIS_LABEL}{description}")
}

pub fn backend_error(cause: &impl std::fmt::Display) -> String {
    format!(
        "❌ *An error occurred:*\n`{}`\n\nPlease try again.",
        inline_code(cause)
    )
}

pub fn invalid_media(cause: &impl std::fmt::Display) -> String {
    format!("❌ *Image analysis failed:*\n`{}`", inline_code(cause))
}

pub fn unknown_command(name: &str) -> String {
    format!("🤷 Unknown command /{name}. Send /help for the list of commands.")
}

/// Text safe to wrap in a Markdown code span.
fn inline_code(value: &impl std::fmt::Display) -> String {
    value.to_string().replace('`', "'")
}
