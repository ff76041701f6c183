use {
    async_trait::async_trait,
    courier_sessions::{Role, Turn},
};

use crate::Result;

/// Prompt used for photos sent without a caption.
pub const DEFAULT_IMAGE_PROMPT: &str = "Describe in detail what you see in this image.";

/// An image ready to be sent to a vision model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageInput {
    pub data: Vec<u8>,
    /// MIME type, e.g. `image/jpeg`.
    pub media_type: String,
}

impl ImageInput {
    pub fn new(data: Vec<u8>, media_type: impl Into<String>) -> Self {
        Self {
            data,
            media_type: media_type.into(),
        }
    }
}

/// A generative-AI backend.
#[async_trait]
pub trait AiGateway: Send + Sync {
    /// Provider name for logs.
    fn name(&self) -> &str;

    /// Generate the reply to `new_message`.
    ///
    /// `history` is the conversation as stored, usually ending with the user
    /// turn for `new_message`; that turn is not sent twice.
    async fn chat(&self, history: &[Turn], new_message: &str) -> Result<String>;

    /// Describe a single image. Stateless: no conversation context is sent.
    async fn describe_image(&self, image: &ImageInput, prompt: &str) -> Result<String>;
}

/// The turns that precede the pending user message.
///
/// Drops the trailing user turn, if any. Earlier dangling user turns (left by
/// failed calls) stay in the context.
pub fn prior_context(history: &[Turn]) -> &[Turn] {
    match history.split_last() {
        Some((last, rest)) if last.role() == Role::User => rest,
        _ => history,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prior_context_drops_pending_user_turn() {
        let history = vec![Turn::user("hi"), Turn::model("hello"), Turn::user("again")];
        assert_eq!(prior_context(&history), &history[..2]);
    }

    #[test]
    fn prior_context_keeps_history_ending_with_model() {
        let history = vec![Turn::user("hi"), Turn::model("hello")];
        assert_eq!(prior_context(&history), &history[..]);
        assert!(prior_context(&[]).is_empty());
    }

    #[test]
    fn prior_context_keeps_earlier_dangling_turn() {
        let history = vec![Turn::user("lost"), Turn::user("retry")];
        assert_eq!(prior_context(&history), &[Turn::user("lost")]);
    }
}
