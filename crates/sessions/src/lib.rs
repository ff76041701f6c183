//! Per-user conversation history.
//!
//! Histories live in process memory only, keyed by the Telegram user id, and
//! are bounded to [`HISTORY_LIMIT`] turns. Nothing is persisted across
//! restarts.

pub mod key;
pub mod message;
pub mod store;

pub use {
    key::UserId,
    message::{Role, Turn},
    store::{ConversationStore, HISTORY_LIMIT},
};
