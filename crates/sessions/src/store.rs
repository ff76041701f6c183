use std::{
    collections::HashMap,
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use tracing::debug;

use crate::{
    key::UserId,
    message::{Role, Turn},
};

/// Maximum number of turns kept per user.
pub const HISTORY_LIMIT: usize = 20;

/// In-memory conversation histories, one per user.
///
/// The lock is only held for the duration of a single call, so callers may
/// share the store across tasks behind an `Arc` and never hold it across an
/// `.await`.
#[derive(Debug, Default)]
pub struct ConversationStore {
    histories: RwLock<HashMap<UserId, Vec<Turn>>>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<UserId, Vec<Turn>>> {
        self.histories.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<UserId, Vec<Turn>>> {
        self.histories.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Append a turn to the user's history, creating it if absent, then trim.
    pub fn append(&self, user: UserId, role: Role, parts: Vec<String>) {
        let mut histories = self.write();
        let history = histories.entry(user).or_default();
        history.push(Turn::new(role, parts));
        Self::trim_history(history);
    }

    /// Convenience for appending a single-part turn.
    pub fn append_text(&self, user: UserId, role: Role, text: impl Into<String>) {
        self.append(user, role, vec![text.into()]);
    }

    /// Snapshot of the user's history. Empty when the user is unknown.
    pub fn get(&self, user: UserId) -> Vec<Turn> {
        self.read().get(&user).cloned().unwrap_or_default()
    }

    /// Replace the user's history with an empty one.
    pub fn reset(&self, user: UserId) {
        let mut histories = self.write();
        if let Some(history) = histories.get_mut(&user) {
            debug!(user_id = %user, dropped = history.len(), "conversation reset");
            history.clear();
        }
    }

    /// Drop the oldest user/model pairs until the history fits [`HISTORY_LIMIT`].
    ///
    /// `append` already does this; exposed for callers that need to enforce the
    /// bound explicitly.
    pub fn trim(&self, user: UserId) {
        if let Some(history) = self.write().get_mut(&user) {
            Self::trim_history(history);
        }
    }

    fn trim_history(history: &mut Vec<Turn>) {
        let mut dropped = 0;
        while history.len() > HISTORY_LIMIT {
            let n = history.len().min(2);
            history.drain(..n);
            dropped += n;
        }
        if dropped > 0 {
            debug!(dropped, kept = history.len(), "trimmed conversation history");
        }
    }

    /// Number of turns stored for the user.
    pub fn len(&self, user: UserId) -> usize {
        self.read().get(&user).map_or(0, Vec::len)
    }

    /// Whether the user has no stored turns.
    pub fn is_empty(&self, user: UserId) -> bool {
        self.len(user) == 0
    }

    /// Number of users that have a history entry (including reset ones).
    pub fn user_count(&self) -> usize {
        self.read().len()
    }
}
