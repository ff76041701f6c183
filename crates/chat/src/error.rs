use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The AI backend call failed.
    #[error(transparent)]
    Backend(#[from] courier_agents::Error),

    /// Delivery to the chat platform failed.
    #[error(transparent)]
    Transport(#[from] courier_channels::Error),

    /// The photo could not be fetched or decoded.
    #[error("{message}")]
    InvalidMedia { message: String },
}

impl Error {
    /// Whether the backend reported a condition worth retrying later.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Backend(e) if e.is_transient())
    }

    #[must_use]
    pub fn invalid_media(message: impl std::fmt::Display) -> Self {
        Self::InvalidMedia {
            message: message.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
