use std::error::Error as StdError;

pub type Result<T> = std::result::Result<T, Error>;

/// Delivery and download failures reported by a transport.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The platform refused or could not serve the request.
    #[error("{message}")]
    Unavailable { message: String },

    /// The platform SDK or HTTP client failed.
    #[error("{context}: {source}")]
    External {
        context: String,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },
}

impl Error {
    #[must_use]
    pub fn unavailable(message: impl std::fmt::Display) -> Self {
        Self::Unavailable {
            message: message.to_string(),
        }
    }

    #[must_use]
    pub fn external(
        context: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::External {
            context: context.into(),
            source: Box::new(source),
        }
    }
}
