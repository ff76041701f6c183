use std::error::Error as StdError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{context}: {source}")]
    External {
        context: String,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },

    /// The bytes are not an image in a format we can decode.
    #[error("unsupported image format: {detected}")]
    UnsupportedFormat { detected: String },

    /// Still above the size limit after every reduction step.
    #[error("image too large: {bytes} bytes after reduction (limit {limit})")]
    TooLarge { bytes: usize, limit: usize },

    #[error("{message}")]
    InvalidInput { message: String },
}

impl Error {
    #[must_use]
    pub fn external<E>(context: impl Into<String>, source: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::External {
            context: context.into(),
            source: Box::new(source),
        }
    }

    #[must_use]
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
