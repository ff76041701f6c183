use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// A Bot API call failed.
    #[error("telegram {method} failed: {source}")]
    Api {
        method: &'static str,
        #[source]
        source: teloxide::RequestError,
    },

    /// Building the HTTP client failed.
    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),

    #[error("{message}")]
    Message { message: String },
}

impl Error {
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn api(method: &'static str, source: teloxide::RequestError) -> Self {
        Self::Api { method, source }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
