use thiserror::Error;

/// Backend failures. The `Display` form is what end users see, so it carries
/// the backend's own message rather than a generic description.
#[derive(Debug, Error)]
pub enum Error {
    /// Network failure, timeout or undecodable body.
    #[error("request to {provider} failed: {source}")]
    Http {
        provider: &'static str,
        #[source]
        source: reqwest::Error,
    },

    /// The backend answered with a non-success status (auth, quota, bad request).
    #[error("{provider} API error HTTP {status}: {message}")]
    Api {
        provider: &'static str,
        status: u16,
        message: String,
    },

    /// A success response without usable text.
    #[error("malformed {provider} response: {message}")]
    MalformedResponse {
        provider: &'static str,
        message: String,
    },

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
    pub fn http(provider: &'static str, source: reqwest::Error) -> Self {
        Self::Http { provider, source }
    }

    #[must_use]
    pub fn malformed(provider: &'static str, message: impl Into<String>) -> Self {
        Self::MalformedResponse {
            provider,
            message: message.into(),
        }
    }

    /// Whether the failure is on our side of the wire (network, timeout).
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http { source, .. } => source.is_timeout() || source.is_connect(),
            Self::Api { status, .. } => *status == 429 || *status >= 500,
            Self::MalformedResponse { .. } | Self::Message { .. } => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
