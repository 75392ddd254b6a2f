use thiserror::Error;

pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur when talking to the TLX APIs.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The server rejected the token. The stored token has been cleared.
    #[error("Session expired: {0}")]
    Unauthorized(String),

    /// Non-success response, with the server's `message` when present.
    #[error("{message} (HTTP {status})")]
    Api { status: u16, message: String },

    #[error("Request timed out")]
    Timeout,

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("Token store error: {0}")]
    Store(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ClientError {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Unauthorized(_) => Some(401),
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}
