//! Client error types and handling

use tokio_tungstenite::tungstenite;

/// Client error type
///
/// Every variant except `MissingToken` ends up as a toast; nothing here is
/// fatal to the host process.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    // Blocked locally, no request issued
    #[error("{0}")]
    Validation(String),

    // Transport
    #[error("An unexpected error occurred: {0}")]
    Network(#[from] reqwest::Error),
    #[error("An unexpected error occurred: {0}")]
    Transport(Box<tungstenite::Error>),

    // Server-reported
    #[error("Error: {message}")]
    Server { status: u16, message: String },
    #[error("Error: malformed response ({0})")]
    Decode(#[from] serde_json::Error),

    // Resolved by redirecting to the login view
    #[error("Session token missing")]
    MissingToken,

    // Local storage
    #[error("Token storage failed: {0}")]
    Storage(#[from] std::io::Error),
}

impl From<tungstenite::Error> for ClientError {
    fn from(err: tungstenite::Error) -> Self {
        ClientError::Transport(Box::new(err))
    }
}

impl ClientError {
    /// Text shown to the user, `None` when no toast should appear
    pub fn notification(&self) -> Option<String> {
        match self {
            ClientError::MissingToken => None,
            other => Some(other.to_string()),
        }
    }

    /// Returns true if the failure happened before any request was issued
    pub fn is_local(&self) -> bool {
        matches!(self, ClientError::Validation(_) | ClientError::MissingToken)
    }
}

/// Result type alias for client operations
pub type ClientResult<T> = Result<T, ClientError>;
