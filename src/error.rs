use thiserror::Error;

/// Failure talking to the solver backend.
///
/// Every variant renders as a short human-readable reason; the chat session
/// embeds that text in the assistant error turn.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Server error: {status}")]
    Status { status: u16, body: String },

    #[error("{0}")]
    Network(String),

    #[error("Invalid response from server: {0}")]
    Decode(String),
}

impl TransportError {
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            TransportError::Decode(e.to_string())
        } else {
            TransportError::Network(e.to_string())
        }
    }
}

impl From<serde_json::Error> for TransportError {
    fn from(e: serde_json::Error) -> Self {
        TransportError::Decode(e.to_string())
    }
}
