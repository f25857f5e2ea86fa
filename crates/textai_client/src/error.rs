//! Relay errors. Kept typed until the transcript renders them as text.

use thiserror::Error;

/// Display text for a failure that carries no usable message.
pub const UNKNOWN_ERROR_TEXT: &str = "An unknown error occurred.";

/// Everything that can go wrong below the relay boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RelayError {
    /// Direct mode without a credential.
    #[error("API_KEY environment variable not set.")]
    MissingCredential,
    /// Connection refused, DNS failure, timeout, unreadable body.
    #[error("{0}")]
    Transport(String),
    /// Non-success status with no error message in the body.
    #[error("Request failed with status {0}")]
    Status(u16),
    /// Non-success status whose JSON body named the error.
    #[error("{message}")]
    Upstream { status: u16, message: String },
    /// Response body did not have the expected shape.
    #[error("Malformed response: {0}")]
    Malformed(String),
    /// The model provider refused or failed the request.
    #[error("{0}")]
    Provider(String),
    #[error("An unknown error occurred.")]
    Unknown,
}

impl RelayError {
    /// Text shown in the transcript for this failure.
    pub fn display_text(&self) -> String {
        let message = self.to_string();
        if matches!(self, RelayError::Unknown) || message.trim().is_empty() {
            UNKNOWN_ERROR_TEXT.to_string()
        } else {
            format!("Error: {message}")
        }
    }
}

impl From<reqwest::Error> for RelayError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            RelayError::Malformed(e.to_string())
        } else if e.is_timeout() {
            RelayError::Transport(format!("Request timeout: {e}"))
        } else if e.is_connect() {
            RelayError::Transport(format!("Connection failed: {e}"))
        } else {
            RelayError::Transport(e.to_string())
        }
    }
}

/// Fold a relay result into the text the transcript displays.
pub fn render_reply(result: &Result<String, RelayError>) -> String {
    match result {
        Ok(text) => text.clone(),
        Err(e) => e.display_text(),
    }
}
