//! Error types for generation clients.

use kumiki_media::MediaError;
use thiserror::Error;

/// Result type for generation operations.
pub type GenAiResult<T> = Result<T, GenAiError>;

/// Errors raised by the image, speech and music generators.
#[derive(Debug, Error)]
pub enum GenAiError {
    #[error("Gemini API key is not configured (set GEMINI_API_KEY)")]
    MissingApiKey,

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{service} API returned {status}: {message}")]
    Api {
        service: &'static str,
        status: u16,
        message: String,
    },

    #[error("No {0} data in response")]
    EmptyResponse(&'static str),

    #[error("Invalid base64 payload: {0}")]
    Decode(#[from] base64::DecodeError),

    #[error("WebSocket error: {0}")]
    WebSocket(String),

    #[error("Music session ended: {0}")]
    SessionClosed(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Media(#[from] MediaError),
}

impl GenAiError {
    pub fn api(service: &'static str, status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            service,
            status,
            message: message.into(),
        }
    }

    pub fn websocket(err: impl std::fmt::Display) -> Self {
        Self::WebSocket(err.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for GenAiError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::websocket(err)
    }
}
