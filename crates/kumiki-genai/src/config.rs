//! Generation client configuration.

use std::env;

/// Environment variable holding the Gemini API key.
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Settings shared by the Gemini and Lyria clients.
#[derive(Debug, Clone)]
pub struct GenAiConfig {
    /// API key; generation fails with `MissingApiKey` when absent.
    pub api_key: Option<String>,
    /// REST base URL
    pub api_base: String,
    /// Music WebSocket endpoint
    pub music_endpoint: String,
    pub image_model: String,
    pub tts_model: String,
    pub music_model: String,
    /// Per-request timeout for REST calls
    pub request_timeout_secs: u64,
    /// Extra time allowed beyond the requested music length
    pub music_grace_secs: u64,
}

impl Default for GenAiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            music_endpoint: "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1alpha.GenerativeService.BidiGenerateMusic".to_string(),
            image_model: "gemini-2.0-flash-preview-image-generation".to_string(),
            tts_model: "gemini-2.5-flash-preview-tts".to_string(),
            music_model: "models/lyria-realtime-exp".to_string(),
            request_timeout_secs: 120,
            music_grace_secs: 30,
        }
    }
}

impl GenAiConfig {
    /// Defaults with the API key taken from the environment.
    pub fn from_env() -> Self {
        Self {
            api_key: env::var(API_KEY_ENV).ok().filter(|k| !k.trim().is_empty()),
            ..Self::default()
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }
}
