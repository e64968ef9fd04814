//! Generative AI clients for Kumiki.
//!
//! Three seams are defined in [`generator`]: images and speech are served by
//! the Gemini REST API ([`GeminiClient`]), music by the Lyria real-time
//! WebSocket API ([`LyriaClient`]). The renderer and caches only see the
//! traits, so tests substitute in-process fakes.

pub mod config;
pub mod error;
pub mod gemini;
pub mod generator;
pub mod lyria;
pub mod prompt;

pub use config::{GenAiConfig, API_KEY_ENV};
pub use error::{GenAiError, GenAiResult};
pub use gemini::GeminiClient;
pub use generator::{ImageGenerator, MusicGenerator, Speech, SpeechGenerator};
pub use lyria::LyriaClient;
pub use prompt::enhance_prompt;
