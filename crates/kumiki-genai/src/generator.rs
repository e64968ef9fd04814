//! Generator seams consumed by the caches and the renderer.

use async_trait::async_trait;
use kumiki_models::{ImageGenerationParams, MusicGenerationParams, VoiceProfile};

use crate::error::GenAiResult;

/// Synthesized speech wrapped as WAV.
#[derive(Debug, Clone)]
pub struct Speech {
    pub wav: Vec<u8>,
    /// Length in seconds.
    pub duration: f64,
}

/// Text-to-image generation.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Model identifier recorded in cache metadata.
    fn model(&self) -> &str;

    /// Generate an image and return its encoded bytes (PNG).
    async fn generate_image(&self, params: &ImageGenerationParams) -> GenAiResult<Vec<u8>>;
}

/// Text-to-speech generation.
#[async_trait]
pub trait SpeechGenerator: Send + Sync {
    fn model(&self) -> &str;

    async fn generate_speech(&self, text: &str, voice: &VoiceProfile) -> GenAiResult<Speech>;
}

/// Prompt-driven music generation.
#[async_trait]
pub trait MusicGenerator: Send + Sync {
    fn model(&self) -> &str;

    /// Generate `duration` seconds of music and return it as WAV.
    async fn generate_music(
        &self,
        params: &MusicGenerationParams,
        duration: f64,
    ) -> GenAiResult<Vec<u8>>;
}
