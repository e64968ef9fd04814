//! Cache key derivation.
//!
//! Keys are the first 16 hex digits of the SHA-256 of the canonical JSON of
//! fully normalized parameters. Objects serialize with sorted keys, so field
//! order in the project file never changes a key.

use kumiki_models::{ImageGenerationParams, MusicGenerationParams, VoiceProfile};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::CacheResult;

/// Hex digits kept from the digest.
pub const KEY_LEN: usize = 16;

/// Digest of any serializable parameter set.
pub fn cache_key<T: Serialize + ?Sized>(params: &T) -> CacheResult<String> {
    // Round-trip through Value so map keys come out sorted
    let canonical = serde_json::to_string(&serde_json::to_value(params)?)?;
    let digest = Sha256::digest(canonical.as_bytes());
    let mut hex = format!("{:x}", digest);
    hex.truncate(KEY_LEN);
    Ok(hex)
}

/// Key for an image request. Style and aspect ratio are already filled in
/// by the model layer.
pub fn image_key(params: &ImageGenerationParams) -> CacheResult<String> {
    cache_key(params)
}

#[derive(Serialize)]
struct MusicKey<'a> {
    params: &'a MusicGenerationParams,
    duration: f64,
    model: &'a str,
}

/// Key for a music request rendered at `duration` seconds by `model`.
pub fn music_key(params: &MusicGenerationParams, duration: f64, model: &str) -> CacheResult<String> {
    cache_key(&MusicKey {
        params,
        duration,
        model,
    })
}

#[derive(Serialize)]
struct NarrationKey<'a> {
    text: &'a str,
    voice: &'a VoiceProfile,
}

/// Key for speech of `text` in a resolved voice.
pub fn narration_key(text: &str, voice: &VoiceProfile) -> CacheResult<String> {
    cache_key(&NarrationKey { text, voice })
}
