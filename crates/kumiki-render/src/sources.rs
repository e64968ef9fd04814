//! Cache-or-generate resolution of deferred sources.

use std::path::PathBuf;

use kumiki_cache::{image_key, music_key, ArtifactMeta};
use kumiki_media::PcmFormat;
use kumiki_models::{ImageGenerationParams, ImageSource, MusicGenerationParams, MusicSource};
use tracing::{debug, info};

use crate::error::RenderResult;
use crate::services::Services;

/// Music length used when the timeline is empty and nothing was requested.
const FALLBACK_MUSIC_SECS: f64 = 30.0;

/// Local file for an image source, generating it on a cache miss.
pub async fn resolve_image(
    services: &Services,
    source: &ImageSource,
    project: Option<&str>,
) -> RenderResult<PathBuf> {
    match source {
        ImageSource::Path(path) => Ok(path.clone()),
        ImageSource::Generate(params) => generated_image(services, params, project).await,
    }
}

async fn generated_image(
    services: &Services,
    params: &ImageGenerationParams,
    project: Option<&str>,
) -> RenderResult<PathBuf> {
    let key = image_key(params)?;
    let cache = &services.caches.image;
    if let Some(path) = cache.get(&key, project).await? {
        debug!(key = %key, "Using cached image");
        return Ok(path);
    }

    info!(key = %key, prompt = %params.prompt, "Generating image");
    let bytes = services.images.generate_image(params).await?;
    let meta = ArtifactMeta::new(services.images.model())
        .with("style", params.style.as_str())
        .with("aspectRatio", params.aspect_ratio.as_str());
    Ok(cache.save(&key, &bytes, params, meta, project).await?)
}

/// Length of generated music for a timeline of `timeline` seconds.
pub fn music_duration(params: &MusicGenerationParams, timeline: f64, lead_out: f64) -> f64 {
    match params.duration.filter(|d| *d > 0.0) {
        Some(requested) => requested,
        None if timeline > 0.0 => timeline + lead_out.max(0.0),
        None => FALLBACK_MUSIC_SECS,
    }
}

/// Local file for a music source, generating it on a cache miss.
pub async fn resolve_music(
    services: &Services,
    source: &MusicSource,
    timeline: f64,
    lead_out: f64,
    project: Option<&str>,
) -> RenderResult<PathBuf> {
    let params = match source {
        MusicSource::Path(path) => return Ok(path.clone()),
        MusicSource::Generate(params) => params,
    };

    let duration = music_duration(params, timeline, lead_out);
    let key = music_key(params, duration, services.music.model())?;
    let cache = &services.caches.music;
    if let Some(path) = cache.get(&key, project).await? {
        debug!(key = %key, "Using cached music");
        return Ok(path);
    }

    info!(key = %key, duration, prompts = params.prompts.len(), "Generating music");
    let wav = services.music.generate_music(params, duration).await?;
    let meta = ArtifactMeta::new(services.music.model())
        .with("duration", duration)
        .with("sampleRate", PcmFormat::MUSIC.sample_rate)
        .with("channels", PcmFormat::MUSIC.channels);
    Ok(cache.save(&key, &wav, params, meta, project).await?)
}
