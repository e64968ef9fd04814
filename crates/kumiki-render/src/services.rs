//! External collaborators used by a render.
//!
//! Everything with side effects outside the process (encoder, browser,
//! generative APIs, caches) is reached through [`Services`]. Production code
//! builds it from [`RenderConfig`]; tests assemble it from fakes.

use std::fmt;
use std::sync::Arc;

use kumiki_cache::Caches;
use kumiki_genai::{
    GeminiClient, GenAiConfig, ImageGenerator, LyriaClient, MusicGenerator, SpeechGenerator,
};
use kumiki_media::{
    ChromiumRenderer, Encoder, FfmpegEncoder, FfmpegRunner, MarkupRenderer, MediaError,
};
use tracing::{info, warn};

use crate::config::RenderConfig;
use crate::error::RenderResult;

/// Collaborator bundle shared by every scene task of a render.
#[derive(Clone)]
pub struct Services {
    pub encoder: Arc<dyn Encoder>,
    /// `None` when no headless browser is installed; markup scenes then fail.
    pub markup: Option<Arc<dyn MarkupRenderer>>,
    pub images: Arc<dyn ImageGenerator>,
    pub speech: Arc<dyn SpeechGenerator>,
    pub music: Arc<dyn MusicGenerator>,
    pub caches: Caches,
}

impl fmt::Debug for Services {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Services")
            .field("markup", &self.markup.is_some())
            .field("image_model", &self.images.model())
            .field("speech_model", &self.speech.model())
            .field("music_model", &self.music.model())
            .field("caches", &self.caches)
            .finish()
    }
}

impl Services {
    /// FFmpeg, headless Chromium, Gemini and on-disk caches.
    pub fn from_config(config: &RenderConfig) -> RenderResult<Self> {
        let encoder: Arc<dyn Encoder> = Arc::new(FfmpegEncoder::new(
            FfmpegRunner::new().with_timeout(config.ffmpeg_timeout_secs),
        ));

        let browser = ChromiumRenderer::detect(config.chromium_path.as_deref(), config.concurrency);
        let markup = match browser {
            Ok(browser) => {
                info!(browser = %browser.binary().display(), "Using headless browser");
                Some(Arc::new(browser) as Arc<dyn MarkupRenderer>)
            }
            Err(e) => {
                warn!("Markup rendering unavailable: {}", e);
                None
            }
        };

        let mut genai = GenAiConfig::from_env();
        if let Some(key) = &config.gemini_api_key {
            genai = genai.with_api_key(key.clone());
        }
        let gemini = Arc::new(GeminiClient::new(genai.clone())?);

        Ok(Self {
            caches: Caches::open(&config.cache_dir, encoder.clone()),
            encoder,
            markup,
            images: gemini.clone(),
            speech: gemini,
            music: Arc::new(LyriaClient::new(genai)),
        })
    }

    /// The markup renderer, or `BrowserNotFound`.
    pub fn markup(&self) -> RenderResult<&dyn MarkupRenderer> {
        self.markup
            .as_deref()
            .ok_or_else(|| MediaError::BrowserNotFound.into())
    }
}
