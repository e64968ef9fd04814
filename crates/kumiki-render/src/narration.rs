//! Narration resolution.
//!
//! Each narrated scene's text is turned into a WAV file through the
//! narration cache, calling the speech generator on a miss. Scenes are
//! processed one at a time; a failure only costs that scene its narration.

use std::collections::HashMap;
use std::path::PathBuf;

use kumiki_cache::{narration_key, ArtifactMeta};
use kumiki_media::{estimate_wav_duration, PcmFormat};
use kumiki_models::{NarrationDefaults, Project, Scene, VoiceProfile};
use serde_json::json;
use tokio::fs;
use tracing::{debug, info};

use crate::error::{RenderError, RenderResult};
use crate::logging::RenderLogger;
use crate::metrics;
use crate::services::Services;

/// Resolved narration for one scene.
#[derive(Debug, Clone, PartialEq)]
pub struct NarrationAudio {
    pub path: PathBuf,
    /// Seconds of speech.
    pub duration: f64,
}

pub struct NarrationProcessor<'a> {
    services: &'a Services,
    defaults: Option<&'a NarrationDefaults>,
    project_ref: Option<&'a str>,
}

impl<'a> NarrationProcessor<'a> {
    pub fn new(
        services: &'a Services,
        defaults: Option<&'a NarrationDefaults>,
        project_ref: Option<&'a str>,
    ) -> Self {
        Self {
            services,
            defaults,
            project_ref,
        }
    }

    /// Resolve every narrated scene in declaration order, keyed by scene id.
    /// Failures are logged and the scene is left out.
    pub async fn process(
        &self,
        project: &Project,
        logger: &RenderLogger,
    ) -> HashMap<String, NarrationAudio> {
        let mut results = HashMap::new();

        for scene in &project.scenes {
            match self.resolve(scene).await {
                Ok(Some(audio)) => {
                    debug!(scene_id = %scene.id, duration = audio.duration, "Narration ready");
                    results.insert(scene.id.clone(), audio);
                }
                Ok(None) => {}
                Err(e) => {
                    metrics::record_narration_failure();
                    logger.log_warning(&format!(
                        "{}; scene {} continues without narration",
                        e, scene.id
                    ));
                }
            }
        }

        results
    }

    /// Narration audio for `scene`, or `None` when it has no narration.
    pub async fn resolve(&self, scene: &Scene) -> RenderResult<Option<NarrationAudio>> {
        let Some(narration) = &scene.narration else {
            return Ok(None);
        };
        let text = narration.text.trim();
        if text.is_empty() {
            return Ok(None);
        }

        let voice = VoiceProfile::resolve(
            self.defaults.and_then(|d| d.voice.as_ref()),
            narration.voice.as_ref(),
        );
        let fail = |e: &dyn std::fmt::Display| RenderError::narration(&scene.id, e);

        let key = narration_key(text, &voice).map_err(|e| fail(&e))?;
        let cache = &self.services.caches.narration;

        if let Some(path) = cache.get(&key, self.project_ref).await.map_err(|e| fail(&e))? {
            let duration = self.measure(&path).await;
            debug!(scene_id = %scene.id, key = %key, "Using cached narration");
            return Ok(Some(NarrationAudio { path, duration }));
        }

        info!(
            scene_id = %scene.id,
            voice = %voice.name,
            language = %voice.language_code,
            "Generating narration"
        );
        let speech = self
            .services
            .speech
            .generate_speech(text, &voice)
            .await
            .map_err(|e| fail(&e))?;

        let meta = ArtifactMeta::new(self.services.speech.model())
            .with("duration", speech.duration)
            .with("voice", voice.name.as_str())
            .with("languageCode", voice.language_code.as_str());
        let params = json!({ "text": text, "voice": voice });
        let path = cache
            .save(&key, &speech.wav, &params, meta, self.project_ref)
            .await
            .map_err(|e| fail(&e))?;

        Ok(Some(NarrationAudio {
            path,
            duration: speech.duration,
        }))
    }

    /// Probed duration of a cached file, estimated from its size if probing
    /// fails.
    async fn measure(&self, path: &std::path::Path) -> f64 {
        match self.services.encoder.probe(path).await {
            Ok(info) if info.duration > 0.0 => info.duration,
            _ => {
                let len = fs::metadata(path).await.map(|m| m.len()).unwrap_or(0);
                estimate_wav_duration(len, PcmFormat::SPEECH)
            }
        }
    }
}
