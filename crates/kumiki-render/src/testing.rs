//! In-process fakes for the render collaborators.
//!
//! [`FakeEncoder`] writes placeholder files and remembers what it was asked
//! to produce, so probes of its own outputs report plausible durations and
//! audio layouts. Anything it did not write (cached WAV files, for instance)
//! fails to probe.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use kumiki_cache::Caches;
use kumiki_genai::{
    GenAiError, GenAiResult, ImageGenerator, MusicGenerator, Speech, SpeechGenerator,
};
use kumiki_media::{
    pcm_to_wav, Encoder, ImageToVideoRequest, MarkupRenderer, MediaError, MediaInfo, MediaResult,
    MusicMix, NarrationMix, PcmFormat, ProgressCallback, TransitionRequest, TrimRequest,
};
use kumiki_models::{
    ImageGenerationParams, MusicGenerationParams, Narration, Position, Project, ProjectSettings,
    Resolution, Scene, SceneBody, TextContent, TextStyle, Transition, TransitionKind,
    VoiceProfile,
};
use tempfile::TempDir;
use tokio::fs;

use crate::scenes::SceneContext;
use crate::services::Services;

pub const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\nfake";

#[derive(Default)]
pub struct FakeEncoder {
    media: Mutex<HashMap<PathBuf, MediaInfo>>,
    transitions: Mutex<Vec<TransitionRequest>>,
    concats: Mutex<Vec<Vec<PathBuf>>>,
    narration_mixes: Mutex<Vec<NarrationMix>>,
    music_mixes: Mutex<Vec<MusicMix>>,
    trims: Mutex<Vec<TrimRequest>>,
    /// Sleep before encoding a still whose scene directory has this name.
    delays: Mutex<HashMap<String, Duration>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    /// Behave as if ffmpeg is not installed.
    missing: AtomicBool,
}

impl FakeEncoder {
    fn info(duration: f64, has_audio: bool) -> MediaInfo {
        MediaInfo {
            duration,
            width: 1280,
            height: 720,
            fps: 30.0,
            has_video: true,
            has_audio,
        }
    }

    async fn write(&self, path: &Path, info: MediaInfo) -> MediaResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(path, b"media").await?;
        self.media.lock().unwrap().insert(path.to_path_buf(), info);
        Ok(())
    }

    fn known(&self, path: &Path) -> Option<MediaInfo> {
        self.media.lock().unwrap().get(path).cloned()
    }

    /// Register an existing source file as a clip.
    pub async fn add_media(&self, path: &Path, duration: f64, has_audio: bool) {
        self.write(path, Self::info(duration, has_audio)).await.unwrap();
    }

    pub fn uninstall(&self) {
        self.missing.store(true, Ordering::SeqCst);
    }

    pub fn delay_scene(&self, dir_name: &str, delay: Duration) {
        self.delays
            .lock()
            .unwrap()
            .insert(dir_name.to_string(), delay);
    }

    pub fn transitions(&self) -> Vec<TransitionRequest> {
        self.transitions.lock().unwrap().clone()
    }

    pub fn concats(&self) -> Vec<Vec<PathBuf>> {
        self.concats.lock().unwrap().clone()
    }

    pub fn narration_mixes(&self) -> Vec<NarrationMix> {
        self.narration_mixes.lock().unwrap().clone()
    }

    pub fn music_mixes(&self) -> Vec<MusicMix> {
        self.music_mixes.lock().unwrap().clone()
    }

    pub fn trims(&self) -> Vec<TrimRequest> {
        self.trims.lock().unwrap().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Encoder for FakeEncoder {
    async fn version(&self) -> MediaResult<String> {
        if self.missing.load(Ordering::SeqCst) {
            return Err(MediaError::FfmpegNotFound);
        }
        Ok("ffmpeg version fake".to_string())
    }

    async fn probe(&self, path: &Path) -> MediaResult<MediaInfo> {
        self.known(path).ok_or_else(|| MediaError::FfprobeFailed {
            message: format!("unknown media {}", path.display()),
            stderr: None,
        })
    }

    async fn image_to_video(&self, req: &ImageToVideoRequest) -> MediaResult<()> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let delay = req
            .output
            .parent()
            .and_then(|p| p.file_name())
            .and_then(|n| self.delays.lock().unwrap().get(&*n.to_string_lossy()).copied());
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let result = self
            .write(&req.output, Self::info(req.duration, false))
            .await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn trim(&self, req: &TrimRequest) -> MediaResult<()> {
        let source = self
            .known(&req.input)
            .ok_or_else(|| MediaError::FileNotFound(req.input.clone()))?;
        self.trims.lock().unwrap().push(req.clone());
        self.write(&req.output, Self::info(req.duration, source.has_audio))
            .await
    }

    async fn extract_frame(&self, input: &Path, _at: f64, output: &Path) -> MediaResult<()> {
        if self.known(input).is_none() {
            return Err(MediaError::FileNotFound(input.to_path_buf()));
        }
        if let Some(parent) = output.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(output, PNG_BYTES).await?;
        Ok(())
    }

    async fn concat(
        &self,
        inputs: &[PathBuf],
        output: &Path,
        _expected_duration: f64,
        progress: Option<ProgressCallback>,
    ) -> MediaResult<()> {
        let mut duration = 0.0;
        let mut has_audio = false;
        for input in inputs {
            let info = self.probe(input).await?;
            duration += info.duration;
            has_audio |= info.has_audio;
        }
        self.concats.lock().unwrap().push(inputs.to_vec());
        if let Some(progress) = progress {
            progress(50.0);
            progress(100.0);
        }
        self.write(output, Self::info(duration, has_audio)).await
    }

    async fn transition(&self, req: &TransitionRequest) -> MediaResult<()> {
        let first = self.probe(&req.first).await?;
        let second = self.probe(&req.second).await?;
        self.transitions.lock().unwrap().push(req.clone());
        let duration = (first.duration + second.duration - req.duration).max(0.0);
        self.write(&req.output, Self::info(duration, req.with_audio))
            .await
    }

    async fn mux_narration(
        &self,
        video: &Path,
        _narration: &Path,
        output: &Path,
        mix: &NarrationMix,
    ) -> MediaResult<()> {
        let info = self.probe(video).await?;
        self.narration_mixes.lock().unwrap().push(mix.clone());
        self.write(output, Self::info(info.duration, true)).await
    }

    async fn add_silent_audio(&self, video: &Path, output: &Path) -> MediaResult<()> {
        let info = self.probe(video).await?;
        self.write(output, Self::info(info.duration, true)).await
    }

    async fn mix_music(
        &self,
        video: &Path,
        _music: &Path,
        output: &Path,
        mix: &MusicMix,
    ) -> MediaResult<()> {
        let info = self.probe(video).await?;
        self.music_mixes.lock().unwrap().push(mix.clone());
        self.write(output, Self::info(info.duration, true)).await
    }

    async fn transcode_audio(&self, input: &Path, output: &Path, _bitrate: &str) -> MediaResult<()> {
        fs::copy(input, output).await?;
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeMarkup {
    pages: Mutex<Vec<String>>,
}

impl FakeMarkup {
    pub fn pages(&self) -> Vec<String> {
        self.pages.lock().unwrap().clone()
    }
}

#[async_trait]
impl MarkupRenderer for FakeMarkup {
    async fn render_png(&self, html: &str, _viewport: Resolution, output: &Path) -> MediaResult<()> {
        self.pages.lock().unwrap().push(html.to_string());
        if let Some(parent) = output.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(output, PNG_BYTES).await?;
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeImages {
    calls: AtomicUsize,
}

impl FakeImages {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageGenerator for FakeImages {
    fn model(&self) -> &str {
        "fake-image"
    }

    async fn generate_image(&self, _params: &ImageGenerationParams) -> GenAiResult<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(PNG_BYTES.to_vec())
    }
}

/// Returns half a second of silence; fails for any text containing `FAIL`.
#[derive(Default)]
pub struct FakeSpeech {
    voices: Mutex<Vec<String>>,
}

impl FakeSpeech {
    pub fn calls(&self) -> usize {
        self.voices.lock().unwrap().len()
    }

    pub fn voices(&self) -> Vec<String> {
        self.voices.lock().unwrap().clone()
    }
}

#[async_trait]
impl SpeechGenerator for FakeSpeech {
    fn model(&self) -> &str {
        "fake-tts"
    }

    async fn generate_speech(&self, text: &str, voice: &VoiceProfile) -> GenAiResult<Speech> {
        self.voices.lock().unwrap().push(voice.name.clone());
        if text.contains("FAIL") {
            return Err(GenAiError::api("tts", 500, "speech backend unavailable"));
        }
        let wav = pcm_to_wav(&[0u8; 24_000], PcmFormat::SPEECH)?;
        Ok(Speech { wav, duration: 0.5 })
    }
}

#[derive(Default)]
pub struct FakeMusic {
    durations: Mutex<Vec<f64>>,
}

impl FakeMusic {
    pub fn durations(&self) -> Vec<f64> {
        self.durations.lock().unwrap().clone()
    }
}

#[async_trait]
impl MusicGenerator for FakeMusic {
    fn model(&self) -> &str {
        "fake-music"
    }

    async fn generate_music(
        &self,
        _params: &MusicGenerationParams,
        duration: f64,
    ) -> GenAiResult<Vec<u8>> {
        self.durations.lock().unwrap().push(duration);
        Ok(pcm_to_wav(&[0u8; 192], PcmFormat::MUSIC)?)
    }
}

/// Fakes rooted in a temporary directory that lives as long as this value.
pub struct Fakes {
    dir: TempDir,
    pub encoder: Arc<FakeEncoder>,
    pub markup: Arc<FakeMarkup>,
    pub images: Arc<FakeImages>,
    pub speech: Arc<FakeSpeech>,
    pub music: Arc<FakeMusic>,
}

impl Fakes {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
            encoder: Arc::default(),
            markup: Arc::default(),
            images: Arc::default(),
            speech: Arc::default(),
            music: Arc::default(),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn services(&self) -> Services {
        let encoder: Arc<dyn Encoder> = self.encoder.clone();
        Services {
            caches: Caches::open(&self.root().join("cache"), encoder.clone()),
            encoder,
            markup: Some(self.markup.clone()),
            images: self.images.clone(),
            speech: self.speech.clone(),
            music: self.music.clone(),
        }
    }

    /// A video-only clip of `duration` seconds under the root.
    pub async fn clip(&self, name: &str, duration: f64) -> PathBuf {
        let path = self.root().join(name);
        self.encoder.add_media(&path, duration, false).await;
        path
    }
}

pub fn scene_context(fakes: &Fakes, scene: Scene, index: usize) -> SceneContext {
    SceneContext {
        scene,
        index,
        resolution: Resolution::new(1280, 720),
        fps: 30,
        work_dir: fakes.root().join(format!("scene_{:03}", index)),
        services: fakes.services(),
        project_ref: None,
        narration_defaults: None,
        narration: None,
    }
}

pub fn text_content(text: &str) -> TextContent {
    TextContent {
        text: text.to_string(),
        style: TextStyle {
            font_size: 48.0,
            color: "#ffffff".to_string(),
            font_family: "Noto Sans JP".to_string(),
            font_weight: None,
            text_align: None,
        },
        position: Position::default(),
    }
}

pub fn scene(id: &str, duration: f64, body: SceneBody) -> Scene {
    Scene {
        id: id.to_string(),
        duration,
        background: None,
        transition: None,
        narration: None,
        animation: None,
        body,
    }
}

pub fn text_scene(id: &str, duration: f64) -> Scene {
    scene(
        id,
        duration,
        SceneBody::Text {
            content: text_content(&format!("Scene {}", id)),
        },
    )
}

pub fn narrated(mut scene: Scene, text: &str) -> Scene {
    scene.narration = Some(Narration {
        text: text.to_string(),
        voice: None,
        timing: None,
    });
    scene
}

pub fn with_transition(mut scene: Scene, kind: TransitionKind, duration: f64) -> Scene {
    scene.transition = Some(Transition {
        kind,
        duration,
        direction: None,
    });
    scene
}

pub fn project(scenes: Vec<Scene>) -> Project {
    Project {
        version: "1.0".to_string(),
        name: "test".to_string(),
        settings: ProjectSettings {
            resolution: "1280x720".to_string(),
            fps: 30,
            narration_defaults: None,
        },
        scenes,
        audio: None,
    }
}
