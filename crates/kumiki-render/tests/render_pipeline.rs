//! End-to-end render of a project file through the public API, with the
//! encoder, browser and generators replaced by recording fakes.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use kumiki_cache::Caches;
use kumiki_genai::{
    GenAiError, GenAiResult, ImageGenerator, MusicGenerator, Speech, SpeechGenerator,
};
use kumiki_media::{
    pcm_to_wav, Encoder, ImageToVideoRequest, MarkupRenderer, MediaError, MediaInfo, MediaResult,
    MusicMix, NarrationMix, PcmFormat, ProgressCallback, TransitionRequest, TrimRequest,
};
use kumiki_models::{ImageGenerationParams, MusicGenerationParams, Resolution, VoiceProfile};
use kumiki_render::{RenderConfig, RenderOptions, Renderer, Services};
use tempfile::TempDir;
use tokio::fs;

#[derive(Default)]
struct Recorder {
    media: Mutex<HashMap<PathBuf, (f64, bool)>>,
    calls: Mutex<Vec<String>>,
    concat_inputs: Mutex<Vec<PathBuf>>,
}

impl Recorder {
    async fn produce(&self, path: &Path, duration: f64, audio: bool) -> MediaResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(path, b"x").await?;
        self.media
            .lock()
            .unwrap()
            .insert(path.to_path_buf(), (duration, audio));
        Ok(())
    }

    fn lookup(&self, path: &Path) -> MediaResult<(f64, bool)> {
        self.media
            .lock()
            .unwrap()
            .get(path)
            .copied()
            .ok_or_else(|| MediaError::FileNotFound(path.to_path_buf()))
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Encoder for Recorder {
    async fn version(&self) -> MediaResult<String> {
        Ok("fake".to_string())
    }

    async fn probe(&self, path: &Path) -> MediaResult<MediaInfo> {
        let (duration, has_audio) = self.lookup(path)?;
        Ok(MediaInfo {
            duration,
            has_video: true,
            has_audio,
            ..MediaInfo::default()
        })
    }

    async fn image_to_video(&self, req: &ImageToVideoRequest) -> MediaResult<()> {
        self.record(format!("still:{}", req.duration));
        self.produce(&req.output, req.duration, false).await
    }

    async fn trim(&self, req: &TrimRequest) -> MediaResult<()> {
        let (_, audio) = self.lookup(&req.input)?;
        self.record(format!("trim:{}+{}", req.start, req.duration));
        self.produce(&req.output, req.duration, audio).await
    }

    async fn extract_frame(&self, _input: &Path, _at: f64, output: &Path) -> MediaResult<()> {
        self.produce(output, 0.0, false).await
    }

    async fn concat(
        &self,
        inputs: &[PathBuf],
        output: &Path,
        expected_duration: f64,
        _progress: Option<ProgressCallback>,
    ) -> MediaResult<()> {
        *self.concat_inputs.lock().unwrap() = inputs.to_vec();
        self.record(format!("concat:{}", inputs.len()));
        self.produce(output, expected_duration, true).await
    }

    async fn transition(&self, req: &TransitionRequest) -> MediaResult<()> {
        let (a, _) = self.lookup(&req.first)?;
        let (b, _) = self.lookup(&req.second)?;
        self.record(format!("{}:{}", req.kind, req.offset));
        self.produce(&req.output, a + b - req.duration, req.with_audio)
            .await
    }

    async fn mux_narration(
        &self,
        video: &Path,
        _narration: &Path,
        output: &Path,
        mix: &NarrationMix,
    ) -> MediaResult<()> {
        let (duration, _) = self.lookup(video)?;
        self.record(format!("narration:{}", mix.volume));
        self.produce(output, duration, true).await
    }

    async fn add_silent_audio(&self, video: &Path, output: &Path) -> MediaResult<()> {
        let (duration, _) = self.lookup(video)?;
        self.record("silence");
        self.produce(output, duration, true).await
    }

    async fn mix_music(
        &self,
        video: &Path,
        _music: &Path,
        output: &Path,
        mix: &MusicMix,
    ) -> MediaResult<()> {
        let (duration, _) = self.lookup(video)?;
        self.record(format!("music:{}", mix.volume));
        self.produce(output, duration, true).await
    }

    async fn transcode_audio(&self, input: &Path, output: &Path, _bitrate: &str) -> MediaResult<()> {
        fs::copy(input, output).await?;
        Ok(())
    }
}

struct Screenshotter;

#[async_trait]
impl MarkupRenderer for Screenshotter {
    async fn render_png(&self, _html: &str, _viewport: Resolution, output: &Path) -> MediaResult<()> {
        if let Some(parent) = output.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(output, b"png").await?;
        Ok(())
    }
}

struct Generators;

#[async_trait]
impl ImageGenerator for Generators {
    fn model(&self) -> &str {
        "image-test"
    }

    async fn generate_image(&self, _params: &ImageGenerationParams) -> GenAiResult<Vec<u8>> {
        Ok(b"png".to_vec())
    }
}

#[async_trait]
impl SpeechGenerator for Generators {
    fn model(&self) -> &str {
        "tts-test"
    }

    async fn generate_speech(&self, _text: &str, _voice: &VoiceProfile) -> GenAiResult<Speech> {
        Ok(Speech {
            wav: pcm_to_wav(&[0u8; 48_000], PcmFormat::SPEECH)?,
            duration: 1.0,
        })
    }
}

#[async_trait]
impl MusicGenerator for Generators {
    fn model(&self) -> &str {
        "music-test"
    }

    async fn generate_music(
        &self,
        _params: &MusicGenerationParams,
        _duration: f64,
    ) -> GenAiResult<Vec<u8>> {
        Err(GenAiError::SessionClosed("no music in tests".to_string()))
    }
}

fn services(root: &Path, encoder: Arc<Recorder>) -> Services {
    let generators = Arc::new(Generators);
    let encoder: Arc<dyn Encoder> = encoder;
    Services {
        caches: Caches::open(&root.join("cache"), encoder.clone()),
        encoder,
        markup: Some(Arc::new(Screenshotter)),
        images: generators.clone(),
        speech: generators.clone(),
        music: generators,
    }
}

const PROJECT: &str = r##"{
    "version": "1.0",
    "name": "demo",
    "settings": {
        "resolution": "1280x720",
        "fps": 30,
        "narrationDefaults": { "volumeMix": { "narration": 0.9, "bgm": 0.5 } }
    },
    "scenes": [
        {
            "id": "title",
            "type": "text",
            "duration": 5,
            "content": {
                "text": "Kumiki",
                "style": { "fontSize": 72, "color": "#ffffff", "fontFamily": "Noto Sans JP" }
            },
            "narration": { "text": "Welcome." },
            "transition": { "type": "fade", "duration": 1 }
        },
        {
            "id": "footage",
            "type": "video",
            "duration": 10,
            "content": { "src": "media/walk.mp4", "trim": { "start": 2, "end": 20 } }
        },
        {
            "id": "cover",
            "type": "image",
            "duration": 5,
            "content": { "src": "generate://a wooden puzzle box", "fit": "fill" }
        }
    ],
    "audio": {
        "backgroundMusic": { "src": "media/bgm.mp3", "volume": 0.2 }
    }
}"##;

#[tokio::test]
async fn test_render_project_file() {
    let dir = TempDir::new().unwrap();
    // Project paths are resolved against the canonical directory.
    let root = fs::canonicalize(dir.path()).await.unwrap();
    let encoder = Arc::new(Recorder::default());
    encoder
        .produce(&root.join("media/walk.mp4"), 60.0, true)
        .await
        .unwrap();
    fs::write(root.join("media/bgm.mp3"), b"mp3").await.unwrap();
    let project_path = root.join("demo.json");
    fs::write(&project_path, PROJECT).await.unwrap();

    let output = root.join("out/demo.mp4");
    let options = RenderOptions::new(&output, &RenderConfig::default()).with_concurrency(3);
    let renderer = Renderer::new(services(&root, encoder.clone()));

    let outcome = renderer.render_file(&project_path, &options).await.unwrap();

    assert_eq!(outcome.output, output);
    assert!(output.exists());
    assert_eq!(outcome.scenes, 3);
    assert_eq!(outcome.narrated_scenes, 1);
    assert!(outcome.has_music);
    assert_eq!(outcome.duration, 19.0);

    let calls = encoder.calls();
    assert!(calls.contains(&"trim:2+10".to_string()));
    assert!(calls.contains(&"narration:0.9".to_string()));
    // Title and footage merge; the cover clip follows on its own.
    assert!(calls.contains(&"fade:4".to_string()));
    assert!(calls.contains(&"concat:2".to_string()));
    // The project mix ratio overrides the track volume.
    assert_eq!(calls.last().map(String::as_str), Some("music:0.5"));

    let inputs = encoder.concat_inputs.lock().unwrap().clone();
    assert!(inputs[0].ends_with("transition_0.mp4"));
    assert!(inputs[1].ends_with("silent_002.mp4"));

    // Scratch space is gone after a successful render.
    assert!(!options.temp_dir.exists());
}

#[tokio::test]
async fn test_missing_footage_aborts_render() {
    let dir = TempDir::new().unwrap();
    let encoder = Arc::new(Recorder::default());
    let project_path = dir.path().join("demo.json");
    // Footage source was never produced.
    fs::write(&project_path, PROJECT).await.unwrap();
    fs::create_dir_all(dir.path().join("media")).await.unwrap();

    let options = RenderOptions::new(dir.path().join("out.mp4"), &RenderConfig::default());
    let err = Renderer::new(services(dir.path(), encoder))
        .render_file(&project_path, &options)
        .await
        .unwrap_err();

    assert_eq!(err.code(), "MISSING_ASSET");
    assert!(err.to_string().contains("walk.mp4"));
}
