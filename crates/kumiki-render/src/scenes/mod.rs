//! Scene renderers.
//!
//! One [`SceneRenderer`] implementation per scene variant. A renderer is
//! created fresh for every scene by the [`SceneFactory`](crate::SceneFactory)
//! and owns a [`SceneContext`] holding its scratch directory and the shared
//! collaborators.
//!
//! Non-video variants render through markup: build an HTML page, screenshot
//! it, loop the still into a clip, then mux narration if any was resolved.

pub mod composite;
pub mod image;
pub mod markup;
pub mod text;
pub mod video;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use kumiki_media::{filters, ImageToVideoRequest, NarrationMix};
use kumiki_models::{
    narration_volume, BackgroundKind, ImageSource, NarrationDefaults, Resolution, Scene, SceneKind,
};
use tokio::fs;
use tracing::debug;

use crate::error::{RenderError, RenderResult};
use crate::services::Services;
use crate::sources;

pub use composite::CompositeSceneRenderer;
pub use image::ImageSceneRenderer;
pub use text::TextSceneRenderer;
pub use video::VideoSceneRenderer;

/// Rendering capability shared by every scene variant.
#[async_trait]
pub trait SceneRenderer: Send + Sync {
    fn kind(&self) -> SceneKind;

    fn context(&self) -> &SceneContext;

    fn context_mut(&mut self) -> &mut SceneContext;

    /// Check fields and referenced files. Generation requests are not
    /// checked for existence.
    async fn validate(&self) -> RenderResult<()>;

    /// Render one still frame and return its path.
    async fn render_static(&self) -> RenderResult<PathBuf>;

    /// Render a clip of the scene's duration and return its path.
    async fn render_video(&self) -> RenderResult<PathBuf>;

    /// Attach narration audio, muxed in by [`render_video`](Self::render_video).
    fn set_narration(&mut self, audio: PathBuf) {
        self.context_mut().narration = Some(audio);
    }
}

/// Everything one scene render needs.
#[derive(Debug, Clone)]
pub struct SceneContext {
    pub scene: Scene,
    /// Position in the project timeline.
    pub index: usize,
    pub resolution: Resolution,
    pub fps: u32,
    /// Scratch directory owned by this scene.
    pub work_dir: PathBuf,
    pub services: Services,
    /// Project file, recorded as cache usage.
    pub project_ref: Option<String>,
    pub narration_defaults: Option<NarrationDefaults>,
    pub narration: Option<PathBuf>,
}

impl SceneContext {
    pub fn id(&self) -> &str {
        &self.scene.id
    }

    pub fn project_ref(&self) -> Option<&str> {
        self.project_ref.as_deref()
    }

    pub fn frame_path(&self) -> PathBuf {
        self.work_dir.join("frame.png")
    }

    pub fn clip_path(&self) -> PathBuf {
        self.work_dir.join("clip.mp4")
    }

    fn narrated_path(&self) -> PathBuf {
        self.work_dir.join("narrated.mp4")
    }

    pub async fn ensure_work_dir(&self) -> RenderResult<()> {
        fs::create_dir_all(&self.work_dir).await?;
        Ok(())
    }

    /// Fail with `MissingAsset` unless `path` exists.
    pub async fn require_file(&self, path: &Path) -> RenderResult<()> {
        if fs::try_exists(path).await.unwrap_or(false) {
            Ok(())
        } else {
            Err(RenderError::missing_asset(self.id(), path))
        }
    }

    /// Literal image paths must exist; generation requests are exempt.
    pub async fn require_image(&self, source: &ImageSource) -> RenderResult<()> {
        match source {
            ImageSource::Path(path) => self.require_file(path).await,
            ImageSource::Generate(_) => Ok(()),
        }
    }

    /// Local background images must exist.
    pub async fn validate_background(&self) -> RenderResult<()> {
        match &self.scene.background {
            Some(bg) if bg.kind == BackgroundKind::Image && !bg.value.contains("://") => {
                self.require_file(Path::new(&bg.value)).await
            }
            _ => Ok(()),
        }
    }

    /// Resolve an image source to a `data:` URI.
    pub async fn image_data_uri(&self, source: &ImageSource) -> RenderResult<String> {
        let path = sources::resolve_image(&self.services, source, self.project_ref()).await?;
        self.file_data_uri(&path).await
    }

    async fn file_data_uri(&self, path: &Path) -> RenderResult<String> {
        let bytes = fs::read(path)
            .await
            .map_err(|_| RenderError::missing_asset(self.id(), path))?;
        Ok(markup::data_uri(path, &bytes))
    }

    /// CSS background for this scene, inlining local image files.
    async fn background_css(&self) -> RenderResult<String> {
        let bg = self.scene.background.as_ref();
        let inline = match bg {
            Some(bg) if bg.kind == BackgroundKind::Image && !bg.value.contains("://") => {
                Some(self.file_data_uri(Path::new(&bg.value)).await?)
            }
            _ => None,
        };
        Ok(markup::background_value(bg, inline.as_deref()))
    }

    /// Screenshot `body` over the scene background into the frame path.
    pub async fn render_markup(&self, body: &str) -> RenderResult<PathBuf> {
        self.ensure_work_dir().await?;
        let html = markup::document(self.resolution, &self.background_css().await?, body);
        let output = self.frame_path();
        self.services
            .markup()?
            .render_png(&html, self.resolution, &output)
            .await?;
        debug!(scene_id = %self.id(), path = %output.display(), "Frame rendered");
        Ok(output)
    }

    /// Loop a still for the scene duration, applying the scene animation.
    pub async fn still_to_clip(&self, still: &Path) -> RenderResult<PathBuf> {
        let filter = self
            .scene
            .animation
            .as_ref()
            .map(|a| filters::animation_filter(a.kind, a.duration, self.scene.duration));
        let output = self.clip_path();
        self.services
            .encoder
            .image_to_video(&ImageToVideoRequest {
                input: still.to_path_buf(),
                output: output.clone(),
                duration: self.scene.duration,
                fps: self.fps,
                resolution: self.resolution,
                filter,
            })
            .await?;
        Ok(output)
    }

    /// Mix for this scene's narration, if it has both a descriptor and audio.
    pub fn narration_mix(&self, has_own_audio: bool) -> Option<NarrationMix> {
        let narration = self.scene.narration.as_ref()?;
        self.narration.as_ref()?;
        let timing = narration.timing.clone().unwrap_or_default();
        Some(NarrationMix {
            volume: narration_volume(narration, self.narration_defaults.as_ref()),
            delay: timing.delay,
            fade_in: timing.fade_in,
            fade_out: timing.fade_out,
            clip_duration: self.scene.duration,
            original_volume: has_own_audio.then_some(filters::ORIGINAL_AUDIO_UNDER_NARRATION),
        })
    }

    /// Mux narration into `clip` when present; otherwise return `clip`.
    pub async fn finish_with_narration(
        &self,
        clip: PathBuf,
        has_own_audio: bool,
    ) -> RenderResult<PathBuf> {
        let (Some(audio), Some(mix)) = (&self.narration, self.narration_mix(has_own_audio)) else {
            return Ok(clip);
        };
        let output = self.narrated_path();
        self.services
            .encoder
            .mux_narration(&clip, audio, &output, &mix)
            .await?;
        debug!(scene_id = %self.id(), volume = mix.volume, "Narration muxed");
        Ok(output)
    }
}
