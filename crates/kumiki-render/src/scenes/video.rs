//! Video clip scene renderer.
//!
//! Clips are cut straight from the source by the encoder, letterboxed into
//! the project resolution. No markup is involved.

use std::path::PathBuf;

use async_trait::async_trait;
use kumiki_media::TrimRequest;
use kumiki_models::{SceneBody, SceneKind, VideoContent};
use tracing::{debug, info};

use super::{SceneContext, SceneRenderer};
use crate::error::{RenderError, RenderResult};

pub struct VideoSceneRenderer {
    ctx: SceneContext,
    content: VideoContent,
}

impl VideoSceneRenderer {
    pub fn create(ctx: SceneContext) -> RenderResult<Box<dyn SceneRenderer>> {
        let content = match &ctx.scene.body {
            SceneBody::Video { content } => content.clone(),
            other => {
                return Err(RenderError::invalid_scene(
                    ctx.id(),
                    format!("video renderer cannot render a {} scene", other.kind()),
                ))
            }
        };
        Ok(Box::new(Self { ctx, content }))
    }

    fn start(&self) -> f64 {
        self.content.trim.map(|t| t.start).unwrap_or(0.0)
    }

    /// Trimmed length capped at the scene duration.
    pub fn clip_length(&self) -> f64 {
        match self.content.trim {
            Some(trim) => trim.length().min(self.ctx.scene.duration),
            None => self.ctx.scene.duration,
        }
    }
}

#[async_trait]
impl SceneRenderer for VideoSceneRenderer {
    fn kind(&self) -> SceneKind {
        SceneKind::Video
    }

    fn context(&self) -> &SceneContext {
        &self.ctx
    }

    fn context_mut(&mut self) -> &mut SceneContext {
        &mut self.ctx
    }

    async fn validate(&self) -> RenderResult<()> {
        self.ctx.require_file(&self.content.src).await?;
        if let Some(trim) = self.content.trim {
            if trim.start < 0.0 || trim.start >= trim.end {
                return Err(RenderError::invalid_scene(
                    self.ctx.id(),
                    format!(
                        "trim start ({}) must be non-negative and less than end ({})",
                        trim.start, trim.end
                    ),
                ));
            }
        }
        Ok(())
    }

    /// First frame at the trim start.
    async fn render_static(&self) -> RenderResult<PathBuf> {
        self.validate().await?;
        self.ctx.ensure_work_dir().await?;
        let output = self.ctx.frame_path();
        self.ctx
            .services
            .encoder
            .extract_frame(&self.content.src, self.start(), &output)
            .await?;
        debug!(scene_id = %self.ctx.id(), at = self.start(), "First frame extracted");
        Ok(output)
    }

    async fn render_video(&self) -> RenderResult<PathBuf> {
        self.validate().await?;
        self.ctx.ensure_work_dir().await?;

        let length = self.clip_length();
        info!(
            scene_id = %self.ctx.id(),
            src = %self.content.src.display(),
            start = self.start(),
            length,
            "Cutting video scene"
        );

        let output = self.ctx.clip_path();
        let encoder = &self.ctx.services.encoder;
        encoder
            .trim(&TrimRequest {
                input: self.content.src.clone(),
                output: output.clone(),
                start: self.start(),
                duration: length,
                fps: self.ctx.fps,
                resolution: self.ctx.resolution,
            })
            .await?;

        let has_audio = encoder.probe(&output).await?.has_audio;
        self.ctx.finish_with_narration(output, has_audio).await
    }
}
