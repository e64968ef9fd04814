//! Image scene renderer.

use std::path::PathBuf;

use async_trait::async_trait;
use kumiki_models::{ImageContent, ImageFit, SceneBody, SceneKind};
use tokio::fs;
use tracing::{debug, info};

use super::{markup, SceneContext, SceneRenderer};
use crate::error::{RenderError, RenderResult};
use crate::sources;

pub struct ImageSceneRenderer {
    ctx: SceneContext,
    content: ImageContent,
}

impl ImageSceneRenderer {
    pub fn create(ctx: SceneContext) -> RenderResult<Box<dyn SceneRenderer>> {
        let content = match &ctx.scene.body {
            SceneBody::Image { content } => content.clone(),
            other => {
                return Err(RenderError::invalid_scene(
                    ctx.id(),
                    format!("image renderer cannot render a {} scene", other.kind()),
                ))
            }
        };
        Ok(Box::new(Self { ctx, content }))
    }

    /// A full-frame stretched image over no background needs no markup.
    fn is_plain_copy(&self) -> bool {
        self.ctx.scene.background.is_none() && self.content.fit == ImageFit::Fill
    }
}

#[async_trait]
impl SceneRenderer for ImageSceneRenderer {
    fn kind(&self) -> SceneKind {
        SceneKind::Image
    }

    fn context(&self) -> &SceneContext {
        &self.ctx
    }

    fn context_mut(&mut self) -> &mut SceneContext {
        &mut self.ctx
    }

    async fn validate(&self) -> RenderResult<()> {
        self.ctx.require_image(&self.content.src).await?;
        self.ctx.validate_background().await
    }

    async fn render_static(&self) -> RenderResult<PathBuf> {
        self.validate().await?;
        info!(
            scene_id = %self.ctx.id(),
            generated = self.content.src.is_generated(),
            fit = self.content.fit.as_str(),
            "Rendering image scene"
        );

        if self.is_plain_copy() {
            let source = sources::resolve_image(
                &self.ctx.services,
                &self.content.src,
                self.ctx.project_ref(),
            )
            .await?;
            self.ctx.ensure_work_dir().await?;
            // The encoder picks the image decoder by extension.
            let ext = source.extension().and_then(|e| e.to_str()).unwrap_or("png");
            let output = self.ctx.work_dir.join(format!("frame.{}", ext));
            fs::copy(&source, &output).await?;
            debug!(scene_id = %self.ctx.id(), "Image copied without markup");
            return Ok(output);
        }

        let src = self.ctx.image_data_uri(&self.content.src).await?;
        let element = markup::image_element(&src, self.content.fit, &self.content.position);
        self.ctx.render_markup(&element).await
    }

    async fn render_video(&self) -> RenderResult<PathBuf> {
        let still = self.render_static().await?;
        let clip = self.ctx.still_to_clip(&still).await?;
        self.ctx.finish_with_narration(clip, false).await
    }
}
