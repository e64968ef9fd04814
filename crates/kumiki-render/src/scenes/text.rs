//! Text scene renderer.

use std::path::PathBuf;

use async_trait::async_trait;
use kumiki_models::{SceneBody, SceneKind, TextContent};
use tracing::info;

use super::{markup, SceneContext, SceneRenderer};
use crate::error::{RenderError, RenderResult};

pub struct TextSceneRenderer {
    ctx: SceneContext,
    content: TextContent,
}

impl TextSceneRenderer {
    pub fn create(ctx: SceneContext) -> RenderResult<Box<dyn SceneRenderer>> {
        let content = match &ctx.scene.body {
            SceneBody::Text { content } => content.clone(),
            other => {
                return Err(RenderError::invalid_scene(
                    ctx.id(),
                    format!("text renderer cannot render a {} scene", other.kind()),
                ))
            }
        };
        Ok(Box::new(Self { ctx, content }))
    }
}

#[async_trait]
impl SceneRenderer for TextSceneRenderer {
    fn kind(&self) -> SceneKind {
        SceneKind::Text
    }

    fn context(&self) -> &SceneContext {
        &self.ctx
    }

    fn context_mut(&mut self) -> &mut SceneContext {
        &mut self.ctx
    }

    async fn validate(&self) -> RenderResult<()> {
        if self.content.text.trim().is_empty() {
            return Err(RenderError::invalid_scene(self.ctx.id(), "text content is required"));
        }
        if self.content.style.font_size <= 0.0 {
            return Err(RenderError::invalid_scene(
                self.ctx.id(),
                "text style fontSize must be positive",
            ));
        }
        self.ctx.validate_background().await
    }

    async fn render_static(&self) -> RenderResult<PathBuf> {
        self.validate().await?;
        info!(
            scene_id = %self.ctx.id(),
            text = %self.content.text.chars().take(50).collect::<String>(),
            "Rendering text scene"
        );
        self.ctx.render_markup(&markup::text_element(&self.content)).await
    }

    async fn render_video(&self) -> RenderResult<PathBuf> {
        let still = self.render_static().await?;
        let clip = self.ctx.still_to_clip(&still).await?;
        self.ctx.finish_with_narration(clip, false).await
    }
}
