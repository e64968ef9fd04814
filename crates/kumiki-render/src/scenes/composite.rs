//! Composite scene renderer: text and image layers stacked in one frame.

use std::path::PathBuf;

use async_trait::async_trait;
use kumiki_models::{Layer, SceneBody, SceneKind};
use tracing::info;

use super::{markup, SceneContext, SceneRenderer};
use crate::error::{RenderError, RenderResult};

pub struct CompositeSceneRenderer {
    ctx: SceneContext,
    layers: Vec<Layer>,
}

impl CompositeSceneRenderer {
    pub fn create(ctx: SceneContext) -> RenderResult<Box<dyn SceneRenderer>> {
        let layers = match &ctx.scene.body {
            SceneBody::Composite { layers } => layers.clone(),
            other => {
                return Err(RenderError::invalid_scene(
                    ctx.id(),
                    format!("composite renderer cannot render a {} scene", other.kind()),
                ))
            }
        };
        Ok(Box::new(Self { ctx, layers }))
    }

    /// Layers bottom to top. The sort is stable, so equal z-indexes keep
    /// declaration order and later layers paint over earlier ones.
    pub fn ordered_layers(&self) -> Vec<&Layer> {
        let mut ordered: Vec<&Layer> = self.layers.iter().collect();
        ordered.sort_by_key(|layer| layer.z_index());
        ordered
    }

    async fn layer_html(&self, layer: &Layer) -> RenderResult<String> {
        let inner = match layer {
            Layer::Text { content, .. } => markup::text_element(content),
            Layer::Image { content, .. } => {
                let src = self.ctx.image_data_uri(&content.src).await?;
                markup::image_element(&src, content.fit, &content.position)
            }
        };
        Ok(markup::layer(&inner, layer.z_index(), layer.opacity()))
    }
}

#[async_trait]
impl SceneRenderer for CompositeSceneRenderer {
    fn kind(&self) -> SceneKind {
        SceneKind::Composite
    }

    fn context(&self) -> &SceneContext {
        &self.ctx
    }

    fn context_mut(&mut self) -> &mut SceneContext {
        &mut self.ctx
    }

    async fn validate(&self) -> RenderResult<()> {
        if self.layers.is_empty() {
            return Err(RenderError::invalid_scene(
                self.ctx.id(),
                "composite scene needs at least one layer",
            ));
        }
        for layer in &self.layers {
            if let Layer::Image { content, .. } = layer {
                self.ctx.require_image(&content.src).await?;
            }
        }
        self.ctx.validate_background().await
    }

    async fn render_static(&self) -> RenderResult<PathBuf> {
        self.validate().await?;
        info!(
            scene_id = %self.ctx.id(),
            layers = self.layers.len(),
            "Rendering composite scene"
        );

        // Generated layer images resolve one at a time, in paint order.
        let mut body = String::new();
        for layer in self.ordered_layers() {
            body.push_str(&self.layer_html(layer).await?);
            body.push('\n');
        }
        self.ctx.render_markup(&body).await
    }

    async fn render_video(&self) -> RenderResult<PathBuf> {
        let still = self.render_static().await?;
        let clip = self.ctx.still_to_clip(&still).await?;
        self.ctx.finish_with_narration(clip, false).await
    }
}
