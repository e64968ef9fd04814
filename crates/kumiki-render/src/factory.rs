//! Scene type to renderer dispatch.

use std::collections::HashMap;

use kumiki_models::SceneKind;

use crate::error::{RenderError, RenderResult};
use crate::scenes::{
    CompositeSceneRenderer, ImageSceneRenderer, SceneContext, SceneRenderer, TextSceneRenderer,
    VideoSceneRenderer,
};

/// Builds a renderer for one scene.
pub type SceneConstructor = fn(SceneContext) -> RenderResult<Box<dyn SceneRenderer>>;

/// Registry of renderer constructors keyed by scene type.
///
/// Every call to [`create`](Self::create) builds a fresh renderer; nothing is
/// shared between scenes except what the context carries.
#[derive(Clone)]
pub struct SceneFactory {
    constructors: HashMap<SceneKind, SceneConstructor>,
}

impl SceneFactory {
    /// A factory with no renderers registered.
    pub fn empty() -> Self {
        Self {
            constructors: HashMap::new(),
        }
    }

    /// Associate `kind` with `constructor`, replacing any earlier one.
    pub fn register(&mut self, kind: SceneKind, constructor: SceneConstructor) -> &mut Self {
        self.constructors.insert(kind, constructor);
        self
    }

    pub fn supports(&self, kind: SceneKind) -> bool {
        self.constructors.contains_key(&kind)
    }

    pub fn create(&self, ctx: SceneContext) -> RenderResult<Box<dyn SceneRenderer>> {
        let kind = ctx.scene.kind();
        let constructor =
            self.constructors
                .get(&kind)
                .ok_or_else(|| RenderError::UnknownSceneType {
                    scene_id: ctx.scene.id.clone(),
                    kind: kind.to_string(),
                })?;
        constructor(ctx)
    }
}

impl Default for SceneFactory {
    /// Text, image, video and composite renderers.
    fn default() -> Self {
        let mut factory = Self::empty();
        factory
            .register(SceneKind::Text, TextSceneRenderer::create)
            .register(SceneKind::Image, ImageSceneRenderer::create)
            .register(SceneKind::Video, VideoSceneRenderer::create)
            .register(SceneKind::Composite, CompositeSceneRenderer::create);
        factory
    }
}

impl std::fmt::Debug for SceneFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut kinds: Vec<&str> = self.constructors.keys().map(|k| k.as_str()).collect();
        kinds.sort_unstable();
        f.debug_struct("SceneFactory").field("kinds", &kinds).finish()
    }
}
