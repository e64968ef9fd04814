//! Scene definitions.
//!
//! A [`Scene`] carries the fields every timeline entry shares (id, duration,
//! background, transition, narration, animation) plus a [`SceneBody`] tagged
//! by the JSON `type` field.

use std::fmt;
use std::path::{Path, PathBuf};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::narration::Narration;
use crate::source::ImageSource;

/// One timeline entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Scene {
    pub id: String,
    /// Length in seconds.
    pub duration: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background: Option<Background>,
    /// Blend from this scene into the next one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transition: Option<Transition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub narration: Option<Narration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub animation: Option<Animation>,
    #[serde(flatten)]
    pub body: SceneBody,
}

impl Scene {
    pub fn kind(&self) -> SceneKind {
        self.body.kind()
    }

    pub(crate) fn rebase(&mut self, base: &Path) {
        if let Some(bg) = &mut self.background {
            bg.rebase(base);
        }
        match &mut self.body {
            SceneBody::Text { .. } => {}
            SceneBody::Image { content } => content.src.rebase(base),
            SceneBody::Video { content } => {
                if content.src.is_relative() {
                    content.src = base.join(&content.src);
                }
            }
            SceneBody::Composite { layers } => {
                for layer in layers {
                    if let Layer::Image { content, .. } = layer {
                        content.src.rebase(base);
                    }
                }
            }
        }
    }
}

/// Variant-specific scene content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SceneBody {
    Text { content: TextContent },
    Image { content: ImageContent },
    Video { content: VideoContent },
    Composite { layers: Vec<Layer> },
}

impl SceneBody {
    pub fn kind(&self) -> SceneKind {
        match self {
            SceneBody::Text { .. } => SceneKind::Text,
            SceneBody::Image { .. } => SceneKind::Image,
            SceneBody::Video { .. } => SceneKind::Video,
            SceneBody::Composite { .. } => SceneKind::Composite,
        }
    }
}

/// Scene type tag, used to look up a renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum SceneKind {
    Text,
    Image,
    Video,
    Composite,
}

impl SceneKind {
    pub const ALL: &'static [SceneKind] = &[
        SceneKind::Text,
        SceneKind::Image,
        SceneKind::Video,
        SceneKind::Composite,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SceneKind::Text => "text",
            SceneKind::Image => "image",
            SceneKind::Video => "video",
            SceneKind::Composite => "composite",
        }
    }
}

impl fmt::Display for SceneKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Content
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TextContent {
    pub text: String,
    pub style: TextStyle,
    #[serde(default)]
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TextStyle {
    pub font_size: f64,
    pub color: String,
    pub font_family: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_weight: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_align: Option<TextAlign>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum TextAlign {
    #[default]
    Left,
    Center,
    Right,
}

impl TextAlign {
    pub fn as_str(&self) -> &'static str {
        match self {
            TextAlign::Left => "left",
            TextAlign::Center => "center",
            TextAlign::Right => "right",
        }
    }
}

/// Placement of an element inside the frame.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct Position {
    pub x: Coordinate,
    pub y: Coordinate,
}

/// Pixel offset, or `"center"`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum Coordinate {
    Pixels(f64),
    Anchor(Anchor),
}

impl Default for Coordinate {
    fn default() -> Self {
        Coordinate::Anchor(Anchor::Center)
    }
}

impl Coordinate {
    pub fn is_center(&self) -> bool {
        matches!(self, Coordinate::Anchor(Anchor::Center))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Anchor {
    Center,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ImageContent {
    pub src: ImageSource,
    #[serde(default)]
    pub fit: ImageFit,
    #[serde(default)]
    pub position: Position,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ImageFit {
    #[default]
    Cover,
    Contain,
    Fill,
}

impl ImageFit {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageFit::Cover => "cover",
            ImageFit::Contain => "contain",
            ImageFit::Fill => "fill",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct VideoContent {
    pub src: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trim: Option<Trim>,
}

/// Source clip window, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Trim {
    pub start: f64,
    pub end: f64,
}

impl Trim {
    pub fn length(&self) -> f64 {
        self.end - self.start
    }
}

/// A sub-element of a composite scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Layer {
    Text {
        content: TextContent,
        #[serde(default, rename = "zIndex", skip_serializing_if = "Option::is_none")]
        z_index: Option<i32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        opacity: Option<f64>,
    },
    Image {
        content: ImageContent,
        #[serde(default, rename = "zIndex", skip_serializing_if = "Option::is_none")]
        z_index: Option<i32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        opacity: Option<f64>,
    },
}

impl Layer {
    pub fn z_index(&self) -> i32 {
        match self {
            Layer::Text { z_index, .. } | Layer::Image { z_index, .. } => z_index.unwrap_or(0),
        }
    }

    pub fn opacity(&self) -> f64 {
        match self {
            Layer::Text { opacity, .. } | Layer::Image { opacity, .. } => opacity.unwrap_or(1.0),
        }
    }
}

// ============================================================================
// Decoration
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Background {
    #[serde(rename = "type")]
    pub kind: BackgroundKind,
    pub value: String,
}

impl Background {
    fn rebase(&mut self, base: &Path) {
        if self.kind != BackgroundKind::Image || self.value.contains("://") {
            return;
        }
        let path = Path::new(&self.value);
        if path.is_relative() {
            self.value = base.join(path).to_string_lossy().into_owned();
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum BackgroundKind {
    Color,
    Image,
    Gradient,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Transition {
    #[serde(rename = "type")]
    pub kind: TransitionKind,
    /// Overlap in seconds.
    pub duration: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<Direction>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum TransitionKind {
    Fade,
    Wipe,
    Dissolve,
}

impl fmt::Display for TransitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransitionKind::Fade => "fade",
            TransitionKind::Wipe => "wipe",
            TransitionKind::Dissolve => "dissolve",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Left,
    Right,
    Up,
    Down,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Left => "left",
            Direction::Right => "right",
            Direction::Up => "up",
            Direction::Down => "down",
        }
    }
}

/// Effect applied while turning a still frame into a clip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Animation {
    #[serde(rename = "type")]
    pub kind: AnimationKind,
    pub duration: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum AnimationKind {
    FadeIn,
    FadeOut,
}
