//! Data model for Kumiki projects.
//!
//! This crate provides Serde-serializable types for:
//! - Projects, settings and background audio
//! - Scenes (text, image, video, composite) and composite layers
//! - Deferred-generation sources for images and music
//! - Narration and voice settings
//! - Structural validation with field paths

pub mod error;
pub mod narration;
pub mod project;
pub mod resolution;
pub mod scene;
pub mod source;
pub mod validation;

// Re-export common types
pub use error::{ModelError, ModelResult};
pub use narration::{
    narration_volume, Narration, NarrationDefaults, NarrationTiming, Voice, VoiceProfile,
    VolumeMix, DEFAULT_NARRATION_VOLUME,
};
pub use project::{AudioSettings, BackgroundMusic, Project, ProjectSettings, DEFAULT_BGM_VOLUME};
pub use resolution::Resolution;
pub use scene::{
    Anchor, Animation, AnimationKind, Background, BackgroundKind, Coordinate, Direction,
    ImageContent, ImageFit, Layer, Position, Scene, SceneBody, SceneKind, TextAlign, TextContent,
    TextStyle, Transition, TransitionKind, Trim, VideoContent,
};
pub use source::{
    ImageGenerationParams, ImageSource, ImageStyle, MusicGenerationConfig, MusicGenerationParams,
    MusicScale, MusicSource, WeightedPrompt, DEFAULT_ASPECT_RATIO, GENERATE_SCHEME,
};
pub use validation::{validate_assets, validate_project, ValidationIssue};
