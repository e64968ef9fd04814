//! Render error types.

use std::path::PathBuf;

use kumiki_cache::CacheError;
use kumiki_genai::GenAiError;
use kumiki_media::MediaError;
use kumiki_models::{ModelError, ValidationIssue};
use thiserror::Error;

pub type RenderResult<T> = Result<T, RenderError>;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Failed to parse project: {0}")]
    Parse(String),

    #[error("Project validation failed: {}", summarize(.0))]
    Validation(Vec<ValidationIssue>),

    #[error("Invalid resolution format: {0}")]
    InvalidResolution(String),

    #[error("No renderer registered for scene type '{kind}' (scene {scene_id})")]
    UnknownSceneType { scene_id: String, kind: String },

    #[error("Scene {scene_id}: {message}")]
    InvalidScene { scene_id: String, message: String },

    #[error("Scene {scene_id}: file not found: {}", .path.display())]
    MissingAsset { scene_id: String, path: PathBuf },

    #[error("Generation failed: {0}")]
    Generation(#[from] GenAiError),

    #[error("Narration failed for scene {scene_id}: {message}")]
    Narration { scene_id: String, message: String },

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Media(#[from] MediaError),

    #[error("Scene task failed: {0}")]
    Task(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn summarize(issues: &[ValidationIssue]) -> String {
    match issues {
        [] => "no details".to_string(),
        [only] => only.to_string(),
        [first, rest @ ..] => format!("{} (and {} more)", first, rest.len()),
    }
}

impl From<ModelError> for RenderError {
    fn from(err: ModelError) -> Self {
        match err {
            ModelError::Parse(e) => Self::Parse(e.to_string()),
            ModelError::InvalidResolution(value) => Self::InvalidResolution(value),
            ModelError::InvalidSource(message) => Self::Validation(vec![ValidationIssue {
                path: "source".to_string(),
                message,
                code: "INVALID_SOURCE",
            }]),
        }
    }
}

impl RenderError {
    pub fn invalid_scene(scene_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidScene {
            scene_id: scene_id.into(),
            message: message.into(),
        }
    }

    pub fn missing_asset(scene_id: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self::MissingAsset {
            scene_id: scene_id.into(),
            path: path.into(),
        }
    }

    pub fn narration(scene_id: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Narration {
            scene_id: scene_id.into(),
            message: message.to_string(),
        }
    }

    /// Machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            RenderError::Parse(_) => "PARSE_ERROR",
            RenderError::Validation(_) => "VALIDATION_ERROR",
            RenderError::InvalidResolution(_) => "INVALID_RESOLUTION",
            RenderError::UnknownSceneType { .. } => "UNKNOWN_SCENE_TYPE",
            RenderError::InvalidScene { .. } => "INVALID_SCENE",
            RenderError::MissingAsset { .. } => "MISSING_ASSET",
            RenderError::Generation(_) => "GENERATION_ERROR",
            RenderError::Narration { .. } => "NARRATION_ERROR",
            RenderError::Cache(_) => "CACHE_ERROR",
            RenderError::Media(e) => match e {
                MediaError::FfmpegNotFound | MediaError::FfprobeNotFound => "FFMPEG_NOT_FOUND",
                MediaError::BrowserNotFound => "BROWSER_NOT_FOUND",
                MediaError::BrowserFailed { .. } => "BROWSER_ERROR",
                MediaError::FileNotFound(_) => "MISSING_ASSET",
                _ => "FFMPEG_ERROR",
            },
            RenderError::Task(_) => "INTERNAL_ERROR",
            RenderError::Io(_) => "IO_ERROR",
        }
    }

    /// Only narration failures let a render continue.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, RenderError::Narration { .. })
    }
}
