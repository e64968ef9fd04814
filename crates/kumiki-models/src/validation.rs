//! Structural validation of a parsed project.
//!
//! Parsing already enforces shapes and enums; the checks here cover the
//! rules a JSON decoder cannot express (uniqueness, ranges, ordering) and,
//! separately, the existence of referenced files.

use std::collections::HashSet;
use std::fmt;

use serde::Serialize;

use crate::project::Project;
use crate::resolution::Resolution;
use crate::scene::{BackgroundKind, Layer, SceneBody};
use crate::source::{ImageSource, MusicSource};

/// Highest frame rate accepted for output.
pub const MAX_FPS: u32 = 120;

/// One field-level problem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    /// Dotted path to the offending field, e.g. `scenes[2].content.trim`.
    pub path: String,
    pub message: String,
    pub code: &'static str,
}

impl ValidationIssue {
    fn new(path: impl Into<String>, message: impl Into<String>, code: &'static str) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
            code,
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} [{}]", self.path, self.message, self.code)
    }
}

/// Check rules that do not touch the filesystem.
pub fn validate_project(project: &Project) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    if project.settings.resolution.parse::<Resolution>().is_err() {
        issues.push(ValidationIssue::new(
            "settings.resolution",
            format!(
                "Invalid resolution format: {} (expected WIDTHxHEIGHT)",
                project.settings.resolution
            ),
            "INVALID_RESOLUTION",
        ));
    }

    if project.settings.fps == 0 || project.settings.fps > MAX_FPS {
        issues.push(ValidationIssue::new(
            "settings.fps",
            format!("fps must be between 1 and {}", MAX_FPS),
            "INVALID_FPS",
        ));
    }

    if project.scenes.is_empty() {
        issues.push(ValidationIssue::new(
            "scenes",
            "At least one scene is required",
            "NO_SCENES",
        ));
    }

    let mut seen = HashSet::new();
    for (index, scene) in project.scenes.iter().enumerate() {
        let base = format!("scenes[{}]", index);

        if !seen.insert(scene.id.as_str()) {
            issues.push(ValidationIssue::new(
                format!("{}.id", base),
                format!("Duplicate scene ID: {}", scene.id),
                "DUPLICATE_ID",
            ));
        }

        if !(scene.duration > 0.0) {
            issues.push(ValidationIssue::new(
                format!("{}.duration", base),
                "Scene duration must be positive",
                "INVALID_DURATION",
            ));
        }

        if let Some(t) = &scene.transition {
            if !(t.duration > 0.0) {
                issues.push(ValidationIssue::new(
                    format!("{}.transition.duration", base),
                    "Transition duration must be positive",
                    "INVALID_DURATION",
                ));
            }
        }

        if let Some(a) = &scene.animation {
            if !(a.duration > 0.0) {
                issues.push(ValidationIssue::new(
                    format!("{}.animation.duration", base),
                    "Animation duration must be positive",
                    "INVALID_DURATION",
                ));
            }
        }

        if let Some(n) = &scene.narration {
            if n.text.trim().is_empty() {
                issues.push(ValidationIssue::new(
                    format!("{}.narration.text", base),
                    "Narration text must not be empty",
                    "EMPTY_NARRATION",
                ));
            }
        }

        match &scene.body {
            SceneBody::Text { content } => {
                if content.text.is_empty() {
                    issues.push(ValidationIssue::new(
                        format!("{}.content.text", base),
                        "Text content is required",
                        "MISSING_TEXT_CONTENT",
                    ));
                }
            }
            SceneBody::Video { content } => {
                if let Some(trim) = &content.trim {
                    if trim.start < 0.0 || trim.start >= trim.end {
                        issues.push(ValidationIssue::new(
                            format!("{}.content.trim", base),
                            "Trim start time must be less than end time",
                            "INVALID_TRIM",
                        ));
                    }
                }
            }
            SceneBody::Composite { layers } => {
                if layers.is_empty() {
                    issues.push(ValidationIssue::new(
                        format!("{}.layers", base),
                        "Composite scene requires at least one layer",
                        "NO_LAYERS",
                    ));
                }
                for (li, layer) in layers.iter().enumerate() {
                    let opacity = layer.opacity();
                    if !(0.0..=1.0).contains(&opacity) {
                        issues.push(ValidationIssue::new(
                            format!("{}.layers[{}].opacity", base, li),
                            "Opacity must be between 0 and 1",
                            "INVALID_OPACITY",
                        ));
                    }
                }
            }
            SceneBody::Image { .. } => {}
        }
    }

    if let Some(music) = project.background_music() {
        if !(0.0..=1.0).contains(&music.volume) {
            issues.push(ValidationIssue::new(
                "audio.backgroundMusic.volume",
                "Volume must be between 0 and 1",
                "INVALID_VOLUME",
            ));
        }
        if let MusicSource::Generate(params) = &music.src {
            let bpm = params.config.bpm;
            if !(60..=200).contains(&bpm) {
                issues.push(ValidationIssue::new(
                    "audio.backgroundMusic.src.config.bpm",
                    "bpm must be between 60 and 200",
                    "INVALID_MUSIC_CONFIG",
                ));
            }
        }
    }

    issues
}

/// Check that every literal file reference exists. Generation requests are
/// exempt.
pub fn validate_assets(project: &Project) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    for (index, scene) in project.scenes.iter().enumerate() {
        let base = format!("scenes[{}]", index);
        match &scene.body {
            SceneBody::Image { content } => {
                check_image(&mut issues, &content.src, format!("{}.content.src", base))
            }
            SceneBody::Composite { layers } => {
                for (li, layer) in layers.iter().enumerate() {
                    if let Layer::Image { content, .. } = layer {
                        check_image(
                            &mut issues,
                            &content.src,
                            format!("{}.layers[{}].content.src", base, li),
                        );
                    }
                }
            }
            SceneBody::Video { content } => {
                if !content.src.exists() {
                    issues.push(ValidationIssue::new(
                        format!("{}.content.src", base),
                        format!("File not found: {}", content.src.display()),
                        "FILE_NOT_FOUND",
                    ));
                }
            }
            SceneBody::Text { .. } => {}
        }

        if let Some(bg) = &scene.background {
            if bg.kind == BackgroundKind::Image
                && !bg.value.contains("://")
                && !std::path::Path::new(&bg.value).exists()
            {
                issues.push(ValidationIssue::new(
                    format!("{}.background.value", base),
                    format!("Background image not found: {}", bg.value),
                    "FILE_NOT_FOUND",
                ));
            }
        }
    }

    if let Some(MusicSource::Path(p)) = project.background_music().map(|m| &m.src) {
        if !p.exists() {
            issues.push(ValidationIssue::new(
                "audio.backgroundMusic.src",
                format!("Audio file not found: {}", p.display()),
                "FILE_NOT_FOUND",
            ));
        }
    }

    issues
}

fn check_image(issues: &mut Vec<ValidationIssue>, src: &ImageSource, path: String) {
    if let ImageSource::Path(p) = src {
        if !p.exists() {
            issues.push(ValidationIssue::new(
                path,
                format!("File not found: {}", p.display()),
                "FILE_NOT_FOUND",
            ));
        }
    }
}
