//! Project document.

use std::path::Path;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::ModelResult;
use crate::narration::NarrationDefaults;
use crate::resolution::Resolution;
use crate::scene::Scene;
use crate::source::MusicSource;

/// Background music volume used when neither the mix nor the track sets one.
pub const DEFAULT_BGM_VOLUME: f64 = 0.3;

/// A complete video description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Project {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub name: String,
    pub settings: ProjectSettings,
    pub scenes: Vec<Scene>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<AudioSettings>,
}

fn default_version() -> String {
    "1.0".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSettings {
    /// `WIDTHxHEIGHT`, e.g. `1920x1080`.
    pub resolution: String,
    pub fps: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub narration_defaults: Option<NarrationDefaults>,
}

impl ProjectSettings {
    pub fn resolution(&self) -> ModelResult<Resolution> {
        self.resolution.parse()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AudioSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_music: Option<BackgroundMusic>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BackgroundMusic {
    pub src: MusicSource,
    /// Linear volume, 0 to 1.
    #[serde(default = "default_bgm_volume")]
    pub volume: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fade_in: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fade_out: Option<f64>,
}

fn default_bgm_volume() -> f64 {
    DEFAULT_BGM_VOLUME
}

impl Project {
    /// Parse a project from JSON text.
    pub fn from_json(text: &str) -> ModelResult<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Make every relative file reference absolute against `base`.
    pub fn resolve_paths(&mut self, base: &Path) {
        for scene in &mut self.scenes {
            scene.rebase(base);
        }
        if let Some(music) = self
            .audio
            .as_mut()
            .and_then(|a| a.background_music.as_mut())
        {
            music.src.rebase(base);
        }
    }

    /// Sum of every scene's declared duration, in seconds.
    pub fn total_duration(&self) -> f64 {
        self.scenes.iter().map(|s| s.duration).sum()
    }

    pub fn background_music(&self) -> Option<&BackgroundMusic> {
        self.audio.as_ref().and_then(|a| a.background_music.as_ref())
    }

    pub fn narration_defaults(&self) -> Option<&NarrationDefaults> {
        self.settings.narration_defaults.as_ref()
    }

    /// Music level for the final mix: the narration mix ratio when one is
    /// configured, otherwise the track's own volume.
    pub fn music_volume(&self) -> f64 {
        self.narration_defaults()
            .and_then(|d| d.volume_mix.as_ref())
            .map(|m| m.bgm)
            .or_else(|| self.background_music().map(|m| m.volume))
            .unwrap_or(DEFAULT_BGM_VOLUME)
    }
}
