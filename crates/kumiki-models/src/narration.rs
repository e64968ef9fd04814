//! Narration descriptors and voice settings.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Default narration volume when no gain or mix ratio is configured.
pub const DEFAULT_NARRATION_VOLUME: f64 = 0.8;

/// Spoken text attached to a scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Narration {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice: Option<Voice>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timing: Option<NarrationTiming>,
}

/// Partial voice settings. Unset fields fall through to the project
/// defaults and then to [`VoiceProfile::default`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Voice {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speaking_rate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pitch: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_gain_db: Option<f64>,
}

/// Fully resolved voice used for speech generation and cache keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VoiceProfile {
    pub language_code: String,
    pub name: String,
    pub speaking_rate: f64,
    pub pitch: f64,
    pub volume_gain_db: f64,
}

impl Default for VoiceProfile {
    fn default() -> Self {
        Self {
            language_code: "ja-JP".to_string(),
            name: "Kore".to_string(),
            speaking_rate: 1.0,
            pitch: 0.0,
            volume_gain_db: 0.0,
        }
    }
}

impl VoiceProfile {
    /// Overlay the fields that `voice` sets.
    pub fn apply(mut self, voice: Option<&Voice>) -> Self {
        let Some(voice) = voice else {
            return self;
        };
        if let Some(v) = &voice.language_code {
            self.language_code = v.clone();
        }
        if let Some(v) = &voice.name {
            self.name = v.clone();
        }
        if let Some(v) = voice.speaking_rate {
            self.speaking_rate = v;
        }
        if let Some(v) = voice.pitch {
            self.pitch = v;
        }
        if let Some(v) = voice.volume_gain_db {
            self.volume_gain_db = v;
        }
        self
    }

    /// Built-in defaults, then project defaults, then the scene's own voice.
    pub fn resolve(project_default: Option<&Voice>, scene: Option<&Voice>) -> Self {
        Self::default().apply(project_default).apply(scene)
    }
}

/// Placement of narration audio inside its scene.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NarrationTiming {
    /// Seconds of silence before the narration starts.
    #[serde(default)]
    pub delay: f64,
    #[serde(default)]
    pub fade_in: f64,
    #[serde(default)]
    pub fade_out: f64,
}

/// Relative levels of narration and background music.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct VolumeMix {
    pub narration: f64,
    pub bgm: f64,
}

/// Project-wide narration settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NarrationDefaults {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice: Option<Voice>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_mix: Option<VolumeMix>,
}

/// Linear volume for a scene's narration track.
///
/// A non-zero gain in the scene's own voice wins, then the project's
/// narration mix ratio, then [`DEFAULT_NARRATION_VOLUME`].
pub fn narration_volume(narration: &Narration, defaults: Option<&NarrationDefaults>) -> f64 {
    if let Some(gain) = narration
        .voice
        .as_ref()
        .and_then(|v| v.volume_gain_db)
        .filter(|g| *g != 0.0)
    {
        return 10f64.powf(gain / 20.0);
    }
    defaults
        .and_then(|d| d.volume_mix.as_ref())
        .map(|m| m.narration)
        .unwrap_or(DEFAULT_NARRATION_VOLUME)
}
