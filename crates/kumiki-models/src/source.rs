//! Deferred-generation sources.
//!
//! An image or music source in a project is either a literal file path or a
//! request to generate the asset. The request can be written two ways:
//!
//! - a string with the `generate://` prefix, e.g. `"generate://sunset over the sea"`
//! - an object `{ "type": "generate", "prompt": "...", ... }`
//!
//! Both are normalized here, at deserialization time, into one
//! [`ImageSource`] / [`MusicSource`] value with every optional parameter
//! filled in, so callers never look at the raw encoding again.

use std::path::{Path, PathBuf};

use schemars::gen::SchemaGenerator;
use schemars::schema::Schema;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// URL scheme marking a deferred-generation source.
pub const GENERATE_SCHEME: &str = "generate://";

/// Aspect ratio used when an image request omits one.
pub const DEFAULT_ASPECT_RATIO: &str = "16:9";

/// Weight given to a plain prompt when converted to a weighted prompt.
pub const DEFAULT_PROMPT_WEIGHT: f64 = 1.0;

/// Strip the `generate://` prefix and return the trimmed prompt.
fn prompt_from_url(src: &str) -> Option<Result<String, ModelError>> {
    let rest = src.strip_prefix(GENERATE_SCHEME)?;
    let prompt = rest.trim();
    if prompt.is_empty() {
        return Some(Err(ModelError::invalid_source("empty prompt in generate URL")));
    }
    Some(Ok(prompt.to_string()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
enum GenerateTag {
    Generate,
}

// ============================================================================
// Images
// ============================================================================

/// Visual style requested from the image generator.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum ImageStyle {
    #[default]
    Photorealistic,
    Illustration,
    Anime,
    Sketch,
}

impl ImageStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageStyle::Photorealistic => "photorealistic",
            ImageStyle::Illustration => "illustration",
            ImageStyle::Anime => "anime",
            ImageStyle::Sketch => "sketch",
        }
    }
}

/// Fully normalized image generation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ImageGenerationParams {
    pub prompt: String,
    pub style: ImageStyle,
    pub aspect_ratio: String,
    pub seed: Option<u64>,
}

impl ImageGenerationParams {
    /// Request with default style and aspect ratio.
    pub fn new(prompt: impl Into<String>) -> Result<Self, ModelError> {
        let prompt = prompt.into().trim().to_string();
        if prompt.is_empty() {
            return Err(ModelError::invalid_source("image prompt must not be empty"));
        }
        Ok(Self {
            prompt,
            style: ImageStyle::default(),
            aspect_ratio: DEFAULT_ASPECT_RATIO.to_string(),
            seed: None,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
struct GenerateImageObject {
    #[serde(rename = "type")]
    kind: GenerateTag,
    prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    style: Option<ImageStyle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    aspect_ratio: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    seed: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
enum RawImageSource {
    Text(String),
    Generate(GenerateImageObject),
}

/// Where a scene's image comes from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawImageSource", into = "RawImageSource")]
pub enum ImageSource {
    Path(PathBuf),
    Generate(ImageGenerationParams),
}

impl ImageSource {
    pub fn is_generated(&self) -> bool {
        matches!(self, ImageSource::Generate(_))
    }

    /// Parse the string encoding (path or `generate://` URL).
    pub fn parse(src: &str) -> Result<Self, ModelError> {
        match prompt_from_url(src) {
            Some(prompt) => Ok(ImageSource::Generate(ImageGenerationParams::new(prompt?)?)),
            None => Ok(ImageSource::Path(PathBuf::from(src))),
        }
    }

    pub(crate) fn rebase(&mut self, base: &Path) {
        if let ImageSource::Path(p) = self {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        }
    }
}

impl TryFrom<RawImageSource> for ImageSource {
    type Error = ModelError;

    fn try_from(raw: RawImageSource) -> Result<Self, Self::Error> {
        match raw {
            RawImageSource::Text(s) => ImageSource::parse(&s),
            RawImageSource::Generate(obj) => {
                let mut params = ImageGenerationParams::new(obj.prompt)?;
                if let Some(style) = obj.style {
                    params.style = style;
                }
                if let Some(ratio) = obj.aspect_ratio.filter(|r| !r.trim().is_empty()) {
                    params.aspect_ratio = ratio;
                }
                params.seed = obj.seed;
                Ok(ImageSource::Generate(params))
            }
        }
    }
}

impl From<ImageSource> for RawImageSource {
    fn from(src: ImageSource) -> Self {
        match src {
            ImageSource::Path(p) => RawImageSource::Text(p.to_string_lossy().into_owned()),
            ImageSource::Generate(params) => RawImageSource::Generate(GenerateImageObject {
                kind: GenerateTag::Generate,
                prompt: params.prompt,
                style: Some(params.style),
                aspect_ratio: Some(params.aspect_ratio),
                seed: params.seed,
            }),
        }
    }
}

impl JsonSchema for ImageSource {
    fn schema_name() -> String {
        "ImageSource".to_string()
    }

    fn json_schema(gen: &mut SchemaGenerator) -> Schema {
        RawImageSource::json_schema(gen)
    }
}

// ============================================================================
// Music
// ============================================================================

/// Musical scale understood by the music generator.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MusicScale {
    #[default]
    CMajorAMinor,
    GMajorEMinor,
    DMajorBMinor,
    AMajorFSharpMinor,
    EMajorCSharpMinor,
    BMajorGSharpMinor,
    FSharpMajorDSharpMinor,
    FMajorDMinor,
    BFlatMajorGMinor,
    EFlatMajorCMinor,
    AFlatMajorFMinor,
    DFlatMajorBFlatMinor,
    GFlatMajorEFlatMinor,
    Chromatic,
}

/// Generation controls for music. Omitted fields take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct MusicGenerationConfig {
    pub bpm: u32,
    pub temperature: f64,
    pub guidance: f64,
    pub density: f64,
    pub brightness: f64,
    pub scale: MusicScale,
    #[serde(alias = "mute_bass")]
    pub mute_bass: bool,
    #[serde(alias = "mute_drums")]
    pub mute_drums: bool,
    #[serde(alias = "only_bass_and_drums")]
    pub only_bass_and_drums: bool,
}

impl Default for MusicGenerationConfig {
    fn default() -> Self {
        Self {
            bpm: 120,
            temperature: 1.0,
            guidance: 4.0,
            density: 0.7,
            brightness: 0.6,
            scale: MusicScale::default(),
            mute_bass: false,
            mute_drums: false,
            only_bass_and_drums: false,
        }
    }
}

/// A prompt with a relative weight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct WeightedPrompt {
    pub text: String,
    #[serde(default = "default_prompt_weight")]
    pub weight: f64,
}

fn default_prompt_weight() -> f64 {
    DEFAULT_PROMPT_WEIGHT
}

/// Fully normalized music generation request.
///
/// A plain prompt is stored as a single weighted prompt of weight 1.0, so
/// `generate://calm piano` and `{type: "generate", prompt: "calm piano"}`
/// compare equal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MusicGenerationParams {
    pub prompts: Vec<WeightedPrompt>,
    pub config: MusicGenerationConfig,
    /// Requested length in seconds; when absent the renderer derives one
    /// from the timeline.
    pub duration: Option<f64>,
    pub seed: Option<u64>,
}

impl MusicGenerationParams {
    pub fn from_prompt(prompt: impl Into<String>) -> Result<Self, ModelError> {
        let text = prompt.into().trim().to_string();
        if text.is_empty() {
            return Err(ModelError::invalid_source("music prompt must not be empty"));
        }
        Ok(Self {
            prompts: vec![WeightedPrompt {
                text,
                weight: DEFAULT_PROMPT_WEIGHT,
            }],
            config: MusicGenerationConfig::default(),
            duration: None,
            seed: None,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
struct GenerateMusicObject {
    #[serde(rename = "type")]
    kind: GenerateTag,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    prompts: Option<Vec<WeightedPrompt>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    config: Option<MusicGenerationConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    duration: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    seed: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
enum RawMusicSource {
    Text(String),
    Generate(GenerateMusicObject),
}

/// Where the background music comes from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawMusicSource", into = "RawMusicSource")]
pub enum MusicSource {
    Path(PathBuf),
    Generate(MusicGenerationParams),
}

impl MusicSource {
    pub fn is_generated(&self) -> bool {
        matches!(self, MusicSource::Generate(_))
    }

    pub fn parse(src: &str) -> Result<Self, ModelError> {
        match prompt_from_url(src) {
            Some(prompt) => Ok(MusicSource::Generate(MusicGenerationParams::from_prompt(
                prompt?,
            )?)),
            None => Ok(MusicSource::Path(PathBuf::from(src))),
        }
    }

    pub(crate) fn rebase(&mut self, base: &Path) {
        if let MusicSource::Path(p) = self {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        }
    }
}

impl TryFrom<RawMusicSource> for MusicSource {
    type Error = ModelError;

    fn try_from(raw: RawMusicSource) -> Result<Self, Self::Error> {
        let obj = match raw {
            RawMusicSource::Text(s) => return MusicSource::parse(&s),
            RawMusicSource::Generate(obj) => obj,
        };

        let prompts: Vec<WeightedPrompt> = obj
            .prompts
            .unwrap_or_default()
            .into_iter()
            .filter(|p| !p.text.trim().is_empty())
            .collect();

        let mut params = if !prompts.is_empty() {
            MusicGenerationParams {
                prompts,
                config: MusicGenerationConfig::default(),
                duration: None,
                seed: None,
            }
        } else {
            match obj.prompt {
                Some(prompt) => MusicGenerationParams::from_prompt(prompt)?,
                None => {
                    return Err(ModelError::invalid_source(
                        "either prompt or prompts must be specified",
                    ))
                }
            }
        };

        params.config = obj.config.unwrap_or_default();
        params.duration = obj.duration.filter(|d| *d > 0.0);
        params.seed = obj.seed;
        Ok(MusicSource::Generate(params))
    }
}

impl From<MusicSource> for RawMusicSource {
    fn from(src: MusicSource) -> Self {
        match src {
            MusicSource::Path(p) => RawMusicSource::Text(p.to_string_lossy().into_owned()),
            MusicSource::Generate(params) => RawMusicSource::Generate(GenerateMusicObject {
                kind: GenerateTag::Generate,
                prompt: None,
                prompts: Some(params.prompts),
                config: Some(params.config),
                duration: params.duration,
                seed: params.seed,
            }),
        }
    }
}

impl JsonSchema for MusicSource {
    fn schema_name() -> String {
        "MusicSource".to_string()
    }

    fn json_schema(gen: &mut SchemaGenerator) -> Schema {
        RawMusicSource::json_schema(gen)
    }
}
