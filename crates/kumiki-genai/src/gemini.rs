//! Gemini REST client for image and speech generation.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use kumiki_media::{pcm_to_wav, PcmFormat};
use kumiki_models::{ImageGenerationParams, VoiceProfile};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::GenAiConfig;
use crate::error::{GenAiError, GenAiResult};
use crate::generator::{ImageGenerator, Speech, SpeechGenerator};
use crate::prompt::enhance_prompt;

/// Gemini API client.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    config: GenAiConfig,
    client: Client,
}

/// Gemini API request.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<TextPart>,
}

#[derive(Debug, Serialize)]
struct TextPart {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_modalities: Vec<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    speech_config: Option<SpeechConfig>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SpeechConfig {
    voice_config: VoiceConfig,
    language_code: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VoiceConfig {
    prebuilt_voice_config: PrebuiltVoiceConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PrebuiltVoiceConfig {
    voice_name: String,
}

/// Gemini API response.
#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<ResponseContent>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponsePart {
    inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    #[serde(default)]
    mime_type: String,
    data: String,
}

impl GenerateResponse {
    /// First inline payload whose MIME type starts with `prefix`.
    fn inline_data(&self, prefix: &str) -> Option<&InlineData> {
        self.candidates
            .iter()
            .filter_map(|c| c.content.as_ref())
            .flat_map(|c| c.parts.iter())
            .filter_map(|p| p.inline_data.as_ref())
            .find(|d| d.mime_type.starts_with(prefix))
    }
}

/// Sample rate from an `audio/L16;codec=pcm;rate=24000` MIME type.
fn pcm_rate(mime_type: &str) -> Option<u32> {
    mime_type
        .split(';')
        .filter_map(|p| p.trim().strip_prefix("rate="))
        .find_map(|r| r.parse().ok())
}

impl GeminiClient {
    pub fn new(config: GenAiConfig) -> GenAiResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self { config, client })
    }

    fn api_key(&self) -> GenAiResult<&str> {
        self.config
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or(GenAiError::MissingApiKey)
    }

    /// Call `generateContent` on `model`.
    async fn generate_content(
        &self,
        service: &'static str,
        model: &str,
        request: &GenerateRequest,
    ) -> GenAiResult<GenerateResponse> {
        let url = format!(
            "{}/models/{}:generateContent",
            self.config.api_base.trim_end_matches('/'),
            model
        );

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", self.api_key()?)
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let error_text = response.text().await.unwrap_or_default();
            return Err(GenAiError::api(service, status, error_text));
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl ImageGenerator for GeminiClient {
    fn model(&self) -> &str {
        &self.config.image_model
    }

    async fn generate_image(&self, params: &ImageGenerationParams) -> GenAiResult<Vec<u8>> {
        self.api_key()?;
        let prompt = enhance_prompt(params);
        info!(
            model = %self.config.image_model,
            style = params.style.as_str(),
            aspect_ratio = %params.aspect_ratio,
            "Generating image"
        );
        debug!(prompt = %prompt, "Enhanced image prompt");

        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![TextPart { text: prompt }],
            }],
            generation_config: GenerationConfig {
                response_modalities: vec!["TEXT", "IMAGE"],
                seed: params.seed,
                speech_config: None,
            },
        };

        let response = self
            .generate_content("Gemini image", &self.config.image_model, &request)
            .await?;
        let inline = response
            .inline_data("image/")
            .ok_or(GenAiError::EmptyResponse("image"))?;

        Ok(base64::engine::general_purpose::STANDARD.decode(&inline.data)?)
    }
}

#[async_trait]
impl SpeechGenerator for GeminiClient {
    fn model(&self) -> &str {
        &self.config.tts_model
    }

    async fn generate_speech(&self, text: &str, voice: &VoiceProfile) -> GenAiResult<Speech> {
        self.api_key()?;
        info!(
            model = %self.config.tts_model,
            voice = %voice.name,
            language = %voice.language_code,
            chars = text.chars().count(),
            "Generating speech"
        );

        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![TextPart {
                    text: text.to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                response_modalities: vec!["AUDIO"],
                seed: None,
                speech_config: Some(SpeechConfig {
                    voice_config: VoiceConfig {
                        prebuilt_voice_config: PrebuiltVoiceConfig {
                            voice_name: voice.name.clone(),
                        },
                    },
                    language_code: voice.language_code.clone(),
                }),
            },
        };

        let response = self
            .generate_content("Gemini TTS", &self.config.tts_model, &request)
            .await?;
        let inline = response
            .inline_data("audio/")
            .ok_or(GenAiError::EmptyResponse("audio"))?;

        let format = PcmFormat {
            sample_rate: pcm_rate(&inline.mime_type).unwrap_or(PcmFormat::SPEECH.sample_rate),
            channels: PcmFormat::SPEECH.channels,
        };
        let pcm = base64::engine::general_purpose::STANDARD.decode(&inline.data)?;
        let duration = format.duration_of(pcm.len());
        let wav = pcm_to_wav(&pcm, format)?;

        debug!(duration, bytes = wav.len(), "Speech generated");
        Ok(Speech { wav, duration })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pcm_rate_from_mime() {
        assert_eq!(pcm_rate("audio/L16;codec=pcm;rate=24000"), Some(24_000));
        assert_eq!(pcm_rate("audio/L16; rate=16000"), Some(16_000));
        assert_eq!(pcm_rate("audio/wav"), None);
    }

    #[test]
    fn test_inline_data_lookup() {
        let json = r#"{
            "candidates": [{
                "content": {"parts": [
                    {"text": "Here is your image"},
                    {"inlineData": {"mimeType": "image/png", "data": "iVBORw=="}}
                ]}
            }]
        }"#;
        let response: GenerateResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.inline_data("image/").unwrap().data, "iVBORw==");
        assert!(response.inline_data("audio/").is_none());
    }

    #[test]
    fn test_speech_request_shape() {
        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![TextPart {
                    text: "こんにちは".to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                response_modalities: vec!["AUDIO"],
                seed: None,
                speech_config: Some(SpeechConfig {
                    voice_config: VoiceConfig {
                        prebuilt_voice_config: PrebuiltVoiceConfig {
                            voice_name: "Kore".to_string(),
                        },
                    },
                    language_code: "ja-JP".to_string(),
                }),
            },
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value["generationConfig"]["speechConfig"]["voiceConfig"]["prebuiltVoiceConfig"]
                ["voiceName"],
            "Kore"
        );
        assert!(value["generationConfig"].get("seed").is_none());
    }

    #[tokio::test]
    async fn test_missing_api_key_fails_before_request() {
        let client = GeminiClient::new(GenAiConfig::default()).unwrap();
        let params = ImageGenerationParams::new("a lighthouse").unwrap();
        let err = client.generate_image(&params).await.unwrap_err();
        assert!(matches!(err, GenAiError::MissingApiKey));
    }
}
