//! Lyria real-time music generation over WebSocket.
//!
//! The session streams 48 kHz stereo PCM while playing; the client records
//! until it has the requested number of seconds, stops playback and wraps
//! the samples as WAV.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use kumiki_media::{pcm_to_wav, PcmFormat};
use kumiki_models::{MusicGenerationConfig, MusicGenerationParams, WeightedPrompt};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, trace, warn};

use crate::config::GenAiConfig;
use crate::error::{GenAiError, GenAiResult};
use crate::generator::MusicGenerator;

type WsError = tokio_tungstenite::tungstenite::Error;

/// Client message.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
enum ClientMessage<'a> {
    Setup { model: &'a str },
    #[serde(rename_all = "camelCase")]
    ClientContent {
        weighted_prompts: &'a [WeightedPrompt],
    },
    MusicGenerationConfig(WireConfig<'a>),
    PlaybackControl(Playback),
}

#[derive(Debug, Serialize)]
struct WireConfig<'a> {
    #[serde(flatten)]
    config: &'a MusicGenerationConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<u64>,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
enum Playback {
    Play,
    Stop,
}

/// Server message; unknown members are ignored.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServerMessage {
    setup_complete: Option<serde_json::Value>,
    server_content: Option<ServerContent>,
    filtered_prompt: Option<serde_json::Value>,
    warning: Option<serde_json::Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServerContent {
    #[serde(default)]
    audio_chunks: Vec<AudioChunk>,
}

#[derive(Debug, Deserialize)]
struct AudioChunk {
    data: Option<String>,
}

fn encode(msg: &ClientMessage<'_>) -> GenAiResult<Message> {
    let json = serde_json::to_string(msg)?;
    trace!("Music client message: {}", json);
    Ok(Message::Text(json.into()))
}

/// Decode one frame. `Ok(None)` for control frames.
fn decode(msg: Message) -> GenAiResult<Option<ServerMessage>> {
    match msg {
        Message::Text(text) => Ok(Some(serde_json::from_str(text.as_str())?)),
        Message::Binary(data) => Ok(Some(serde_json::from_slice(&data)?)),
        Message::Close(frame) => Err(GenAiError::SessionClosed(
            frame
                .map(|f| format!("{} {}", u16::from(f.code), f.reason.as_str()))
                .unwrap_or_else(|| "closed by server".to_string()),
        )),
        _ => Ok(None),
    }
}

/// PCM bytes for `seconds` of 48 kHz stereo, aligned to whole frames.
fn target_bytes(seconds: f64) -> usize {
    let frames = (seconds.max(0.0) * f64::from(PcmFormat::MUSIC.sample_rate)).round() as usize;
    frames * usize::from(PcmFormat::MUSIC.channels) * 2
}

async fn wait_for_setup<S>(stream: &mut S) -> GenAiResult<()>
where
    S: Stream<Item = Result<Message, WsError>> + Unpin,
{
    while let Some(msg) = stream.next().await {
        if let Some(server) = decode(msg?)? {
            if server.setup_complete.is_some() {
                debug!("Music session setup complete");
                return Ok(());
            }
            warn!("Unexpected message during music setup: {:?}", server);
        }
    }
    Err(GenAiError::SessionClosed(
        "connection closed before setup complete".to_string(),
    ))
}

/// Record audio chunks until `target` bytes or `deadline`.
///
/// Reaching the deadline or end of stream with some audio returns what was
/// collected; with none it is an error.
async fn collect_audio<S>(stream: &mut S, target: usize, deadline: Instant) -> GenAiResult<Vec<u8>>
where
    S: Stream<Item = Result<Message, WsError>> + Unpin,
{
    let engine = base64::engine::general_purpose::STANDARD;
    let mut pcm = Vec::with_capacity(target);

    while pcm.len() < target {
        let next = match tokio::time::timeout_at(deadline, stream.next()).await {
            Ok(Some(msg)) => msg?,
            Ok(None) => break,
            Err(_) => {
                warn!(collected = pcm.len(), target, "Music recording deadline reached");
                break;
            }
        };

        let server = match decode(next) {
            Ok(Some(server)) => server,
            Ok(None) => continue,
            Err(GenAiError::SessionClosed(reason)) if !pcm.is_empty() => {
                warn!(reason = %reason, "Music session closed early");
                break;
            }
            Err(e) => return Err(e),
        };

        if let Some(filtered) = server.filtered_prompt {
            warn!("Music prompt filtered: {}", filtered);
        }
        if let Some(warning) = server.warning {
            warn!("Music session warning: {}", warning);
        }
        if let Some(content) = server.server_content {
            for chunk in content.audio_chunks {
                if let Some(data) = chunk.data {
                    pcm.extend_from_slice(&engine.decode(data)?);
                }
            }
        }
    }

    if pcm.is_empty() {
        return Err(GenAiError::EmptyResponse("music"));
    }
    pcm.truncate(target);
    Ok(pcm)
}

async fn send<S>(sink: &mut S, msg: &ClientMessage<'_>) -> GenAiResult<()>
where
    S: Sink<Message, Error = WsError> + Unpin,
{
    sink.send(encode(msg)?).await?;
    Ok(())
}

/// [`MusicGenerator`] backed by the Lyria real-time model.
#[derive(Debug, Clone)]
pub struct LyriaClient {
    config: GenAiConfig,
}

impl LyriaClient {
    pub fn new(config: GenAiConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl MusicGenerator for LyriaClient {
    fn model(&self) -> &str {
        &self.config.music_model
    }

    async fn generate_music(
        &self,
        params: &MusicGenerationParams,
        duration: f64,
    ) -> GenAiResult<Vec<u8>> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or(GenAiError::MissingApiKey)?;

        info!(
            model = %self.config.music_model,
            prompts = params.prompts.len(),
            bpm = params.config.bpm,
            duration,
            "Generating music"
        );

        let url = format!("{}?key={}", self.config.music_endpoint, api_key);
        let (ws, _) = connect_async(url.as_str()).await?;
        let (mut sink, mut stream) = ws.split();

        send(
            &mut sink,
            &ClientMessage::Setup {
                model: &self.config.music_model,
            },
        )
        .await?;
        wait_for_setup(&mut stream).await?;

        send(
            &mut sink,
            &ClientMessage::ClientContent {
                weighted_prompts: &params.prompts,
            },
        )
        .await?;
        send(
            &mut sink,
            &ClientMessage::MusicGenerationConfig(WireConfig {
                config: &params.config,
                seed: params.seed,
            }),
        )
        .await?;
        send(&mut sink, &ClientMessage::PlaybackControl(Playback::Play)).await?;

        let limit = Duration::from_secs_f64(duration.max(0.0))
            + Duration::from_secs(self.config.music_grace_secs);
        let recorded =
            collect_audio(&mut stream, target_bytes(duration), Instant::now() + limit).await;

        if let Err(e) = send(&mut sink, &ClientMessage::PlaybackControl(Playback::Stop)).await {
            debug!("Failed to stop music playback: {}", e);
        }
        let _ = sink.close().await;

        let pcm = recorded?;
        info!(
            seconds = PcmFormat::MUSIC.duration_of(pcm.len()),
            "Music recording complete"
        );
        Ok(pcm_to_wav(&pcm, PcmFormat::MUSIC)?)
    }
}
