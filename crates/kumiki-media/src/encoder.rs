//! High-level encoder operations used by scene rendering and assembly.
//!
//! [`Encoder`] is the seam the renderer depends on; [`FfmpegEncoder`] is the
//! production implementation over [`FfmpegRunner`].

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use kumiki_models::{Direction, Resolution, TransitionKind};
use tokio::process::Command;
use tracing::{debug, info};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::filters;
use crate::fs_utils::{ensure_parent, remove_file_if_exists};
use crate::probe::{probe_media, MediaInfo};
use crate::progress::ProgressCallback;

/// Sample rate every clip's audio track is normalized to.
pub const AUDIO_SAMPLE_RATE: u32 = 48_000;

/// Bitrate for compressed music artifacts.
pub const MUSIC_BITRATE: &str = "192k";

/// Loop a still image into a fixed-length clip.
#[derive(Debug, Clone)]
pub struct ImageToVideoRequest {
    pub input: PathBuf,
    pub output: PathBuf,
    pub duration: f64,
    pub fps: u32,
    pub resolution: Resolution,
    /// Extra video filter appended after scaling.
    pub filter: Option<String>,
}

/// Cut a window from a source clip, letterboxed into the frame.
#[derive(Debug, Clone)]
pub struct TrimRequest {
    pub input: PathBuf,
    pub output: PathBuf,
    pub start: f64,
    pub duration: f64,
    pub fps: u32,
    pub resolution: Resolution,
}

/// Blend the tail of `first` into the head of `second`.
#[derive(Debug, Clone)]
pub struct TransitionRequest {
    pub first: PathBuf,
    pub second: PathBuf,
    pub output: PathBuf,
    pub kind: TransitionKind,
    pub direction: Option<Direction>,
    pub duration: f64,
    /// Time in `first` where the blend starts.
    pub offset: f64,
    /// Both clips carry audio that should be cross-faded too.
    pub with_audio: bool,
}

/// How narration is laid over a clip.
#[derive(Debug, Clone, PartialEq)]
pub struct NarrationMix {
    pub volume: f64,
    pub delay: f64,
    pub fade_in: f64,
    pub fade_out: f64,
    pub clip_duration: f64,
    /// Keep the clip's own audio underneath at this volume.
    pub original_volume: Option<f64>,
}

/// How background music is laid over the assembled video.
#[derive(Debug, Clone, PartialEq)]
pub struct MusicMix {
    pub volume: f64,
    pub fade_in: Option<f64>,
    pub fade_out: Option<f64>,
    pub total_duration: f64,
    /// Mix under existing audio instead of replacing it.
    pub keep_existing_audio: bool,
}

/// Media encoding operations.
#[async_trait]
pub trait Encoder: Send + Sync {
    /// Version banner of the encoder; fails if it is not installed.
    async fn version(&self) -> MediaResult<String>;

    async fn probe(&self, path: &Path) -> MediaResult<MediaInfo>;

    async fn image_to_video(&self, req: &ImageToVideoRequest) -> MediaResult<()>;

    async fn trim(&self, req: &TrimRequest) -> MediaResult<()>;

    /// Write the frame at `at` seconds as a still image.
    async fn extract_frame(&self, input: &Path, at: f64, output: &Path) -> MediaResult<()>;

    /// Join clips in order. `expected_duration` scales progress reports.
    async fn concat(
        &self,
        inputs: &[PathBuf],
        output: &Path,
        expected_duration: f64,
        progress: Option<ProgressCallback>,
    ) -> MediaResult<()>;

    async fn transition(&self, req: &TransitionRequest) -> MediaResult<()>;

    async fn mux_narration(
        &self,
        video: &Path,
        narration: &Path,
        output: &Path,
        mix: &NarrationMix,
    ) -> MediaResult<()>;

    /// Add a silent stereo track to a clip without audio.
    async fn add_silent_audio(&self, video: &Path, output: &Path) -> MediaResult<()>;

    async fn mix_music(
        &self,
        video: &Path,
        music: &Path,
        output: &Path,
        mix: &MusicMix,
    ) -> MediaResult<()>;

    /// Re-encode an audio file, e.g. WAV to MP3.
    async fn transcode_audio(&self, input: &Path, output: &Path, bitrate: &str) -> MediaResult<()>;
}

/// [`Encoder`] backed by the `ffmpeg` and `ffprobe` binaries.
#[derive(Debug, Clone, Default)]
pub struct FfmpegEncoder {
    runner: FfmpegRunner,
}

impl FfmpegEncoder {
    pub fn new(runner: FfmpegRunner) -> Self {
        Self { runner }
    }

    async fn run(&self, cmd: FfmpegCommand) -> MediaResult<()> {
        ensure_parent(cmd.output_path()).await?;
        self.runner.run(&cmd).await
    }
}

/// Uniform audio encoding so clips can be joined with stream copy.
fn standard_audio(cmd: FfmpegCommand) -> FfmpegCommand {
    cmd.audio_codec("aac")
        .output_arg("-ar")
        .output_arg(AUDIO_SAMPLE_RATE.to_string())
        .output_arg("-ac")
        .output_arg("2")
}

/// Quote a path for an FFmpeg concat list file.
fn concat_list_line(path: &Path) -> String {
    let escaped = path.to_string_lossy().replace('\'', r"'\''");
    format!("file '{}'", escaped)
}

#[async_trait]
impl Encoder for FfmpegEncoder {
    async fn version(&self) -> MediaResult<String> {
        let output = Command::new("ffmpeg")
            .arg("-version")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .output()
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => MediaError::FfmpegNotFound,
                _ => MediaError::Io(e),
            })?;

        if !output.status.success() {
            return Err(MediaError::FfmpegNotFound);
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(stdout.lines().next().unwrap_or_default().trim().to_string())
    }

    async fn probe(&self, path: &Path) -> MediaResult<MediaInfo> {
        probe_media(path).await
    }

    async fn image_to_video(&self, req: &ImageToVideoRequest) -> MediaResult<()> {
        let mut vf = filters::scale_exact(req.resolution);
        if let Some(extra) = req.filter.as_deref().filter(|f| !f.is_empty()) {
            vf.push(',');
            vf.push_str(extra);
        }

        let cmd = FfmpegCommand::new(&req.input, &req.output)
            .loop_input()
            .video_codec("libx264")
            .duration(req.duration)
            .frame_rate(req.fps)
            .pixel_format("yuv420p")
            .video_filter(vf)
            .preset("fast");

        debug!(output = %req.output.display(), duration = req.duration, "Still to clip");
        self.run(cmd).await
    }

    async fn trim(&self, req: &TrimRequest) -> MediaResult<()> {
        let cmd = FfmpegCommand::new(&req.input, &req.output)
            .seek(req.start)
            .duration(req.duration)
            .video_codec("libx264")
            .preset("fast")
            .video_filter(filters::letterbox(req.resolution))
            .frame_rate(req.fps)
            .pixel_format("yuv420p");

        debug!(
            input = %req.input.display(),
            start = req.start,
            duration = req.duration,
            "Trimming clip"
        );
        self.run(standard_audio(cmd)).await
    }

    async fn extract_frame(&self, input: &Path, at: f64, output: &Path) -> MediaResult<()> {
        let cmd = FfmpegCommand::new(input, output).seek(at).single_frame();
        self.run(cmd).await
    }

    async fn concat(
        &self,
        inputs: &[PathBuf],
        output: &Path,
        expected_duration: f64,
        progress: Option<ProgressCallback>,
    ) -> MediaResult<()> {
        if inputs.is_empty() {
            return Err(MediaError::invalid_argument("nothing to concatenate"));
        }
        ensure_parent(output).await?;

        let list_path = output.with_file_name(format!(
            "concat_{}.txt",
            uuid::Uuid::new_v4().simple()
        ));
        let mut list = String::new();
        for input in inputs {
            let absolute = if input.is_absolute() {
                input.clone()
            } else {
                std::env::current_dir()?.join(input)
            };
            list.push_str(&concat_list_line(&absolute));
            list.push('\n');
        }
        tokio::fs::write(&list_path, list).await?;

        let cmd = FfmpegCommand::new(&list_path, output)
            .input_args(["-f", "concat", "-safe", "0"])
            .output_args(["-c", "copy"]);

        info!(count = inputs.len(), output = %output.display(), "Concatenating clips");

        let total_ms = (expected_duration * 1000.0) as i64;
        let result = match progress {
            Some(cb) => {
                self.runner
                    .run_with_progress(&cmd, move |p| {
                        let pct = if total_ms > 0 {
                            p.percentage(total_ms)
                        } else {
                            p.reported_percentage().unwrap_or(0.0)
                        };
                        cb(pct);
                    })
                    .await
            }
            None => self.runner.run(&cmd).await,
        };

        remove_file_if_exists(&list_path).await?;
        result
    }

    async fn transition(&self, req: &TransitionRequest) -> MediaResult<()> {
        let name = filters::xfade_transition_name(req.kind, req.direction);
        let graph = filters::xfade_filter(name, req.duration, req.offset, req.with_audio);

        let mut cmd = FfmpegCommand::new(&req.first, &req.output)
            .add_input(&req.second)
            .filter_complex(graph)
            .map("[v]");
        cmd = if req.with_audio {
            standard_audio(cmd.map("[a]"))
        } else {
            cmd
        };
        let cmd = cmd.video_codec("libx264").preset("fast");

        debug!(
            transition = name,
            offset = req.offset,
            duration = req.duration,
            "Applying transition"
        );
        self.run(cmd).await
    }

    async fn mux_narration(
        &self,
        video: &Path,
        narration: &Path,
        output: &Path,
        mix: &NarrationMix,
    ) -> MediaResult<()> {
        let graph = filters::narration_filter(
            mix.volume,
            mix.delay,
            mix.fade_in,
            mix.fade_out,
            mix.clip_duration,
            mix.original_volume,
        );

        let cmd = FfmpegCommand::new(video, output)
            .add_input(narration)
            .filter_complex(graph)
            .map("0:v")
            .map("[aout]")
            .video_codec("copy");
        self.run(standard_audio(cmd).shortest()).await
    }

    async fn add_silent_audio(&self, video: &Path, output: &Path) -> MediaResult<()> {
        let cmd = FfmpegCommand::new(video, output)
            .add_input(format!(
                "anullsrc=channel_layout=stereo:sample_rate={}",
                AUDIO_SAMPLE_RATE
            ))
            .input_args(["-f", "lavfi"])
            .map("0:v")
            .map("1:a")
            .video_codec("copy");
        self.run(standard_audio(cmd).shortest()).await
    }

    async fn mix_music(
        &self,
        video: &Path,
        music: &Path,
        output: &Path,
        mix: &MusicMix,
    ) -> MediaResult<()> {
        let graph = if mix.keep_existing_audio {
            filters::music_mix_filter(mix.volume, mix.fade_in, mix.fade_out, mix.total_duration)
        } else {
            filters::music_only_filter(mix.volume, mix.fade_in, mix.fade_out, mix.total_duration)
        };

        let cmd = FfmpegCommand::new(video, output)
            .add_input(music)
            .filter_complex(graph)
            .map("0:v")
            .map("[aout]")
            .video_codec("copy");
        self.run(standard_audio(cmd).shortest()).await
    }

    async fn transcode_audio(&self, input: &Path, output: &Path, bitrate: &str) -> MediaResult<()> {
        let cmd = FfmpegCommand::new(input, output)
            .audio_codec("libmp3lame")
            .audio_bitrate(bitrate);
        self.run(cmd).await
    }
}
