//! External media tool wrappers for Kumiki.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building
//! - Progress parsing from `-progress pipe:2`
//! - The [`Encoder`] seam and its FFmpeg implementation
//! - HTML to PNG rendering through a headless browser
//! - Filter graphs for transitions, narration and music mixing
//! - PCM to WAV wrapping for generated audio

pub mod command;
pub mod encoder;
pub mod error;
pub mod filters;
pub mod fs_utils;
pub mod markup;
pub mod probe;
pub mod progress;
pub mod wav;

pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use encoder::{
    Encoder, FfmpegEncoder, ImageToVideoRequest, MusicMix, NarrationMix, TransitionRequest,
    TrimRequest, AUDIO_SAMPLE_RATE, MUSIC_BITRATE,
};
pub use error::{MediaError, MediaResult};
pub use fs_utils::move_file;
pub use markup::{detect_browser, ChromiumRenderer, MarkupRenderer, CHROMIUM_ENV};
pub use probe::{get_duration, probe_media, MediaInfo};
pub use progress::{FfmpegProgress, ProgressCallback};
pub use wav::{estimate_wav_duration, pcm_to_wav, PcmFormat};
