//! Render configuration.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Default number of scenes rendered at once.
pub const DEFAULT_CONCURRENCY: usize = 2;

/// Temp directory name created next to the output file.
pub const TEMP_DIR_NAME: &str = ".kumiki-temp";

/// Process-level configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct RenderConfig {
    /// Maximum scenes rendered in parallel
    pub concurrency: usize,
    /// Temp root; `<output dir>/.kumiki-temp` when unset
    pub work_dir: Option<PathBuf>,
    /// Root of the generation caches
    pub cache_dir: PathBuf,
    pub gemini_api_key: Option<String>,
    /// Explicit headless browser binary
    pub chromium_path: Option<PathBuf>,
    /// Per-invocation FFmpeg timeout
    pub ffmpeg_timeout_secs: u64,
    /// Extra seconds of generated music past the last scene
    pub music_lead_out_secs: f64,
}

fn default_cache_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(".kumiki")
        .join("cache")
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            work_dir: None,
            cache_dir: default_cache_dir(),
            gemini_api_key: None,
            chromium_path: None,
            ffmpeg_timeout_secs: 600,
            music_lead_out_secs: 5.0,
        }
    }
}

impl RenderConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            concurrency: std::env::var("KUMIKI_CONCURRENCY")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(DEFAULT_CONCURRENCY),
            work_dir: std::env::var("KUMIKI_TEMP_DIR").ok().map(PathBuf::from),
            cache_dir: std::env::var("KUMIKI_CACHE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| default_cache_dir()),
            gemini_api_key: std::env::var(kumiki_genai::API_KEY_ENV)
                .ok()
                .filter(|k| !k.is_empty()),
            chromium_path: std::env::var(kumiki_media::CHROMIUM_ENV)
                .ok()
                .map(PathBuf::from),
            ffmpeg_timeout_secs: std::env::var("KUMIKI_FFMPEG_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(600),
            music_lead_out_secs: std::env::var("KUMIKI_MUSIC_LEAD_OUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5.0),
        }
    }
}

/// Progress sink, called with a percentage in `0..=100`.
pub type RenderProgress = Arc<dyn Fn(f64) + Send + Sync>;

/// Settings for one render invocation.
#[derive(Clone)]
pub struct RenderOptions {
    pub output: PathBuf,
    /// Parent of the per-render scratch directory
    pub temp_dir: PathBuf,
    pub concurrency: usize,
    pub keep_temp: bool,
    /// Seconds of music generated past the timeline
    pub music_lead_out: f64,
    pub progress: Option<RenderProgress>,
}

impl fmt::Debug for RenderOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderOptions")
            .field("output", &self.output)
            .field("temp_dir", &self.temp_dir)
            .field("concurrency", &self.concurrency)
            .field("keep_temp", &self.keep_temp)
            .field("music_lead_out", &self.music_lead_out)
            .field("progress", &self.progress.is_some())
            .finish()
    }
}

impl RenderOptions {
    /// Options for writing `output`, with defaults taken from `config`.
    pub fn new(output: impl Into<PathBuf>, config: &RenderConfig) -> Self {
        let output = output.into();
        let temp_dir = config
            .work_dir
            .clone()
            .unwrap_or_else(|| default_temp_dir(&output));
        Self {
            output,
            temp_dir,
            concurrency: config.concurrency.max(1),
            keep_temp: false,
            music_lead_out: config.music_lead_out_secs,
            progress: None,
        }
    }

    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = dir.into();
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn keep_temp(mut self, keep: bool) -> Self {
        self.keep_temp = keep;
        self
    }

    pub fn with_progress(mut self, progress: impl Fn(f64) + Send + Sync + 'static) -> Self {
        self.progress = Some(Arc::new(progress));
        self
    }

    pub(crate) fn report(&self, percent: f64) {
        if let Some(progress) = &self.progress {
            progress(percent.clamp(0.0, 100.0));
        }
    }
}

fn default_temp_dir(output: &Path) -> PathBuf {
    output
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
        .join(TEMP_DIR_NAME)
}
