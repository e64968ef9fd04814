//! FFmpeg progress parsing.

use serde::{Deserialize, Serialize};

/// Progress information from FFmpeg.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FfmpegProgress {
    /// Current frame number
    pub frame: u64,
    /// Output time in milliseconds
    pub out_time_ms: i64,
    /// Input duration in milliseconds, when FFmpeg reported one
    pub total_ms: Option<i64>,
    /// Encoding speed (e.g., 1.5 = 1.5x realtime)
    pub speed: f64,
    /// Whether encoding is complete
    pub is_complete: bool,
}

impl FfmpegProgress {
    /// Progress percentage given total duration in milliseconds.
    pub fn percentage(&self, total_duration_ms: i64) -> f64 {
        if self.is_complete {
            return 100.0;
        }
        if total_duration_ms <= 0 {
            return 0.0;
        }
        ((self.out_time_ms as f64 / total_duration_ms as f64) * 100.0).clamp(0.0, 100.0)
    }

    /// Percentage against the duration FFmpeg reported, if any.
    pub fn reported_percentage(&self) -> Option<f64> {
        self.total_ms.map(|total| self.percentage(total))
    }
}

/// Callback receiving a completion percentage in `0..=100`.
pub type ProgressCallback = Box<dyn Fn(f64) + Send + Sync + 'static>;

/// Parse `HH:MM:SS(.frac)` into milliseconds.
pub fn parse_timestamp_ms(s: &str) -> Option<i64> {
    let mut parts = s.trim().split(':');
    let hours: f64 = parts.next()?.parse().ok()?;
    let minutes: f64 = parts.next()?.parse().ok()?;
    let seconds: f64 = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some(((hours * 3600.0 + minutes * 60.0 + seconds) * 1000.0).round() as i64)
}

/// Extract the input duration from a diagnostic line such as
/// `  Duration: 00:00:05.04, start: 0.000000, bitrate: 25 kb/s`.
pub fn parse_duration_marker(line: &str) -> Option<i64> {
    let rest = line.trim_start().strip_prefix("Duration:")?;
    let value = rest.split(',').next()?;
    parse_timestamp_ms(value)
}

/// Extract elapsed output time from a stats line such as
/// `frame=  60 fps=0.0 q=-1.0 size=  1kB time=00:00:02.00 bitrate=...`.
pub fn parse_time_marker(line: &str) -> Option<i64> {
    let idx = line.find("time=")?;
    let value = line[idx + "time=".len()..].split_whitespace().next()?;
    parse_timestamp_ms(value)
}
