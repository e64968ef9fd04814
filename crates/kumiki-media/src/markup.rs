//! HTML to PNG rendering through a headless Chromium.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use kumiki_models::Resolution;
use tokio::process::Command;
use tokio::sync::Semaphore;
use tracing::debug;

use crate::error::{MediaError, MediaResult};
use crate::fs_utils::{ensure_parent, remove_file_if_exists};

/// Environment variable overriding browser detection.
pub const CHROMIUM_ENV: &str = "KUMIKI_CHROMIUM";

/// Binaries tried in order when no explicit browser is configured.
const BROWSER_CANDIDATES: &[&str] = &[
    "chromium",
    "chromium-browser",
    "google-chrome",
    "google-chrome-stable",
];

/// Converts a markup document into a still image.
#[async_trait]
pub trait MarkupRenderer: Send + Sync {
    /// Render `html` in a `viewport`-sized page and write a PNG to `output`.
    async fn render_png(&self, html: &str, viewport: Resolution, output: &Path) -> MediaResult<()>;
}

/// Find a usable browser: explicit path, then `KUMIKI_CHROMIUM`, then PATH.
pub fn detect_browser(explicit: Option<&Path>) -> MediaResult<PathBuf> {
    if let Some(path) = explicit {
        return which::which(path).map_err(|_| MediaError::BrowserNotFound);
    }
    if let Some(path) = std::env::var_os(CHROMIUM_ENV).filter(|v| !v.is_empty()) {
        return which::which(PathBuf::from(path)).map_err(|_| MediaError::BrowserNotFound);
    }
    BROWSER_CANDIDATES
        .iter()
        .find_map(|name| which::which(name).ok())
        .ok_or(MediaError::BrowserNotFound)
}

/// [`MarkupRenderer`] that shells out to `--headless --screenshot`.
///
/// One renderer is shared by every scene of a render; the semaphore bounds
/// how many browser processes run at once.
#[derive(Debug, Clone)]
pub struct ChromiumRenderer {
    binary: PathBuf,
    sessions: Arc<Semaphore>,
    timeout: Duration,
}

impl ChromiumRenderer {
    pub fn new(binary: impl Into<PathBuf>, max_sessions: usize) -> Self {
        Self {
            binary: binary.into(),
            sessions: Arc::new(Semaphore::new(max_sessions.max(1))),
            timeout: Duration::from_secs(60),
        }
    }

    /// Detect the browser and build a renderer for it.
    pub fn detect(explicit: Option<&Path>, max_sessions: usize) -> MediaResult<Self> {
        let binary = detect_browser(explicit)?;
        debug!(browser = %binary.display(), "Using headless browser");
        Ok(Self::new(binary, max_sessions))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }
}

fn screenshot_args(html_path: &Path, viewport: Resolution, output: &Path) -> Vec<String> {
    vec![
        "--headless".to_string(),
        "--disable-gpu".to_string(),
        "--no-sandbox".to_string(),
        "--hide-scrollbars".to_string(),
        "--allow-file-access-from-files".to_string(),
        format!("--window-size={},{}", viewport.width, viewport.height),
        format!("--screenshot={}", output.display()),
        format!("file://{}", html_path.display()),
    ]
}

#[async_trait]
impl MarkupRenderer for ChromiumRenderer {
    async fn render_png(&self, html: &str, viewport: Resolution, output: &Path) -> MediaResult<()> {
        ensure_parent(output).await?;
        let output = if output.is_absolute() {
            output.to_path_buf()
        } else {
            std::env::current_dir()?.join(output)
        };
        let html_path = output.with_extension("html");
        tokio::fs::write(&html_path, html).await?;

        let _permit = self
            .sessions
            .acquire()
            .await
            .map_err(|_| MediaError::browser_failed("browser session pool closed", None))?;

        let args = screenshot_args(&html_path, viewport, &output);
        debug!("Running browser: {} {}", self.binary.display(), args.join(" "));

        let child = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let result = match tokio::time::timeout(self.timeout, child).await {
            Err(_) => Err(MediaError::Timeout(self.timeout.as_secs())),
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(MediaError::BrowserNotFound)
            }
            Ok(Err(e)) => Err(MediaError::Io(e)),
            Ok(Ok(out)) if !out.status.success() => Err(MediaError::browser_failed(
                format!("browser exited with {}", out.status),
                Some(String::from_utf8_lossy(&out.stderr).to_string()),
            )),
            Ok(Ok(out)) => {
                if tokio::fs::try_exists(&output).await.unwrap_or(false) {
                    Ok(())
                } else {
                    Err(MediaError::browser_failed(
                        "browser produced no screenshot",
                        Some(String::from_utf8_lossy(&out.stderr).to_string()),
                    ))
                }
            }
        };

        remove_file_if_exists(&html_path).await?;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_screenshot_args() {
        let args = screenshot_args(
            Path::new("/tmp/work/title.html"),
            Resolution::new(1920, 1080),
            Path::new("/tmp/work/title.png"),
        );
        assert!(args.contains(&"--headless".to_string()));
        assert!(args.contains(&"--window-size=1920,1080".to_string()));
        assert!(args.contains(&"--screenshot=/tmp/work/title.png".to_string()));
        assert_eq!(args.last().unwrap(), "file:///tmp/work/title.html");
    }

    #[test]
    fn test_detect_browser_rejects_missing_explicit_path() {
        let err = detect_browser(Some(Path::new("/nonexistent/chromium-kumiki"))).unwrap_err();
        assert!(err.is_tool_missing());
    }
}
