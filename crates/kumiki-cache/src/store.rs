//! Content-addressed artifact store.
//!
//! Each [`GenerationCache`] owns one directory holding `<key>.<ext>` files
//! and a `manifest.json`. All manifest read-modify-write cycles run under
//! one async mutex per cache instance.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use kumiki_media::{Encoder, MUSIC_BITRATE};
use serde::Serialize;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{CacheError, CacheResult};
use crate::manifest::{CacheEntry, EntryMetadata, EntryUsage, Manifest, MANIFEST_FILE};
use crate::metrics;

/// Artifact family stored by a cache instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    Image,
    Music,
    Narration,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 3] = [
        ArtifactKind::Image,
        ArtifactKind::Music,
        ArtifactKind::Narration,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::Image => "image",
            ArtifactKind::Music => "music",
            ArtifactKind::Narration => "narration",
        }
    }

    /// Subdirectory under the cache root.
    pub fn dir_name(&self) -> &'static str {
        match self {
            ArtifactKind::Image => "generated-images",
            ArtifactKind::Music => "generated-music",
            ArtifactKind::Narration => "narration",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ArtifactKind::Image => "png",
            ArtifactKind::Music => "mp3",
            ArtifactKind::Narration => "wav",
        }
    }

    /// Older extension still honored on lookup.
    fn legacy_extension(&self) -> Option<&'static str> {
        match self {
            ArtifactKind::Music => Some("wav"),
            _ => None,
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            ArtifactKind::Image => "image/png",
            ArtifactKind::Music => "audio/mpeg",
            ArtifactKind::Narration => "audio/wav",
        }
    }
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ArtifactKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "image" => Ok(ArtifactKind::Image),
            "music" => Ok(ArtifactKind::Music),
            "narration" => Ok(ArtifactKind::Narration),
            other => Err(format!("unknown cache kind '{}'", other)),
        }
    }
}

/// Generation details recorded alongside an artifact.
#[derive(Debug, Clone, Default)]
pub struct ArtifactMeta {
    pub model: String,
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ArtifactMeta {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            extra: serde_json::Map::new(),
        }
    }

    pub fn with(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.extra.insert(key.to_string(), value.into());
        self
    }
}

/// Aggregate size of the files a cache holds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheSize {
    pub total_bytes: u64,
    pub file_count: usize,
}

/// Status report for one cache.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheStatus {
    pub kind: ArtifactKind,
    pub dir: PathBuf,
    pub entries: usize,
    pub size: CacheSize,
    pub oldest: Option<DateTime<Utc>>,
    pub newest: Option<DateTime<Utc>>,
}

/// A cached artifact with its manifest record.
#[derive(Debug, Clone)]
pub struct CachedArtifact {
    pub path: PathBuf,
    pub entry: CacheEntry,
}

/// One content-addressed cache directory.
pub struct GenerationCache {
    kind: ArtifactKind,
    dir: PathBuf,
    manifest: Mutex<Option<Manifest>>,
    transcoder: Option<Arc<dyn Encoder>>,
}

impl std::fmt::Debug for GenerationCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationCache")
            .field("kind", &self.kind)
            .field("dir", &self.dir)
            .finish()
    }
}

impl GenerationCache {
    /// Cache for `kind` under `root/<kind dir>`.
    pub fn new(kind: ArtifactKind, root: &Path) -> Self {
        Self {
            kind,
            dir: root.join(kind.dir_name()),
            manifest: Mutex::new(None),
            transcoder: None,
        }
    }

    /// Music cache that stores generated WAV as MP3.
    pub fn music(root: &Path, encoder: Arc<dyn Encoder>) -> Self {
        Self {
            transcoder: Some(encoder),
            ..Self::new(ArtifactKind::Music, root)
        }
    }

    pub fn kind(&self) -> ArtifactKind {
        self.kind
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn manifest_path(&self) -> PathBuf {
        self.dir.join(MANIFEST_FILE)
    }

    fn artifact_path(&self, key: &str, ext: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", key, ext))
    }

    /// Existing backing file for `key`, preferring the current extension.
    async fn backing_file(&self, key: &str) -> Option<PathBuf> {
        let candidates = std::iter::once(self.kind.extension()).chain(self.kind.legacy_extension());
        for ext in candidates {
            let path = self.artifact_path(key, ext);
            if fs::try_exists(&path).await.unwrap_or(false) {
                return Some(path);
            }
        }
        None
    }

    /// Create the directory and load the manifest. Safe to call repeatedly.
    pub async fn initialize(&self) -> CacheResult<()> {
        let mut guard = self.manifest.lock().await;
        if guard.is_some() {
            return Ok(());
        }

        fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| CacheError::Directory {
                path: self.dir.clone(),
                source,
            })?;

        let manifest = Manifest::load(&self.manifest_path()).await;
        debug!(
            kind = %self.kind,
            entries = manifest.entries.len(),
            "Cache manifest loaded"
        );
        *guard = Some(manifest);
        Ok(())
    }

    /// Run `f` on the loaded manifest, initializing first if needed.
    async fn with_manifest<T>(&self, f: impl FnOnce(&mut Manifest) -> T) -> CacheResult<T> {
        self.initialize().await?;
        let mut guard = self.manifest.lock().await;
        let manifest = guard.get_or_insert_with(Manifest::default);
        Ok(f(manifest))
    }

    async fn persist(&self) -> CacheResult<()> {
        let guard = self.manifest.lock().await;
        if let Some(manifest) = guard.as_ref() {
            manifest.save(&self.manifest_path()).await?;
        }
        Ok(())
    }

    /// Look up `key`. A hit bumps usage; an entry whose file has vanished is
    /// pruned and reported as a miss.
    pub async fn get(&self, key: &str, project: Option<&str>) -> CacheResult<Option<PathBuf>> {
        let known = self.with_manifest(|m| m.find(key).is_some()).await?;
        if !known {
            metrics::record_miss(self.kind);
            return Ok(None);
        }

        let Some(path) = self.backing_file(key).await else {
            warn!(kind = %self.kind, key = %key, "Cached file missing, pruning entry");
            self.with_manifest(|m| m.remove(key)).await?;
            self.persist().await?;
            metrics::record_self_heal(self.kind);
            metrics::record_miss(self.kind);
            return Ok(None);
        };

        let now = Utc::now();
        self.with_manifest(|m| {
            if let Some(entry) = m.find_mut(key) {
                entry.usage.touch(now, project);
            }
        })
        .await?;
        self.persist().await?;

        debug!(kind = %self.kind, key = %key, path = %path.display(), "Cache hit");
        metrics::record_hit(self.kind);
        Ok(Some(path))
    }

    /// Manifest record for `key`, if any.
    pub async fn entry(&self, key: &str) -> CacheResult<Option<CacheEntry>> {
        self.with_manifest(|m| m.find(key).cloned()).await
    }

    /// Store `data` under `key` and record it. Returns the artifact path.
    pub async fn save<P: Serialize + ?Sized>(
        &self,
        key: &str,
        data: &[u8],
        params: &P,
        meta: ArtifactMeta,
        project: Option<&str>,
    ) -> CacheResult<PathBuf> {
        self.initialize().await?;
        let params = serde_json::to_value(params)?;
        let path = self.artifact_path(key, self.kind.extension());

        match &self.transcoder {
            Some(encoder) => self.write_transcoded(encoder.as_ref(), key, data, &path).await?,
            None => {
                let tmp = self.dir.join(format!("{}.{}.tmp", key, self.kind.extension()));
                fs::write(&tmp, data).await?;
                fs::rename(&tmp, &path).await?;
            }
        }

        let file_size = fs::metadata(&path).await?.len();
        let now = Utc::now();
        let entry = CacheEntry {
            key: key.to_string(),
            params,
            metadata: EntryMetadata {
                generated_at: now,
                model: meta.model,
                file_size,
                mime_type: self.kind.mime_type().to_string(),
                extra: meta.extra,
            },
            usage: EntryUsage::new(now, project),
        };

        self.with_manifest(|m| m.upsert(entry)).await?;
        self.persist().await?;

        info!(
            kind = %self.kind,
            key = %key,
            path = %path.display(),
            size = file_size,
            "Artifact cached"
        );
        metrics::record_store(self.kind, file_size);
        Ok(path)
    }

    /// Write WAV `data` to a scratch file and encode it to `dest`.
    async fn write_transcoded(
        &self,
        encoder: &dyn Encoder,
        key: &str,
        data: &[u8],
        dest: &Path,
    ) -> CacheResult<()> {
        let scratch = self.dir.join(format!("{}_temp.wav", key));
        let partial = self.dir.join(format!("{}.partial.{}", key, self.kind.extension()));
        fs::write(&scratch, data).await?;

        let result = encoder.transcode_audio(&scratch, &partial, MUSIC_BITRATE).await;
        if let Err(e) = fs::remove_file(&scratch).await {
            debug!("Failed to remove transcode scratch file: {}", e);
        }
        if let Err(e) = result {
            let _ = fs::remove_file(&partial).await;
            return Err(e.into());
        }

        fs::rename(&partial, dest).await?;
        Ok(())
    }

    /// Remove entries last used before `now - older_than`, or all entries.
    /// Returns the number of entries removed.
    pub async fn clear(&self, older_than: Option<Duration>) -> CacheResult<usize> {
        let cutoff = older_than.map(|age| Utc::now() - age);
        let removed = self
            .with_manifest(|m| {
                let (gone, kept): (Vec<_>, Vec<_>) = m
                    .entries
                    .drain(..)
                    .partition(|e| cutoff.map_or(true, |c| e.usage.last_used < c));
                m.entries = kept;
                gone
            })
            .await?;

        for entry in &removed {
            let candidates =
                std::iter::once(self.kind.extension()).chain(self.kind.legacy_extension());
            for ext in candidates {
                let path = self.artifact_path(&entry.key, ext);
                match fs::remove_file(&path).await {
                    Ok(()) => debug!(key = %entry.key, "Removed cached file"),
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => warn!(
                        key = %entry.key,
                        path = %path.display(),
                        "Failed to remove cached file: {}",
                        e
                    ),
                }
            }
        }
        self.persist().await?;

        let remaining = self.with_manifest(|m| m.entries.len()).await?;
        info!(
            kind = %self.kind,
            removed = removed.len(),
            remaining,
            "Cache cleared"
        );
        Ok(removed.len())
    }

    /// Artifacts whose backing file exists.
    pub async fn list(&self) -> CacheResult<Vec<CachedArtifact>> {
        let entries = self.with_manifest(|m| m.entries.clone()).await?;
        let mut artifacts = Vec::with_capacity(entries.len());
        for entry in entries {
            if let Some(path) = self.backing_file(&entry.key).await {
                artifacts.push(CachedArtifact { path, entry });
            }
        }
        Ok(artifacts)
    }

    /// Total bytes and count of files on disk.
    pub async fn size(&self) -> CacheResult<CacheSize> {
        let mut size = CacheSize::default();
        for artifact in self.list().await? {
            if let Ok(meta) = fs::metadata(&artifact.path).await {
                size.total_bytes += meta.len();
                size.file_count += 1;
            }
        }
        Ok(size)
    }

    pub async fn status(&self) -> CacheResult<CacheStatus> {
        let size = self.size().await?;
        let (entries, oldest, newest) = self
            .with_manifest(|m| {
                let dates = m.entries.iter().map(|e| e.metadata.generated_at);
                (m.entries.len(), dates.clone().min(), dates.max())
            })
            .await?;

        Ok(CacheStatus {
            kind: self.kind,
            dir: self.dir.clone(),
            entries,
            size,
            oldest,
            newest,
        })
    }
}

/// The three caches used by a render.
#[derive(Debug, Clone)]
pub struct Caches {
    pub image: Arc<GenerationCache>,
    pub music: Arc<GenerationCache>,
    pub narration: Arc<GenerationCache>,
}

impl Caches {
    pub fn open(root: &Path, encoder: Arc<dyn Encoder>) -> Self {
        Self {
            image: Arc::new(GenerationCache::new(ArtifactKind::Image, root)),
            music: Arc::new(GenerationCache::music(root, encoder)),
            narration: Arc::new(GenerationCache::new(ArtifactKind::Narration, root)),
        }
    }

    pub fn get(&self, kind: ArtifactKind) -> &Arc<GenerationCache> {
        match kind {
            ArtifactKind::Image => &self.image,
            ArtifactKind::Music => &self.music,
            ArtifactKind::Narration => &self.narration,
        }
    }

    pub async fn initialize(&self) -> CacheResult<()> {
        for kind in ArtifactKind::ALL {
            self.get(kind).initialize().await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use kumiki_media::{
        ImageToVideoRequest, MediaError, MediaInfo, MediaResult, MusicMix, NarrationMix,
        ProgressCallback, TransitionRequest, TrimRequest,
    };
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Encoder whose transcode copies bytes with a marker prefix.
    #[derive(Default)]
    struct CopyEncoder {
        transcodes: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl Encoder for CopyEncoder {
        async fn version(&self) -> MediaResult<String> {
            Ok("fake".to_string())
        }
        async fn probe(&self, _path: &Path) -> MediaResult<MediaInfo> {
            Ok(MediaInfo::default())
        }
        async fn image_to_video(&self, _req: &ImageToVideoRequest) -> MediaResult<()> {
            unimplemented!()
        }
        async fn trim(&self, _req: &TrimRequest) -> MediaResult<()> {
            unimplemented!()
        }
        async fn extract_frame(&self, _i: &Path, _at: f64, _o: &Path) -> MediaResult<()> {
            unimplemented!()
        }
        async fn concat(
            &self,
            _inputs: &[PathBuf],
            _output: &Path,
            _expected: f64,
            _progress: Option<ProgressCallback>,
        ) -> MediaResult<()> {
            unimplemented!()
        }
        async fn transition(&self, _req: &TransitionRequest) -> MediaResult<()> {
            unimplemented!()
        }
        async fn mux_narration(
            &self,
            _v: &Path,
            _n: &Path,
            _o: &Path,
            _mix: &NarrationMix,
        ) -> MediaResult<()> {
            unimplemented!()
        }
        async fn add_silent_audio(&self, _v: &Path, _o: &Path) -> MediaResult<()> {
            unimplemented!()
        }
        async fn mix_music(
            &self,
            _v: &Path,
            _m: &Path,
            _o: &Path,
            _mix: &MusicMix,
        ) -> MediaResult<()> {
            unimplemented!()
        }
        async fn transcode_audio(&self, input: &Path, output: &Path, bitrate: &str) -> MediaResult<()> {
            self.transcodes.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(MediaError::ffmpeg_failed("boom", None, Some(1)));
            }
            assert_eq!(bitrate, "192k");
            let mut data = b"MP3:".to_vec();
            data.extend(fs::read(input).await?);
            fs::write(output, data).await?;
            Ok(())
        }
    }

    fn image_cache(dir: &TempDir) -> GenerationCache {
        GenerationCache::new(ArtifactKind::Image, dir.path())
    }

    #[tokio::test]
    async fn test_initialize_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let cache = image_cache(&dir);
        cache.initialize().await.unwrap();
        cache
            .save("k1", b"png", &json!({"prompt": "a"}), ArtifactMeta::new("m"), None)
            .await
            .unwrap();
        cache.initialize().await.unwrap();
        assert!(cache.entry("k1").await.unwrap().is_some());
        assert!(dir.path().join("generated-images").join(MANIFEST_FILE).exists());
    }

    #[tokio::test]
    async fn test_save_then_get_bumps_usage() {
        let dir = TempDir::new().unwrap();
        let cache = image_cache(&dir);

        let path = cache
            .save(
                "abc",
                b"png-bytes",
                &json!({"prompt": "fox"}),
                ArtifactMeta::new("gemini"),
                Some("/p/a.json"),
            )
            .await
            .unwrap();
        assert_eq!(path, dir.path().join("generated-images/abc.png"));
        assert_eq!(fs::read(&path).await.unwrap(), b"png-bytes");

        let hit = cache.get("abc", Some("/p/b.json")).await.unwrap();
        assert_eq!(hit, Some(path));

        let entry = cache.entry("abc").await.unwrap().unwrap();
        assert_eq!(entry.usage.use_count, 2);
        assert_eq!(entry.usage.projects, vec!["/p/a.json", "/p/b.json"]);
        assert_eq!(entry.metadata.file_size, 9);
        assert_eq!(entry.metadata.mime_type, "image/png");
        assert_eq!(entry.params["prompt"], "fox");
    }

    #[tokio::test]
    async fn test_get_unknown_key_is_miss() {
        let dir = TempDir::new().unwrap();
        let cache = image_cache(&dir);
        assert_eq!(cache.get("nope", None).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_get_self_heals_missing_file() {
        let dir = TempDir::new().unwrap();
        let cache = image_cache(&dir);
        let path = cache
            .save("gone", b"x", &json!({}), ArtifactMeta::new("m"), None)
            .await
            .unwrap();
        fs::remove_file(&path).await.unwrap();

        assert_eq!(cache.get("gone", None).await.unwrap(), None);
        assert!(cache.entry("gone").await.unwrap().is_none());

        // The pruned manifest is persisted
        let reopened = image_cache(&dir);
        assert!(reopened.entry("gone").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_clear_by_age() {
        let dir = TempDir::new().unwrap();
        let cache = image_cache(&dir);
        for key in ["old", "new"] {
            cache
                .save(key, b"x", &json!({}), ArtifactMeta::new("m"), None)
                .await
                .unwrap();
        }
        cache
            .with_manifest(|m| {
                m.find_mut("old").unwrap().usage.last_used = Utc::now() - Duration::days(10);
            })
            .await
            .unwrap();

        assert_eq!(cache.clear(Some(Duration::days(7))).await.unwrap(), 1);
        assert!(!dir.path().join("generated-images/old.png").exists());
        assert!(cache.get("new", None).await.unwrap().is_some());

        assert_eq!(cache.clear(None).await.unwrap(), 1);
        assert_eq!(cache.size().await.unwrap(), CacheSize::default());
    }

    #[tokio::test]
    async fn test_status_and_list() {
        let dir = TempDir::new().unwrap();
        let cache = GenerationCache::new(ArtifactKind::Narration, dir.path());
        cache
            .save(
                "n1",
                b"RIFF....",
                &json!({"text": "hi"}),
                ArtifactMeta::new("tts").with("duration", 1.5),
                None,
            )
            .await
            .unwrap();
        cache
            .save("n2", b"RIFF", &json!({"text": "yo"}), ArtifactMeta::new("tts"), None)
            .await
            .unwrap();

        let status = cache.status().await.unwrap();
        assert_eq!(status.entries, 2);
        assert_eq!(status.size.file_count, 2);
        assert_eq!(status.size.total_bytes, 12);
        assert!(status.oldest.unwrap() <= status.newest.unwrap());

        let listed = cache.list().await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].entry.metadata.extra["duration"], 1.5);
    }

    #[tokio::test]
    async fn test_music_is_transcoded_before_commit() {
        let dir = TempDir::new().unwrap();
        let encoder = Arc::new(CopyEncoder::default());
        let cache = GenerationCache::music(dir.path(), encoder.clone());

        let path = cache
            .save("m1", b"WAVDATA", &json!({}), ArtifactMeta::new("lyria"), None)
            .await
            .unwrap();
        assert_eq!(path.extension().unwrap(), "mp3");
        assert_eq!(fs::read(&path).await.unwrap(), b"MP3:WAVDATA");
        assert_eq!(encoder.transcodes.load(Ordering::SeqCst), 1);
        assert!(!dir.path().join("generated-music/m1_temp.wav").exists());

        let entry = cache.entry("m1").await.unwrap().unwrap();
        assert_eq!(entry.metadata.mime_type, "audio/mpeg");
    }

    #[tokio::test]
    async fn test_failed_transcode_leaves_no_entry() {
        let dir = TempDir::new().unwrap();
        let encoder = Arc::new(CopyEncoder {
            fail: true,
            ..Default::default()
        });
        let cache = GenerationCache::music(dir.path(), encoder);

        let err = cache
            .save("m1", b"WAV", &json!({}), ArtifactMeta::new("lyria"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, CacheError::Transcode(_)));
        assert!(cache.entry("m1").await.unwrap().is_none());
        assert!(!dir.path().join("generated-music/m1_temp.wav").exists());
    }

    #[tokio::test]
    async fn test_music_legacy_wav_is_served() {
        let dir = TempDir::new().unwrap();
        let cache = GenerationCache::music(dir.path(), Arc::new(CopyEncoder::default()));
        cache
            .save("legacy", b"W", &json!({}), ArtifactMeta::new("lyria"), None)
            .await
            .unwrap();
        let mp3 = dir.path().join("generated-music/legacy.mp3");
        let wav = dir.path().join("generated-music/legacy.wav");
        fs::rename(&mp3, &wav).await.unwrap();

        assert_eq!(cache.get("legacy", None).await.unwrap(), Some(wav));
    }

    #[test]
    fn test_kind_parsing() {
        assert_eq!("music".parse::<ArtifactKind>().unwrap(), ArtifactKind::Music);
        assert!("video".parse::<ArtifactKind>().is_err());
    }
}
