//! Content-addressed caches for generated artifacts.
//!
//! Three caches share one implementation: generated images (`.png`),
//! generated music (`.mp3`, transcoded from WAV on save) and narration
//! speech (`.wav`). Each keeps a JSON manifest with generation metadata and
//! usage statistics; a manifest entry whose file disappeared is pruned on
//! lookup.

pub mod error;
pub mod key;
pub mod manifest;
pub mod metrics;
pub mod store;

pub use error::{CacheError, CacheResult};
pub use key::{cache_key, image_key, music_key, narration_key};
pub use manifest::{CacheEntry, EntryMetadata, EntryUsage, Manifest, MANIFEST_VERSION};
pub use store::{
    ArtifactKind, ArtifactMeta, CacheSize, CacheStatus, CachedArtifact, Caches, GenerationCache,
};
