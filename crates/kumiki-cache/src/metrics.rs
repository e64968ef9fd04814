//! Cache metrics.
//!
//! Counters are emitted through the `metrics` facade; with no recorder
//! installed they are no-ops.

use metrics::counter;

use crate::store::ArtifactKind;

/// Metric names as constants for consistency.
pub mod names {
    pub const CACHE_HITS_TOTAL: &str = "kumiki_cache_hits_total";
    pub const CACHE_MISSES_TOTAL: &str = "kumiki_cache_misses_total";
    pub const CACHE_SELF_HEALS_TOTAL: &str = "kumiki_cache_self_heals_total";
    pub const CACHE_STORES_TOTAL: &str = "kumiki_cache_stores_total";
    pub const CACHE_STORED_BYTES_TOTAL: &str = "kumiki_cache_stored_bytes_total";
}

pub fn record_hit(kind: ArtifactKind) {
    let labels = [("kind", kind.as_str())];
    counter!(names::CACHE_HITS_TOTAL, &labels).increment(1);
}

pub fn record_miss(kind: ArtifactKind) {
    let labels = [("kind", kind.as_str())];
    counter!(names::CACHE_MISSES_TOTAL, &labels).increment(1);
}

pub fn record_self_heal(kind: ArtifactKind) {
    let labels = [("kind", kind.as_str())];
    counter!(names::CACHE_SELF_HEALS_TOTAL, &labels).increment(1);
}

pub fn record_store(kind: ArtifactKind, bytes: u64) {
    let labels = [("kind", kind.as_str())];
    counter!(names::CACHE_STORES_TOTAL, &labels).increment(1);
    counter!(names::CACHE_STORED_BYTES_TOTAL, &labels).increment(bytes);
}
