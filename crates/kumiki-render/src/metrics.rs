//! Render metrics.
//!
//! Emitted through the `metrics` facade; the binary installs no recorder,
//! so these are no-ops unless an embedding application provides one.

use metrics::{counter, histogram};

pub mod names {
    pub const RENDERS_TOTAL: &str = "kumiki_renders_total";
    pub const RENDER_DURATION_SECONDS: &str = "kumiki_render_duration_seconds";
    pub const SCENES_RENDERED_TOTAL: &str = "kumiki_scenes_rendered_total";
    pub const SCENE_DURATION_SECONDS: &str = "kumiki_scene_render_duration_seconds";
    pub const NARRATION_FAILURES_TOTAL: &str = "kumiki_narration_failures_total";
    pub const TRANSITIONS_APPLIED_TOTAL: &str = "kumiki_transitions_applied_total";
}

pub fn record_render(success: bool, duration_secs: f64) {
    let labels = [("status", if success { "success" } else { "failure" })];
    counter!(names::RENDERS_TOTAL, &labels).increment(1);
    histogram!(names::RENDER_DURATION_SECONDS, &labels).record(duration_secs);
}

pub fn record_scene(kind: &'static str, duration_secs: f64) {
    let labels = [("kind", kind)];
    counter!(names::SCENES_RENDERED_TOTAL, &labels).increment(1);
    histogram!(names::SCENE_DURATION_SECONDS, &labels).record(duration_secs);
}

pub fn record_narration_failure() {
    counter!(names::NARRATION_FAILURES_TOTAL).increment(1);
}

pub fn record_transition(kind: &'static str) {
    let labels = [("kind", kind)];
    counter!(names::TRANSITIONS_APPLIED_TOTAL, &labels).increment(1);
}
