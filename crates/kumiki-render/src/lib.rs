//! Kumiki render pipeline.
//!
//! This crate provides:
//! - Scene renderers for text, image, video and composite scenes
//! - Scene factory keyed by scene type
//! - Narration resolution through the generation caches
//! - Pairwise transitions and final assembly
//! - The `kumiki` binary

pub mod config;
pub mod error;
pub mod factory;
pub mod logging;
pub mod metrics;
pub mod narration;
pub mod pipeline;
pub mod scenes;
pub mod services;
pub mod sources;
pub mod transitions;

#[cfg(test)]
mod testing;

pub use config::{RenderConfig, RenderOptions, RenderProgress};
pub use error::{RenderError, RenderResult};
pub use factory::{SceneConstructor, SceneFactory};
pub use logging::RenderLogger;
pub use narration::{NarrationAudio, NarrationProcessor};
pub use pipeline::{load_project, RenderOutcome, Renderer};
pub use scenes::{SceneContext, SceneRenderer};
pub use services::Services;
pub use transitions::TransitionEngine;
