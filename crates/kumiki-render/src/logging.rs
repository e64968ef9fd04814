//! Structured render logging utilities.

use tracing::{error, info, warn, Span};

/// Logger for one render invocation.
///
/// Every line carries the render id and the operation, so interleaved
/// output from concurrent scene tasks can be told apart.
#[derive(Debug, Clone)]
pub struct RenderLogger {
    render_id: String,
    operation: String,
}

impl RenderLogger {
    pub fn new(render_id: impl Into<String>, operation: &str) -> Self {
        Self {
            render_id: render_id.into(),
            operation: operation.to_string(),
        }
    }

    /// Same render, different operation.
    pub fn child(&self, operation: &str) -> Self {
        Self::new(self.render_id.clone(), operation)
    }

    pub fn log_start(&self, message: &str) {
        info!(
            render_id = %self.render_id,
            operation = %self.operation,
            "Render started: {}", message
        );
    }

    pub fn log_progress(&self, message: &str) {
        info!(
            render_id = %self.render_id,
            operation = %self.operation,
            "Render progress: {}", message
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            render_id = %self.render_id,
            operation = %self.operation,
            "Render warning: {}", message
        );
    }

    pub fn log_error(&self, message: &str) {
        error!(
            render_id = %self.render_id,
            operation = %self.operation,
            "Render error: {}", message
        );
    }

    pub fn log_completion(&self, message: &str) {
        info!(
            render_id = %self.render_id,
            operation = %self.operation,
            "Render completed: {}", message
        );
    }

    pub fn render_id(&self) -> &str {
        &self.render_id
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Span carrying the render id and operation.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "render",
            render_id = %self.render_id,
            operation = %self.operation
        )
    }
}
