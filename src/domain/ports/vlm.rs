//! Vision-language model port.
//!
//! The core assumes nothing about the model beyond: it accepts an image
//! plus a text prompt and returns text with a JSON object somewhere in it.
//! Extraction and repair of that JSON live in the decision service, not
//! here.

use async_trait::async_trait;

use crate::domain::error::VlmError;

/// Port trait for the perception/reasoning model.
#[async_trait]
pub trait VisionModel: Send + Sync {
    /// Ask the model for a decision. `screenshot` is raw PNG bytes when a
    /// capture source is wired, None otherwise.
    async fn decide(&self, prompt: &str, screenshot: Option<&[u8]>) -> Result<String, VlmError>;
}

/// Port trait for on-demand screenshot capture.
///
/// Screenshots are scoped to a single VLM call; nothing in the core holds
/// image buffers across ticks.
#[async_trait]
pub trait ScreenshotSource: Send + Sync {
    /// Capture the current frame as PNG bytes; None when capture is
    /// unavailable (the VLM then works from the text summary alone).
    async fn capture(&self) -> Option<Vec<u8>>;
}

/// Capture source for headless runs: never produces a frame.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullScreenshotSource;

#[async_trait]
impl ScreenshotSource for NullScreenshotSource {
    async fn capture(&self) -> Option<Vec<u8>> {
        None
    }
}
