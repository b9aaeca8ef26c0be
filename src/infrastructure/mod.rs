//! Infrastructure adapters: HTTP clients, persistence, config, logging.

pub mod bridge;
pub mod config;
pub mod logging;
pub mod persistence;
pub mod vlm;

pub use bridge::HttpGameBridge;
pub use config::ConfigLoader;
pub use persistence::{JsonPlanStore, JsonlLessonStore, JsonlTelemetry, TracingTelemetry};
pub use vlm::HttpVisionModel;
