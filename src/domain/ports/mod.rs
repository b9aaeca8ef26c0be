//! Port traits: the seams between the control core and its collaborators.
//!
//! The game bridge, the VLM, telemetry readers, and persistence are all
//! external; the core only ever sees these traits. Implementations must be
//! `Send + Sync` for use across await points.

pub mod bridge;
pub mod stores;
pub mod telemetry;
pub mod vlm;

pub use bridge::{ActionResponse, ActionState, GameBridge, PathCheck};
pub use stores::{
    InMemoryLessonStore, InMemoryPlanStore, LessonStore, NoReservations, PlanStore, ReservedItems,
    StoreError,
};
pub use telemetry::{NullTelemetry, TelemetrySink, TickEvent, TickOutcome};
pub use vlm::{NullScreenshotSource, ScreenshotSource, VisionModel};
