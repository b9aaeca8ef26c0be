//! Domain models
//!
//! Pure domain entities with business logic and validation rules.
//! These models are framework-agnostic and contain no infrastructure concerns.

pub mod action;
pub mod config;
pub mod farm;
pub mod lesson;
pub mod locations;
pub mod skill;
pub mod snapshot;
pub mod target;
pub mod task;

pub use action::{ChosenAction, PrimitiveAction, VlmAction, VlmDecision};
pub use config::{
    AgentConfig, BridgeConfig, Config, LoggingConfig, PathsConfig, VlmConfig,
};
pub use farm::{Crop, DebrisKind, FarmObject, FarmSnapshot, PlotBounds, ResourceClump};
pub use lesson::{Lesson, LessonKind, PhantomTracker};
pub use locations::{LocationInfo, location, FARM, FARMHOUSE, SEED_SHOP};
pub use skill::{
    FailureKind, Precondition, PrimitiveTemplate, RecoveryHint, SkillCategory, SkillContext,
    SkillDef, SkillOutcome, SuccessCriterion, ToolKind,
};
pub use snapshot::{
    AdjacentTile, Facing, InventoryItem, ItemKind, Position, Season, Surroundings, TileKind,
    Weather, WorldSnapshot,
};
pub use target::{Target, TargetCursor};
pub use task::{
    CompletionRecord, DayPlan, ResolvedQueue, ResolvedTask, SkipReason, TaskId, TaskKind,
    TaskPriority, TaskRaw,
};
