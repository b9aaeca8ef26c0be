//! Task domain model.
//!
//! The daily planner emits [`TaskRaw`] values; the prerequisite resolver
//! rewrites them into an ordered queue of [`ResolvedTask`]s. Resolved tasks
//! are exclusively owned by the executor from pop to completion, and
//! completion or skip is terminal: nothing re-enters the queue within a day.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::models::snapshot::Position;

/// Identifier shared between raw tasks, resolved tasks, and plan records.
pub type TaskId = Uuid;

/// What kind of work a task represents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskKind {
    /// Water every unwatered crop
    WaterCrops,
    /// Harvest every ready crop
    HarvestCrops,
    /// Put sellable inventory in the shipping bin
    ShipItems,
    /// Plant seeds on tilled-empty tiles
    PlantSeeds,
    /// Buy seeds at the shop
    BuySeeds {
        /// Seed species to buy
        species: String,
        /// How many
        quantity: u32,
    },
    /// Clear debris from the active plot
    ClearDebris,
    /// Hoe tiles in the active plot
    TillSoil,
    /// Top up the watering can at the nearest water tile
    RefillWateringCan,
    /// Travel to a named location
    NavigateTo {
        /// Location table key
        location: String,
    },
    /// End the day
    GoToBed,
}

impl TaskKind {
    /// The per-target skill this task drives, when it has one.
    ///
    /// Navigation-style tasks have a single destination instead and return
    /// the movement skill.
    pub const fn skill_name(&self) -> &'static str {
        match self {
            Self::WaterCrops => "water_crop",
            Self::HarvestCrops => "harvest_crop",
            Self::ShipItems => "ship_item",
            Self::PlantSeeds => "plant_seed",
            Self::BuySeeds { .. } => "buy_seeds",
            Self::ClearDebris => "clear_debris",
            Self::TillSoil => "till_soil",
            Self::RefillWateringCan => "refill_watering_can",
            Self::NavigateTo { .. } => "warp_to",
            Self::GoToBed => "go_to_bed",
        }
    }

    /// Location this task must run in, when it is location-bound.
    pub fn required_location(&self) -> Option<&str> {
        match self {
            Self::WaterCrops
            | Self::HarvestCrops
            | Self::ShipItems
            | Self::PlantSeeds
            | Self::ClearDebris
            | Self::TillSoil
            | Self::RefillWateringCan => Some(crate::domain::models::locations::FARM),
            Self::BuySeeds { .. } => Some(crate::domain::models::locations::SEED_SHOP),
            Self::NavigateTo { .. } | Self::GoToBed => None,
        }
    }

    /// Short label for telemetry and plan tables.
    pub fn label(&self) -> String {
        match self {
            Self::WaterCrops => "water crops".to_string(),
            Self::HarvestCrops => "harvest crops".to_string(),
            Self::ShipItems => "ship items".to_string(),
            Self::PlantSeeds => "plant seeds".to_string(),
            Self::BuySeeds { species, quantity } => format!("buy {quantity}x {species} seeds"),
            Self::ClearDebris => "clear debris".to_string(),
            Self::TillSoil => "till soil".to_string(),
            Self::RefillWateringCan => "refill watering can".to_string(),
            Self::NavigateTo { location } => format!("go to {location}"),
            Self::GoToBed => "go to bed".to_string(),
        }
    }
}

/// Priority level for daily tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    /// Nice to have
    Low = 1,
    /// Normal routine work
    Medium = 2,
    /// Should happen today
    High = 3,
    /// Day fails without it
    Critical = 4,
}

impl TaskPriority {
    /// Lowercase name for display.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    /// Priorities worth carrying over to the next day when unfinished.
    pub const fn carries_over(&self) -> bool {
        matches!(self, Self::Critical | Self::High)
    }
}

/// Daily planner output, before prerequisite resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRaw {
    /// Stable identifier
    pub id: TaskId,
    /// Work classification
    pub kind: TaskKind,
    /// Human-readable intent
    pub description: String,
    /// Rough tick budget for plan display
    pub estimated_ticks: u32,
    /// Scheduling priority
    pub priority: TaskPriority,
    /// When set, the executor delegates the whole task to this batch skill
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skill_override: Option<String>,
}

impl TaskRaw {
    /// Build a raw task with a fresh id.
    pub fn new(kind: TaskKind, priority: TaskPriority, estimated_ticks: u32) -> Self {
        let description = kind.label();
        Self {
            id: Uuid::new_v4(),
            kind,
            description,
            estimated_ticks,
            priority,
            skill_override: None,
        }
    }

    /// Attach a batch skill override.
    #[must_use]
    pub fn with_skill_override(mut self, skill: impl Into<String>) -> Self {
        self.skill_override = Some(skill.into());
        self
    }
}

/// Why a task or target was skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Pathfinding found no route
    Unreachable,
    /// The shop's hour/day window is closed
    ShopClosed,
    /// Not enough money for the cheapest option
    InsufficientMoney,
    /// Nothing sellable that is not reserved
    NothingToSell,
    /// No refillable water tile found
    NoWaterSource,
    /// Obstacle needs an upgraded tool
    RequiresToolUpgrade,
    /// Bridge kept claiming success without world change
    PhantomFailure,
    /// Position froze past the stuck threshold
    Stuck,
    /// Per-target failure threshold reached
    RepeatedFailure,
    /// Free-form reason from a precondition or override
    Other(String),
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unreachable => f.write_str("unreachable"),
            Self::ShopClosed => f.write_str("shop closed"),
            Self::InsufficientMoney => f.write_str("insufficient money"),
            Self::NothingToSell => f.write_str("nothing to sell"),
            Self::NoWaterSource => f.write_str("no water source"),
            Self::RequiresToolUpgrade => f.write_str("requires upgraded tool"),
            Self::PhantomFailure => f.write_str("phantom failure"),
            Self::Stuck => f.write_str("stuck"),
            Self::RepeatedFailure => f.write_str("repeated failure"),
            Self::Other(reason) => f.write_str(reason),
        }
    }
}

/// Output of the prerequisite resolver: one queue slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedTask {
    /// Identifier of this queue entry
    pub id: TaskId,
    /// The raw task this entry serves (enabling sub-tasks share their
    /// parent's id here)
    pub parent: TaskId,
    /// Work classification
    pub kind: TaskKind,
    /// Human-readable intent
    pub description: String,
    /// Fixed destination for navigation-style entries
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<Position>,
    /// Strict position in the day's queue
    pub ordinal: usize,
    /// Batch skill override inherited from the raw task
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skill_override: Option<String>,
    /// Priority inherited from the raw task
    pub priority: TaskPriority,
}

/// Terminal record of one finished queue entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRecord {
    /// Queue entry id
    pub task_id: TaskId,
    /// What it was
    pub description: String,
    /// Game clock when it finished
    pub finished_at: u32,
    /// Priority of the queue entry
    pub priority: TaskPriority,
    /// Targets that verified
    pub verified: u32,
    /// Targets that went to the skip-set
    pub skipped: u32,
    /// Skip reason when the whole task was skipped rather than completed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<SkipReason>,
}

/// The day's resolved queue plus its terminal records.
///
/// Monotone by construction: entries leave via [`Self::pop`] and come back
/// only as completion records. The only permitted append after resolution
/// is the terminal go-to-bed task.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResolvedQueue {
    /// Remaining entries, in execution order
    pub pending: std::collections::VecDeque<ResolvedTask>,
    /// Chains the resolver dropped, with reasons
    pub dropped: Vec<(String, SkipReason)>,
    /// Finished entries
    pub records: Vec<CompletionRecord>,
}

impl ResolvedQueue {
    /// Take the next task; the caller owns it until it reports back.
    pub fn pop(&mut self) -> Option<ResolvedTask> {
        self.pending.pop_front()
    }

    /// Append the terminal bed task. The queue is otherwise immutable for
    /// the day.
    pub fn append_terminal(&mut self, task: ResolvedTask) {
        self.pending.push_back(task);
    }

    /// Record a terminal outcome for a popped task.
    pub fn record(&mut self, record: CompletionRecord) {
        self.records.push(record);
    }

    /// Whether any critical-priority entry was skipped.
    pub fn critical_skip_recorded(&self) -> bool {
        self.records
            .iter()
            .any(|r| r.skip_reason.is_some() && r.priority == TaskPriority::Critical)
    }

    /// Count of entries not yet popped.
    pub fn remaining(&self) -> usize {
        self.pending.len()
    }
}

/// Everything persisted about one day, for the external dashboard and the
/// next day's carryover pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayPlan {
    /// Day counter the plan belongs to
    pub day_of_year: u32,
    /// Wall-clock moment the plan was produced
    pub planned_at: chrono::DateTime<chrono::Utc>,
    /// Raw planner output
    pub raw: Vec<TaskRaw>,
    /// Resolver output at plan time
    pub resolved: Vec<ResolvedTask>,
    /// Chains the resolver dropped
    pub dropped: Vec<(String, SkipReason)>,
    /// Terminal records accumulated through the day
    pub records: Vec<CompletionRecord>,
}
