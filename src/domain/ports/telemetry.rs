//! Telemetry port.
//!
//! The dashboard and other observers are read-only consumers of events
//! published by the loop; the core never reads anything back.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::models::task::DayPlan;

/// Outcome of one tick, as seen from the outside.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TickOutcome {
    /// An action was dispatched and verified
    Verified,
    /// Dispatched; bridge succeeded but the world did not change
    PhantomFailed,
    /// Dispatched and failed
    Failed,
    /// An override blocked the action; nothing was dispatched
    Blocked,
    /// Dispatched, verification not applicable (movement, menu ops)
    Dispatched,
    /// Nothing happened (parse failure, empty proposal)
    NoOp,
    /// Observe-only mode: the action was chosen but withheld
    Observed,
}

/// One loop iteration, flattened for the event stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickEvent {
    /// Monotonic tick counter
    pub tick: u64,
    /// Wall-clock moment
    pub timestamp: DateTime<Utc>,
    /// Game clock
    pub game_time: u32,
    /// Game day
    pub day_of_year: u32,
    /// What the VLM or executor proposed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proposed: Option<String>,
    /// What survived the override chain
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chosen: Option<String>,
    /// How the tick ended
    pub outcome: TickOutcome,
    /// Override or failure reason, when one applies
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Port trait for the event stream.
#[async_trait]
pub trait TelemetrySink: Send + Sync {
    /// Record one tick event.
    async fn record_tick(&self, event: &TickEvent);

    /// Publish the current plan/queue snapshot.
    async fn publish_plan(&self, plan: &DayPlan);
}

/// Sink that drops everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullTelemetry;

#[async_trait]
impl TelemetrySink for NullTelemetry {
    async fn record_tick(&self, _event: &TickEvent) {}

    async fn publish_plan(&self, _plan: &DayPlan) {}
}
