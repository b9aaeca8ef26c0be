//! File-backed persistence: per-day plan files, the append-only lesson
//! log, the carryover file, and the JSONL telemetry sink the external
//! dashboard tails.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::domain::models::config::PathsConfig;
use crate::domain::models::lesson::Lesson;
use crate::domain::models::task::{DayPlan, TaskRaw};
use crate::domain::ports::stores::{LessonStore, PlanStore, StoreError};
use crate::domain::ports::telemetry::{TelemetrySink, TickEvent};

/// JSON plan files under `<state_dir>/plans/day_<n>.json`, plus the
/// carryover file.
pub struct JsonPlanStore {
    plans_dir: PathBuf,
    carryover_path: PathBuf,
}

impl JsonPlanStore {
    /// Store rooted at the configured state directory.
    pub fn new(paths: &PathsConfig) -> Self {
        Self {
            plans_dir: paths.plans_path(),
            carryover_path: paths.carryover_path(),
        }
    }

    fn plan_path(&self, day: u32) -> PathBuf {
        self.plans_dir.join(format!("day_{day:03}.json"))
    }
}

#[async_trait]
impl PlanStore for JsonPlanStore {
    async fn save_plan(&self, plan: &DayPlan) -> Result<(), StoreError> {
        fs::create_dir_all(&self.plans_dir).await?;
        let json = serde_json::to_string_pretty(plan)?;
        fs::write(self.plan_path(plan.day_of_year), json).await?;
        debug!(day = plan.day_of_year, "plan saved");
        Ok(())
    }

    async fn load_carryover(&self) -> Result<Vec<TaskRaw>, StoreError> {
        match fs::read_to_string(&self.carryover_path).await {
            Ok(json) => Ok(serde_json::from_str(&json)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn save_carryover(&self, tasks: &[TaskRaw]) -> Result<(), StoreError> {
        if let Some(parent) = self.carryover_path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(tasks)?;
        fs::write(&self.carryover_path, json).await?;
        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        match fs::remove_file(&self.carryover_path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        match fs::remove_dir_all(&self.plans_dir).await {
            Ok(()) => info!("plan files cleared"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }
}

/// Append-only JSONL lesson log.
pub struct JsonlLessonStore {
    path: PathBuf,
}

impl JsonlLessonStore {
    /// Store at the configured lessons path.
    pub fn new(paths: &PathsConfig) -> Self {
        Self {
            path: paths.lessons_path(),
        }
    }
}

#[async_trait]
impl LessonStore for JsonlLessonStore {
    async fn append(&self, lesson: &Lesson) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let mut line = serde_json::to_string(lesson)?;
        line.push('\n');
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        Ok(())
    }
}

/// Telemetry sink appending JSONL events for the dashboard to tail.
pub struct JsonlTelemetry {
    path: PathBuf,
}

impl JsonlTelemetry {
    /// Sink at the configured telemetry path.
    pub fn new(paths: &PathsConfig) -> Self {
        Self {
            path: paths.telemetry_path(),
        }
    }

    async fn append(&self, line: String) {
        if let Some(parent) = self.path.parent() {
            let _ = fs::create_dir_all(parent).await;
        }
        if let Ok(mut file) = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
        {
            let _ = file.write_all(line.as_bytes()).await;
        }
    }
}

#[async_trait]
impl TelemetrySink for JsonlTelemetry {
    async fn record_tick(&self, event: &TickEvent) {
        if let Ok(mut line) = serde_json::to_string(event) {
            line.push('\n');
            self.append(line).await;
        }
    }

    async fn publish_plan(&self, plan: &DayPlan) {
        if let Ok(json) = serde_json::to_string(plan) {
            self.append(format!("{{\"plan\": {json}}}\n")).await;
        }
    }
}

/// Default sink: events become structured tracing output.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingTelemetry;

#[async_trait]
impl TelemetrySink for TracingTelemetry {
    async fn record_tick(&self, event: &TickEvent) {
        tracing::info!(
            tick = event.tick,
            game_time = event.game_time,
            proposed = event.proposed.as_deref().unwrap_or("-"),
            chosen = event.chosen.as_deref().unwrap_or("-"),
            outcome = ?event.outcome,
            reason = event.reason.as_deref().unwrap_or(""),
            "tick"
        );
    }

    async fn publish_plan(&self, plan: &DayPlan) {
        tracing::info!(
            day = plan.day_of_year,
            queued = plan.resolved.len(),
            dropped = plan.dropped.len(),
            "plan published"
        );
    }
}
