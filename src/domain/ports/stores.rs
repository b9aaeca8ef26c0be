//! Persistence ports: plan files, the lesson log, and the reserved-items
//! policy.
//!
//! The core writes; external readers (dashboard, memory stores) consume
//! the files. The reserved-items set is supplied by an external
//! collaborator and treated as opaque here.

use std::sync::Mutex;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::models::lesson::Lesson;
use crate::domain::models::task::{DayPlan, TaskRaw};

/// Errors from persistence adapters.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Filesystem trouble
    #[error("Store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// Encoding or decoding failed
    #[error("Store serialization failed: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Port trait for the per-day plan file and the carryover file.
#[async_trait]
pub trait PlanStore: Send + Sync {
    /// Persist the day's plan, overwriting any previous snapshot of it.
    async fn save_plan(&self, plan: &DayPlan) -> Result<(), StoreError>;

    /// Load tasks carried over from the previous day.
    async fn load_carryover(&self) -> Result<Vec<TaskRaw>, StoreError>;

    /// Replace the carryover file.
    async fn save_carryover(&self, tasks: &[TaskRaw]) -> Result<(), StoreError>;

    /// Delete today's plan and the carryover file.
    async fn clear(&self) -> Result<(), StoreError>;
}

/// Port trait for the append-only lesson log.
#[async_trait]
pub trait LessonStore: Send + Sync {
    /// Append one lesson.
    async fn append(&self, lesson: &Lesson) -> Result<(), StoreError>;
}

/// Reserved-items policy for smart selling.
///
/// Bundles, gifts, and anything else the player wants kept are supplied
/// externally; the resolver only asks membership questions.
pub trait ReservedItems: Send + Sync {
    /// Whether an item must not be shipped.
    fn is_reserved(&self, item_name: &str) -> bool;
}

/// Default policy: nothing is reserved.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoReservations;

impl ReservedItems for NoReservations {
    fn is_reserved(&self, _item_name: &str) -> bool {
        false
    }
}

/// In-memory plan store for tests and observe-only runs.
#[derive(Debug, Default)]
pub struct InMemoryPlanStore {
    plans: Mutex<Vec<DayPlan>>,
    carryover: Mutex<Vec<TaskRaw>>,
}

impl InMemoryPlanStore {
    /// Plans saved so far, newest last.
    pub fn plans(&self) -> Vec<DayPlan> {
        self.plans.lock().expect("plan store poisoned").clone()
    }
}

#[async_trait]
impl PlanStore for InMemoryPlanStore {
    async fn save_plan(&self, plan: &DayPlan) -> Result<(), StoreError> {
        let mut plans = self.plans.lock().expect("plan store poisoned");
        plans.retain(|p| p.day_of_year != plan.day_of_year);
        plans.push(plan.clone());
        Ok(())
    }

    async fn load_carryover(&self) -> Result<Vec<TaskRaw>, StoreError> {
        Ok(self.carryover.lock().expect("plan store poisoned").clone())
    }

    async fn save_carryover(&self, tasks: &[TaskRaw]) -> Result<(), StoreError> {
        *self.carryover.lock().expect("plan store poisoned") = tasks.to_vec();
        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        self.plans.lock().expect("plan store poisoned").clear();
        self.carryover.lock().expect("plan store poisoned").clear();
        Ok(())
    }
}

/// In-memory lesson store for tests.
#[derive(Debug, Default)]
pub struct InMemoryLessonStore {
    lessons: Mutex<Vec<Lesson>>,
}

impl InMemoryLessonStore {
    /// Lessons appended so far.
    pub fn lessons(&self) -> Vec<Lesson> {
        self.lessons.lock().expect("lesson store poisoned").clone()
    }
}

#[async_trait]
impl LessonStore for InMemoryLessonStore {
    async fn append(&self, lesson: &Lesson) -> Result<(), StoreError> {
        self.lessons
            .lock()
            .expect("lesson store poisoned")
            .push(lesson.clone());
        Ok(())
    }
}
