//! Lessons: persisted observations that outlive a session.
//!
//! The core appends; external memory stores read. The phantom tracker is
//! the per-skill escalating counter that turns repeated phantom failures
//! into a hard fail plus a lesson.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::models::snapshot::Position;

/// Classification of a persisted observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LessonKind {
    /// Bridge reported success repeatedly with no world change
    PhantomFail,
    /// Pathfinding could not reach a target
    Unreachable,
    /// An obstacle needs a tool upgrade we do not have
    RequiresToolUpgrade,
    /// Position froze while executing
    Stuck,
}

/// One appended observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lesson {
    /// Wall-clock moment of the observation
    pub timestamp: DateTime<Utc>,
    /// Classification
    pub kind: LessonKind,
    /// Free-form context (skill, tile, blocker name)
    pub context: String,
}

impl Lesson {
    /// Build a lesson stamped now.
    pub fn now(kind: LessonKind, context: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            kind,
            context: context.into(),
        }
    }
}

/// Per-skill consecutive phantom-failure counter.
///
/// Reset on any verified success of the same skill; at the threshold the
/// caller hard-fails the skill and records a lesson.
#[derive(Debug, Clone, Default)]
pub struct PhantomTracker {
    counts: HashMap<String, u32>,
    last_target: HashMap<String, Position>,
}

impl PhantomTracker {
    /// Record a phantom failure; returns the new consecutive count.
    pub fn record(&mut self, skill: &str, target: Option<Position>) -> u32 {
        let count = self.counts.entry(skill.to_string()).or_insert(0);
        *count += 1;
        if let Some(t) = target {
            self.last_target.insert(skill.to_string(), t);
        }
        *count
    }

    /// Reset a skill's counter after a verified success.
    pub fn reset(&mut self, skill: &str) {
        self.counts.remove(skill);
        self.last_target.remove(skill);
    }

    /// Current consecutive count for a skill.
    pub fn count(&self, skill: &str) -> u32 {
        self.counts.get(skill).copied().unwrap_or(0)
    }

    /// The most recent target the skill phantom-failed on.
    pub fn last_target(&self, skill: &str) -> Option<Position> {
        self.last_target.get(skill).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phantom_escalates_and_resets() {
        let mut tracker = PhantomTracker::default();
        assert_eq!(tracker.record("water_crop", Some(Position::new(60, 18))), 1);
        assert_eq!(tracker.record("water_crop", Some(Position::new(60, 19))), 2);
        assert_eq!(tracker.count("water_crop"), 2);
        assert_eq!(
            tracker.last_target("water_crop"),
            Some(Position::new(60, 19))
        );

        tracker.reset("water_crop");
        assert_eq!(tracker.count("water_crop"), 0);
        assert_eq!(tracker.last_target("water_crop"), None);
    }

    #[test]
    fn test_counters_are_per_skill() {
        let mut tracker = PhantomTracker::default();
        tracker.record("water_crop", None);
        tracker.record("till_soil", None);
        tracker.record("till_soil", None);
        assert_eq!(tracker.count("water_crop"), 1);
        assert_eq!(tracker.count("till_soil"), 2);
    }

    #[test]
    fn test_lesson_serialization_kind_names() {
        let lesson = Lesson::now(LessonKind::PhantomFail, "water_crop at (60, 18)");
        let json = serde_json::to_value(&lesson).unwrap();
        assert_eq!(json["kind"], "phantom-fail");
    }
}
