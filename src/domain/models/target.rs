//! Spatial targets and the cursor that walks them.
//!
//! A target pairs the tile a skill acts on with the tile the player must
//! stand on and the facing between them. The cursor owns per-target retry
//! state and the task-scoped skip-set; a skipped tile is never revisited
//! within the same task.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::domain::models::snapshot::{Facing, Position};

/// One actionable tile plus the standing position that reaches it.
///
/// The actionable tile is always adjacent to the standing tile, never
/// under it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    /// Tile the skill acts on
    pub tile: Position,
    /// Tile the player stands on
    pub stand: Position,
    /// Direction from `stand` to `tile`
    pub facing: Facing,
}

impl Target {
    /// Build a target standing one step on the given side of the tile.
    ///
    /// `approach_from` is the side the player occupies; the facing points
    /// back at the tile.
    pub fn standing(tile: Position, approach_from: Facing) -> Self {
        Self {
            tile,
            stand: tile.step(approach_from),
            facing: approach_from.opposite(),
        }
    }
}

/// Cursor over a task's ordered target list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TargetCursor {
    targets: Vec<Target>,
    index: usize,
    /// Consecutive failures on the current target
    failures: u32,
    skip_set: HashSet<Position>,
    verified: u32,
    skipped: u32,
}

impl TargetCursor {
    /// Wrap an ordered target list.
    pub fn new(targets: Vec<Target>) -> Self {
        Self {
            targets,
            ..Self::default()
        }
    }

    /// The current target, skipping over tiles already in the skip-set.
    pub fn current(&mut self) -> Option<Target> {
        while let Some(t) = self.targets.get(self.index) {
            if self.skip_set.contains(&t.tile) {
                self.index += 1;
                self.failures = 0;
            } else {
                return Some(*t);
            }
        }
        None
    }

    /// Whether every target has been consumed.
    pub fn is_exhausted(&mut self) -> bool {
        self.current().is_none()
    }

    /// Mark the current target verified and move on.
    pub fn mark_verified(&mut self) {
        self.verified += 1;
        self.failures = 0;
        self.index += 1;
    }

    /// Record one failure on the current target; returns the new count.
    pub fn record_failure(&mut self) -> u32 {
        self.failures += 1;
        self.failures
    }

    /// Push the current target to the skip-set and move on.
    pub fn skip_current(&mut self) {
        if let Some(t) = self.targets.get(self.index) {
            self.skip_set.insert(t.tile);
            self.skipped += 1;
        }
        self.failures = 0;
        self.index += 1;
    }

    /// Whether a tile is in the skip-set.
    pub fn is_skipped(&self, tile: Position) -> bool {
        self.skip_set.contains(&tile)
    }

    /// Targets verified so far.
    pub const fn verified_count(&self) -> u32 {
        self.verified
    }

    /// Targets pushed to the skip-set so far.
    pub const fn skipped_count(&self) -> u32 {
        self.skipped
    }

    /// Total targets the cursor started with.
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// Whether the cursor started empty.
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}
