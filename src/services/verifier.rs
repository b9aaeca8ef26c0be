//! State-change verification.
//!
//! A pure query layer: given a pre-action view and a post-action view of
//! the world, decide whether the mutation a skill declared actually
//! happened. The skill engine is responsible for taking the post view
//! only after the bridge's cache-refresh interval has elapsed; nothing
//! here trusts cached data.

use crate::domain::models::farm::FarmSnapshot;
use crate::domain::models::skill::{SkillContext, SuccessCriterion};
use crate::domain::models::snapshot::{Facing, Position, WorldSnapshot};

/// One consistent view of the world: player-centric snapshot plus the
/// farm-wide snapshot taken in the same breath.
#[derive(Debug, Clone, Copy)]
pub struct WorldView<'a> {
    /// Player-centric state
    pub world: &'a WorldSnapshot,
    /// Farm-wide state
    pub farm: &'a FarmSnapshot,
}

impl<'a> WorldView<'a> {
    /// Pair the two snapshots.
    pub const fn new(world: &'a WorldSnapshot, farm: &'a FarmSnapshot) -> Self {
        Self { world, farm }
    }

    fn stack_total(&self, name_fragment: &str) -> i64 {
        self.world
            .inventory
            .iter()
            .filter(|i| i.name_matches(name_fragment))
            .map(|i| i64::from(i.stack))
            .sum()
    }
}

/// Compares pre- and post-action views against declared success criteria.
#[derive(Debug, Clone, Copy, Default)]
pub struct StateVerifier;

impl StateVerifier {
    /// Whether every criterion holds.
    ///
    /// An empty criteria list verifies trivially: some skills (weapon
    /// swings, ladder use) declare no world mutation.
    pub fn verify(
        criteria: &[SuccessCriterion],
        ctx: &SkillContext,
        pre: WorldView<'_>,
        post: WorldView<'_>,
    ) -> bool {
        criteria.iter().all(|c| Self::check(c, ctx, pre, post))
    }

    /// Whether a single criterion holds.
    pub fn check(
        criterion: &SuccessCriterion,
        ctx: &SkillContext,
        pre: WorldView<'_>,
        post: WorldView<'_>,
    ) -> bool {
        match criterion {
            SuccessCriterion::Tilled => Self::check_tilled(ctx.target, pre, post),
            SuccessCriterion::Planted => Self::check_planted(ctx.target, pre, post),
            SuccessCriterion::Watered => Self::check_watered(ctx.target, post),
            SuccessCriterion::Harvested => Self::check_harvested(ctx.target, pre, post),
            SuccessCriterion::Cleared => Self::check_cleared(ctx.target, pre, post),
            SuccessCriterion::InventoryDelta { item, delta } => {
                Self::check_delta(item, *delta, pre, post)
            }
            SuccessCriterion::ContextItemDelta { delta } => ctx
                .item
                .as_deref()
                .is_some_and(|item| Self::check_delta(item, *delta, pre, post)),
            SuccessCriterion::LocationIs { location } => post.world.location == *location,
            SuccessCriterion::ContextLocation => ctx
                .location
                .as_deref()
                .is_some_and(|l| post.world.location == l),
            SuccessCriterion::AdjacentToTarget => Self::check_adjacent(ctx.target, post),
            SuccessCriterion::CanRefilled => Self::check_refilled(pre, post),
            SuccessCriterion::MenuClosed => !post.world.menu_open,
        }
    }

    fn check_tilled(target: Option<Position>, pre: WorldView<'_>, post: WorldView<'_>) -> bool {
        let Some(t) = target else { return false };
        if !post.farm.is_tilled(t) {
            return false;
        }
        // newly tilled, or the tile was tilled and a crop appeared on it
        !pre.farm.is_tilled(t)
            || (pre.farm.crop_at(t).is_none() && post.farm.crop_at(t).is_some())
    }

    fn check_planted(target: Option<Position>, pre: WorldView<'_>, post: WorldView<'_>) -> bool {
        let Some(t) = target else { return false };
        pre.farm.crop_at(t).is_none() && post.farm.crop_at(t).is_some()
    }

    // Idempotent on purpose: watering an already-watered crop verifies
    // without toggling anything.
    fn check_watered(target: Option<Position>, post: WorldView<'_>) -> bool {
        let Some(t) = target else { return false };
        post.farm.crop_at(t).is_some_and(|c| c.watered)
    }

    fn check_harvested(target: Option<Position>, pre: WorldView<'_>, post: WorldView<'_>) -> bool {
        let Some(t) = target else { return false };
        let Some(crop) = pre.farm.crop_at(t) else {
            return false;
        };
        post.farm.crop_at(t).is_none()
            && post.stack_total(&crop.species) > pre.stack_total(&crop.species)
    }

    fn check_cleared(target: Option<Position>, pre: WorldView<'_>, post: WorldView<'_>) -> bool {
        let Some(t) = target else { return false };
        pre.farm.object_at(t).is_some() && post.farm.object_at(t).is_none()
    }

    fn check_delta(item: &str, delta: i64, pre: WorldView<'_>, post: WorldView<'_>) -> bool {
        let change = post.stack_total(item) - pre.stack_total(item);
        if delta >= 0 {
            change >= delta
        } else {
            change <= delta
        }
    }

    fn check_adjacent(target: Option<Position>, post: WorldView<'_>) -> bool {
        let Some(t) = target else { return false };
        let player = post.world.player_tile;
        player.is_adjacent(t) && Facing::between(player, t) == Some(post.world.facing)
    }

    fn check_refilled(pre: WorldView<'_>, post: WorldView<'_>) -> bool {
        let pre_level = pre.world.water_level();
        let post_can = post
            .world
            .find_tool(crate::domain::models::skill::ToolKind::WateringCan);
        match (pre_level, post_can) {
            (Some(before), Some(can)) => {
                let after = can.water_level.unwrap_or(0);
                after > before || can.water_capacity.is_some_and(|cap| after >= cap)
            }
            _ => false,
        }
    }
}
