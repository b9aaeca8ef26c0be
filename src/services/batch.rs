//! Batch skills: uniform phases drained without the VLM.
//!
//! When a resolved task carries a `skill_override`, the executor hands the
//! whole task to one of these routines. A batch runner generates its own
//! target list (often denser than the per-task generator), loops the skill
//! engine directly with a short pace between primitives, and returns only
//! when the phase is complete or uniformly blocked. Safety thresholds
//! (low energy, late night) make it yield back to the override chain.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::domain::error::BridgeError;
use crate::domain::models::action::PrimitiveAction;
use crate::domain::models::config::AgentConfig;
use crate::domain::models::farm::FarmSnapshot;
use crate::domain::models::skill::{SkillContext, SkillOutcome};
use crate::domain::models::snapshot::{ItemKind, Position, WorldSnapshot};
use crate::domain::models::target::Target;
use crate::domain::models::task::TaskKind;
use crate::domain::ports::bridge::GameBridge;
use crate::services::skill_engine::SkillEngine;

/// How a batch run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchStatus {
    /// Every phase ran to completion (targets done or skipped)
    Completed,
    /// A safety threshold fired; the loop should let the override chain
    /// decide, then resume the runner next tick
    Yielded {
        /// What tripped
        reason: String,
    },
    /// Nothing in the remaining phases could make progress
    UniformlyBlocked,
}

/// Named batch routines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BatchKind {
    FarmChores,
    GatherWood,
    MineSession,
    OrganizeInventory,
}

impl BatchKind {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "auto_farm_chores" => Some(Self::FarmChores),
            "batch_gather_wood" => Some(Self::GatherWood),
            "batch_mine_session" => Some(Self::MineSession),
            "batch_organize_inventory" => Some(Self::OrganizeInventory),
            _ => None,
        }
    }
}

/// Phases of `auto_farm_chores`, in execution order.
const CHORE_PHASES: [TaskKind; 5] = [
    TaskKind::HarvestCrops,
    TaskKind::ShipItems,
    TaskKind::WaterCrops,
    TaskKind::TillSoil,
    TaskKind::PlantSeeds,
];

/// One resumable batch execution.
pub struct BatchRunner {
    kind: BatchKind,
    config: AgentConfig,
    /// Resume point inside the phase list
    phase_idx: usize,
    /// Primitives-level steps executed so far (commentary cadence input)
    steps: u32,
    /// Pace between engine invocations; zero in tests
    pace: Duration,
}

impl BatchRunner {
    /// Build a runner for a `skill_override` name, if it names a batch
    /// skill.
    pub fn for_override(name: &str, config: AgentConfig) -> Option<Self> {
        let kind = BatchKind::parse(name)?;
        Some(Self {
            kind,
            config,
            phase_idx: 0,
            steps: 0,
            pace: Duration::from_millis(400),
        })
    }

    /// Runner that never sleeps, for tests.
    pub fn unpaced(name: &str, config: AgentConfig) -> Option<Self> {
        let mut runner = Self::for_override(name, config)?;
        runner.pace = Duration::ZERO;
        Some(runner)
    }

    /// Steps executed so far; the loop uses this for commentary cadence.
    pub const fn steps(&self) -> u32 {
        self.steps
    }

    /// Drain the batch. Resumable: after a yield, calling again continues
    /// at the interrupted phase.
    pub async fn run(
        &mut self,
        bridge: &dyn GameBridge,
        engine: &SkillEngine,
    ) -> Result<BatchStatus, BridgeError> {
        match self.kind {
            BatchKind::FarmChores => self.run_farm_chores(bridge, engine).await,
            BatchKind::GatherWood => self.run_gather_wood(bridge, engine).await,
            BatchKind::MineSession => self.run_mine_session(bridge, engine).await,
            BatchKind::OrganizeInventory => self.run_organize(bridge, engine).await,
        }
    }

    /// harvest -> ship -> water -> till -> plant, one pass.
    async fn run_farm_chores(
        &mut self,
        bridge: &dyn GameBridge,
        engine: &SkillEngine,
    ) -> Result<BatchStatus, BridgeError> {
        while self.phase_idx < CHORE_PHASES.len() {
            let phase = CHORE_PHASES[self.phase_idx].clone();
            let phase = &phase;
            let world = bridge.get_state().await?;
            if let Some(reason) = self.safety_trip(&world) {
                info!(phase = ?phase, reason = %reason, "batch yielding at safety threshold");
                return Ok(BatchStatus::Yielded { reason });
            }

            let farm = bridge.get_farm().await?;
            let targets = self.phase_targets(phase, &world, &farm);
            debug!(phase = ?phase, targets = targets.len(), "batch phase");
            let status = self
                .run_target_list(phase, targets, bridge, engine)
                .await?;
            if status != PhaseResult::Done {
                return Ok(match status {
                    PhaseResult::Yielded(reason) => BatchStatus::Yielded { reason },
                    PhaseResult::AllBlocked => BatchStatus::UniformlyBlocked,
                    PhaseResult::Done => unreachable!(),
                });
            }
            self.phase_idx += 1;
        }
        Ok(BatchStatus::Completed)
    }

    /// Fell every tree in the active plot.
    async fn run_gather_wood(
        &mut self,
        bridge: &dyn GameBridge,
        engine: &SkillEngine,
    ) -> Result<BatchStatus, BridgeError> {
        let world = bridge.get_state().await?;
        if let Some(reason) = self.safety_trip(&world) {
            return Ok(BatchStatus::Yielded { reason });
        }
        let farm = bridge.get_farm().await?;
        let targets: Vec<Target> = farm
            .objects
            .iter()
            .filter(|o| {
                farm.active_plot.contains(o.tile)
                    && o.kind == crate::domain::models::farm::DebrisKind::Tree
            })
            .filter_map(|o| Self::stand_for(o.tile, &farm))
            .collect();
        match self
            .run_target_list(&TaskKind::ClearDebris, targets, bridge, engine)
            .await?
        {
            PhaseResult::Done => Ok(BatchStatus::Completed),
            PhaseResult::Yielded(reason) => Ok(BatchStatus::Yielded { reason }),
            PhaseResult::AllBlocked => Ok(BatchStatus::UniformlyBlocked),
        }
    }

    /// Break adjacent rocks, swing at whatever moves, take the ladder
    /// down. Repeats for a handful of floors, then completes.
    async fn run_mine_session(
        &mut self,
        bridge: &dyn GameBridge,
        engine: &SkillEngine,
    ) -> Result<BatchStatus, BridgeError> {
        const FLOORS: u32 = 5;
        for _ in 0..FLOORS {
            let world = bridge.get_state().await?;
            if let Some(reason) = self.safety_trip(&world) {
                return Ok(BatchStatus::Yielded { reason });
            }

            // clear what surrounds us before descending
            let surroundings = bridge.get_surroundings().await?;
            for (facing, tile) in surroundings.iter() {
                let Some(blocker) = tile.blocker.as_deref() else {
                    continue;
                };
                let kind = crate::domain::models::farm::DebrisKind::from_name(blocker);
                let target = world.player_tile.step(facing);
                let outcome = if let Some(tool) = kind.required_tool() {
                    engine
                        .run(
                            "clear_debris",
                            &SkillContext::aimed(target, facing).with_tool(tool),
                            bridge,
                        )
                        .await
                } else {
                    engine
                        .run("attack", &SkillContext::aimed(target, facing), bridge)
                        .await
                };
                if let Err(e) = outcome {
                    debug!(error = %e, "mine step skipped");
                }
                self.step_pause().await;
            }

            let descend = engine
                .run("use_ladder", &SkillContext::default(), bridge)
                .await;
            self.steps += 1;
            if descend.is_err() {
                return Ok(BatchStatus::UniformlyBlocked);
            }
            self.step_pause().await;
        }
        Ok(BatchStatus::Completed)
    }

    /// Deposit every non-tool stack into the nearest chest.
    async fn run_organize(
        &mut self,
        bridge: &dyn GameBridge,
        engine: &SkillEngine,
    ) -> Result<BatchStatus, BridgeError> {
        let world = bridge.get_state().await?;
        if let Some(reason) = self.safety_trip(&world) {
            return Ok(BatchStatus::Yielded { reason });
        }
        let farm = bridge.get_farm().await?;
        let Some(chest) = farm
            .chests
            .iter()
            .copied()
            .min_by_key(|c| c.manhattan(world.player_tile))
        else {
            return Ok(BatchStatus::UniformlyBlocked);
        };
        let Some(stand) = Self::stand_for(chest, &farm) else {
            return Ok(BatchStatus::UniformlyBlocked);
        };

        if world.player_tile != stand.stand {
            self.walk_to(stand.stand, bridge).await?;
        }
        let mut blocked = 0u32;
        loop {
            let world = bridge.get_state().await?;
            let Some(stack) = world
                .inventory
                .iter()
                .find(|i| i.kind != ItemKind::Tool && i.stack > 0)
            else {
                return Ok(BatchStatus::Completed);
            };
            let ctx = SkillContext::aimed(stand.tile, stand.facing)
                .with_item(stack.name.clone())
                .with_slot(stack.slot)
                .with_quantity(stack.stack);
            match engine.run("store_item", &ctx, bridge).await {
                Ok(SkillOutcome::Verified) => blocked = 0,
                _ => {
                    blocked += 1;
                    if blocked >= self.config.target_failure_threshold {
                        return Ok(BatchStatus::UniformlyBlocked);
                    }
                }
            }
            self.steps += 1;
            self.step_pause().await;
        }
    }

    /// Walk one phase's target list, verifying each step and applying the
    /// skip rule on repeated failure.
    async fn run_target_list(
        &mut self,
        phase: &TaskKind,
        targets: Vec<Target>,
        bridge: &dyn GameBridge,
        engine: &SkillEngine,
    ) -> Result<PhaseResult, BridgeError> {
        let mut progressed = targets.is_empty();
        for target in targets {
            let world = bridge.get_state().await?;
            if let Some(reason) = self.safety_trip(&world) {
                return Ok(PhaseResult::Yielded(reason));
            }

            if world.player_tile != target.stand {
                self.walk_to(target.stand, bridge).await?;
            }

            let mut failures = 0u32;
            loop {
                let world = bridge.get_state().await?;
                let farm = bridge.get_farm().await?;
                let ctx = self.phase_context(phase, &world, &farm, target);
                let outcome = match engine
                    .run(phase.skill_name(), &ctx, bridge)
                    .await
                {
                    Ok(o) => o,
                    Err(e) => {
                        warn!(phase = ?phase, error = %e, "batch step malformed");
                        break;
                    }
                };
                self.steps += 1;
                self.step_pause().await;
                match outcome {
                    SkillOutcome::Verified | SkillOutcome::Skipped => {
                        progressed = true;
                        break;
                    }
                    _ => {
                        failures += 1;
                        if failures >= self.config.target_failure_threshold {
                            debug!(phase = ?phase, tile = %target.tile, "batch target skipped");
                            break;
                        }
                    }
                }
            }
        }
        if progressed {
            Ok(PhaseResult::Done)
        } else {
            Ok(PhaseResult::AllBlocked)
        }
    }

    /// Target list per chores phase. Tilling is denser than the task
    /// generator's: a contiguous block sized for a coming sprinkler
    /// layout rather than scattered singles.
    fn phase_targets(
        &self,
        phase: &TaskKind,
        world: &WorldSnapshot,
        farm: &FarmSnapshot,
    ) -> Vec<Target> {
        match phase {
            TaskKind::HarvestCrops => farm
                .ready_crops()
                .filter_map(|c| Self::stand_for(c.tile, farm))
                .collect(),
            TaskKind::WaterCrops => farm
                .unwatered_crops()
                .filter_map(|c| Self::stand_for(c.tile, farm))
                .collect(),
            TaskKind::ShipItems => {
                if world.shippable_items().next().is_none() {
                    return Vec::new();
                }
                farm.shipping_bin
                    .and_then(|bin| Self::stand_for(bin, farm))
                    .into_iter()
                    .collect()
            }
            TaskKind::TillSoil => till_block(farm, 5, 3)
                .into_iter()
                .filter_map(|tile| Self::stand_for(tile, farm))
                .collect(),
            TaskKind::PlantSeeds => {
                if world.seed_count() == 0 {
                    return Vec::new();
                }
                farm.tilled_empty_tiles()
                    .into_iter()
                    .filter_map(|tile| Self::stand_for(tile, farm))
                    .collect()
            }
            _ => Vec::new(),
        }
    }

    fn phase_context(
        &self,
        phase: &TaskKind,
        world: &WorldSnapshot,
        farm: &FarmSnapshot,
        target: Target,
    ) -> SkillContext {
        let mut ctx = SkillContext::aimed(target.tile, target.facing);
        match phase {
            TaskKind::PlantSeeds => {
                if let Some(seed) = world
                    .inventory
                    .iter()
                    .find(|i| i.kind == ItemKind::Seed && i.stack > 0)
                {
                    ctx = ctx.with_item(seed.name.clone());
                }
            }
            TaskKind::ShipItems => {
                if let Some(stack) = world.shippable_items().next() {
                    ctx = ctx.with_item(stack.name.clone()).with_slot(stack.slot);
                }
            }
            TaskKind::ClearDebris => {
                if let Some(obj) = farm.object_at(target.tile) {
                    if let Some(tool) = obj.kind.required_tool() {
                        ctx = ctx.with_tool(tool);
                    }
                }
            }
            _ => {}
        }
        ctx
    }

    fn stand_for(tile: Position, farm: &FarmSnapshot) -> Option<Target> {
        // same walkability rules the task generator applies
        use crate::domain::models::snapshot::Facing;
        const PREFERENCE: [Facing; 4] =
            [Facing::North, Facing::West, Facing::East, Facing::South];
        PREFERENCE.into_iter().find_map(|side| {
            let stand = tile.step(side);
            let walkable = farm.bounds.contains(stand)
                && farm.object_at(stand).is_none()
                && farm.crop_at(stand).is_none()
                && !farm.water_tiles.contains(&stand)
                && farm.shipping_bin != Some(stand);
            walkable.then(|| Target {
                tile,
                stand,
                facing: side.opposite(),
            })
        })
    }

    async fn walk_to(
        &mut self,
        stand: Position,
        bridge: &dyn GameBridge,
    ) -> Result<(), BridgeError> {
        let action = PrimitiveAction::MoveTo {
            x: stand.x,
            y: stand.y,
        };
        // a failed move surfaces when the skill's adjacency check fails
        if let Err(e) = bridge.execute(&action).await {
            debug!(error = %e, "batch walk failed");
        }
        self.step_pause().await;
        Ok(())
    }

    fn safety_trip(&self, world: &WorldSnapshot) -> Option<String> {
        if world.energy < self.config.low_energy {
            return Some(format!("energy {:.0} below floor", world.energy));
        }
        if world.is_past(self.config.late_night_time) {
            return Some(format!("clock {} past late threshold", world.time));
        }
        None
    }

    async fn step_pause(&self) {
        if !self.pace.is_zero() {
            tokio::time::sleep(self.pace).await;
        }
    }
}

/// A contiguous `width`-wide, up-to-`rows`-deep block of tillable tiles
/// starting at the first free spot of the active plot.
pub fn till_block(farm: &FarmSnapshot, width: i32, rows: i32) -> Vec<Position> {
    let plot = farm.active_plot;
    let free = |p: Position| {
        plot.contains(p)
            && !farm.is_tilled(p)
            && farm.crop_at(p).is_none()
            && farm.object_at(p).is_none()
            && !farm.water_tiles.contains(&p)
    };

    for y in plot.min.y..=plot.max.y {
        for x in plot.min.x..=(plot.max.x - width + 1) {
            let origin = Position::new(x, y);
            let row_free =
                (0..width).all(|dx| free(Position::new(origin.x + dx, origin.y)));
            if !row_free {
                continue;
            }
            let mut block = Vec::new();
            for dy in 0..rows {
                for dx in 0..width {
                    let p = Position::new(origin.x + dx, origin.y + dy);
                    if free(p) {
                        block.push(p);
                    }
                }
            }
            return block;
        }
    }
    Vec::new()
}

/// Phase-internal result.
#[derive(Debug, Clone, PartialEq, Eq)]
enum PhaseResult {
    Done,
    Yielded(String),
    AllBlocked,
}

impl std::fmt::Debug for BatchRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchRunner")
            .field("kind", &self.kind)
            .field("phase_idx", &self.phase_idx)
            .field("steps", &self.steps)
            .finish()
    }
}
