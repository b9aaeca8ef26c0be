//! Task executor: a single-task state machine.
//!
//! Locks onto one resolved task at a time, walks its target cursor, and
//! drives the skill engine per target. All retry state lives here, under
//! one owner: per-target failure counts, the skip-set, the per-skill
//! phantom tracker, and the stuck detector. Exactly one task is locked at
//! any time, or the executor is idle.

use tracing::{debug, info, warn};

use crate::domain::models::action::PrimitiveAction;
use crate::domain::models::config::AgentConfig;
use crate::domain::models::farm::{DebrisKind, FarmSnapshot};
use crate::domain::models::lesson::{Lesson, LessonKind, PhantomTracker};
use crate::domain::models::skill::{SkillContext, SkillOutcome};
use crate::domain::models::snapshot::{
    Facing, ItemKind, Position, Surroundings, WorldSnapshot,
};
use crate::domain::models::target::TargetCursor;
use crate::domain::models::task::{
    CompletionRecord, ResolvedTask, SkipReason, TaskKind,
};
use crate::domain::ports::bridge::GameBridge;
use crate::domain::ports::telemetry::TickOutcome;
use crate::services::skill_engine::SkillEngine;
use crate::services::target_gen::GeneratedTargets;

/// Executor lifecycle state, for observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecState {
    /// No task locked
    Idle,
    /// Walking targets / issuing skills
    Running,
    /// Last skill submitted, post-state being confirmed
    Verifying,
    /// Last attempt failed; same target retries next tick
    AwaitingRetry,
    /// Task finished with every target verified or skipped
    Complete,
    /// Task finished by skipping out entirely
    Skipped,
}

/// What one executor tick did.
#[derive(Debug, Clone)]
pub struct ExecutorTick {
    /// Skill or primitive dispatched this tick, if any
    pub dispatched: Option<String>,
    /// Outcome for telemetry
    pub outcome: TickOutcome,
    /// Lessons produced this tick
    pub lessons: Vec<Lesson>,
    /// Set when the locked task reached a terminal state this tick
    pub finished: Option<CompletionRecord>,
}

impl ExecutorTick {
    fn noop() -> Self {
        Self {
            dispatched: None,
            outcome: TickOutcome::NoOp,
            lessons: Vec::new(),
            finished: None,
        }
    }
}

/// Single-task executor.
pub struct TaskExecutor {
    config: AgentConfig,
    locked: Option<ResolvedTask>,
    cursor: TargetCursor,
    phantoms: PhantomTracker,
    last_tile: Option<Position>,
    stalled_ticks: u32,
    ticks_in_task: u32,
    /// Failure counter for destination-style tasks without a cursor
    dest_failures: u32,
    state: ExecState,
    /// When set, skip per-tick settle sleeps (tests)
    unpaced: bool,
}

impl TaskExecutor {
    /// Executor with the given tuning.
    pub fn new(config: AgentConfig) -> Self {
        Self {
            config,
            locked: None,
            cursor: TargetCursor::default(),
            phantoms: PhantomTracker::default(),
            last_tile: None,
            stalled_ticks: 0,
            ticks_in_task: 0,
            dest_failures: 0,
            state: ExecState::Idle,
            unpaced: false,
        }
    }

    /// Executor that never sleeps, for tests.
    pub fn unpaced(config: AgentConfig) -> Self {
        Self {
            unpaced: true,
            ..Self::new(config)
        }
    }

    /// Whether no task is locked.
    pub fn is_idle(&self) -> bool {
        self.locked.is_none()
    }

    /// Current lifecycle state.
    pub const fn state(&self) -> ExecState {
        self.state
    }

    /// The locked task, if any.
    pub fn locked_task(&self) -> Option<&ResolvedTask> {
        self.locked.as_ref()
    }

    /// Lock a task with its generated targets. Returns lessons for
    /// targets already dropped at generation time.
    pub fn lock(&mut self, task: ResolvedTask, targets: GeneratedTargets) -> Vec<Lesson> {
        info!(task = %task.description, targets = targets.targets.len(), "task locked");
        let lessons = targets
            .dropped
            .iter()
            .map(|(tile, reason)| {
                Lesson::now(
                    LessonKind::Unreachable,
                    format!("{} target {tile}: {reason}", task.description),
                )
            })
            .collect();
        self.cursor = TargetCursor::new(targets.targets);
        self.locked = Some(task);
        self.last_tile = None;
        self.stalled_ticks = 0;
        self.ticks_in_task = 0;
        self.dest_failures = 0;
        self.state = ExecState::Running;
        lessons
    }

    /// Drop the locked task without a record (day transition).
    pub fn clear(&mut self) {
        self.locked = None;
        self.cursor = TargetCursor::default();
        self.last_tile = None;
        self.stalled_ticks = 0;
        self.ticks_in_task = 0;
        self.dest_failures = 0;
        self.state = ExecState::Idle;
    }

    /// Whether the loop should ask the VLM for narration this tick.
    /// Never changes the next action.
    pub fn wants_commentary(&self) -> bool {
        self.ticks_in_task > 0
            && self.config.commentary_cadence > 0
            && self.ticks_in_task % self.config.commentary_cadence == 0
    }

    /// Drive one tick of the locked task.
    pub async fn tick(
        &mut self,
        world: &WorldSnapshot,
        surroundings: &Surroundings,
        farm: &FarmSnapshot,
        engine: &SkillEngine,
        bridge: &dyn GameBridge,
    ) -> ExecutorTick {
        let Some(task) = self.locked.clone() else {
            return ExecutorTick::noop();
        };
        self.ticks_in_task += 1;

        // stuck detector: position frozen across ticks while running
        if self.last_tile == Some(world.player_tile) {
            self.stalled_ticks += 1;
        } else {
            self.stalled_ticks = 0;
        }
        self.last_tile = Some(world.player_tile);

        if self.stalled_ticks >= self.config.stuck_threshold {
            return self.handle_stuck(&task, world);
        }

        if Self::is_destination_task(&task.kind) {
            return self.tick_destination(&task, world, engine, bridge).await;
        }

        if self.cursor.is_exhausted() {
            return self.finish(&task, world, None);
        }
        // current() is Some: is_exhausted was false
        let Some(target) = self.cursor.current() else {
            return self.finish(&task, world, None);
        };

        // shipping works the whole inventory from one standing spot
        if task.kind == TaskKind::ShipItems
            && world.player_tile.manhattan(target.tile) <= 1
        {
            return self.tick_ship(&task, world, engine, bridge).await;
        }

        if world.player_tile != target.stand {
            return self.navigate(target.stand, bridge).await;
        }

        // obstacles worth a detour before the skill: a clearable blocker
        // on the facing side
        if let Some(tick) = self
            .obstacle_detour(&task, target.facing, surroundings, farm, engine, bridge)
            .await
        {
            return tick;
        }

        let ctx = self.context_for(&task, world, farm, target.tile, target.facing);
        let skill = task.kind.skill_name();
        self.state = ExecState::Verifying;
        let outcome = match engine.run(skill, &ctx, bridge).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(skill, error = %e, "skill invocation malformed");
                self.cursor.skip_current();
                return ExecutorTick {
                    dispatched: Some(skill.to_string()),
                    outcome: TickOutcome::Failed,
                    lessons: vec![],
                    finished: None,
                };
            }
        };
        self.absorb_outcome(&task, skill, outcome, target.tile, world)
    }

    const fn is_destination_task(kind: &TaskKind) -> bool {
        matches!(
            kind,
            TaskKind::NavigateTo { .. } | TaskKind::BuySeeds { .. } | TaskKind::GoToBed
        )
    }

    /// Navigation, purchasing, and bed: single-shot tasks with a
    /// destination instead of a target sweep.
    async fn tick_destination(
        &mut self,
        task: &ResolvedTask,
        world: &WorldSnapshot,
        engine: &SkillEngine,
        bridge: &dyn GameBridge,
    ) -> ExecutorTick {
        match &task.kind {
            TaskKind::NavigateTo { location } => {
                // coordinate legs (navigate-to-water) complete on
                // adjacency; named legs complete on location match
                if let Some(dest) = task.destination {
                    if crate::domain::models::locations::location(location).is_none() {
                        if world.player_tile.manhattan(dest) <= 1 {
                            return self.finish(task, world, None);
                        }
                        return self.navigate_adjacent(dest, bridge).await;
                    }
                }
                if world.location == *location {
                    return self.finish(task, world, None);
                }
                let ctx = SkillContext::default().with_location(location.clone());
                let outcome = engine
                    .run("warp_to", &ctx, bridge)
                    .await
                    .unwrap_or(SkillOutcome::Skipped);
                self.absorb_destination_outcome(task, "warp_to", outcome, world)
            }
            TaskKind::BuySeeds { species, quantity } => {
                let ctx = SkillContext::default()
                    .with_item(format!("{species} Seeds"))
                    .with_quantity(*quantity);
                let outcome = engine
                    .run("buy_seeds", &ctx, bridge)
                    .await
                    .unwrap_or(SkillOutcome::Skipped);
                self.absorb_destination_outcome(task, "buy_seeds", outcome, world)
            }
            TaskKind::GoToBed => {
                let outcome = engine
                    .run("go_to_bed", &SkillContext::default(), bridge)
                    .await
                    .unwrap_or(SkillOutcome::Skipped);
                self.absorb_destination_outcome(task, "go_to_bed", outcome, world)
            }
            _ => ExecutorTick::noop(),
        }
    }

    /// Ship every unreserved sellable from the bin-adjacent spot, one
    /// stack per tick.
    async fn tick_ship(
        &mut self,
        task: &ResolvedTask,
        world: &WorldSnapshot,
        engine: &SkillEngine,
        bridge: &dyn GameBridge,
    ) -> ExecutorTick {
        let Some(stack) = world.shippable_items().next() else {
            self.cursor.mark_verified();
            return self.finish(task, world, None);
        };
        let ctx = SkillContext::default()
            .with_item(stack.name.clone())
            .with_slot(stack.slot);
        let outcome = engine
            .run("ship_item", &ctx, bridge)
            .await
            .unwrap_or(SkillOutcome::Skipped);
        match outcome {
            SkillOutcome::Verified => {
                // shipping is stationary progress, not a stall
                self.stalled_ticks = 0;
                ExecutorTick {
                    dispatched: Some("ship_item".to_string()),
                    outcome: TickOutcome::Verified,
                    lessons: vec![],
                    finished: None,
                }
            }
            other => self.absorb_outcome(
                task,
                "ship_item",
                other,
                world.player_tile,
                world,
            ),
        }
    }

    async fn navigate(&mut self, stand: Position, bridge: &dyn GameBridge) -> ExecutorTick {
        let action = PrimitiveAction::MoveTo {
            x: stand.x,
            y: stand.y,
        };
        let outcome = match bridge.execute(&action).await {
            Ok(resp) if resp.success => TickOutcome::Dispatched,
            _ => {
                self.note_target_failure();
                TickOutcome::Failed
            }
        };
        self.settle(&action).await;
        ExecutorTick {
            dispatched: Some("move_to".to_string()),
            outcome,
            lessons: vec![],
            finished: None,
        }
    }

    async fn navigate_adjacent(
        &mut self,
        dest: Position,
        bridge: &dyn GameBridge,
    ) -> ExecutorTick {
        // stand north of the destination tile by convention; the bridge's
        // pathfinder takes over from there
        self.navigate(dest.step(Facing::North), bridge).await
    }

    /// Clear a clearable blocker on the facing side before retrying the
    /// task's own skill. Hard obstacles skip immediately with a lesson.
    async fn obstacle_detour(
        &mut self,
        task: &ResolvedTask,
        facing: Facing,
        surroundings: &Surroundings,
        farm: &FarmSnapshot,
        engine: &SkillEngine,
        bridge: &dyn GameBridge,
    ) -> Option<ExecutorTick> {
        // only the tile we are about to act through matters
        let blocker_name = surroundings.get(facing).blocker.as_deref()?;
        let kind = DebrisKind::from_name(blocker_name);
        let blocked_tile = self.cursor.current()?.tile;

        // the blocker may be the target itself (clear task): no detour
        if task.kind == TaskKind::ClearDebris {
            return None;
        }

        if kind.is_hard() {
            debug!(blocker = blocker_name, "hard obstacle, skipping target");
            self.cursor.skip_current();
            let lesson = Lesson::now(
                LessonKind::RequiresToolUpgrade,
                format!("{blocker_name} blocking {blocked_tile}"),
            );
            return Some(ExecutorTick {
                dispatched: None,
                outcome: TickOutcome::Blocked,
                lessons: vec![lesson],
                finished: None,
            });
        }

        let tool = kind.required_tool()?;
        let ctx = SkillContext::aimed(blocked_tile, facing).with_tool(tool);
        let outcome = engine
            .run("clear_debris", &ctx, bridge)
            .await
            .unwrap_or(SkillOutcome::Skipped);
        debug!(blocker = blocker_name, ?outcome, "obstacle detour");
        Some(ExecutorTick {
            dispatched: Some("clear_debris".to_string()),
            outcome: match outcome {
                SkillOutcome::Verified => TickOutcome::Verified,
                SkillOutcome::PhantomFailed => TickOutcome::PhantomFailed,
                SkillOutcome::Blocked { .. } => TickOutcome::Blocked,
                _ => TickOutcome::Failed,
            },
            lessons: vec![],
            finished: None,
        })
    }

    /// Build the skill context for a target, filling item/tool parameters
    /// the skill needs.
    fn context_for(
        &self,
        task: &ResolvedTask,
        world: &WorldSnapshot,
        farm: &FarmSnapshot,
        tile: Position,
        facing: Facing,
    ) -> SkillContext {
        let mut ctx = SkillContext::aimed(tile, facing);
        match &task.kind {
            TaskKind::PlantSeeds => {
                if let Some(seed) = world
                    .inventory
                    .iter()
                    .find(|i| i.kind == ItemKind::Seed && i.stack > 0)
                {
                    ctx = ctx.with_item(seed.name.clone());
                }
            }
            TaskKind::ClearDebris => {
                if let Some(obj) = farm.object_at(tile) {
                    if let Some(tool) = obj.kind.required_tool() {
                        ctx = ctx.with_tool(tool);
                    }
                }
            }
            _ => {}
        }
        ctx
    }

    /// Fold a per-target skill outcome into cursor/counters.
    fn absorb_outcome(
        &mut self,
        task: &ResolvedTask,
        skill: &str,
        outcome: SkillOutcome,
        tile: Position,
        world: &WorldSnapshot,
    ) -> ExecutorTick {
        let mut lessons = Vec::new();
        let tick_outcome = match outcome {
            SkillOutcome::Verified => {
                self.cursor.mark_verified();
                self.phantoms.reset(skill);
                TickOutcome::Verified
            }
            SkillOutcome::Skipped => {
                // target became invalid between generation and execution
                self.cursor.skip_current();
                TickOutcome::Dispatched
            }
            SkillOutcome::PhantomFailed => {
                let count = self.phantoms.record(skill, Some(tile));
                if count >= self.config.phantom_threshold {
                    warn!(skill, count, "phantom threshold reached, hard fail");
                    lessons.push(Lesson::now(
                        LessonKind::PhantomFail,
                        format!("{skill} at {tile} ({count} consecutive)"),
                    ));
                    self.cursor.skip_current();
                    self.phantoms.reset(skill);
                }
                TickOutcome::PhantomFailed
            }
            SkillOutcome::Failed { .. } | SkillOutcome::Blocked { .. } => {
                // hard obstacles are skipped with a lesson, not retried
                if let SkillOutcome::Blocked { ref precondition } = outcome {
                    debug!(skill, precondition = %precondition, "skill blocked");
                }
                self.note_target_failure();
                if matches!(outcome, SkillOutcome::Blocked { .. }) {
                    TickOutcome::Blocked
                } else {
                    TickOutcome::Failed
                }
            }
        };

        self.state = match tick_outcome {
            TickOutcome::Failed | TickOutcome::Blocked | TickOutcome::PhantomFailed => {
                ExecState::AwaitingRetry
            }
            _ => ExecState::Running,
        };

        let finished = if self.cursor.is_exhausted() {
            let record = self.make_record(task, world, None);
            self.locked = None;
            self.state = ExecState::Complete;
            Some(record)
        } else {
            None
        };

        ExecutorTick {
            dispatched: Some(skill.to_string()),
            outcome: tick_outcome,
            lessons,
            finished,
        }
    }

    fn absorb_destination_outcome(
        &mut self,
        task: &ResolvedTask,
        skill: &str,
        outcome: SkillOutcome,
        world: &WorldSnapshot,
    ) -> ExecutorTick {
        match outcome {
            SkillOutcome::Verified => {
                let mut tick = self.finish(task, world, None);
                tick.dispatched = Some(skill.to_string());
                tick.outcome = TickOutcome::Verified;
                tick
            }
            SkillOutcome::Skipped => {
                let mut tick = self.finish(task, world, Some(SkipReason::RepeatedFailure));
                tick.dispatched = Some(skill.to_string());
                tick.outcome = TickOutcome::Failed;
                tick
            }
            SkillOutcome::PhantomFailed
            | SkillOutcome::Failed { .. }
            | SkillOutcome::Blocked { .. } => {
                self.dest_failures += 1;
                if self.dest_failures >= self.config.target_failure_threshold {
                    let mut tick =
                        self.finish(task, world, Some(SkipReason::RepeatedFailure));
                    tick.dispatched = Some(skill.to_string());
                    tick.outcome = TickOutcome::Failed;
                    return tick;
                }
                self.state = ExecState::AwaitingRetry;
                ExecutorTick {
                    dispatched: Some(skill.to_string()),
                    outcome: TickOutcome::Failed,
                    lessons: vec![],
                    finished: None,
                }
            }
        }
    }

    fn handle_stuck(&mut self, task: &ResolvedTask, world: &WorldSnapshot) -> ExecutorTick {
        warn!(task = %task.description, tile = %world.player_tile, "stuck, skipping target");
        self.stalled_ticks = 0;
        let lesson = Lesson::now(
            LessonKind::Stuck,
            format!("{} stuck at {}", task.description, world.player_tile),
        );
        let finished = if Self::is_destination_task(&task.kind) {
            let record = self.make_record(task, world, Some(SkipReason::Stuck));
            self.locked = None;
            self.state = ExecState::Skipped;
            Some(record)
        } else {
            self.cursor.skip_current();
            if self.cursor.is_exhausted() {
                let record = self.make_record(task, world, None);
                self.locked = None;
                self.state = ExecState::Complete;
                Some(record)
            } else {
                self.state = ExecState::Running;
                None
            }
        };
        ExecutorTick {
            dispatched: None,
            outcome: TickOutcome::Blocked,
            lessons: vec![lesson],
            finished,
        }
    }

    fn note_target_failure(&mut self) {
        let failures = self.cursor.record_failure();
        if failures >= self.config.target_failure_threshold {
            self.cursor.skip_current();
        }
    }

    fn finish(
        &mut self,
        task: &ResolvedTask,
        world: &WorldSnapshot,
        skip_reason: Option<SkipReason>,
    ) -> ExecutorTick {
        let record = self.make_record(task, world, skip_reason);
        info!(task = %task.description, verified = record.verified, skipped = record.skipped, "task finished");
        self.locked = None;
        self.state = if record.skip_reason.is_some() {
            ExecState::Skipped
        } else {
            ExecState::Complete
        };
        ExecutorTick {
            dispatched: None,
            outcome: TickOutcome::Dispatched,
            lessons: vec![],
            finished: Some(record),
        }
    }

    fn make_record(
        &self,
        task: &ResolvedTask,
        world: &WorldSnapshot,
        skip_reason: Option<SkipReason>,
    ) -> CompletionRecord {
        CompletionRecord {
            task_id: task.id,
            description: task.description.clone(),
            finished_at: world.time,
            priority: task.priority,
            verified: self.cursor.verified_count(),
            skipped: self.cursor.skipped_count(),
            skip_reason,
        }
    }

    async fn settle(&self, action: &PrimitiveAction) {
        if !self.unpaced {
            tokio::time::sleep(action.settle_interval()).await;
        }
    }
}
