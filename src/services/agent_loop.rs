//! The agent loop: one tick, end to end.
//!
//! Snapshot -> day transition -> source selection (executor, batch, VLM)
//! -> override chain -> dispatch -> verify -> record. Single-threaded
//! cooperative: one logical tick runs to completion, every wait is an
//! awaited suspension point, and the only cancellation source is process
//! shutdown checked between suspensions. Nothing throws across the tick
//! boundary.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::domain::error::BridgeError;
use crate::domain::models::action::{ChosenAction, PrimitiveAction};
use crate::domain::models::config::Config;
use crate::domain::models::farm::FarmSnapshot;
use crate::domain::models::lesson::{Lesson, LessonKind, PhantomTracker};
use crate::domain::models::skill::{SkillContext, SkillOutcome};
use crate::domain::models::snapshot::{Facing, Position, Surroundings, WorldSnapshot};
use crate::domain::models::task::{
    CompletionRecord, DayPlan, ResolvedQueue, ResolvedTask, SkipReason, TaskRaw,
};
use crate::domain::ports::bridge::GameBridge;
use crate::domain::ports::stores::{LessonStore, PlanStore, ReservedItems};
use crate::domain::ports::telemetry::{TelemetrySink, TickEvent, TickOutcome};
use crate::domain::ports::vlm::{ScreenshotSource, VisionModel};
use crate::services::batch::{BatchRunner, BatchStatus};
use crate::services::decision;
use crate::services::executor::TaskExecutor;
use crate::services::overrides::{ChainDecision, OverrideChain, OverrideContext};
use crate::services::planner::DailyPlanner;
use crate::services::resolver::PrereqResolver;
use crate::services::skill_engine::SkillEngine;
use crate::services::target_gen::TargetGenerator;

/// External collaborators, injected at startup.
pub struct AgentDeps {
    /// The game bridge client
    pub bridge: Arc<dyn GameBridge>,
    /// The vision-language model
    pub vlm: Arc<dyn VisionModel>,
    /// On-demand screenshot capture
    pub screenshots: Arc<dyn ScreenshotSource>,
    /// Event stream consumer
    pub telemetry: Arc<dyn TelemetrySink>,
    /// Plan and carryover persistence
    pub plan_store: Arc<dyn PlanStore>,
    /// Append-only lesson log
    pub lesson_store: Arc<dyn LessonStore>,
    /// Reserved-items policy for smart selling
    pub reserved: Arc<dyn ReservedItems>,
}

/// Fatal conditions that end the run.
#[derive(Debug, thiserror::Error)]
pub enum FatalError {
    /// The bridge stayed unreachable past the configured window
    #[error("bridge unreachable for {0} seconds")]
    BridgeLost(u64),
}

const HISTORY_CAP: usize = 10;
const HINT_CAP: usize = 8;

/// The orchestrator.
pub struct AgentLoop {
    config: Config,
    deps: AgentDeps,
    planner: DailyPlanner,
    resolver: PrereqResolver,
    engine: SkillEngine,
    chain: OverrideChain,
    executor: TaskExecutor,
    batch: Option<(ResolvedTask, BatchRunner)>,
    queue: ResolvedQueue,
    plan: Option<DayPlan>,
    last_day: Option<u32>,
    last_replan_time: u32,
    replan_on_skip_armed: bool,
    tick_counter: u64,
    parse_failures: u32,
    phantoms: PhantomTracker,
    history: VecDeque<String>,
    hints: VecDeque<String>,
    last_proposed: Option<String>,
    last_tile: Option<Position>,
    repeat_count: u32,
    observe_only: bool,
    goal: Option<String>,
    bridge_down_since: Option<Instant>,
    unpaced: bool,
}

impl AgentLoop {
    /// Wire up the loop.
    pub fn new(config: Config, deps: AgentDeps, observe_only: bool) -> Self {
        let library = Arc::new(crate::services::skill_library::SkillLibrary::builtin());
        let engine = SkillEngine::new(
            Arc::clone(&library),
            Duration::from_millis(config.bridge.cache_refresh_ms),
        );
        Self {
            planner: DailyPlanner::new(config.agent.clone()),
            resolver: PrereqResolver::new(config.agent.clone()),
            executor: TaskExecutor::new(config.agent.clone()),
            engine,
            chain: OverrideChain::standard(),
            batch: None,
            queue: ResolvedQueue::default(),
            plan: None,
            last_day: None,
            last_replan_time: 0,
            replan_on_skip_armed: true,
            tick_counter: 0,
            parse_failures: 0,
            phantoms: PhantomTracker::default(),
            history: VecDeque::new(),
            hints: VecDeque::new(),
            last_proposed: None,
            last_tile: None,
            repeat_count: 0,
            observe_only,
            goal: None,
            bridge_down_since: None,
            unpaced: false,
            config,
            deps,
        }
    }

    /// Attach the operator's standing goal; it rides along in every
    /// prompt's hint section.
    #[must_use]
    pub fn with_goal(mut self, goal: impl Into<String>) -> Self {
        self.goal = Some(goal.into());
        self
    }

    /// Loop that neither sleeps between ticks nor paces skills (tests).
    pub fn unpaced(config: Config, deps: AgentDeps, observe_only: bool) -> Self {
        let mut agent = Self::new(config, deps, observe_only);
        agent.engine = SkillEngine::unpaced(Arc::new(
            crate::services::skill_library::SkillLibrary::builtin(),
        ));
        agent.executor = TaskExecutor::unpaced(agent.config.agent.clone());
        agent.unpaced = true;
        agent
    }

    /// Run until shutdown flips or a fatal condition surfaces.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> Result<(), FatalError> {
        self.startup_gate().await?;
        loop {
            if *shutdown.borrow() {
                info!("shutdown requested, stopping after current tick");
                return Ok(());
            }
            self.tick().await?;
            if self.unpaced {
                continue;
            }
            let sleep = tokio::time::sleep(Duration::from_millis(
                self.config.agent.think_interval_ms,
            ));
            tokio::select! {
                () = sleep => {}
                _ = shutdown.changed() => {}
            }
        }
    }

    /// Wait for the bridge to answer once before the first tick.
    async fn startup_gate(&self) -> Result<(), FatalError> {
        let deadline =
            Instant::now() + Duration::from_secs(self.config.agent.bridge_loss_fatal_secs);
        loop {
            match self.deps.bridge.get_state().await {
                Ok(_) => return Ok(()),
                Err(e) if Instant::now() >= deadline => {
                    warn!(error = %e, "bridge never came up");
                    return Err(FatalError::BridgeLost(
                        self.config.agent.bridge_loss_fatal_secs,
                    ));
                }
                Err(e) => {
                    debug!(error = %e, "waiting for bridge");
                    if !self.unpaced {
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        }
    }

    /// One tick, end to end. Public so tests can drive the loop manually.
    pub async fn tick(&mut self) -> Result<(), FatalError> {
        self.tick_counter += 1;

        let (world, surroundings) = match self.refresh().await {
            Ok(pair) => pair,
            Err(e) => return self.handle_bridge_outage(&e).await,
        };
        self.bridge_down_since = None;

        if self.last_day != Some(world.day_of_year) {
            self.on_day_transition(&world).await;
        } else if self.should_replan(&world) {
            self.replan(&world).await;
        }

        // source selection: batch, then executor, then queue, then VLM
        if self.batch.is_some() {
            return self.tick_batch(&world, &surroundings).await;
        }
        if !self.executor.is_idle() {
            return self.tick_executor(&world, &surroundings).await;
        }
        if let Some(task) = self.queue.pop() {
            return self.start_task(task, &world, &surroundings).await;
        }
        self.tick_vlm(&world, &surroundings).await
    }

    async fn refresh(&self) -> Result<(WorldSnapshot, Surroundings), BridgeError> {
        let world = self.deps.bridge.get_state().await?;
        let surroundings = self.deps.bridge.get_surroundings().await?;
        Ok((world, surroundings))
    }

    async fn handle_bridge_outage(&mut self, error: &BridgeError) -> Result<(), FatalError> {
        let since = *self.bridge_down_since.get_or_insert_with(Instant::now);
        let limit = Duration::from_secs(self.config.agent.bridge_loss_fatal_secs);
        warn!(error = %error, down_for = ?since.elapsed(), "bridge unreachable");
        if since.elapsed() >= limit {
            return Err(FatalError::BridgeLost(limit.as_secs()));
        }
        self.record(
            0,
            0,
            None,
            None,
            TickOutcome::NoOp,
            Some(format!("bridge outage: {error}")),
        )
        .await;
        Ok(())
    }

    /// Exactly one planner invocation per observed day transition.
    async fn on_day_transition(&mut self, world: &WorldSnapshot) {
        info!(day = world.day_of_year, "day transition");

        // wrap up yesterday: persist carryover of unfinished high/critical
        if let Some(prev) = self.plan.take() {
            let unfinished = self.unfinished_raw(&prev);
            let carry = DailyPlanner::carryover_from(&unfinished);
            if let Err(e) = self.deps.plan_store.save_carryover(&carry).await {
                warn!(error = %e, "carryover save failed");
            }
        }
        self.executor.clear();
        self.batch = None;

        let farm = match self.deps.bridge.get_farm().await {
            Ok(f) => f,
            Err(e) => {
                warn!(error = %e, "farm snapshot unavailable at day start");
                self.last_day = Some(world.day_of_year);
                return;
            }
        };
        let carryover = self
            .deps
            .plan_store
            .load_carryover()
            .await
            .unwrap_or_default();
        let raw = self.planner.plan_day(world, &farm, &carryover, None);
        let queue = self
            .resolver
            .resolve(&raw, world, &farm, self.deps.reserved.as_ref());

        for (desc, reason) in &queue.dropped {
            self.push_hint(format!("dropped: {desc} ({reason})"));
        }

        let plan = DayPlan {
            day_of_year: world.day_of_year,
            planned_at: Utc::now(),
            raw,
            resolved: queue.pending.iter().cloned().collect(),
            dropped: queue.dropped.clone(),
            records: Vec::new(),
        };
        self.persist_plan(&plan).await;
        self.deps.telemetry.publish_plan(&plan).await;

        self.plan = Some(plan);
        self.queue = queue;
        self.last_day = Some(world.day_of_year);
        self.last_replan_time = world.time;
        self.replan_on_skip_armed = true;
    }

    /// Raw tasks with at least one pending resolved child, plus chains
    /// the resolver dropped; both are candidates for tomorrow.
    fn unfinished_raw(&self, plan: &DayPlan) -> Vec<TaskRaw> {
        plan.raw
            .iter()
            .filter(|raw| {
                let pending = self
                    .queue
                    .pending
                    .iter()
                    .any(|entry| entry.parent == raw.id);
                let dropped = plan
                    .dropped
                    .iter()
                    .any(|(desc, _)| *desc == raw.description);
                pending || dropped
            })
            .cloned()
            .collect()
    }

    /// Period boundary (game hours) or a critical skip, while idle.
    fn should_replan(&mut self, world: &WorldSnapshot) -> bool {
        if !self.executor.is_idle() || self.batch.is_some() {
            return false;
        }
        let boundary = u32::from(self.config.agent.replan_interval_hours) * 100;
        if world.time.saturating_sub(self.last_replan_time) >= boundary {
            return true;
        }
        if self.replan_on_skip_armed && self.queue.critical_skip_recorded() {
            self.replan_on_skip_armed = false;
            return true;
        }
        false
    }

    async fn replan(&mut self, world: &WorldSnapshot) {
        info!(time = world.time, "mid-day re-plan");
        let Ok(farm) = self.deps.bridge.get_farm().await else {
            return;
        };
        let raw = self.planner.plan_day(world, &farm, &[], None);
        let mut queue = self
            .resolver
            .resolve(&raw, world, &farm, self.deps.reserved.as_ref());
        queue.records = std::mem::take(&mut self.queue.records);

        if let Some(plan) = &mut self.plan {
            plan.raw = raw;
            plan.resolved = queue.pending.iter().cloned().collect();
            plan.dropped.extend(queue.dropped.clone());
        }
        self.queue = queue;
        self.last_replan_time = world.time;
        if let Some(plan) = self.plan.clone() {
            self.persist_plan(&plan).await;
            self.deps.telemetry.publish_plan(&plan).await;
        }
    }

    /// Pop-time routing: batch override or target generation + lock.
    async fn start_task(
        &mut self,
        task: ResolvedTask,
        world: &WorldSnapshot,
        surroundings: &Surroundings,
    ) -> Result<(), FatalError> {
        if let Some(name) = task.skill_override.clone() {
            if let Some(runner) = self.batch_runner(&name) {
                info!(task = %task.description, batch = %name, "delegating to batch skill");
                self.batch = Some((task, runner));
                return self.tick_batch(world, surroundings).await;
            }
            warn!(batch = %name, "unknown batch override, running as plain task");
        }

        let farm = match self.deps.bridge.get_farm().await {
            Ok(f) => f,
            Err(e) => {
                warn!(error = %e, "farm snapshot failed at task start");
                self.queue.pending.push_front(task);
                return Ok(());
            }
        };
        let targets =
            TargetGenerator::generate(&task, world, &farm, self.deps.bridge.as_ref()).await;
        let lessons = self.executor.lock(task, targets);
        self.store_lessons(&lessons).await;
        self.tick_executor(world, surroundings).await
    }

    fn batch_runner(&self, name: &str) -> Option<BatchRunner> {
        if self.unpaced {
            BatchRunner::unpaced(name, self.config.agent.clone())
        } else {
            BatchRunner::for_override(name, self.config.agent.clone())
        }
    }

    async fn tick_batch(
        &mut self,
        world: &WorldSnapshot,
        surroundings: &Surroundings,
    ) -> Result<(), FatalError> {
        let Some((task, mut runner)) = self.batch.take() else {
            return Ok(());
        };
        let status = match runner.run(self.deps.bridge.as_ref(), &self.engine).await {
            Ok(status) => status,
            Err(e) => {
                warn!(error = %e, "batch run hit bridge trouble");
                self.batch = Some((task, runner));
                return self.handle_bridge_outage(&e).await;
            }
        };
        match status {
            BatchStatus::Completed => {
                let record = CompletionRecord {
                    task_id: task.id,
                    description: task.description.clone(),
                    finished_at: world.time,
                    priority: task.priority,
                    verified: runner.steps(),
                    skipped: 0,
                    skip_reason: None,
                };
                self.complete_task(record).await;
                self.record(
                    world.time,
                    world.day_of_year,
                    Some(task.description),
                    None,
                    TickOutcome::Verified,
                    Some("batch complete".to_string()),
                )
                .await;
            }
            BatchStatus::UniformlyBlocked => {
                let record = CompletionRecord {
                    task_id: task.id,
                    description: task.description.clone(),
                    finished_at: world.time,
                    priority: task.priority,
                    verified: runner.steps(),
                    skipped: 1,
                    skip_reason: Some(SkipReason::RepeatedFailure),
                };
                self.complete_task(record).await;
                self.record(
                    world.time,
                    world.day_of_year,
                    Some(task.description),
                    None,
                    TickOutcome::Blocked,
                    Some("batch uniformly blocked".to_string()),
                )
                .await;
            }
            BatchStatus::Yielded { reason } => {
                debug!(reason = %reason, "batch yielded to override chain");
                self.push_hint(format!("batch paused: {reason}"));
                self.batch = Some((task, runner));
                // the chain decides what safety action wins this tick
                return self.tick_vlm(world, surroundings).await;
            }
        }
        Ok(())
    }

    async fn tick_executor(
        &mut self,
        world: &WorldSnapshot,
        surroundings: &Surroundings,
    ) -> Result<(), FatalError> {
        let farm = match self.deps.bridge.get_farm().await {
            Ok(f) => f,
            Err(e) => return self.handle_bridge_outage(&e).await,
        };

        // narrative cadence: the VLM talks, the executor keeps driving
        if self.executor.wants_commentary() {
            self.commentary(world, surroundings).await;
        }

        let tick = self
            .executor
            .tick(
                world,
                surroundings,
                &farm,
                &self.engine,
                self.deps.bridge.as_ref(),
            )
            .await;

        self.store_lessons(&tick.lessons).await;
        if let Some(record) = tick.finished.clone() {
            self.complete_task(record).await;
        }
        self.record(
            world.time,
            world.day_of_year,
            tick.dispatched.clone(),
            tick.dispatched,
            tick.outcome,
            None,
        )
        .await;
        Ok(())
    }

    /// The VLM-driven path, including override-only fallback.
    async fn tick_vlm(
        &mut self,
        world: &WorldSnapshot,
        surroundings: &Surroundings,
    ) -> Result<(), FatalError> {
        let farm = match self.deps.bridge.get_farm().await {
            Ok(f) => f,
            Err(e) => return self.handle_bridge_outage(&e).await,
        };

        let proposed = if self.parse_failures >= self.config.agent.parse_failure_fallback {
            // sustained parse failures: override-chain defaults only
            debug!("VLM fallback mode: neutral proposal through the chain");
            Some(ChosenAction::Primitive(PrimitiveAction::Face {
                direction: world.facing,
            }))
        } else {
            self.consult_vlm(world, surroundings).await
        };

        let Some(proposal) = proposed else {
            self.record(
                world.time,
                world.day_of_year,
                None,
                None,
                TickOutcome::NoOp,
                Some("no usable VLM action".to_string()),
            )
            .await;
            return Ok(());
        };

        // repetition tracking for the edge-stuck rule
        let name = proposal.describe();
        if self.last_proposed.as_deref() == Some(name.as_str())
            && self.last_tile == Some(world.player_tile)
        {
            self.repeat_count += 1;
        } else {
            self.repeat_count = 1;
        }
        self.last_proposed = Some(name.clone());
        self.last_tile = Some(world.player_tile);

        let ctx = OverrideContext {
            world,
            surroundings,
            farm: &farm,
            config: &self.config.agent,
            reserved: self.deps.reserved.as_ref(),
            action_repeats: self.repeat_count,
        };
        let decision = self.chain.apply(&ctx, proposal);

        match decision {
            ChainDecision::Blocked { rule, reason } => {
                info!(rule, reason = %reason, "override chain blocked the action");
                self.record(
                    world.time,
                    world.day_of_year,
                    Some(name),
                    None,
                    TickOutcome::Blocked,
                    Some(format!("blocked: {reason}")),
                )
                .await;
            }
            ChainDecision::Keep(action) => {
                self.dispatch(action, name, None, world).await;
            }
            ChainDecision::Replaced {
                rule,
                action,
                reason,
            } => {
                self.dispatch(action, name, Some((rule, reason)), world)
                    .await;
            }
        }
        Ok(())
    }

    /// Ask the VLM for a decision and map the first usable action.
    async fn consult_vlm(
        &mut self,
        world: &WorldSnapshot,
        surroundings: &Surroundings,
    ) -> Option<ChosenAction> {
        let task = self.queue.pending.front();
        let mut hints: Vec<String> = self.hints.iter().cloned().collect();
        if let Some(goal) = &self.goal {
            hints.insert(0, format!("standing goal: {goal}"));
        }
        let history: Vec<String> = self.history.iter().cloned().collect();
        let prompt = decision::build_prompt(world, surroundings, task, &hints, &history);
        let screenshot = self.deps.screenshots.capture().await;

        let text = match self
            .deps
            .vlm
            .decide(&prompt, screenshot.as_deref())
            .await
        {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "VLM call failed; no-op tick");
                if e.is_parse_failure() {
                    self.parse_failures += 1;
                }
                return None;
            }
        };

        match decision::extract_decision(&text) {
            Ok(parsed) => {
                self.parse_failures = 0;
                debug!(reasoning = %parsed.reasoning, actions = parsed.actions.len(), "VLM decided");
                parsed
                    .actions
                    .iter()
                    .find_map(|a| decision::map_action(a, self.engine.library()))
            }
            Err(e) => {
                self.parse_failures += 1;
                warn!(error = %e, streak = self.parse_failures, "VLM response unusable");
                None
            }
        }
    }

    /// Commentary consults the VLM without touching the chosen action.
    async fn commentary(&mut self, world: &WorldSnapshot, surroundings: &Surroundings) {
        let task = self.executor.locked_task();
        let prompt = decision::build_prompt(world, surroundings, task, &[], &[]);
        if let Ok(text) = self.deps.vlm.decide(&prompt, None).await {
            if let Ok(parsed) = decision::extract_decision(&text) {
                if !parsed.reasoning.is_empty() {
                    info!(commentary = %parsed.reasoning, "narration");
                }
            }
        }
    }

    async fn dispatch(
        &mut self,
        action: ChosenAction,
        proposed: String,
        replacement: Option<(&'static str, String)>,
        world: &WorldSnapshot,
    ) {
        let chosen_name = action.describe();
        let reason = replacement.map(|(rule, why)| format!("{rule}: {why}"));

        if self.observe_only {
            self.record(
                world.time,
                world.day_of_year,
                Some(proposed),
                Some(chosen_name),
                TickOutcome::Observed,
                reason,
            )
            .await;
            return;
        }

        let outcome = match &action {
            ChosenAction::Primitive(primitive) => {
                match self.deps.bridge.execute(primitive).await {
                    Ok(resp) if resp.success => {
                        if !self.unpaced {
                            tokio::time::sleep(primitive.settle_interval()).await;
                        }
                        TickOutcome::Dispatched
                    }
                    _ => TickOutcome::Failed,
                }
            }
            ChosenAction::Skill { name, .. } => {
                let ctx = Self::context_from(&action, world);
                match self
                    .engine
                    .run(name, &ctx, self.deps.bridge.as_ref())
                    .await
                {
                    Ok(SkillOutcome::Verified) => {
                        self.phantoms.reset(name);
                        TickOutcome::Verified
                    }
                    Ok(SkillOutcome::PhantomFailed) => {
                        let count = self.phantoms.record(name, ctx.target);
                        if count >= self.config.agent.phantom_threshold {
                            let lesson = Lesson::now(
                                LessonKind::PhantomFail,
                                format!("{name} via VLM ({count} consecutive)"),
                            );
                            self.store_lessons(std::slice::from_ref(&lesson)).await;
                            self.phantoms.reset(name);
                        }
                        TickOutcome::PhantomFailed
                    }
                    Ok(SkillOutcome::Blocked { .. }) => TickOutcome::Blocked,
                    Ok(SkillOutcome::Skipped) => TickOutcome::Dispatched,
                    Ok(SkillOutcome::Failed { .. }) | Err(_) => TickOutcome::Failed,
                }
            }
        };

        self.history.push_back(chosen_name.clone());
        while self.history.len() > HISTORY_CAP {
            self.history.pop_front();
        }

        self.record(
            world.time,
            world.day_of_year,
            Some(proposed),
            Some(chosen_name),
            outcome,
            reason,
        )
        .await;
    }

    /// Build a skill context from a mapped VLM action.
    fn context_from(action: &ChosenAction, world: &WorldSnapshot) -> SkillContext {
        let ChosenAction::Skill {
            target,
            direction,
            item,
            quantity,
            location,
            ..
        } = action
        else {
            return SkillContext::default();
        };
        let direction = direction.or_else(|| {
            target.and_then(|t| Facing::between(world.player_tile, t))
        });
        let slot = item
            .as_deref()
            .and_then(|i| world.find_item(i))
            .map(|i| i.slot);
        SkillContext {
            target: *target,
            direction,
            slot,
            item: item.clone(),
            quantity: *quantity,
            location: location.clone(),
            tool: None,
        }
    }

    async fn complete_task(&mut self, record: CompletionRecord) {
        if record.skip_reason.is_some() {
            self.push_hint(format!(
                "skipped: {} ({})",
                record.description,
                record
                    .skip_reason
                    .as_ref()
                    .map(ToString::to_string)
                    .unwrap_or_default()
            ));
        }
        self.queue.record(record);
        if let Some(plan) = &mut self.plan {
            plan.records = self.queue.records.clone();
        }
        if let Some(plan) = self.plan.clone() {
            self.persist_plan(&plan).await;
        }
    }

    async fn persist_plan(&self, plan: &DayPlan) {
        if let Err(e) = self.deps.plan_store.save_plan(plan).await {
            warn!(error = %e, "plan save failed");
        }
    }

    async fn store_lessons(&mut self, lessons: &[Lesson]) {
        for lesson in lessons {
            self.push_hint(format!("{:?}: {}", lesson.kind, lesson.context));
            if let Err(e) = self.deps.lesson_store.append(lesson).await {
                warn!(error = %e, "lesson append failed");
            }
        }
    }

    fn push_hint(&mut self, hint: String) {
        self.hints.push_back(hint);
        while self.hints.len() > HINT_CAP {
            self.hints.pop_front();
        }
    }

    async fn record(
        &self,
        game_time: u32,
        day: u32,
        proposed: Option<String>,
        chosen: Option<String>,
        outcome: TickOutcome,
        reason: Option<String>,
    ) {
        let event = TickEvent {
            tick: self.tick_counter,
            timestamp: Utc::now(),
            game_time,
            day_of_year: day,
            proposed,
            chosen,
            outcome,
            reason,
        };
        self.deps.telemetry.record_tick(&event).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::error::VlmError;
    use crate::domain::models::farm::{Crop, PlotBounds};
    use crate::domain::models::snapshot::{
        InventoryItem, ItemKind, Season, Weather,
    };
    use crate::domain::ports::bridge::{ActionResponse, PathCheck};
    use crate::domain::ports::stores::{
        InMemoryLessonStore, InMemoryPlanStore, NoReservations,
    };
    use crate::domain::ports::vlm::NullScreenshotSource;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct ScriptedVlm {
        responses: Mutex<VecDeque<Result<String, VlmError>>>,
        calls: Mutex<u32>,
    }

    impl ScriptedVlm {
        fn with(responses: Vec<Result<String, VlmError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                calls: Mutex::new(0),
            }
        }

        fn calls(&self) -> u32 {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl VisionModel for ScriptedVlm {
        async fn decide(&self, _: &str, _: Option<&[u8]>) -> Result<String, VlmError> {
            *self.calls.lock().unwrap() += 1;
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(VlmError::EmptyResponse))
        }
    }

    struct RecordingTelemetry {
        events: Mutex<Vec<TickEvent>>,
        plans: Mutex<Vec<DayPlan>>,
    }

    impl RecordingTelemetry {
        fn new() -> Self {
            Self {
                events: Mutex::new(vec![]),
                plans: Mutex::new(vec![]),
            }
        }
        fn events(&self) -> Vec<TickEvent> {
            self.events.lock().unwrap().clone()
        }
        fn plan_count(&self) -> usize {
            self.plans.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl TelemetrySink for RecordingTelemetry {
        async fn record_tick(&self, event: &TickEvent) {
            self.events.lock().unwrap().push(event.clone());
        }
        async fn publish_plan(&self, plan: &DayPlan) {
            self.plans.lock().unwrap().push(plan.clone());
        }
    }

    struct FixedBridge {
        world: Mutex<WorldSnapshot>,
        farm: Mutex<FarmSnapshot>,
        executed: Mutex<Vec<PrimitiveAction>>,
    }

    #[async_trait]
    impl GameBridge for FixedBridge {
        async fn get_state(&self) -> Result<WorldSnapshot, BridgeError> {
            Ok(self.world.lock().unwrap().clone())
        }
        async fn get_surroundings(&self) -> Result<Surroundings, BridgeError> {
            Ok(Surroundings::open())
        }
        async fn get_farm(&self) -> Result<FarmSnapshot, BridgeError> {
            Ok(self.farm.lock().unwrap().clone())
        }
        async fn check_path(&self, _: Position, _: Position) -> Result<PathCheck, BridgeError> {
            Ok(PathCheck {
                reachable: true,
                path_length: 2,
            })
        }
        async fn execute(&self, action: &PrimitiveAction) -> Result<ActionResponse, BridgeError> {
            self.executed.lock().unwrap().push(action.clone());
            Ok(ActionResponse::ok())
        }
    }

    fn world() -> WorldSnapshot {
        WorldSnapshot {
            time: 900,
            weather: Weather::Sunny,
            season: Season::Spring,
            day_of_year: 5,
            player_tile: Position::new(60, 20),
            facing: Facing::South,
            energy: 250.0,
            health: 100,
            money: 0,
            inventory: vec![],
            selected_slot: 0,
            location: "Farm".to_string(),
            menu_open: false,
        }
    }

    fn farm() -> FarmSnapshot {
        FarmSnapshot {
            tilled: vec![],
            crops: vec![],
            objects: vec![],
            clumps: vec![],
            chests: vec![],
            shipping_bin: None,
            water_tiles: vec![],
            bounds: PlotBounds {
                min: Position::new(0, 0),
                max: Position::new(79, 64),
            },
            active_plot: PlotBounds {
                min: Position::new(55, 15),
                max: Position::new(70, 30),
            },
        }
    }

    fn agent(
        bridge: Arc<FixedBridge>,
        vlm: Arc<ScriptedVlm>,
        telemetry: Arc<RecordingTelemetry>,
    ) -> AgentLoop {
        let deps = AgentDeps {
            bridge,
            vlm,
            screenshots: Arc::new(NullScreenshotSource),
            telemetry,
            plan_store: Arc::new(InMemoryPlanStore::default()),
            lesson_store: Arc::new(InMemoryLessonStore::default()),
            reserved: Arc::new(NoReservations),
        };
        AgentLoop::unpaced(Config::default(), deps, false)
    }

    #[tokio::test]
    async fn test_one_planner_invocation_per_day_transition() {
        let bridge = Arc::new(FixedBridge {
            world: Mutex::new(world()),
            farm: Mutex::new(farm()),
            executed: Mutex::new(vec![]),
        });
        let vlm = Arc::new(ScriptedVlm::with(vec![]));
        let telemetry = Arc::new(RecordingTelemetry::new());
        let mut agent = agent(Arc::clone(&bridge), vlm, Arc::clone(&telemetry));

        agent.tick().await.unwrap();
        agent.tick().await.unwrap();
        assert_eq!(telemetry.plan_count(), 1, "same day, one plan");

        bridge.world.lock().unwrap().day_of_year = 6;
        agent.tick().await.unwrap();
        agent.tick().await.unwrap();
        assert_eq!(telemetry.plan_count(), 2, "new day, one more plan");
    }

    #[tokio::test]
    async fn test_parse_failure_is_noop_tick() {
        let bridge = Arc::new(FixedBridge {
            world: Mutex::new(world()),
            farm: Mutex::new(farm()),
            executed: Mutex::new(vec![]),
        });
        let vlm = Arc::new(ScriptedVlm::with(vec![Ok(
            "I am confused and this is not JSON".to_string()
        )]));
        let telemetry = Arc::new(RecordingTelemetry::new());
        let mut agent = agent(Arc::clone(&bridge), vlm, Arc::clone(&telemetry));

        agent.tick().await.unwrap();
        let events = telemetry.events();
        assert_eq!(events.last().unwrap().outcome, TickOutcome::NoOp);
        assert!(bridge.executed.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_crop_protection_blocks_vlm_axe_swing() {
        let mut w = world();
        w.inventory.push(InventoryItem {
            slot: 0,
            name: "Axe".to_string(),
            kind: ItemKind::Tool,
            stack: 1,
            water_level: None,
            water_capacity: None,
            sell_price: None,
        });
        w.selected_slot = 0;
        let mut f = farm();
        f.crops.push(Crop {
            tile: w.player_tile.step(Facing::South),
            species: "Parsnip".to_string(),
            phase: 2,
            final_phase: 4,
            watered: false,
        });
        let bridge = Arc::new(FixedBridge {
            world: Mutex::new(w),
            farm: Mutex::new(f),
            executed: Mutex::new(vec![]),
        });
        let vlm = Arc::new(ScriptedVlm::with(vec![Ok(
            r#"{"reasoning": "chop", "actions": [{"type": "use_tool", "direction": "south"}]}"#
                .to_string(),
        )]));
        let telemetry = Arc::new(RecordingTelemetry::new());
        let mut agent = agent(Arc::clone(&bridge), vlm, Arc::clone(&telemetry));

        agent.tick().await.unwrap();
        let events = telemetry.events();
        let last = events.last().unwrap();
        assert_eq!(last.outcome, TickOutcome::Blocked);
        assert!(last.reason.as_deref().unwrap().contains("crop protection"));
        assert!(
            bridge.executed.lock().unwrap().is_empty(),
            "no primitive may be issued"
        );
    }

    #[tokio::test]
    async fn test_sustained_parse_failures_fall_back_to_chain() {
        let bridge = Arc::new(FixedBridge {
            world: Mutex::new(world()),
            farm: Mutex::new(farm()),
            executed: Mutex::new(vec![]),
        });
        let garbage = || Ok("nope".to_string());
        let vlm = Arc::new(ScriptedVlm::with(vec![garbage(), garbage(), garbage()]));
        let telemetry = Arc::new(RecordingTelemetry::new());
        let mut agent = agent(Arc::clone(&bridge), Arc::clone(&vlm), Arc::clone(&telemetry));

        for _ in 0..4 {
            agent.tick().await.unwrap();
        }
        // after three failures the fallback path stops consulting the VLM
        assert_eq!(vlm.calls(), 3);
        // the neutral fallback proposal was dispatched through the chain
        let last = telemetry.events().last().unwrap().clone();
        assert_ne!(last.outcome, TickOutcome::NoOp);
    }

    #[tokio::test]
    async fn test_observe_only_never_dispatches() {
        let bridge = Arc::new(FixedBridge {
            world: Mutex::new(world()),
            farm: Mutex::new(farm()),
            executed: Mutex::new(vec![]),
        });
        let vlm = Arc::new(ScriptedVlm::with(vec![Ok(
            r#"{"reasoning": "walk", "actions": [{"type": "move_direction", "direction": "east", "tiles": 2}]}"#
                .to_string(),
        )]));
        let telemetry = Arc::new(RecordingTelemetry::new());
        let deps = AgentDeps {
            bridge: Arc::clone(&bridge) as Arc<dyn GameBridge>,
            vlm,
            screenshots: Arc::new(NullScreenshotSource),
            telemetry: Arc::clone(&telemetry) as Arc<dyn TelemetrySink>,
            plan_store: Arc::new(InMemoryPlanStore::default()),
            lesson_store: Arc::new(InMemoryLessonStore::default()),
            reserved: Arc::new(NoReservations),
        };
        let mut agent = AgentLoop::unpaced(Config::default(), deps, true);

        agent.tick().await.unwrap();
        assert!(bridge.executed.lock().unwrap().is_empty());
        assert_eq!(
            telemetry.events().last().unwrap().outcome,
            TickOutcome::Observed
        );
    }
}
