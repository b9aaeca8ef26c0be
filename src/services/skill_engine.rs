//! Skill execution engine.
//!
//! Runs one skill invocation end to end: precondition check against fresh
//! snapshots, tool auto-selection, parameter substitution, primitive
//! submission with class-matched settle waits, and post-execution state
//! verification. The engine owns the tick while it runs; the VLM never
//! sees the primitives it issues.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::domain::error::{BridgeError, SkillError};
use crate::domain::models::action::PrimitiveAction;
use crate::domain::models::farm::FarmSnapshot;
use crate::domain::models::locations;
use crate::domain::models::skill::{
    Precondition, SkillContext, SkillDef, SkillOutcome, SuccessCriterion,
};
use crate::domain::models::snapshot::WorldSnapshot;
use crate::domain::ports::bridge::GameBridge;
use crate::services::skill_library::SkillLibrary;
use crate::services::verifier::{StateVerifier, WorldView};

/// Interprets [`SkillDef`] records against the bridge.
#[derive(Clone)]
pub struct SkillEngine {
    library: Arc<SkillLibrary>,
    /// Wait before the verification snapshot; must cover the bridge's
    /// state-cache refresh interval
    cache_refresh: Duration,
    /// When set, replaces every per-primitive settle wait (tests)
    settle_override: Option<Duration>,
}

impl SkillEngine {
    /// Engine over a catalog, with the bridge's cache-refresh interval.
    pub fn new(library: Arc<SkillLibrary>, cache_refresh: Duration) -> Self {
        Self {
            library,
            cache_refresh,
            settle_override: None,
        }
    }

    /// Engine that never sleeps, for tests.
    pub fn unpaced(library: Arc<SkillLibrary>) -> Self {
        Self {
            library,
            cache_refresh: Duration::ZERO,
            settle_override: Some(Duration::ZERO),
        }
    }

    /// The catalog this engine interprets.
    pub fn library(&self) -> &SkillLibrary {
        &self.library
    }

    /// Run one skill invocation.
    pub async fn run(
        &self,
        name: &str,
        ctx: &SkillContext,
        bridge: &dyn GameBridge,
    ) -> Result<SkillOutcome, SkillError> {
        let skill = self
            .library
            .get(name)
            .ok_or_else(|| SkillError::UnknownSkill(name.to_string()))?;

        let (pre_world, pre_farm) = match self.snapshots(bridge).await {
            Ok(pair) => pair,
            Err(e) => {
                warn!(skill = name, error = %e, "pre-snapshot failed");
                return Ok(SkillOutcome::Failed {
                    primitive: "snapshot".to_string(),
                });
            }
        };

        // target may have changed between generation and now
        if let Some(outcome) = Self::precheck_target(skill, ctx, &pre_farm) {
            return Ok(outcome);
        }

        if let Some(failed) = Self::failed_precondition(skill, ctx, &pre_world, &pre_farm) {
            return Ok(SkillOutcome::Blocked {
                precondition: failed.to_string(),
            });
        }

        let mut primitives: Vec<PrimitiveAction> = Vec::with_capacity(skill.actions.len() + 1);

        // tool auto-selection: resolve the slot dynamically, fuzzy names
        let tool = ctx.tool.or(skill.required_tool);
        if let Some(tool) = tool {
            let Some(slot_item) = pre_world.find_tool(tool) else {
                return Ok(SkillOutcome::Blocked {
                    precondition: "tool_present".to_string(),
                });
            };
            // refuse to swing anything that would destroy a planted crop,
            // even if the caller or bridge would accept it
            if tool.is_destructive()
                && ctx
                    .target
                    .is_some_and(|t| pre_farm.crop_at(t).is_some())
            {
                return Ok(SkillOutcome::Blocked {
                    precondition: "crop_protection".to_string(),
                });
            }
            primitives.push(PrimitiveAction::SelectSlot {
                slot: slot_item.slot,
            });
        }

        for template in &skill.actions {
            primitives.push(template.substitute(ctx)?);
        }

        for primitive in &primitives {
            debug!(skill = name, opcode = primitive.opcode(), "submitting primitive");
            match bridge.execute(primitive).await {
                Ok(resp) if resp.success => {}
                Ok(resp) => {
                    debug!(
                        skill = name,
                        opcode = primitive.opcode(),
                        message = resp.message.as_deref().unwrap_or(""),
                        "bridge refused primitive"
                    );
                    return Ok(SkillOutcome::Failed {
                        primitive: primitive.opcode().to_string(),
                    });
                }
                Err(e) => {
                    debug!(skill = name, opcode = primitive.opcode(), error = %e, "bridge error");
                    return Ok(SkillOutcome::Failed {
                        primitive: primitive.opcode().to_string(),
                    });
                }
            }
            self.settle(primitive).await;
        }

        if skill.success.is_empty() {
            return Ok(SkillOutcome::Verified);
        }

        // the verification snapshot must postdate the cache refresh
        tokio::time::sleep(self.cache_refresh).await;
        let (post_world, post_farm) = match self.snapshots(bridge).await {
            Ok(pair) => pair,
            Err(e) => {
                warn!(skill = name, error = %e, "post-snapshot failed");
                return Ok(SkillOutcome::Failed {
                    primitive: "snapshot".to_string(),
                });
            }
        };

        let verified = StateVerifier::verify(
            &skill.success,
            ctx,
            WorldView::new(&pre_world, &pre_farm),
            WorldView::new(&post_world, &post_farm),
        );
        if verified {
            Ok(SkillOutcome::Verified)
        } else {
            Ok(SkillOutcome::PhantomFailed)
        }
    }

    async fn snapshots(
        &self,
        bridge: &dyn GameBridge,
    ) -> Result<(WorldSnapshot, FarmSnapshot), BridgeError> {
        let world = bridge.get_state().await?;
        let farm = bridge.get_farm().await?;
        Ok((world, farm))
    }

    async fn settle(&self, primitive: &PrimitiveAction) {
        let wait = self
            .settle_override
            .unwrap_or_else(|| primitive.settle_interval().max(self.cache_refresh));
        if !wait.is_zero() {
            tokio::time::sleep(wait).await;
        }
    }

    /// Skip or short-circuit when the target no longer matches the
    /// skill's expectations.
    fn precheck_target(
        skill: &SkillDef,
        ctx: &SkillContext,
        farm: &FarmSnapshot,
    ) -> Option<SkillOutcome> {
        let target = ctx.target?;
        for criterion in &skill.success {
            match criterion {
                SuccessCriterion::Watered => match farm.crop_at(target) {
                    None => return Some(SkillOutcome::Skipped),
                    Some(c) if c.watered => return Some(SkillOutcome::Verified),
                    Some(_) => {}
                },
                SuccessCriterion::Harvested => match farm.crop_at(target) {
                    None => return Some(SkillOutcome::Skipped),
                    Some(c) if !c.is_ready() => return Some(SkillOutcome::Skipped),
                    Some(_) => {}
                },
                SuccessCriterion::Cleared => {
                    if farm.object_at(target).is_none() {
                        return Some(SkillOutcome::Skipped);
                    }
                }
                SuccessCriterion::Planted => {
                    if farm.crop_at(target).is_some() || !farm.is_tilled(target) {
                        return Some(SkillOutcome::Skipped);
                    }
                }
                SuccessCriterion::Tilled => {
                    if farm.is_tilled(target) && farm.crop_at(target).is_none() {
                        return Some(SkillOutcome::Verified);
                    }
                }
                _ => {}
            }
        }
        None
    }

    /// Name of the first failing precondition, if any.
    fn failed_precondition(
        skill: &SkillDef,
        ctx: &SkillContext,
        world: &WorldSnapshot,
        farm: &FarmSnapshot,
    ) -> Option<&'static str> {
        skill
            .preconditions
            .iter()
            .find(|p| !Self::precondition_holds(p, ctx, world, farm))
            .map(|p| p.name())
    }

    fn precondition_holds(
        p: &Precondition,
        ctx: &SkillContext,
        world: &WorldSnapshot,
        _farm: &FarmSnapshot,
    ) -> bool {
        match p {
            Precondition::ToolPresent { tool } => world.find_tool(*tool).is_some(),
            Precondition::WaterInCan { min } => world.water_level().is_some_and(|w| w >= *min),
            Precondition::AdjacentToTarget => ctx
                .target
                .is_some_and(|t| world.player_tile.is_adjacent(t)),
            Precondition::SeedsPresent => world.seed_count() > 0,
            Precondition::ShippablePresent => world.shippable_items().next().is_some(),
            Precondition::InLocation { location } => world.location == *location,
            Precondition::ShopOpen { location } => locations::location(location)
                .is_some_and(|l| l.is_open(world.time, world.day_of_year)),
            Precondition::EnergyAbove { min } => world.energy > *min,
            Precondition::ItemPresent => ctx
                .item
                .as_deref()
                .is_some_and(|i| world.find_item(i).is_some()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::farm::{Crop, FarmObject, PlotBounds};
    use crate::domain::models::skill::ToolKind;
    use crate::domain::models::snapshot::{
        Facing, InventoryItem, ItemKind, Position, Season, Surroundings, Weather,
    };
    use crate::domain::ports::bridge::{ActionResponse, PathCheck};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Scripted bridge: serves fixed snapshots, records primitives, and
    /// optionally applies a watering mutation on `use_tool`.
    struct StubBridge {
        world: Mutex<WorldSnapshot>,
        farm: Mutex<FarmSnapshot>,
        executed: Mutex<Vec<PrimitiveAction>>,
        apply_watering: bool,
    }

    impl StubBridge {
        fn new(world: WorldSnapshot, farm: FarmSnapshot, apply_watering: bool) -> Self {
            Self {
                world: Mutex::new(world),
                farm: Mutex::new(farm),
                executed: Mutex::new(Vec::new()),
                apply_watering,
            }
        }

        fn executed(&self) -> Vec<PrimitiveAction> {
            self.executed.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl GameBridge for StubBridge {
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
                path_length: 1,
            })
        }
        async fn execute(&self, action: &PrimitiveAction) -> Result<ActionResponse, BridgeError> {
            self.executed.lock().unwrap().push(action.clone());
            if self.apply_watering {
                if let PrimitiveAction::SelectSlot { slot } = action {
                    self.world.lock().unwrap().selected_slot = *slot;
                }
                if matches!(action, PrimitiveAction::UseTool { .. }) {
                    let mut farm = self.farm.lock().unwrap();
                    for crop in &mut farm.crops {
                        if crop.tile == TILE {
                            crop.watered = true;
                        }
                    }
                }
            }
            Ok(ActionResponse::ok())
        }
    }

    const TILE: Position = Position::new(60, 18);

    fn watering_can(slot: usize, charges: u32) -> InventoryItem {
        InventoryItem {
            slot,
            name: "Watering Can".to_string(),
            kind: ItemKind::Tool,
            stack: 1,
            water_level: Some(charges),
            water_capacity: Some(40),
            sell_price: None,
        }
    }

    fn world(inventory: Vec<InventoryItem>) -> WorldSnapshot {
        WorldSnapshot {
            time: 900,
            weather: Weather::Sunny,
            season: Season::Spring,
            day_of_year: 5,
            player_tile: Position::new(60, 17),
            facing: Facing::South,
            energy: 200.0,
            health: 100,
            money: 500,
            inventory,
            selected_slot: 0,
            location: "Farm".to_string(),
            menu_open: false,
        }
    }

    fn farm_with_crop(watered: bool) -> FarmSnapshot {
        FarmSnapshot {
            tilled: vec![TILE],
            crops: vec![Crop {
                tile: TILE,
                species: "Parsnip".to_string(),
                phase: 2,
                final_phase: 4,
                watered,
            }],
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

    fn engine() -> SkillEngine {
        SkillEngine::unpaced(Arc::new(SkillLibrary::builtin()))
    }

    #[tokio::test]
    async fn test_water_crop_verified() {
        let bridge = StubBridge::new(
            world(vec![watering_can(3, 10)]),
            farm_with_crop(false),
            true,
        );
        let ctx = SkillContext::aimed(TILE, Facing::South);

        let outcome = engine().run("water_crop", &ctx, &bridge).await.unwrap();
        assert_eq!(outcome, SkillOutcome::Verified);

        // select_slot(can) -> face -> use_tool
        let executed = bridge.executed();
        assert_eq!(
            executed[0],
            PrimitiveAction::SelectSlot { slot: 3 },
            "tool auto-selection must come first"
        );
        assert!(matches!(executed[1], PrimitiveAction::Face { .. }));
        assert!(matches!(executed[2], PrimitiveAction::UseTool { .. }));
    }

    #[tokio::test]
    async fn test_water_already_watered_is_idempotent() {
        let bridge = StubBridge::new(world(vec![watering_can(3, 10)]), farm_with_crop(true), false);
        let ctx = SkillContext::aimed(TILE, Facing::South);

        let outcome = engine().run("water_crop", &ctx, &bridge).await.unwrap();
        assert_eq!(outcome, SkillOutcome::Verified);
        assert!(bridge.executed().is_empty(), "no primitive may be issued");
    }

    #[tokio::test]
    async fn test_water_without_can_blocked() {
        let bridge = StubBridge::new(world(vec![]), farm_with_crop(false), false);
        let ctx = SkillContext::aimed(TILE, Facing::South);

        let outcome = engine().run("water_crop", &ctx, &bridge).await.unwrap();
        assert_eq!(
            outcome,
            SkillOutcome::Blocked {
                precondition: "tool_present".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_empty_can_blocked_on_water_level() {
        let bridge = StubBridge::new(world(vec![watering_can(3, 0)]), farm_with_crop(false), false);
        let ctx = SkillContext::aimed(TILE, Facing::South);

        let outcome = engine().run("water_crop", &ctx, &bridge).await.unwrap();
        assert_eq!(
            outcome,
            SkillOutcome::Blocked {
                precondition: "water_in_can".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_phantom_failure_detected() {
        // bridge says success but never mutates the farm
        let bridge = StubBridge::new(
            world(vec![watering_can(3, 10)]),
            farm_with_crop(false),
            false,
        );
        let ctx = SkillContext::aimed(TILE, Facing::South);

        let outcome = engine().run("water_crop", &ctx, &bridge).await.unwrap();
        assert_eq!(outcome, SkillOutcome::PhantomFailed);
    }

    #[tokio::test]
    async fn test_till_on_crop_always_blocked() {
        let mut inv = world(vec![watering_can(3, 10)]);
        inv.inventory.push(InventoryItem {
            slot: 0,
            name: "Hoe".to_string(),
            kind: ItemKind::Tool,
            stack: 1,
            water_level: None,
            water_capacity: None,
            sell_price: None,
        });
        let bridge = StubBridge::new(inv, farm_with_crop(false), false);
        let ctx = SkillContext::aimed(TILE, Facing::South);

        let outcome = engine().run("till_soil", &ctx, &bridge).await.unwrap();
        assert_eq!(
            outcome,
            SkillOutcome::Blocked {
                precondition: "crop_protection".to_string()
            }
        );
        assert!(bridge.executed().is_empty());
    }

    #[tokio::test]
    async fn test_harvest_gone_crop_skipped() {
        let mut farm = farm_with_crop(false);
        farm.crops.clear();
        let bridge = StubBridge::new(world(vec![]), farm, false);
        let ctx = SkillContext::aimed(TILE, Facing::South);

        let outcome = engine().run("harvest_crop", &ctx, &bridge).await.unwrap();
        assert_eq!(outcome, SkillOutcome::Skipped);
    }

    #[tokio::test]
    async fn test_unknown_skill_is_an_error() {
        let bridge = StubBridge::new(world(vec![]), farm_with_crop(false), false);
        let err = engine()
            .run("juggle", &SkillContext::default(), &bridge)
            .await
            .unwrap_err();
        assert_eq!(err, SkillError::UnknownSkill("juggle".to_string()));
    }

    #[tokio::test]
    async fn test_not_adjacent_blocked() {
        let mut w = world(vec![watering_can(3, 10)]);
        w.player_tile = Position::new(10, 10);
        let bridge = StubBridge::new(w, farm_with_crop(false), false);
        let ctx = SkillContext::aimed(TILE, Facing::South);

        let outcome = engine().run("water_crop", &ctx, &bridge).await.unwrap();
        assert_eq!(
            outcome,
            SkillOutcome::Blocked {
                precondition: "adjacent_to_target".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_clear_debris_with_context_tool() {
        let mut w = world(vec![InventoryItem {
            slot: 2,
            name: "Pickaxe".to_string(),
            kind: ItemKind::Tool,
            stack: 1,
            water_level: None,
            water_capacity: None,
            sell_price: None,
        }]);
        w.player_tile = Position::new(60, 17);
        let mut farm = farm_with_crop(false);
        farm.crops.clear();
        farm.objects.push(FarmObject::named(TILE, "Stone"));
        let bridge = StubBridge::new(w, farm, false);
        let ctx = SkillContext::aimed(TILE, Facing::South).with_tool(ToolKind::Pickaxe);

        // bridge never removes the stone: phantom, but the tool was selected
        let outcome = engine().run("clear_debris", &ctx, &bridge).await.unwrap();
        assert_eq!(outcome, SkillOutcome::PhantomFailed);
        assert_eq!(bridge.executed()[0], PrimitiveAction::SelectSlot { slot: 2 });
    }
}
