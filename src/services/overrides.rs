//! Override chain: the hard shell around a soft oracle.
//!
//! A strict ordered list of predicates over (snapshot, proposed action).
//! Evaluated top-down, first match wins; chain order encodes priority.
//! Every rule is a pure function of the context it is handed; there is no
//! ambient mutable state here.

use tracing::debug;

use crate::domain::models::action::{ChosenAction, PrimitiveAction};
use crate::domain::models::config::AgentConfig;
use crate::domain::models::farm::FarmSnapshot;
use crate::domain::models::locations::{self, SEED_SHOP};
use crate::domain::models::skill::ToolKind;
use crate::domain::models::snapshot::{Facing, Position, Surroundings, TileKind, WorldSnapshot};
use crate::domain::ports::stores::ReservedItems;

/// Everything a rule may look at.
pub struct OverrideContext<'a> {
    /// Player-centric snapshot
    pub world: &'a WorldSnapshot,
    /// The four adjacent tiles
    pub surroundings: &'a Surroundings,
    /// Farm-wide snapshot
    pub farm: &'a FarmSnapshot,
    /// Loop tuning thresholds
    pub config: &'a AgentConfig,
    /// Reserved-items policy for the ship rule
    pub reserved: &'a dyn ReservedItems,
    /// How many consecutive ticks this same action was proposed while the
    /// player's position did not change
    pub action_repeats: u32,
}

/// A single rule's verdict when it matches.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    /// Substitute a safer or higher-priority action
    Replace {
        /// The replacement
        action: ChosenAction,
        /// Why, for telemetry
        reason: String,
    },
    /// Cancel the action outright
    Block {
        /// Why, for telemetry
        reason: String,
    },
}

/// Chain output for one proposed action.
#[derive(Debug, Clone, PartialEq)]
pub enum ChainDecision {
    /// No rule matched; dispatch as proposed
    Keep(ChosenAction),
    /// A rule substituted the action
    Replaced {
        /// Rule that fired
        rule: &'static str,
        /// The replacement to dispatch
        action: ChosenAction,
        /// Why
        reason: String,
    },
    /// A rule cancelled the action; nothing is dispatched
    Blocked {
        /// Rule that fired
        rule: &'static str,
        /// Why
        reason: String,
    },
}

/// One predicate in the chain.
pub trait OverrideRule: Send + Sync {
    /// Stable rule name for telemetry.
    fn name(&self) -> &'static str;

    /// Verdict when this rule matches, None otherwise.
    fn apply(&self, ctx: &OverrideContext<'_>, action: &ChosenAction) -> Option<Verdict>;
}

/// The ordered chain.
pub struct OverrideChain {
    rules: Vec<Box<dyn OverrideRule>>,
}

impl OverrideChain {
    /// The standard eight-rule chain, in priority order.
    pub fn standard() -> Self {
        Self {
            rules: vec![
                Box::new(DismissPopup),
                Box::new(LateNightBed),
                Box::new(PriorityShip),
                Box::new(NoSeeds),
                Box::new(EdgeStuck),
                Box::new(EmptyWateringCan),
                Box::new(AdjacentFilter),
                Box::new(CropProtection),
            ],
        }
    }

    /// A chain with custom rules, for tests.
    pub fn with_rules(rules: Vec<Box<dyn OverrideRule>>) -> Self {
        Self { rules }
    }

    /// Run the chain top-down; the first matching rule wins.
    pub fn apply(&self, ctx: &OverrideContext<'_>, action: ChosenAction) -> ChainDecision {
        for rule in &self.rules {
            if let Some(verdict) = rule.apply(ctx, &action) {
                debug!(rule = rule.name(), proposed = %action.describe(), "override fired");
                return match verdict {
                    Verdict::Replace {
                        action: replacement,
                        reason,
                    } => ChainDecision::Replaced {
                        rule: rule.name(),
                        action: replacement,
                        reason,
                    },
                    Verdict::Block { reason } => ChainDecision::Blocked {
                        rule: rule.name(),
                        reason,
                    },
                };
            }
        }
        ChainDecision::Keep(action)
    }
}

/// Tool category of the currently held item, if it is a tool.
fn held_tool(world: &WorldSnapshot) -> Option<ToolKind> {
    const KINDS: [ToolKind; 6] = [
        ToolKind::Hoe,
        ToolKind::Pickaxe,
        ToolKind::Axe,
        ToolKind::Scythe,
        ToolKind::WateringCan,
        ToolKind::Weapon,
    ];
    let item = world.selected_item()?;
    KINDS.into_iter().find(|k| k.matches_item(&item.name))
}

/// Tile a directed swing would hit.
fn swing_tile(world: &WorldSnapshot, action: &PrimitiveAction) -> Option<Position> {
    if !action.is_swing() {
        return None;
    }
    let dir = action.direction().unwrap_or(world.facing);
    Some(world.player_tile.step(dir))
}

// 1. Modal menus eat every non-menu input; close them first.
struct DismissPopup;

impl OverrideRule for DismissPopup {
    fn name(&self) -> &'static str {
        "dismiss_popup"
    }

    fn apply(&self, ctx: &OverrideContext<'_>, action: &ChosenAction) -> Option<Verdict> {
        (ctx.world.menu_open && !action.is_menu_op()).then(|| Verdict::Replace {
            action: ChosenAction::Primitive(PrimitiveAction::DismissMenu),
            reason: "a menu is up".to_string(),
        })
    }
}

// 2. Past the late threshold or under critical energy, bed wins.
struct LateNightBed;

impl OverrideRule for LateNightBed {
    fn name(&self) -> &'static str {
        "late_night_bed"
    }

    fn apply(&self, ctx: &OverrideContext<'_>, action: &ChosenAction) -> Option<Verdict> {
        let tired = ctx.world.is_past(ctx.config.late_night_time)
            || ctx.world.energy < ctx.config.critical_energy;
        let already_bed = matches!(action, ChosenAction::Primitive(PrimitiveAction::GoToBed))
            || action.describe() == "go_to_bed";
        (tired && !already_bed).then(|| Verdict::Replace {
            action: ChosenAction::skill("go_to_bed"),
            reason: format!(
                "time {} / energy {:.0}: sleep beats everything else",
                ctx.world.time, ctx.world.energy
            ),
        })
    }
}

// 3. Standing next to the bin with sellables in the bag: ship now.
struct PriorityShip;

impl OverrideRule for PriorityShip {
    fn name(&self) -> &'static str {
        "priority_ship"
    }

    fn apply(&self, ctx: &OverrideContext<'_>, action: &ChosenAction) -> Option<Verdict> {
        if action.describe() == "ship_item" {
            return None;
        }
        let bin = ctx.farm.shipping_bin?;
        if ctx.world.player_tile.manhattan(bin) > ctx.config.ship_radius {
            return None;
        }
        let sellable = ctx
            .world
            .shippable_items()
            .find(|i| !ctx.reserved.is_reserved(&i.name))?;
        Some(Verdict::Replace {
            action: ChosenAction::Skill {
                name: "ship_item".to_string(),
                target: Some(bin),
                direction: None,
                item: Some(sellable.name.clone()),
                quantity: None,
                location: None,
            },
            reason: format!("{} in bag, bin {} tiles away", sellable.name, ctx.world.player_tile.manhattan(bin)),
        })
    }
}

// 4. Farming with zero seeds while the shop is open is wasted time.
struct NoSeeds;

impl OverrideRule for NoSeeds {
    fn name(&self) -> &'static str {
        "no_seeds"
    }

    fn apply(&self, ctx: &OverrideContext<'_>, action: &ChosenAction) -> Option<Verdict> {
        if !action.is_farming() || ctx.world.seed_count() > 0 {
            return None;
        }
        let shop = locations::location(SEED_SHOP)?;
        shop.is_open(ctx.world.time, ctx.world.day_of_year)
            .then(|| Verdict::Replace {
                action: ChosenAction::Skill {
                    name: "warp_to".to_string(),
                    target: None,
                    direction: None,
                    item: None,
                    quantity: None,
                    location: Some(SEED_SHOP.to_string()),
                },
                reason: "no seeds in inventory and the shop is open".to_string(),
            })
    }
}

// 5. Walking into a map edge three times is not going to start working.
struct EdgeStuck;

impl OverrideRule for EdgeStuck {
    fn name(&self) -> &'static str {
        "edge_stuck"
    }

    fn apply(&self, ctx: &OverrideContext<'_>, _action: &ChosenAction) -> Option<Verdict> {
        if ctx.action_repeats < 3 || !ctx.farm.bounds.on_edge(ctx.world.player_tile) {
            return None;
        }
        if ctx.world.is_past(ctx.config.late_night_time) {
            return Some(Verdict::Replace {
                action: ChosenAction::skill("go_to_bed"),
                reason: "stuck at map edge at night".to_string(),
            });
        }
        let center = ctx.farm.active_plot.center();
        let player = ctx.world.player_tile;
        let dx = center.x - player.x;
        let dy = center.y - player.y;
        let direction = if dx.abs() >= dy.abs() {
            if dx >= 0 {
                Facing::East
            } else {
                Facing::West
            }
        } else if dy >= 0 {
            Facing::South
        } else {
            Facing::North
        };
        Some(Verdict::Replace {
            action: ChosenAction::Primitive(PrimitiveAction::MoveDirection { direction, tiles: 1 }),
            reason: format!("repeated action at map edge; retreating {direction}"),
        })
    }
}

// 6. Watering with an empty can only animates.
struct EmptyWateringCan;

impl OverrideRule for EmptyWateringCan {
    fn name(&self) -> &'static str {
        "empty_watering_can"
    }

    fn apply(&self, ctx: &OverrideContext<'_>, action: &ChosenAction) -> Option<Verdict> {
        if action.describe() != "water_crop" || ctx.world.water_level() != Some(0) {
            return None;
        }
        let target = ctx.farm.nearest_water(ctx.world.player_tile);
        Some(Verdict::Replace {
            action: ChosenAction::Skill {
                name: "refill_watering_can".to_string(),
                target,
                direction: None,
                item: None,
                quantity: None,
                location: None,
            },
            reason: "watering can is empty".to_string(),
        })
    }
}

// 7. Redirect a mis-aimed tool swing to an adjacent tile it can act on.
struct AdjacentFilter;

impl AdjacentFilter {
    fn valid_for(tool: ToolKind, kind: TileKind) -> bool {
        match tool {
            ToolKind::Hoe => kind == TileKind::Clear,
            ToolKind::WateringCan => kind == TileKind::Planted,
            ToolKind::Scythe | ToolKind::Axe | ToolKind::Pickaxe => kind == TileKind::Debris,
            ToolKind::Weapon => true,
        }
    }
}

impl OverrideRule for AdjacentFilter {
    fn name(&self) -> &'static str {
        "adjacent_filter"
    }

    fn apply(&self, ctx: &OverrideContext<'_>, action: &ChosenAction) -> Option<Verdict> {
        let ChosenAction::Primitive(p @ PrimitiveAction::UseTool { .. }) = action else {
            return None;
        };
        let tool = held_tool(ctx.world)?;
        if tool == ToolKind::Weapon {
            return None;
        }
        let aimed = p.direction().unwrap_or(ctx.world.facing);
        // a destructive swing aimed at a crop is crop protection's case
        if tool.is_destructive()
            && ctx
                .farm
                .crop_at(ctx.world.player_tile.step(aimed))
                .is_some()
        {
            return None;
        }
        if Self::valid_for(tool, ctx.surroundings.get(aimed).kind) {
            return None;
        }
        match ctx
            .surroundings
            .iter()
            .find(|(_, tile)| Self::valid_for(tool, tile.kind))
        {
            Some((facing, _)) => Some(Verdict::Replace {
                action: ChosenAction::Primitive(PrimitiveAction::UseTool {
                    direction: Some(facing),
                }),
                reason: format!("retargeted {tool:?} swing from {aimed} to {facing}"),
            }),
            None => Some(Verdict::Block {
                reason: format!("no adjacent tile is a valid {tool:?} target"),
            }),
        }
    }
}

// 8. Nothing gets to destroy a planted crop, VLM or not.
struct CropProtection;

impl OverrideRule for CropProtection {
    fn name(&self) -> &'static str {
        "crop_protection"
    }

    fn apply(&self, ctx: &OverrideContext<'_>, action: &ChosenAction) -> Option<Verdict> {
        let threatened = match action {
            ChosenAction::Primitive(p) => {
                let tile = swing_tile(ctx.world, p)?;
                let destructive = held_tool(ctx.world).is_some_and(|t| t.is_destructive())
                    || matches!(p, PrimitiveAction::SwingWeapon { .. });
                (destructive && ctx.farm.crop_at(tile).is_some()).then_some(tile)
            }
            ChosenAction::Skill { name, target, .. } => {
                let destructive_skill = matches!(name.as_str(), "till_soil" | "clear_debris");
                target.filter(|t| destructive_skill && ctx.farm.crop_at(*t).is_some())
            }
        }?;
        Some(Verdict::Block {
            reason: format!("crop protection: crop at {threatened}"),
        })
    }
}
