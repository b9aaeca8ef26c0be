//! Declarative skill records.
//!
//! A skill maps a name to preconditions, a primitive template sequence,
//! success criteria, and failure recovery hints. Skills are data: the
//! engine interprets them, nothing here holds behavior or back-references.
//! Definitions are immutable after the library loads.

use serde::{Deserialize, Serialize};

use crate::domain::error::SkillError;
use crate::domain::models::action::PrimitiveAction;
use crate::domain::models::snapshot::{Facing, Position};

/// Tool categories the engine can auto-equip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    /// Tills soil
    Hoe,
    /// Fells trees and chops wood debris
    Axe,
    /// Breaks stones
    Pickaxe,
    /// Cuts weeds and grass
    Scythe,
    /// Waters crops; holds charges
    WateringCan,
    /// Any melee weapon
    Weapon,
}

impl ToolKind {
    /// Name fragments that identify this category in inventory display
    /// names, lowercase. Upgraded tools keep matching ("Copper Hoe").
    pub const fn match_names(&self) -> &'static [&'static str] {
        match self {
            Self::Hoe => &["hoe"],
            Self::Axe => &["axe"],
            Self::Pickaxe => &["pickaxe", "pick"],
            Self::Scythe => &["scythe"],
            Self::WateringCan => &["watering"],
            Self::Weapon => &["sword", "dagger", "club", "blade"],
        }
    }

    /// Whether an inventory display name belongs to this category.
    ///
    /// "Pickaxe" must not satisfy [`ToolKind::Axe`] even though it
    /// contains the fragment.
    pub fn matches_item(&self, name: &str) -> bool {
        let lower = name.to_lowercase();
        if *self == Self::Axe && lower.contains("pickaxe") {
            return false;
        }
        self.match_names().iter().any(|n| lower.contains(n))
    }

    /// Whether a swing of this tool can destroy a planted crop.
    pub const fn is_destructive(&self) -> bool {
        matches!(self, Self::Axe | Self::Pickaxe | Self::Hoe | Self::Weapon)
    }
}

/// Broad grouping for catalog display and telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkillCategory {
    /// Till, plant, water, harvest, clear
    Farming,
    /// Warp and walk
    Movement,
    /// Buy and ship
    Commerce,
    /// Chests and toolbar management
    Inventory,
    /// Mining and monsters
    Combat,
    /// Refill, eat, sleep
    Maintenance,
}

/// A condition checked against a fresh snapshot before any primitive fires.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "check", rename_all = "snake_case")]
pub enum Precondition {
    /// A tool of this category is somewhere in the inventory
    ToolPresent {
        /// Required category
        tool: ToolKind,
    },
    /// The watering can holds at least this many charges
    WaterInCan {
        /// Minimum charges
        min: u32,
    },
    /// The player stands edge-adjacent to the context target tile
    AdjacentToTarget,
    /// At least one seed stack is carried
    SeedsPresent,
    /// At least one shippable stack is carried
    ShippablePresent,
    /// The player is in a named location
    InLocation {
        /// Location table key
        location: String,
    },
    /// The named shop is currently open
    ShopOpen {
        /// Location table key
        location: String,
    },
    /// Energy is above a floor
    EnergyAbove {
        /// Exclusive minimum
        min: f32,
    },
    /// The context item is present in the inventory
    ItemPresent,
}

impl Precondition {
    /// Stable name reported when the check fails.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::ToolPresent { .. } => "tool_present",
            Self::WaterInCan { .. } => "water_in_can",
            Self::AdjacentToTarget => "adjacent_to_target",
            Self::SeedsPresent => "seeds_present",
            Self::ShippablePresent => "shippable_present",
            Self::InLocation { .. } => "in_location",
            Self::ShopOpen { .. } => "shop_open",
            Self::EnergyAbove { .. } => "energy_above",
            Self::ItemPresent => "item_present",
        }
    }
}

/// One step of a skill body: a primitive with holes filled from the
/// calling context. Substitution is a single pass; templates cannot
/// reference other templates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum PrimitiveTemplate {
    /// A literal primitive, no substitution
    Fixed {
        /// The primitive to submit as-is
        action: PrimitiveAction,
    },
    /// Turn toward the context target
    FaceTarget,
    /// Swing the held tool toward the context target
    UseToolOnTarget,
    /// Harvest toward the context target
    HarvestTarget,
    /// Place the held item toward the context target
    PlaceOnTarget,
    /// Swing the weapon toward the context target
    SwingAtTarget,
    /// Select the slot holding the context item (fuzzy name match)
    SelectContextItem,
    /// Ship the context slot (or the held item when none given)
    ShipContextSlot,
    /// Buy the context item at the context quantity
    BuyContextItem,
    /// Warp to the context location
    WarpToContext,
    /// Eat from the context slot
    EatContextSlot,
    /// Open the chest toward the context target
    OpenChestToward,
    /// Deposit the context slot into the open chest
    DepositContextSlot,
}

impl PrimitiveTemplate {
    /// Expand this template against a call context.
    pub fn substitute(&self, ctx: &SkillContext) -> Result<PrimitiveAction, SkillError> {
        let need_dir = || ctx.direction.ok_or(SkillError::MissingParameter("direction"));
        match self {
            Self::Fixed { action } => Ok(action.clone()),
            Self::FaceTarget => Ok(PrimitiveAction::Face {
                direction: need_dir()?,
            }),
            Self::UseToolOnTarget => Ok(PrimitiveAction::UseTool {
                direction: Some(need_dir()?),
            }),
            Self::HarvestTarget => Ok(PrimitiveAction::Harvest {
                direction: need_dir()?,
            }),
            Self::PlaceOnTarget => Ok(PrimitiveAction::PlaceItem {
                direction: need_dir()?,
            }),
            Self::SwingAtTarget => Ok(PrimitiveAction::SwingWeapon {
                direction: need_dir()?,
            }),
            Self::SelectContextItem => {
                let name = ctx
                    .item
                    .clone()
                    .ok_or(SkillError::MissingParameter("item"))?;
                Ok(PrimitiveAction::SelectItemType { name })
            }
            Self::ShipContextSlot => Ok(PrimitiveAction::Ship { slot: ctx.slot }),
            Self::BuyContextItem => Ok(PrimitiveAction::Buy {
                item: ctx
                    .item
                    .clone()
                    .ok_or(SkillError::MissingParameter("item"))?,
                quantity: ctx.quantity.unwrap_or(1),
            }),
            Self::WarpToContext => Ok(PrimitiveAction::Warp {
                location: ctx
                    .location
                    .clone()
                    .ok_or(SkillError::MissingParameter("location"))?,
            }),
            Self::EatContextSlot => Ok(PrimitiveAction::Eat {
                slot: ctx.slot.ok_or(SkillError::MissingParameter("slot"))?,
            }),
            Self::OpenChestToward => Ok(PrimitiveAction::OpenChest {
                direction: need_dir()?,
            }),
            Self::DepositContextSlot => Ok(PrimitiveAction::DepositItem {
                slot: ctx.slot.ok_or(SkillError::MissingParameter("slot"))?,
                quantity: ctx.quantity.unwrap_or(1),
            }),
        }
    }
}

/// Declared post-state the verifier checks after the last primitive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "expect", rename_all = "snake_case")]
pub enum SuccessCriterion {
    /// Target tile is tilled in the post snapshot
    Tilled,
    /// Target tile gained a crop
    Planted,
    /// Target tile's crop is watered
    Watered,
    /// Target tile's crop is gone and produce arrived in inventory
    Harvested,
    /// Target tile's object is gone
    Cleared,
    /// A named stack changed size by a signed amount
    InventoryDelta {
        /// Item name fragment
        item: String,
        /// Expected signed change; sign must match, magnitude is a floor
        delta: i64,
    },
    /// Player ended up in a named location
    LocationIs {
        /// Location table key
        location: String,
    },
    /// Player stands edge-adjacent to the target tile
    AdjacentToTarget,
    /// Watering-can charges increased (or the can is already full)
    CanRefilled,
    /// The context item's stack changed by a signed amount
    ContextItemDelta {
        /// Expected signed change; sign must match, magnitude is a floor
        delta: i64,
    },
    /// Player ended up in the context location
    ContextLocation,
    /// No menu is up in the post snapshot
    MenuClosed,
}

/// Failure class a recovery hint applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// A precondition failed
    Blocked,
    /// Bridge reported success, world did not change
    Phantom,
    /// The bridge rejected a primitive or transport failed
    BridgeError,
}

/// What the executor should try when a skill fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryHint {
    /// Clear the adjacent blocker with the matching tool, then retry
    ClearObstacle,
    /// Re-run tool selection, then retry
    Reequip,
    /// Insert a refill trip, then retry
    RefillWater,
    /// Push the target to the skip-set and move on
    SkipTarget,
}

/// Runtime parameters for one skill invocation.
///
/// Built by the caller (executor, batch routine, or the VLM boundary) and
/// consumed by template substitution; disallowing nested templating keeps
/// this a single flat record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SkillContext {
    /// Tile the skill acts on
    pub target: Option<Position>,
    /// Direction from the standing tile to the target
    pub direction: Option<Facing>,
    /// Toolbar slot parameter
    pub slot: Option<usize>,
    /// Item name parameter
    pub item: Option<String>,
    /// Quantity parameter
    pub quantity: Option<u32>,
    /// Location parameter
    pub location: Option<String>,
    /// Tool override; takes precedence over the skill's `required_tool`
    pub tool: Option<ToolKind>,
}

impl SkillContext {
    /// Context aimed at a target tile from a standing tile.
    pub fn aimed(target: Position, direction: Facing) -> Self {
        Self {
            target: Some(target),
            direction: Some(direction),
            ..Self::default()
        }
    }

    /// Attach an item parameter.
    #[must_use]
    pub fn with_item(mut self, item: impl Into<String>) -> Self {
        self.item = Some(item.into());
        self
    }

    /// Attach a quantity parameter.
    #[must_use]
    pub fn with_quantity(mut self, quantity: u32) -> Self {
        self.quantity = Some(quantity);
        self
    }

    /// Attach a location parameter.
    #[must_use]
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Attach a slot parameter.
    #[must_use]
    pub fn with_slot(mut self, slot: usize) -> Self {
        self.slot = Some(slot);
        self
    }

    /// Attach a tool override.
    #[must_use]
    pub fn with_tool(mut self, tool: ToolKind) -> Self {
        self.tool = Some(tool);
        self
    }
}

/// Result of one skill invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkillOutcome {
    /// Primitives ran and the success criteria hold on the post snapshot
    Verified,
    /// Bridge said success but the world did not change as declared
    PhantomFailed,
    /// A primitive was rejected or transport failed
    Failed {
        /// Opcode of the failing primitive
        primitive: String,
    },
    /// A precondition failed before any primitive fired
    Blocked {
        /// Name of the failed precondition
        precondition: String,
    },
    /// The target became invalid between generation and execution
    Skipped,
}

impl SkillOutcome {
    /// True for the only fully successful outcome.
    pub const fn is_verified(&self) -> bool {
        matches!(self, Self::Verified)
    }
}

/// A complete declarative skill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillDef {
    /// Unique name, the executor's and VLM's handle
    pub name: String,
    /// Catalog grouping
    pub category: SkillCategory,
    /// Checks run against a fresh snapshot before execution
    pub preconditions: Vec<Precondition>,
    /// Tool category to auto-equip; the engine prepends the slot selection
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_tool: Option<ToolKind>,
    /// Ordered primitive templates
    pub actions: Vec<PrimitiveTemplate>,
    /// Post-state the verifier must confirm
    pub success: Vec<SuccessCriterion>,
    /// Recovery hints by failure class
    #[serde(default)]
    pub on_failure: Vec<(FailureKind, RecoveryHint)>,
}

impl SkillDef {
    /// Recovery hint for a failure class, if the skill declares one.
    pub fn recovery_for(&self, kind: FailureKind) -> Option<RecoveryHint> {
        self.on_failure
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, h)| *h)
    }
}
