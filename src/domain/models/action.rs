//! Primitive actions and the shapes the VLM proposes them in.
//!
//! A primitive is a single opcode sent to the game bridge. The VLM never
//! sees raw primitives; its loose JSON is mapped onto [`ChosenAction`] at
//! the boundary and rejected when it fits neither a skill nor an opcode.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::models::snapshot::{Facing, Position};

/// One bridge call: opcode plus its parameter bag.
///
/// Serialization matches the bridge wire format: a tagged object with the
/// opcode under `"action"` and parameters inline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum PrimitiveAction {
    /// Walk N tiles in a direction
    MoveDirection {
        /// Direction to walk
        direction: Facing,
        /// Number of tiles
        tiles: u32,
    },
    /// Pathfind to an absolute tile
    MoveTo {
        /// Destination column
        x: i32,
        /// Destination row
        y: i32,
    },
    /// Instant travel to a named location
    Warp {
        /// Location name from the location table
        location: String,
    },
    /// Turn without moving
    Face {
        /// New facing
        direction: Facing,
    },
    /// Select a toolbar slot
    SelectSlot {
        /// Slot index
        slot: usize,
    },
    /// Select the first slot whose item name matches
    SelectItemType {
        /// Name fragment, case-insensitive
        name: String,
    },
    /// Swing/use the held tool
    UseTool {
        /// Optional facing to turn to first
        #[serde(default, skip_serializing_if = "Option::is_none")]
        direction: Option<Facing>,
    },
    /// Interact with an absolute tile
    Interact {
        /// Target column
        x: i32,
        /// Target row
        y: i32,
    },
    /// Interact with the faced tile
    InteractFacing,
    /// Harvest the crop on the faced/adjacent tile
    Harvest {
        /// Direction of the crop
        direction: Facing,
    },
    /// Put a slot (or the held item, slot = None) into the shipping bin
    Ship {
        /// Slot index; None ships the held item
        #[serde(default, skip_serializing_if = "Option::is_none")]
        slot: Option<usize>,
    },
    /// Eat from a slot
    Eat {
        /// Slot index
        slot: usize,
    },
    /// Buy from the open shop menu
    Buy {
        /// Item name
        item: String,
        /// Quantity
        quantity: u32,
    },
    /// Place the held item on the faced tile
    PlaceItem {
        /// Direction to place toward
        direction: Facing,
    },
    /// Craft from a known recipe
    Craft {
        /// Recipe name
        item: String,
        /// Quantity
        quantity: u32,
    },
    /// Open an adjacent chest
    OpenChest {
        /// Direction of the chest
        direction: Facing,
    },
    /// Move a slot into the open chest
    DepositItem {
        /// Slot index
        slot: usize,
        /// Quantity
        quantity: u32,
    },
    /// Take from the open chest
    WithdrawItem {
        /// Chest slot index
        slot: usize,
        /// Quantity
        quantity: u32,
    },
    /// Enter a specific mine floor from the elevator
    EnterMineLevel {
        /// Floor number
        level: u32,
    },
    /// Descend via the current floor's ladder
    UseLadder,
    /// Swing the equipped weapon
    SwingWeapon {
        /// Attack direction
        direction: Facing,
    },
    /// Close the topmost menu/dialogue
    DismissMenu,
    /// Confirm the active dialog
    ConfirmDialog,
    /// Walk to bed and end the day
    GoToBed,
}

impl PrimitiveAction {
    /// Wire opcode string.
    pub const fn opcode(&self) -> &'static str {
        match self {
            Self::MoveDirection { .. } => "move_direction",
            Self::MoveTo { .. } => "move_to",
            Self::Warp { .. } => "warp",
            Self::Face { .. } => "face",
            Self::SelectSlot { .. } => "select_slot",
            Self::SelectItemType { .. } => "select_item_type",
            Self::UseTool { .. } => "use_tool",
            Self::Interact { .. } => "interact",
            Self::InteractFacing => "interact_facing",
            Self::Harvest { .. } => "harvest",
            Self::Ship { .. } => "ship",
            Self::Eat { .. } => "eat",
            Self::Buy { .. } => "buy",
            Self::PlaceItem { .. } => "place_item",
            Self::Craft { .. } => "craft",
            Self::OpenChest { .. } => "open_chest",
            Self::DepositItem { .. } => "deposit_item",
            Self::WithdrawItem { .. } => "withdraw_item",
            Self::EnterMineLevel { .. } => "enter_mine_level",
            Self::UseLadder => "use_ladder",
            Self::SwingWeapon { .. } => "swing_weapon",
            Self::DismissMenu => "dismiss_menu",
            Self::ConfirmDialog => "confirm_dialog",
            Self::GoToBed => "go_to_bed",
        }
    }

    /// Minimum wait after this primitive before the next one, matched to
    /// the primitive class. Verification snapshots additionally wait out
    /// the bridge's cache-refresh interval.
    pub const fn settle_interval(&self) -> Duration {
        match self {
            Self::Face { .. } | Self::SelectSlot { .. } | Self::SelectItemType { .. } => {
                Duration::from_millis(150)
            }
            Self::UseTool { .. } | Self::SwingWeapon { .. } => Duration::from_millis(500),
            Self::Harvest { .. } => Duration::from_millis(300),
            Self::DismissMenu
            | Self::ConfirmDialog
            | Self::Buy { .. }
            | Self::Ship { .. }
            | Self::Eat { .. }
            | Self::DepositItem { .. }
            | Self::WithdrawItem { .. }
            | Self::OpenChest { .. }
            | Self::Craft { .. } => Duration::from_millis(300),
            Self::Warp { .. } | Self::EnterMineLevel { .. } | Self::UseLadder | Self::GoToBed => {
                Duration::from_millis(1000)
            }
            Self::MoveDirection { .. }
            | Self::MoveTo { .. }
            | Self::Interact { .. }
            | Self::InteractFacing
            | Self::PlaceItem { .. } => Duration::from_millis(300),
        }
    }

    /// Operations that act on an open menu rather than the world.
    pub const fn is_menu_op(&self) -> bool {
        matches!(
            self,
            Self::DismissMenu
                | Self::ConfirmDialog
                | Self::Buy { .. }
                | Self::DepositItem { .. }
                | Self::WithdrawItem { .. }
        )
    }

    /// Directed tool/weapon swings that can destroy what they hit.
    pub const fn is_swing(&self) -> bool {
        matches!(self, Self::UseTool { .. } | Self::SwingWeapon { .. })
    }

    /// The explicit direction parameter, if this primitive carries one.
    pub const fn direction(&self) -> Option<Facing> {
        match self {
            Self::MoveDirection { direction, .. }
            | Self::Face { direction }
            | Self::Harvest { direction }
            | Self::PlaceItem { direction }
            | Self::OpenChest { direction }
            | Self::SwingWeapon { direction } => Some(*direction),
            Self::UseTool { direction } => *direction,
            _ => None,
        }
    }
}

/// One action as proposed by the VLM, before boundary mapping.
///
/// `kind` may name a skill or a primitive opcode; params stay loose until
/// the decision layer maps them onto [`ChosenAction`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VlmAction {
    /// Skill name or primitive opcode
    #[serde(rename = "type")]
    pub kind: String,
    /// Untyped parameter bag
    #[serde(flatten)]
    pub params: serde_json::Map<String, serde_json::Value>,
}

/// Parsed VLM response: free-form reasoning plus an ordered action list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VlmDecision {
    /// Model's narrative reasoning
    #[serde(default)]
    pub reasoning: String,
    /// Proposed actions, first is dispatched
    #[serde(default)]
    pub actions: Vec<VlmAction>,
}

/// An action after boundary mapping, ready for the override chain.
#[derive(Debug, Clone, PartialEq)]
pub enum ChosenAction {
    /// Invoke a named skill from the library
    Skill {
        /// Skill name
        name: String,
        /// Optional explicit target tile
        target: Option<Position>,
        /// Optional direction hint
        direction: Option<Facing>,
        /// Optional item parameter (seeds to plant, goods to buy)
        item: Option<String>,
        /// Optional quantity for buy/craft skills
        quantity: Option<u32>,
        /// Optional location parameter for movement skills
        location: Option<String>,
    },
    /// Submit a raw primitive
    Primitive(PrimitiveAction),
}

impl ChosenAction {
    /// Shorthand for a bare skill invocation.
    pub fn skill(name: impl Into<String>) -> Self {
        Self::Skill {
            name: name.into(),
            target: None,
            direction: None,
            item: None,
            quantity: None,
            location: None,
        }
    }

    /// Name shown in telemetry: skill name or primitive opcode.
    pub fn describe(&self) -> String {
        match self {
            Self::Skill { name, .. } => name.clone(),
            Self::Primitive(p) => p.opcode().to_string(),
        }
    }

    /// Whether this is a farming action for the no-seeds override.
    pub fn is_farming(&self) -> bool {
        match self {
            Self::Skill { name, .. } => matches!(
                name.as_str(),
                "till_soil" | "plant_seed" | "water_crop" | "clear_debris"
            ),
            Self::Primitive(_) => false,
        }
    }

    /// Whether this acts on an open menu.
    pub fn is_menu_op(&self) -> bool {
        match self {
            Self::Skill { name, .. } => matches!(name.as_str(), "buy_seeds" | "dismiss_menu"),
            Self::Primitive(p) => p.is_menu_op(),
        }
    }
}
