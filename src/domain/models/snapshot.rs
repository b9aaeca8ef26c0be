//! Per-tick world state as reported by the game bridge.
//!
//! Snapshots are values: the loop refreshes them each tick and after every
//! mutation; nothing in the core ever writes back into one.

use serde::{Deserialize, Serialize};

use crate::domain::models::skill::ToolKind;

/// Integer tile coordinate in the game world's grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    /// Column, increasing eastward
    pub x: i32,
    /// Row, increasing southward
    pub y: i32,
}

impl Position {
    /// Build a position from raw coordinates.
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Manhattan distance to another tile.
    pub const fn manhattan(&self, other: Self) -> u32 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }

    /// The tile one step in the given direction.
    pub const fn step(&self, facing: Facing) -> Self {
        let (dx, dy) = facing.offset();
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }

    /// True when `other` shares an edge with this tile.
    pub const fn is_adjacent(&self, other: Self) -> bool {
        self.manhattan(other) == 1
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Cardinal direction the player sprite points toward.
///
/// Facing determines which adjacent tile receives a tool action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Facing {
    /// Toward decreasing y
    North,
    /// Toward increasing y
    South,
    /// Toward increasing x
    East,
    /// Toward decreasing x
    West,
}

impl Facing {
    /// Tile-space offset of one step in this direction.
    pub const fn offset(&self) -> (i32, i32) {
        match self {
            Self::North => (0, -1),
            Self::South => (0, 1),
            Self::East => (1, 0),
            Self::West => (-1, 0),
        }
    }

    /// The reverse direction.
    pub const fn opposite(&self) -> Self {
        match self {
            Self::North => Self::South,
            Self::South => Self::North,
            Self::East => Self::West,
            Self::West => Self::East,
        }
    }

    /// Direction from `from` to an edge-adjacent `to`, if they are adjacent.
    pub fn between(from: Position, to: Position) -> Option<Self> {
        match (to.x - from.x, to.y - from.y) {
            (0, -1) => Some(Self::North),
            (0, 1) => Some(Self::South),
            (1, 0) => Some(Self::East),
            (-1, 0) => Some(Self::West),
            _ => None,
        }
    }

    /// All four directions, in the bridge's reporting order.
    pub const ALL: [Self; 4] = [Self::North, Self::South, Self::East, Self::West];

    /// Lowercase wire name.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::North => "north",
            Self::South => "south",
            Self::East => "east",
            Self::West => "west",
        }
    }
}

impl std::fmt::Display for Facing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Weather for the current day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Weather {
    /// Clear skies
    Sunny,
    /// Rain waters every crop for free
    Rainy,
    /// Thunderstorm; counts as rain
    Stormy,
    /// Petals/leaves; dry
    Windy,
    /// Winter precipitation; dry soil
    Snowy,
}

impl Weather {
    /// True when crops are watered by the sky and the water task is moot.
    pub const fn waters_crops(&self) -> bool {
        matches!(self, Self::Rainy | Self::Stormy)
    }
}

/// Season of the in-game year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Season {
    /// Days 1-28
    Spring,
    /// Days 29-56
    Summer,
    /// Days 57-84
    Fall,
    /// Nothing grows outdoors
    Winter,
}

impl Season {
    /// Whether outdoor planting is worthwhile this season.
    pub const fn permits_planting(&self) -> bool {
        !matches!(self, Self::Winter)
    }
}

/// Broad classification of an inventory stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    /// Hoe, axe, watering can, weapon, ...
    Tool,
    /// Plantable seeds
    Seed,
    /// Harvested produce; shippable
    Crop,
    /// Everything else
    Other,
}

/// One stack in a toolbar slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryItem {
    /// Toolbar slot index (0-based)
    pub slot: usize,
    /// Display name as the game shows it
    pub name: String,
    /// Broad item class
    pub kind: ItemKind,
    /// Stack size (tools report 1)
    pub stack: u32,
    /// Remaining charges for the watering can; None for everything else
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub water_level: Option<u32>,
    /// Capacity matching `water_level`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub water_capacity: Option<u32>,
    /// Unit sell price if the game exposes one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sell_price: Option<u32>,
}

impl InventoryItem {
    /// Items the shipping bin accepts.
    pub const fn is_shippable(&self) -> bool {
        matches!(self.kind, ItemKind::Crop)
    }

    /// Case-insensitive substring match on the display name.
    ///
    /// "Watering Can" matches needle "watering"; upgrades ("Copper Watering
    /// Can") keep matching without a per-tier table.
    pub fn name_matches(&self, needle: &str) -> bool {
        self.name.to_lowercase().contains(&needle.to_lowercase())
    }
}

/// Kind of an adjacent tile, as the bridge classifies it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TileKind {
    /// Walkable, nothing on it
    Clear,
    /// Hoed, no crop
    Tilled,
    /// Hoed with a dry crop
    Planted,
    /// Hoed with a watered crop
    Watered,
    /// Weeds, twigs, stones, ...
    Debris,
    /// Refillable water
    Water,
    /// Impassable and not otherwise classified
    Blocked,
}

/// One of the four tiles next to the player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdjacentTile {
    /// Whether the player could walk onto it
    pub passable: bool,
    /// Bridge classification
    pub kind: TileKind,
    /// Name of whatever blocks it ("Tree", "Stone", ...), if anything
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocker: Option<String>,
}

impl AdjacentTile {
    /// An open walkable tile.
    pub const fn clear() -> Self {
        Self {
            passable: true,
            kind: TileKind::Clear,
            blocker: None,
        }
    }
}

/// The four cardinal tiles adjacent to the player, refreshed per tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Surroundings {
    /// Tile to the north
    pub north: AdjacentTile,
    /// Tile to the south
    pub south: AdjacentTile,
    /// Tile to the east
    pub east: AdjacentTile,
    /// Tile to the west
    pub west: AdjacentTile,
    /// Direction and Manhattan distance of the nearest refillable water
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nearest_water: Option<(Facing, u32)>,
}

impl Surroundings {
    /// The adjacent tile in a given direction.
    pub const fn get(&self, facing: Facing) -> &AdjacentTile {
        match facing {
            Facing::North => &self.north,
            Facing::South => &self.south,
            Facing::East => &self.east,
            Facing::West => &self.west,
        }
    }

    /// All four tiles paired with their direction.
    pub fn iter(&self) -> impl Iterator<Item = (Facing, &AdjacentTile)> {
        Facing::ALL.iter().map(move |&f| (f, self.get(f)))
    }

    /// Surroundings with all four tiles clear, for defaults and tests.
    pub const fn open() -> Self {
        Self {
            north: AdjacentTile::clear(),
            south: AdjacentTile::clear(),
            east: AdjacentTile::clear(),
            west: AdjacentTile::clear(),
            nearest_water: None,
        }
    }
}

/// Read-through view of the game at one instant.
///
/// Invalidated by any action; the loop re-fetches instead of patching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldSnapshot {
    /// Game clock, `HHMM` style (600 = 6:00 AM, 2530 = 1:30 AM next cycle)
    pub time: u32,
    /// Today's weather
    pub weather: Weather,
    /// Current season
    pub season: Season,
    /// Day counter; the planner keys day transitions off this
    pub day_of_year: u32,
    /// Tile the player stands on
    pub player_tile: Position,
    /// Direction the player faces
    pub facing: Facing,
    /// Current energy
    pub energy: f32,
    /// Current health
    pub health: u32,
    /// Gold on hand
    pub money: u32,
    /// Toolbar, ordered by slot
    pub inventory: Vec<InventoryItem>,
    /// Currently selected toolbar slot
    pub selected_slot: usize,
    /// Location name ("Farm", "SeedShop", ...)
    pub location: String,
    /// A modal menu, event, or dialogue is up
    #[serde(default)]
    pub menu_open: bool,
}

impl WorldSnapshot {
    /// The item in the currently selected slot.
    pub fn selected_item(&self) -> Option<&InventoryItem> {
        self.inventory.iter().find(|i| i.slot == self.selected_slot)
    }

    /// First slot whose item satisfies a tool-category fuzzy match.
    pub fn find_tool(&self, tool: ToolKind) -> Option<&InventoryItem> {
        self.inventory
            .iter()
            .filter(|i| i.kind == ItemKind::Tool)
            .find(|i| tool.matches_item(&i.name))
    }

    /// First item matching a name fragment, lowest slot wins.
    pub fn find_item(&self, needle: &str) -> Option<&InventoryItem> {
        self.inventory.iter().find(|i| i.name_matches(needle))
    }

    /// All seed stacks.
    pub fn seed_items(&self) -> impl Iterator<Item = &InventoryItem> {
        self.inventory.iter().filter(|i| i.kind == ItemKind::Seed)
    }

    /// Total seeds across all stacks.
    pub fn seed_count(&self) -> u32 {
        self.seed_items().map(|i| i.stack).sum()
    }

    /// All shippable stacks.
    pub fn shippable_items(&self) -> impl Iterator<Item = &InventoryItem> {
        self.inventory.iter().filter(|i| i.is_shippable())
    }

    /// Remaining watering-can charges, if a can is carried.
    pub fn water_level(&self) -> Option<u32> {
        self.find_tool(ToolKind::WateringCan)
            .and_then(|i| i.water_level)
    }

    /// Whether the clock is at or past the late-night threshold.
    ///
    /// The game clock runs past 2400 (2530 = 1:30 AM), so no wrap handling
    /// is needed until the bridge reports the next day.
    pub const fn is_past(&self, threshold: u32) -> bool {
        self.time >= threshold
    }
}
