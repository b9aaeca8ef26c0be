//! Farm-wide state beyond the adjacent-tile radius.
//!
//! Fetched per day or per action when a component needs the whole plot;
//! expensive relative to [`WorldSnapshot`](crate::domain::models::snapshot::WorldSnapshot),
//! so callers hold it only as long as a task runs.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::domain::models::skill::ToolKind;
use crate::domain::models::snapshot::Position;

/// One growing crop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Crop {
    /// Tile the crop occupies
    pub tile: Position,
    /// Species name ("Parsnip", ...)
    pub species: String,
    /// Current growth phase index
    pub phase: u8,
    /// Phase index at which the crop is harvestable
    pub final_phase: u8,
    /// Watered today
    pub watered: bool,
}

impl Crop {
    /// Ready for harvest.
    pub const fn is_ready(&self) -> bool {
        self.phase >= self.final_phase
    }
}

/// Classification of a removable map object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DebrisKind {
    /// Scythe-clearable weeds
    Weeds,
    /// Small twigs
    Twig,
    /// Small stones
    Stone,
    /// Wild grass
    Grass,
    /// Full-grown tree
    Tree,
    /// Large stump; needs an upgraded axe
    Stump,
    /// Boulder; needs an upgraded pickaxe
    Boulder,
    /// Fallen log; needs an upgraded axe
    Log,
    /// Anything the bridge names that we do not classify
    Other,
}

impl DebrisKind {
    /// Map a blocker name from the bridge to a debris class.
    pub fn from_name(name: &str) -> Self {
        let lower = name.to_lowercase();
        if lower.contains("weed") {
            Self::Weeds
        } else if lower.contains("twig") {
            Self::Twig
        } else if lower.contains("boulder") {
            Self::Boulder
        } else if lower.contains("stump") {
            Self::Stump
        } else if lower.contains("log") {
            Self::Log
        } else if lower.contains("stone") || lower.contains("rock") {
            Self::Stone
        } else if lower.contains("grass") {
            Self::Grass
        } else if lower.contains("tree") {
            Self::Tree
        } else {
            Self::Other
        }
    }

    /// Tool that clears this debris, or None when no carried tool can.
    pub const fn required_tool(&self) -> Option<ToolKind> {
        match self {
            Self::Weeds | Self::Twig | Self::Grass => Some(ToolKind::Scythe),
            Self::Stone => Some(ToolKind::Pickaxe),
            Self::Tree => Some(ToolKind::Axe),
            Self::Stump | Self::Boulder | Self::Log | Self::Other => None,
        }
    }

    /// Obstacles only an upgraded tool removes; skipped with a lesson
    /// rather than retried.
    pub const fn is_hard(&self) -> bool {
        matches!(self, Self::Stump | Self::Boulder | Self::Log)
    }
}

/// A removable object on the farm (debris, trees, placed items).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FarmObject {
    /// Tile the object occupies
    pub tile: Position,
    /// Display name from the bridge
    pub name: String,
    /// Classification derived from the name
    pub kind: DebrisKind,
}

impl FarmObject {
    /// Build an object, classifying its kind from the display name.
    pub fn named(tile: Position, name: impl Into<String>) -> Self {
        let name = name.into();
        let kind = DebrisKind::from_name(&name);
        Self { tile, name, kind }
    }
}

/// Multi-tile resource clump (boulders, logs, meteorites).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceClump {
    /// North-west corner tile
    pub tile: Position,
    /// Width and height in tiles
    pub size: (u32, u32),
    /// Classification
    pub kind: DebrisKind,
}

/// Rectangular tile region, inclusive on both corners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlotBounds {
    /// North-west corner
    pub min: Position,
    /// South-east corner
    pub max: Position,
}

impl PlotBounds {
    /// Whether a tile falls inside the region.
    pub const fn contains(&self, p: Position) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }

    /// Center tile, rounded toward the north-west.
    pub const fn center(&self) -> Position {
        Position::new(
            self.min.x + (self.max.x - self.min.x) / 2,
            self.min.y + (self.max.y - self.min.y) / 2,
        )
    }

    /// Whether a tile sits on the region's outer ring.
    pub const fn on_edge(&self, p: Position) -> bool {
        self.contains(p)
            && (p.x == self.min.x || p.x == self.max.x || p.y == self.min.y || p.y == self.max.y)
    }

    /// Row-major iterator over every tile in the region.
    pub fn tiles(&self) -> impl Iterator<Item = Position> + '_ {
        let min = self.min;
        let max = self.max;
        (min.y..=max.y).flat_map(move |y| (min.x..=max.x).map(move |x| Position::new(x, y)))
    }
}

/// World beyond the adjacent radius: every tilled tile, crop, object,
/// clump, and chest the bridge reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FarmSnapshot {
    /// All hoed tiles
    pub tilled: Vec<Position>,
    /// All growing crops
    pub crops: Vec<Crop>,
    /// All removable objects
    pub objects: Vec<FarmObject>,
    /// All multi-tile clumps
    pub clumps: Vec<ResourceClump>,
    /// Chest tiles
    pub chests: Vec<Position>,
    /// Shipping bin tile, if the map has one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shipping_bin: Option<Position>,
    /// Refillable water tiles (pond/river edges)
    pub water_tiles: Vec<Position>,
    /// Walkable map bounds
    pub bounds: PlotBounds,
    /// The plot the planner actively works
    pub active_plot: PlotBounds,
}

impl FarmSnapshot {
    /// Crop at a tile, if any.
    pub fn crop_at(&self, tile: Position) -> Option<&Crop> {
        self.crops.iter().find(|c| c.tile == tile)
    }

    /// Object at a tile, if any.
    pub fn object_at(&self, tile: Position) -> Option<&FarmObject> {
        self.objects.iter().find(|o| o.tile == tile)
    }

    /// Whether the tile is hoed.
    pub fn is_tilled(&self, tile: Position) -> bool {
        self.tilled.contains(&tile)
    }

    /// Crops that still need water today.
    pub fn unwatered_crops(&self) -> impl Iterator<Item = &Crop> {
        self.crops.iter().filter(|c| !c.watered)
    }

    /// Crops at their final growth phase.
    pub fn ready_crops(&self) -> impl Iterator<Item = &Crop> {
        self.crops.iter().filter(|c| c.is_ready())
    }

    /// Hoed tiles with no crop on them.
    pub fn tilled_empty_tiles(&self) -> Vec<Position> {
        let planted: HashSet<Position> = self.crops.iter().map(|c| c.tile).collect();
        self.tilled
            .iter()
            .copied()
            .filter(|t| !planted.contains(t))
            .collect()
    }

    /// Nearest refillable water tile by Manhattan distance.
    pub fn nearest_water(&self, from: Position) -> Option<Position> {
        self.water_tiles
            .iter()
            .copied()
            .min_by_key(|w| (w.manhattan(from), w.y, w.x))
    }
}
