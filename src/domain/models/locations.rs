//! Static location table.
//!
//! Warp names, standing tiles, and shop hours. The bridge's `warp`
//! primitive takes these names verbatim; the standing tile is where the
//! player lands and is used as the single navigation target.

use crate::domain::models::snapshot::Position;

/// The farm map.
pub const FARM: &str = "Farm";
/// Inside the farmhouse.
pub const FARMHOUSE: &str = "FarmHouse";
/// The general store's seed counter.
pub const SEED_SHOP: &str = "SeedShop";
/// The mine entrance.
pub const MINE: &str = "Mine";

/// One entry of the location table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocationInfo {
    /// Warp name the bridge accepts
    pub name: &'static str,
    /// Tile the player stands on after arriving
    pub standing_tile: Position,
    /// Open hours on the game clock, when the location keeps hours
    pub open_hours: Option<(u32, u32)>,
    /// Weekday indices (day_of_year % 7) the location is closed
    pub closed_days: &'static [u32],
}

impl LocationInfo {
    /// Whether the location admits visitors at a given clock and day.
    pub fn is_open(&self, time: u32, day_of_year: u32) -> bool {
        if self.closed_days.contains(&(day_of_year % 7)) {
            return false;
        }
        match self.open_hours {
            Some((open, close)) => time >= open && time < close,
            None => true,
        }
    }
}

const TABLE: &[LocationInfo] = &[
    LocationInfo {
        name: FARM,
        standing_tile: Position::new(64, 15),
        open_hours: None,
        closed_days: &[],
    },
    LocationInfo {
        name: FARMHOUSE,
        standing_tile: Position::new(3, 11),
        open_hours: None,
        closed_days: &[],
    },
    LocationInfo {
        name: SEED_SHOP,
        standing_tile: Position::new(6, 19),
        // 9:00 to 17:00, closed on the town's rest day
        open_hours: Some((900, 1700)),
        closed_days: &[3],
    },
    LocationInfo {
        name: MINE,
        standing_tile: Position::new(13, 10),
        open_hours: None,
        closed_days: &[],
    },
];

/// Look up a location by its warp name.
pub fn location(name: &str) -> Option<&'static LocationInfo> {
    TABLE.iter().find(|l| l.name == name)
}
