//! Shared test fixtures: a scripted in-memory game bridge that applies
//! primitives to a small simulated farm, a canned VLM, and a recording
//! telemetry sink.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use harrow::domain::error::{BridgeError, VlmError};
use harrow::domain::models::action::PrimitiveAction;
use harrow::domain::models::farm::{Crop, FarmSnapshot, PlotBounds};
use harrow::domain::models::locations;
use harrow::domain::models::snapshot::{
    AdjacentTile, Facing, InventoryItem, ItemKind, Position, Season, Surroundings, TileKind,
    Weather, WorldSnapshot,
};
use harrow::domain::models::task::DayPlan;
use harrow::domain::ports::bridge::{ActionResponse, GameBridge, PathCheck};
use harrow::domain::ports::telemetry::{TelemetrySink, TickEvent};
use harrow::domain::ports::vlm::VisionModel;

pub const SEED_PRICE: u32 = 20;

/// Scripted bridge: serves snapshots of a mutable sim world and applies
/// primitives to it with simplified game rules.
pub struct ScriptedBridge {
    pub world: Mutex<WorldSnapshot>,
    pub farm: Mutex<FarmSnapshot>,
    pub executed: Mutex<Vec<PrimitiveAction>>,
    pub shipped: Mutex<Vec<String>>,
    /// Tools succeed on the wire but never mutate the world
    pub phantom_tools: bool,
    /// Movement never lands (edge-stuck and stuck-detector tests)
    pub frozen_position: bool,
}

impl ScriptedBridge {
    pub fn new(world: WorldSnapshot, farm: FarmSnapshot) -> Self {
        Self {
            world: Mutex::new(world),
            farm: Mutex::new(farm),
            executed: Mutex::new(Vec::new()),
            shipped: Mutex::new(Vec::new()),
            phantom_tools: false,
            frozen_position: false,
        }
    }

    pub fn world_now(&self) -> WorldSnapshot {
        self.world.lock().unwrap().clone()
    }

    pub fn farm_now(&self) -> FarmSnapshot {
        self.farm.lock().unwrap().clone()
    }

    pub fn executed(&self) -> Vec<PrimitiveAction> {
        self.executed.lock().unwrap().clone()
    }

    pub fn opcodes(&self) -> Vec<&'static str> {
        self.executed().iter().map(PrimitiveAction::opcode).collect()
    }

    fn held_tool_name(world: &WorldSnapshot) -> Option<String> {
        world
            .inventory
            .iter()
            .find(|i| i.slot == world.selected_slot && i.kind == ItemKind::Tool)
            .map(|i| i.name.to_lowercase())
    }

    fn apply(&self, action: &PrimitiveAction) {
        let mut world = self.world.lock().unwrap();
        let mut farm = self.farm.lock().unwrap();
        match action {
            PrimitiveAction::MoveTo { x, y } => {
                if !self.frozen_position {
                    world.player_tile = Position::new(*x, *y);
                }
            }
            PrimitiveAction::MoveDirection { direction, tiles } => {
                if !self.frozen_position {
                    let mut tile = world.player_tile;
                    for _ in 0..*tiles {
                        let next = tile.step(*direction);
                        if farm.bounds.contains(next) {
                            tile = next;
                        }
                    }
                    world.player_tile = tile;
                }
            }
            PrimitiveAction::Warp { location } => {
                world.location.clone_from(location);
                if let Some(info) = locations::location(location) {
                    world.player_tile = info.standing_tile;
                }
            }
            PrimitiveAction::Face { direction } => world.facing = *direction,
            PrimitiveAction::SelectSlot { slot } => world.selected_slot = *slot,
            PrimitiveAction::SelectItemType { name } => {
                let slot = world
                    .inventory
                    .iter()
                    .find(|i| i.name.to_lowercase().contains(&name.to_lowercase()))
                    .map(|i| i.slot);
                if let Some(slot) = slot {
                    world.selected_slot = slot;
                }
            }
            PrimitiveAction::UseTool { direction } => {
                if self.phantom_tools {
                    return;
                }
                let facing = direction.unwrap_or(world.facing);
                if let Some(d) = direction {
                    world.facing = *d;
                }
                let tile = world.player_tile.step(facing);
                let Some(tool) = Self::held_tool_name(&world) else {
                    return;
                };
                if tool.contains("hoe") {
                    if !farm.tilled.contains(&tile)
                        && farm.crop_at(tile).is_none()
                        && farm.object_at(tile).is_none()
                    {
                        farm.tilled.push(tile);
                    }
                } else if tool.contains("watering") {
                    if farm.water_tiles.contains(&tile) {
                        for item in &mut world.inventory {
                            if item.water_capacity.is_some() {
                                item.water_level = item.water_capacity;
                            }
                        }
                    } else if let Some(level) = world
                        .inventory
                        .iter_mut()
                        .find(|i| i.water_level.is_some())
                        .and_then(|i| i.water_level.as_mut())
                    {
                        if *level > 0 {
                            if let Some(crop) =
                                farm.crops.iter_mut().find(|c| c.tile == tile)
                            {
                                crop.watered = true;
                                *level -= 1;
                            }
                        }
                    }
                } else if tool.contains("axe") || tool.contains("pick") || tool.contains("scythe")
                {
                    farm.objects.retain(|o| o.tile != tile);
                }
            }
            PrimitiveAction::Harvest { direction } => {
                if self.phantom_tools {
                    return;
                }
                world.facing = *direction;
                let tile = world.player_tile.step(*direction);
                if let Some(idx) = farm
                    .crops
                    .iter()
                    .position(|c| c.tile == tile && c.is_ready())
                {
                    let crop = farm.crops.remove(idx);
                    farm.tilled.retain(|t| *t != tile);
                    if let Some(stack) = world
                        .inventory
                        .iter_mut()
                        .find(|i| i.name == crop.species)
                    {
                        stack.stack += 1;
                    } else {
                        let slot = world.inventory.len();
                        world.inventory.push(InventoryItem {
                            slot,
                            name: crop.species,
                            kind: ItemKind::Crop,
                            stack: 1,
                            water_level: None,
                            water_capacity: None,
                            sell_price: Some(35),
                        });
                    }
                }
            }
            PrimitiveAction::PlaceItem { direction } => {
                world.facing = *direction;
                let tile = world.player_tile.step(*direction);
                let selected = world.selected_slot;
                let species = world
                    .inventory
                    .iter()
                    .find(|i| i.slot == selected && i.kind == ItemKind::Seed && i.stack > 0)
                    .map(|i| i.name.trim_end_matches(" Seeds").to_string());
                let Some(species) = species else { return };
                if farm.tilled.contains(&tile) && farm.crop_at(tile).is_none() {
                    farm.crops.push(Crop {
                        tile,
                        species,
                        phase: 0,
                        final_phase: 4,
                        watered: false,
                    });
                    for item in &mut world.inventory {
                        if item.slot == selected {
                            item.stack -= 1;
                        }
                    }
                    world.inventory.retain(|i| i.stack > 0 || i.kind == ItemKind::Tool);
                }
            }
            PrimitiveAction::Ship { slot } => {
                let slot = slot.unwrap_or(world.selected_slot);
                if let Some(idx) = world
                    .inventory
                    .iter()
                    .position(|i| i.slot == slot && i.is_shippable())
                {
                    let item = world.inventory.remove(idx);
                    self.shipped.lock().unwrap().push(item.name);
                }
            }
            PrimitiveAction::Buy { item, quantity } => {
                let cost = quantity * SEED_PRICE;
                if world.location == locations::SEED_SHOP && world.money >= cost {
                    world.money -= cost;
                    if let Some(stack) = world
                        .inventory
                        .iter_mut()
                        .find(|i| i.name.to_lowercase() == item.to_lowercase())
                    {
                        stack.stack += quantity;
                    } else {
                        let slot = world.inventory.len();
                        world.inventory.push(InventoryItem {
                            slot,
                            name: item.clone(),
                            kind: ItemKind::Seed,
                            stack: *quantity,
                            water_level: None,
                            water_capacity: None,
                            sell_price: None,
                        });
                    }
                    world.menu_open = true;
                }
            }
            PrimitiveAction::Eat { slot } => {
                for item in &mut world.inventory {
                    if item.slot == *slot && item.stack > 0 {
                        item.stack -= 1;
                    }
                }
            }
            PrimitiveAction::DismissMenu | PrimitiveAction::ConfirmDialog => {
                world.menu_open = false;
            }
            PrimitiveAction::GoToBed => {
                world.location = locations::FARMHOUSE.to_string();
            }
            _ => {}
        }
    }
}

#[async_trait]
impl GameBridge for ScriptedBridge {
    async fn get_state(&self) -> Result<WorldSnapshot, BridgeError> {
        Ok(self.world_now())
    }

    async fn get_surroundings(&self) -> Result<Surroundings, BridgeError> {
        let world = self.world_now();
        let farm = self.farm_now();
        let classify = |tile: Position| {
            let kind = if farm.water_tiles.contains(&tile) {
                TileKind::Water
            } else if farm.object_at(tile).is_some() {
                TileKind::Debris
            } else if let Some(crop) = farm.crop_at(tile) {
                if crop.watered {
                    TileKind::Watered
                } else {
                    TileKind::Planted
                }
            } else if farm.tilled.contains(&tile) {
                TileKind::Tilled
            } else {
                TileKind::Clear
            };
            AdjacentTile {
                passable: matches!(kind, TileKind::Clear | TileKind::Tilled),
                kind,
                blocker: farm.object_at(tile).map(|o| o.name.clone()),
            }
        };
        Ok(Surroundings {
            north: classify(world.player_tile.step(Facing::North)),
            south: classify(world.player_tile.step(Facing::South)),
            east: classify(world.player_tile.step(Facing::East)),
            west: classify(world.player_tile.step(Facing::West)),
            nearest_water: None,
        })
    }

    async fn get_farm(&self) -> Result<FarmSnapshot, BridgeError> {
        Ok(self.farm_now())
    }

    async fn check_path(&self, _from: Position, _to: Position) -> Result<PathCheck, BridgeError> {
        Ok(PathCheck {
            reachable: true,
            path_length: 3,
        })
    }

    async fn execute(&self, action: &PrimitiveAction) -> Result<ActionResponse, BridgeError> {
        self.executed.lock().unwrap().push(action.clone());
        self.apply(action);
        Ok(ActionResponse::ok())
    }
}

/// Canned VLM: pops scripted responses, then keeps failing to parse.
pub struct ScriptedVlm {
    responses: Mutex<VecDeque<String>>,
    calls: Mutex<u32>,
}

impl ScriptedVlm {
    pub fn silent() -> Self {
        Self::with(vec![])
    }

    pub fn with(responses: Vec<String>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            calls: Mutex::new(0),
        }
    }

    pub fn calls(&self) -> u32 {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl VisionModel for ScriptedVlm {
    async fn decide(&self, _prompt: &str, _image: Option<&[u8]>) -> Result<String, VlmError> {
        *self.calls.lock().unwrap() += 1;
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or(VlmError::EmptyResponse)
    }
}

/// Telemetry sink that remembers everything.
#[derive(Default)]
pub struct RecordingTelemetry {
    pub events: Mutex<Vec<TickEvent>>,
    pub plans: Mutex<Vec<DayPlan>>,
}

impl RecordingTelemetry {
    pub fn events(&self) -> Vec<TickEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn plans(&self) -> Vec<DayPlan> {
        self.plans.lock().unwrap().clone()
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

/// A farm-day world: 10:00, sunny spring day 5, on the Farm.
pub fn base_world() -> WorldSnapshot {
    WorldSnapshot {
        time: 1000,
        weather: Weather::Sunny,
        season: Season::Spring,
        day_of_year: 5,
        player_tile: Position::new(64, 15),
        facing: Facing::South,
        energy: 250.0,
        health: 100,
        money: 0,
        inventory: vec![],
        selected_slot: 0,
        location: locations::FARM.to_string(),
        menu_open: false,
    }
}

/// An empty farm with water at (58, 16) and a shipping bin.
pub fn base_farm() -> FarmSnapshot {
    FarmSnapshot {
        tilled: vec![],
        crops: vec![],
        objects: vec![],
        clumps: vec![],
        chests: vec![],
        shipping_bin: Some(Position::new(71, 14)),
        water_tiles: vec![Position::new(58, 16)],
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

pub fn watering_can(slot: usize, charges: u32) -> InventoryItem {
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

pub fn tool(slot: usize, name: &str) -> InventoryItem {
    InventoryItem {
        slot,
        name: name.to_string(),
        kind: ItemKind::Tool,
        stack: 1,
        water_level: None,
        water_capacity: None,
        sell_price: None,
    }
}

pub fn seeds(slot: usize, species: &str, stack: u32) -> InventoryItem {
    InventoryItem {
        slot,
        name: format!("{species} Seeds"),
        kind: ItemKind::Seed,
        stack,
        water_level: None,
        water_capacity: None,
        sell_price: None,
    }
}

pub fn dry_crop(x: i32, y: i32) -> Crop {
    Crop {
        tile: Position::new(x, y),
        species: "Parsnip".to_string(),
        phase: 2,
        final_phase: 4,
        watered: false,
    }
}

pub fn ready_crop(x: i32, y: i32) -> Crop {
    Crop {
        tile: Position::new(x, y),
        species: "Parsnip".to_string(),
        phase: 4,
        final_phase: 4,
        watered: true,
    }
}
