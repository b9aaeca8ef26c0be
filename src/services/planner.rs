//! Daily planner.
//!
//! Runs once per observed day-of-year transition and emits the raw task
//! list for the day. The routine is fixed-order; every step is gated on a
//! world condition and skipped when the condition does not hold. The
//! planner is stateless: carryover and completion records live in the
//! plan store and are handed in.

use tracing::info;

use crate::domain::models::config::AgentConfig;
use crate::domain::models::farm::FarmSnapshot;
use crate::domain::models::snapshot::{Weather, WorldSnapshot};
use crate::domain::models::task::{TaskKind, TaskPriority, TaskRaw};

/// Emits the day's raw task list.
#[derive(Debug, Clone)]
pub struct DailyPlanner {
    config: AgentConfig,
}

impl DailyPlanner {
    /// Planner with the given tuning.
    pub const fn new(config: AgentConfig) -> Self {
        Self { config }
    }

    /// The standard daily routine, applied in order.
    ///
    /// `forecast` is today's weather when the bridge supplies one ahead of
    /// the snapshot; the snapshot's weather is the fallback.
    pub fn plan_day(
        &self,
        world: &WorldSnapshot,
        farm: &FarmSnapshot,
        carryover: &[TaskRaw],
        forecast: Option<Weather>,
    ) -> Vec<TaskRaw> {
        let weather = forecast.unwrap_or(world.weather);
        let mut tasks: Vec<TaskRaw> = Vec::new();

        // 1. yesterday's unfinished critical/high work comes first
        for task in carryover {
            if task.priority.carries_over() {
                tasks.push(task.clone());
            }
        }

        // 2. water, unless the sky does it
        let unwatered = farm.unwatered_crops().count();
        if !weather.waters_crops() && unwatered > 0 {
            tasks.push(TaskRaw::new(
                TaskKind::WaterCrops,
                TaskPriority::High,
                Self::ticks_per_target(unwatered),
            ));
        }

        // 3. harvest anything at final phase
        let ready = farm.ready_crops().count();
        if ready > 0 {
            tasks.push(TaskRaw::new(
                TaskKind::HarvestCrops,
                TaskPriority::High,
                Self::ticks_per_target(ready),
            ));
        }

        // 4. ship sellables
        if world.shippable_items().next().is_some() {
            tasks.push(TaskRaw::new(TaskKind::ShipItems, TaskPriority::Medium, 10));
        }

        // 5./6. plant what we have, buy what we lack
        let seeds = world.seed_count();
        let tilled_empty = farm.tilled_empty_tiles().len();
        if seeds > 0 {
            if tilled_empty == 0 {
                tasks.push(TaskRaw::new(TaskKind::TillSoil, TaskPriority::High, 30));
            }
            tasks.push(TaskRaw::new(
                TaskKind::PlantSeeds,
                TaskPriority::High,
                Self::ticks_per_target(seeds as usize),
            ));
        } else if world.season.permits_planting()
            && world.money >= self.config.cheapest_seed_price
        {
            let quantity =
                (world.money / self.config.cheapest_seed_price).clamp(1, 5);
            tasks.push(TaskRaw::new(
                TaskKind::BuySeeds {
                    species: self.config.default_seed_species.clone(),
                    quantity,
                },
                TaskPriority::High,
                15,
            ));
            tasks.push(TaskRaw::new(
                TaskKind::PlantSeeds,
                TaskPriority::High,
                Self::ticks_per_target(quantity as usize),
            ));
        }

        // 7. debris, when nothing better applies or tilling is hemmed in
        let debris_in_plot = farm
            .objects
            .iter()
            .any(|o| farm.active_plot.contains(o.tile));
        let tilling_planned = tasks
            .iter()
            .any(|t| matches!(t.kind, TaskKind::TillSoil | TaskKind::PlantSeeds));
        if debris_in_plot && (tasks.is_empty() || tilling_planned) {
            tasks.push(TaskRaw::new(TaskKind::ClearDebris, TaskPriority::Low, 25));
        }

        // 8. terminal bed task when the day is already winding down
        if world.is_past(self.config.late_night_time)
            || world.energy < self.config.critical_energy
        {
            tasks.push(TaskRaw::new(TaskKind::GoToBed, TaskPriority::Critical, 5));
        }

        info!(
            day = world.day_of_year,
            tasks = tasks.len(),
            weather = ?weather,
            "daily plan emitted"
        );
        tasks
    }

    /// Tasks worth carrying into tomorrow, in emitted order.
    pub fn carryover_from(unfinished: &[TaskRaw]) -> Vec<TaskRaw> {
        unfinished
            .iter()
            .filter(|t| t.priority.carries_over())
            .cloned()
            .collect()
    }

    const fn ticks_per_target(count: usize) -> u32 {
        // rough navigation + action budget per tile
        (count as u32).saturating_mul(3).saturating_add(5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::farm::{Crop, FarmObject, PlotBounds};
    use crate::domain::models::snapshot::{
        Facing, InventoryItem, ItemKind, Position, Season,
    };

    fn world() -> WorldSnapshot {
        WorldSnapshot {
            time: 700,
            weather: Weather::Sunny,
            season: Season::Spring,
            day_of_year: 5,
            player_tile: Position::new(64, 15),
            facing: Facing::South,
            energy: 250.0,
            health: 100,
            money: 100,
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

    fn crop(x: i32, y: i32, watered: bool, ready: bool) -> Crop {
        Crop {
            tile: Position::new(x, y),
            species: "Parsnip".to_string(),
            phase: if ready { 4 } else { 2 },
            final_phase: 4,
            watered,
        }
    }

    fn seeds(stack: u32) -> InventoryItem {
        InventoryItem {
            slot: 1,
            name: "Parsnip Seeds".to_string(),
            kind: ItemKind::Seed,
            stack,
            water_level: None,
            water_capacity: None,
            sell_price: None,
        }
    }

    fn planner() -> DailyPlanner {
        DailyPlanner::new(AgentConfig::default())
    }

    #[test]
    fn test_water_emitted_on_dry_day() {
        let mut f = farm();
        f.crops.push(crop(60, 18, false, false));
        let tasks = planner().plan_day(&world(), &f, &[], None);
        assert!(tasks.iter().any(|t| t.kind == TaskKind::WaterCrops));
    }

    #[test]
    fn test_rain_suppresses_watering() {
        let mut w = world();
        w.weather = Weather::Rainy;
        let mut f = farm();
        f.crops.push(crop(60, 18, false, false));
        let tasks = planner().plan_day(&w, &f, &[], None);
        assert!(!tasks.iter().any(|t| t.kind == TaskKind::WaterCrops));
    }

    #[test]
    fn test_forecast_overrides_snapshot_weather() {
        let mut f = farm();
        f.crops.push(crop(60, 18, false, false));
        let tasks = planner().plan_day(&world(), &f, &[], Some(Weather::Stormy));
        assert!(!tasks.iter().any(|t| t.kind == TaskKind::WaterCrops));
    }

    #[test]
    fn test_harvest_when_ready() {
        let mut f = farm();
        f.crops.push(crop(60, 18, true, true));
        let tasks = planner().plan_day(&world(), &f, &[], None);
        assert!(tasks.iter().any(|t| t.kind == TaskKind::HarvestCrops));
    }

    #[test]
    fn test_buy_chain_when_no_seeds() {
        // 100g at 20g/seed, no stock: buy 5 then plant
        let tasks = planner().plan_day(&world(), &farm(), &[], None);
        let buy = tasks
            .iter()
            .find(|t| matches!(t.kind, TaskKind::BuySeeds { .. }))
            .expect("buy task");
        match &buy.kind {
            TaskKind::BuySeeds { species, quantity } => {
                assert_eq!(species, "Parsnip");
                assert_eq!(*quantity, 5);
            }
            _ => unreachable!(),
        }
        assert!(tasks.iter().any(|t| t.kind == TaskKind::PlantSeeds));
    }

    #[test]
    fn test_no_buy_when_broke() {
        let mut w = world();
        w.money = 5;
        let tasks = planner().plan_day(&w, &farm(), &[], None);
        assert!(!tasks
            .iter()
            .any(|t| matches!(t.kind, TaskKind::BuySeeds { .. })));
    }

    #[test]
    fn test_no_buy_in_winter() {
        let mut w = world();
        w.season = Season::Winter;
        let tasks = planner().plan_day(&w, &farm(), &[], None);
        assert!(!tasks
            .iter()
            .any(|t| matches!(t.kind, TaskKind::BuySeeds { .. })));
    }

    #[test]
    fn test_till_inserted_when_no_tilled_tiles() {
        let mut w = world();
        w.inventory.push(seeds(5));
        let tasks = planner().plan_day(&w, &farm(), &[], None);
        let till_pos = tasks
            .iter()
            .position(|t| t.kind == TaskKind::TillSoil)
            .expect("till task");
        let plant_pos = tasks
            .iter()
            .position(|t| t.kind == TaskKind::PlantSeeds)
            .expect("plant task");
        assert!(till_pos < plant_pos);
    }

    #[test]
    fn test_plant_directly_when_tilled_exists() {
        let mut w = world();
        w.inventory.push(seeds(5));
        let mut f = farm();
        f.tilled.push(Position::new(60, 18));
        let tasks = planner().plan_day(&w, &f, &[], None);
        assert!(!tasks.iter().any(|t| t.kind == TaskKind::TillSoil));
        assert!(tasks.iter().any(|t| t.kind == TaskKind::PlantSeeds));
    }

    #[test]
    fn test_carryover_first_and_filtered() {
        let keep = TaskRaw::new(TaskKind::ClearDebris, TaskPriority::High, 25);
        let drop = TaskRaw::new(TaskKind::ShipItems, TaskPriority::Low, 10);
        let tasks = planner().plan_day(&world(), &farm(), &[keep.clone(), drop], None);
        assert_eq!(tasks[0].id, keep.id);
        assert!(!tasks.iter().any(|t| t.priority == TaskPriority::Low
            && t.kind == TaskKind::ShipItems));
    }

    #[test]
    fn test_debris_only_task_on_empty_day() {
        let mut w = world();
        w.money = 0; // nothing to buy
        let mut f = farm();
        f.objects.push(FarmObject::named(Position::new(60, 20), "Stone"));
        let tasks = planner().plan_day(&w, &f, &[], None);
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].kind, TaskKind::ClearDebris);
    }

    #[test]
    fn test_late_night_appends_bed() {
        let mut w = world();
        w.time = 2300;
        w.money = 0;
        let tasks = planner().plan_day(&w, &farm(), &[], None);
        assert_eq!(tasks.last().unwrap().kind, TaskKind::GoToBed);
        assert_eq!(tasks.last().unwrap().priority, TaskPriority::Critical);
    }

    #[test]
    fn test_exactly_one_plan_per_invocation_is_pure() {
        // same inputs, same shape out (ids differ)
        let mut f = farm();
        f.crops.push(crop(60, 18, false, false));
        let a = planner().plan_day(&world(), &f, &[], None);
        let b = planner().plan_day(&world(), &f, &[], None);
        let kinds =
            |v: &[TaskRaw]| v.iter().map(|t| t.kind.clone()).collect::<Vec<_>>();
        assert_eq!(kinds(&a), kinds(&b));
    }
}
