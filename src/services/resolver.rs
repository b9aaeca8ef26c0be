//! Prerequisite resolver.
//!
//! Rewrites the planner's raw task list into the day's resolved queue:
//! every task's preconditions are either satisfied by the world or
//! preceded by enabling tasks (navigate, refill, buy, sell). Chains that
//! cannot be enabled are dropped with a reason instead of queued.
//!
//! The resolver threads a small simulated state (location, money, seed
//! count, can charges) through the list so a task sees the effects of the
//! enabling tasks queued before it. The queue it returns is immutable for
//! the day apart from skip marks and the terminal bed task.

use tracing::{debug, info};

use crate::domain::models::config::AgentConfig;
use crate::domain::models::farm::FarmSnapshot;
use crate::domain::models::locations::{self, FARM, SEED_SHOP};
use crate::domain::models::skill::ToolKind;
use crate::domain::models::snapshot::{Position, WorldSnapshot};
use crate::domain::models::task::{
    ResolvedQueue, ResolvedTask, SkipReason, TaskKind, TaskRaw,
};
use crate::domain::ports::stores::ReservedItems;

/// Rewrites raw task lists into resolved queues.
#[derive(Debug, Clone)]
pub struct PrereqResolver {
    config: AgentConfig,
}

/// Simulated world state threaded through resolution.
struct SimState {
    location: String,
    money: u32,
    seeds: u32,
    can_level: Option<u32>,
    /// (name, estimated value) of unreserved shippables still in the bag
    sellables: Vec<(String, u32)>,
}

impl PrereqResolver {
    /// Resolver with the given tuning.
    pub const fn new(config: AgentConfig) -> Self {
        Self { config }
    }

    /// Resolve a raw list against the current world.
    pub fn resolve(
        &self,
        raw: &[TaskRaw],
        world: &WorldSnapshot,
        farm: &FarmSnapshot,
        reserved: &dyn ReservedItems,
    ) -> ResolvedQueue {
        let mut queue = ResolvedQueue::default();
        let mut sim = SimState {
            location: world.location.clone(),
            money: world.money,
            seeds: world.seed_count(),
            can_level: world.water_level(),
            sellables: world
                .shippable_items()
                .filter(|i| !reserved.is_reserved(&i.name))
                .map(|i| (i.name.clone(), i.sell_price.unwrap_or(0) * i.stack))
                .collect(),
        };

        for task in raw {
            let mut chain: Vec<ResolvedTask> = Vec::new();
            match self.resolve_one(task, world, farm, &mut sim, &mut chain) {
                Ok(()) => queue.pending.extend(chain),
                Err(reason) => {
                    debug!(task = %task.description, %reason, "chain dropped");
                    queue.dropped.push((task.description.clone(), reason));
                }
            }
        }

        for (ordinal, task) in queue.pending.iter_mut().enumerate() {
            task.ordinal = ordinal;
        }

        info!(
            queued = queue.pending.len(),
            dropped = queue.dropped.len(),
            "prerequisites resolved"
        );
        queue
    }

    fn resolve_one(
        &self,
        task: &TaskRaw,
        world: &WorldSnapshot,
        farm: &FarmSnapshot,
        sim: &mut SimState,
        chain: &mut Vec<ResolvedTask>,
    ) -> Result<(), SkipReason> {
        match &task.kind {
            TaskKind::WaterCrops => {
                if world.find_tool(ToolKind::WateringCan).is_none() {
                    return Err(SkipReason::Other("no watering can".to_string()));
                }
                Self::ensure_location(task, FARM, sim, chain);
                if sim.can_level == Some(0) {
                    let water = farm
                        .nearest_water(world.player_tile)
                        .ok_or(SkipReason::NoWaterSource)?;
                    chain.push(Self::entry(
                        task,
                        TaskKind::NavigateTo {
                            location: "water".to_string(),
                        },
                        "navigate to water",
                        Some(water),
                    ));
                    chain.push(Self::entry(
                        task,
                        TaskKind::RefillWateringCan,
                        "refill watering can",
                        None,
                    ));
                    sim.can_level = None; // full enough from here on
                }
                chain.push(Self::from_raw(task));
                Ok(())
            }

            TaskKind::PlantSeeds => {
                if sim.seeds == 0 {
                    self.enable_seed_purchase(task, world, sim, chain)?;
                }
                Self::ensure_location(task, FARM, sim, chain);
                chain.push(Self::from_raw(task));
                Ok(())
            }

            TaskKind::BuySeeds { quantity, .. } => {
                Self::require_shop_open(world)?;
                let cost = quantity * self.config.cheapest_seed_price;
                if sim.money < cost {
                    self.smart_sell(task, sim, chain, cost)?;
                }
                Self::ensure_location(task, SEED_SHOP, sim, chain);
                chain.push(Self::from_raw(task));
                sim.money = sim.money.saturating_sub(cost);
                sim.seeds += quantity;
                Ok(())
            }

            TaskKind::ShipItems => {
                if sim.sellables.is_empty() {
                    return Err(SkipReason::NothingToSell);
                }
                Self::ensure_location(task, FARM, sim, chain);
                chain.push(Self::from_raw(task));
                // proceeds land overnight; the sim only clears the bag
                sim.sellables.clear();
                Ok(())
            }

            TaskKind::RefillWateringCan => {
                if farm.nearest_water(world.player_tile).is_none() {
                    return Err(SkipReason::NoWaterSource);
                }
                Self::ensure_location(task, FARM, sim, chain);
                chain.push(Self::from_raw(task));
                sim.can_level = None;
                Ok(())
            }

            TaskKind::HarvestCrops | TaskKind::ClearDebris | TaskKind::TillSoil => {
                Self::ensure_location(task, FARM, sim, chain);
                chain.push(Self::from_raw(task));
                Ok(())
            }

            TaskKind::NavigateTo { location } => {
                chain.push(Self::entry(
                    task,
                    task.kind.clone(),
                    &task.description,
                    locations::location(location).map(|l| l.standing_tile),
                ));
                sim.location = location.clone();
                Ok(())
            }

            TaskKind::GoToBed => {
                chain.push(Self::from_raw(task));
                Ok(())
            }
        }
    }

    /// Prepend the buy trip that makes a plant task possible.
    fn enable_seed_purchase(
        &self,
        task: &TaskRaw,
        world: &WorldSnapshot,
        sim: &mut SimState,
        chain: &mut Vec<ResolvedTask>,
    ) -> Result<(), SkipReason> {
        Self::require_shop_open(world)?;
        let price = self.config.cheapest_seed_price;
        if sim.money < price {
            self.smart_sell(task, sim, chain, price)?;
        }
        let quantity = (sim.money / price).clamp(1, 5);
        Self::ensure_location(task, SEED_SHOP, sim, chain);
        chain.push(Self::entry(
            task,
            TaskKind::BuySeeds {
                species: self.config.default_seed_species.clone(),
                quantity,
            },
            &format!("buy {quantity}x {} seeds", self.config.default_seed_species),
            None,
        ));
        sim.money = sim.money.saturating_sub(quantity * price);
        sim.seeds += quantity;
        Ok(())
    }

    /// Queue a ship task to raise money, using only unreserved items.
    fn smart_sell(
        &self,
        task: &TaskRaw,
        sim: &mut SimState,
        chain: &mut Vec<ResolvedTask>,
        needed: u32,
    ) -> Result<(), SkipReason> {
        let proceeds: u32 = sim.sellables.iter().map(|(_, v)| v).sum();
        if sim.sellables.is_empty() || sim.money + proceeds < needed {
            return Err(SkipReason::InsufficientMoney);
        }
        Self::ensure_location(task, FARM, sim, chain);
        chain.push(Self::entry(task, TaskKind::ShipItems, "ship items", None));
        sim.sellables.clear();
        sim.money += proceeds;
        Ok(())
    }

    fn require_shop_open(world: &WorldSnapshot) -> Result<(), SkipReason> {
        let open = locations::location(SEED_SHOP)
            .is_some_and(|l| l.is_open(world.time, world.day_of_year));
        if open {
            Ok(())
        } else {
            Err(SkipReason::ShopClosed)
        }
    }

    /// Prepend a warp when the simulated location differs.
    fn ensure_location(
        task: &TaskRaw,
        location: &str,
        sim: &mut SimState,
        chain: &mut Vec<ResolvedTask>,
    ) {
        if sim.location == location {
            return;
        }
        chain.push(Self::entry(
            task,
            TaskKind::NavigateTo {
                location: location.to_string(),
            },
            &format!("go to {location}"),
            locations::location(location).map(|l| l.standing_tile),
        ));
        sim.location = location.to_string();
    }

    fn from_raw(task: &TaskRaw) -> ResolvedTask {
        ResolvedTask {
            id: uuid::Uuid::new_v4(),
            parent: task.id,
            kind: task.kind.clone(),
            description: task.description.clone(),
            destination: None,
            ordinal: 0,
            skill_override: task.skill_override.clone(),
            priority: task.priority,
        }
    }

    fn entry(
        parent: &TaskRaw,
        kind: TaskKind,
        description: &str,
        destination: Option<Position>,
    ) -> ResolvedTask {
        ResolvedTask {
            id: uuid::Uuid::new_v4(),
            parent: parent.id,
            kind,
            description: description.to_string(),
            destination,
            ordinal: 0,
            skill_override: None,
            priority: parent.priority,
        }
    }
}
