//! Target generation: task → ordered, reachable spatial targets.
//!
//! Targets sweep the plot row by row (`y` ascending, `x` ascending within
//! a row); the sweep starts at whichever end is nearer the player's row.
//! The actionable tile is always adjacent to the standing tile, never
//! under it. Reachability is filtered once at task start through the
//! bridge's pathfinding query, not per tick.

use tracing::debug;

use crate::domain::error::BridgeError;
use crate::domain::models::farm::FarmSnapshot;
use crate::domain::models::locations;
use crate::domain::models::snapshot::{Facing, Position, WorldSnapshot};
use crate::domain::models::target::Target;
use crate::domain::models::task::{ResolvedTask, SkipReason, TaskKind};
use crate::domain::ports::bridge::GameBridge;

/// Generation result: ordered targets plus what got dropped and why.
#[derive(Debug, Clone, Default)]
pub struct GeneratedTargets {
    /// Ordered, reachable targets
    pub targets: Vec<Target>,
    /// Candidates dropped at generation time
    pub dropped: Vec<(Position, SkipReason)>,
}

/// Converts a resolved task into its deterministic target sequence.
#[derive(Debug, Clone, Copy, Default)]
pub struct TargetGenerator;

impl TargetGenerator {
    /// Generate the target list for a task.
    pub async fn generate(
        task: &ResolvedTask,
        world: &WorldSnapshot,
        farm: &FarmSnapshot,
        bridge: &dyn GameBridge,
    ) -> GeneratedTargets {
        let candidates = Self::candidate_tiles(task, world, farm);
        let mut out = GeneratedTargets::default();

        let mut targets: Vec<Target> = Vec::with_capacity(candidates.len());
        for tile in candidates {
            match Self::choose_stand(tile, farm) {
                Some(target) => targets.push(target),
                None => out.dropped.push((tile, SkipReason::Unreachable)),
            }
        }

        Self::sort_row_major(&mut targets, world.player_tile);

        // one pathfinding pass at task start
        for target in targets {
            if target.stand == world.player_tile {
                out.targets.push(target);
                continue;
            }
            match bridge.check_path(world.player_tile, target.stand).await {
                Ok(check) if check.reachable => out.targets.push(target),
                Ok(_) => {
                    debug!(tile = %target.tile, "target unreachable, dropped");
                    out.dropped.push((target.tile, SkipReason::Unreachable));
                }
                Err(BridgeError::Rejected(_) | BridgeError::Protocol(_)) => {
                    out.dropped.push((target.tile, SkipReason::Unreachable));
                }
                // transport trouble: keep the target, the executor will
                // find out when it walks
                Err(_) => out.targets.push(target),
            }
        }

        out
    }

    /// Raw candidate tiles for a task kind, unordered.
    fn candidate_tiles(
        task: &ResolvedTask,
        world: &WorldSnapshot,
        farm: &FarmSnapshot,
    ) -> Vec<Position> {
        match &task.kind {
            TaskKind::WaterCrops => farm.unwatered_crops().map(|c| c.tile).collect(),
            TaskKind::HarvestCrops => farm.ready_crops().map(|c| c.tile).collect(),
            TaskKind::PlantSeeds => farm.tilled_empty_tiles(),
            TaskKind::ClearDebris => farm
                .objects
                .iter()
                .filter(|o| farm.active_plot.contains(o.tile))
                .map(|o| o.tile)
                .collect(),
            TaskKind::TillSoil => farm
                .active_plot
                .tiles()
                .filter(|t| {
                    !farm.is_tilled(*t)
                        && farm.crop_at(*t).is_none()
                        && farm.object_at(*t).is_none()
                        && !farm.water_tiles.contains(t)
                })
                .collect(),
            TaskKind::RefillWateringCan => farm
                .nearest_water(world.player_tile)
                .into_iter()
                .collect(),
            TaskKind::ShipItems => farm.shipping_bin.into_iter().collect(),
            TaskKind::NavigateTo { location } => task
                .destination
                .or_else(|| locations::location(location).map(|l| l.standing_tile))
                .into_iter()
                .collect(),
            // destination-style tasks the executor drives without tiles
            TaskKind::BuySeeds { .. } | TaskKind::GoToBed => Vec::new(),
        }
    }

    /// Pick the side to stand on: the first walkable neighbor, preferring
    /// north so a southward sweep keeps the player out of its own way.
    fn choose_stand(tile: Position, farm: &FarmSnapshot) -> Option<Target> {
        const PREFERENCE: [Facing; 4] = [Facing::North, Facing::West, Facing::East, Facing::South];
        PREFERENCE.into_iter().find_map(|side| {
            let stand = tile.step(side);
            Self::walkable(stand, farm).then(|| Target {
                tile,
                stand,
                facing: side.opposite(),
            })
        })
    }

    fn walkable(tile: Position, farm: &FarmSnapshot) -> bool {
        farm.bounds.contains(tile)
            && farm.object_at(tile).is_none()
            && farm.crop_at(tile).is_none()
            && !farm.water_tiles.contains(&tile)
            && !farm.chests.contains(&tile)
            && farm.shipping_bin != Some(tile)
    }

    /// Row-major ordering with the sweep starting at the end nearest the
    /// player's current row.
    fn sort_row_major(targets: &mut [Target], player: Position) {
        targets.sort_by_key(|t| (t.tile.y, t.tile.x));
        if let (Some(first), Some(last)) = (targets.first(), targets.last()) {
            let to_first = player.y.abs_diff(first.tile.y);
            let to_last = player.y.abs_diff(last.tile.y);
            if to_last < to_first {
                targets.sort_by_key(|t| (std::cmp::Reverse(t.tile.y), t.tile.x));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::farm::{Crop, FarmObject, PlotBounds};
    use crate::domain::models::snapshot::{Season, Weather};
    use crate::domain::models::task::{TaskPriority, TaskRaw};
    use crate::domain::ports::bridge::{ActionResponse, PathCheck};
    use async_trait::async_trait;

    struct OpenWorldBridge;

    #[async_trait]
    impl GameBridge for OpenWorldBridge {
        async fn get_state(&self) -> Result<WorldSnapshot, BridgeError> {
            unreachable!("not used by target generation")
        }
        async fn get_surroundings(
            &self,
        ) -> Result<crate::domain::models::snapshot::Surroundings, BridgeError> {
            unreachable!("not used by target generation")
        }
        async fn get_farm(&self) -> Result<FarmSnapshot, BridgeError> {
            unreachable!("not used by target generation")
        }
        async fn check_path(
            &self,
            _from: Position,
            to: Position,
        ) -> Result<PathCheck, BridgeError> {
            // everything left of x=100 is reachable
            Ok(PathCheck {
                reachable: to.x < 100,
                path_length: 3,
            })
        }
        async fn execute(
            &self,
            _action: &crate::domain::models::action::PrimitiveAction,
        ) -> Result<ActionResponse, BridgeError> {
            Ok(ActionResponse::ok())
        }
    }

    fn world_at(tile: Position) -> WorldSnapshot {
        WorldSnapshot {
            time: 900,
            weather: Weather::Sunny,
            season: Season::Spring,
            day_of_year: 5,
            player_tile: tile,
            facing: Facing::South,
            energy: 200.0,
            health: 100,
            money: 500,
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
            shipping_bin: None,
            water_tiles: vec![],
            bounds: PlotBounds {
                min: Position::new(0, 0),
                max: Position::new(200, 64),
            },
            active_plot: PlotBounds {
                min: Position::new(55, 15),
                max: Position::new(70, 30),
            },
        }
    }

    fn water_task() -> ResolvedTask {
        let raw = TaskRaw::new(TaskKind::WaterCrops, TaskPriority::High, 30);
        ResolvedTask {
            id: raw.id,
            parent: raw.id,
            kind: TaskKind::WaterCrops,
            description: raw.description,
            destination: None,
            ordinal: 0,
            skill_override: None,
            priority: TaskPriority::High,
        }
    }

    fn dry_crop(x: i32, y: i32) -> Crop {
        Crop {
            tile: Position::new(x, y),
            species: "Parsnip".to_string(),
            phase: 2,
            final_phase: 4,
            watered: false,
        }
    }

    #[tokio::test]
    async fn test_row_major_order() {
        let mut farm = farm();
        farm.crops = vec![dry_crop(62, 19), dry_crop(60, 18), dry_crop(61, 18)];
        let world = world_at(Position::new(60, 10));

        let generated =
            TargetGenerator::generate(&water_task(), &world, &farm, &OpenWorldBridge).await;
        let tiles: Vec<Position> = generated.targets.iter().map(|t| t.tile).collect();
        assert_eq!(
            tiles,
            vec![
                Position::new(60, 18),
                Position::new(61, 18),
                Position::new(62, 19)
            ]
        );
    }

    #[tokio::test]
    async fn test_sweep_starts_near_player_row() {
        let mut farm = farm();
        farm.crops = vec![dry_crop(60, 18), dry_crop(60, 26)];
        // player is below the plot; sweep should start at the bottom row
        let world = world_at(Position::new(60, 30));

        let generated =
            TargetGenerator::generate(&water_task(), &world, &farm, &OpenWorldBridge).await;
        assert_eq!(generated.targets[0].tile, Position::new(60, 26));
    }

    #[tokio::test]
    async fn test_actionable_tile_adjacent_not_under() {
        let mut farm = farm();
        farm.crops = vec![dry_crop(60, 18)];
        let world = world_at(Position::new(50, 10));

        let generated =
            TargetGenerator::generate(&water_task(), &world, &farm, &OpenWorldBridge).await;
        let t = generated.targets[0];
        assert!(t.stand.is_adjacent(t.tile));
        assert_ne!(t.stand, t.tile);
        assert_eq!(t.stand.step(t.facing), t.tile);
    }

    #[tokio::test]
    async fn test_unreachable_dropped_with_reason() {
        let mut farm = farm();
        farm.bounds.max = Position::new(300, 64);
        farm.crops = vec![dry_crop(60, 18), dry_crop(150, 18)];
        let world = world_at(Position::new(50, 10));

        let generated =
            TargetGenerator::generate(&water_task(), &world, &farm, &OpenWorldBridge).await;
        assert_eq!(generated.targets.len(), 1);
        assert_eq!(
            generated.dropped,
            vec![(Position::new(150, 18), SkipReason::Unreachable)]
        );
    }

    #[tokio::test]
    async fn test_stand_avoids_crops() {
        let mut farm = farm();
        // target crop with another crop immediately north: stand west instead
        farm.crops = vec![dry_crop(60, 18), dry_crop(60, 17)];
        let world = world_at(Position::new(50, 10));

        let generated =
            TargetGenerator::generate(&water_task(), &world, &farm, &OpenWorldBridge).await;
        let t = generated
            .targets
            .iter()
            .find(|t| t.tile == Position::new(60, 18))
            .unwrap();
        assert_eq!(t.stand, Position::new(59, 18));
        assert_eq!(t.facing, Facing::East);
    }

    #[tokio::test]
    async fn test_refill_targets_nearest_water() {
        let mut farm = farm();
        farm.water_tiles = vec![Position::new(58, 16), Position::new(10, 10)];
        let world = world_at(Position::new(60, 18));
        let mut task = water_task();
        task.kind = TaskKind::RefillWateringCan;

        let generated = TargetGenerator::generate(&task, &world, &farm, &OpenWorldBridge).await;
        assert_eq!(generated.targets.len(), 1);
        assert_eq!(generated.targets[0].tile, Position::new(58, 16));
    }

    #[tokio::test]
    async fn test_till_skips_occupied_tiles() {
        let mut farm = farm();
        farm.active_plot = PlotBounds {
            min: Position::new(60, 18),
            max: Position::new(61, 18),
        };
        farm.crops = vec![dry_crop(60, 18)];
        farm.objects = vec![];
        let world = world_at(Position::new(50, 10));
        let mut task = water_task();
        task.kind = TaskKind::TillSoil;

        let generated = TargetGenerator::generate(&task, &world, &farm, &OpenWorldBridge).await;
        let tiles: Vec<Position> = generated.targets.iter().map(|t| t.tile).collect();
        assert_eq!(tiles, vec![Position::new(61, 18)]);
    }

    #[tokio::test]
    async fn test_clear_debris_limited_to_plot() {
        let mut farm = farm();
        farm.objects = vec![
            FarmObject::named(Position::new(60, 20), "Stone"),
            FarmObject::named(Position::new(5, 5), "Stone"),
        ];
        let world = world_at(Position::new(50, 10));
        let mut task = water_task();
        task.kind = TaskKind::ClearDebris;

        let generated = TargetGenerator::generate(&task, &world, &farm, &OpenWorldBridge).await;
        let tiles: Vec<Position> = generated.targets.iter().map(|t| t.tile).collect();
        assert_eq!(tiles, vec![Position::new(60, 20)]);
    }
}
