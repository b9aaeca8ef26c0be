//! Batch farm chores: harvest -> ship -> water -> till -> plant in one
//! pass, with the VLM never consulted.

mod common;

use std::sync::Arc;

use common::{
    base_farm, base_world, dry_crop, ready_crop, seeds, tool, watering_can, ScriptedBridge,
};
use harrow::domain::models::config::AgentConfig;
use harrow::services::{BatchRunner, BatchStatus, SkillEngine, SkillLibrary};

fn engine() -> SkillEngine {
    SkillEngine::unpaced(Arc::new(SkillLibrary::builtin()))
}

#[tokio::test]
async fn test_auto_farm_chores_full_pass() {
    let mut world = base_world();
    world.inventory.push(tool(0, "Hoe"));
    world.inventory.push(watering_can(1, 40));
    world.inventory.push(seeds(2, "Parsnip", 5));

    let mut farm = base_farm();
    farm.crops.push(ready_crop(60, 18));
    farm.crops.push(ready_crop(61, 18));
    farm.crops.push(dry_crop(62, 18));
    farm.crops.push(dry_crop(63, 18));
    farm.tilled = farm.crops.iter().map(|c| c.tile).collect();

    let bridge = Arc::new(ScriptedBridge::new(world, farm));
    let engine = engine();
    let mut runner =
        BatchRunner::unpaced("auto_farm_chores", AgentConfig::default()).unwrap();

    let status = runner.run(bridge.as_ref(), &engine).await.unwrap();
    assert_eq!(status, BatchStatus::Completed);

    let world = bridge.world_now();
    let farm = bridge.farm_now();

    // harvest phase: the two ready crops are gone
    assert!(farm.crops.iter().all(|c| !c.is_ready()));

    // ship phase: the harvested produce went into the bin
    let shipped = bridge.shipped.lock().unwrap().clone();
    assert!(shipped.contains(&"Parsnip".to_string()));
    assert_eq!(world.shippable_items().count(), 0);

    // water phase: the remaining crops are no longer dry
    assert!(farm
        .crops
        .iter()
        .filter(|c| c.tile.y == 18)
        .all(|c| c.watered));

    // till phase: a contiguous block was hoed beyond the original row
    assert!(farm.tilled.len() >= 15, "tilled {}", farm.tilled.len());

    // plant phase: all five seeds went into tilled soil
    assert_eq!(world.seed_count(), 0);
    assert_eq!(
        farm.crops.iter().filter(|c| c.phase == 0).count(),
        5,
        "five fresh plantings"
    );
}

#[tokio::test]
async fn test_batch_runner_is_resumable_after_yield() {
    let mut world = base_world();
    world.energy = 10.0; // below the low-energy floor
    world.inventory.push(tool(0, "Hoe"));

    let bridge = Arc::new(ScriptedBridge::new(world, base_farm()));
    let engine = engine();
    let mut runner =
        BatchRunner::unpaced("auto_farm_chores", AgentConfig::default()).unwrap();

    let status = runner.run(bridge.as_ref(), &engine).await.unwrap();
    assert!(matches!(status, BatchStatus::Yielded { .. }));

    // energy restored: the same runner picks up where it stopped and
    // drains the remaining phases
    bridge.world.lock().unwrap().energy = 200.0;
    let status = runner.run(bridge.as_ref(), &engine).await.unwrap();
    assert_eq!(status, BatchStatus::Completed);
}
