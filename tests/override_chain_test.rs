//! Override chain, end to end through the loop: crop protection and the
//! edge-stuck retreat.

mod common;

use std::sync::Arc;

use common::{base_farm, base_world, dry_crop, tool, RecordingTelemetry, ScriptedBridge, ScriptedVlm};
use harrow::domain::models::action::PrimitiveAction;
use harrow::domain::models::config::Config;
use harrow::domain::models::snapshot::{Facing, Position};
use harrow::domain::ports::stores::{InMemoryLessonStore, InMemoryPlanStore, NoReservations};
use harrow::domain::ports::telemetry::TickOutcome;
use harrow::domain::ports::vlm::NullScreenshotSource;
use harrow::services::{AgentDeps, AgentLoop};

fn agent_with(
    bridge: Arc<ScriptedBridge>,
    vlm: ScriptedVlm,
    telemetry: Arc<RecordingTelemetry>,
) -> AgentLoop {
    let deps = AgentDeps {
        bridge: bridge as _,
        vlm: Arc::new(vlm),
        screenshots: Arc::new(NullScreenshotSource),
        telemetry: telemetry as _,
        plan_store: Arc::new(InMemoryPlanStore::default()),
        lesson_store: Arc::new(InMemoryLessonStore::default()),
        reserved: Arc::new(NoReservations),
    };
    AgentLoop::unpaced(Config::default(), deps, false)
}

#[tokio::test]
async fn test_crop_protection_blocks_axe_swing() {
    let mut world = base_world();
    world.inventory.push(tool(0, "Axe"));
    world.selected_slot = 0;
    world.player_tile = Position::new(60, 17);
    world.facing = Facing::South;

    let mut farm = base_farm();
    farm.crops.push(dry_crop(60, 18));

    let bridge = Arc::new(ScriptedBridge::new(world, farm));
    let vlm = ScriptedVlm::with(vec![
        r#"{"reasoning": "chop it", "actions": [{"type": "use_tool", "direction": "south"}]}"#
            .to_string(),
    ]);
    let telemetry = Arc::new(RecordingTelemetry::default());
    let mut agent = agent_with(Arc::clone(&bridge), vlm, Arc::clone(&telemetry));

    // tick 1 plans the day (a water chain drops: no can); the VLM fires
    // on the same tick because the queue is empty
    agent.tick().await.unwrap();

    let events = telemetry.events();
    let blocked = events
        .iter()
        .find(|e| e.outcome == TickOutcome::Blocked)
        .expect("the swing must be blocked");
    assert!(blocked
        .reason
        .as_deref()
        .unwrap()
        .contains("crop protection"));

    // no primitive was issued and the crop survived
    assert!(bridge.executed().is_empty());
    assert_eq!(bridge.farm_now().crops.len(), 1);
}

#[tokio::test]
async fn test_edge_stuck_retreats_toward_center() {
    let mut world = base_world();
    world.player_tile = Position::new(76, 26);
    let mut farm = base_farm();
    farm.bounds.max = Position::new(76, 64); // (76, 26) is on the east edge

    let mut bridge = ScriptedBridge::new(world, farm);
    bridge.frozen_position = true;
    let bridge = Arc::new(bridge);

    let east = r#"{"reasoning": "go east", "actions": [{"type": "move_direction", "direction": "east", "tiles": 1}]}"#;
    let vlm = ScriptedVlm::with(vec![east.to_string(), east.to_string(), east.to_string()]);
    let telemetry = Arc::new(RecordingTelemetry::default());
    let mut agent = agent_with(Arc::clone(&bridge), vlm, Arc::clone(&telemetry));

    for _ in 0..3 {
        agent.tick().await.unwrap();
    }

    // first two proposals pass through; the third is replaced by a
    // retreat toward the plot center, which lies west
    let executed = bridge.executed();
    assert_eq!(
        executed.last().unwrap(),
        &PrimitiveAction::MoveDirection {
            direction: Facing::West,
            tiles: 1
        }
    );
    let last = telemetry.events().last().unwrap().clone();
    assert_eq!(last.proposed.as_deref(), Some("move_direction"));
    assert!(last.reason.as_deref().unwrap().contains("edge_stuck"));
}
