//! Harrow CLI entry point.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::watch;
use tracing::info;

use harrow::cli::{Cli, PlanTablePrinter};
use harrow::domain::ports::bridge::GameBridge;
use harrow::domain::ports::stores::{LessonStore, NoReservations, PlanStore};
use harrow::domain::ports::telemetry::TelemetrySink;
use harrow::domain::ports::vlm::{NullScreenshotSource, VisionModel};
use harrow::infrastructure::{
    ConfigLoader, HttpGameBridge, HttpVisionModel, JsonPlanStore, JsonlLessonStore,
    JsonlTelemetry, TracingTelemetry,
};
use harrow::services::{AgentDeps, AgentLoop};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => ConfigLoader::load_from_file(path)?,
        None => ConfigLoader::load().context("Failed to load configuration")?,
    };
    if let Some(endpoint) = &cli.bridge_endpoint {
        config.bridge.base_url.clone_from(endpoint);
    }
    if let Some(endpoint) = &cli.model_endpoint {
        config.vlm.endpoint.clone_from(endpoint);
    }

    let _log_guard = harrow::infrastructure::logging::init(&config);
    info!(goal = %cli.goal, observe = cli.observe, "harrow starting");

    let plan_store: Arc<dyn PlanStore> = Arc::new(JsonPlanStore::new(&config.paths));
    if cli.clear_plan {
        plan_store
            .clear()
            .await
            .context("Failed to clear plan state")?;
    }
    let lesson_store: Arc<dyn LessonStore> = Arc::new(JsonlLessonStore::new(&config.paths));

    let base_telemetry: Arc<dyn TelemetrySink> = if cli.dashboard {
        Arc::new(JsonlTelemetry::new(&config.paths))
    } else {
        Arc::new(TracingTelemetry)
    };
    let telemetry: Arc<dyn TelemetrySink> = Arc::new(PlanTablePrinter::new(base_telemetry));

    let bridge: Arc<dyn GameBridge> =
        Arc::new(HttpGameBridge::new(&config.bridge).context("Failed to build bridge client")?);
    let vlm: Arc<dyn VisionModel> =
        Arc::new(HttpVisionModel::new(config.vlm.clone()).context("Failed to build VLM client")?);

    let deps = AgentDeps {
        bridge,
        vlm,
        screenshots: Arc::new(NullScreenshotSource),
        telemetry,
        plan_store,
        lesson_store,
        reserved: Arc::new(NoReservations),
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("ctrl-c received, shutting down");
            let _ = shutdown_tx.send(true);
        }
    });

    let mut agent = AgentLoop::new(config, deps, cli.observe).with_goal(cli.goal);
    agent
        .run(shutdown_rx)
        .await
        .context("agent loop ended fatally")?;

    Ok(())
}
