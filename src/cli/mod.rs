//! The thin CLI driver around the agent loop.

pub mod display;

use std::path::PathBuf;

use clap::Parser;

pub use display::PlanTablePrinter;

/// Autonomous farmhand: VLM-driven agent for a farming sim.
#[derive(Parser, Debug)]
#[command(name = "harrow", version, about, long_about = None)]
pub struct Cli {
    /// Standing goal handed to the model with every prompt
    #[arg(long, default_value = "run the farm, one day at a time")]
    pub goal: String,

    /// VLM endpoint override (chat-completions style URL)
    #[arg(long, value_name = "URL")]
    pub model_endpoint: Option<String>,

    /// Game bridge endpoint override
    #[arg(long, value_name = "URL")]
    pub bridge_endpoint: Option<String>,

    /// Stream events to the dashboard's JSONL file instead of logs
    #[arg(long)]
    pub dashboard: bool,

    /// Perceive and plan but never dispatch an action
    #[arg(long)]
    pub observe: bool,

    /// Delete today's plan file and the carryover before the first tick
    #[arg(long)]
    pub clear_plan: bool,

    /// Explicit config file instead of the .harrow/ hierarchy
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}
