//! Harrow - autonomous farmhand control core
//!
//! The hierarchical scheduler and execution pipeline behind a VLM-driven
//! farming-sim agent:
//! - Daily planner emitting a prioritized task queue at day change
//! - Prerequisite resolver inlining enabling sub-tasks
//! - Single-task executor sweeping sorted spatial targets
//! - Declarative skill engine with precondition checks and post-execution
//!   state verification
//! - Override chain that vets every VLM-proposed action before dispatch
//! - Batch routines that drain uniform phases without consulting the VLM

pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;
