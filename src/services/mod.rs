//! Control-core services.
//!
//! Pure components the agent loop orchestrates: planning, prerequisite
//! resolution, target generation, skill execution, verification, the
//! override chain, and the batch routines. Nothing here holds a
//! back-reference to anything else; the loop wires them per tick.

pub mod agent_loop;
pub mod batch;
pub mod decision;
pub mod executor;
pub mod overrides;
pub mod planner;
pub mod resolver;
pub mod skill_engine;
pub mod skill_library;
pub mod target_gen;
pub mod verifier;

pub use agent_loop::{AgentDeps, AgentLoop, FatalError};
pub use batch::{till_block, BatchRunner, BatchStatus};
pub use executor::{ExecState, ExecutorTick, TaskExecutor};
pub use overrides::{ChainDecision, OverrideChain, OverrideContext, OverrideRule, Verdict};
pub use planner::DailyPlanner;
pub use resolver::PrereqResolver;
pub use skill_engine::SkillEngine;
pub use skill_library::SkillLibrary;
pub use target_gen::{GeneratedTargets, TargetGenerator};
pub use verifier::{StateVerifier, WorldView};
