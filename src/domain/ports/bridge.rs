//! Game bridge port.
//!
//! The bridge is a side-channel into the running simulation: four read
//! endpoints and one action endpoint. It enforces a serial action queue
//! and refreshes its state cache on an interval; callers must wait out
//! that interval before trusting a post-mutation snapshot.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::error::BridgeError;
use crate::domain::models::action::PrimitiveAction;
use crate::domain::models::farm::FarmSnapshot;
use crate::domain::models::snapshot::{Position, Surroundings, WorldSnapshot};

/// Result of a pathfinding query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathCheck {
    /// Whether any route exists
    pub reachable: bool,
    /// Route length in tiles when reachable
    #[serde(default)]
    pub path_length: u32,
}

/// Lifecycle state the bridge reports for an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionState {
    /// Finished
    Complete,
    /// Still animating; treat as accepted
    Performing,
    /// The game refused or aborted it
    Failed,
    /// Anything this client does not model
    #[serde(other)]
    Unknown,
}

/// Response to a submitted primitive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionResponse {
    /// Whether the bridge accepted and performed the action
    pub success: bool,
    /// Human-readable detail or error
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Lifecycle state
    #[serde(default = "default_state")]
    pub state: ActionState,
}

const fn default_state() -> ActionState {
    ActionState::Complete
}

impl ActionResponse {
    /// A plain success.
    pub const fn ok() -> Self {
        Self {
            success: true,
            message: None,
            state: ActionState::Complete,
        }
    }

    /// A refusal with a message.
    pub fn refused(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            state: ActionState::Failed,
        }
    }
}

/// Port trait for the game bridge.
///
/// Stateless from the core's perspective: every call is a fresh
/// request/response; snapshots are values. One pooled client owns the
/// connection; all operations flow through it.
#[async_trait]
pub trait GameBridge: Send + Sync {
    /// Read-through view of the game at this instant.
    async fn get_state(&self) -> Result<WorldSnapshot, BridgeError>;

    /// The four tiles adjacent to the player.
    async fn get_surroundings(&self) -> Result<Surroundings, BridgeError>;

    /// World beyond the adjacent radius.
    async fn get_farm(&self) -> Result<FarmSnapshot, BridgeError>;

    /// Pathfinding query between two tiles.
    async fn check_path(&self, from: Position, to: Position) -> Result<PathCheck, BridgeError>;

    /// Submit one primitive. A `success=false` response surfaces as
    /// [`BridgeError::Rejected`]; transport trouble as `Transport`/`Timeout`.
    async fn execute(&self, action: &PrimitiveAction) -> Result<ActionResponse, BridgeError>;
}
