//! Domain error types for the farmhand control core.
//!
//! This module defines all error types using thiserror for structured error
//! handling. Each error enum represents errors from a specific collaborator
//! or pipeline stage. Nothing here crosses the tick boundary: the agent loop
//! converts every error into a local outcome (retry, skip, no-op tick).

use thiserror::Error;

use crate::domain::models::skill::ToolKind;

/// Errors from the game bridge side-channel.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// Transport-level failure (connection refused, DNS, TLS, ...)
    #[error("Bridge transport failed: {0}")]
    Transport(String),

    /// The bridge did not answer within the per-call deadline
    #[error("Bridge timeout after {0}s")]
    Timeout(u64),

    /// The response body could not be decoded into the expected shape
    #[error("Bridge protocol error: {0}")]
    Protocol(String),

    /// The bridge accepted the request but reported `success=false`
    #[error("Bridge rejected action: {0}")]
    Rejected(String),
}

impl BridgeError {
    /// Returns true if this error is transient and the *next* primitive may
    /// still succeed. A rejected action is a semantic failure, not transport.
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Timeout(_))
    }

    /// True when the bridge itself answered (the world was reachable).
    pub const fn bridge_reachable(&self) -> bool {
        matches!(self, Self::Rejected(_) | Self::Protocol(_))
    }
}

/// Errors from the vision-language model boundary.
#[derive(Error, Debug)]
pub enum VlmError {
    /// HTTP request failed before a response arrived
    #[error("VLM request failed: {0}")]
    RequestFailed(String),

    /// The model did not answer within the configured deadline
    #[error("VLM timeout after {0}s")]
    Timeout(u64),

    /// The endpoint returned an error status
    #[error("VLM endpoint error {status}: {message}")]
    ApiError {
        /// HTTP status code
        status: u16,
        /// Response body or reason phrase
        message: String,
    },

    /// The response contained no usable text
    #[error("VLM returned no text content")]
    EmptyResponse,

    /// No JSON decision could be extracted from the response text
    #[error("VLM response not parseable: {0}")]
    ParseFailed(String),
}

impl VlmError {
    /// Parse failures are no-op ticks, not outages; everything else counts
    /// toward sustained-outage detection.
    pub const fn is_parse_failure(&self) -> bool {
        matches!(self, Self::ParseFailed(_) | Self::EmptyResponse)
    }
}

/// Errors raised while preparing a skill invocation.
///
/// Runtime outcomes (blocked preconditions, phantom failures) are not
/// errors; they are [`SkillOutcome`](crate::domain::models::skill::SkillOutcome)
/// variants. These errors mean the invocation could not even be assembled.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SkillError {
    /// No skill with this name exists in the library
    #[error("Unknown skill: {0}")]
    UnknownSkill(String),

    /// A primitive template referenced a parameter the call context lacks
    #[error("Skill template missing parameter: {0}")]
    MissingParameter(&'static str),

    /// The required tool category is not present in the inventory
    #[error("No inventory slot holds a {0:?}")]
    NoToolSlot(ToolKind),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bridge_error_display() {
        let err = BridgeError::Timeout(5);
        assert_eq!(err.to_string(), "Bridge timeout after 5s");

        let err = BridgeError::Rejected("cannot use tool here".to_string());
        assert_eq!(err.to_string(), "Bridge rejected action: cannot use tool here");
    }

    #[test]
    fn test_bridge_error_transience() {
        assert!(BridgeError::Transport("refused".into()).is_transient());
        assert!(BridgeError::Timeout(5).is_transient());
        assert!(!BridgeError::Rejected("no".into()).is_transient());
        assert!(!BridgeError::Protocol("bad json".into()).is_transient());
    }

    #[test]
    fn test_bridge_error_reachability() {
        assert!(BridgeError::Rejected("no".into()).bridge_reachable());
        assert!(!BridgeError::Transport("refused".into()).bridge_reachable());
    }

    #[test]
    fn test_vlm_parse_failure_classification() {
        assert!(VlmError::ParseFailed("no json".into()).is_parse_failure());
        assert!(VlmError::EmptyResponse.is_parse_failure());
        assert!(!VlmError::Timeout(30).is_parse_failure());
        assert!(!VlmError::RequestFailed("refused".into()).is_parse_failure());
    }

    #[test]
    fn test_skill_error_display() {
        let err = SkillError::UnknownSkill("juggle".to_string());
        assert_eq!(err.to_string(), "Unknown skill: juggle");

        let err = SkillError::NoToolSlot(ToolKind::WateringCan);
        assert!(err.to_string().contains("WateringCan"));
    }
}
