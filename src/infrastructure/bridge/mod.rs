//! HTTP adapter for the game bridge side-channel.
//!
//! Thin request/response mapping over the bridge's five endpoints. One
//! pooled reqwest client owns the connection; every call carries the
//! configured per-request deadline, and a timeout is reported as
//! [`BridgeError::Timeout`] so the caller treats the primitive as failed.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client as ReqwestClient;
use tracing::trace;

use crate::domain::error::BridgeError;
use crate::domain::models::action::PrimitiveAction;
use crate::domain::models::config::BridgeConfig;
use crate::domain::models::farm::FarmSnapshot;
use crate::domain::models::snapshot::{Position, Surroundings, WorldSnapshot};
use crate::domain::ports::bridge::{ActionResponse, GameBridge, PathCheck};

/// reqwest-backed [`GameBridge`] implementation.
pub struct HttpGameBridge {
    http: ReqwestClient,
    base_url: String,
    timeout_secs: u64,
}

impl HttpGameBridge {
    /// Build a client from bridge config.
    pub fn new(config: &BridgeConfig) -> Result<Self, BridgeError> {
        let http = ReqwestClient::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .pool_max_idle_per_host(2)
            .tcp_nodelay(true)
            .build()
            .map_err(|e| BridgeError::Transport(e.to_string()))?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout_secs: config.request_timeout_secs,
        })
    }

    fn classify(&self, err: reqwest::Error) -> BridgeError {
        if err.is_timeout() {
            BridgeError::Timeout(self.timeout_secs)
        } else if err.is_decode() {
            BridgeError::Protocol(err.to_string())
        } else {
            BridgeError::Transport(err.to_string())
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<T, BridgeError> {
        let url = format!("{}{path}", self.base_url);
        trace!(%url, "bridge GET");
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| self.classify(e))?;
        if !response.status().is_success() {
            return Err(BridgeError::Protocol(format!(
                "{path} returned {}",
                response.status()
            )));
        }
        response.json::<T>().await.map_err(|e| self.classify(e))
    }
}

#[async_trait]
impl GameBridge for HttpGameBridge {
    async fn get_state(&self) -> Result<WorldSnapshot, BridgeError> {
        self.get_json("/state").await
    }

    async fn get_surroundings(&self) -> Result<Surroundings, BridgeError> {
        self.get_json("/surroundings").await
    }

    async fn get_farm(&self) -> Result<FarmSnapshot, BridgeError> {
        self.get_json("/farm").await
    }

    async fn check_path(&self, from: Position, to: Position) -> Result<PathCheck, BridgeError> {
        let path = format!(
            "/check-path?sx={}&sy={}&ex={}&ey={}",
            from.x, from.y, to.x, to.y
        );
        self.get_json(&path).await
    }

    async fn execute(&self, action: &PrimitiveAction) -> Result<ActionResponse, BridgeError> {
        let url = format!("{}/action", self.base_url);
        trace!(opcode = action.opcode(), "bridge POST /action");
        let response = self
            .http
            .post(&url)
            .json(action)
            .send()
            .await
            .map_err(|e| self.classify(e))?;
        if !response.status().is_success() {
            return Err(BridgeError::Protocol(format!(
                "/action returned {}",
                response.status()
            )));
        }
        let body: ActionResponse = response.json().await.map_err(|e| self.classify(e))?;
        if body.success {
            Ok(body)
        } else {
            Err(BridgeError::Rejected(
                body.message.unwrap_or_else(|| "unspecified".to_string()),
            ))
        }
    }
}
