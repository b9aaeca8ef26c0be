//! HTTP adapter for the vision-language model.
//!
//! Speaks the OpenAI-style chat-completions shape most local VLM servers
//! expose: one user message carrying the text prompt plus an optional
//! base64 data-URL image part. The core only needs the returned text;
//! extraction of the embedded JSON happens in the decision service.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use reqwest::Client as ReqwestClient;
use serde::Deserialize;
use serde_json::json;
use tracing::trace;

use crate::domain::error::VlmError;
use crate::domain::models::config::VlmConfig;
use crate::domain::ports::vlm::VisionModel;

/// reqwest-backed [`VisionModel`] implementation.
pub struct HttpVisionModel {
    http: ReqwestClient,
    config: VlmConfig,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: String,
}

impl HttpVisionModel {
    /// Build a client from VLM config.
    pub fn new(config: VlmConfig) -> Result<Self, VlmError> {
        let http = ReqwestClient::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| VlmError::RequestFailed(e.to_string()))?;
        Ok(Self { http, config })
    }

    fn classify(&self, err: reqwest::Error) -> VlmError {
        if err.is_timeout() {
            VlmError::Timeout(self.config.request_timeout_secs)
        } else {
            VlmError::RequestFailed(err.to_string())
        }
    }

    fn build_body(&self, prompt: &str, screenshot: Option<&[u8]>) -> serde_json::Value {
        let content = match screenshot {
            Some(bytes) => {
                let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
                json!([
                    {"type": "text", "text": prompt},
                    {"type": "image_url", "image_url": {
                        "url": format!("data:image/png;base64,{encoded}")
                    }}
                ])
            }
            None => json!(prompt),
        };
        json!({
            "model": self.config.model,
            "max_tokens": self.config.max_tokens,
            "temperature": self.config.temperature,
            "messages": [{"role": "user", "content": content}]
        })
    }
}

#[async_trait]
impl VisionModel for HttpVisionModel {
    async fn decide(&self, prompt: &str, screenshot: Option<&[u8]>) -> Result<String, VlmError> {
        trace!(with_image = screenshot.is_some(), "VLM request");
        let mut request = self
            .http
            .post(&self.config.endpoint)
            .json(&self.build_body(prompt, screenshot));
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| self.classify(e))?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(VlmError::ApiError {
                status: status.as_u16(),
                message,
            });
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| VlmError::RequestFailed(e.to_string()))?;
        let text = body
            .choices
            .into_iter()
            .map(|c| c.message.content)
            .collect::<Vec<_>>()
            .join("\n");
        if text.trim().is_empty() {
            return Err(VlmError::EmptyResponse);
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(endpoint: &str) -> VlmConfig {
        VlmConfig {
            endpoint: endpoint.to_string(),
            model: "test-vlm".to_string(),
            api_key: None,
            request_timeout_secs: 2,
            max_tokens: 256,
            temperature: 0.2,
        }
    }

    #[tokio::test]
    async fn test_decide_returns_choice_text() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/")
            .with_status(200)
            .with_body(
                r#"{"choices": [{"message": {"role": "assistant", "content": "{\"reasoning\": \"ok\", \"actions\": []}"}}]}"#,
            )
            .create_async()
            .await;

        let vlm = HttpVisionModel::new(config(&server.url())).unwrap();
        let text = vlm.decide("what now?", None).await.unwrap();
        assert!(text.contains("reasoning"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_empty_content_is_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/")
            .with_status(200)
            .with_body(r#"{"choices": [{"message": {"role": "assistant", "content": ""}}]}"#)
            .create_async()
            .await;

        let vlm = HttpVisionModel::new(config(&server.url())).unwrap();
        let err = vlm.decide("what now?", None).await.unwrap_err();
        assert!(matches!(err, VlmError::EmptyResponse));
    }

    #[tokio::test]
    async fn test_api_error_carries_status() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/")
            .with_status(429)
            .with_body("slow down")
            .create_async()
            .await;

        let vlm = HttpVisionModel::new(config(&server.url())).unwrap();
        let err = vlm.decide("what now?", None).await.unwrap_err();
        match err {
            VlmError::ApiError { status, message } => {
                assert_eq!(status, 429);
                assert_eq!(message, "slow down");
            }
            other => panic!("expected api error, got {other:?}"),
        }
    }

    #[test]
    fn test_image_body_shape() {
        let vlm = HttpVisionModel::new(config("http://localhost/v1")).unwrap();
        let body = vlm.build_body("look", Some(&[1, 2, 3]));
        let parts = body["messages"][0]["content"].as_array().unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0]["type"], "text");
        assert!(parts[1]["image_url"]["url"]
            .as_str()
            .unwrap()
            .starts_with("data:image/png;base64,"));
    }
}
