//! Thin contract around the external model provider.
//!
//! One `reqwest::Client` per gateway, built at construction and reused for
//! every call — an explicit service object owned by the host, not a hidden
//! module-level singleton. The gateway does not retry; backoff policy and
//! timeouts belong to the caller.

use reqwest::header::AUTHORIZATION;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;

use intake_core::batch_json_schema;

pub const DEFAULT_MODEL: &str = "llama-3.1-8b-instant";
pub const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1";
const MAX_COMPLETION_TOKENS: u32 = 700;

const GATEWAY_SYSTEM_ROLE: &str = "You are a task parser that converts natural language into \
strict JSON. Follow the provided schema exactly and never add explanations.";

#[derive(Debug, Error)]
pub enum GatewayError {
    /// No credential configured; the model call can never succeed.
    #[error("model credential is not configured")]
    Configuration,
    /// The provider failed or returned no content.
    #[error("model provider error: {0}")]
    Upstream(String),
    /// The call exceeded the caller's deadline.
    #[error("model call timed out")]
    Timeout,
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub base_url: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.0,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }
}

impl LlmConfig {
    /// Environment-driven config; key names kept from the service this
    /// replaces (GROQ_API_KEY / CLASSIFIER_MODEL / CLASSIFIER_TEMPERATURE).
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(key) = std::env::var("GROQ_API_KEY") {
            if !key.trim().is_empty() {
                config.api_key = Some(key);
            }
        }
        if let Ok(model) = std::env::var("CLASSIFIER_MODEL") {
            if !model.trim().is_empty() {
                config.model = model;
            }
        }
        if let Some(temp) = Self::env_temperature() {
            config.temperature = temp;
        }
        config
    }

    /// CLASSIFIER_TEMPERATURE, when set and parseable.
    pub fn env_temperature() -> Option<f32> {
        std::env::var("CLASSIFIER_TEMPERATURE")
            .ok()
            .and_then(|t| t.trim().parse().ok())
    }
}

/// Raw completion: content plus whichever model the provider reports.
#[derive(Debug, Clone)]
pub struct Completion {
    pub content: String,
    pub model: String,
}

pub struct LlmGateway {
    http: reqwest::Client,
    config: LlmConfig,
}

impl LlmGateway {
    pub fn new(config: LlmConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    pub fn is_configured(&self) -> bool {
        self.config.api_key.is_some()
    }

    /// One schema-constrained completion call. No retries.
    pub async fn complete(&self, prompt: &str) -> Result<Completion, GatewayError> {
        let key = self.config.api_key.as_deref().ok_or(GatewayError::Configuration)?;

        #[derive(Serialize)]
        struct Msg<'a> {
            role: &'a str,
            content: &'a str,
        }

        #[derive(Serialize)]
        struct Req<'a> {
            model: &'a str,
            temperature: f32,
            max_tokens: u32,
            response_format: Value,
            messages: Vec<Msg<'a>>,
        }

        #[derive(Deserialize)]
        struct Resp {
            model: Option<String>,
            choices: Vec<Choice>,
        }

        #[derive(Deserialize)]
        struct Choice {
            message: MsgOut,
        }

        #[derive(Deserialize)]
        struct MsgOut {
            content: Option<String>,
        }

        let body = Req {
            model: &self.config.model,
            temperature: self.config.temperature,
            max_tokens: MAX_COMPLETION_TOKENS,
            response_format: json!({
                "type": "json_schema",
                "json_schema": {
                    "name": "task_classifier_batch",
                    "schema": batch_json_schema(),
                    "strict": true
                }
            }),
            messages: vec![
                Msg {
                    role: "system",
                    content: GATEWAY_SYSTEM_ROLE,
                },
                Msg {
                    role: "user",
                    content: prompt,
                },
            ],
        };

        let resp = self
            .http
            .post(format!("{}/chat/completions", self.config.base_url))
            .header(AUTHORIZATION, format!("Bearer {key}"))
            .json(&body)
            .send()
            .await
            .map_err(|e| GatewayError::Upstream(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(GatewayError::Upstream(format!("{status} {text}")));
        }

        let out: Resp = resp
            .json()
            .await
            .map_err(|e| GatewayError::Upstream(format!("invalid response body: {e}")))?;

        let content = out
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .unwrap_or_default();
        if content.trim().is_empty() {
            return Err(GatewayError::Upstream("empty response content".to_string()));
        }

        Ok(Completion {
            content,
            model: out.model.unwrap_or_else(|| self.config.model.clone()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unconfigured_gateway_reports_configuration_error() {
        let gateway = LlmGateway::new(LlmConfig::default());
        assert!(!gateway.is_configured());
        let err = tokio_block_on(gateway.complete("prompt")).unwrap_err();
        assert!(matches!(err, GatewayError::Configuration));
    }

    #[test]
    fn default_config_points_at_groq() {
        let config = LlmConfig::default();
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.temperature, 0.0);
        assert!(config.base_url.contains("groq"));
    }

    fn tokio_block_on<F: std::future::Future>(f: F) -> F::Output {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("runtime")
            .block_on(f)
    }
}
