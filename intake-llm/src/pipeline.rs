//! The classify pipeline: prompt → gateway → extraction → validation.
//!
//! Infallible by type: every invocation returns a `ClassifyOutcome` with
//! 1..=10 schema-valid tasks. Model problems degrade quality (heuristic
//! fallback), never availability. The only suspension point is the gateway
//! call, bounded by the configured timeout.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use tracing::{debug, warn};

use intake_core::task::HEURISTIC_MODEL_VERSION;
use intake_core::{ParseContext, Task, heuristic_parse, parse_json_lenient, validate_and_normalize};

use crate::gateway::{GatewayError, LlmConfig, LlmGateway};
use crate::prompt::build_prompt;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Debug, Clone)]
pub struct ClassifyRequest {
    pub text: String,
    pub user_id: String,
    pub timezone: String,
    /// Replaces the built prompt verbatim when set.
    pub prompt_override: Option<String>,
}

impl ClassifyRequest {
    pub fn new(text: impl Into<String>, user_id: impl Into<String>, timezone: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            user_id: user_id.into(),
            timezone: timezone.into(),
            prompt_override: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ClassifyOutcome {
    pub tasks: Vec<Task>,
    pub issues: Vec<String>,
    pub used_fallback: bool,
    /// Model that produced the accepted batch, or "heuristic-v1" when the
    /// model contributed nothing.
    pub model: String,
    pub latency_ms: u64,
    pub audit: AuditRecord,
}

/// Everything an audit sink would want to persist about one invocation.
/// The pipeline never stores this itself.
#[derive(Debug, Clone, Serialize)]
pub struct AuditRecord {
    pub user_id: String,
    pub source_text: String,
    pub timezone: String,
    pub llm_response: Option<String>,
    pub prompt_snapshot: String,
    pub classifier_error: Option<String>,
    /// Mean confidence across emitted tasks.
    pub confidence: Option<f64>,
    pub model_version: String,
    pub latency_ms: u64,
    pub used_fallback: bool,
}

pub struct Classifier {
    gateway: LlmGateway,
    timeout: Duration,
}

impl Classifier {
    pub fn new(config: LlmConfig) -> Self {
        Self {
            gateway: LlmGateway::new(config),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn is_configured(&self) -> bool {
        self.gateway.is_configured()
    }

    pub async fn classify(&self, request: &ClassifyRequest) -> ClassifyOutcome {
        self.classify_at(request, Utc::now()).await
    }

    /// Classify against an explicit reference instant.
    pub async fn classify_at(&self, request: &ClassifyRequest, now: DateTime<Utc>) -> ClassifyOutcome {
        let mut issues = Vec::new();

        let tz: Tz = match intake_core::time::resolve_timezone(&request.timezone) {
            Ok(tz) => tz,
            Err(_) => {
                issues.push(format!(
                    "unknown timezone \"{}\", defaulting to UTC",
                    request.timezone
                ));
                chrono_tz::UTC
            }
        };

        let baseline = heuristic_parse(&request.text, tz, now);
        let prompt = request
            .prompt_override
            .clone()
            .unwrap_or_else(|| build_prompt(&request.text, tz, now));

        let started = Instant::now();
        let result = match tokio::time::timeout(self.timeout, self.gateway.complete(&prompt)).await {
            Ok(result) => result,
            Err(_) => Err(GatewayError::Timeout),
        };
        let latency_ms = started.elapsed().as_millis() as u64;

        let (tasks, used_fallback, model, llm_response, classifier_error) = match result {
            Ok(completion) => {
                debug!(model = %completion.model, latency_ms, "model completion received");
                let candidate = parse_json_lenient(&completion.content);
                let ctx = ParseContext {
                    text: &request.text,
                    now: baseline.parsed_at,
                    model_version: Some(&completion.model),
                };
                let mut parsed = validate_and_normalize(candidate.as_ref(), &baseline, &ctx);
                if parsed.used_fallback {
                    warn!(user_id = %request.user_id, issues = parsed.issues.len(), "heuristic fallback engaged");
                }
                issues.append(&mut parsed.issues);
                (
                    parsed.tasks,
                    parsed.used_fallback,
                    completion.model,
                    Some(completion.content),
                    None,
                )
            }
            Err(err) => {
                warn!(user_id = %request.user_id, error = %err, "model call failed; heuristic-only result");
                issues.push(format!("model unavailable: {err}"));
                (
                    vec![baseline],
                    true,
                    HEURISTIC_MODEL_VERSION.to_string(),
                    None,
                    Some(err.to_string()),
                )
            }
        };

        let confidence = mean_confidence(&tasks);
        let audit = AuditRecord {
            user_id: request.user_id.clone(),
            source_text: request.text.clone(),
            timezone: request.timezone.clone(),
            llm_response,
            prompt_snapshot: prompt,
            classifier_error,
            confidence,
            model_version: model.clone(),
            latency_ms,
            used_fallback,
        };

        ClassifyOutcome {
            tasks,
            issues,
            used_fallback,
            model,
            latency_ms,
            audit,
        }
    }
}

fn mean_confidence(tasks: &[Task]) -> Option<f64> {
    if tasks.is_empty() {
        return None;
    }
    let sum: f64 = tasks.iter().map(|t| t.confidence).sum();
    Some(sum / tasks.len() as f64)
}
