//! intake-llm: model-facing half of the task intake pipeline.
//!
//! Prompt construction, the provider gateway, and the classify orchestration
//! that ties them to the deterministic machinery in `intake-core`.

pub mod gateway;
pub mod pipeline;
pub mod prompt;

pub use gateway::{Completion, GatewayError, LlmConfig, LlmGateway};
pub use pipeline::{AuditRecord, Classifier, ClassifyOutcome, ClassifyRequest, DEFAULT_TIMEOUT};
pub use prompt::{annotate_input, build_prompt};
