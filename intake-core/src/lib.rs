//! intake-core: deterministic half of the task intake pipeline.
//!
//! Everything here is a pure function of its inputs — no network, no async,
//! no shared state. The model-facing half (prompting, the gateway, the
//! classify pipeline) lives in `intake-llm` and leans on this crate for the
//! schema registry, the heuristic baseline, and validation.

pub mod dates;
pub mod extract;
pub mod heuristics;
pub mod schema;
pub mod task;
pub mod time;
pub mod validator;

pub use extract::{extract_json_object, parse_json_lenient};
pub use heuristics::{heuristic_parse, start_suggestion};
pub use schema::{MAX_BATCH, MAX_TAGS, MIN_BATCH, Violation, batch_json_schema, schema_text, validate_task};
pub use task::{Category, HEURISTIC_MODEL_VERSION, Priority, Recurrence, Task};
pub use validator::{MISSING_TASKS_ISSUE, ParseContext, ParseResult, validate_and_normalize};
