//! Schema registry: the one place that knows what a valid task batch looks
//! like.
//!
//! Three facets, kept in this module so they can only change together:
//! - bounds and `validate_task` (machine-checkable, used by the validator),
//! - `schema_text` (human-readable, embedded verbatim in prompts),
//! - `batch_json_schema` (JSON Schema handed to the model's constrained
//!   output mode).

use serde_json::{Value, json};
use std::collections::HashSet;
use std::fmt;

use crate::task::Task;

pub const MIN_BATCH: usize = 1;
pub const MAX_BATCH: usize = 10;
pub const MAX_TAGS: usize = 8;
pub const MIN_ESTIMATE_MINUTES: i64 = 1;
pub const MIN_REMINDER_MINUTES: i64 = 5;

/// A single schema violation, addressed by field path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub path: String,
    pub message: String,
}

impl Violation {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.path, self.message)
    }
}

/// Check a task against every registry constraint. Empty vec means valid.
pub fn validate_task(task: &Task) -> Vec<Violation> {
    let mut violations = Vec::new();

    if task.title.trim().is_empty() {
        violations.push(Violation::new("title", "must be a non-empty string"));
    }
    if task.source_text.trim().is_empty() {
        violations.push(Violation::new("source_text", "must be a non-empty string"));
    }
    if task.model_version.trim().is_empty() {
        violations.push(Violation::new("model_version", "must be a non-empty string"));
    }

    if let Some(minutes) = task.estimated_minutes {
        if minutes < MIN_ESTIMATE_MINUTES {
            violations.push(Violation::new(
                "estimated_minutes",
                format!("must be >= {MIN_ESTIMATE_MINUTES}"),
            ));
        }
    }
    if let Some(minutes) = task.reminder_minutes_before {
        if minutes < MIN_REMINDER_MINUTES {
            violations.push(Violation::new(
                "reminder_minutes_before",
                format!("must be >= {MIN_REMINDER_MINUTES}"),
            ));
        }
    }

    if !task.confidence.is_finite() || task.confidence < 0.0 || task.confidence > 1.0 {
        violations.push(Violation::new("confidence", "must be between 0 and 1"));
    }

    if task.tags.len() > MAX_TAGS {
        violations.push(Violation::new("tags", format!("must have at most {MAX_TAGS} items")));
    }
    let mut seen = HashSet::new();
    for tag in &task.tags {
        if tag.trim().is_empty() {
            violations.push(Violation::new("tags", "entries must be non-empty"));
            break;
        }
        if !seen.insert(tag.as_str()) {
            violations.push(Violation::new("tags", "entries must be unique"));
            break;
        }
    }

    if let (Some(start), Some(deadline)) = (task.start_time_suggestion, task.deadline) {
        if start > deadline {
            violations.push(Violation::new(
                "start_time_suggestion",
                "must not be after deadline",
            ));
        }
    }

    violations
}

/// The schema as shown to the model. The validator and this text must never
/// diverge; change them in the same commit.
pub fn schema_text() -> &'static str {
    r#"{
  "tasks": [
    {
      "title": "string",
      "description": "string|null",
      "priority": "low|medium|high",
      "category": "work|personal|study|shopping|other",
      "deadline": "ISO8601|null",
      "estimated_minutes": integer|null,
      "start_time_suggestion": "ISO8601|null",
      "recurrence": "none|daily|weekly|monthly|custom",
      "recurrence_rule": "string|null",
      "reminder_minutes_before": integer|null,
      "is_subtask_of": "task_id|null",
      "source_text": "string",
      "confidence": 0.0-1.0,
      "parsed_at": "ISO8601",
      "model_version": "string",
      "tags": ["string"]
    }
  ]
}"#
}

fn task_json_schema() -> Value {
    json!({
        "type": "object",
        "additionalProperties": false,
        "properties": {
            "title": { "type": "string", "minLength": 1 },
            "description": { "type": ["string", "null"] },
            "priority": { "type": "string", "enum": ["low", "medium", "high"] },
            "category": {
                "type": "string",
                "enum": ["work", "personal", "study", "shopping", "other"]
            },
            "deadline": { "type": ["string", "null"], "format": "date-time" },
            "estimated_minutes": { "type": ["integer", "null"], "minimum": MIN_ESTIMATE_MINUTES },
            "start_time_suggestion": { "type": ["string", "null"], "format": "date-time" },
            "recurrence": {
                "type": "string",
                "enum": ["none", "daily", "weekly", "monthly", "custom"]
            },
            "recurrence_rule": { "type": ["string", "null"] },
            "reminder_minutes_before": { "type": ["integer", "null"], "minimum": MIN_REMINDER_MINUTES },
            "is_subtask_of": { "type": ["string", "null"] },
            "source_text": { "type": "string", "minLength": 1 },
            "confidence": { "type": "number", "minimum": 0, "maximum": 1 },
            "parsed_at": { "type": "string", "format": "date-time" },
            "model_version": { "type": "string", "minLength": 1 },
            "tags": {
                "type": "array",
                "items": { "type": "string", "minLength": 1 },
                "default": [],
                "maxItems": MAX_TAGS
            }
        },
        "required": [
            "title",
            "description",
            "priority",
            "category",
            "deadline",
            "estimated_minutes",
            "start_time_suggestion",
            "recurrence",
            "recurrence_rule",
            "reminder_minutes_before",
            "is_subtask_of",
            "source_text",
            "confidence",
            "parsed_at",
            "model_version",
            "tags"
        ]
    })
}

/// JSON Schema for a whole response batch, used for schema-constrained model
/// output.
pub fn batch_json_schema() -> Value {
    json!({
        "type": "object",
        "additionalProperties": false,
        "properties": {
            "tasks": {
                "type": "array",
                "minItems": MIN_BATCH,
                "maxItems": MAX_BATCH,
                "items": task_json_schema()
            },
            "notes": { "type": ["string", "null"] }
        },
        "required": ["tasks"]
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{Category, Priority, Recurrence};
    use chrono::{Duration, Utc};

    fn valid_task() -> Task {
        let now = Utc::now().fixed_offset();
        Task {
            title: "Buy milk".to_string(),
            description: None,
            priority: Priority::Medium,
            category: Category::Shopping,
            deadline: Some(now + Duration::days(1)),
            estimated_minutes: Some(30),
            start_time_suggestion: Some(now + Duration::hours(23)),
            recurrence: Recurrence::None,
            recurrence_rule: None,
            reminder_minutes_before: Some(60),
            is_subtask_of: None,
            source_text: "buy milk tomorrow".to_string(),
            confidence: 0.55,
            parsed_at: now,
            model_version: "heuristic-v1".to_string(),
            tags: vec!["shopping".to_string()],
        }
    }

    #[test]
    fn valid_task_has_no_violations() {
        assert!(validate_task(&valid_task()).is_empty());
    }

    #[test]
    fn empty_title_is_flagged() {
        let mut t = valid_task();
        t.title = "  ".to_string();
        let v = validate_task(&t);
        assert_eq!(v.len(), 1);
        assert_eq!(v[0].path, "title");
    }

    #[test]
    fn bounds_are_enforced() {
        let mut t = valid_task();
        t.estimated_minutes = Some(0);
        t.reminder_minutes_before = Some(2);
        t.confidence = 1.4;
        let paths: Vec<_> = validate_task(&t).into_iter().map(|v| v.path).collect();
        assert!(paths.contains(&"estimated_minutes".to_string()));
        assert!(paths.contains(&"reminder_minutes_before".to_string()));
        assert!(paths.contains(&"confidence".to_string()));
    }

    #[test]
    fn duplicate_and_excess_tags_are_flagged() {
        let mut t = valid_task();
        t.tags = vec!["a".to_string(), "a".to_string()];
        assert_eq!(validate_task(&t)[0].path, "tags");

        t.tags = (0..9).map(|i| format!("t{i}")).collect();
        assert_eq!(validate_task(&t)[0].path, "tags");
    }

    #[test]
    fn start_after_deadline_is_flagged() {
        let mut t = valid_task();
        t.start_time_suggestion = t.deadline.map(|d| d + Duration::hours(1));
        assert_eq!(validate_task(&t)[0].path, "start_time_suggestion");
    }

    #[test]
    fn batch_schema_mentions_every_field() {
        let schema = batch_json_schema();
        let required = schema["properties"]["tasks"]["items"]["required"]
            .as_array()
            .unwrap();
        assert_eq!(required.len(), 16);
    }
}
