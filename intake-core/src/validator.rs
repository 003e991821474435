//! Candidate sanitation, baseline merge, and schema validation.
//!
//! This is the sole gatekeeper: nothing the pipeline emits skips these
//! checks. Each candidate is coerced field by field, overlaid on the
//! heuristic baseline, then checked against the schema registry. A candidate
//! that cannot be repaired is replaced by the baseline — quality degrades,
//! availability does not.

use chrono::{DateTime, FixedOffset};
use serde_json::Value;

use crate::heuristics;
use crate::schema::{self, MAX_BATCH, MAX_TAGS, Violation};
use crate::task::{Category, Priority, Recurrence, Task};

pub const MISSING_TASKS_ISSUE: &str = "tasks missing from model response";

/// Per-request inputs the validator needs besides the candidate itself.
#[derive(Debug, Clone)]
pub struct ParseContext<'a> {
    /// Raw user text, used as the source_text fallback.
    pub text: &'a str,
    /// Reference instant in the caller's zone.
    pub now: DateTime<FixedOffset>,
    /// Identifier of the model that produced the candidate batch, if any.
    pub model_version: Option<&'a str>,
}

/// Batch output: 1..=10 validated tasks plus diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseResult {
    pub tasks: Vec<Task>,
    pub issues: Vec<String>,
    pub used_fallback: bool,
}

/// A candidate after per-field coercion. `None` means absent or null; the
/// merge step fills those from the baseline.
#[derive(Debug, Clone, Default, PartialEq)]
struct SanitizedTask {
    title: Option<String>,
    description: Option<String>,
    priority: Option<Priority>,
    category: Option<Category>,
    deadline: Option<DateTime<FixedOffset>>,
    estimated_minutes: Option<i64>,
    start_time_suggestion: Option<DateTime<FixedOffset>>,
    recurrence: Option<Recurrence>,
    recurrence_rule: Option<String>,
    reminder_minutes_before: Option<i64>,
    is_subtask_of: Option<String>,
    source_text: Option<String>,
    confidence: Option<f64>,
    parsed_at: Option<DateTime<FixedOffset>>,
    model_version: Option<String>,
    tags: Option<Vec<String>>,
}

/// Validate a raw candidate batch against the baseline and return the final
/// result. Never fails: a missing/empty/non-array batch degrades to exactly
/// one baseline task.
pub fn validate_and_normalize(
    candidate: Option<&Value>,
    baseline: &Task,
    ctx: &ParseContext,
) -> ParseResult {
    let mut tasks = Vec::new();
    let mut issues = Vec::new();
    let mut used_fallback = false;

    let candidates: Vec<&Value> = candidate
        .and_then(|v| v.get("tasks"))
        .and_then(Value::as_array)
        .map(|a| a.iter().take(MAX_BATCH).collect())
        .unwrap_or_default();

    if candidates.is_empty() {
        issues.push(MISSING_TASKS_ISSUE.to_string());
        tasks.push(baseline.clone());
        used_fallback = true;
    } else {
        for (index, raw) in candidates.into_iter().enumerate() {
            let (sanitized, mut violations) = sanitize(raw, *ctx.now.offset());
            let merged = merge(baseline, sanitized, ctx);
            violations.extend(schema::validate_task(&merged));

            if violations.is_empty() {
                tasks.push(merged);
            } else {
                for violation in &violations {
                    issues.push(format!("task[{index}] {violation}"));
                }
                let mut substitute = baseline.clone();
                substitute.title = format!("{} ({})", baseline.title, index + 1);
                if let Some(model) = ctx.model_version {
                    substitute.model_version = model.to_string();
                }
                tasks.push(substitute);
                used_fallback = true;
            }
        }
    }

    ParseResult {
        tasks,
        issues,
        used_fallback,
    }
}

/// Coerce each known field into canonical form; unknown keys are dropped.
/// A key that is present with an uncoercible value (bad enum, bad timestamp,
/// non-numeric integer) is recorded as a violation so the task falls back at
/// validation time. Nulls and absent keys are not violations.
fn sanitize(candidate: &Value, offset: FixedOffset) -> (SanitizedTask, Vec<Violation>) {
    let mut out = SanitizedTask::default();
    let mut violations = Vec::new();

    let Some(object) = candidate.as_object() else {
        return (out, violations);
    };

    for (key, value) in object {
        match key.as_str() {
            "title" => out.title = norm_string(value),
            "description" => out.description = norm_string(value),
            "recurrence_rule" => out.recurrence_rule = norm_string(value),
            "is_subtask_of" => out.is_subtask_of = norm_string(value),
            "model_version" => out.model_version = norm_string(value),
            "source_text" => out.source_text = norm_string(value),
            "priority" => {
                out.priority = norm_enum(value, "priority", Priority::parse, &mut violations)
            }
            "category" => {
                out.category = norm_enum(value, "category", Category::parse, &mut violations)
            }
            "recurrence" => {
                out.recurrence = norm_enum(value, "recurrence", Recurrence::parse, &mut violations)
            }
            "deadline" => out.deadline = norm_iso(value, "deadline", offset, &mut violations),
            "start_time_suggestion" => {
                out.start_time_suggestion =
                    norm_iso(value, "start_time_suggestion", offset, &mut violations)
            }
            "parsed_at" => out.parsed_at = norm_iso(value, "parsed_at", offset, &mut violations),
            "estimated_minutes" => {
                out.estimated_minutes = norm_integer(value, "estimated_minutes", &mut violations)
            }
            "reminder_minutes_before" => {
                out.reminder_minutes_before =
                    norm_integer(value, "reminder_minutes_before", &mut violations)
            }
            "confidence" => out.confidence = norm_confidence(value),
            "tags" => out.tags = Some(norm_tags(value)),
            _ => {}
        }
    }

    (out, violations)
}

fn norm_string(value: &Value) -> Option<String> {
    let s = value.as_str()?.trim();
    if s.is_empty() { None } else { Some(s.to_string()) }
}

fn norm_enum<T>(
    value: &Value,
    path: &str,
    parse: fn(&str) -> Option<T>,
    violations: &mut Vec<Violation>,
) -> Option<T> {
    if value.is_null() {
        return None;
    }
    let parsed = value.as_str().and_then(parse);
    if parsed.is_none() {
        violations.push(Violation::new(path, "must be one of the allowed values"));
    }
    parsed
}

fn norm_iso(
    value: &Value,
    path: &str,
    offset: FixedOffset,
    violations: &mut Vec<Violation>,
) -> Option<DateTime<FixedOffset>> {
    if value.is_null() {
        return None;
    }
    let parsed = value.as_str().and_then(|s| parse_iso(s.trim(), offset));
    if parsed.is_none() {
        violations.push(Violation::new(path, "must be a valid ISO-8601 timestamp"));
    }
    parsed
}

/// Accept RFC 3339, or a naive `YYYY-MM-DDTHH:MM[:SS]` interpreted in the
/// caller's offset.
fn parse_iso(s: &str, offset: FixedOffset) -> Option<DateTime<FixedOffset>> {
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt);
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(s, format) {
            return naive.and_local_timezone(offset).single();
        }
    }
    None
}

fn norm_integer(value: &Value, path: &str, violations: &mut Vec<Violation>) -> Option<i64> {
    match value {
        Value::Null => None,
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.round() as i64)),
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => match s.trim().parse::<f64>() {
            Ok(f) if f.is_finite() => Some(f.round() as i64),
            _ => {
                violations.push(Violation::new(path, "must be an integer"));
                None
            }
        },
        _ => {
            violations.push(Violation::new(path, "must be an integer"));
            None
        }
    }
}

/// Confidence is clamped later, never rejected: adversarial values still
/// yield a usable number.
fn norm_confidence(value: &Value) -> Option<f64> {
    match value {
        Value::Null => None,
        Value::Number(n) => n.as_f64(),
        Value::String(s) => Some(s.trim().parse::<f64>().unwrap_or(0.0)),
        _ => Some(0.0),
    }
}

/// Accepts an array of strings or a comma-separated string; deduped in order,
/// capped at the schema limit.
fn norm_tags(value: &Value) -> Vec<String> {
    let raw: Vec<String> = match value {
        Value::Array(items) => items.iter().filter_map(norm_string).collect(),
        Value::String(s) => s
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    };

    let mut tags: Vec<String> = Vec::new();
    for tag in raw {
        if !tags.iter().any(|t| *t == tag) {
            tags.push(tag);
        }
        if tags.len() == MAX_TAGS {
            break;
        }
    }
    tags
}

fn clamp_confidence(value: f64) -> f64 {
    if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) }
}

/// Overlay sanitized fields onto the baseline. Absent fields fall back to
/// the baseline; derived fields (start suggestion, reminder) are recomputed
/// from the merged deadline and estimate when the candidate left them out.
fn merge(baseline: &Task, s: SanitizedTask, ctx: &ParseContext) -> Task {
    let deadline = s.deadline.or(baseline.deadline);
    let estimated_minutes = s.estimated_minutes.or(baseline.estimated_minutes);
    let start_time_suggestion = s
        .start_time_suggestion
        .or_else(|| heuristics::start_suggestion(deadline, estimated_minutes));
    let reminder_minutes_before = s
        .reminder_minutes_before
        .or_else(|| deadline.map(|_| heuristics::reminder_minutes(estimated_minutes)));
    let tags = match s.tags {
        Some(tags) if !tags.is_empty() => tags,
        _ => baseline.tags.clone(),
    };

    Task {
        title: s.title.unwrap_or_else(|| baseline.title.clone()),
        description: s.description.or_else(|| baseline.description.clone()),
        priority: s.priority.unwrap_or(baseline.priority),
        category: s.category.unwrap_or(baseline.category),
        deadline,
        estimated_minutes,
        start_time_suggestion,
        recurrence: s.recurrence.unwrap_or(baseline.recurrence),
        recurrence_rule: s.recurrence_rule.or_else(|| baseline.recurrence_rule.clone()),
        reminder_minutes_before,
        is_subtask_of: s.is_subtask_of.or_else(|| baseline.is_subtask_of.clone()),
        source_text: s
            .source_text
            .unwrap_or_else(|| if ctx.text.is_empty() {
                baseline.source_text.clone()
            } else {
                ctx.text.to_string()
            }),
        confidence: clamp_confidence(s.confidence.unwrap_or(baseline.confidence)),
        parsed_at: s.parsed_at.unwrap_or(ctx.now),
        model_version: s
            .model_version
            .or_else(|| ctx.model_version.map(str::to_string))
            .unwrap_or_else(|| baseline.model_version.clone()),
        tags,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn ctx_now() -> DateTime<FixedOffset> {
        Utc.with_ymd_and_hms(2025, 3, 5, 10, 0, 0)
            .unwrap()
            .fixed_offset()
    }

    fn baseline() -> Task {
        heuristics::heuristic_parse(
            "Buy milk tomorrow, it's urgent",
            chrono_tz::UTC,
            Utc.with_ymd_and_hms(2025, 3, 5, 10, 0, 0).unwrap(),
        )
    }

    fn ctx<'a>(model: Option<&'a str>) -> ParseContext<'a> {
        ParseContext {
            text: "Buy milk tomorrow, it's urgent",
            now: ctx_now(),
            model_version: model,
        }
    }

    #[test]
    fn missing_candidate_degrades_to_baseline() {
        let base = baseline();
        let result = validate_and_normalize(None, &base, &ctx(None));
        assert_eq!(result.tasks.len(), 1);
        assert_eq!(result.tasks[0], base);
        assert_eq!(result.issues, vec![MISSING_TASKS_ISSUE.to_string()]);
        assert!(result.used_fallback);
    }

    #[test]
    fn non_array_tasks_field_degrades_to_baseline() {
        let candidate = json!({ "tasks": "not an array" });
        let result = validate_and_normalize(Some(&candidate), &baseline(), &ctx(None));
        assert_eq!(result.tasks.len(), 1);
        assert!(result.used_fallback);
    }

    #[test]
    fn good_candidate_is_accepted() {
        let candidate = json!({
            "tasks": [{
                "title": "  Buy milk  ",
                "priority": "HIGH",
                "category": "shopping",
                "deadline": "2025-03-06T09:00:00+00:00",
                "estimated_minutes": 20,
                "confidence": 0.9,
                "tags": ["shopping", "errands"],
                "source_text": "Buy milk tomorrow"
            }]
        });
        let result = validate_and_normalize(Some(&candidate), &baseline(), &ctx(Some("test-model")));
        assert!(result.issues.is_empty(), "{:?}", result.issues);
        assert!(!result.used_fallback);
        let task = &result.tasks[0];
        assert_eq!(task.title, "Buy milk");
        assert_eq!(task.priority, Priority::High);
        assert_eq!(task.estimated_minutes, Some(20));
        assert_eq!(task.model_version, "test-model");
        assert_eq!(task.source_text, "Buy milk tomorrow");
        // derived: ceil(20 * 1.2) = 24 minutes before the deadline
        let lead = task.deadline.unwrap() - task.start_time_suggestion.unwrap();
        assert_eq!(lead, chrono::Duration::minutes(24));
        assert_eq!(task.reminder_minutes_before, Some(40));
    }

    #[test]
    fn invalid_enum_replaces_only_that_task() {
        let candidate = json!({
            "tasks": [
                { "title": "Call mom", "priority": "high" },
                { "title": "Buy bread", "priority": "urgent" }
            ]
        });
        let base = baseline();
        let result = validate_and_normalize(Some(&candidate), &base, &ctx(Some("test-model")));
        assert_eq!(result.tasks.len(), 2);
        assert_eq!(result.tasks[0].title, "Call mom");
        assert_eq!(result.tasks[1].title, format!("{} (2)", base.title));
        assert!(result.used_fallback);
        assert_eq!(result.issues.len(), 1);
        assert!(result.issues[0].starts_with("task[1] priority"), "{}", result.issues[0]);
    }

    #[test]
    fn adversarial_confidence_is_clamped() {
        for bad in [json!(42.0), json!(-3), json!("nope"), json!(true)] {
            let candidate = json!({ "tasks": [{ "title": "x", "confidence": bad }] });
            let result = validate_and_normalize(Some(&candidate), &baseline(), &ctx(None));
            let c = result.tasks[0].confidence;
            assert!((0.0..=1.0).contains(&c), "confidence {c} out of range");
        }
    }

    #[test]
    fn tags_are_deduped_and_capped() {
        let tags: Vec<String> = (0..12).map(|i| format!("t{}", i % 6)).collect();
        let candidate = json!({ "tasks": [{ "title": "x", "tags": tags }] });
        let result = validate_and_normalize(Some(&candidate), &baseline(), &ctx(None));
        let out = &result.tasks[0].tags;
        assert_eq!(out.len(), 6);
        let unique: std::collections::HashSet<_> = out.iter().collect();
        assert_eq!(unique.len(), out.len());
    }

    #[test]
    fn comma_separated_tags_are_split() {
        let candidate = json!({ "tasks": [{ "title": "x", "tags": "a, b ,a,,c" }] });
        let result = validate_and_normalize(Some(&candidate), &baseline(), &ctx(None));
        assert_eq!(result.tasks[0].tags, vec!["a", "b", "c"]);
    }

    #[test]
    fn batch_is_capped_at_ten() {
        let entries: Vec<Value> = (0..14).map(|i| json!({ "title": format!("t{i}") })).collect();
        let candidate = json!({ "tasks": entries });
        let result = validate_and_normalize(Some(&candidate), &baseline(), &ctx(None));
        assert_eq!(result.tasks.len(), 10);
    }

    #[test]
    fn bad_timestamp_falls_back() {
        let candidate = json!({ "tasks": [{ "title": "x", "deadline": "not-a-date" }] });
        let result = validate_and_normalize(Some(&candidate), &baseline(), &ctx(None));
        assert!(result.used_fallback);
        assert!(result.issues[0].contains("deadline"));
    }

    #[test]
    fn naive_timestamp_gets_caller_offset() {
        let candidate = json!({ "tasks": [{ "title": "x", "deadline": "2025-03-06T09:00:00" }] });
        let result = validate_and_normalize(Some(&candidate), &baseline(), &ctx(None));
        assert!(result.issues.is_empty(), "{:?}", result.issues);
        let deadline = result.tasks[0].deadline.unwrap();
        assert_eq!(deadline.to_rfc3339(), "2025-03-06T09:00:00+00:00");
    }

    #[test]
    fn numeric_strings_parse_as_integers() {
        let candidate = json!({ "tasks": [{ "title": "x", "estimated_minutes": "25.4" }] });
        let result = validate_and_normalize(Some(&candidate), &baseline(), &ctx(None));
        assert_eq!(result.tasks[0].estimated_minutes, Some(25));
    }

    #[test]
    fn unknown_keys_are_dropped() {
        let candidate = json!({
            "tasks": [{ "title": "x", "sneaky_extra": "boom", "__proto__": 1 }]
        });
        let result = validate_and_normalize(Some(&candidate), &baseline(), &ctx(None));
        assert!(result.issues.is_empty());
        assert_eq!(result.tasks[0].title, "x");
    }

    #[test]
    fn sanitize_is_idempotent() {
        let offset = *ctx_now().offset();
        let candidate = json!({
            "title": "  Trim me  ",
            "priority": "High",
            "deadline": "2025-03-06T09:00:00",
            "estimated_minutes": "42.6",
            "confidence": "0.7",
            "tags": "a,b,a"
        });
        let (first, violations) = sanitize(&candidate, offset);
        assert!(violations.is_empty());

        let resanitized = json!({
            "title": first.title.clone(),
            "priority": first.priority,
            "deadline": first.deadline.map(|d| d.to_rfc3339()),
            "estimated_minutes": first.estimated_minutes,
            "confidence": first.confidence,
            "tags": first.tags.clone(),
        });
        let (second, violations) = sanitize(&resanitized, offset);
        assert!(violations.is_empty());
        assert_eq!(first, second);
    }

    #[test]
    fn merged_output_always_validates() {
        // Whatever survives merge must pass the registry (the gatekeeper
        // property): probe a handful of hostile shapes.
        let hostile = [
            json!({ "tasks": [{}] }),
            json!({ "tasks": [{ "title": null, "tags": [] }] }),
            json!({ "tasks": [42, "string", null] }),
            json!({ "tasks": [{ "estimated_minutes": 0 }] }),
            json!({ "tasks": [{ "reminder_minutes_before": 1 }] }),
        ];
        for candidate in &hostile {
            let result = validate_and_normalize(Some(candidate), &baseline(), &ctx(None));
            assert!(!result.tasks.is_empty() && result.tasks.len() <= 10);
            for task in &result.tasks {
                assert!(
                    schema::validate_task(task).is_empty(),
                    "emitted invalid task for {candidate}: {task:?}"
                );
            }
        }
    }
}
