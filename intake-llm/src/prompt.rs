//! Prompt assembly for the task classifier.
//!
//! Deterministic function of (text, timezone, reference instant). Few-shot
//! example dates are computed as offsets from the reference so the examples
//! stay temporally consistent no matter when the call happens.

use chrono::{DateTime, Duration, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde_json::{Value, json};

use intake_core::schema_text;

const SYSTEM_INSTRUCTIONS: &str = "You are a precise task parser. \
Return ONLY valid JSON that matches the provided schema. \
Always respond with a `tasks` array, one object per task extracted from the user's input. \
Treat each sentence that ends with a period (.) as a separate potential task; do not merge sentences together. \
If the user provides multiple tasks, include multiple objects in the array. \
Fill unknown values with null and keep confidence between 0 and 1. \
Convert relative dates into absolute ISO8601 timestamps using the provided timezone and reference timestamp. \
Use the exact user wording for source_text for each task. \
Populate tags with relevant lowercase keywords (max 5).";

const EXAMPLE_MODEL_VERSION: &str = "gpt-classifier-example";

/// Split on sentence-terminating periods and prefix each sentence with
/// "Task N: " so the model treats period-delimited clauses as independent
/// tasks. Single-sentence input passes through untouched.
pub fn annotate_input(text: &str) -> String {
    let sentences: Vec<&str> = text
        .split('.')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();

    if sentences.len() <= 1 {
        return text.trim().to_string();
    }

    sentences
        .iter()
        .enumerate()
        .map(|(i, sentence)| format!("Task {}: {}.", i + 1, sentence))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Set a wall-clock time on a zoned day, skipping over DST gaps.
fn at_time(day: DateTime<Tz>, hour: u32) -> DateTime<Tz> {
    let tz = day.timezone();
    let naive = day
        .date_naive()
        .and_time(NaiveTime::from_hms_opt(hour, 0, 0).unwrap_or_default());
    tz.from_local_datetime(&naive)
        .earliest()
        .or_else(|| tz.from_local_datetime(&(naive + Duration::hours(1))).earliest())
        .unwrap_or(day)
}

fn iso(dt: DateTime<Tz>) -> String {
    dt.fixed_offset().to_rfc3339()
}

fn example_payloads(now_iso: &str, base: DateTime<Tz>) -> Vec<(String, Value)> {
    let saturday_noon = at_time(base + Duration::days(2), 12);
    let tuesday_morning = at_time(base + Duration::days(4), 9);
    let monday_standup = at_time(base + Duration::days(3), 10);
    let friday_follow_up = at_time(base + Duration::days(5), 16);

    vec![
        (
            "1) Buy groceries for the week on Saturday morning. 2) Schedule dentist appointment for Tuesday at 9am.".to_string(),
            json!({
                "tasks": [
                    {
                        "title": "Buy weekly groceries",
                        "description": "Milk, eggs, veggies",
                        "priority": "medium",
                        "category": "shopping",
                        "deadline": iso(saturday_noon),
                        "estimated_minutes": 30,
                        "start_time_suggestion": iso(saturday_noon - Duration::minutes(40)),
                        "recurrence": "weekly",
                        "recurrence_rule": "FREQ=WEEKLY;BYDAY=SA",
                        "reminder_minutes_before": 60,
                        "is_subtask_of": null,
                        "source_text": "Buy groceries for the week on Saturday morning",
                        "confidence": 0.92,
                        "parsed_at": now_iso,
                        "model_version": EXAMPLE_MODEL_VERSION,
                        "tags": ["shopping", "errands"]
                    },
                    {
                        "title": "Dentist appointment",
                        "description": "Routine cleaning",
                        "priority": "high",
                        "category": "personal",
                        "deadline": iso(tuesday_morning),
                        "estimated_minutes": 60,
                        "start_time_suggestion": iso(tuesday_morning - Duration::minutes(15)),
                        "recurrence": "none",
                        "recurrence_rule": null,
                        "reminder_minutes_before": 90,
                        "is_subtask_of": null,
                        "source_text": "Schedule dentist appointment for Tuesday at 9am",
                        "confidence": 0.9,
                        "parsed_at": now_iso,
                        "model_version": EXAMPLE_MODEL_VERSION,
                        "tags": ["personal", "health"]
                    }
                ]
            }),
        ),
        (
            "Finish Monday standup notes (30 min) and follow up with Alex about the Q4 budget by Friday 4pm.".to_string(),
            json!({
                "tasks": [
                    {
                        "title": "Prepare Monday standup notes",
                        "description": null,
                        "priority": "medium",
                        "category": "work",
                        "deadline": iso(monday_standup),
                        "estimated_minutes": 30,
                        "start_time_suggestion": iso(monday_standup - Duration::minutes(40)),
                        "recurrence": "weekly",
                        "recurrence_rule": "FREQ=WEEKLY;BYDAY=MO",
                        "reminder_minutes_before": 30,
                        "is_subtask_of": null,
                        "source_text": "Finish Monday standup notes (30 min)",
                        "confidence": 0.87,
                        "parsed_at": now_iso,
                        "model_version": EXAMPLE_MODEL_VERSION,
                        "tags": ["work", "meeting"]
                    },
                    {
                        "title": "Follow up with Alex about Q4 budget",
                        "description": "Confirm final numbers",
                        "priority": "high",
                        "category": "work",
                        "deadline": iso(friday_follow_up),
                        "estimated_minutes": 20,
                        "start_time_suggestion": iso(friday_follow_up - Duration::minutes(40)),
                        "recurrence": "none",
                        "recurrence_rule": null,
                        "reminder_minutes_before": 45,
                        "is_subtask_of": null,
                        "source_text": "follow up with Alex about the Q4 budget by Friday 4pm",
                        "confidence": 0.9,
                        "parsed_at": now_iso,
                        "model_version": EXAMPLE_MODEL_VERSION,
                        "tags": ["work", "finance", "communication"]
                    }
                ]
            }),
        ),
    ]
}

/// Assemble the full classifier prompt, ending in the "JSON:" cue.
pub fn build_prompt(text: &str, tz: Tz, now: DateTime<Utc>) -> String {
    let base = now.with_timezone(&tz);
    let now_iso = iso(base);
    let annotated = annotate_input(text);

    let examples = example_payloads(&now_iso, base)
        .into_iter()
        .map(|(user, payload)| {
            let rendered =
                serde_json::to_string_pretty(&payload).unwrap_or_else(|_| payload.to_string());
            format!("User: \"{user}\"\nJSON: {rendered}")
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    let user_text = if annotated.is_empty() {
        text.trim().to_string()
    } else {
        annotated
    };

    format!(
        "{SYSTEM_INSTRUCTIONS}\n\n\
Schema:\n{schema}\n\n\
Reference timestamp: {now_iso}\n\
User timezone: {tz}\n\n\
Examples:\n{examples}\n\n\
Now parse the new request.\nUser:\n{user_text}\nJSON:",
        schema = schema_text(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 5, 10, 0, 0).unwrap()
    }

    #[test]
    fn single_sentence_passes_through() {
        assert_eq!(annotate_input("Buy milk tomorrow"), "Buy milk tomorrow");
        assert_eq!(annotate_input("  Buy milk.  "), "Buy milk.");
    }

    #[test]
    fn multi_sentence_input_is_annotated() {
        let annotated = annotate_input("Call mom. Buy bread.");
        assert_eq!(annotated, "Task 1: Call mom.\nTask 2: Buy bread.");
    }

    #[test]
    fn prompt_embeds_schema_and_context() {
        let prompt = build_prompt("Buy milk tomorrow", chrono_tz::UTC, now());
        assert!(prompt.contains(schema_text()));
        assert!(prompt.contains("Reference timestamp: 2025-03-05T10:00:00+00:00"));
        assert!(prompt.contains("User timezone: UTC"));
        assert!(prompt.ends_with("JSON:"));
    }

    #[test]
    fn prompt_is_deterministic() {
        let a = build_prompt("Call mom. Buy bread.", chrono_tz::America::Chicago, now());
        let b = build_prompt("Call mom. Buy bread.", chrono_tz::America::Chicago, now());
        assert_eq!(a, b);
    }

    #[test]
    fn example_dates_track_the_reference() {
        let base = now().with_timezone(&chrono_tz::UTC);
        let payloads = example_payloads("ref", base);
        let deadline = payloads[0].1["tasks"][0]["deadline"].as_str().unwrap();
        let parsed = DateTime::parse_from_rfc3339(deadline).unwrap();
        assert_eq!(parsed.date_naive(), (base + Duration::days(2)).date_naive());
        assert_eq!(deadline, "2025-03-07T12:00:00+00:00");
    }

    #[test]
    fn empty_input_still_produces_a_prompt() {
        let prompt = build_prompt("", chrono_tz::UTC, now());
        assert!(prompt.ends_with("JSON:"));
    }
}
