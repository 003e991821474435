//! Deterministic baseline parser.
//!
//! Derives every task field from raw text alone — no network, no failure
//! path. Unknown information degrades to defaults ("medium" priority,
//! "other" category, no deadline), never to an error. The pipeline uses
//! this both as the last-resort producer and as the baseline that fills
//! gaps in model output.

use chrono::{DateTime, Duration, FixedOffset, Utc};
use chrono_tz::Tz;
use regex::Regex;

use crate::dates;
use crate::task::{Category, HEURISTIC_MODEL_VERSION, Priority, Recurrence, Task};

pub const DEFAULT_ESTIMATE_MINUTES: i64 = 30;
pub const HEURISTIC_CONFIDENCE: f64 = 0.55;

/// Fallback title when the input is blank.
pub const EMPTY_TITLE: &str = "New task";

const HIGH_KEYWORDS: &[&str] = &["urgent", "asap", "immediately", "priority", "important", "today"];
const LOW_KEYWORDS: &[&str] = &["whenever", "later", "someday", "optionally", "maybe", "low"];

const CATEGORY_KEYWORDS: &[(Category, &[&str])] = &[
    (Category::Work, &["meeting", "slides", "report", "client", "email", "project"]),
    (Category::Personal, &["doctor", "rent", "call", "family", "birthday", "gym"]),
    (Category::Study, &["study", "assignment", "exam", "lecture", "course", "read"]),
    (Category::Shopping, &["buy", "purchase", "order", "grocery", "groceries", "shop"]),
];

const EXTRA_TAGS: &[(&str, &[&str])] = &[
    ("communication", &["follow up", "email", "call"]),
    ("finance", &["budget", "invoice", "expense", "tax"]),
    ("health", &["doctor", "medication", "gym", "workout"]),
];

const ESTIMATE_KEYWORDS: &[(&[&str], i64)] = &[
    (&["quick", "tiny", "short"], 10),
    (&["small", "email", "note"], 15),
    (&["medium", "review"], 30),
    (&["long", "deep", "detailed"], 60),
    (&["big", "comprehensive"], 90),
];

const MAX_INFERRED_TAGS: usize = 5;

/// High keywords win over low; default is the caller's fallback.
pub fn infer_priority(text: &str, fallback: Priority) -> Priority {
    let lower = text.to_lowercase();
    if HIGH_KEYWORDS.iter().any(|k| lower.contains(k)) {
        return Priority::High;
    }
    if LOW_KEYWORDS.iter().any(|k| lower.contains(k)) {
        return Priority::Low;
    }
    fallback
}

/// First bucket with a keyword hit wins; buckets are checked in a fixed order.
pub fn infer_category(text: &str, fallback: Category) -> Category {
    let lower = text.to_lowercase();
    for (category, keywords) in CATEGORY_KEYWORDS {
        if keywords.iter().any(|k| lower.contains(k)) {
            return *category;
        }
    }
    fallback
}

/// Union of every matching category bucket plus the secondary tag tables,
/// deduped and capped. Seeded with the chosen category when nothing matched.
pub fn infer_tags(text: &str, fallback_category: Category) -> Vec<String> {
    let lower = text.to_lowercase();
    let mut tags: Vec<String> = Vec::new();

    for (category, keywords) in CATEGORY_KEYWORDS {
        if keywords.iter().any(|k| lower.contains(k)) {
            push_unique(&mut tags, category.as_str());
        }
    }
    for (tag, keywords) in EXTRA_TAGS {
        if keywords.iter().any(|k| lower.contains(k)) {
            push_unique(&mut tags, tag);
        }
    }

    if tags.is_empty() {
        tags.push(fallback_category.as_str().to_string());
    }
    tags.truncate(MAX_INFERRED_TAGS);
    tags
}

fn push_unique(tags: &mut Vec<String>, tag: &str) {
    if !tags.iter().any(|t| t == tag) {
        tags.push(tag.to_string());
    }
}

/// Explicit durations ("45 min", "1.5 hours") beat keyword buckets.
/// Minutes floor at 5, hour-derived values at 15.
pub fn infer_estimate(text: &str, fallback: Option<i64>) -> Option<i64> {
    let duration_re =
        Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*(minutes|mins|min|hours|hour|hrs|hr|h)\b").ok();
    if let Some(caps) = duration_re.as_ref().and_then(|re| re.captures(text)) {
        if let Ok(value) = caps[1].parse::<f64>() {
            let unit = caps[2].to_lowercase();
            if unit.starts_with("min") {
                return Some((value.round() as i64).max(5));
            }
            return Some(((value * 60.0).round() as i64).max(15));
        }
    }

    let lower = text.to_lowercase();
    for (words, minutes) in ESTIMATE_KEYWORDS {
        if words.iter().any(|w| lower.contains(w)) {
            return Some(*minutes);
        }
    }
    fallback
}

/// Forward-biased deadline, or `None` when the text names no date.
pub fn infer_deadline(text: &str, tz: Tz, now: DateTime<Utc>) -> Option<DateTime<FixedOffset>> {
    let reference = now.with_timezone(&tz);
    dates::parse_forward(text, reference).map(|dt| dt.fixed_offset())
}

/// `deadline - ceil(estimate * 1.2)` minutes, when both inputs exist.
pub fn start_suggestion(
    deadline: Option<DateTime<FixedOffset>>,
    estimated_minutes: Option<i64>,
) -> Option<DateTime<FixedOffset>> {
    let deadline = deadline?;
    let minutes = estimated_minutes?;
    // ceil(minutes * 1.2) in integer math
    let lead = (minutes * 6 + 4) / 5;
    Some(deadline - Duration::minutes(lead))
}

/// Reminder lead time: twice the estimate, clamped to 15..=180 minutes.
pub fn reminder_minutes(estimated_minutes: Option<i64>) -> i64 {
    (estimated_minutes.unwrap_or(DEFAULT_ESTIMATE_MINUTES) * 2).clamp(15, 180)
}

/// Produce exactly one task from raw text. Cannot fail.
pub fn heuristic_parse(text: &str, tz: Tz, now: DateTime<Utc>) -> Task {
    let trimmed = text.trim();
    let title = if trimmed.is_empty() { EMPTY_TITLE } else { trimmed };
    // Blank input still has to yield a schema-valid task, so the default
    // title stands in for the empty source text.
    let source_text = if trimmed.is_empty() { title } else { text };

    let priority = infer_priority(text, Priority::Medium);
    let category = infer_category(text, Category::Other);
    let estimated = infer_estimate(text, Some(DEFAULT_ESTIMATE_MINUTES));
    let deadline = infer_deadline(text, tz, now);
    let start = start_suggestion(deadline, estimated);
    let reminder = deadline.map(|_| reminder_minutes(estimated));

    Task {
        title: title.to_string(),
        description: None,
        priority,
        category,
        deadline,
        estimated_minutes: estimated,
        start_time_suggestion: start,
        recurrence: Recurrence::None,
        recurrence_rule: None,
        reminder_minutes_before: reminder,
        is_subtask_of: None,
        source_text: source_text.to_string(),
        confidence: HEURISTIC_CONFIDENCE,
        parsed_at: now.with_timezone(&tz).fixed_offset(),
        model_version: HEURISTIC_MODEL_VERSION.to_string(),
        tags: infer_tags(text, category),
    }
}
