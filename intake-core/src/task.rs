//! Task model: the single record shape everything in the pipeline agrees on.
//!
//! A `Task` is a value object — built once per request, never mutated after
//! construction. Storage is a later layer and lives outside this workspace.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

pub const HEURISTIC_MODEL_VERSION: &str = "heuristic-v1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }

    /// Case-insensitive parse; `None` for anything outside the closed set.
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "low" => Some(Priority::Low),
            "medium" => Some(Priority::Medium),
            "high" => Some(Priority::High),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Work,
    Personal,
    Study,
    Shopping,
    Other,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Work => "work",
            Category::Personal => "personal",
            Category::Study => "study",
            Category::Shopping => "shopping",
            Category::Other => "other",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "work" => Some(Category::Work),
            "personal" => Some(Category::Personal),
            "study" => Some(Category::Study),
            "shopping" => Some(Category::Shopping),
            "other" => Some(Category::Other),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Recurrence {
    None,
    Daily,
    Weekly,
    Monthly,
    Custom,
}

impl Recurrence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Recurrence::None => "none",
            Recurrence::Daily => "daily",
            Recurrence::Weekly => "weekly",
            Recurrence::Monthly => "monthly",
            Recurrence::Custom => "custom",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "none" => Some(Recurrence::None),
            "daily" => Some(Recurrence::Daily),
            "weekly" => Some(Recurrence::Weekly),
            "monthly" => Some(Recurrence::Monthly),
            "custom" => Some(Recurrence::Custom),
            _ => None,
        }
    }
}

/// One extracted task. Timestamps keep the caller's zone offset so the
/// serialized form stays an ISO-8601 string in their local time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub title: String,
    pub description: Option<String>,
    pub priority: Priority,
    pub category: Category,
    pub deadline: Option<DateTime<FixedOffset>>,
    pub estimated_minutes: Option<i64>,
    pub start_time_suggestion: Option<DateTime<FixedOffset>>,
    pub recurrence: Recurrence,
    pub recurrence_rule: Option<String>,
    pub reminder_minutes_before: Option<i64>,
    /// Foreign task id; ownership and existence checks belong to the store.
    pub is_subtask_of: Option<String>,
    pub source_text: String,
    pub confidence: f64,
    pub parsed_at: DateTime<FixedOffset>,
    pub model_version: String,
    pub tags: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn enums_round_trip_lowercase() {
        assert_eq!(Priority::parse("HIGH"), Some(Priority::High));
        assert_eq!(Priority::parse("urgent"), None);
        assert_eq!(Category::parse("Shopping"), Some(Category::Shopping));
        assert_eq!(Recurrence::parse("weekly"), Some(Recurrence::Weekly));
        assert_eq!(Recurrence::None.as_str(), "none");
    }

    #[test]
    fn task_serializes_with_schema_field_names() {
        let now = Utc::now().fixed_offset();
        let task = Task {
            title: "Ship report".to_string(),
            description: None,
            priority: Priority::High,
            category: Category::Work,
            deadline: None,
            estimated_minutes: Some(30),
            start_time_suggestion: None,
            recurrence: Recurrence::None,
            recurrence_rule: None,
            reminder_minutes_before: None,
            is_subtask_of: None,
            source_text: "ship report".to_string(),
            confidence: 0.9,
            parsed_at: now,
            model_version: "test".to_string(),
            tags: vec!["work".to_string()],
        };
        let json = serde_json::to_value(&task).unwrap();
        assert_eq!(json["priority"], "high");
        assert_eq!(json["category"], "work");
        assert!(json["deadline"].is_null());
        assert_eq!(json["estimated_minutes"], 30);
    }
}
