//! Forward-biased natural date parsing.
//!
//! Resolves relative expressions ("tomorrow", "Friday", "in 2 hours",
//! "at 4pm") and explicit `YYYY-MM-DD` dates against a zoned reference
//! instant. Ambiguous expressions always resolve to the future: a weekday
//! names its next occurrence, a bare time that already passed today rolls to
//! tomorrow, a named day without a time falls back to end of day when the
//! default morning slot is behind the reference.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Weekday};
use chrono_tz::Tz;
use regex::Regex;

const DEFAULT_HOUR: u32 = 9;

/// Parse the first date/time expression in `text`, anchored at `reference`.
/// Returns `None` when the text contains no recognizable expression.
pub fn parse_forward(text: &str, reference: DateTime<Tz>) -> Option<DateTime<Tz>> {
    let lower = text.to_lowercase();

    if let Some(dt) = parse_relative_offset(&lower, reference) {
        return Some(dt);
    }

    let date = find_date(&lower, reference);
    let time = find_time(&lower);
    if date.is_none() && time.is_none() {
        return None;
    }

    let has_date = date.is_some();
    let has_time = time.is_some();
    let naive_date = date.unwrap_or_else(|| reference.date_naive());
    let naive_time = time.unwrap_or_else(|| default_time(&lower));

    let mut candidate = zoned(naive_date.and_time(naive_time), reference)?;

    if candidate <= reference {
        if !has_date {
            // Bare time already passed today.
            candidate += Duration::days(1);
        } else if !has_time {
            // Named day with the default slot behind us: push to end of day.
            let eod = NaiveTime::from_hms_opt(23, 59, 0)?;
            candidate = zoned(naive_date.and_time(eod), reference)?;
        }
    }

    Some(candidate)
}

/// "in N minutes/hours/days/weeks" resolves as a pure offset from `reference`.
fn parse_relative_offset(lower: &str, reference: DateTime<Tz>) -> Option<DateTime<Tz>> {
    let re = Regex::new(r"\bin\s+(\d+)\s*(minutes|minute|mins|min|hours|hour|hrs|hr|days|day|weeks|week)\b").ok()?;
    let caps = re.captures(lower)?;
    let amount: i64 = caps[1].parse().ok()?;
    let unit = &caps[2];
    let duration = if unit.starts_with("min") {
        Duration::minutes(amount)
    } else if unit.starts_with('h') {
        Duration::hours(amount)
    } else if unit.starts_with("day") {
        Duration::days(amount)
    } else {
        Duration::weeks(amount)
    };
    Some(reference + duration)
}

fn find_date(lower: &str, reference: DateTime<Tz>) -> Option<NaiveDate> {
    let today = reference.date_naive();

    if let Ok(re) = Regex::new(r"\b(\d{4})-(\d{2})-(\d{2})\b") {
        if let Some(caps) = re.captures(lower) {
            let year: i32 = caps[1].parse().ok()?;
            let month: u32 = caps[2].parse().ok()?;
            let day: u32 = caps[3].parse().ok()?;
            if let Some(d) = NaiveDate::from_ymd_opt(year, month, day) {
                return Some(d);
            }
        }
    }

    if lower.contains("tomorrow") {
        return Some(today + Duration::days(1));
    }
    if lower.contains("today") || lower.contains("tonight") {
        return Some(today);
    }

    if let Some(weekday) = find_weekday(lower) {
        let current = reference.weekday().num_days_from_monday() as i64;
        let target = weekday.num_days_from_monday() as i64;
        let mut ahead = (target - current).rem_euclid(7);
        if ahead == 0 {
            ahead = 7;
        }
        return Some(today + Duration::days(ahead));
    }

    None
}

fn find_weekday(lower: &str) -> Option<Weekday> {
    const NAMES: &[(&str, Weekday)] = &[
        ("monday", Weekday::Mon),
        ("tuesday", Weekday::Tue),
        ("wednesday", Weekday::Wed),
        ("thursday", Weekday::Thu),
        ("friday", Weekday::Fri),
        ("saturday", Weekday::Sat),
        ("sunday", Weekday::Sun),
    ];
    for (name, day) in NAMES {
        if lower.contains(name) {
            return Some(*day);
        }
    }
    let re = Regex::new(r"\b(mon|tue|tues|wed|thu|thurs|fri|sat|sun)\b").ok()?;
    let caps = re.captures(lower)?;
    match &caps[1] {
        "mon" => Some(Weekday::Mon),
        "tue" | "tues" => Some(Weekday::Tue),
        "wed" => Some(Weekday::Wed),
        "thu" | "thurs" => Some(Weekday::Thu),
        "fri" => Some(Weekday::Fri),
        "sat" => Some(Weekday::Sat),
        "sun" => Some(Weekday::Sun),
        _ => None,
    }
}

fn find_time(lower: &str) -> Option<NaiveTime> {
    if lower.contains("noon") {
        return NaiveTime::from_hms_opt(12, 0, 0);
    }
    if lower.contains("midnight") {
        return NaiveTime::from_hms_opt(0, 0, 0);
    }

    // "at 9", "at 16:30", "4pm", "9:15am" — a bare number with no meridiem
    // only counts when introduced by "at".
    let re = Regex::new(r"\b(?:at\s+)?(\d{1,2})(?::(\d{2}))?\s*(am|pm)\b").ok()?;
    if let Some(caps) = re.captures(lower) {
        return meridiem_time(&caps[1], caps.get(2).map(|m| m.as_str()), &caps[3]);
    }

    let re = Regex::new(r"\bat\s+(\d{1,2})(?::(\d{2}))?\b").ok()?;
    let caps = re.captures(lower)?;
    let hour: u32 = caps[1].parse().ok()?;
    let minute: u32 = caps
        .get(2)
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0);
    NaiveTime::from_hms_opt(hour, minute, 0)
}

fn meridiem_time(hour: &str, minute: Option<&str>, meridiem: &str) -> Option<NaiveTime> {
    let hour: u32 = hour.parse().ok()?;
    if hour == 0 || hour > 12 {
        return None;
    }
    let minute: u32 = minute.and_then(|m| m.parse().ok()).unwrap_or(0);
    let hour = match (hour, meridiem) {
        (12, "am") => 0,
        (12, "pm") => 12,
        (h, "pm") => h + 12,
        (h, _) => h,
    };
    NaiveTime::from_hms_opt(hour, minute, 0)
}

fn default_time(lower: &str) -> NaiveTime {
    let hour = if lower.contains("tonight") { 20 } else { DEFAULT_HOUR };
    NaiveTime::from_hms_opt(hour, 0, 0).unwrap_or_default()
}

/// Resolve a naive local datetime in the reference zone. DST gaps pick the
/// shifted instant an hour later.
fn zoned(naive: chrono::NaiveDateTime, reference: DateTime<Tz>) -> Option<DateTime<Tz>> {
    let tz = reference.timezone();
    tz.from_local_datetime(&naive)
        .earliest()
        .or_else(|| tz.from_local_datetime(&(naive + Duration::hours(1))).earliest())
}
