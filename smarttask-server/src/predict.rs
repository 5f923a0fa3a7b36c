//! Due-date heuristic.
//!
//! Picks a deadline offset from keywords in the task text. The first
//! matching rule wins.

use chrono::{DateTime, Duration, Utc};

/// Offset used when no keyword matches.
const DEFAULT_DAYS: i64 = 7;

/// Keyword rules in priority order.
const RULES: [(&[&str], i64); 3] = [
    (&["urgent", "asap"], 1),
    (&["soon", "quick"], 3),
    (&["long", "research"], 14),
];

/// Number of days from now a task with this text should be due.
#[must_use]
pub fn predicted_days(title: &str, description: &str) -> i64 {
    let content = format!("{title} {description}").to_lowercase();
    RULES
        .iter()
        .find(|(keywords, _)| keywords.iter().any(|k| content.contains(k)))
        .map_or(DEFAULT_DAYS, |&(_, days)| days)
}

/// Predicts a due date for a task, counted from `now`.
#[must_use]
pub fn predict(title: &str, description: &str, now: DateTime<Utc>) -> DateTime<Utc> {
    now + Duration::days(predicted_days(title, description))
}
