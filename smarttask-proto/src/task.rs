//! Task model for `SmartTask`.
//!
//! Defines the [`Task`] entity exactly as it is persisted to the data file
//! and returned over HTTP, the closed [`Priority`] and [`Recurrence`]
//! enumerations, and the already-validated inputs ([`NewTask`],
//! [`TaskPatch`], [`TaskFilter`]) that the store operates on.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Months, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// Maximum allowed task title length in characters.
pub const MAX_TITLE_LENGTH: usize = 200;

/// Maximum allowed task description length in characters.
pub const MAX_DESCRIPTION_LENGTH: usize = 1000;

/// Opaque unique identifier for a task.
///
/// Freshly created tasks get a UUID v7 string. Identifiers read back from an
/// existing data file are kept verbatim, whatever their shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    /// Creates a new time-ordered task identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for TaskId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for TaskId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Error returned when parsing an enumeration from an unknown string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: {value:?}")]
pub struct UnknownVariant {
    /// Which enumeration was being parsed.
    pub kind: &'static str,
    /// The rejected input.
    pub value: String,
}

/// Task priority.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Can wait.
    Low,
    /// The default.
    #[default]
    Medium,
    /// Needs attention first.
    High,
}

impl Priority {
    /// Every priority, lowest first.
    pub const ALL: [Self; 3] = [Self::Low, Self::Medium, Self::High];

    /// Wire name of this priority.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| UnknownVariant {
                kind: "priority",
                value: s.to_string(),
            })
    }
}

/// How often a completed task spawns a successor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Recurrence {
    /// One-off task.
    #[default]
    None,
    /// Successor due one day later.
    Daily,
    /// Successor due seven days later.
    Weekly,
    /// Successor due one calendar month later.
    Monthly,
}

impl Recurrence {
    /// Every recurrence policy.
    pub const ALL: [Self; 4] = [Self::None, Self::Daily, Self::Weekly, Self::Monthly];

    /// Wire name of this recurrence policy.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
        }
    }

    /// Returns `true` unless this is [`Recurrence::None`].
    #[must_use]
    pub const fn is_recurring(self) -> bool {
        !matches!(self, Self::None)
    }

    /// Computes the due date of the next instance, counted from `from`.
    ///
    /// Returns `None` for non-recurring tasks. Monthly recurrence clamps to
    /// the last day of a shorter month (Jan 31 -> Feb 28/29).
    #[must_use]
    pub fn next_due(self, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Self::None => None,
            Self::Daily => Some(from + Duration::days(1)),
            Self::Weekly => Some(from + Duration::days(7)),
            Self::Monthly => from.checked_add_months(Months::new(1)),
        }
    }
}

impl fmt::Display for Recurrence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Recurrence {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| UnknownVariant {
                kind: "recurrence",
                value: s.to_string(),
            })
    }
}

/// Offset-less date-time layouts, read as UTC.
const NAIVE_DATE_TIME_FORMATS: [&str; 3] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
];

/// Parses a timestamp in one of the ISO-8601 forms clients send.
///
/// Accepts RFC 3339 with any offset, a date-time without offset (taken as
/// UTC), and a bare `YYYY-MM-DD` date (taken as midnight UTC).
#[must_use]
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    if let Some(naive) = NAIVE_DATE_TIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
    {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Reads an optional timestamp through [`parse_timestamp`]. `null` and the
/// empty string both mean no timestamp.
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(raw) = Option::<String>::deserialize(deserializer)? else {
        return Ok(None);
    };
    if raw.trim().is_empty() {
        return Ok(None);
    }
    parse_timestamp(&raw)
        .map(Some)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {raw:?}")))
}

/// A single tracked task.
///
/// Field names match the persisted JSON document and the HTTP payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier, immutable after creation.
    pub id: TaskId,
    /// Non-empty title, at most [`MAX_TITLE_LENGTH`] characters.
    pub title: String,
    /// Free text, at most [`MAX_DESCRIPTION_LENGTH`] characters.
    #[serde(default)]
    pub description: String,
    /// Optional deadline.
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub due_date: Option<DateTime<Utc>>,
    /// Whether the task is done.
    #[serde(default)]
    pub completed: bool,
    /// When the task was last marked completed; cleared when reopened.
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Task priority.
    #[serde(default)]
    pub priority: Priority,
    /// Recurrence policy.
    #[serde(default)]
    pub recurrence: Recurrence,
    /// Creation time, immutable.
    pub created_at: DateTime<Utc>,
    /// Time of the last mutation.
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Builds a fresh task from validated input.
    ///
    /// `created_at` and `updated_at` are both set to `now`.
    #[must_use]
    pub fn from_new(input: NewTask, now: DateTime<Utc>) -> Self {
        Self {
            id: TaskId::new(),
            title: input.title,
            description: input.description,
            due_date: input.due_date,
            completed: false,
            completed_at: None,
            priority: input.priority,
            recurrence: input.recurrence,
            created_at: now,
            updated_at: now,
        }
    }

    /// Applies a shallow patch: fields absent from `patch` are kept.
    ///
    /// A change of `completed` that does not carry its own `completed_at`
    /// stamps `completed_at` with `now` (or clears it when reopening).
    /// `updated_at` becomes `now`, but never moves backwards.
    pub fn apply(&mut self, patch: TaskPatch, now: DateTime<Utc>) {
        if let Some(title) = patch.title {
            self.title = title;
        }
        if let Some(description) = patch.description {
            self.description = description;
        }
        if let Some(due_date) = patch.due_date {
            self.due_date = due_date;
        }
        if let Some(priority) = patch.priority {
            self.priority = priority;
        }
        if let Some(recurrence) = patch.recurrence {
            self.recurrence = recurrence;
        }
        if let Some(completed) = patch.completed {
            if completed != self.completed && patch.completed_at.is_none() {
                self.completed_at = completed.then_some(now);
            }
            self.completed = completed;
        }
        if let Some(completed_at) = patch.completed_at {
            self.completed_at = completed_at;
        }
        self.updated_at = now.max(self.updated_at);
    }

    /// Whether the task has a deadline in the past and is still open.
    #[must_use]
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        !self.completed && self.due_date.is_some_and(|due| due < now)
    }

    /// Whether the task is open and due after `now` but no later than
    /// `now + window`.
    #[must_use]
    pub fn is_due_within(&self, now: DateTime<Utc>, window: Duration) -> bool {
        if self.completed {
            return false;
        }
        self.due_date.is_some_and(|due| {
            let remaining = due - now;
            remaining > Duration::zero() && remaining <= window
        })
    }

    /// Whether the task passes every predicate set in `filter`.
    #[must_use]
    pub fn matches(&self, filter: &TaskFilter) -> bool {
        if filter.completed.is_some_and(|c| c != self.completed) {
            return false;
        }
        if filter.priority.is_some_and(|p| p != self.priority) {
            return false;
        }
        match filter.search.as_deref() {
            None => true,
            Some(term) => {
                let term = term.to_lowercase();
                self.title.to_lowercase().contains(&term)
                    || self.description.to_lowercase().contains(&term)
            }
        }
    }
}

/// Validated input for creating a task.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NewTask {
    /// Task title.
    pub title: String,
    /// Task description, empty when not given.
    pub description: String,
    /// Optional deadline.
    pub due_date: Option<DateTime<Utc>>,
    /// Priority, [`Priority::Medium`] when not given.
    pub priority: Priority,
    /// Recurrence, [`Recurrence::None`] when not given.
    pub recurrence: Recurrence,
}

impl NewTask {
    /// Creates input with the given title and every other field defaulted.
    #[must_use]
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }
}

/// Validated partial update of a task.
///
/// `None` means "leave unchanged". For the nullable fields, `Some(None)`
/// clears the value.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TaskPatch {
    /// New title.
    pub title: Option<String>,
    /// New description.
    pub description: Option<String>,
    /// New deadline, or `Some(None)` to remove it.
    pub due_date: Option<Option<DateTime<Utc>>>,
    /// New completion flag.
    pub completed: Option<bool>,
    /// Explicit completion time, or `Some(None)` to clear it.
    pub completed_at: Option<Option<DateTime<Utc>>>,
    /// New priority.
    pub priority: Option<Priority>,
    /// New recurrence policy.
    pub recurrence: Option<Recurrence>,
}

/// Conjunctive list filter. Unset predicates match everything.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TaskFilter {
    /// Only tasks with this completion flag.
    pub completed: Option<bool>,
    /// Only tasks with this priority.
    pub priority: Option<Priority>,
    /// Case-insensitive substring of the title or description.
    pub search: Option<String>,
}

/// Aggregate counts over the task collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskStats {
    /// Number of tasks.
    pub total: usize,
    /// Number of completed tasks.
    pub completed: usize,
    /// `total - completed`.
    pub pending: usize,
    /// Open tasks whose deadline has passed.
    pub overdue: usize,
}

impl TaskStats {
    /// Computes the counts for `tasks` as of `now`.
    #[must_use]
    pub fn compute(tasks: &[Task], now: DateTime<Utc>) -> Self {
        let total = tasks.len();
        let completed = tasks.iter().filter(|t| t.completed).count();
        let overdue = tasks.iter().filter(|t| t.is_overdue(now)).count();
        Self {
            total,
            completed,
            pending: total - completed,
            overdue,
        }
    }
}
