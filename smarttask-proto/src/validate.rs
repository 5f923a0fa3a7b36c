//! Validation of incoming task payloads.
//!
//! Every rule is checked and every violation is reported; nothing
//! short-circuits on the first failure.

use chrono::{DateTime, Utc};

use crate::api::TaskPayload;
use crate::task::{
    self, MAX_DESCRIPTION_LENGTH, MAX_TITLE_LENGTH, NewTask, Priority, Recurrence, TaskPatch,
};

pub const TITLE_REQUIRED: &str = "Title is required";
pub const TITLE_TOO_LONG: &str = "Title must be less than 200 characters";
pub const DESCRIPTION_TOO_LONG: &str = "Description must be less than 1000 characters";
pub const INVALID_PRIORITY: &str = "Priority must be low, medium, or high";
pub const INVALID_RECURRENCE: &str = "Recurrence must be none, daily, weekly, or monthly";
pub const INVALID_DUE_DATE: &str = "Due date must be a valid ISO-8601 timestamp";

/// Checks a title, returning the violated rule if any.
#[must_use]
pub fn title_error(title: &str) -> Option<&'static str> {
    if title.trim().is_empty() {
        Some(TITLE_REQUIRED)
    } else if title.chars().count() > MAX_TITLE_LENGTH {
        Some(TITLE_TOO_LONG)
    } else {
        None
    }
}

/// Validates a create payload into a [`NewTask`].
///
/// # Errors
///
/// Returns every violated rule, in field order.
pub fn new_task(payload: &TaskPayload) -> Result<NewTask, Vec<String>> {
    let mut errors = Vec::new();

    let title = payload
        .title
        .as_ref()
        .and_then(Option::as_deref)
        .unwrap_or_default();
    if let Some(err) = title_error(title) {
        errors.push(err.to_string());
    }
    let fields = check_fields(payload, &mut errors);

    if !errors.is_empty() {
        return Err(errors);
    }
    Ok(NewTask {
        title: title.to_string(),
        description: payload.description.clone().unwrap_or_default(),
        due_date: fields.due_date.flatten(),
        priority: fields.priority.unwrap_or_default(),
        recurrence: fields.recurrence.unwrap_or_default(),
    })
}

/// Validates an update payload into a [`TaskPatch`].
///
/// Only fields present in the payload are checked; an explicit `null`
/// title is rejected.
///
/// # Errors
///
/// Returns every violated rule, in field order.
pub fn task_patch(payload: &TaskPayload) -> Result<TaskPatch, Vec<String>> {
    let mut errors = Vec::new();

    let title = match &payload.title {
        None => None,
        Some(None) => {
            errors.push(TITLE_REQUIRED.to_string());
            None
        }
        Some(Some(title)) => {
            if let Some(err) = title_error(title) {
                errors.push(err.to_string());
            }
            Some(title.clone())
        }
    };
    let fields = check_fields(payload, &mut errors);

    if !errors.is_empty() {
        return Err(errors);
    }
    Ok(TaskPatch {
        title,
        description: payload.description.clone(),
        due_date: fields.due_date,
        completed: payload.completed,
        completed_at: None,
        priority: fields.priority,
        recurrence: fields.recurrence,
    })
}

/// Parsed values of the fields shared by create and update.
struct CheckedFields {
    due_date: Option<Option<DateTime<Utc>>>,
    priority: Option<Priority>,
    recurrence: Option<Recurrence>,
}

fn check_fields(payload: &TaskPayload, errors: &mut Vec<String>) -> CheckedFields {
    if payload
        .description
        .as_ref()
        .is_some_and(|d| d.chars().count() > MAX_DESCRIPTION_LENGTH)
    {
        errors.push(DESCRIPTION_TOO_LONG.to_string());
    }

    let priority = parse_enum(payload.priority.as_deref(), INVALID_PRIORITY, errors);
    let recurrence = parse_enum(payload.recurrence.as_deref(), INVALID_RECURRENCE, errors);

    let due_date = match &payload.due_date {
        None => None,
        Some(None) => Some(None),
        Some(Some(raw)) if raw.trim().is_empty() => Some(None),
        Some(Some(raw)) => {
            let due = task::parse_timestamp(raw);
            if due.is_none() {
                errors.push(INVALID_DUE_DATE.to_string());
            }
            due.map(Some)
        }
    };

    CheckedFields {
        due_date,
        priority,
        recurrence,
    }
}

/// Parses an optional enum field. An empty string counts as absent.
fn parse_enum<T: std::str::FromStr>(
    raw: Option<&str>,
    message: &str,
    errors: &mut Vec<String>,
) -> Option<T> {
    match raw {
        None | Some("") => None,
        Some(raw) => raw.parse().map_or_else(
            |_| {
                errors.push(message.to_string());
                None
            },
            Some,
        ),
    }
}
