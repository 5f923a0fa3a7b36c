//! HTTP request and response bodies.
//!
//! Every response is wrapped in an [`ApiResponse`] envelope:
//! `{ "success": bool, "data"?, "errors"?, "error"?, "message"? }`.
//! Request payloads keep enum fields as raw strings so that validation can
//! report every violated rule at once instead of failing on the first bad
//! field during deserialization.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::task::TaskId;

/// Name reported by the health endpoint.
pub const SERVICE_NAME: &str = "Smart Task Manager API";

/// Uniform JSON envelope for every API response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    /// Whether the request succeeded.
    pub success: bool,
    /// Payload of a successful request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    /// Itemized validation failures.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<String>>,
    /// Single failure reason.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Human-readable note accompanying a success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    /// Successful response carrying `data`.
    pub const fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            errors: None,
            error: None,
            message: None,
        }
    }

    /// Successful response carrying `data` and a message.
    pub fn ok_with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::ok(data)
        }
    }

    /// Successful response with only a message.
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: None,
            errors: None,
            error: None,
            message: Some(message.into()),
        }
    }

    /// Failed response with a single reason.
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            errors: None,
            error: Some(error.into()),
            message: None,
        }
    }

    /// Failed response listing every validation error.
    pub const fn invalid(errors: Vec<String>) -> Self {
        Self {
            success: false,
            data: None,
            errors: Some(errors),
            error: None,
            message: None,
        }
    }
}

/// Deserializes a field that may be absent, `null`, or a value.
///
/// Used with `#[serde(default)]`: absent -> `None`, `null` -> `Some(None)`,
/// value -> `Some(Some(v))`.
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Body of `POST /api/tasks` and `PUT /api/tasks/:id`.
///
/// Unknown fields are ignored. `id`, `created_at` and `updated_at` can never
/// be set through this payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskPayload {
    /// Title; an explicit `null` counts as present (and invalid).
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub title: Option<Option<String>>,
    /// Description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// RFC 3339 deadline, or `null` to remove it.
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub due_date: Option<Option<String>>,
    /// Completion flag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
    /// `low`, `medium` or `high`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    /// `none`, `daily`, `weekly` or `monthly`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurrence: Option<String>,
}

impl TaskPayload {
    /// Payload with only a title set.
    #[must_use]
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: Some(Some(title.into())),
            ..Self::default()
        }
    }
}

/// Query string of `GET /api/tasks`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskQuery {
    /// `true` selects completed tasks, any other value pending ones.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<String>,
    /// Priority name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    /// Search term.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
}

/// Body of `POST /api/tasks/suggest`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestRequest {
    /// Free text typed by the user.
    #[serde(default)]
    pub input: Option<String>,
}

/// Canned suggestions for a new task.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestions {
    /// Candidate titles.
    pub titles: Vec<String>,
    /// Candidate descriptions.
    pub descriptions: Vec<String>,
    /// Candidate tags.
    pub tags: Vec<String>,
}

/// Result of `POST /api/tasks/:id/predict-due-date`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DueDatePrediction {
    /// Task the prediction is for.
    pub task_id: TaskId,
    /// Suggested deadline.
    pub predicted_due_date: DateTime<Utc>,
    /// Explanation shown to the user.
    pub message: String,
}

/// Body of `GET /api/health`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    /// Always `"OK"` while the server is answering.
    pub status: String,
    /// Server time.
    pub timestamp: DateTime<Utc>,
    /// Service name.
    pub service: String,
}
