//! Storage format for the task collection.
//!
//! The whole collection is one pretty-printed JSON array of [`Task`]
//! objects. There is no envelope, version field or framing.

use crate::task::Task;

/// Error type for codec encode/decode operations.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Encodes the task collection as a pretty-printed JSON array.
///
/// # Errors
///
/// Returns `CodecError::Serialization` if a task cannot be serialized.
pub fn encode(tasks: &[Task]) -> Result<String, CodecError> {
    Ok(serde_json::to_string_pretty(tasks)?)
}

/// Decodes a task collection from its JSON text.
///
/// # Errors
///
/// Returns `CodecError::Serialization` if the text is not a JSON array of
/// valid tasks.
pub fn decode(text: &str) -> Result<Vec<Task>, CodecError> {
    Ok(serde_json::from_str(text)?)
}
