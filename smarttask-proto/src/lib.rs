//! Shared definitions for `SmartTask`: the task model, the HTTP payloads,
//! validation rules, and the on-disk storage format.

pub mod api;
pub mod codec;
pub mod task;
pub mod validate;
