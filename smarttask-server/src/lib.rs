//! `SmartTask` server library.
//!
//! Exposes the task store, the suggestion and due-date engines, the
//! background scheduler and the HTTP API for use in tests and embedding.

pub mod api;
pub mod config;
pub mod jobs;
pub mod persistence;
pub mod predict;
pub mod scheduler;
pub mod store;
pub mod suggest;
