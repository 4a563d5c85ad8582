//! alertstream - real-time alert fan-out over Server-Sent Events
//!
//! Producers `POST` alerts to `/alert`; every dashboard connected to
//! `/events` receives each alert as a stream frame. Delivery is best-effort:
//! a viewer that falls behind misses alerts instead of slowing anyone down.

pub mod app;
pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod handlers;
pub mod internal_metrics;
pub mod registry;
pub mod server;
pub mod session;
pub mod task_manager;

// Re-export core types for convenience
pub use crate::core::*;
