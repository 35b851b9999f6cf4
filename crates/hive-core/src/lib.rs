//! Core types and error definitions for the hive swarm orchestrator.
//!
//! This crate provides the foundational pieces shared by every hive crate:
//! the unified error type and the process-wide swarm configuration value.
//!
//! # Main types
//!
//! - [`HiveError`] — Unified error enum for all hive subsystems.
//! - [`HiveResult`] — Convenience alias for `Result<T, HiveError>`.
//! - [`SwarmConfig`] — Pool bounds, scaling thresholds and timer intervals.

/// Swarm configuration and its validation.
pub mod config;
/// Error types.
pub mod error;

pub use config::SwarmConfig;
pub use error::{HiveError, HiveResult};
