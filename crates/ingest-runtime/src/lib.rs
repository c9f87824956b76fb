//! # ingest-runtime
//!
//! Threaded runtime for the staged ingest pipeline.
//!
//! This crate provides:
//! - Configuration with environment overrides
//! - The wake signal between producer and drain thread
//! - The background drain thread
//! - `IngestController`, the producer-facing entry point

pub mod config;
pub mod signal;
pub mod drainer;
pub mod controller;
pub mod error;

// Re-exports
pub use config::{ConfigError, IngestConfig};
pub use signal::{DrainSignal, Wake};
pub use drainer::{spawn_drainer, DrainTarget, DrainerConfig, DrainerHandle, DrainerStats};
pub use controller::{IngestController, IngestHandle};
pub use error::{IngestError, IngestResult};
