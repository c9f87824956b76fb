//! # ingest-core
//!
//! Core types for the staged ingest pipeline.
//!
//! This crate owns no threads. The background drain task and the
//! controller that ties everything together live in `ingest-runtime`.
//!
//! ## Modules
//!
//! - `staging` - Fixed-capacity staging buffer (lock-free, one writer, one drainer)
//! - `collector` - Block list that reassembles reads across drained blocks
//! - `stats` - Throughput/drop counters and the snapshot cell
//! - `error` - Error kinds recorded in stats
//! - `env` - Environment variable utilities

pub mod staging;
pub mod collector;
pub mod stats;
pub mod error;
pub mod env;

// Re-exports for convenience
pub use staging::{StagingBuffer, StagingDrain, StagingWriter};
pub use collector::{BlockCollector, DrainedBlock};
pub use stats::{Stats, StatsCell};
pub use error::ErrorKind;
pub use env::{env_get, env_get_bytes};

/// Sizing constants
pub mod constants {
    /// Default staging capacity (1 KiB)
    pub const DEFAULT_STAGING_CAPACITY: usize = 1 << 10;

    /// Largest staging capacity. Cursors are 32-bit and wrap, so staged
    /// counts must stay well below 2^32.
    pub const MAX_STAGING_CAPACITY: usize = 1 << 30;

    /// Default fullness at which the drain task is woken
    pub const DEFAULT_WAKE_THRESHOLD: f32 = 0.5;
}
