//! # ingest - Staged Byte Ingest Pipeline
//!
//! One producer pushes variable-length packets; a background thread moves
//! them in blocks; any number of consumers read them back in arrival order
//! in chunks of their own choosing.
//!
//! ## Features
//!
//! - **Non-blocking producer**: `recv` never waits on a lock or a consumer
//! - **Whole packets**: a packet is staged entirely or dropped entirely
//! - **Size-bounded reads**: `get(n)` returns up to `n` bytes, spanning blocks
//! - **Counters**: received/dropped bytes and packets plus the last error
//!
//! ## Quick Start
//!
//! ```ignore
//! use ingest::{IngestConfig, IngestController};
//!
//! fn main() -> Result<(), ingest::IngestError> {
//!     ingest::init_logging();
//!
//!     let mut controller = IngestController::new(IngestConfig::from_env())?;
//!     let consumer = controller.handle();
//!
//!     std::thread::spawn(move || loop {
//!         let bytes = consumer.get(8);
//!         if !bytes.is_empty() {
//!             println!("{:?}", bytes);
//!         }
//!     });
//!
//!     controller.recv(&[1, 2, 3, 4]);
//!     println!("{:?}", controller.stats());
//!     controller.shutdown();
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Producer                               │
//! │                IngestController::recv                       │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   Staging Buffer                            │
//! │        fixed capacity, packed head/tail cursor              │
//! └─────────────────────────────────────────────────────────────┘
//!                              │  drain (threshold wake or on demand)
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   Block Collector                           │
//! │          FIFO of drained blocks, prefix reads               │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!          ┌───────────────────┼───────────────────┐
//!          ▼                   ▼                   ▼
//!    ┌───────────┐      ┌───────────┐      ┌───────────┐
//!    │ Consumer  │      │ Consumer  │      │ Consumer  │
//!    │  get(n)   │      │  get(n)   │      │  get(n)   │
//!    └───────────┘      └───────────┘      └───────────┘
//! ```

// Re-export core types
pub use ingest_core::{
    BlockCollector,
    DrainedBlock,
    ErrorKind,
    StagingBuffer,
    StagingDrain,
    StagingWriter,
    Stats,
    StatsCell,
};

// Re-export env utilities
pub use ingest_core::{env_get, env_get_bytes};
pub use ingest_core::constants;

// Re-export runtime types
pub use ingest_runtime::{
    ConfigError,
    DrainerStats,
    IngestConfig,
    IngestController,
    IngestError,
    IngestHandle,
    IngestResult,
};

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Environment variable holding the log filter
pub const LOG_ENV: &str = "INGEST_LOG";

/// Install a stderr `tracing` subscriber filtered by `INGEST_LOG`.
///
/// Falls back to `info` when the variable is unset or unparsable. Returns
/// false if a global subscriber was already installed.
pub fn init_logging() -> bool {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
        .with(filter)
        .try_init()
        .is_ok()
}
