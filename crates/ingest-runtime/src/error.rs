//! Construction errors for the ingest controller

use std::io;

use thiserror::Error;

use crate::config::ConfigError;

/// Result type for controller construction
pub type IngestResult<T> = Result<T, IngestError>;

/// Errors raised while starting a controller.
///
/// Once running, the controller never fails: rejected packets are reported
/// through [`Stats`](ingest_core::Stats) instead.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to spawn drain thread: {0}")]
    Spawn(#[source] io::Error),
}
