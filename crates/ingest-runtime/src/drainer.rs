//! Background drain thread
//!
//! Single thread that moves staged bytes into the block collector.
//!
//! # Design
//!
//! The drain thread loops:
//! 1. Re-arms the wake marker
//! 2. Waits until fullness reaches the threshold, a notify arrives, or stop
//! 3. On stop, exits; otherwise drains once through its [`DrainTarget`]
//!
//! The thread knows nothing about how draining is serialised; the target
//! takes whatever lock it needs.

use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::signal::{DrainSignal, Wake};

/// What the drain thread drains
pub trait DrainTarget: Send + Sync {
    /// Current staging fullness in `[0, 1]`
    fn fullness(&self) -> f32;

    /// Drain once, returning the number of bytes moved
    fn drain(&self) -> usize;
}

/// Configuration for the drain thread
#[derive(Debug, Clone)]
pub struct DrainerConfig {
    /// Fullness that satisfies the wait without a notify
    pub wake_threshold: f32,
    /// Idle re-check interval (None = wait for notify or stop only)
    pub idle_poll: Option<Duration>,
    /// Thread name
    pub thread_name: String,
    /// Stack size (None = system default)
    pub stack_size: Option<usize>,
}

/// Statistics from drain thread execution
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainerStats {
    /// Times the thread woke to drain
    pub wakeups: u64,

    /// Wakeups that found bytes to move
    pub drains: u64,

    /// Total bytes moved
    pub bytes_drained: u64,

    /// Largest single drain
    pub max_block: usize,
}

/// Handle to a running drain thread
pub struct DrainerHandle {
    handle: Option<JoinHandle<DrainerStats>>,
    signal: Arc<DrainSignal>,
}

impl DrainerHandle {
    /// Request stop and wait for the thread to exit.
    ///
    /// Returns default stats if the thread was already joined or panicked.
    pub fn shutdown(&mut self) -> DrainerStats {
        self.signal.stop();
        let Some(handle) = self.handle.take() else {
            return DrainerStats::default();
        };
        match handle.join() {
            Ok(stats) => stats,
            Err(_) => {
                tracing::error!("drain thread panicked");
                DrainerStats::default()
            }
        }
    }

    /// True until [`shutdown`](Self::shutdown) has joined the thread
    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    /// Signal shared with the thread
    pub fn signal(&self) -> &Arc<DrainSignal> {
        &self.signal
    }
}

impl Drop for DrainerHandle {
    fn drop(&mut self) {
        if self.is_running() {
            self.shutdown();
        }
    }
}

/// Spawn the drain thread
pub fn spawn_drainer<T>(
    target: Arc<T>,
    signal: Arc<DrainSignal>,
    config: DrainerConfig,
) -> io::Result<DrainerHandle>
where
    T: DrainTarget + 'static,
{
    let mut builder = thread::Builder::new().name(config.thread_name.clone());
    if let Some(stack_size) = config.stack_size {
        builder = builder.stack_size(stack_size);
    }

    let thread_signal = Arc::clone(&signal);
    let handle = builder.spawn(move || drain_loop(target, thread_signal, config))?;

    Ok(DrainerHandle {
        handle: Some(handle),
        signal,
    })
}

/// Main drain loop
fn drain_loop<T>(target: Arc<T>, signal: Arc<DrainSignal>, config: DrainerConfig) -> DrainerStats
where
    T: DrainTarget,
{
    let mut stats = DrainerStats::default();
    let threshold = config.wake_threshold;

    tracing::debug!(thread = %config.thread_name, threshold, "drain thread started");

    loop {
        signal.rearm();
        match signal.wait(|| target.fullness() >= threshold, config.idle_poll) {
            Wake::Stop => break,
            Wake::Drain => {
                stats.wakeups += 1;
                let moved = target.drain();
                if moved > 0 {
                    stats.drains += 1;
                    stats.bytes_drained += moved as u64;
                    stats.max_block = stats.max_block.max(moved);
                }
                tracing::trace!(moved, "drain wakeup");
            }
        }
    }

    tracing::debug!(
        wakeups = stats.wakeups,
        drains = stats.drains,
        bytes_drained = stats.bytes_drained,
        "drain thread stopped"
    );
    stats
}
