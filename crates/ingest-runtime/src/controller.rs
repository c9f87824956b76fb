//! Ingest controller
//!
//! Ties the staging buffer, the block collector and the drain thread
//! together.
//!
//! ```text
//!  producer ── recv ──▶ StagingWriter ──(fullness ≥ threshold)──▶ notify
//!                            │                                      │
//!                            ▼                                      ▼
//!                      StagingBuffer ◀── drain ── Pipeline ◀── drain thread
//!                                                    │
//!  consumers ── get ─────────────────────────────────┘ (on-demand drain if empty)
//! ```
//!
//! The controller value is the producer: `recv` takes `&mut self`, so there
//! is exactly one. Consumers read through cloneable [`IngestHandle`]s. The
//! collector and the drain half of the staging buffer sit behind one mutex,
//! so a background drain and an on-demand drain never run at once. The
//! producer never takes that mutex.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use ingest_core::{BlockCollector, StagingBuffer, StagingDrain, StagingWriter, Stats, StatsCell};

use crate::config::IngestConfig;
use crate::drainer::{spawn_drainer, DrainTarget, DrainerConfig, DrainerHandle, DrainerStats};
use crate::error::{IngestError, IngestResult};
use crate::signal::DrainSignal;

/// Everything a drain or a read touches
struct Pipeline {
    collector: BlockCollector,
    drain: StagingDrain,
}

impl Pipeline {
    #[inline]
    fn collect(&mut self) -> usize {
        self.collector.drain_from(&mut self.drain)
    }
}

/// State shared by the controller, its handles and the drain thread
struct Shared {
    staging: Arc<StagingBuffer>,
    pipeline: Mutex<Pipeline>,
    stats: StatsCell,
}

impl Shared {
    #[inline]
    fn lock(&self) -> MutexGuard<'_, Pipeline> {
        self.pipeline.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn get(&self, len: usize) -> Vec<u8> {
        if len == 0 {
            return Vec::new();
        }
        let mut pipeline = self.lock();
        if !pipeline.collector.has_data() && pipeline.collect() == 0 {
            return Vec::new();
        }
        pipeline.collector.read(len)
    }

    fn buffered(&self) -> usize {
        self.lock().collector.len()
    }
}

impl DrainTarget for Shared {
    fn fullness(&self) -> f32 {
        self.staging.fullness()
    }

    fn drain(&self) -> usize {
        self.lock().collect()
    }
}

/// Producer-side owner of an ingest pipeline
pub struct IngestController {
    writer: StagingWriter,
    shared: Arc<Shared>,
    drainer: DrainerHandle,
    wake_threshold: f32,
    /// Last push was dropped; used to log overflow once per episode
    overflowing: bool,
}

impl IngestController {
    /// Validate `config`, allocate the staging buffer and start the drain thread.
    pub fn new(config: IngestConfig) -> IngestResult<Self> {
        config.validate()?;

        let (writer, drain) = StagingBuffer::split(config.staging_capacity);
        let shared = Arc::new(Shared {
            staging: Arc::clone(writer.buffer()),
            pipeline: Mutex::new(Pipeline {
                collector: BlockCollector::new(),
                drain,
            }),
            stats: StatsCell::new(),
        });

        let drainer = spawn_drainer(
            Arc::clone(&shared),
            Arc::new(DrainSignal::new()),
            DrainerConfig {
                wake_threshold: config.wake_threshold,
                idle_poll: config.idle_poll,
                thread_name: config.thread_name.clone(),
                stack_size: config.stack_size,
            },
        )
        .map_err(IngestError::Spawn)?;

        tracing::debug!(
            capacity = config.staging_capacity,
            wake_threshold = config.wake_threshold,
            "ingest controller started"
        );

        Ok(Self {
            writer,
            shared,
            drainer,
            wake_threshold: config.wake_threshold,
            overflowing: false,
        })
    }

    /// Accept one packet from the producer.
    ///
    /// The packet is staged whole or dropped whole; the returned delta says
    /// which and has already been merged into [`stats`](Self::stats). Wakes
    /// the drain thread when fullness reaches the threshold. Never blocks.
    pub fn recv(&mut self, bytes: &[u8]) -> Stats {
        let delta = self.writer.push(bytes);
        self.shared.stats.record(&delta);

        if delta.packets_dropped > 0 {
            if !self.overflowing {
                self.overflowing = true;
                tracing::warn!(
                    len = bytes.len(),
                    staged = self.writer.staged(),
                    capacity = self.writer.capacity(),
                    error = %delta.last_error,
                    "staging buffer full, dropping packets"
                );
            }
        } else if delta.packets_received > 0 {
            self.overflowing = false;
        }

        if self.writer.fullness() >= self.wake_threshold {
            self.drainer.signal().notify();
        }
        delta
    }

    /// Read up to `len` bytes in arrival order
    pub fn get(&self, len: usize) -> Vec<u8> {
        self.shared.get(len)
    }

    /// Snapshot of the running totals
    pub fn stats(&self) -> Stats {
        self.shared.stats.snapshot()
    }

    /// A consumer handle for other threads
    pub fn handle(&self) -> IngestHandle {
        IngestHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Bytes waiting in the staging buffer
    pub fn staged(&self) -> usize {
        self.writer.staged()
    }

    /// Staging fullness in `[0, 1]`
    pub fn fullness(&self) -> f32 {
        self.writer.fullness()
    }

    /// Bytes already drained and waiting to be read
    pub fn buffered(&self) -> usize {
        self.shared.buffered()
    }

    /// Stop the drain thread and discard any unread bytes.
    pub fn shutdown(mut self) -> DrainerStats {
        self.stop()
    }

    fn stop(&mut self) -> DrainerStats {
        if !self.drainer.is_running() {
            return DrainerStats::default();
        }
        let stats = self.drainer.shutdown();

        let mut pipeline = self.shared.lock();
        let discarded = pipeline.collector.clear() + pipeline.drain.drain().len();
        drop(pipeline);

        tracing::debug!(
            discarded,
            drains = stats.drains,
            bytes_drained = stats.bytes_drained,
            "ingest controller stopped"
        );
        stats
    }
}

impl Drop for IngestController {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Consumer handle: `get` and `stats` from any thread
#[derive(Clone)]
pub struct IngestHandle {
    shared: Arc<Shared>,
}

impl IngestHandle {
    /// Read up to `len` bytes in arrival order
    pub fn get(&self, len: usize) -> Vec<u8> {
        self.shared.get(len)
    }

    /// Snapshot of the running totals
    pub fn stats(&self) -> Stats {
        self.shared.stats.snapshot()
    }

    /// Bytes already drained and waiting to be read
    pub fn buffered(&self) -> usize {
        self.shared.buffered()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ingest_core::ErrorKind;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;
    use std::time::{Duration, Instant};

    fn controller(capacity: usize) -> IngestController {
        IngestController::new(
            IngestConfig::new()
                .staging_capacity(capacity)
                .thread_name("ingest-drain-test"),
        )
        .unwrap()
    }

    fn pattern(start: u8, len: usize) -> Vec<u8> {
        (0..len).map(|i| start.wrapping_add(i as u8)).collect()
    }

    fn wait_for(cond: impl Fn() -> bool) -> bool {
        let start = Instant::now();
        while start.elapsed() < Duration::from_secs(5) {
            if cond() {
                return true;
            }
            thread::sleep(Duration::from_millis(1));
        }
        false
    }

    #[test]
    fn test_invalid_config_rejected() {
        let result = IngestController::new(IngestConfig::new().staging_capacity(0));
        assert!(matches!(result, Err(IngestError::Config(_))));
    }

    /// Threshold 1.0 and no polling: nothing drains until a reader asks
    fn manual(capacity: usize) -> IngestController {
        IngestController::new(
            IngestConfig::new()
                .staging_capacity(capacity)
                .wake_threshold(1.0)
                .idle_poll(None),
        )
        .unwrap()
    }

    #[test]
    fn test_capacity_16_scenario() {
        let mut c = manual(16);
        let packet: Vec<u8> = (1..=10).collect();

        assert_eq!(c.recv(&packet), Stats::received(10));

        // 6 bytes free: the packet is dropped whole, never split
        let second = c.recv(&packet);
        assert_eq!(second, Stats::dropped(10, ErrorKind::OutOfAllocatedMemory));
        assert_eq!(c.staged(), 10);

        assert_eq!(c.get(8), (1..=8).collect::<Vec<u8>>());
        assert_eq!(c.get(8), vec![9, 10]);
        assert!(c.get(8).is_empty());
    }

    #[test]
    fn test_drop_when_staging_full() {
        let mut c = manual(16);

        c.recv(&pattern(1, 10));
        let delta = c.recv(&pattern(1, 10));
        assert_eq!(delta.packets_dropped, 1);
        assert_eq!(delta.bytes_dropped, 10);
        assert_eq!(c.staged(), 10);

        let stats = c.stats();
        assert_eq!(stats.packets_received, 1);
        assert_eq!(stats.bytes_received, 10);
        assert_eq!(stats.packets_dropped, 1);
        assert_eq!(stats.bytes_dropped, 10);
        assert_eq!(stats.last_error, ErrorKind::OutOfAllocatedMemory);

        // a later success does not clear the last error
        c.recv(&pattern(50, 2));
        assert_eq!(c.stats().last_error, ErrorKind::OutOfAllocatedMemory);
    }

    #[test]
    fn test_oversized_packet_dropped() {
        let mut c = controller(16);
        let delta = c.recv(&[0u8; 17]);
        assert_eq!(delta.packets_dropped, 1);
        assert_eq!(c.staged(), 0);
        assert!(c.get(17).is_empty());
    }

    #[test]
    fn test_empty_packet_is_ignored() {
        let mut c = controller(16);
        c.recv(&[1, 2, 3]);
        let before = c.stats();
        assert!(c.recv(&[]).is_empty());
        assert_eq!(c.stats(), before);
        assert_eq!(c.staged() + c.buffered(), 3);
    }

    #[test]
    fn test_get_zero_does_not_mutate() {
        let mut c = controller(64);
        // 4/64 is below the threshold, so the drain thread leaves it alone
        c.recv(&[9, 8, 7, 6]);
        assert!(c.get(0).is_empty());
        assert_eq!(c.staged(), 4);
        assert_eq!(c.buffered(), 0);
    }

    #[test]
    fn test_on_demand_drain_below_threshold() {
        let mut c = controller(64);
        c.recv(&[1, 2, 3]);
        assert_eq!(c.get(10), vec![1, 2, 3]);
        assert!(c.get(10).is_empty());
    }

    #[test]
    fn test_background_drain_after_threshold() {
        let mut c = controller(16);
        c.recv(&pattern(0, 12));
        assert!(wait_for(|| c.staged() == 0));
        assert_eq!(c.buffered(), 12);

        // staging is empty again, so the next packet fits
        assert_eq!(c.recv(&pattern(12, 4)), Stats::received(4));
        // buffered bytes are served first; staging is only pulled when empty
        assert_eq!(c.get(100), pattern(0, 12));
        assert_eq!(c.get(100), pattern(12, 4));
    }

    /// Default threshold, no idle polling: only a notify from `recv` wakes
    /// the drain thread once it is parked
    fn notify_only(capacity: usize) -> IngestController {
        IngestController::new(
            IngestConfig::new()
                .staging_capacity(capacity)
                .idle_poll(None),
        )
        .unwrap()
    }

    /// Let the drain thread reach its condvar wait
    fn settle() {
        thread::sleep(Duration::from_millis(20));
    }

    #[test]
    fn test_recv_at_exact_threshold_wakes_drain() {
        let mut c = notify_only(16);
        settle();

        // 8/16 == 0.5, the boundary counts as reached
        c.recv(&[7; 8]);
        assert!(wait_for(|| c.buffered() == 8));
        assert_eq!(c.staged(), 0);

        let stats = c.shutdown();
        assert_eq!(stats.wakeups, 1);
        assert_eq!(stats.drains, 1);
        assert_eq!(stats.bytes_drained, 8);
    }

    #[test]
    fn test_recv_below_threshold_does_not_wake() {
        let mut c = notify_only(16);
        settle();

        c.recv(&[7; 7]);
        thread::sleep(Duration::from_millis(50));
        assert_eq!(c.buffered(), 0);
        assert_eq!(c.staged(), 7);

        // still readable through the on-demand path
        assert_eq!(c.get(16), vec![7; 7]);
        assert_eq!(c.shutdown().wakeups, 0);
    }

    #[test]
    fn test_each_threshold_crossing_wakes_again() {
        let mut c = notify_only(16);
        settle();

        c.recv(&pattern(0, 8));
        assert!(wait_for(|| c.buffered() == 8 && c.staged() == 0));
        settle();

        c.recv(&pattern(8, 10));
        assert!(wait_for(|| c.buffered() == 18 && c.staged() == 0));

        let stats = c.shutdown();
        assert_eq!(stats.wakeups, 2);
        assert_eq!(stats.drains, 2);
        assert_eq!(stats.bytes_drained, 18);
        assert_eq!(stats.max_block, 10);
    }

    #[test]
    fn test_custom_stack_size() {
        let mut c = IngestController::new(
            IngestConfig::new()
                .staging_capacity(16)
                .stack_size(Some(256 * 1024)),
        )
        .unwrap();
        c.recv(&pattern(0, 12));
        assert!(wait_for(|| c.buffered() == 12));
        assert_eq!(c.shutdown().bytes_drained, 12);
    }

    #[test]
    fn test_varied_reads_reassemble_pattern() {
        let mut c = controller(32);
        let mut expected = Vec::new();
        for i in 0..40u8 {
            let packet = pattern(i.wrapping_mul(7), 1 + (i as usize % 5));
            if c.recv(&packet).packets_received == 1 {
                expected.extend_from_slice(&packet);
            }
        }

        let mut got = Vec::new();
        let sizes = [1usize, 3, 2, 7, 5, 11];
        let mut k = 0;
        loop {
            let chunk = c.get(sizes[k % sizes.len()]);
            if chunk.is_empty() {
                break;
            }
            assert!(chunk.len() <= sizes[k % sizes.len()]);
            got.extend(chunk);
            k += 1;
        }
        assert_eq!(got, expected);
    }

    #[test]
    fn test_producer_consumer_threads_fifo() {
        let mut c = controller(256);
        let handle = c.handle();
        let done = Arc::new(AtomicBool::new(false));

        let consumer = {
            let done = Arc::clone(&done);
            thread::spawn(move || {
                let mut got = Vec::new();
                loop {
                    let finished = done.load(Ordering::Acquire);
                    let chunk = handle.get(37);
                    if chunk.is_empty() {
                        if finished {
                            break;
                        }
                        thread::yield_now();
                    }
                    got.extend(chunk);
                }
                got
            })
        };

        let mut accepted = Vec::new();
        let mut seed = 0u8;
        for i in 0..20_000usize {
            let packet = pattern(seed, 1 + i % 50);
            if c.recv(&packet).packets_received == 1 {
                accepted.extend_from_slice(&packet);
                seed = seed.wrapping_add(packet.len() as u8);
            }
        }
        done.store(true, Ordering::Release);

        let got = consumer.join().unwrap();
        assert_eq!(got, accepted);

        let stats = c.stats();
        assert_eq!(stats.bytes_received, accepted.len() as u64);
        assert_eq!(stats.packets_total(), 20_000);
    }

    #[test]
    fn test_many_consumers_receive_every_byte_once() {
        let mut c = controller(128);
        let done = Arc::new(AtomicBool::new(false));

        let consumers: Vec<_> = (0..4)
            .map(|_| {
                let handle = c.handle();
                let done = Arc::clone(&done);
                thread::spawn(move || {
                    let mut total = 0usize;
                    loop {
                        let finished = done.load(Ordering::Acquire);
                        let n = handle.get(8).len();
                        if n == 0 && finished {
                            break;
                        }
                        total += n;
                    }
                    total
                })
            })
            .collect();

        for i in 0..10_000usize {
            c.recv(&pattern(0, 1 + i % 20));
        }
        done.store(true, Ordering::Release);

        let read: usize = consumers.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(read as u64, c.stats().bytes_received);
    }

    #[test]
    fn test_handle_stats_match_controller() {
        let mut c = controller(16);
        let h1 = c.handle();
        let h2 = h1.clone();
        c.recv(&[1; 4]);
        c.recv(&[1; 40]);
        assert_eq!(h1.stats(), c.stats());
        assert_eq!(h2.stats().packets_dropped, 1);
    }

    #[test]
    fn test_shutdown_discards_and_reports() {
        let mut c = controller(16);
        let handle = c.handle();
        c.recv(&pattern(0, 12));
        assert!(wait_for(|| c.buffered() == 12));
        c.recv(&pattern(0, 2));

        let stats = c.shutdown();
        assert_eq!(stats.bytes_drained, 12);
        assert_eq!(stats.drains, 1);

        // everything left over was discarded
        assert_eq!(handle.buffered(), 0);
        assert!(handle.get(64).is_empty());
        assert_eq!(handle.stats().bytes_received, 14);
    }

    #[test]
    fn test_drop_stops_drain_thread() {
        let c = controller(16);
        let handle = c.handle();
        drop(c);
        assert!(handle.get(1).is_empty());
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(64))]

            /// Accepted packets come back in order whatever the read sizes
            #[test]
            fn accepted_bytes_read_back_in_order(
                packets in prop::collection::vec(1usize..40, 1..60),
                reads in prop::collection::vec(1usize..50, 1..20),
            ) {
                let mut c = manual(64);
                let mut expected = Vec::new();
                let mut got = Vec::new();

                for (i, len) in packets.iter().enumerate() {
                    let packet = pattern(i as u8, *len);
                    let delta = c.recv(&packet);
                    prop_assert_eq!(delta.packets_total(), 1);
                    if delta.packets_received == 1 {
                        expected.extend_from_slice(&packet);
                    }
                    // read every third packet so staging keeps getting room
                    if i % 3 == 2 {
                        let n = reads[i % reads.len()];
                        let chunk = c.get(n);
                        prop_assert!(chunk.len() <= n);
                        got.extend(chunk);
                    }
                }

                loop {
                    let chunk = c.get(17);
                    if chunk.is_empty() {
                        break;
                    }
                    got.extend(chunk);
                }
                prop_assert_eq!(got, expected);

                let stats = c.stats();
                prop_assert_eq!(stats.packets_total(), packets.len() as u64);
                prop_assert_eq!(
                    stats.bytes_received + stats.bytes_dropped,
                    packets.iter().sum::<usize>() as u64
                );
            }
        }
    }
}
