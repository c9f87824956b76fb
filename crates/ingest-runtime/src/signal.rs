//! Wake signal between the producer and the drain thread
//!
//! The producer calls [`DrainSignal::notify`] when staging fullness crosses
//! the wake threshold. Only the first call after the drain thread re-arms
//! actually touches the mutex and condvar; later calls return immediately
//! until the thread has woken, drained and re-armed again.
//!
//! The drain thread re-arms before every wait and then checks its wake
//! predicate under the mutex, so a crossing that happens while the marker
//! is still set is caught by the predicate instead of being lost.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Why [`DrainSignal::wait`] returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wake {
    /// Threshold reached or explicit notify
    Drain,
    /// Shutdown requested
    Stop,
}

#[derive(Debug, Default)]
struct SignalState {
    /// A notify arrived that the waiter has not consumed yet
    pending: bool,
    /// Shutdown requested
    stop: bool,
}

/// Condvar-based wake/stop rendezvous
#[derive(Debug, Default)]
pub struct DrainSignal {
    state: Mutex<SignalState>,
    condvar: Condvar,
    /// Set by the first notify after a re-arm
    notified: AtomicBool,
}

impl DrainSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wake the drain thread unless it was already signalled since its
    /// last re-arm.
    ///
    /// Returns true if this call delivered the wake.
    pub fn notify(&self) -> bool {
        if self.notified.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.lock().pending = true;
        self.condvar.notify_one();
        true
    }

    /// Allow the next [`notify`](Self::notify) through
    #[inline]
    pub fn rearm(&self) {
        self.notified.store(false, Ordering::Release);
    }

    /// True if a notify has been delivered since the last re-arm
    #[inline]
    pub fn is_notified(&self) -> bool {
        self.notified.load(Ordering::Acquire)
    }

    /// Request shutdown and wake every waiter unconditionally
    pub fn stop(&self) {
        self.lock().stop = true;
        self.condvar.notify_all();
    }

    pub fn is_stopped(&self) -> bool {
        self.lock().stop
    }

    /// Block until `ready()` holds, a notify is pending, or stop is requested.
    ///
    /// With `poll` set, the predicate is re-evaluated at least that often
    /// even without a notify. Stop takes priority over everything else.
    pub fn wait<F>(&self, ready: F, poll: Option<Duration>) -> Wake
    where
        F: Fn() -> bool,
    {
        let mut state = self.lock();
        loop {
            if state.stop {
                return Wake::Stop;
            }
            if state.pending || ready() {
                state.pending = false;
                return Wake::Drain;
            }
            state = match poll {
                Some(interval) => match self.condvar.wait_timeout(state, interval) {
                    Ok((guard, _)) => guard,
                    Err(poisoned) => poisoned.into_inner().0,
                },
                None => self
                    .condvar
                    .wait(state)
                    .unwrap_or_else(PoisonError::into_inner),
            };
        }
    }

    #[inline]
    fn lock(&self) -> MutexGuard<'_, SignalState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn test_notify_once_per_arming() {
        let signal = DrainSignal::new();
        assert!(signal.notify());
        assert!(!signal.notify());
        assert!(signal.is_notified());

        signal.rearm();
        assert!(!signal.is_notified());
        assert!(signal.notify());
    }

    #[test]
    fn test_pending_notify_satisfies_wait() {
        let signal = DrainSignal::new();
        signal.notify();
        assert_eq!(signal.wait(|| false, None), Wake::Drain);
        assert!(!signal.lock().pending);
        // marker stays set until the waiter re-arms
        assert!(!signal.notify());
    }

    #[test]
    fn test_predicate_satisfies_wait() {
        let signal = DrainSignal::new();
        assert_eq!(signal.wait(|| true, None), Wake::Drain);
    }

    #[test]
    fn test_stop_wins() {
        let signal = DrainSignal::new();
        signal.notify();
        signal.stop();
        assert!(signal.is_stopped());
        assert_eq!(signal.wait(|| true, None), Wake::Stop);
    }

    #[test]
    fn test_poll_rechecks_predicate() {
        let signal = Arc::new(DrainSignal::new());
        let flag = Arc::new(AtomicBool::new(false));

        let waiter = {
            let signal = Arc::clone(&signal);
            let flag = Arc::clone(&flag);
            thread::spawn(move || {
                signal.wait(
                    || flag.load(Ordering::Acquire),
                    Some(Duration::from_millis(5)),
                )
            })
        };

        thread::sleep(Duration::from_millis(30));
        // No notify: only the periodic re-check can see this
        flag.store(true, Ordering::Release);
        assert_eq!(waiter.join().unwrap(), Wake::Drain);
    }

    #[test]
    fn test_notify_wakes_blocked_waiter() {
        let signal = Arc::new(DrainSignal::new());
        let woken = Arc::new(AtomicUsize::new(0));

        let waiter = {
            let signal = Arc::clone(&signal);
            let woken = Arc::clone(&woken);
            thread::spawn(move || {
                let wake = signal.wait(|| false, None);
                woken.fetch_add(1, Ordering::SeqCst);
                wake
            })
        };

        thread::sleep(Duration::from_millis(30));
        assert_eq!(woken.load(Ordering::SeqCst), 0);

        let start = Instant::now();
        assert!(signal.notify());
        assert_eq!(waiter.join().unwrap(), Wake::Drain);
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_stop_wakes_blocked_waiter() {
        let signal = Arc::new(DrainSignal::new());
        let waiter = {
            let signal = Arc::clone(&signal);
            thread::spawn(move || signal.wait(|| false, None))
        };

        thread::sleep(Duration::from_millis(20));
        signal.stop();
        assert_eq!(waiter.join().unwrap(), Wake::Stop);
    }
}
