//! Suspension strategies for backoff waits.
//!
//! [`EscalatingBackoff`](super::EscalatingBackoff) never sleeps directly; it
//! hands the computed duration to a [`Sleeper`]. [`ThreadSleeper`] blocks the
//! calling thread. [`InterruptibleSleeper`] blocks until the duration elapses
//! or its [`SleepInterrupt`] handle fires, whichever comes first. Either way
//! the wait counts as served and the retry counter still advances.

use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

/// Blocks the caller for a backoff duration.
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration);
}

/// Plain `std::thread::sleep`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

#[derive(Debug, Default)]
struct InterruptState {
    interrupted: Mutex<bool>,
    wake: Condvar,
}

/// A sleeper whose in-flight wait can be cut short from another thread.
///
/// ```
/// use cinch_governor::backoff::{InterruptibleSleeper, Sleeper};
/// use std::time::Duration;
///
/// let sleeper = InterruptibleSleeper::new();
/// let interrupt = sleeper.interrupt_handle();
/// interrupt.interrupt();
/// // Returns immediately: the pending interrupt is consumed.
/// sleeper.sleep(Duration::from_secs(60));
/// ```
#[derive(Debug, Default, Clone)]
pub struct InterruptibleSleeper {
    state: Arc<InterruptState>,
}

/// Handle that wakes an [`InterruptibleSleeper`].
#[derive(Debug, Clone)]
pub struct SleepInterrupt {
    state: Arc<InterruptState>,
}

impl InterruptibleSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn interrupt_handle(&self) -> SleepInterrupt {
        SleepInterrupt {
            state: Arc::clone(&self.state),
        }
    }
}

impl Sleeper for InterruptibleSleeper {
    fn sleep(&self, duration: Duration) {
        let deadline = Instant::now() + duration;
        let mut interrupted = self
            .state
            .interrupted
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        loop {
            if *interrupted {
                *interrupted = false;
                return;
            }
            let now = Instant::now();
            if now >= deadline {
                return;
            }
            interrupted = match self.state.wake.wait_timeout(interrupted, deadline - now) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
    }
}

impl SleepInterrupt {
    /// Wake the current wait, or the next one if none is in flight.
    pub fn interrupt(&self) {
        let mut interrupted = self
            .state
            .interrupted
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *interrupted = true;
        self.state.wake.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thread_sleeper_waits() {
        let start = Instant::now();
        ThreadSleeper.sleep(Duration::from_millis(5));
        assert!(start.elapsed() >= Duration::from_millis(5));
    }

    #[test]
    fn interruptible_sleeper_runs_to_deadline() {
        let sleeper = InterruptibleSleeper::new();
        let start = Instant::now();
        sleeper.sleep(Duration::from_millis(5));
        assert!(start.elapsed() >= Duration::from_millis(5));
    }

    #[test]
    fn interrupt_cuts_wait_short() {
        let sleeper = InterruptibleSleeper::new();
        let handle = sleeper.interrupt_handle();
        let waker = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            handle.interrupt();
        });

        let start = Instant::now();
        sleeper.sleep(Duration::from_secs(30));
        assert!(start.elapsed() < Duration::from_secs(10));
        waker.join().unwrap();
    }

    #[test]
    fn pending_interrupt_is_consumed_once() {
        let sleeper = InterruptibleSleeper::new();
        sleeper.interrupt_handle().interrupt();
        let start = Instant::now();
        sleeper.sleep(Duration::from_secs(30));
        assert!(start.elapsed() < Duration::from_secs(10));

        let start = Instant::now();
        sleeper.sleep(Duration::from_millis(5));
        assert!(start.elapsed() >= Duration::from_millis(5));
    }
}
