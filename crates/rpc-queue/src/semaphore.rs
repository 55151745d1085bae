use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

use tracing::{debug, trace};

/// A binary semaphore: starts taken, `give` releases it, `take` blocks
/// until it is free and atomically re-takes it.
///
/// Used to wake exactly one waiter table slot's owner when its matching
/// response arrives, mirroring the reference OSAL's `os_sem_*` family
/// (mutex-guarded bool plus a condvar, not a counting semaphore).
pub struct BinarySemaphore {
    inner: Mutex<bool>,
    cond: Condvar,
}

impl Default for BinarySemaphore {
    fn default() -> Self {
        Self::new()
    }
}

impl BinarySemaphore {
    pub fn new() -> Self {
        Self { inner: Mutex::new(false), cond: Condvar::new() }
    }

    /// Blocks until the semaphore is given, then consumes the signal.
    /// `timeout` of `None` waits forever. Returns `false` on timeout.
    pub fn take(&self, timeout: Option<Duration>) -> bool {
        let mut guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let deadline = timeout.map(|d| Instant::now() + d);

        while !*guard {
            match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        debug!("semaphore: take timed out");
                        return false;
                    }
                    let (g, res) = self.cond.wait_timeout(guard, deadline - now).unwrap_or_else(|e| e.into_inner());
                    guard = g;
                    if res.timed_out() && !*guard {
                        debug!("semaphore: take timed out");
                        return false;
                    }
                }
                None => {
                    guard = self.cond.wait(guard).unwrap_or_else(|e| e.into_inner());
                }
            }
        }

        *guard = false;
        trace!("semaphore: taken");
        true
    }

    pub fn give(&self) {
        let mut guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        *guard = true;
        trace!("semaphore: given");
        self.cond.notify_one();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn take_fails_immediately_when_never_given() {
        let sem = BinarySemaphore::new();
        assert!(!sem.take(Some(Duration::ZERO)));
    }

    #[test]
    fn give_then_take_succeeds() {
        let sem = BinarySemaphore::new();
        sem.give();
        assert!(sem.take(Some(Duration::ZERO)));
    }

    #[test]
    fn take_consumes_the_signal_exactly_once() {
        let sem = BinarySemaphore::new();
        sem.give();
        assert!(sem.take(None));
        assert!(!sem.take(Some(Duration::ZERO)));
    }

    #[test]
    fn blocked_waiter_wakes_on_give() {
        let sem = Arc::new(BinarySemaphore::new());
        let sem2 = sem.clone();
        let handle = thread::spawn(move || sem2.take(Some(Duration::from_secs(5))));
        thread::sleep(Duration::from_millis(20));
        sem.give();
        assert!(handle.join().unwrap());
    }
}
