use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

use tracing::{debug, trace};

/// A bounded, blocking, multi-producer multi-consumer queue.
///
/// Mirrors the reference OSAL's ring-buffer queue (mutex plus a pair of
/// condition variables, one per direction of blocking) rather than
/// `std::sync::mpsc`: every worker thread in the runtime both sends and
/// receives through shared queues, which an mpsc channel's single-consumer
/// contract doesn't allow.
pub struct Queue<T> {
    inner: Mutex<VecDeque<T>>,
    not_empty: Condvar,
    not_full: Condvar,
    capacity: usize,
}

impl<T> Queue<T> {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "queue capacity must be non-zero");
        Self {
            inner: Mutex::new(VecDeque::with_capacity(capacity)),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            capacity,
        }
    }

    /// Pushes `item`, blocking while the queue is full. `timeout` of `None`
    /// waits forever; `Some(Duration::ZERO)` never blocks. Returns `false`
    /// on timeout.
    pub fn send(&self, item: T, timeout: Option<Duration>) -> bool {
        let mut guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let deadline = timeout.map(|d| Instant::now() + d);

        while guard.len() == self.capacity {
            match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        debug!(capacity = self.capacity, "queue: send timed out while full");
                        return false;
                    }
                    let (g, res) = self.not_full.wait_timeout(guard, deadline - now).unwrap_or_else(|e| e.into_inner());
                    guard = g;
                    if res.timed_out() && guard.len() == self.capacity {
                        debug!(capacity = self.capacity, "queue: send timed out while full");
                        return false;
                    }
                }
                None => {
                    guard = self.not_full.wait(guard).unwrap_or_else(|e| e.into_inner());
                }
            }
        }

        guard.push_back(item);
        trace!(len = guard.len(), capacity = self.capacity, "queue: item enqueued");
        self.not_empty.notify_one();
        true
    }

    /// Pops the oldest item, blocking while the queue is empty. Same
    /// timeout convention as [`Self::send`].
    pub fn recv(&self, timeout: Option<Duration>) -> Option<T> {
        let mut guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let deadline = timeout.map(|d| Instant::now() + d);

        while guard.is_empty() {
            match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        debug!("queue: recv timed out while empty");
                        return None;
                    }
                    let (g, res) = self.not_empty.wait_timeout(guard, deadline - now).unwrap_or_else(|e| e.into_inner());
                    guard = g;
                    if res.timed_out() && guard.is_empty() {
                        debug!("queue: recv timed out while empty");
                        return None;
                    }
                }
                None => {
                    guard = self.not_empty.wait(guard).unwrap_or_else(|e| e.into_inner());
                }
            }
        }

        let item = guard.pop_front();
        trace!(len = guard.len(), capacity = self.capacity, "queue: item dequeued");
        self.not_full.notify_one();
        item
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn send_recv_preserves_order() {
        let q = Queue::new(4);
        for i in 0..4 {
            assert!(q.send(i, None));
        }
        for i in 0..4 {
            assert_eq!(q.recv(None), Some(i));
        }
    }

    #[test]
    fn send_fails_immediately_when_full_and_timeout_is_zero() {
        let q = Queue::new(1);
        assert!(q.send(1, None));
        assert!(!q.send(2, Some(Duration::ZERO)));
    }

    #[test]
    fn recv_fails_immediately_when_empty_and_timeout_is_zero() {
        let q: Queue<i32> = Queue::new(1);
        assert!(q.recv(Some(Duration::ZERO)).is_none());
    }

    #[test]
    fn recv_times_out_when_nothing_arrives() {
        let q: Queue<i32> = Queue::new(1);
        let start = Instant::now();
        assert!(q.recv(Some(Duration::from_millis(50))).is_none());
        assert!(start.elapsed() >= Duration::from_millis(40));
    }

    #[test]
    fn blocked_sender_wakes_once_a_slot_frees_up() {
        let q = Arc::new(Queue::new(1));
        assert!(q.send(1, None));

        let q2 = q.clone();
        let handle = thread::spawn(move || q2.send(2, None));

        thread::sleep(Duration::from_millis(20));
        assert_eq!(q.recv(None), Some(1));
        assert!(handle.join().unwrap());
        assert_eq!(q.recv(None), Some(2));
    }

    #[test]
    fn many_producers_many_consumers_preserve_total_count() {
        let q = Arc::new(Queue::new(8));
        let producers: Vec<_> = (0..4)
            .map(|p| {
                let q = q.clone();
                thread::spawn(move || {
                    for i in 0..25 {
                        assert!(q.send(p * 100 + i, None));
                    }
                })
            })
            .collect();
        let consumers: Vec<_> = (0..4)
            .map(|_| {
                let q = q.clone();
                thread::spawn(move || {
                    let mut received = 0;
                    for _ in 0..25 {
                        if q.recv(Some(Duration::from_secs(5))).is_some() {
                            received += 1;
                        }
                    }
                    received
                })
            })
            .collect();

        for p in producers {
            p.join().unwrap();
        }
        let total: i32 = consumers.into_iter().map(|c| c.join().unwrap()).sum();
        assert_eq!(total, 100);
    }
}
