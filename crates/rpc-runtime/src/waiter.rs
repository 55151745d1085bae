//! Waiter table: correlates an outbound REQ's sequence number with the
//! RESP/ERR that eventually answers it.
//!
//! Allocation follows spec.md §4.4 with the REDESIGN FLAGS scan-for-collision
//! safety adopted: the candidate sequence from the wrapping counter is
//! checked against every in-use slot before being accepted, so no two live
//! waiters ever share a sequence even across a 255→1 wrap.

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use rpc_proto::config::MAX_ARGS;
use rpc_proto::RpcError;
use rpc_queue::BinarySemaphore;
use tracing::warn;

/// Outcome written into a slot by the transport worker, read by the caller
/// after it wakes from the slot's semaphore.
#[derive(Debug)]
pub enum Outcome {
    /// A RESP arrived; `len` bytes of `body` are the response.
    Success,
    /// An ERR arrived; carries the mapped local error.
    Remote(RpcError),
}

struct Slot {
    in_use: bool,
    seq: u8,
    sem: Arc<BinarySemaphore>,
    body: [u8; MAX_ARGS],
    body_len: usize,
    outcome: Option<Outcome>,
}

impl Slot {
    fn new() -> Self {
        Self { in_use: false, seq: 0, sem: Arc::new(BinarySemaphore::new()), body: [0; MAX_ARGS], body_len: 0, outcome: None }
    }
}

struct Inner {
    slots: Vec<Slot>,
    next_seq: u8,
}

/// A handle to an allocated slot. Dropping it does not free the slot —
/// callers must call [`WaiterTable::free`] explicitly, matching the
/// reference design's explicit alloc/free pairing around a semaphore
/// take/give.
pub struct WaiterHandle {
    pub index: usize,
    pub seq: u8,
    pub sem: Arc<BinarySemaphore>,
}

pub struct WaiterTable {
    inner: Mutex<Inner>,
    size: usize,
}

const ALLOC_RETRIES: usize = 255;

fn next_seq(seq: u8) -> u8 {
    if seq == 255 {
        1
    } else {
        seq + 1
    }
}

impl WaiterTable {
    pub fn new(size: usize) -> Self {
        let slots = (0..size).map(|_| Slot::new()).collect();
        Self { inner: Mutex::new(Inner { slots, next_seq: 1 }), size }
    }

    /// Allocates a free slot with a sequence number guaranteed not to
    /// collide with any currently in-use waiter. Retries up to
    /// `ALLOC_RETRIES` times with a 1ms sleep between rounds when the table
    /// is momentarily full, matching spec.md §4.4's retry budget.
    pub fn allocate(&self) -> Result<WaiterHandle, RpcError> {
        for _ in 0..ALLOC_RETRIES {
            let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());

            if let Some(idx) = inner.slots.iter().position(|s| !s.in_use) {
                let mut candidate = inner.next_seq;
                let mut collision_checks = 0;
                while inner.slots.iter().any(|s| s.in_use && s.seq == candidate) {
                    candidate = next_seq(candidate);
                    collision_checks += 1;
                    if collision_checks > 255 {
                        return Err(RpcError::WaitersExhausted);
                    }
                }
                inner.next_seq = next_seq(candidate);

                let slot = &mut inner.slots[idx];
                slot.in_use = true;
                slot.seq = candidate;
                slot.body_len = 0;
                slot.outcome = None;
                let sem = slot.sem.clone();
                return Ok(WaiterHandle { index: idx, seq: candidate, sem });
            }

            drop(inner);
            thread::sleep(Duration::from_millis(1));
        }
        Err(RpcError::WaitersExhausted)
    }

    /// Called by the transport worker when a RESP/ERR with `seq` arrives.
    /// Copies `body` into the slot, records the outcome, and wakes the
    /// waiting caller. Returns `false` (logged, not propagated) if no
    /// live waiter has `seq` — a late response to an already-freed slot.
    pub fn complete(&self, seq: u8, body: &[u8], outcome: Outcome) -> bool {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let Some(slot) = inner.slots.iter_mut().find(|s| s.in_use && s.seq == seq) else {
            warn!(seq, "waiter table: no live waiter for sequence, dropping response");
            return false;
        };

        let n = body.len().min(MAX_ARGS);
        slot.body[..n].copy_from_slice(&body[..n]);
        slot.body_len = n;
        slot.outcome = Some(outcome);
        slot.sem.give();
        true
    }

    /// Copies the response body for `index` into `out` (truncating to
    /// `out.len()` if smaller) and returns the number of bytes written plus
    /// the outcome. Must only be called by the owning caller after its
    /// semaphore wakes (success path). Copies into a caller-supplied buffer
    /// rather than returning an owned `Vec` so the request/response path
    /// never allocates on the heap.
    pub fn take_result(&self, index: usize, out: &mut [u8]) -> (usize, Outcome) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let slot = &mut inner.slots[index];
        let n = slot.body_len.min(out.len());
        out[..n].copy_from_slice(&slot.body[..n]);
        let outcome = slot.outcome.take().unwrap_or(Outcome::Remote(RpcError::HandlerFailed));
        (n, outcome)
    }

    /// Frees `index` regardless of whether a response ever arrived
    /// (timeout path frees without waiting on a completion).
    pub fn free(&self, index: usize) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let slot = &mut inner.slots[index];
        slot.in_use = false;
        slot.body_len = 0;
        slot.outcome = None;
    }

    pub fn size(&self) -> usize {
        self.size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc as StdArc;
    use std::thread;

    #[test]
    fn allocate_assigns_distinct_nonzero_sequences() {
        let table = WaiterTable::new(4);
        let mut handles = Vec::new();
        for _ in 0..4 {
            let h = table.allocate().unwrap();
            assert_ne!(h.seq, 0);
            handles.push(h);
        }
        let seqs: HashSet<u8> = handles.iter().map(|h| h.seq).collect();
        assert_eq!(seqs.len(), 4);
    }

    #[test]
    fn fifth_allocation_on_a_full_table_of_four_times_out() {
        let table = WaiterTable::new(4);
        let _handles: Vec<_> = (0..4).map(|_| table.allocate().unwrap()).collect();
        assert_eq!(table.allocate(), Err(RpcError::WaitersExhausted));
    }

    #[test]
    fn freeing_a_slot_allows_reallocation() {
        let table = WaiterTable::new(1);
        let h = table.allocate().unwrap();
        table.free(h.index);
        assert!(table.allocate().is_ok());
    }

    #[test]
    fn complete_wakes_the_waiting_semaphore_with_the_response_body() {
        let table = WaiterTable::new(2);
        let h = table.allocate().unwrap();
        assert!(table.complete(h.seq, b"pong", Outcome::Success));
        assert!(h.sem.take(Some(Duration::from_millis(100))));
        let mut buf = [0u8; MAX_ARGS];
        let (n, outcome) = table.take_result(h.index, &mut buf);
        assert_eq!(&buf[..n], b"pong");
        assert!(matches!(outcome, Outcome::Success));
    }

    #[test]
    fn complete_for_unknown_sequence_is_a_harmless_no_op() {
        let table = WaiterTable::new(2);
        assert!(!table.complete(200, b"late", Outcome::Success));
    }

    #[test]
    fn concurrent_allocation_never_yields_two_live_waiters_with_the_same_sequence() {
        let table = StdArc::new(WaiterTable::new(8));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let table = table.clone();
                thread::spawn(move || table.allocate().unwrap())
            })
            .collect();
        let seqs: Vec<u8> = handles.into_iter().map(|h| h.join().unwrap().seq).collect();
        let unique: HashSet<u8> = seqs.iter().copied().collect();
        assert_eq!(unique.len(), 8);
    }
}
