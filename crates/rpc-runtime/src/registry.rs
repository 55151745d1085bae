//! Fixed-capacity, append-only function registry.
//!
//! The fixed-capacity array scanned linearly for a name match is grounded on
//! the teacher's `TileInfo::register_tile` pattern; the mutex and the
//! reject-on-full/reject-on-duplicate behavior here are this crate's own
//! addition driven by spec.md §4.3, since `TileInfo::register_tile` has
//! neither (see DESIGN.md). Entries are never removed; first match wins.

use std::sync::{Arc, Mutex};

use rpc_proto::config::MAX_NAME_LEN;
use rpc_proto::RpcError;
use tracing::{info, warn};

/// A registered function. Takes the request's argument bytes, a
/// fixed-capacity output buffer, and the handler-level timeout budget in
/// milliseconds (spec.md §4.5's `handler(args, alen, out, out_cap, &olen,
/// HANDLER_TIMEOUT_MS)`), and returns the number of bytes written on
/// success. The handler runs in-line on the dispatching worker thread and is
/// expected to bound its own work against the budget it's handed; nothing in
/// this runtime preempts it.
///
/// Modeled as a capability (any `Fn`, not a bare function pointer) per the
/// registry's REDESIGN FLAGS note: closures capturing state are registrable
/// without any change to the wire protocol.
pub type Handler = Arc<dyn Fn(&[u8], &mut [u8], u32) -> Result<u16, RpcError> + Send + Sync>;

struct Entry {
    name_len: usize,
    name_buf: [u8; MAX_NAME_LEN],
    handler: Handler,
}

impl Entry {
    fn name(&self) -> &[u8] {
        &self.name_buf[..self.name_len]
    }
}

/// Fixed-capacity registry of `{name, handler}` pairs.
///
/// Registration copies the name into the entry (the REDESIGN FLAGS
/// name-lifetime note, adopted) so callers don't need to keep the string
/// alive for the process lifetime.
pub struct Registry {
    entries: Mutex<Vec<Entry>>,
    capacity: usize,
}

impl Registry {
    pub fn new(capacity: usize) -> Self {
        Self { entries: Mutex::new(Vec::with_capacity(capacity)), capacity }
    }

    /// Registers `name` with `handler`. Fails if `name` is outside the
    /// allowed length, if the registry is full, or if `name` is already
    /// registered.
    pub fn register(&self, name: &[u8], handler: Handler) -> Result<(), RpcError> {
        if name.is_empty() || name.len() > MAX_NAME_LEN {
            return Err(RpcError::InvalidArgs("function name length out of bounds"));
        }

        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        if entries.iter().any(|e| e.name() == name) {
            warn!(name = %String::from_utf8_lossy(name), "registry: duplicate registration rejected");
            return Err(RpcError::AlreadyRegistered);
        }
        if entries.len() >= self.capacity {
            warn!(capacity = self.capacity, "registry: at capacity, rejecting registration");
            return Err(RpcError::RegistryFull);
        }

        let mut name_buf = [0u8; MAX_NAME_LEN];
        name_buf[..name.len()].copy_from_slice(name);
        entries.push(Entry { name_len: name.len(), name_buf, handler });
        info!(name = %String::from_utf8_lossy(name), "registry: function registered");
        Ok(())
    }

    /// Looks up `name`, cloning the handler's `Arc` while the lock is held
    /// and returning that clone so the caller can invoke it without holding
    /// the registry lock — exactly the "read the pointer under the mutex,
    /// invoke outside it" contract the reference design describes.
    pub fn lookup(&self, name: &[u8]) -> Option<Handler> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.iter().find(|e| e.name() == name).map(|e| e.handler.clone())
    }
}
