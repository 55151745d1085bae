use thiserror::Error;

/// Error kinds shared across the whole runtime (wire codec, transport,
/// dispatch, public API).
///
/// `Success` from the wire contract is `Ok(_)`, not a variant here — Rust's
/// `Result` already gives us that distinction for free.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RpcError {
    /// Validation failed before anything was sent (bad name length, bad
    /// argument length, non-full-capacity response buffer, etc).
    #[error("invalid arguments: {0}")]
    InvalidArgs(&'static str),

    /// The caller's response buffer was smaller than the reply body.
    #[error("response overflowed caller buffer: capacity {capacity}, needed {needed}")]
    Overflow { capacity: usize, needed: usize },

    /// The caller's timeout elapsed with no response.
    #[error("request timed out")]
    Timeout,

    /// The registry has no handler for the requested name.
    #[error("no such function registered")]
    NoFunc,

    /// The waiter table had no free slot after the allocation retry budget.
    #[error("waiter table exhausted")]
    WaitersExhausted,

    /// The registry is at capacity.
    #[error("registry is full")]
    RegistryFull,

    /// A name was already registered.
    #[error("function already registered")]
    AlreadyRegistered,

    /// A remote peer replied with an ERR frame; `tag` is the ASCII body.
    #[error("remote error: {tag}")]
    Remote { tag: &'static str },

    /// A handler returned a non-success code without a more specific reason.
    #[error("handler failed")]
    HandlerFailed,

    /// Enqueueing to a bounded queue failed (queue full, or after the
    /// configured wait).
    #[error("queue send failed")]
    QueueFull,

    /// The underlying PHY transport failed.
    #[error("transport error: {0}")]
    Io(String),

    /// A shared lock was poisoned by a panicking thread holding it.
    #[error("internal lock poisoned")]
    Poisoned,
}
