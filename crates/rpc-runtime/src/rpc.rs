//! Public API: `init`, `start`, `register`, `request`, `stream` — spec.md
//! §4.6, as methods on an explicit handle object rather than module-level
//! statics (the REDESIGN FLAGS "Global queues" note, adopted: see
//! DESIGN.md).

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use rpc_phy::Phy;
use rpc_proto::config::{MAX_ARGS, MAX_NAME_LEN, MIN_NAME_LEN};
use rpc_proto::transport::{Message, MsgType};
use rpc_proto::{Payload, RpcConfig, RpcError};
use rpc_queue::Queue;
use tracing::info;

use crate::registry::{Handler, Registry};
use crate::waiter::{Outcome, WaiterTable};
use crate::worker::{self, PendingRequest};

/// Brief pause after spawning workers so the RX/TX/transport/handler
/// threads are past their init before the first `request`/`stream` call —
/// matches the reference `rpc_start()`'s `os_delay_ms(1000)`.
const STARTUP_SETTLE: Duration = Duration::from_millis(200);

/// A live RPC runtime: owns the registry, waiter table, the three queues
/// that connect PHY/LINK/TRANSPORT, and the worker threads once started.
pub struct Rpc {
    config: RpcConfig,
    registry: Arc<Registry>,
    waiters: Arc<WaiterTable>,
    q_link_to_trans: Arc<Queue<Payload>>,
    q_trans_to_link: Arc<Queue<Payload>>,
    q_requests: Arc<Queue<PendingRequest>>,
    phy: Option<Box<dyn Phy>>,
    threads: Vec<JoinHandle<()>>,
}

impl Rpc {
    /// Initializes transport state (registry, waiter table, queues) and the
    /// PHY. Returns an error only if PHY init fails, matching spec.md §4.6.
    pub fn init(config: RpcConfig, mut phy: Box<dyn Phy>) -> Result<Self, RpcError> {
        info!("===== RPC Init =====");
        phy.init()?;

        Ok(Self {
            registry: Arc::new(Registry::new(config.registry_capacity)),
            waiters: Arc::new(WaiterTable::new(config.waiter_table_size)),
            q_link_to_trans: Arc::new(Queue::new(config.queue_depth)),
            q_trans_to_link: Arc::new(Queue::new(config.queue_depth)),
            q_requests: Arc::new(Queue::new(config.queue_depth)),
            phy: Some(phy),
            threads: Vec::new(),
            config,
        })
    }

    /// Splits the PHY and launches the RX, TX, transport, and handler
    /// worker threads. Sleeps briefly afterward so callers can rely on the
    /// pipeline being up by the time `start` returns.
    pub fn start(&mut self) {
        let phy = self.phy.take().expect("Rpc::start called more than once");
        let (phy_rx, phy_tx) = phy.split();

        self.threads.push(worker::spawn_rx(phy_rx, self.q_link_to_trans.clone(), None));
        self.threads.push(worker::spawn_tx(phy_tx, self.q_trans_to_link.clone(), None));
        self.threads.push(worker::spawn_transport(
            self.q_link_to_trans.clone(),
            self.q_trans_to_link.clone(),
            self.q_requests.clone(),
            self.waiters.clone(),
            None,
        ));
        for i in 0..self.config.handler_worker_count {
            self.threads.push(worker::spawn_handler(
                self.q_requests.clone(),
                self.q_trans_to_link.clone(),
                self.registry.clone(),
                self.config,
                i,
                None,
            ));
        }

        info!(handlers = self.config.handler_worker_count, "===== RPC Start =====");
        std::thread::sleep(STARTUP_SETTLE);
    }

    /// Registers `name` so remote REQ/STREAM messages naming it are
    /// dispatched to `handler`.
    pub fn register<F>(&self, name: &str, handler: F) -> Result<(), RpcError>
    where
        F: Fn(&[u8], &mut [u8], u32) -> Result<u16, RpcError> + Send + Sync + 'static,
    {
        let boxed: Handler = Arc::new(handler);
        self.registry.register(name.as_bytes(), boxed)
    }

    /// Synchronous call: blocks until a response arrives or `timeout`
    /// (floored at the configured default) elapses.
    ///
    /// `resp_buf` must have capacity `>= MAX_ARGS` — the caller presents a
    /// full-capacity buffer, matching the reference's precondition so that
    /// no legitimate response body can ever overflow it.
    pub fn request(&self, name: &str, args: &[u8], resp_buf: &mut [u8], timeout: Option<Duration>) -> Result<usize, RpcError> {
        validate_name(name)?;
        if args.len() > MAX_ARGS {
            return Err(RpcError::InvalidArgs("argument buffer too large"));
        }
        if resp_buf.len() < MAX_ARGS {
            return Err(RpcError::InvalidArgs("response buffer must have full MAX_ARGS capacity"));
        }

        let waiter = self.waiters.allocate()?;
        let payload = match Message::build(MsgType::Req, waiter.seq, name.as_bytes(), args) {
            Ok(p) => p,
            Err(e) => {
                self.waiters.free(waiter.index);
                return Err(e);
            }
        };

        self.q_trans_to_link.send(payload, None);

        let floor_ms = self.config.default_request_timeout_ms;
        let requested_ms = timeout.map(|t| t.as_millis() as u32).unwrap_or(floor_ms);
        let effective = Duration::from_millis(requested_ms.max(floor_ms) as u64);

        if !waiter.sem.take(Some(effective)) {
            self.waiters.free(waiter.index);
            return Err(RpcError::Timeout);
        }

        let (n, outcome) = self.waiters.take_result(waiter.index, resp_buf);
        self.waiters.free(waiter.index);

        match outcome {
            Outcome::Success => Ok(n),
            Outcome::Remote(err) => Err(err),
        }
    }

    /// Fire-and-forget: builds a STREAM payload with `seq = 0` and enqueues
    /// it, returning without waiting for any remote acknowledgment.
    pub fn stream(&self, name: &str, args: &[u8]) -> Result<(), RpcError> {
        validate_name(name)?;
        if args.len() > MAX_ARGS {
            return Err(RpcError::InvalidArgs("argument buffer too large"));
        }
        let payload = Message::build(MsgType::Stream, 0, name.as_bytes(), args)?;
        self.q_trans_to_link.send(payload, None);
        Ok(())
    }
}

fn validate_name(name: &str) -> Result<(), RpcError> {
    if name.len() < MIN_NAME_LEN || name.len() > MAX_NAME_LEN {
        return Err(RpcError::InvalidArgs("function name length out of bounds"));
    }
    Ok(())
}
