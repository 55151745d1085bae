//! The four long-lived worker kinds (spec.md §2), each spawned as its own
//! pinned OS thread via [`rpc_utils::thread_boot`] — the same
//! boot-then-loop shape the teacher uses for its tiles, minus the
//! spine/metrics machinery this runtime has no use for.

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use rpc_phy::{PhyReceiver, PhyTransmitter};
use rpc_proto::transport::{error_to_tag, tag_to_error, Message, MsgType};
use rpc_proto::{build_frame, LinkParser, Payload, RpcConfig};
use rpc_queue::Queue;
use rpc_utils::ThreadPriority;
use tracing::{debug, error, warn};

use crate::registry::Registry;
use crate::waiter::{Outcome, WaiterTable};

/// A REQ/STREAM payload handed from the transport worker to a handler
/// worker. Carries the raw transport payload; handler workers re-parse it
/// rather than threading a second owned copy of name/args through the
/// queue.
pub struct PendingRequest {
    pub payload: Payload,
}

pub fn spawn_rx(
    mut phy: Box<dyn PhyReceiver>,
    q_link_to_trans: Arc<Queue<Payload>>,
    core: Option<usize>,
) -> JoinHandle<()> {
    std::thread::Builder::new()
        .name("rpc-rx".into())
        .spawn(move || {
            rpc_utils::thread_boot(core, ThreadPriority::High);
            let mut parser = LinkParser::new();
            let mut byte = [0u8; 1];
            loop {
                match phy.receive(&mut byte) {
                    Ok(0) => continue,
                    Ok(n) => {
                        parser.feed(&byte[..n], |payload| {
                            if !q_link_to_trans.send(payload, None) {
                                error!("rx: failed to enqueue decoded frame");
                            }
                        });
                    }
                    Err(e) => {
                        warn!(error = %e, "rx: phy read failed, retrying");
                    }
                }
            }
        })
        .expect("failed to spawn rx worker thread")
}

pub fn spawn_tx(
    mut phy: Box<dyn PhyTransmitter>,
    q_trans_to_link: Arc<Queue<Payload>>,
    core: Option<usize>,
) -> JoinHandle<()> {
    std::thread::Builder::new()
        .name("rpc-tx".into())
        .spawn(move || {
            rpc_utils::thread_boot(core, ThreadPriority::High);
            loop {
                let Some(payload) = q_trans_to_link.recv(None) else { continue };
                match build_frame(payload.as_slice()) {
                    Ok(frame) => {
                        if let Err(e) = phy.send(frame.as_slice()) {
                            error!(error = %e, "tx: phy write failed, dropping frame");
                        }
                    }
                    Err(e) => error!(error = %e, "tx: failed to build frame for outbound payload"),
                }
            }
        })
        .expect("failed to spawn tx worker thread")
}

pub fn spawn_transport(
    q_link_to_trans: Arc<Queue<Payload>>,
    q_trans_to_link: Arc<Queue<Payload>>,
    q_requests: Arc<Queue<PendingRequest>>,
    waiters: Arc<WaiterTable>,
    core: Option<usize>,
) -> JoinHandle<()> {
    std::thread::Builder::new()
        .name("rpc-transport".into())
        .spawn(move || {
            rpc_utils::thread_boot(core, ThreadPriority::Medium);
            loop {
                let Some(payload) = q_link_to_trans.recv(None) else { continue };
                let msg = match Message::parse(payload.as_slice()) {
                    Ok(msg) => msg,
                    Err(e) => {
                        warn!(error = %e, "transport: dropping unparseable payload");
                        continue;
                    }
                };

                let msg_type = msg.msg_type;
                let seq = msg.seq;
                match msg_type {
                    MsgType::Req | MsgType::Stream => {
                        // Zero-timeout per spec.md §5: a full q_requests drops and
                        // logs rather than stalling transport's own receive loop.
                        if !q_requests.send(PendingRequest { payload }, Some(Duration::ZERO)) {
                            warn!(seq, "transport: q_requests full, dropping request");
                        }
                    }
                    MsgType::Resp => {
                        waiters.complete(seq, msg.args, Outcome::Success);
                    }
                    MsgType::Err => {
                        waiters.complete(seq, msg.args, Outcome::Remote(tag_to_error(msg.args)));
                    }
                }
            }
        })
        .expect("failed to spawn transport worker thread")
}

pub fn spawn_handler(
    q_requests: Arc<Queue<PendingRequest>>,
    q_trans_to_link: Arc<Queue<Payload>>,
    registry: Arc<Registry>,
    config: RpcConfig,
    index: usize,
    core: Option<usize>,
) -> JoinHandle<()> {
    std::thread::Builder::new()
        .name(format!("rpc-handler-{index}"))
        .spawn(move || {
            rpc_utils::thread_boot(core, ThreadPriority::OsDefault);
            loop {
                let Some(req) = q_requests.recv(None) else { continue };
                let msg = match Message::parse(req.payload.as_slice()) {
                    Ok(msg) => msg,
                    Err(e) => {
                        warn!(error = %e, "handler: dropping request with unparseable payload");
                        continue;
                    }
                };

                let is_req = msg.msg_type == MsgType::Req;
                let seq = msg.seq;
                let outcome = dispatch(&registry, msg.name, msg.args, config.default_handler_timeout_ms);

                if !is_req {
                    continue;
                }

                let response = match &outcome {
                    Ok((body, len)) => Message::build(MsgType::Resp, seq, msg.name, &body[..*len]),
                    Err(err) => Message::build(MsgType::Err, seq, msg.name, error_to_tag(err)),
                };

                match response {
                    Ok(payload) => {
                        if !q_trans_to_link.send(payload, None) {
                            error!(seq, "handler: failed to enqueue response payload");
                        }
                    }
                    Err(e) => error!(error = %e, "handler: failed to build response payload"),
                }
            }
        })
        .expect("failed to spawn handler worker thread")
}

/// Looks up and invokes `name`'s handler in-line on the calling (handler
/// worker) thread, applying the NOFUNC/OVERFLOW mapping from spec.md §4.5.
///
/// `handler_timeout_ms` is passed straight through as the handler's own
/// budget, matching the reference `rpc_fn_t(args, alen, out, out_cap, &olen,
/// timeout_ms)` signature: the handler is expected to bound its own work
/// against it. Running in-line (no per-call thread, no per-call heap
/// allocation) keeps the request/response path on the hot-path budget
/// spec.md §1 calls out — `args` and the output buffer are only ever
/// borrowed or stack-allocated here.
fn dispatch(
    registry: &Registry,
    name: &[u8],
    args: &[u8],
    handler_timeout_ms: u32,
) -> Result<([u8; rpc_proto::config::MAX_ARGS], usize), rpc_proto::RpcError> {
    use rpc_proto::config::MAX_ARGS;
    use rpc_proto::RpcError;

    let Some(handler) = registry.lookup(name) else {
        debug!(name = %String::from_utf8_lossy(name), "dispatch: no handler registered");
        return Err(RpcError::NoFunc);
    };

    let mut out = [0u8; MAX_ARGS];
    match handler(args, &mut out, handler_timeout_ms) {
        Ok(len) => {
            let len = len as usize;
            if len > MAX_ARGS {
                warn!(len, capacity = MAX_ARGS, "dispatch: handler reported length over its output capacity");
                Err(RpcError::Overflow { capacity: MAX_ARGS, needed: len })
            } else {
                Ok((out, len))
            }
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod dispatch_tests {
    use std::sync::{Arc, Mutex};

    use rpc_proto::RpcError;

    use super::dispatch;
    use crate::registry::Registry;

    #[test]
    fn dispatch_returns_nofunc_for_unregistered_name() {
        let registry = Registry::new(4);
        assert_eq!(dispatch(&registry, b"missing", b"", 100), Err(RpcError::NoFunc));
    }

    #[test]
    fn dispatch_passes_the_configured_timeout_budget_through_to_the_handler() {
        let registry = Registry::new(4);
        let seen = Arc::new(Mutex::new(0u32));
        let seen2 = seen.clone();
        registry
            .register(
                b"budget",
                Arc::new(move |_args: &[u8], _out: &mut [u8], timeout_ms: u32| {
                    *seen2.lock().unwrap() = timeout_ms;
                    Ok(0)
                }),
            )
            .unwrap();
        dispatch(&registry, b"budget", b"", 250).unwrap();
        assert_eq!(*seen.lock().unwrap(), 250);
    }

    #[test]
    fn dispatch_returns_overflow_when_handler_reports_length_past_capacity() {
        let registry = Registry::new(4);
        registry
            .register(b"bad", Arc::new(|_args: &[u8], _out: &mut [u8], _timeout_ms: u32| Ok(u16::MAX)))
            .unwrap();
        assert!(matches!(dispatch(&registry, b"bad", b"", 100), Err(RpcError::Overflow { .. })));
    }

    #[test]
    fn dispatch_returns_handler_output_on_success() {
        let registry = Registry::new(4);
        registry
            .register(
                b"echo4",
                Arc::new(|_args: &[u8], out: &mut [u8], _timeout_ms: u32| {
                    out[..4].copy_from_slice(b"pong");
                    Ok(4)
                }),
            )
            .unwrap();
        let (out, len) = dispatch(&registry, b"echo4", b"", 100).unwrap();
        assert_eq!(&out[..len], b"pong");
    }
}
