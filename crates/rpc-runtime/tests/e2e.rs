//! End-to-end scenarios over an in-process loopback channel: two `Rpc`
//! handles wired back to back, each driving its own RX/TX/transport/handler
//! threads exactly as a real deployment would.

use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

use rpc_phy::{Phy, PhyReceiver, PhyTransmitter};
use rpc_proto::config::MAX_ARGS;
use rpc_proto::RpcError;
use rpc_runtime::{Rpc, RpcConfig};

/// A byte-at-a-time duplex channel backed by two `mpsc` pipes, standing in
/// for a real PHY (named pipe, socket) in process for tests.
struct ChannelPhy {
    tx: Option<mpsc::Sender<u8>>,
    rx: Option<mpsc::Receiver<u8>>,
}

fn channel_pair() -> (ChannelPhy, ChannelPhy) {
    let (tx_ab, rx_ab) = mpsc::channel();
    let (tx_ba, rx_ba) = mpsc::channel();
    (ChannelPhy { tx: Some(tx_ab), rx: Some(rx_ba) }, ChannelPhy { tx: Some(tx_ba), rx: Some(rx_ab) })
}

impl Phy for ChannelPhy {
    fn init(&mut self) -> Result<(), RpcError> {
        Ok(())
    }

    fn split(self: Box<Self>) -> (Box<dyn PhyReceiver>, Box<dyn PhyTransmitter>) {
        let me = *self;
        (Box::new(ChannelReceiver { rx: me.rx.expect("channel phy split before init") }), Box::new(ChannelTransmitter { tx: me.tx.expect("channel phy split before init") }))
    }
}

struct ChannelReceiver {
    rx: mpsc::Receiver<u8>,
}

impl PhyReceiver for ChannelReceiver {
    fn receive(&mut self, buf: &mut [u8]) -> Result<usize, RpcError> {
        match self.rx.recv() {
            Ok(b) => {
                buf[0] = b;
                Ok(1)
            }
            Err(_) => Err(RpcError::Io("channel closed".into())),
        }
    }
}

struct ChannelTransmitter {
    tx: mpsc::Sender<u8>,
}

impl PhyTransmitter for ChannelTransmitter {
    fn send(&mut self, data: &[u8]) -> Result<usize, RpcError> {
        for &b in data {
            self.tx.send(b).map_err(|_| RpcError::Io("channel closed".into()))?;
        }
        Ok(data.len())
    }
}

fn start_pair(config: RpcConfig) -> (Rpc, Rpc) {
    let (phy_a, phy_b) = channel_pair();
    let mut a = Rpc::init(config, Box::new(phy_a)).unwrap();
    let mut b = Rpc::init(config, Box::new(phy_b)).unwrap();
    a.start();
    b.start();
    (a, b)
}

#[test]
fn ping_roundtrip_returns_pong() {
    let (server, client) = start_pair(RpcConfig::default());
    server.register("ping", |_args, out, _timeout_ms| {
        out[..4].copy_from_slice(b"pong");
        Ok(4)
    }).unwrap();

    let mut buf = [0u8; MAX_ARGS];
    let n = client.request("ping", &[], &mut buf, Some(Duration::from_millis(1000))).unwrap();
    assert_eq!(n, 4);
    assert_eq!(&buf[..n], b"pong");
}

#[test]
fn unknown_function_returns_nofunc_and_body() {
    let (_server, client) = start_pair(RpcConfig::default());

    let mut buf = [0u8; MAX_ARGS];
    let err = client.request("nope", &[], &mut buf, Some(Duration::from_millis(500))).unwrap_err();
    assert_eq!(err, RpcError::NoFunc);
    assert_eq!(&buf[..6], b"NOFUNC");
}

#[test]
fn oversize_response_fits_a_full_capacity_buffer() {
    let (server, client) = start_pair(RpcConfig::default());
    server.register("big", |_args, out, _timeout_ms| {
        let body = [b'x'; 64];
        out[..64].copy_from_slice(&body);
        Ok(64)
    }).unwrap();

    let mut buf = [0u8; MAX_ARGS];
    let n = client.request("big", &[], &mut buf, Some(Duration::from_millis(1000))).unwrap();
    assert_eq!(n, 64);
}

#[test]
fn request_rejects_a_response_buffer_under_max_args_capacity() {
    let (_server, client) = start_pair(RpcConfig::default());
    let mut small_buf = [0u8; 10];
    let err = client.request("anything", &[], &mut small_buf, Some(Duration::from_millis(500))).unwrap_err();
    assert_eq!(err, RpcError::InvalidArgs("response buffer must have full MAX_ARGS capacity"));
}

#[test]
fn stream_delivers_every_message_with_no_response_traffic() {
    let (server, client) = start_pair(RpcConfig::default());
    let received = Arc::new(std::sync::atomic::AtomicU32::new(0));
    let received2 = received.clone();
    server.register("log", move |_args, _out, _timeout_ms| {
        received2.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        Ok(0)
    }).unwrap();

    for _ in 0..100 {
        client.stream("log", &[1, 2, 3, 4, 5, 6, 7, 8]).unwrap();
    }

    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    while received.load(std::sync::atomic::Ordering::SeqCst) < 100 && std::time::Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(10));
    }
    assert_eq!(received.load(std::sync::atomic::Ordering::SeqCst), 100);
}

#[test]
fn concurrent_requests_from_many_threads_all_succeed() {
    let config = RpcConfig::default().with_waiter_table_size(8);
    let (server, client) = start_pair(config);
    server.register("ping", |_args, out, _timeout_ms| {
        out[..4].copy_from_slice(b"pong");
        Ok(4)
    }).unwrap();

    let client = Arc::new(client);
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let client = client.clone();
            std::thread::spawn(move || {
                for _ in 0..50 {
                    let mut buf = [0u8; MAX_ARGS];
                    let n = client.request("ping", &[], &mut buf, Some(Duration::from_millis(2000))).unwrap();
                    assert_eq!(&buf[..n], b"pong");
                }
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap();
    }
}
