//! TCP transport for peers that do not share a filesystem.
//!
//! Blocking, one stream per link, no framing of its own — exactly like
//! [`crate::fifo::FifoPhy`], byte semantics are the link layer's job.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream, ToSocketAddrs};

use rpc_proto::RpcError;
use tracing::info;

use crate::{Phy, PhyReceiver, PhyTransmitter};

enum Mode<A> {
    Connect(A),
    Listen(A),
}

/// A TCP-backed [`Phy`]. Construct with [`TcpPhy::connect`] on the side that
/// dials out, [`TcpPhy::listen`] on the side that accepts.
pub struct TcpPhy<A> {
    mode: Option<Mode<A>>,
    stream: Option<TcpStream>,
}

impl<A: ToSocketAddrs> TcpPhy<A> {
    pub fn connect(addr: A) -> Self {
        Self { mode: Some(Mode::Connect(addr)), stream: None }
    }

    pub fn listen(addr: A) -> Self {
        Self { mode: Some(Mode::Listen(addr)), stream: None }
    }
}

impl<A: ToSocketAddrs + Send + 'static> Phy for TcpPhy<A> {
    fn init(&mut self) -> Result<(), RpcError> {
        let mode = self.mode.take().ok_or_else(|| RpcError::Io("tcp phy already initialized".into()))?;
        let stream = match mode {
            Mode::Connect(addr) => TcpStream::connect(addr).map_err(|e| RpcError::Io(e.to_string()))?,
            Mode::Listen(addr) => {
                let listener = TcpListener::bind(addr).map_err(|e| RpcError::Io(e.to_string()))?;
                let (stream, peer) = listener.accept().map_err(|e| RpcError::Io(e.to_string()))?;
                info!(%peer, "tcp: accepted peer");
                stream
            }
        };
        stream.set_nodelay(true).map_err(|e| RpcError::Io(e.to_string()))?;
        self.stream = Some(stream);
        Ok(())
    }

    fn split(self: Box<Self>) -> (Box<dyn PhyReceiver>, Box<dyn PhyTransmitter>) {
        let stream = self.stream.expect("TcpPhy::split called before init");
        let write_half = stream.try_clone().expect("tcp stream clone for duplex split");
        (Box::new(TcpReceiver { stream }), Box::new(TcpTransmitter { stream: write_half }))
    }
}

struct TcpReceiver {
    stream: TcpStream,
}

impl PhyReceiver for TcpReceiver {
    fn receive(&mut self, buf: &mut [u8]) -> Result<usize, RpcError> {
        self.stream.read(buf).map_err(|e| RpcError::Io(e.to_string()))
    }
}

struct TcpTransmitter {
    stream: TcpStream,
}

impl PhyTransmitter for TcpTransmitter {
    fn send(&mut self, data: &[u8]) -> Result<usize, RpcError> {
        self.stream.write(data).map_err(|e| RpcError::Io(e.to_string()))
    }
}
