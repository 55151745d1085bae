//! Blocking byte-channel transports the runtime's RX/TX workers drive.
//!
//! The RX and TX workers run on independent threads and must be able to
//! block on their own half of the channel without contending for a lock
//! around the other half, so [`Phy`] splits into a receiver and a
//! transmitter rather than exposing `send`/`receive` on one shared object.

use rpc_proto::RpcError;

#[cfg(feature = "fifo")]
pub mod fifo;
#[cfg(feature = "tcp")]
pub mod tcp;

/// The RX worker's half of a channel. `receive` may do short reads — one
/// byte at a time is explicitly legal, since the RX worker feeds the link
/// parser byte by byte regardless of how much a single call returns.
pub trait PhyReceiver: Send {
    fn receive(&mut self, buf: &mut [u8]) -> Result<usize, RpcError>;
}

/// The TX worker's half of a channel.
pub trait PhyTransmitter: Send {
    fn send(&mut self, data: &[u8]) -> Result<usize, RpcError>;
}

/// A not-yet-split duplex byte channel.
pub trait Phy: Send {
    fn init(&mut self) -> Result<(), RpcError>;

    /// Splits an initialized channel into independent halves. Must only be
    /// called after a successful `init`.
    fn split(self: Box<Self>) -> (Box<dyn PhyReceiver>, Box<dyn PhyTransmitter>);
}
