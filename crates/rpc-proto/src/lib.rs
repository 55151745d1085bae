//! Wire-format types shared by every layer of the runtime: link framing,
//! the transport message codec, CRC8, and the fixed-capacity buffers that
//! keep the hot path allocation-free.

pub mod config;
pub mod crc8;
pub mod error;
pub mod frame;
pub mod payload;
pub mod transport;

pub use config::RpcConfig;
pub use error::RpcError;
pub use frame::{build_frame, Frame, LinkParser};
pub use payload::Payload;
pub use transport::{error_tag, error_to_tag, tag_to_error, Message, MsgType};
