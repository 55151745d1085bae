//! Link framing: a byte-level parser state machine and a matching frame
//! builder.
//!
//! Wire format (little-endian length):
//! `SOF | len_lo | len_hi | hdr_crc | SOD | payload... | pkt_crc | EOF`
//!
//! `hdr_crc` covers the three header bytes before it; `pkt_crc` covers
//! `[SOD, payload...]`. The length field counts everything from `SOD`
//! through `EOF` inclusive, so `payload_len = length - 3`.

use std::ops::Deref;

use tracing::{debug, trace, warn};

use crate::config::{CRC8_INIT, CRC8_POLY, EOF, HEADER_SIZE, MAX_FRAME_LEN, MAX_PAYLOAD, MAX_PKT_LEN, MIN_PKT_LEN, SOD, SOF};
use crate::crc8::crc8;
use crate::error::RpcError;
use crate::payload::Payload;

/// A fully assembled on-wire frame, ready to hand to a PHY's `send`.
#[derive(Clone, Copy)]
pub struct Frame {
    len: usize,
    buf: [u8; MAX_FRAME_LEN],
}

impl Frame {
    pub fn as_slice(&self) -> &[u8] {
        &self.buf[..self.len]
    }
}

impl Deref for Frame {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.as_slice()
    }
}

/// Builds a complete frame around `payload`.
///
/// Rejects payloads outside `[MIN_PAYLOAD, MAX_PAYLOAD]` instead of
/// truncating or padding — the caller (transport codec) is expected to have
/// already produced a well-formed payload.
pub fn build_frame(payload: &[u8]) -> Result<Frame, RpcError> {
    use crate::config::MIN_PAYLOAD;
    if payload.len() < MIN_PAYLOAD || payload.len() > MAX_PAYLOAD {
        return Err(RpcError::InvalidArgs("payload length out of bounds"));
    }

    let mut buf = [0u8; MAX_FRAME_LEN];
    let mut pos = 0;

    buf[pos] = SOF;
    pos += 1;

    let length = (payload.len() + 3) as u16;
    buf[pos] = (length & 0xFF) as u8;
    pos += 1;
    buf[pos] = (length >> 8) as u8;
    pos += 1;

    let hdr_crc = crc8(&buf[..HEADER_SIZE - 1], CRC8_INIT, CRC8_POLY);
    buf[pos] = hdr_crc;
    pos += 1;

    buf[pos] = SOD;
    pos += 1;

    buf[pos..pos + payload.len()].copy_from_slice(payload);
    pos += payload.len();

    // pkt_crc covers [SOD, payload...], which is the HEADER_SIZE..pos range.
    let pkt_crc = crc8(&buf[HEADER_SIZE..pos], CRC8_INIT, CRC8_POLY);
    buf[pos] = pkt_crc;
    pos += 1;

    buf[pos] = EOF;
    pos += 1;

    Ok(Frame { len: pos, buf })
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    WaitSof,
    ReadLen1,
    ReadLen2,
    ReadHdrCrc,
    WaitSod,
    ReadPayload,
    ReadPktCrc,
    WaitEof,
}

/// Single-threaded byte-at-a-time frame parser.
///
/// Only the RX worker touches a given `LinkParser`; it is not `Sync` by
/// convention even though nothing here prevents sharing it (there's no
/// value in making that misuse impossible when the runtime never does it).
pub struct LinkParser {
    state: State,
    hdr: [u8; 3],
    length: u16,
    payload: Payload,
}

impl Default for LinkParser {
    fn default() -> Self {
        Self::new()
    }
}

impl LinkParser {
    pub fn new() -> Self {
        Self { state: State::WaitSof, hdr: [0; 3], length: 0, payload: Payload::empty() }
    }

    /// Resets to `WaitSof` and zeroes all scratch state, exactly as entering
    /// `WaitSof` does on a validation failure.
    fn reset(&mut self) {
        self.state = State::WaitSof;
        self.hdr = [0; 3];
        self.length = 0;
        self.payload = Payload::empty();
    }

    /// Feeds an arbitrary run of bytes through the state machine. `on_frame`
    /// is called once per successfully assembled frame, in order. Corruption
    /// at any point resyncs to `WaitSof` without emitting a frame and without
    /// losing any bytes that belong to a later, valid frame.
    pub fn feed(&mut self, data: &[u8], mut on_frame: impl FnMut(Payload)) {
        for &b in data {
            trace!(byte = format_args!("{b:#04x}"), state = ?self.state, "link: byte");
            match self.state {
                State::WaitSof => {
                    if b == SOF {
                        self.hdr[0] = b;
                        self.state = State::ReadLen1;
                    } else {
                        trace!(byte = format_args!("{b:#04x}"), "link: discarding pre-SOF byte");
                    }
                }
                State::ReadLen1 => {
                    self.hdr[1] = b;
                    self.state = State::ReadLen2;
                }
                State::ReadLen2 => {
                    self.hdr[2] = b;
                    self.length = (self.hdr[2] as u16) << 8 | self.hdr[1] as u16;
                    if self.length < MIN_PKT_LEN || self.length > MAX_PKT_LEN {
                        warn!(length = self.length, "link: packet length out of bounds, resyncing");
                        self.reset();
                        continue;
                    }
                    self.state = State::ReadHdrCrc;
                }
                State::ReadHdrCrc => {
                    let expected = crc8(&self.hdr, CRC8_INIT, CRC8_POLY);
                    if expected != b {
                        warn!(expected, got = b, "link: header CRC mismatch, resyncing");
                        self.reset();
                        continue;
                    }
                    self.state = State::WaitSod;
                }
                State::WaitSod => {
                    if b == SOD {
                        self.payload = Payload::empty();
                        self.state = State::ReadPayload;
                    } else {
                        warn!(got = format_args!("{b:#04x}"), "link: expected SOD, resyncing");
                        self.reset();
                        continue;
                    }
                }
                State::ReadPayload => {
                    let payload_len = (self.length - 3) as usize;
                    if self.payload.len() < payload_len && self.payload.push(b) {
                        if self.payload.len() == payload_len {
                            self.state = State::ReadPktCrc;
                        }
                    } else {
                        warn!("link: payload overflow, resyncing");
                        self.reset();
                        continue;
                    }
                }
                State::ReadPktCrc => {
                    // pkt_crc covers [SOD, payload...].
                    let mut tmp = [0u8; 1 + MAX_PAYLOAD];
                    tmp[0] = SOD;
                    tmp[1..1 + self.payload.len()].copy_from_slice(self.payload.as_slice());
                    let expected = crc8(&tmp[..1 + self.payload.len()], CRC8_INIT, CRC8_POLY);
                    if expected != b {
                        warn!(expected, got = b, "link: packet CRC mismatch, resyncing");
                        self.reset();
                        continue;
                    }
                    self.state = State::WaitEof;
                }
                State::WaitEof => {
                    if b == EOF {
                        debug!(len = self.payload.len(), "link: frame received");
                        on_frame(self.payload);
                    } else {
                        warn!(got = format_args!("{b:#04x}"), "link: expected EOF, dropping frame");
                    }
                    self.reset();
                }
            }
        }
    }
}
