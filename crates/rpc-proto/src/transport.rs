//! Transport message codec.
//!
//! Wire format, positional, zero-copy on parse:
//! `type(1) | seq(1) | name | 0x00 | args...`
//!
//! `name` is a NUL-terminated ASCII string bounded by
//! [`MAX_NAME_LEN`](crate::config::MAX_NAME_LEN); `args` is whatever bytes
//! remain in the payload, up to [`MAX_ARGS`](crate::config::MAX_ARGS).

use crate::config::{MAX_ARGS, MAX_NAME_LEN, MIN_NAME_LEN};
use crate::error::RpcError;
use crate::payload::Payload;

/// Message type tag, the first byte of every transport payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MsgType {
    Req,
    Stream,
    Resp,
    Err,
}

impl MsgType {
    fn to_byte(self) -> u8 {
        match self {
            MsgType::Req => b'Q',
            MsgType::Stream => b'S',
            MsgType::Resp => b'R',
            MsgType::Err => b'E',
        }
    }

    fn from_byte(b: u8) -> Option<Self> {
        match b {
            b'Q' => Some(MsgType::Req),
            b'S' => Some(MsgType::Stream),
            b'R' => Some(MsgType::Resp),
            b'E' => Some(MsgType::Err),
            _ => None,
        }
    }
}

/// A parsed transport message, borrowing straight out of the [`Payload`] it
/// was built from. No allocation, no copy.
#[derive(Clone, Copy, Debug)]
pub struct Message<'a> {
    pub msg_type: MsgType,
    pub seq: u8,
    pub name: &'a [u8],
    pub args: &'a [u8],
}

impl<'a> Message<'a> {
    /// Parses `payload` positionally. Fails on a missing NUL terminator, a
    /// name outside `[MIN_NAME_LEN, MAX_NAME_LEN]`, an args tail over
    /// `MAX_ARGS`, or an unrecognized type byte.
    pub fn parse(payload: &'a [u8]) -> Result<Self, RpcError> {
        if payload.len() < 2 {
            return Err(RpcError::InvalidArgs("payload shorter than type+seq header"));
        }
        let msg_type = MsgType::from_byte(payload[0]).ok_or(RpcError::InvalidArgs("unrecognized message type"))?;
        let seq = payload[1];
        let rest = &payload[2..];

        let nul_pos = rest.iter().position(|&b| b == 0).ok_or(RpcError::InvalidArgs("missing NUL terminator after name"))?;
        let name = &rest[..nul_pos];
        if name.len() < MIN_NAME_LEN || name.len() > MAX_NAME_LEN {
            return Err(RpcError::InvalidArgs("function name length out of bounds"));
        }

        let args = &rest[nul_pos + 1..];
        if args.len() > MAX_ARGS {
            return Err(RpcError::InvalidArgs("argument buffer too large"));
        }

        Ok(Message { msg_type, seq, name, args })
    }

    /// Serializes into a freshly built [`Payload`], ready for [`crate::frame::build_frame`].
    pub fn build(msg_type: MsgType, seq: u8, name: &[u8], args: &[u8]) -> Result<Payload, RpcError> {
        if name.len() < MIN_NAME_LEN || name.len() > MAX_NAME_LEN {
            return Err(RpcError::InvalidArgs("function name length out of bounds"));
        }
        if args.len() > MAX_ARGS {
            return Err(RpcError::InvalidArgs("argument buffer too large"));
        }

        let mut payload = Payload::empty();
        let ok = payload.push(msg_type.to_byte())
            && payload.push(seq)
            && payload.extend_from_slice(name)
            && payload.push(0)
            && payload.extend_from_slice(args);
        if !ok {
            return Err(RpcError::Overflow { capacity: Payload::CAPACITY, needed: 2 + name.len() + 1 + args.len() });
        }
        Ok(payload)
    }
}

/// Well-known ASCII error tags carried in an `Err` message's `args` body.
/// Part of the wire contract: both peers must agree on these strings.
pub mod error_tag {
    pub const NOFUNC: &[u8] = b"NOFUNC";
    pub const OVERFLOW: &[u8] = b"OVERFLOW";
    pub const INVALID_ARGS: &[u8] = b"INVALID_ARGS";
    pub const TIMEOUT: &[u8] = b"TIMEOUT";
    pub const FAIL: &[u8] = b"FAIL";
}

/// Maps an [`RpcError`] to the ASCII tag sent over the wire in an `Err`
/// message body. `Io`/`Poisoned` are local-only conditions that never reach
/// the wire; mapping them here would be a bug, so they fall back to `FAIL`.
pub fn error_to_tag(err: &RpcError) -> &'static [u8] {
    match err {
        RpcError::NoFunc => error_tag::NOFUNC,
        RpcError::Overflow { .. } => error_tag::OVERFLOW,
        RpcError::InvalidArgs(_) => error_tag::INVALID_ARGS,
        RpcError::Timeout => error_tag::TIMEOUT,
        _ => error_tag::FAIL,
    }
}

/// Maps a wire-received ASCII error tag back to an [`RpcError`]. Unknown
/// tags map to `Remote` with a generic reason so callers still see *an*
/// error rather than a panic or silent success.
pub fn tag_to_error(tag: &[u8]) -> RpcError {
    match tag {
        error_tag::NOFUNC => RpcError::NoFunc,
        error_tag::OVERFLOW => RpcError::Overflow { capacity: 0, needed: 0 },
        error_tag::INVALID_ARGS => RpcError::InvalidArgs("remote rejected arguments"),
        error_tag::TIMEOUT => RpcError::Timeout,
        _ => RpcError::Remote { tag: "FAIL" },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_and_parses_a_request() {
        let payload = Message::build(MsgType::Req, 7, b"ping", b"abc").unwrap();
        let msg = Message::parse(payload.as_slice()).unwrap();
        assert_eq!(msg.msg_type, MsgType::Req);
        assert_eq!(msg.seq, 7);
        assert_eq!(msg.name, b"ping");
        assert_eq!(msg.args, b"abc");
    }

    #[test]
    fn builds_and_parses_with_empty_args() {
        let payload = Message::build(MsgType::Resp, 1, b"p", b"").unwrap();
        let msg = Message::parse(payload.as_slice()).unwrap();
        assert_eq!(msg.name, b"p");
        assert!(msg.args.is_empty());
    }

    #[test]
    fn rejects_name_too_long() {
        let name = vec![b'a'; MAX_NAME_LEN + 1];
        assert!(Message::build(MsgType::Req, 0, &name, b"").is_err());
    }

    #[test]
    fn rejects_args_too_long() {
        let args = vec![0u8; MAX_ARGS + 1];
        assert!(Message::build(MsgType::Req, 0, b"f", &args).is_err());
    }

    #[test]
    fn parse_rejects_missing_nul() {
        let payload = [b'Q', 0, b'n', b'o', b'n', b'u', b'l'];
        assert!(Message::parse(&payload).is_err());
    }

    #[test]
    fn parse_rejects_unknown_type_byte() {
        let payload = [b'Z', 0, b'n', 0];
        assert!(Message::parse(&payload).is_err());
    }

    #[test]
    fn error_tag_round_trips_for_known_kinds() {
        assert_eq!(error_to_tag(&RpcError::NoFunc), error_tag::NOFUNC);
        assert_eq!(tag_to_error(error_tag::NOFUNC), RpcError::NoFunc);
        assert_eq!(tag_to_error(error_tag::TIMEOUT), RpcError::Timeout);
    }

    proptest::proptest! {
        #[test]
        fn positional_round_trip(
            name_len in MIN_NAME_LEN..=MAX_NAME_LEN,
            args_len in 0usize..=MAX_ARGS,
            seq: u8,
        ) {
            let name: Vec<u8> = (0..name_len).map(|i| b'a' + (i % 26) as u8).collect();
            let args: Vec<u8> = (0..args_len).map(|i| i as u8).collect();
            let payload = Message::build(MsgType::Req, seq, &name, &args).unwrap();
            let msg = Message::parse(payload.as_slice()).unwrap();
            prop_assert_eq!(msg.seq, seq);
            prop_assert_eq!(msg.name, name.as_slice());
            prop_assert_eq!(msg.args, args.as_slice());
        }
    }
}
