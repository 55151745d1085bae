/// Link-layer sentinel bytes. Part of the wire compatibility contract: both
/// peers must agree on these, the CRC8 parameters below, and the constants in
/// [`RpcConfig`].
pub const SOF: u8 = 0xAA;
pub const SOD: u8 = 0x55;
pub const EOF: u8 = 0xCC;

/// CRC8 polynomial and initial value. Same bit-by-bit algorithm the
/// reference implementation uses (see `rpc-proto::crc8`).
pub const CRC8_POLY: u8 = 0x07;
pub const CRC8_INIT: u8 = 0x00;

pub const MIN_NAME_LEN: usize = 1;
pub const MAX_NAME_LEN: usize = 32;
pub const MAX_ARGS: usize = 128;

/// `type(1) + seq(1) + name + 0x00 + args`, minimum with a one-char name and
/// zero args.
pub const MIN_PAYLOAD: usize = 2 + MIN_NAME_LEN + 1;
/// `type(1) + seq(1) + name + 0x00 + args`, maximum with the longest name and
/// a full argument buffer.
pub const MAX_PAYLOAD: usize = 2 + MAX_NAME_LEN + 1 + MAX_ARGS;

/// Frame length field counts `SOD + payload + pkt_crc + EOF`.
pub const MIN_PKT_LEN: u16 = (MIN_PAYLOAD + 3) as u16;
pub const MAX_PKT_LEN: u16 = (MAX_PAYLOAD + 3) as u16;

/// `SOF + len_lo + len_hi + hdr_crc`.
pub const HEADER_SIZE: usize = 4;

/// Largest possible on-wire frame: header + SOD + payload + pkt_crc + EOF.
pub const MAX_FRAME_LEN: usize = HEADER_SIZE + 1 + MAX_PAYLOAD + 1 + 1;

/// Runtime-tunable parameters that do not affect wire compatibility
/// (capacities, timeouts, worker count). Defaults match the values used
/// throughout this crate's tests and the ping-pong demo.
#[derive(Clone, Copy, Debug)]
pub struct RpcConfig {
    pub registry_capacity: usize,
    pub waiter_table_size: usize,
    pub queue_depth: usize,
    pub default_request_timeout_ms: u32,
    pub default_handler_timeout_ms: u32,
    pub handler_worker_count: usize,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            registry_capacity: 16,
            waiter_table_size: 8,
            queue_depth: 16,
            default_request_timeout_ms: 1_000,
            default_handler_timeout_ms: 500,
            handler_worker_count: 1,
        }
    }
}

impl RpcConfig {
    pub fn with_waiter_table_size(mut self, size: usize) -> Self {
        self.waiter_table_size = size;
        self
    }

    pub fn with_registry_capacity(mut self, capacity: usize) -> Self {
        self.registry_capacity = capacity;
        self
    }

    pub fn with_queue_depth(mut self, depth: usize) -> Self {
        self.queue_depth = depth;
        self
    }

    pub fn with_handler_worker_count(mut self, count: usize) -> Self {
        self.handler_worker_count = count.max(1);
        self
    }
}
