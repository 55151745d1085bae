//! Named-pipe (FIFO) transport, grounded directly on the reference Linux
//! PHY: two unidirectional FIFOs, one per direction, opened read-write to
//! avoid blocking on `open()` until a peer shows up.

use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::path::PathBuf;

use rpc_proto::RpcError;
use tracing::{error, info};

use crate::{Phy, PhyReceiver, PhyTransmitter};

const O_NOCTTY: i32 = libc::O_NOCTTY;

/// A pair of FIFOs: `send_path` is written to, `recv_path` is read from.
/// The two peers of a link construct this with the paths swapped relative
/// to each other.
pub struct FifoPhy {
    send_path: PathBuf,
    recv_path: PathBuf,
    send_fd: Option<File>,
    recv_fd: Option<File>,
}

impl FifoPhy {
    pub fn new(send_path: impl Into<PathBuf>, recv_path: impl Into<PathBuf>) -> Self {
        Self { send_path: send_path.into(), recv_path: recv_path.into(), send_fd: None, recv_fd: None }
    }

    fn create_fifo(path: &std::path::Path) -> Result<(), RpcError> {
        let c_path = std::ffi::CString::new(path.as_os_str().to_string_lossy().as_bytes())
            .map_err(|e| RpcError::Io(e.to_string()))?;
        // SAFETY: c_path is a valid NUL-terminated string for the duration of the call.
        let res = unsafe { libc::mkfifo(c_path.as_ptr(), 0o666) };
        if res != 0 {
            let err = std::io::Error::last_os_error();
            if err.raw_os_error() != Some(libc::EEXIST) {
                return Err(RpcError::Io(format!("mkfifo {}: {err}", path.display())));
            }
        }
        Ok(())
    }
}

impl Phy for FifoPhy {
    fn init(&mut self) -> Result<(), RpcError> {
        Self::create_fifo(&self.send_path)?;
        Self::create_fifo(&self.recv_path)?;

        let send_fd = OpenOptions::new().read(true).write(true).custom_flags(O_NOCTTY).open(&self.send_path).map_err(|e| {
            error!(path = %self.send_path.display(), error = %e, "fifo: failed to open send path");
            RpcError::Io(e.to_string())
        })?;
        let recv_fd = OpenOptions::new().read(true).write(true).custom_flags(O_NOCTTY).open(&self.recv_path).map_err(|e| {
            error!(path = %self.recv_path.display(), error = %e, "fifo: failed to open recv path");
            RpcError::Io(e.to_string())
        })?;

        self.send_fd = Some(send_fd);
        self.recv_fd = Some(recv_fd);
        info!(send = %self.send_path.display(), recv = %self.recv_path.display(), "fifo: phy initialized");
        Ok(())
    }

    fn split(self: Box<Self>) -> (Box<dyn PhyReceiver>, Box<dyn PhyTransmitter>) {
        let me = *self;
        let recv_fd = me.recv_fd.expect("FifoPhy::split called before init");
        let send_fd = me.send_fd.expect("FifoPhy::split called before init");
        (Box::new(FifoReceiver { fd: recv_fd }), Box::new(FifoTransmitter { fd: send_fd }))
    }
}

struct FifoReceiver {
    fd: File,
}

impl PhyReceiver for FifoReceiver {
    fn receive(&mut self, buf: &mut [u8]) -> Result<usize, RpcError> {
        self.fd.read(buf).map_err(|e| RpcError::Io(e.to_string()))
    }
}

struct FifoTransmitter {
    fd: File,
}

impl PhyTransmitter for FifoTransmitter {
    fn send(&mut self, data: &[u8]) -> Result<usize, RpcError> {
        self.fd.write(data).map_err(|e| RpcError::Io(e.to_string()))
    }
}
