//! Ping-pong demo application.
//!
//! # Usage
//!
//! ```bash
//! # Terminal 1
//! rpc-ping-pong server
//!
//! # Terminal 2
//! rpc-ping-pong client
//! ```
//!
//! The server must be started first. By default both sides talk over a pair
//! of named pipes under `/tmp`; pass `--transport tcp` to use a socket
//! instead when the two sides don't share a filesystem.

use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use rpc_phy::Phy;
use rpc_runtime::{Rpc, RpcConfig, RpcError};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const PATH_FIFO_FIRST: &str = "/tmp/fifo_first";
const PATH_FIFO_SECOND: &str = "/tmp/fifo_second";
const CLIENT_SEND_DELAY: Duration = Duration::from_millis(1000);

#[derive(Parser, Debug)]
#[command(name = "rpc-ping-pong")]
#[command(about = "RPC ping-pong demo over a named pipe or TCP link")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    mode: Mode,

    /// Byte channel to carry the link over
    #[arg(long, value_enum, global = true, default_value = "fifo")]
    transport: Transport,

    /// TCP address to bind (server) or connect to (client)
    #[arg(long, global = true, default_value = "127.0.0.1:7878")]
    tcp_addr: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Mode {
    /// Run as the RPC server, registering `ping`
    Server,
    /// Run as the RPC client, calling `ping` in a loop
    Client,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Transport {
    Fifo,
    Tcp,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    match args.mode {
        Mode::Server => run_server(&args),
        Mode::Client => run_client(&args),
    }
}

fn build_phy(args: &Args, is_server: bool) -> Box<dyn Phy> {
    match args.transport {
        Transport::Fifo => {
            // The server reads what the client wrote to `first` and writes
            // its own replies on `second`; the client does the reverse, so
            // the two sides never open the same path in the same direction.
            if is_server {
                Box::new(rpc_phy::fifo::FifoPhy::new(PATH_FIFO_SECOND, PATH_FIFO_FIRST))
            } else {
                Box::new(rpc_phy::fifo::FifoPhy::new(PATH_FIFO_FIRST, PATH_FIFO_SECOND))
            }
        }
        Transport::Tcp => {
            if is_server {
                Box::new(rpc_phy::tcp::TcpPhy::listen(args.tcp_addr.clone()))
            } else {
                Box::new(rpc_phy::tcp::TcpPhy::connect(args.tcp_addr.clone()))
            }
        }
    }
}

fn run_server(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!("===== RPC Server Activated =====");

    let phy = build_phy(args, true);
    let mut rpc = Rpc::init(RpcConfig::default(), phy)?;
    rpc.register("ping", |_args, out, _timeout_ms| {
        out[..4].copy_from_slice(b"pong");
        Ok(4)
    })?;
    rpc.start();

    tracing::info!("server ready, waiting for requests (ctrl-c to stop)");
    loop {
        std::thread::sleep(Duration::from_secs(3600));
    }
}

fn run_client(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!("===== RPC Client Activated =====");

    let phy = build_phy(args, false);
    let mut rpc = Rpc::init(RpcConfig::default(), phy)?;
    rpc.start();

    loop {
        // `request` requires a full-capacity buffer so no legitimate
        // response body can ever overflow it.
        let mut buf = [0u8; rpc_proto::config::MAX_ARGS];
        match rpc.request("ping", &[], &mut buf, Some(Duration::from_millis(500))) {
            Ok(n) => tracing::info!(response = %String::from_utf8_lossy(&buf[..n]), "Response"),
            Err(e) => log_request_error(&e),
        }
        std::thread::sleep(CLIENT_SEND_DELAY);
    }
}

fn log_request_error(err: &RpcError) {
    tracing::warn!(error = %err, "request failed");
}
