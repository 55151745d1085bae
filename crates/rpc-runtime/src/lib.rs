//! Worker threads, registry, waiter table, and the public `Rpc` handle that
//! ties PHY, LINK, and TRANSPORT into something callable.

mod registry;
mod rpc;
mod waiter;
mod worker;

pub use registry::Handler;
pub use rpc::Rpc;
pub use waiter::{Outcome, WaiterHandle, WaiterTable};
pub use worker::PendingRequest;

pub use rpc_proto::RpcConfig;
pub use rpc_proto::RpcError;
