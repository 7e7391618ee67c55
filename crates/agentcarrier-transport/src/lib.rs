//! Delivery backends for agentcarrier frames.
//!
//! A textual port descriptor (`<backend>:<address>`) selects one backend:
//! - `localqueue`: named, connectionless datagram queue (Unix datagram socket)
//! - `net`: TCP peer at `host:port`, connected lazily on first send
//! - `file`: append frames to a file
//! - `null`: discard frames
//! - `dump`: keep the most recent frame for inspection
//!
//! Backends are variants of the closed [`Transport`] enum. Only the local
//! queue has a receive side, see [`LocalQueueReceiver`].

pub mod error;
#[cfg(unix)]
pub mod local_queue;
pub mod network;
pub mod port;
pub mod security;
pub mod sink;
pub mod transport;

pub use error::{Result, TransportError};
#[cfg(unix)]
pub use local_queue::{
    queue_dir, resolve_queue_path, LocalQueueReceiver, LocalQueueSender, DEFAULT_QUEUE_CAPACITY,
    DEFAULT_SEND_TIMEOUT, QUEUE_DIR_ENV,
};
pub use network::NetworkSender;
pub use port::{build_port_name, Backend, PortDescriptor};
pub use security::SecurityLevel;
pub use sink::{DumpSink, FileSink, NullSink};
pub use transport::Transport;
