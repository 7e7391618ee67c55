//! Sending and receiving agentcarrier frames.
//!
//! - [`Carrier`] opens a transport from a port descriptor and sends typed frames.
//! - [`ReceptionServer`] drains a local queue on a worker pool and hands each
//!   message to a [`FrameHandler`].
//! - [`DefaultHandler`] dispatches decoded frames to a [`DeliverySink`], and
//!   command frames to the process-wide [`router`].

pub mod carrier;
pub mod error;
pub mod handler;
pub mod inbox;
pub mod router;
pub mod server;

pub use carrier::{inform_by_local_queue, Carrier, MAIN_PEER};
pub use error::{DeliveryError, Result};
pub use handler::{DefaultHandler, DeliverySink, FrameHandler, Segment};
pub use inbox::Inbox;
pub use router::{AgentCommand, CommandProcessor, ScopedProcessor};
pub use server::{
    ReceptionServer, ServerConfig, StatsSnapshot, DEFAULT_POLL_INTERVAL, DEFAULT_WORKERS,
};
