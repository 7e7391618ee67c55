//! Agent-local delivery of typed frames.
//!
//! A producer packs log lines, configuration blobs, monitoring segments and
//! command strings into small binary frames and hands them to a transport
//! chosen at runtime from a port descriptor such as `localqueue:AgentMailbox`.
//! On the consumer side a reception server drains the local queue on a pool
//! of worker threads and dispatches frames by kind.
//!
//! # Crate Structure
//!
//! - [`frame`]: Frame wire format, blocking stream I/O, optional tokio codec
//! - [`transport`]: Port descriptors and the delivery backends
//! - [`delivery`]: Carrier, reception server, command routing (behind `delivery` feature)

/// Re-export frame types.
pub mod frame {
    pub use agentcarrier_frame::*;
}

/// Re-export transport types.
pub mod transport {
    pub use agentcarrier_transport::*;
}

/// Re-export delivery types (requires `delivery` feature).
#[cfg(feature = "delivery")]
pub mod delivery {
    pub use agentcarrier_delivery::*;
}
