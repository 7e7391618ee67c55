use agentcarrier_frame::{encode, FrameConfig, FrameKind};
use agentcarrier_transport::{Backend, PortDescriptor, Transport};
use tracing::{debug, info, warn};

use crate::error::Result;

/// Provider id used for messages the agent sends on its own behalf.
pub const MAIN_PEER: &str = "main";

/// Sender-side facade over one [`Transport`].
///
/// Every operation reports success as a `bool`; failures are logged and
/// never panic. Sends while disconnected return `false` without touching
/// any transport.
#[derive(Debug, Default)]
pub struct Carrier {
    port: Option<PortDescriptor>,
    transport: Option<Transport>,
    config: FrameConfig,
}

impl Carrier {
    pub fn new() -> Self {
        Self::default()
    }

    /// A carrier whose network and file transports use `config`.
    pub fn with_config(config: FrameConfig) -> Self {
        Self {
            port: None,
            transport: None,
            config,
        }
    }

    /// Connect to `port` (`<backend>:<address>`), dropping any current
    /// connection first.
    ///
    /// On failure the carrier stays disconnected. If the descriptor parsed,
    /// [`name`](Self::name) and [`address`](Self::address) still report it.
    pub fn establish_communication(&mut self, port: &str) -> bool {
        self.shutdown_communication();
        self.port = None;

        let port = match PortDescriptor::parse(port) {
            Ok(port) => port,
            Err(err) => {
                warn!(%port, error = %err, "rejected port descriptor");
                return false;
            }
        };

        let opened = Transport::open_for_send_with_config(&port, &self.config);
        let connected = match opened {
            Ok(transport) => {
                info!(%port, transport = transport.name(), "carrier connected");
                self.transport = Some(transport);
                true
            }
            Err(err) => {
                warn!(%port, error = %err, "carrier failed to connect");
                false
            }
        };
        self.port = Some(port);
        connected
    }

    /// Close the current transport, if any. Safe to call repeatedly.
    pub fn shutdown_communication(&mut self) {
        if let Some(transport) = self.transport.take() {
            debug!(port = ?self.port.as_ref().map(ToString::to_string), "carrier disconnected");
            transport.close();
        }
    }

    /// Backend tag of the last descriptor, or `""`.
    pub fn name(&self) -> &str {
        self.port.as_ref().map_or("", PortDescriptor::backend_tag)
    }

    /// Address of the last descriptor, or `""`.
    pub fn address(&self) -> &str {
        self.port.as_ref().map_or("", PortDescriptor::address)
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_some()
    }

    /// The open transport, for inspection.
    pub fn transport(&self) -> Option<&Transport> {
        self.transport.as_ref()
    }

    /// Send a block of monitoring data correlated by `answer_id`.
    pub fn send_segment(&mut self, peer: &str, answer_id: u64, data: &[u8]) -> bool {
        self.send(peer, answer_id, FrameKind::Segment, data)
    }

    pub fn send_log(&mut self, peer: &str, text: &str) -> bool {
        self.send(peer, 0, FrameKind::Log, text.as_bytes())
    }

    pub fn send_yaml(&mut self, peer: &str, text: &str) -> bool {
        self.send(peer, 0, FrameKind::Yaml, text.as_bytes())
    }

    pub fn send_command(&mut self, peer: &str, text: &str) -> bool {
        self.send(peer, 0, FrameKind::Command, text.as_bytes())
    }

    fn send(&mut self, peer: &str, answer_id: u64, kind: FrameKind, payload: &[u8]) -> bool {
        let Some(transport) = self.transport.as_mut() else {
            debug!(peer, %kind, "carrier not connected; frame dropped");
            return false;
        };

        match send_frame(transport, peer, answer_id, kind, payload) {
            Ok(()) => {
                debug!(peer, %kind, answer_id, len = payload.len(), "frame sent");
                true
            }
            Err(err) => {
                warn!(
                    peer,
                    %kind,
                    transport = transport.name(),
                    error = %err,
                    "frame send failed"
                );
                false
            }
        }
    }
}

impl Drop for Carrier {
    fn drop(&mut self) {
        self.shutdown_communication();
    }
}

fn send_frame(
    transport: &mut Transport,
    peer: &str,
    answer_id: u64,
    kind: FrameKind,
    payload: &[u8],
) -> Result<()> {
    let bytes = encode(peer, answer_id, kind, payload)?;
    transport.send(&bytes)?;
    Ok(())
}

/// Send one command to a local queue on behalf of [`MAIN_PEER`].
pub fn inform_by_local_queue(queue: &str, command: &str) -> bool {
    let mut carrier = Carrier::new();
    let port = agentcarrier_transport::build_port_name(Backend::LocalQueue.tag(), queue);
    carrier.establish_communication(&port) && carrier.send_command(MAIN_PEER, command)
}
