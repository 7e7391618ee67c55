use std::net::TcpStream;

use agentcarrier_frame::{FrameConfig, FrameWriter};
use tracing::{debug, warn};

use crate::error::{frame_to_io, Result, TransportError};

/// TCP sender for the `net` backend.
///
/// Opening only validates the `host:port` address. The connection is made on
/// the first send, and dropped again after a failed write so the next send
/// reconnects.
pub struct NetworkSender {
    address: String,
    writer: Option<FrameWriter<TcpStream>>,
    config: FrameConfig,
}

impl NetworkSender {
    /// Validate `host:port` and prepare a sender with default configuration.
    pub fn open(address: &str) -> Result<Self> {
        Self::open_with_config(address, FrameConfig::default())
    }

    /// Validate `host:port` and prepare a sender with explicit configuration.
    pub fn open_with_config(address: &str, config: FrameConfig) -> Result<Self> {
        validate_address(address)?;
        Ok(Self {
            address: address.to_string(),
            writer: None,
            config,
        })
    }

    /// Send bytes holding one encoded frame, connecting first if needed.
    pub fn send(&mut self, frame_bytes: &[u8]) -> Result<()> {
        let mut writer = match self.writer.take() {
            Some(writer) => writer,
            None => self.connect()?,
        };

        if let Err(err) = writer.send_encoded(frame_bytes) {
            warn!(address = %self.address, error = %err, "network send failed; dropping connection");
            return Err(TransportError::Send {
                target: self.address.clone(),
                source: frame_to_io(err),
            });
        }
        self.writer = Some(writer);
        Ok(())
    }

    fn connect(&self) -> Result<FrameWriter<TcpStream>> {
        let connect_err = |source| TransportError::Connect {
            target: self.address.clone(),
            source,
        };

        let stream = TcpStream::connect(&self.address).map_err(connect_err)?;
        let writer = FrameWriter::with_config_tcp(stream, self.config.clone())
            .map_err(|err| connect_err(frame_to_io(err)))?;
        debug!(address = %self.address, "network peer connected");
        Ok(writer)
    }

    /// Target address.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Whether a connection is currently open.
    pub fn is_connected(&self) -> bool {
        self.writer.is_some()
    }
}

impl std::fmt::Debug for NetworkSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkSender")
            .field("address", &self.address)
            .field("connected", &self.is_connected())
            .finish()
    }
}

fn validate_address(address: &str) -> Result<()> {
    let invalid = |reason: &str| TransportError::InvalidAddress {
        backend: "net",
        address: address.to_string(),
        reason: reason.to_string(),
    };

    let (host, port) = address
        .rsplit_once(':')
        .ok_or_else(|| invalid("expected host:port"))?;
    if host.is_empty() {
        return Err(invalid("empty host"));
    }
    match port.parse::<u16>() {
        Ok(0) => Err(invalid("port must be non-zero")),
        Ok(_) => Ok(()),
        Err(err) => Err(invalid(&format!("invalid port '{port}': {err}"))),
    }
}
