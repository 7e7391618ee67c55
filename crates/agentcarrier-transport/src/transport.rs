use agentcarrier_frame::FrameConfig;
use tracing::debug;

#[cfg(unix)]
use crate::local_queue::{LocalQueueReceiver, LocalQueueSender};
use crate::error::{Result, TransportError};
use crate::network::NetworkSender;
use crate::port::{Backend, PortDescriptor};
#[cfg(unix)]
use crate::security::SecurityLevel;
use crate::sink::{DumpSink, FileSink, NullSink};

/// An open send side, one variant per backend.
#[derive(Debug)]
pub enum Transport {
    #[cfg(unix)]
    LocalQueue(LocalQueueSender),
    Network(NetworkSender),
    FileSink(FileSink),
    NullSink(NullSink),
    DumpSink(DumpSink),
}

impl Transport {
    /// Open the send side selected by `port`.
    pub fn open_for_send(port: &PortDescriptor) -> Result<Self> {
        Self::open_for_send_with_config(port, &FrameConfig::default())
    }

    /// Open the send side selected by `port`.
    ///
    /// `config` applies to stream backends (network and file): it bounds the
    /// payload size and sets the network write timeout.
    pub fn open_for_send_with_config(port: &PortDescriptor, config: &FrameConfig) -> Result<Self> {
        let backend = port.require_backend("send")?;
        let address = port.address();

        let transport = match backend {
            #[cfg(unix)]
            Backend::LocalQueue => Transport::LocalQueue(LocalQueueSender::open(address)?),
            #[cfg(not(unix))]
            Backend::LocalQueue => {
                return Err(TransportError::Unsupported {
                    backend: port.backend_tag().to_string(),
                    operation: "send",
                })
            }
            Backend::Network => {
                Transport::Network(NetworkSender::open_with_config(address, config.clone())?)
            }
            Backend::File => Transport::FileSink(FileSink::open_with_config(address, config.clone())?),
            Backend::Null => Transport::NullSink(NullSink::new()),
            Backend::Dump => Transport::DumpSink(DumpSink::new()),
        };

        debug!(%port, "transport opened for send");
        Ok(transport)
    }

    /// Bind the receive side selected by `port`.
    ///
    /// Only the local queue backend can receive; everything else is
    /// [`TransportError::Unsupported`].
    #[cfg(unix)]
    pub fn open_for_receive(
        port: &PortDescriptor,
        capacity: usize,
        level: SecurityLevel,
    ) -> Result<LocalQueueReceiver> {
        match port.require_backend("receive")? {
            Backend::LocalQueue => LocalQueueReceiver::bind(port.address(), capacity, level),
            Backend::Network | Backend::File | Backend::Null | Backend::Dump => {
                Err(TransportError::Unsupported {
                    backend: port.backend_tag().to_string(),
                    operation: "receive",
                })
            }
        }
    }

    /// Send bytes holding one encoded frame.
    pub fn send(&mut self, frame_bytes: &[u8]) -> Result<()> {
        match self {
            #[cfg(unix)]
            Transport::LocalQueue(sender) => sender.send(frame_bytes),
            Transport::Network(sender) => sender.send(frame_bytes),
            Transport::FileSink(sink) => sink.send(frame_bytes),
            Transport::NullSink(sink) => sink.send(frame_bytes),
            Transport::DumpSink(sink) => sink.send(frame_bytes),
        }
    }

    /// Release the backend.
    pub fn close(self) {
        debug!(transport = self.name(), "transport closed");
    }

    pub fn backend(&self) -> Backend {
        match self {
            #[cfg(unix)]
            Transport::LocalQueue(_) => Backend::LocalQueue,
            Transport::Network(_) => Backend::Network,
            Transport::FileSink(_) => Backend::File,
            Transport::NullSink(_) => Backend::Null,
            Transport::DumpSink(_) => Backend::Dump,
        }
    }

    /// Transport name for diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            #[cfg(unix)]
            Transport::LocalQueue(_) => "local-queue",
            Transport::Network(_) => "network",
            Transport::FileSink(_) => "file-sink",
            Transport::NullSink(_) => "null-sink",
            Transport::DumpSink(_) => "dump-sink",
        }
    }

    /// The dump sink, if this is one.
    pub fn as_dump(&self) -> Option<&DumpSink> {
        match self {
            Transport::DumpSink(sink) => Some(sink),
            _ => None,
        }
    }
}
