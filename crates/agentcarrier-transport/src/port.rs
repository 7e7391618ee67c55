//! Port descriptors: `<backend>:<address>`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TransportError};

/// Known backend kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backend {
    LocalQueue,
    Network,
    File,
    Null,
    Dump,
}

impl Backend {
    pub const ALL: [Backend; 5] = [
        Backend::LocalQueue,
        Backend::Network,
        Backend::File,
        Backend::Null,
        Backend::Dump,
    ];

    /// Descriptor tag for this backend.
    pub fn tag(self) -> &'static str {
        match self {
            Backend::LocalQueue => "localqueue",
            Backend::Network => "net",
            Backend::File => "file",
            Backend::Null => "null",
            Backend::Dump => "dump",
        }
    }

    /// Look up a backend by descriptor tag.
    pub fn from_tag(tag: &str) -> Option<Self> {
        Backend::ALL.into_iter().find(|backend| backend.tag() == tag)
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// A parsed `<backend>:<address>` descriptor.
///
/// Parsing only checks the shape. An unknown backend tag is accepted here and
/// rejected as [`TransportError::Unsupported`] when a transport is opened, so
/// the tag and address stay inspectable either way.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PortDescriptor {
    backend: String,
    address: String,
}

impl PortDescriptor {
    /// Build a descriptor from its parts.
    pub fn new(backend: impl Into<String>, address: impl Into<String>) -> Result<Self> {
        let backend = backend.into();
        let address = address.into();
        let port = || build_port_name(&backend, &address);

        if backend.is_empty() {
            return Err(TransportError::InvalidPort {
                port: port(),
                reason: "empty backend tag",
            });
        }
        if backend.contains(':') {
            return Err(TransportError::InvalidPort {
                port: port(),
                reason: "backend tag contains ':'",
            });
        }
        if address.is_empty() {
            return Err(TransportError::InvalidPort {
                port: port(),
                reason: "empty address",
            });
        }

        Ok(Self { backend, address })
    }

    /// Parse `<backend>:<address>`, splitting at the first `:`.
    pub fn parse(port: &str) -> Result<Self> {
        let (backend, address) =
            port.split_once(':')
                .ok_or_else(|| TransportError::InvalidPort {
                    port: port.to_string(),
                    reason: "missing ':' between backend and address",
                })?;
        Self::new(backend, address)
    }

    /// The backend tag as written.
    pub fn backend_tag(&self) -> &str {
        &self.backend
    }

    /// The address part.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// The backend kind, or `None` for an unknown tag.
    pub fn backend(&self) -> Option<Backend> {
        Backend::from_tag(&self.backend)
    }

    pub(crate) fn require_backend(&self, operation: &'static str) -> Result<Backend> {
        self.backend().ok_or_else(|| TransportError::Unsupported {
            backend: self.backend.clone(),
            operation,
        })
    }
}

impl fmt::Display for PortDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.backend, self.address)
    }
}

impl FromStr for PortDescriptor {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for PortDescriptor {
    type Error = TransportError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<PortDescriptor> for String {
    fn from(port: PortDescriptor) -> Self {
        port.to_string()
    }
}

/// Compose a port descriptor string.
pub fn build_port_name(backend: &str, address: &str) -> String {
    format!("{backend}:{address}")
}
