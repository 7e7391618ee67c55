//! Frame kinds.
//!
//! The kind tag is a closed set. Any other tag on the wire is a decoding error.

use std::fmt;

use crate::error::FrameError;

/// What a frame carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FrameKind {
    /// A log line.
    Log = 0,
    /// A block of monitoring data; the answer id is a monotonic timestamp.
    Segment = 1,
    /// A configuration blob.
    Yaml = 2,
    /// A command string for the command router.
    Command = 3,
}

impl FrameKind {
    /// All kinds in tag order.
    pub const ALL: [FrameKind; 4] = [
        FrameKind::Log,
        FrameKind::Segment,
        FrameKind::Yaml,
        FrameKind::Command,
    ];

    /// Wire tag for this kind.
    pub const fn tag(self) -> u8 {
        self as u8
    }

    /// Look up a kind by its wire tag.
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(FrameKind::Log),
            1 => Some(FrameKind::Segment),
            2 => Some(FrameKind::Yaml),
            3 => Some(FrameKind::Command),
            _ => None,
        }
    }

    /// Human-readable name.
    pub fn name(self) -> &'static str {
        match self {
            FrameKind::Log => "LOG",
            FrameKind::Segment => "SEGMENT",
            FrameKind::Yaml => "YAML",
            FrameKind::Command => "COMMAND",
        }
    }

    /// Whether the payload is conventionally text.
    pub fn is_text(self) -> bool {
        !matches!(self, FrameKind::Segment)
    }
}

impl TryFrom<u8> for FrameKind {
    type Error = FrameError;

    fn try_from(tag: u8) -> Result<Self, Self::Error> {
        FrameKind::from_tag(tag).ok_or(FrameError::UnknownKind(tag))
    }
}

impl fmt::Display for FrameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
