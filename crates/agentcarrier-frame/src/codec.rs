use std::time::Duration;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::clock::answer_id_to_duration;
use crate::error::{FrameError, Result};
use crate::kind::FrameKind;

/// Frame header: magic (2) + version (1) + kind (1) + provider id (32)
/// + answer id (8) + length (4) = 48 bytes.
pub const HEADER_SIZE: usize = 48;

/// Magic bytes: "AC" (0x41 0x43).
pub const MAGIC: [u8; 2] = [0x41, 0x43];

/// Current wire format version.
pub const VERSION: u8 = 1;

/// Fixed capacity of the provider id field, in bytes.
pub const PROVIDER_ID_CAPACITY: usize = 32;

/// Default maximum payload size: 16 MiB.
pub const DEFAULT_MAX_PAYLOAD: usize = 16 * 1024 * 1024;

const VERSION_OFFSET: usize = 2;
const KIND_OFFSET: usize = 3;
const PROVIDER_OFFSET: usize = 4;
const ANSWER_OFFSET: usize = PROVIDER_OFFSET + PROVIDER_ID_CAPACITY;
const LENGTH_OFFSET: usize = ANSWER_OFFSET + 8;

/// An owned frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Sender tag.
    pub provider_id: String,
    /// Timestamp for segments, echo/sequence value otherwise.
    pub answer_id: u64,
    /// What the payload carries.
    pub kind: FrameKind,
    /// The message payload.
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame.
    pub fn new(
        provider_id: impl Into<String>,
        answer_id: u64,
        kind: FrameKind,
        payload: impl Into<Bytes>,
    ) -> Self {
        Self {
            provider_id: provider_id.into(),
            answer_id,
            kind,
            payload: payload.into(),
        }
    }

    /// The total wire size of this frame (header + payload).
    pub fn wire_size(&self) -> usize {
        encoded_len(self.payload.len())
    }

    /// Borrow this frame as a view.
    pub fn view(&self) -> FrameView<'_> {
        FrameView {
            provider_id: &self.provider_id,
            answer_id: self.answer_id,
            kind: Some(self.kind),
            payload: self.payload.as_ref(),
        }
    }

    /// Serialize this frame.
    pub fn encode(&self) -> Result<Bytes> {
        encode(&self.provider_id, self.answer_id, self.kind, &self.payload)
    }
}

/// A read-only view of a decoded frame.
///
/// The view borrows the receive buffer and cannot outlive it. Handlers that
/// need to keep frame data call [`FrameView::to_frame`] or
/// [`FrameView::as_bytes`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameView<'a> {
    provider_id: &'a str,
    answer_id: u64,
    kind: Option<FrameKind>,
    payload: &'a [u8],
}

impl<'a> FrameView<'a> {
    /// The view produced by decoding an empty buffer.
    pub const fn empty() -> Self {
        Self {
            provider_id: "",
            answer_id: 0,
            kind: None,
            payload: &[],
        }
    }

    /// Sender tag; empty for the empty view.
    pub fn provider_id(&self) -> &'a str {
        self.provider_id
    }

    pub fn answer_id(&self) -> u64 {
        self.answer_id
    }

    /// Frame kind; `None` only for the empty view.
    pub fn kind(&self) -> Option<FrameKind> {
        self.kind
    }

    pub fn payload(&self) -> &'a [u8] {
        self.payload
    }

    /// Payload length in bytes.
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// True when the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Interpret the payload as UTF-8 text.
    pub fn as_text(&self) -> Result<&'a str> {
        Ok(std::str::from_utf8(self.payload)?)
    }

    /// Copy the payload out of the receive buffer.
    pub fn as_bytes(&self) -> Vec<u8> {
        self.payload.to_vec()
    }

    /// The answer id read as a monotonic timestamp (segment frames).
    pub fn timestamp(&self) -> Duration {
        answer_id_to_duration(self.answer_id)
    }

    /// Copy into an owned frame; `None` for the empty view.
    pub fn to_frame(&self) -> Option<Frame> {
        self.kind.map(|kind| Frame {
            provider_id: self.provider_id.to_string(),
            answer_id: self.answer_id,
            kind,
            payload: Bytes::copy_from_slice(self.payload),
        })
    }
}

impl Default for FrameView<'_> {
    fn default() -> Self {
        Self::empty()
    }
}

/// Text of an optional frame view; `""` when there is no frame.
pub fn as_text(frame: Option<&FrameView<'_>>) -> Result<String> {
    match frame {
        Some(view) => view.as_text().map(str::to_string),
        None => Ok(String::new()),
    }
}

/// Payload copy of an optional frame view; empty when there is no frame.
pub fn as_bytes(frame: Option<&FrameView<'_>>) -> Vec<u8> {
    frame.map(FrameView::as_bytes).unwrap_or_default()
}

/// Serialized size of a frame with a payload of `payload_len` bytes.
pub fn encoded_len(payload_len: usize) -> usize {
    HEADER_SIZE + payload_len
}

/// Check that a provider id fits the fixed header field.
///
/// Ids longer than [`PROVIDER_ID_CAPACITY`] bytes are rejected, never truncated.
/// NUL is the padding byte and is not allowed inside an id.
pub fn validate_provider_id(provider_id: &str) -> Result<()> {
    if provider_id.len() > PROVIDER_ID_CAPACITY {
        return Err(FrameError::InvalidProviderId(format!(
            "{} bytes exceeds the {PROVIDER_ID_CAPACITY}-byte field",
            provider_id.len()
        )));
    }
    if provider_id.as_bytes().contains(&0) {
        return Err(FrameError::InvalidProviderId(
            "provider id contains NUL".to_string(),
        ));
    }
    Ok(())
}

/// Encode a frame into the wire format, appending to `dst`.
///
/// Wire format:
/// ```text
/// ┌────────┬─────────┬──────┬──────────────┬────────────┬───────────┬─────────┐
/// │ Magic  │ Version │ Kind │ Provider id  │ Answer id  │ Length    │ Payload │
/// │ "AC"   │ (1B)    │ (1B) │ (32B, NUL    │ (8B LE)    │ (4B LE)   │         │
/// │ (2B)   │         │      │  padded)     │            │           │         │
/// └────────┴─────────┴──────┴──────────────┴────────────┴───────────┴─────────┘
/// ```
pub fn encode_frame(
    provider_id: &str,
    answer_id: u64,
    kind: FrameKind,
    payload: &[u8],
    dst: &mut BytesMut,
) -> Result<()> {
    validate_provider_id(provider_id)?;
    if payload.len() > u32::MAX as usize {
        return Err(FrameError::PayloadTooLarge {
            size: payload.len(),
            max: u32::MAX as usize,
        });
    }

    dst.reserve(encoded_len(payload.len()));
    dst.put_slice(&MAGIC);
    dst.put_u8(VERSION);
    dst.put_u8(kind.tag());
    dst.put_slice(provider_id.as_bytes());
    dst.put_bytes(0, PROVIDER_ID_CAPACITY - provider_id.len());
    dst.put_u64_le(answer_id);
    dst.put_u32_le(payload.len() as u32);
    dst.put_slice(payload);
    Ok(())
}

/// Encode one frame into a buffer of exactly header + payload size.
pub fn encode(provider_id: &str, answer_id: u64, kind: FrameKind, payload: &[u8]) -> Result<Bytes> {
    let mut buf = BytesMut::with_capacity(encoded_len(payload.len()));
    encode_frame(provider_id, answer_id, kind, payload, &mut buf)?;
    Ok(buf.freeze())
}

/// Decode one complete frame from a received message.
///
/// The returned view borrows `buf`. An empty buffer decodes to
/// [`FrameView::empty`]. Anything else must be exactly one frame: trailing or
/// missing payload bytes are a [`FrameError::LengthMismatch`].
pub fn decode(buf: &[u8]) -> Result<FrameView<'_>> {
    if buf.is_empty() {
        return Ok(FrameView::empty());
    }

    let header = parse_header(buf)?;
    let actual = buf.len() - HEADER_SIZE;
    if header.payload_len != actual {
        return Err(FrameError::LengthMismatch {
            declared: header.payload_len,
            actual,
        });
    }

    Ok(FrameView {
        provider_id: header.provider_id,
        answer_id: header.answer_id,
        kind: Some(header.kind),
        payload: &buf[HEADER_SIZE..],
    })
}

/// Decode a frame from a stream buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete frame yet.
/// On success, consumes the frame bytes from the buffer.
pub fn decode_frame(src: &mut BytesMut, max_payload: usize) -> Result<Option<Frame>> {
    if src.len() < HEADER_SIZE {
        return Ok(None); // Need more data
    }

    let header = parse_header(src)?;
    if header.payload_len > max_payload {
        return Err(FrameError::PayloadTooLarge {
            size: header.payload_len,
            max: max_payload,
        });
    }

    let total = encoded_len(header.payload_len);
    if src.len() < total {
        return Ok(None); // Need more data
    }

    let provider_id = header.provider_id.to_string();
    let answer_id = header.answer_id;
    let kind = header.kind;
    let payload_len = header.payload_len;

    src.advance(HEADER_SIZE);
    let payload = src.split_to(payload_len).freeze();

    Ok(Some(Frame {
        provider_id,
        answer_id,
        kind,
        payload,
    }))
}

struct Header<'a> {
    provider_id: &'a str,
    answer_id: u64,
    kind: FrameKind,
    payload_len: usize,
}

fn parse_header(buf: &[u8]) -> Result<Header<'_>> {
    if buf.len() < HEADER_SIZE {
        return Err(FrameError::Truncated {
            len: buf.len(),
            need: HEADER_SIZE,
        });
    }

    if buf[0..2] != MAGIC {
        return Err(FrameError::InvalidMagic);
    }

    let version = buf[VERSION_OFFSET];
    if version != VERSION {
        return Err(FrameError::UnsupportedVersion(version));
    }

    let kind = FrameKind::try_from(buf[KIND_OFFSET])?;

    let field = &buf[PROVIDER_OFFSET..ANSWER_OFFSET];
    let end = field
        .iter()
        .position(|&b| b == 0)
        .unwrap_or(PROVIDER_ID_CAPACITY);
    let provider_id = std::str::from_utf8(&field[..end])
        .map_err(|_| FrameError::InvalidProviderId("provider id is not UTF-8".to_string()))?;

    let answer_id = u64::from_le_bytes(read_array(buf, ANSWER_OFFSET));
    let payload_len = u32::from_le_bytes(read_array(buf, LENGTH_OFFSET)) as usize;

    Ok(Header {
        provider_id,
        answer_id,
        kind,
        payload_len,
    })
}

fn read_array<const N: usize>(buf: &[u8], offset: usize) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&buf[offset..offset + N]);
    out
}

/// Configuration for the frame codec.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum payload size in bytes. Default: 16 MiB.
    pub max_payload_size: usize,
    /// Read timeout for blocking operations.
    pub read_timeout: Option<Duration>,
    /// Write timeout for blocking operations.
    pub write_timeout: Option<Duration>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
            read_timeout: None,
            write_timeout: None,
        }
    }
}
