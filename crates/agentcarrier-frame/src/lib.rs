//! Typed binary frames for agent-local delivery.
//!
//! Every message is one self-contained frame:
//! - A 2-byte magic number ("AC") and a 1-byte format version
//! - A 1-byte kind tag (log, segment, yaml, command)
//! - A 32-byte NUL-padded provider id naming the sender
//! - An 8-byte little-endian answer id
//! - A 4-byte little-endian payload length, followed by the payload
//!
//! Datagram receivers decode with [`decode`] into a borrowed [`FrameView`];
//! stream readers use [`FrameReader`] or, with the `async` feature, `FrameCodec`.

#[cfg(feature = "async")]
pub mod async_codec;
pub mod clock;
pub mod codec;
pub mod error;
pub mod kind;
pub mod reader;
pub mod writer;

#[cfg(feature = "async")]
pub use async_codec::FrameCodec;
pub use clock::{answer_id_to_duration, monotonic_answer_id};
pub use codec::{
    as_bytes, as_text, decode, decode_frame, encode, encode_frame, encoded_len,
    validate_provider_id, Frame, FrameConfig, FrameView, DEFAULT_MAX_PAYLOAD, HEADER_SIZE,
    PROVIDER_ID_CAPACITY,
};
pub use error::{FrameError, Result};
pub use kind::FrameKind;
pub use reader::FrameReader;
pub use writer::FrameWriter;
