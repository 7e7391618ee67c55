//! `tokio_util` codec for the frame wire format.

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use crate::codec::{decode_frame, encode_frame, Frame, DEFAULT_MAX_PAYLOAD};
use crate::error::{FrameError, Result};

/// Frame codec for `tokio_util::codec::{FramedRead, FramedWrite}`.
#[derive(Debug, Clone)]
pub struct FrameCodec {
    max_payload_size: usize,
}

impl FrameCodec {
    pub fn new() -> Self {
        Self::with_max_payload(DEFAULT_MAX_PAYLOAD)
    }

    pub fn with_max_payload(max_payload_size: usize) -> Self {
        Self { max_payload_size }
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>> {
        decode_frame(src, self.max_payload_size)
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = FrameError;

    fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<()> {
        if item.payload.len() > self.max_payload_size {
            return Err(FrameError::PayloadTooLarge {
                size: item.payload.len(),
                max: self.max_payload_size,
            });
        }
        encode_frame(
            &item.provider_id,
            item.answer_id,
            item.kind,
            &item.payload,
            dst,
        )
    }
}

#[cfg(test)]
mod tests {
    use futures_util::{SinkExt, StreamExt};
    use tokio_util::codec::{FramedRead, FramedWrite};

    use super::*;
    use crate::kind::FrameKind;

    #[tokio::test]
    async fn framed_roundtrip_over_duplex() {
        let (client, server) = tokio::io::duplex(1024);
        let mut sink = FramedWrite::new(client, FrameCodec::new());
        let mut stream = FramedRead::new(server, FrameCodec::new());

        sink.send(Frame::new("a", 11, FrameKind::Segment, vec![1u8, 2, 3]))
            .await
            .unwrap();
        sink.send(Frame::new("x", 0, FrameKind::Log, "aaa"))
            .await
            .unwrap();
        drop(sink);

        let first = stream.next().await.unwrap().unwrap();
        assert_eq!(first.answer_id, 11);
        assert_eq!(first.payload.as_ref(), &[1, 2, 3]);

        let second = stream.next().await.unwrap().unwrap();
        assert_eq!(second.kind, FrameKind::Log);
        assert_eq!(second.payload.as_ref(), b"aaa");

        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn encoder_enforces_max_payload() {
        let mut codec = FrameCodec::with_max_payload(2);
        let mut dst = BytesMut::new();
        let err = codec
            .encode(Frame::new("a", 0, FrameKind::Log, "abc"), &mut dst)
            .unwrap_err();
        assert!(matches!(err, FrameError::PayloadTooLarge { size: 3, max: 2 }));
        assert!(dst.is_empty());
    }
}
