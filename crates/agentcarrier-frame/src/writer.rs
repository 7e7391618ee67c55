use std::io::{ErrorKind, Write};
use std::net::TcpStream;

use bytes::BytesMut;

use crate::codec::{encode_frame, Frame, FrameConfig, HEADER_SIZE};
use crate::error::{FrameError, Result};
use crate::kind::FrameKind;

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Writes complete frames to any `Write` stream.
pub struct FrameWriter<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
}

impl<T: Write> FrameWriter<T> {
    /// Create a new frame writer with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame writer with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Write a complete frame (blocking).
    pub fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        self.send(
            &frame.provider_id,
            frame.answer_id,
            frame.kind,
            frame.payload.as_ref(),
        )
    }

    /// Encode and send one frame.
    pub fn send(
        &mut self,
        provider_id: &str,
        answer_id: u64,
        kind: FrameKind,
        payload: &[u8],
    ) -> Result<()> {
        self.check_payload_size(payload.len())?;

        let mut buf = std::mem::take(&mut self.buf);
        buf.clear();
        let result = encode_frame(provider_id, answer_id, kind, payload, &mut buf)
            .and_then(|()| self.write_all_retrying(&buf));
        self.buf = buf;
        result?;

        self.flush()
    }

    /// Send bytes that already hold one encoded frame.
    pub fn send_encoded(&mut self, frame_bytes: &[u8]) -> Result<()> {
        self.check_payload_size(frame_bytes.len().saturating_sub(HEADER_SIZE))?;
        self.write_all_retrying(frame_bytes)?;
        self.flush()
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current frame writer configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }

    fn check_payload_size(&self, size: usize) -> Result<()> {
        if size > self.config.max_payload_size {
            return Err(FrameError::PayloadTooLarge {
                size,
                max: self.config.max_payload_size,
            });
        }
        Ok(())
    }

    fn write_all_retrying(&mut self, bytes: &[u8]) -> Result<()> {
        let mut offset = 0usize;
        while offset < bytes.len() {
            match self.inner.write(&bytes[offset..]) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
        Ok(())
    }
}

impl FrameWriter<TcpStream> {
    /// Create a frame writer for a TCP stream and apply write timeout from config.
    pub fn with_config_tcp(inner: TcpStream, config: FrameConfig) -> Result<Self> {
        inner.set_write_timeout(config.write_timeout)?;
        Ok(Self::with_config(inner, config))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use bytes::BytesMut;

    use super::*;
    use crate::codec::{decode, decode_frame, encode};

    fn written(writer: FrameWriter<Cursor<Vec<u8>>>) -> BytesMut {
        BytesMut::from(writer.into_inner().into_inner().as_slice())
    }

    #[test]
    fn write_single_frame() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::<u8>::new()));

        writer.send("x", 1, FrameKind::Log, b"hello").unwrap();

        let wire = written(writer);
        let view = decode(&wire).unwrap();
        assert_eq!(view.kind(), Some(FrameKind::Log));
        assert_eq!(view.provider_id(), "x");
        assert_eq!(view.payload(), b"hello");
    }

    #[test]
    fn write_multiple_frames() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::<u8>::new()));

        writer.send("x", 1, FrameKind::Log, b"one").unwrap();
        writer.send("x", 2, FrameKind::Yaml, b"two").unwrap();
        writer.send("x", 3, FrameKind::Command, b"three").unwrap();

        let mut wire = written(writer);

        let f1 = decode_frame(&mut wire, usize::MAX).unwrap().unwrap();
        let f2 = decode_frame(&mut wire, usize::MAX).unwrap().unwrap();
        let f3 = decode_frame(&mut wire, usize::MAX).unwrap().unwrap();

        assert_eq!((f1.kind, f1.payload.as_ref()), (FrameKind::Log, b"one".as_ref()));
        assert_eq!((f2.kind, f2.payload.as_ref()), (FrameKind::Yaml, b"two".as_ref()));
        assert_eq!(
            (f3.kind, f3.payload.as_ref()),
            (FrameKind::Command, b"three".as_ref())
        );
    }

    #[test]
    fn payload_too_large_rejected() {
        let cfg = FrameConfig {
            max_payload_size: 4,
            ..FrameConfig::default()
        };
        let mut writer = FrameWriter::with_config(Cursor::new(Vec::<u8>::new()), cfg);

        let err = writer
            .send("x", 0, FrameKind::Segment, b"oversized")
            .unwrap_err();
        assert!(matches!(err, FrameError::PayloadTooLarge { .. }));

        let encoded = encode("x", 0, FrameKind::Segment, b"oversized").unwrap();
        let err = writer.send_encoded(&encoded).unwrap_err();
        assert!(matches!(err, FrameError::PayloadTooLarge { .. }));
    }

    #[test]
    fn invalid_provider_id_writes_nothing() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::<u8>::new()));
        let long_id = "x".repeat(64);

        let err = writer.send(&long_id, 0, FrameKind::Log, b"a").unwrap_err();
        assert!(matches!(err, FrameError::InvalidProviderId(_)));
        assert!(written(writer).is_empty());
    }

    #[test]
    fn send_encoded_passes_bytes_through() {
        let encoded = encode("raw", 42, FrameKind::Segment, b"payload").unwrap();
        let mut writer = FrameWriter::new(Cursor::new(Vec::<u8>::new()));

        writer.send_encoded(&encoded).unwrap();

        assert_eq!(written(writer).as_ref(), encoded.as_ref());
    }

    #[test]
    fn write_frame_method() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::<u8>::new()));
        let frame = Frame::new("w", 2, FrameKind::Yaml, "abc");

        writer.write_frame(&frame).unwrap();

        let mut wire = written(writer);
        let decoded = decode_frame(&mut wire, usize::MAX).unwrap().unwrap();
        assert_eq!(decoded, frame);
    }

    #[test]
    fn flush_propagates() {
        let sink = FlushTrackingWriter::default();
        let flag = Arc::clone(&sink.flushed);
        let mut writer = FrameWriter::new(sink);

        writer.send("f", 1, FrameKind::Log, b"x").unwrap();

        assert!(flag.load(Ordering::SeqCst));
    }

    #[test]
    fn handles_interrupted_write_and_flush() {
        let writer_impl = InterruptedWriteThenFlush {
            wrote_once: false,
            flush_interrupted: false,
            data: Vec::new(),
        };

        let mut writer = FrameWriter::new(writer_impl);
        writer.send("r", 5, FrameKind::Log, b"retry").unwrap();

        let inner = writer.into_inner();
        assert_eq!(inner.data.len(), HEADER_SIZE + 5);
    }

    #[test]
    fn connection_closed_when_write_returns_zero() {
        let mut writer = FrameWriter::new(ZeroWriter);
        let err = writer.send("z", 1, FrameKind::Log, b"x").unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[derive(Default)]
    struct FlushTrackingWriter {
        flushed: Arc<AtomicBool>,
        data: Vec<u8>,
    }

    impl Write for FlushTrackingWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.data.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            self.flushed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    struct InterruptedWriteThenFlush {
        wrote_once: bool,
        flush_interrupted: bool,
        data: Vec<u8>,
    }

    impl Write for InterruptedWriteThenFlush {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if !self.wrote_once {
                self.wrote_once = true;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            self.data.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            if !self.flush_interrupted {
                self.flush_interrupted = true;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            Ok(())
        }
    }

    struct ZeroWriter;

    impl Write for ZeroWriter {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Ok(0)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }
}
