//! Terminal backends that never reach a consumer process.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use agentcarrier_frame::{FrameConfig, FrameError, FrameWriter};
use bytes::Bytes;
use tracing::{debug, warn};

use crate::error::{frame_to_io, Result, TransportError};

/// Appends frame bytes to a file, created if missing.
///
/// The resulting file is a plain frame stream, readable with
/// `agentcarrier_frame::FrameReader`. A failed send truncates the file back
/// to its previous length, so no partial frame is left behind.
pub struct FileSink {
    path: PathBuf,
    writer: FrameWriter<File>,
}

impl FileSink {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_config(path, FrameConfig::default())
    }

    pub fn open_with_config(path: impl AsRef<Path>, config: FrameConfig) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| TransportError::Connect {
                target: path.display().to_string(),
                source,
            })?;
        debug!(?path, "file sink opened");
        Ok(Self {
            path,
            writer: FrameWriter::with_config(file, config),
        })
    }

    pub fn send(&mut self, frame_bytes: &[u8]) -> Result<()> {
        append_frame(&mut self.writer, frame_bytes).map_err(|err| TransportError::Send {
                target: self.path.display().to_string(),
                source: frame_to_io(err),
            })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Storage whose length can be restored after a failed append.
trait AppendTarget: Write {
    fn committed_len(&self) -> std::io::Result<u64>;
    fn truncate(&mut self, len: u64) -> std::io::Result<()>;
}

impl AppendTarget for File {
    fn committed_len(&self) -> std::io::Result<u64> {
        self.metadata().map(|metadata| metadata.len())
    }

    fn truncate(&mut self, len: u64) -> std::io::Result<()> {
        self.set_len(len)
    }
}

fn append_frame<W: AppendTarget>(
    writer: &mut FrameWriter<W>,
    frame_bytes: &[u8],
) -> agentcarrier_frame::Result<()> {
    let committed = writer.get_ref().committed_len().map_err(FrameError::Io)?;
    writer.send_encoded(frame_bytes).inspect_err(|_| {
        if let Err(err) = writer.get_mut().truncate(committed) {
            warn!(error = %err, committed, "failed to roll back partial frame");
        }
    })
}

impl std::fmt::Debug for FileSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileSink").field("path", &self.path).finish()
    }
}

/// Discards everything.
#[derive(Debug, Default)]
pub struct NullSink {
    discarded: u64,
}

impl NullSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn send(&mut self, _frame_bytes: &[u8]) -> Result<()> {
        self.discarded += 1;
        Ok(())
    }

    /// Number of frames discarded so far.
    pub fn discarded(&self) -> u64 {
        self.discarded
    }
}

/// Keeps a copy of the most recent frame for inspection.
#[derive(Debug, Default)]
pub struct DumpSink {
    last: Option<Bytes>,
    sent: u64,
}

impl DumpSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn send(&mut self, frame_bytes: &[u8]) -> Result<()> {
        debug!(len = frame_bytes.len(), "dump sink captured frame");
        self.last = Some(Bytes::copy_from_slice(frame_bytes));
        self.sent += 1;
        Ok(())
    }

    /// Bytes of the most recent frame, if any.
    pub fn last_frame(&self) -> Option<&Bytes> {
        self.last.as_ref()
    }

    pub fn sent(&self) -> u64 {
        self.sent
    }
}

#[cfg(test)]
mod tests {
    use agentcarrier_frame::{decode, encode, FrameKind, FrameReader};

    use super::*;

    fn unique_file(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "agentcarrier-{tag}-{}-{}.dat",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .expect("time should be after epoch")
                .as_nanos()
        ))
    }

    #[test]
    fn file_sink_appends_frames() {
        let path = unique_file("sink");

        let mut sink = FileSink::open(&path).unwrap();
        sink.send(&encode("f", 1, FrameKind::Log, b"one").unwrap())
            .unwrap();
        drop(sink);

        // Reopening appends instead of truncating.
        let mut sink = FileSink::open(&path).unwrap();
        sink.send(&encode("f", 2, FrameKind::Yaml, b"two").unwrap())
            .unwrap();
        drop(sink);

        let file = File::open(&path).unwrap();
        let frames = FrameReader::new(file)
            .frames()
            .collect::<agentcarrier_frame::Result<Vec<_>>>()
            .unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].payload.as_ref(), b"one");
        assert_eq!(frames[1].kind, FrameKind::Yaml);

        let _ = std::fs::remove_file(&path);
    }

    /// Accepts `budget` bytes, then fails like a full disk.
    struct FillingDisk {
        data: Vec<u8>,
        budget: usize,
    }

    impl Write for FillingDisk {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if self.budget == 0 {
                return Err(std::io::Error::other("no space left on device"));
            }
            let n = buf.len().min(self.budget);
            self.data.extend_from_slice(&buf[..n]);
            self.budget -= n;
            Ok(n)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl AppendTarget for FillingDisk {
        fn committed_len(&self) -> std::io::Result<u64> {
            Ok(self.data.len() as u64)
        }

        fn truncate(&mut self, len: u64) -> std::io::Result<()> {
            self.data.truncate(len as usize);
            Ok(())
        }
    }

    #[test]
    fn failed_append_leaves_no_partial_frame() {
        let first = encode("f", 1, FrameKind::Log, b"kept").unwrap();
        let second = encode("f", 2, FrameKind::Log, b"torn by a full disk").unwrap();

        let mut writer = FrameWriter::new(FillingDisk {
            data: Vec::new(),
            budget: first.len() + 10,
        });
        append_frame(&mut writer, &first).unwrap();
        assert!(append_frame(&mut writer, &second).is_err());

        let data = writer.into_inner().data;
        assert_eq!(data, first.as_ref());
        let frames = FrameReader::new(data.as_slice())
            .frames()
            .collect::<agentcarrier_frame::Result<Vec<_>>>()
            .unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].payload.as_ref(), b"kept");
    }

    #[test]
    fn file_sink_open_fails_for_missing_directory() {
        let path = unique_file("missing").join("nested.dat");
        let err = FileSink::open(&path).unwrap_err();
        assert!(matches!(err, TransportError::Connect { .. }));
    }

    #[test]
    fn null_sink_counts() {
        let mut sink = NullSink::new();
        sink.send(b"anything").unwrap();
        sink.send(&[]).unwrap();
        assert_eq!(sink.discarded(), 2);
    }

    #[test]
    fn dump_sink_keeps_last() {
        let mut sink = DumpSink::new();
        assert!(sink.last_frame().is_none());

        sink.send(&encode("d", 1, FrameKind::Log, b"first").unwrap())
            .unwrap();
        sink.send(&encode("d", 2, FrameKind::Log, b"second").unwrap())
            .unwrap();

        let last = sink.last_frame().unwrap();
        let view = decode(last).unwrap();
        assert_eq!(view.answer_id(), 2);
        assert_eq!(view.payload(), b"second");
        assert_eq!(sink.sent(), 2);
    }
}
