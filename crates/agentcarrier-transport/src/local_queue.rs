use std::os::fd::AsRawFd;
use std::os::unix::fs::{FileTypeExt, MetadataExt, PermissionsExt};
use std::os::unix::net::UnixDatagram;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::security::SecurityLevel;

/// Environment variable overriding the directory that holds queue sockets.
pub const QUEUE_DIR_ENV: &str = "AGENTCARRIER_QUEUE_DIR";

/// Default receive capacity (maximum single message size): 256 KiB.
pub const DEFAULT_QUEUE_CAPACITY: usize = 256 * 1024;

/// How long a send may wait on a full queue before failing.
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(1);

const QUEUE_SUFFIX: &str = "mq";

/// Headroom kept between a datagram and the send buffer. Linux refuses Unix
/// datagrams larger than `SO_SNDBUF - 32`.
const SEND_OVERHEAD: usize = 64;

/// Directory holding named queue sockets.
pub fn queue_dir() -> PathBuf {
    std::env::var_os(QUEUE_DIR_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(std::env::temp_dir)
}

/// Resolve a queue address to its socket path.
///
/// Absolute paths are used verbatim. Anything else must be a plain name made
/// of ASCII letters, digits, `.`, `_` and `-`, placed inside [`queue_dir`].
pub fn resolve_queue_path(address: &str) -> Result<PathBuf> {
    let path = Path::new(address);
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }

    let valid = !address.is_empty()
        && address != "."
        && address != ".."
        && address
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
    if !valid {
        return Err(TransportError::InvalidAddress {
            backend: "localqueue",
            address: address.to_string(),
            reason: "queue names may only contain [A-Za-z0-9._-]".to_string(),
        });
    }

    Ok(queue_dir().join(format!("{address}.{QUEUE_SUFFIX}")))
}

/// Send side of a named local queue.
///
/// The socket is unbound; every send is addressed to the queue path. A missing
/// receiver fails immediately, a full queue fails after the send timeout.
pub struct LocalQueueSender {
    socket: UnixDatagram,
    name: String,
    path: PathBuf,
    send_buffer: usize,
}

impl LocalQueueSender {
    /// Open a sender for the named queue.
    ///
    /// This does not check that a receiver exists; delivery failures are
    /// reported by [`LocalQueueSender::send`].
    pub fn open(name: &str) -> Result<Self> {
        let path = resolve_queue_path(name)?;
        let connect_err = |source| TransportError::Connect {
            target: path.display().to_string(),
            source,
        };

        let socket = UnixDatagram::unbound().map_err(connect_err)?;
        socket
            .set_write_timeout(Some(DEFAULT_SEND_TIMEOUT))
            .map_err(connect_err)?;
        let send_buffer = socket_buffer_size(&socket, libc::SO_SNDBUF).unwrap_or(0);

        debug!(?path, send_buffer, "opened local queue sender");
        Ok(Self {
            socket,
            name: name.to_string(),
            path,
            send_buffer,
        })
    }

    /// Send one message as a single datagram.
    pub fn send(&mut self, bytes: &[u8]) -> Result<()> {
        let needed = bytes.len().saturating_add(SEND_OVERHEAD);
        if needed > self.send_buffer {
            self.grow_send_buffer(needed);
        }

        match self.socket.send_to(bytes, &self.path) {
            Ok(sent) if sent == bytes.len() => Ok(()),
            Ok(sent) => Err(self.send_error(std::io::Error::new(
                std::io::ErrorKind::WriteZero,
                format!("short datagram ({sent} of {} bytes)", bytes.len()),
            ))),
            Err(err) => Err(self.send_error(err)),
        }
    }

    /// Queue name as given at open.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Resolved socket path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn grow_send_buffer(&mut self, wanted: usize) {
        if let Err(err) = set_socket_buffer_size(&self.socket, libc::SO_SNDBUF, wanted) {
            debug!(error = %err, wanted, "failed to grow send buffer");
        }
        // The kernel may clamp (or double) the requested size.
        self.send_buffer = socket_buffer_size(&self.socket, libc::SO_SNDBUF).unwrap_or(wanted);
    }

    fn send_error(&self, source: std::io::Error) -> TransportError {
        TransportError::Send {
            target: self.path.display().to_string(),
            source,
        }
    }
}

impl std::fmt::Debug for LocalQueueSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalQueueSender")
            .field("name", &self.name)
            .field("path", &self.path)
            .finish()
    }
}

/// Receive side of a named local queue.
///
/// Binds a Unix datagram socket at the queue path. The socket file is removed
/// on drop, unless something else has replaced it in the meantime.
pub struct LocalQueueReceiver {
    socket: UnixDatagram,
    name: String,
    path: PathBuf,
    capacity: usize,
    created_inode: Option<(u64, u64)>,
    /// Whether the path should be removed on drop.
    cleanup_on_drop: bool,
}

impl LocalQueueReceiver {
    /// Maximum socket path length.
    /// Unix `sockaddr_un.sun_path` is typically 108 bytes on Linux, 104 on macOS.
    #[cfg(target_os = "linux")]
    const MAX_PATH_LEN: usize = 108;
    #[cfg(not(target_os = "linux"))]
    const MAX_PATH_LEN: usize = 104;

    /// Bind the named queue.
    ///
    /// `capacity` bounds the size of a single message; larger messages are
    /// reported as [`TransportError::MessageTooLarge`] by
    /// [`LocalQueueReceiver::receive`]. If a stale socket exists at the path it
    /// is removed first. A socket some other receiver still owns fails with
    /// `AddrInUse`, and any other existing file is left alone and binding fails.
    pub fn bind(name: &str, capacity: usize, level: SecurityLevel) -> Result<Self> {
        let path = resolve_queue_path(name)?;
        let bind_err = |source| TransportError::Bind {
            path: path.clone(),
            source,
        };

        let path_bytes = path.as_os_str().len();
        if path_bytes >= Self::MAX_PATH_LEN {
            return Err(TransportError::PathTooLong {
                path,
                len: path_bytes,
                max: Self::MAX_PATH_LEN,
            });
        }

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(bind_err)?;
        }

        // Remove stale socket if it exists, but never remove non-socket files
        // or a socket that still has a receiver behind it.
        if let Ok(metadata) = std::fs::symlink_metadata(&path) {
            if metadata.file_type().is_socket() {
                if socket_is_live(&path).map_err(bind_err)? {
                    return Err(bind_err(std::io::Error::new(
                        std::io::ErrorKind::AddrInUse,
                        "queue is already bound by a live receiver",
                    )));
                }
                debug!(?path, "removing stale queue socket");
                std::fs::remove_file(&path).map_err(bind_err)?;
            } else {
                return Err(bind_err(std::io::Error::new(
                    std::io::ErrorKind::AlreadyExists,
                    "existing path is not a unix socket",
                )));
            }
        }

        let socket = UnixDatagram::bind(&path).map_err(bind_err)?;

        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(level.socket_mode()))
            .map_err(bind_err)?;
        let created_metadata = std::fs::symlink_metadata(&path).map_err(bind_err)?;
        let created_inode = Some((created_metadata.dev(), created_metadata.ino()));

        if let Err(err) = set_socket_buffer_size(&socket, libc::SO_RCVBUF, capacity) {
            debug!(error = %err, capacity, "failed to size receive buffer");
        }

        info!(?path, capacity, %level, "local queue bound");

        Ok(Self {
            socket,
            name: name.to_string(),
            path,
            capacity,
            created_inode,
            cleanup_on_drop: true,
        })
    }

    /// A buffer large enough for [`LocalQueueReceiver::receive`].
    ///
    /// One byte over capacity, so oversized datagrams can be told apart from
    /// messages of exactly `capacity` bytes.
    pub fn message_buffer(&self) -> Vec<u8> {
        vec![0u8; self.capacity + 1]
    }

    /// Receive the next message into `buf` (blocking up to the read timeout).
    ///
    /// Returns `Ok(None)` when the read timeout elapses without a message.
    /// An empty slice means either an empty datagram or a [`wake`](Self::wake).
    pub fn receive<'b>(&self, buf: &'b mut [u8]) -> Result<Option<&'b [u8]>> {
        match self.socket.recv(buf) {
            Ok(n) if n > self.capacity => Err(TransportError::MessageTooLarge {
                size: n,
                max: self.capacity,
            }),
            Ok(n) => Ok(Some(&buf[..n])),
            Err(err)
                if matches!(
                    err.kind(),
                    std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
                ) =>
            {
                Ok(None)
            }
            Err(err) if err.kind() == std::io::ErrorKind::Interrupted => Ok(None),
            Err(err) => Err(TransportError::Io(err)),
        }
    }

    /// Set the read timeout used by [`LocalQueueReceiver::receive`].
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.socket.set_read_timeout(timeout).map_err(Into::into)
    }

    /// Unblock every thread waiting in [`LocalQueueReceiver::receive`].
    ///
    /// Shuts down the read side of the socket; pending and future receives
    /// return immediately with an empty message.
    pub fn wake(&self) {
        if let Err(err) = self.socket.shutdown(std::net::Shutdown::Read) {
            debug!(error = %err, path = ?self.path, "queue read shutdown failed; relying on read timeout");
        }
    }

    /// Queue name as given at bind.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The path this queue is bound to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Maximum single message size.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Transport name for diagnostics.
    pub fn transport_name(&self) -> &'static str {
        "unix-datagram-queue"
    }
}

impl std::fmt::Debug for LocalQueueReceiver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalQueueReceiver")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("capacity", &self.capacity)
            .finish()
    }
}

impl Drop for LocalQueueReceiver {
    fn drop(&mut self) {
        if self.cleanup_on_drop {
            if let Some((expected_dev, expected_ino)) = self.created_inode {
                if let Ok(metadata) = std::fs::symlink_metadata(&self.path) {
                    if metadata.file_type().is_socket()
                        && metadata.dev() == expected_dev
                        && metadata.ino() == expected_ino
                    {
                        debug!(path = ?self.path, "cleaning up queue socket");
                        let _ = std::fs::remove_file(&self.path);
                    } else {
                        debug!(
                            path = ?self.path,
                            "queue path identity changed; skipping cleanup"
                        );
                    }
                }
            }
        }
    }
}

/// Whether a receiver is still bound behind the socket file at `path`.
fn socket_is_live(path: &Path) -> std::io::Result<bool> {
    let probe = UnixDatagram::unbound()?;
    match probe.connect(path) {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == std::io::ErrorKind::ConnectionRefused => Ok(false),
        Err(err) => Err(err),
    }
}

fn set_socket_buffer_size(
    socket: &UnixDatagram,
    option: libc::c_int,
    size: usize,
) -> std::io::Result<()> {
    let value = libc::c_int::try_from(size).unwrap_or(libc::c_int::MAX);

    // SAFETY: `value` is a valid readable c_int for the provided length, and the
    // descriptor is an open socket owned by `socket`.
    let rc = unsafe {
        libc::setsockopt(
            socket.as_raw_fd(),
            libc::SOL_SOCKET,
            option,
            (&value as *const libc::c_int).cast::<libc::c_void>(),
            std::mem::size_of::<libc::c_int>() as libc::socklen_t,
        )
    };

    if rc == 0 {
        Ok(())
    } else {
        Err(std::io::Error::last_os_error())
    }
}

fn socket_buffer_size(socket: &UnixDatagram, option: libc::c_int) -> std::io::Result<usize> {
    let mut value: libc::c_int = 0;
    let mut len = std::mem::size_of::<libc::c_int>() as libc::socklen_t;

    // SAFETY: `value` and `len` are valid writable pointers for the provided sizes,
    // and the descriptor is an open socket owned by `socket`.
    let rc = unsafe {
        libc::getsockopt(
            socket.as_raw_fd(),
            libc::SOL_SOCKET,
            option,
            (&mut value as *mut libc::c_int).cast::<libc::c_void>(),
            &mut len,
        )
    };

    if rc == 0 {
        Ok(usize::try_from(value).unwrap_or(0))
    } else {
        Err(std::io::Error::last_os_error())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unique_dir(tag: &str) -> PathBuf {
        let dir = PathBuf::from(format!(
            "/tmp/acq-{tag}-{}-{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .expect("time should be after epoch")
                .as_nanos()
        ));
        std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
        dir
    }

    fn queue_in(dir: &Path, name: &str) -> String {
        dir.join(format!("{name}.{QUEUE_SUFFIX}"))
            .to_string_lossy()
            .into_owned()
    }

    #[test]
    fn test_bind_send_receive() {
        let dir = unique_dir("roundtrip");
        let queue = queue_in(&dir, "q");

        let receiver = LocalQueueReceiver::bind(&queue, 1024, SecurityLevel::Admin).unwrap();
        assert!(receiver.path().exists());

        let mut sender = LocalQueueSender::open(&queue).unwrap();
        sender.send(b"hello").unwrap();

        let mut buf = receiver.message_buffer();
        let msg = receiver.receive(&mut buf).unwrap().unwrap();
        assert_eq!(msg, b"hello");

        drop(receiver);
        assert!(
            !Path::new(&queue).exists(),
            "socket file should be cleaned up on drop"
        );
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_send_without_receiver_fails() {
        let dir = unique_dir("absent");
        let queue = queue_in(&dir, "nobody");

        let mut sender = LocalQueueSender::open(&queue).unwrap();
        let err = sender.send(b"lost").unwrap_err();
        assert!(matches!(err, TransportError::Send { .. }));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_security_level_sets_mode() {
        let dir = unique_dir("mode");
        for level in [
            SecurityLevel::None,
            SecurityLevel::Standard,
            SecurityLevel::Admin,
        ] {
            let queue = queue_in(&dir, level.as_str());
            let receiver = LocalQueueReceiver::bind(&queue, 1024, level).unwrap();
            let mode = std::fs::metadata(receiver.path())
                .unwrap()
                .permissions()
                .mode()
                & 0o777;
            assert_eq!(mode, level.socket_mode());
        }
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_oversized_message_reported() {
        let dir = unique_dir("oversize");
        let queue = queue_in(&dir, "small");

        let receiver = LocalQueueReceiver::bind(&queue, 8, SecurityLevel::Admin).unwrap();
        let mut sender = LocalQueueSender::open(&queue).unwrap();
        sender.send(&[7u8; 32]).unwrap();
        sender.send(&[1u8; 8]).unwrap();

        let mut buf = receiver.message_buffer();
        let err = receiver.receive(&mut buf).unwrap_err();
        assert!(matches!(err, TransportError::MessageTooLarge { max: 8, .. }));

        // The queue keeps working after an oversized message.
        let msg = receiver.receive(&mut buf).unwrap().unwrap();
        assert_eq!(msg, &[1u8; 8]);

        drop(receiver);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_large_message_grows_send_buffer() {
        let dir = unique_dir("large");
        let queue = queue_in(&dir, "large");
        let size = 128 * 1024;

        let receiver = LocalQueueReceiver::bind(&queue, size, SecurityLevel::Admin).unwrap();
        let mut sender = LocalQueueSender::open(&queue).unwrap();
        let payload: Vec<u8> = (0..size).map(|i| (i % 251) as u8).collect();
        sender.send(&payload).unwrap();

        let mut buf = receiver.message_buffer();
        let msg = receiver.receive(&mut buf).unwrap().unwrap();
        assert_eq!(msg, payload.as_slice());

        drop(receiver);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_read_timeout_returns_none() {
        let dir = unique_dir("timeout");
        let queue = queue_in(&dir, "idle");

        let receiver = LocalQueueReceiver::bind(&queue, 64, SecurityLevel::Admin).unwrap();
        receiver
            .set_read_timeout(Some(Duration::from_millis(20)))
            .unwrap();

        let mut buf = receiver.message_buffer();
        assert!(receiver.receive(&mut buf).unwrap().is_none());

        drop(receiver);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_wake_unblocks_receiver() {
        let dir = unique_dir("wake");
        let queue = queue_in(&dir, "wake");

        let receiver =
            std::sync::Arc::new(LocalQueueReceiver::bind(&queue, 64, SecurityLevel::Admin).unwrap());
        receiver
            .set_read_timeout(Some(Duration::from_millis(200)))
            .unwrap();

        let waiter = {
            let receiver = std::sync::Arc::clone(&receiver);
            std::thread::spawn(move || {
                let mut buf = receiver.message_buffer();
                receiver.receive(&mut buf).map(|msg| msg.map(<[u8]>::len))
            })
        };

        receiver.wake();
        let result = waiter.join().unwrap().unwrap();
        // Either woken with an empty read or the read timeout fired.
        assert!(matches!(result, Some(0) | None));

        drop(receiver);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_path_too_long() {
        let long_path = "/tmp/".to_string() + &"a".repeat(200) + ".mq";
        let result = LocalQueueReceiver::bind(&long_path, 64, SecurityLevel::Admin);
        assert!(matches!(result, Err(TransportError::PathTooLong { .. })));
    }

    #[test]
    fn test_invalid_queue_names() {
        for bad in ["", "..", "a/b", "has space"] {
            let err = resolve_queue_path(bad).unwrap_err();
            assert!(err.is_parse(), "{bad:?} should be rejected");
        }
        let path = resolve_queue_path("AgentMailbox").unwrap();
        assert!(path.ends_with("AgentMailbox.mq"));
    }

    #[test]
    fn test_bind_replaces_stale_socket() {
        let dir = unique_dir("stale");
        let queue = queue_in(&dir, "stale");

        // A closed socket leaves its file behind.
        drop(UnixDatagram::bind(&queue).unwrap());
        assert!(Path::new(&queue).exists());

        let second = LocalQueueReceiver::bind(&queue, 64, SecurityLevel::Admin);
        assert!(second.is_ok());

        drop(second);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_bind_refuses_live_queue() {
        let dir = unique_dir("live");
        let queue = queue_in(&dir, "live");

        let first = LocalQueueReceiver::bind(&queue, 64, SecurityLevel::Admin).unwrap();
        let second = LocalQueueReceiver::bind(&queue, 64, SecurityLevel::Admin);
        match second {
            Err(TransportError::Bind { source, .. }) => {
                assert_eq!(source.kind(), std::io::ErrorKind::AddrInUse);
            }
            other => panic!("second bind should fail, got {other:?}"),
        }

        // The first receiver still owns the queue.
        let mut sender = LocalQueueSender::open(&queue).unwrap();
        sender.send(b"hello").unwrap();
        let mut buf = first.message_buffer();
        assert_eq!(first.receive(&mut buf).unwrap().unwrap(), b"hello");

        drop(first);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_send_just_under_send_buffer() {
        let dir = unique_dir("edge");
        let queue = queue_in(&dir, "edge");

        let receiver =
            LocalQueueReceiver::bind(&queue, DEFAULT_QUEUE_CAPACITY, SecurityLevel::Admin).unwrap();
        let mut sender = LocalQueueSender::open(&queue).unwrap();
        let size = sender
            .send_buffer
            .saturating_sub(10)
            .clamp(1, DEFAULT_QUEUE_CAPACITY);

        let payload = vec![7u8; size];
        sender.send(&payload).unwrap();

        let mut buf = receiver.message_buffer();
        let msg = receiver.receive(&mut buf).unwrap().unwrap();
        assert_eq!(msg.len(), size);

        drop(receiver);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_bind_rejects_existing_non_socket_file() {
        let dir = unique_dir("bind-file");
        let queue = queue_in(&dir, "not-a-socket");
        std::fs::write(&queue, b"regular-file").unwrap();

        let result = LocalQueueReceiver::bind(&queue, 64, SecurityLevel::Admin);
        assert!(matches!(result, Err(TransportError::Bind { .. })));
        assert!(Path::new(&queue).exists());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_drop_does_not_remove_replaced_path() {
        let dir = unique_dir("drop-race");
        let queue = queue_in(&dir, "drop");

        let receiver = LocalQueueReceiver::bind(&queue, 64, SecurityLevel::Admin).unwrap();

        // Replace path while the receiver is alive.
        std::fs::remove_file(&queue).unwrap();
        std::fs::write(&queue, b"replacement-file").unwrap();

        drop(receiver);
        assert!(
            Path::new(&queue).exists(),
            "drop must not remove path if inode identity changed"
        );

        let _ = std::fs::remove_dir_all(&dir);
    }
}
