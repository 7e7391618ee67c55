use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use agentcarrier_transport::{
    Backend, LocalQueueReceiver, PortDescriptor, SecurityLevel, Transport, TransportError,
    DEFAULT_QUEUE_CAPACITY,
};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{DeliveryError, Result};
use crate::handler::FrameHandler;

/// Default number of worker threads.
pub const DEFAULT_WORKERS: usize = 2;

/// Default interval at which idle workers re-check the stop flag.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Reception server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Worker threads receiving from the queue. Zero is treated as one.
    pub workers: usize,
    /// Maximum message size accepted from the queue.
    pub capacity: usize,
    /// Read timeout of each worker's receive call.
    pub poll_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            capacity: DEFAULT_QUEUE_CAPACITY,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

#[derive(Debug, Default)]
struct ServerStats {
    received: AtomicU64,
    accepted: AtomicU64,
    rejected: AtomicU64,
    failed: AtomicU64,
}

impl ServerStats {
    fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            received: self.received.load(Ordering::Relaxed),
            accepted: self.accepted.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time message counters.
///
/// `received == accepted + rejected + failed` once all in-flight messages are
/// handled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub received: u64,
    pub accepted: u64,
    pub rejected: u64,
    /// Oversized messages and handler panics.
    pub failed: u64,
}

/// Receives frames from a local queue on a pool of worker threads.
///
/// Each message is handed to the handler on the thread that received it.
/// Handler results and panics are counted per message and never stop the
/// workers. Dropping a running server stops it.
pub struct ReceptionServer<C> {
    address: String,
    handler: Arc<dyn FrameHandler<C>>,
    context: Arc<C>,
    level: SecurityLevel,
    config: ServerConfig,
    running: Arc<AtomicBool>,
    stats: Arc<ServerStats>,
    queue: Option<Arc<LocalQueueReceiver>>,
    workers: Vec<JoinHandle<()>>,
}

impl<C: Send + Sync + 'static> ReceptionServer<C> {
    /// Create a server for the local queue `address`. Nothing is bound until
    /// [`start`](Self::start).
    pub fn new(
        address: impl Into<String>,
        handler: impl FrameHandler<C> + 'static,
        context: Arc<C>,
        level: SecurityLevel,
    ) -> Self {
        Self {
            address: address.into(),
            handler: Arc::new(handler),
            context,
            level,
            config: ServerConfig::default(),
            running: Arc::new(AtomicBool::new(false)),
            stats: Arc::new(ServerStats::default()),
            queue: None,
            workers: Vec::new(),
        }
    }

    /// Override the server configuration. Takes effect on the next start.
    pub fn with_config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Bind the queue and spawn the workers.
    pub fn start(&mut self) -> Result<()> {
        if self.queue.is_some() {
            return Err(DeliveryError::AlreadyRunning(self.address.clone()));
        }

        let port = PortDescriptor::new(Backend::LocalQueue.tag(), self.address.as_str())?;
        let queue = Transport::open_for_receive(&port, self.config.capacity, self.level)?;
        queue.set_read_timeout(Some(self.config.poll_interval.max(Duration::from_millis(1))))?;
        let queue = Arc::new(queue);

        self.running.store(true, Ordering::SeqCst);
        self.queue = Some(Arc::clone(&queue));

        for index in 0..self.config.workers.max(1) {
            let worker = Worker {
                queue: Arc::clone(&queue),
                handler: Arc::clone(&self.handler),
                context: Arc::clone(&self.context),
                running: Arc::clone(&self.running),
                stats: Arc::clone(&self.stats),
                poll_interval: self.config.poll_interval,
            };
            let spawned = std::thread::Builder::new()
                .name(format!("agentcarrier-rx-{index}"))
                .spawn(move || worker.run());
            match spawned {
                Ok(handle) => self.workers.push(handle),
                Err(err) => {
                    self.stop();
                    return Err(DeliveryError::Spawn(err));
                }
            }
        }

        info!(
            queue = %self.address,
            workers = self.workers.len(),
            capacity = self.config.capacity,
            "reception server started"
        );
        Ok(())
    }

    /// Stop the workers and release the queue.
    ///
    /// Handler calls already in progress run to completion first. Calling
    /// `stop` on a stopped server does nothing.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        let Some(queue) = self.queue.take() else {
            return;
        };

        queue.wake();
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                warn!(queue = %self.address, "reception worker exited abnormally");
            }
        }
        drop(queue);

        info!(queue = %self.address, stats = ?self.stats.snapshot(), "reception server stopped");
    }

    pub fn is_running(&self) -> bool {
        self.queue.is_some()
    }

    /// The queue address this server binds.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Socket path of the bound queue, while running.
    pub fn queue_path(&self) -> Option<PathBuf> {
        self.queue.as_ref().map(|queue| queue.path().to_path_buf())
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn context(&self) -> &Arc<C> {
        &self.context
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }
}

impl<C> Drop for ReceptionServer<C> {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(queue) = self.queue.take() {
            queue.wake();
            for handle in self.workers.drain(..) {
                let _ = handle.join();
            }
            debug!(queue = %self.address, "reception server dropped");
        }
    }
}

impl<C> std::fmt::Debug for ReceptionServer<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReceptionServer")
            .field("address", &self.address)
            .field("level", &self.level)
            .field("config", &self.config)
            .field("running", &self.queue.is_some())
            .finish()
    }
}

struct Worker<C> {
    queue: Arc<LocalQueueReceiver>,
    handler: Arc<dyn FrameHandler<C>>,
    context: Arc<C>,
    running: Arc<AtomicBool>,
    stats: Arc<ServerStats>,
    poll_interval: Duration,
}

impl<C> Worker<C> {
    fn run(self) {
        let mut buf = self.queue.message_buffer();

        while self.running.load(Ordering::SeqCst) {
            let raw = match self.queue.receive(&mut buf) {
                Ok(Some(raw)) => raw,
                Ok(None) => continue,
                Err(TransportError::MessageTooLarge { size, max }) => {
                    self.stats.received.fetch_add(1, Ordering::Relaxed);
                    self.stats.failed.fetch_add(1, Ordering::Relaxed);
                    warn!(queue = self.queue.name(), size, max, "dropping oversized message");
                    continue;
                }
                Err(err) => {
                    if self.running.load(Ordering::SeqCst) {
                        warn!(queue = self.queue.name(), error = %err, "queue receive failed");
                        std::thread::sleep(self.poll_interval);
                    }
                    continue;
                }
            };

            // Woken for shutdown.
            if !self.running.load(Ordering::SeqCst) {
                break;
            }

            self.stats.received.fetch_add(1, Ordering::Relaxed);
            let outcome = catch_unwind(AssertUnwindSafe(|| {
                self.handler.handle(&self.queue, raw, &self.context)
            }));
            match outcome {
                Ok(true) => {
                    self.stats.accepted.fetch_add(1, Ordering::Relaxed);
                }
                Ok(false) => {
                    self.stats.rejected.fetch_add(1, Ordering::Relaxed);
                    debug!(queue = self.queue.name(), len = raw.len(), "message rejected");
                }
                Err(_) => {
                    self.stats.failed.fetch_add(1, Ordering::Relaxed);
                    warn!(queue = self.queue.name(), "frame handler panicked");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use agentcarrier_frame::{encode, FrameKind};
    use agentcarrier_transport::LocalQueueSender;

    use super::*;
    use crate::handler::DefaultHandler;
    use crate::inbox::Inbox;

    fn unique_queue(tag: &str) -> String {
        std::env::temp_dir()
            .join(format!(
                "acs-{tag}-{}-{}.mq",
                std::process::id(),
                std::time::SystemTime::now()
                    .duration_since(std::time::UNIX_EPOCH)
                    .expect("time should be after epoch")
                    .as_nanos()
            ))
            .to_string_lossy()
            .into_owned()
    }

    fn wait_until(mut done: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if done() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        done()
    }

    fn fast_config(workers: usize) -> ServerConfig {
        ServerConfig {
            workers,
            capacity: 4096,
            poll_interval: Duration::from_millis(20),
        }
    }

    #[test]
    fn start_and_stop_release_the_queue() {
        let queue = unique_queue("lifecycle");
        let mut server =
            ReceptionServer::new(&queue, DefaultHandler, Arc::new(Inbox::new()), SecurityLevel::Admin)
                .with_config(fast_config(2));

        assert!(!server.is_running());
        server.start().unwrap();
        assert!(server.is_running());
        let path = server.queue_path().unwrap();
        assert!(path.exists());

        let err = server.start().unwrap_err();
        assert!(matches!(err, DeliveryError::AlreadyRunning(_)));

        server.stop();
        assert!(!server.is_running());
        assert!(!path.exists(), "queue socket should be removed on stop");

        // Idempotent, and restartable.
        server.stop();
        server.start().unwrap();
        assert!(path.exists());
        drop(server);
        assert!(!path.exists(), "queue socket should be removed on drop");
    }

    #[test]
    fn counts_accepted_and_rejected() {
        let queue = unique_queue("counts");
        let inbox = Arc::new(Inbox::new());
        let mut server =
            ReceptionServer::new(&queue, DefaultHandler, Arc::clone(&inbox), SecurityLevel::Admin)
                .with_config(fast_config(2));
        server.start().unwrap();

        let mut sender = LocalQueueSender::open(&queue).unwrap();
        sender
            .send(&encode("x", 0, FrameKind::Log, b"ok").unwrap())
            .unwrap();
        sender.send(b"not a frame").unwrap();

        assert!(wait_until(|| server.stats().received == 2));
        assert!(wait_until(|| {
            let stats = server.stats();
            stats.accepted + stats.rejected == 2
        }));
        let stats = server.stats();
        assert_eq!(stats.accepted, 1);
        assert_eq!(stats.rejected, 1);
        assert_eq!(inbox.logs(), vec!["ok".to_string()]);
    }

    #[test]
    fn handler_panic_is_isolated() {
        let queue = unique_queue("panic");
        let handler = |_: &LocalQueueReceiver, raw: &[u8], _: &()| -> bool {
            if raw == b"boom" {
                panic!("handler exploded");
            }
            true
        };
        let mut server = ReceptionServer::new(&queue, handler, Arc::new(()), SecurityLevel::Admin)
            .with_config(fast_config(1));
        server.start().unwrap();

        let mut sender = LocalQueueSender::open(&queue).unwrap();
        sender.send(b"boom").unwrap();
        sender.send(b"fine").unwrap();

        assert!(wait_until(|| server.stats().accepted == 1));
        let stats = server.stats();
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.received, 2);

        let path = server.queue_path().unwrap();
        server.stop();
        assert!(!path.exists());
    }

    #[test]
    fn oversized_messages_are_counted_as_failed() {
        let queue = unique_queue("oversize");
        let mut server = ReceptionServer::new(
            &queue,
            |_: &LocalQueueReceiver, _: &[u8], _: &()| true,
            Arc::new(()),
            SecurityLevel::Admin,
        )
        .with_config(ServerConfig {
            capacity: 16,
            ..fast_config(1)
        });
        server.start().unwrap();

        let mut sender = LocalQueueSender::open(&queue).unwrap();
        sender.send(&[0u8; 64]).unwrap();
        sender.send(&[0u8; 8]).unwrap();

        assert!(wait_until(|| server.stats().accepted == 1));
        assert_eq!(server.stats().failed, 1);
    }

    #[test]
    fn second_server_on_live_queue_fails_to_start() {
        let queue = unique_queue("shared");
        let inbox = Arc::new(Inbox::new());
        let mut first =
            ReceptionServer::new(&queue, DefaultHandler, Arc::clone(&inbox), SecurityLevel::Admin)
                .with_config(fast_config(1));
        first.start().unwrap();

        let mut second =
            ReceptionServer::new(&queue, DefaultHandler, Arc::new(Inbox::new()), SecurityLevel::Admin)
                .with_config(fast_config(1));
        let err = second.start().unwrap_err();
        assert!(matches!(err, DeliveryError::Transport(TransportError::Bind { .. })));
        assert!(!second.is_running());

        let mut sender = LocalQueueSender::open(&queue).unwrap();
        sender
            .send(&encode("x", 0, FrameKind::Log, b"still here").unwrap())
            .unwrap();
        assert!(wait_until(|| inbox.logs().len() == 1));
    }

    #[test]
    fn invalid_address_fails_start() {
        let mut server = ReceptionServer::new(
            "not/a valid name",
            DefaultHandler,
            Arc::new(Inbox::new()),
            SecurityLevel::Admin,
        );
        let err = server.start().unwrap_err();
        assert!(matches!(err, DeliveryError::Transport(ref e) if e.is_parse()));
        assert!(!server.is_running());
    }

    #[test]
    fn stats_snapshot_serializes() {
        let snapshot = StatsSnapshot {
            received: 3,
            accepted: 2,
            rejected: 1,
            failed: 0,
        };
        let json = serde_json::to_value(snapshot).unwrap();
        assert_eq!(json["received"], 3);
        assert_eq!(json["rejected"], 1);
    }
}
