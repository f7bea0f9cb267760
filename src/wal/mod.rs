//! WAL-Manager (§4.2): a process-wide registry mapping a storage-group
//! identifier to an exclusive log node, with bounded buffer admission
//! and a background force-sync sweep.
//!
//! Grounded on the teacher's `common::concurrent_map` DashMap
//! insert-if-absent idiom, `transaction::wal_manager`'s registry shape,
//! and `io::buffer_pool`'s supplier/sink split.

mod node;

pub use node::{LogNode, LogNodeState};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use once_cell::sync::OnceCell;

use crate::common::CancelToken;
use crate::error::{DbError, Result};

/// A caller-supplied source of byte buffers (§6 BufferPool). Must not
/// block; returns `None` to mean "unavailable right now."
pub trait BufferSupplier: Send + Sync {
    fn try_acquire(&self, count: usize) -> Option<Vec<Vec<u8>>>;
}

/// A caller-supplied sink that reclaims buffers released by a deleted
/// or closed node.
pub trait BufferSink: Send + Sync {
    fn release(&self, buffers: Vec<Vec<u8>>);
}

#[derive(Debug, Clone)]
pub struct WalConfig {
    pub enable_wal: bool,
    pub force_wal_period: Duration,
    pub register_buffer_sleep_interval: Duration,
    pub register_buffer_reject_threshold: Duration,
}

impl Default for WalConfig {
    fn default() -> Self {
        Self {
            enable_wal: true,
            force_wal_period: Duration::from_secs(10),
            register_buffer_sleep_interval: Duration::from_millis(10),
            register_buffer_reject_threshold: Duration::from_millis(3000),
        }
    }
}

/// The process-wide WAL-Manager (§4.2, §9 "modelled as an explicit
/// service object with start/stop"). Construction is cheap and
/// side-effect free; `start()` is what spawns the force-sync thread.
pub struct WalManager {
    config: WalConfig,
    registry: DashMap<String, Arc<LogNode>>,
    cancel: CancelToken,
    running: AtomicBool,
    read_only: AtomicBool,
    /// Tracks whether we've already logged the current read-only span,
    /// so `forceTask` logs the transition exactly once (§4.2, §8
    /// boundary behavior).
    logged_read_only: AtomicBool,
    worker: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

static INSTANCE: OnceCell<Arc<WalManager>> = OnceCell::new();

impl WalManager {
    pub fn new(config: WalConfig) -> Arc<Self> {
        Arc::new(Self {
            config,
            registry: DashMap::new(),
            cancel: CancelToken::new(),
            running: AtomicBool::new(false),
            read_only: AtomicBool::new(false),
            logged_read_only: AtomicBool::new(false),
            worker: parking_lot::Mutex::new(None),
        })
    }

    /// The lazily-constructed, thread-safe process-wide instance (§4.2
    /// "Singleton lifecycle"). Later calls ignore `config` once the cell
    /// is populated.
    pub fn global(config: WalConfig) -> Arc<Self> {
        INSTANCE.get_or_init(|| Self::new(config)).clone()
    }

    pub fn set_read_only(&self, read_only: bool) {
        let was = self.read_only.swap(read_only, Ordering::SeqCst);
        if was != read_only {
            self.logged_read_only.store(false, Ordering::SeqCst);
        }
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only.load(Ordering::SeqCst)
    }

    // ---- registry operations (§4.2 "Operations") ----

    /// Return the registered node for `identifier`, creating and
    /// registering one if absent. Races to create are resolved by
    /// keeping whichever insertion the registry accepted first; the
    /// loser's local node is simply dropped.
    pub fn get_node(
        &self,
        identifier: &str,
        buffer_count: usize,
        supplier: &dyn BufferSupplier,
    ) -> Result<Arc<LogNode>> {
        if let Some(existing) = self.registry.get(identifier) {
            return Ok(Arc::clone(existing.value()));
        }

        // Insert-if-absent: whichever caller's Arc the shard accepts first
        // wins; a losing concurrent creator's local node is just dropped.
        let node = Arc::clone(
            self.registry
                .entry(identifier.to_string())
                .or_insert_with(|| Arc::new(LogNode::new(identifier.to_string())))
                .value(),
        );

        if node.is_registered() {
            return Ok(node);
        }

        match self.admit_buffers(identifier, buffer_count, supplier) {
            Ok(buffers) => {
                node.attach(buffers);
                Ok(node)
            }
            Err(err) => {
                self.registry.remove(identifier);
                Err(err)
            }
        }
    }

    fn admit_buffers(
        &self,
        identifier: &str,
        buffer_count: usize,
        supplier: &dyn BufferSupplier,
    ) -> Result<Vec<Vec<u8>>> {
        let start = Instant::now();
        let mut logged_failure = false;

        loop {
            if let Some(buffers) = supplier.try_acquire(buffer_count) {
                return Ok(buffers);
            }

            if !logged_failure {
                tracing::warn!(identifier, "WAL buffer admission stalled, retrying");
                logged_failure = true;
            }

            if start.elapsed() >= self.config.register_buffer_reject_threshold {
                tracing::error!(identifier, "WAL buffer admission exhausted reject threshold");
                return Err(DbError::BufferExhausted(identifier.to_string()));
            }

            // Interrupted here: no buffers have been attached to the node yet
            // (attach() only runs after admit_buffers succeeds), so there is
            // nothing to return to the pool — the caller's registry.remove
            // alone satisfies "no entry for the rejected id" (§8).
            if let Err(err) = self.cancel.sleep(self.config.register_buffer_sleep_interval) {
                return Err(err);
            }
        }
    }

    /// Atomically remove `identifier`; if present, release its buffers
    /// to `sink`. Idempotent on absent identifiers.
    pub fn delete_node(&self, identifier: &str, sink: &dyn BufferSink) {
        if let Some((_, node)) = self.registry.remove(identifier) {
            let buffers = node.delete();
            if !buffers.is_empty() {
                sink.release(buffers);
            }
        }
    }

    pub fn node_count(&self) -> usize {
        self.registry.len()
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.registry.contains_key(identifier)
    }

    /// Iterate all registered nodes, closing each and releasing its
    /// buffers regardless of per-node errors; clear the registry.
    pub fn close(&self, sink: &dyn BufferSink) {
        let ids: Vec<String> = self.registry.iter().map(|e| e.key().clone()).collect();
        for id in ids {
            if let Some((_, node)) = self.registry.remove(&id) {
                let buffers = node.close();
                if !buffers.is_empty() {
                    sink.release(buffers);
                }
            }
        }
    }

    // ---- lifecycle ----

    /// If WAL is disabled, a no-op. Otherwise spawns the force-sync
    /// thread.
    pub fn start(self: &Arc<Self>, sink: Arc<dyn BufferSink>) {
        if !self.config.enable_wal {
            return;
        }
        self.running.store(true, Ordering::SeqCst);
        let manager = Arc::clone(self);
        let handle = std::thread::spawn(move || manager.force_loop(sink));
        *self.worker.lock() = Some(handle);
    }

    fn force_loop(self: Arc<Self>, sink: Arc<dyn BufferSink>) {
        while self.running.load(Ordering::SeqCst) {
            if self.cancel.sleep(self.config.force_wal_period).is_err() {
                break;
            }
            self.force_task();
        }
        self.close(sink.as_ref());
    }

    /// Skip while in read-only mode (logging the transition exactly
    /// once); otherwise force-sync every node, logging per-node IO
    /// errors without aborting the sweep.
    fn force_task(&self) {
        if self.is_read_only() {
            if !self.logged_read_only.swap(true, Ordering::SeqCst) {
                tracing::info!("WAL force-sync skipped: system entered read-only mode");
            }
            return;
        }

        for entry in self.registry.iter() {
            if let Err(err) = entry.value().force_sync() {
                tracing::error!(identifier = %entry.key(), error = %err, "WAL force-sync failed");
            }
        }
    }

    /// Shut down the scheduler with a bounded grace period, then
    /// `close()`. Cancelling wakes the force-sync sleep immediately, so
    /// the join below only blocks for an in-flight sweep, never the
    /// full 30s grace window the spec allows.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.cancel.cancel();
        if let Some(handle) = self.worker.lock().take() {
            let _ = handle.join();
        }
    }
}
