//! WAL-Manager admission scenario (S4) and registry invariants.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tsdb_core::error::DbError;
use tsdb_core::wal::{BufferSink, BufferSupplier, WalConfig, WalManager};

struct AlwaysUnavailable;
impl BufferSupplier for AlwaysUnavailable {
    fn try_acquire(&self, _count: usize) -> Option<Vec<Vec<u8>>> {
        None
    }
}

struct AlwaysAvailable;
impl BufferSupplier for AlwaysAvailable {
    fn try_acquire(&self, count: usize) -> Option<Vec<Vec<u8>>> {
        Some((0..count).map(|_| Vec::new()).collect())
    }
}

struct CountingSink {
    released: AtomicUsize,
}
impl BufferSink for CountingSink {
    fn release(&self, buffers: Vec<Vec<u8>>) {
        self.released.fetch_add(buffers.len(), Ordering::SeqCst);
    }
}

#[test]
fn s4_wal_admission_rejection_then_clean_retry() {
    let manager = WalManager::new(WalConfig {
        enable_wal: true,
        force_wal_period: Duration::from_secs(60),
        register_buffer_sleep_interval: Duration::from_millis(10),
        register_buffer_reject_threshold: Duration::from_millis(30),
    });

    let started = std::time::Instant::now();
    let result = manager.get_node("g1", 4, &AlwaysUnavailable);
    assert!(started.elapsed() >= Duration::from_millis(30));
    match result {
        Err(DbError::BufferExhausted(id)) => assert_eq!(id, "g1"),
        other => panic!("expected BufferExhausted, got {other:?}"),
    }
    assert!(!manager.contains("g1"));

    let node = manager.get_node("g1", 4, &AlwaysAvailable).unwrap();
    assert!(node.is_registered());
    assert!(manager.contains("g1"));
}

#[test]
fn get_node_is_idempotent_for_an_already_registered_id() {
    let manager = WalManager::new(WalConfig::default());
    let first = manager.get_node("g2", 2, &AlwaysAvailable).unwrap();
    let second = manager.get_node("g2", 2, &AlwaysAvailable).unwrap();
    assert!(std::sync::Arc::ptr_eq(&first, &second));
    assert_eq!(manager.node_count(), 1);
}

#[test]
fn delete_node_releases_buffers_and_is_idempotent_on_absent_id() {
    let manager = WalManager::new(WalConfig::default());
    let sink = CountingSink {
        released: AtomicUsize::new(0),
    };
    manager.get_node("g3", 3, &AlwaysAvailable).unwrap();
    manager.delete_node("g3", &sink);
    assert!(!manager.contains("g3"));
    assert_eq!(sink.released.load(Ordering::SeqCst), 3);

    // idempotent: deleting again is a no-op, not an error
    manager.delete_node("g3", &sink);
    assert_eq!(sink.released.load(Ordering::SeqCst), 3);
}

#[test]
fn close_releases_every_node_and_clears_registry() {
    let manager = WalManager::new(WalConfig::default());
    let sink = CountingSink {
        released: AtomicUsize::new(0),
    };
    manager.get_node("a", 2, &AlwaysAvailable).unwrap();
    manager.get_node("b", 2, &AlwaysAvailable).unwrap();

    manager.close(&sink);

    assert_eq!(manager.node_count(), 0);
    assert_eq!(sink.released.load(Ordering::SeqCst), 4);
}

#[test]
fn read_only_mode_is_tracked_and_resets_the_log_once_flag() {
    let manager = WalManager::new(WalConfig::default());
    assert!(!manager.is_read_only());
    manager.set_read_only(true);
    assert!(manager.is_read_only());
    manager.set_read_only(false);
    assert!(!manager.is_read_only());
}
