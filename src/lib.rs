//! tsdb-core: the durability and replication spine of a distributed
//! time-series database — leader election and heartbeats, WAL node
//! registration with bounded buffer admission, and an in-memory
//! aligned columnar row store.

pub mod common;
pub mod consensus;
pub mod error;
pub mod tvstore;
pub mod wal;

pub use error::{DbError, Result};

use std::time::Duration;

/// Top-level configuration recognized across the three components
/// (§6 "Configuration").
#[derive(Debug, Clone)]
pub struct Config {
    pub enable_wal: bool,
    pub force_wal_period: Duration,
    pub register_buffer_sleep_interval: Duration,
    pub register_buffer_reject_threshold: Duration,
    pub connection_timeout: Duration,
    pub heartbeat_interval: Duration,
    pub election_backoff_min: Duration,
    pub election_backoff_jitter: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            enable_wal: true,
            force_wal_period: Duration::from_secs(10),
            register_buffer_sleep_interval: Duration::from_millis(10),
            register_buffer_reject_threshold: Duration::from_millis(3000),
            connection_timeout: Duration::from_millis(3000),
            heartbeat_interval: Duration::from_millis(1000),
            election_backoff_min: Duration::from_secs(5),
            election_backoff_jitter: Duration::from_secs(5),
        }
    }
}

impl Config {
    pub fn wal_config(&self) -> wal::WalConfig {
        wal::WalConfig {
            enable_wal: self.enable_wal,
            force_wal_period: self.force_wal_period,
            register_buffer_sleep_interval: self.register_buffer_sleep_interval,
            register_buffer_reject_threshold: self.register_buffer_reject_threshold,
        }
    }

    pub fn consensus_config(&self) -> consensus::ConsensusConfig {
        consensus::ConsensusConfig {
            heartbeat_interval: self.heartbeat_interval,
            connection_timeout: self.connection_timeout,
            election_backoff_min: self.election_backoff_min,
            election_backoff_jitter: self.election_backoff_jitter,
        }
    }
}
