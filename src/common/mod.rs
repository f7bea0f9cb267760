//! Shared types used across the consensus, WAL, and TV-store modules.

use crate::error::{DbError, Result};
use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// A cluster member's network identity, as carried on the wire in
/// heartbeats and vote requests (§3, §6 `Node` schema).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeAddr {
    pub host: String,
    pub port: u16,
    /// Cluster-assigned identifier; unset until the node has been told
    /// its id by a leader.
    pub identifier: Option<i32>,
}

impl NodeAddr {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            identifier: None,
        }
    }

    pub fn with_identifier(mut self, identifier: i32) -> Self {
        self.identifier = Some(identifier);
        self
    }
}

impl fmt::Display for NodeAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.identifier {
            Some(id) => write!(f, "{}:{}#{}", self.host, self.port, id),
            None => write!(f, "{}:{}", self.host, self.port),
        }
    }
}

/// Cooperative cancellation for every sleep/wait in the consensus loop
/// and the WAL admission backoff (§5: "every blocking wait must be
/// interruptible; interruption ... exits the current loop iteration
/// cleanly").
///
/// A real interrupt (as in a JVM's `Thread.interrupt`) has no direct
/// analogue on a plain `std::thread`; we model it as a shared flag plus
/// condition variable that every sleep waits on, so cancelling wakes
/// every waiter immediately instead of after its full timeout.
#[derive(Clone)]
pub struct CancelToken {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self {
            inner: Arc::new((Mutex::new(false), Condvar::new())),
        }
    }

    pub fn cancel(&self) {
        let (lock, cvar) = &*self.inner;
        *lock.lock() = true;
        cvar.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        *self.inner.0.lock()
    }

    /// Sleep for `dur`, waking early if cancelled. Returns
    /// `Err(Interrupted)` if the token was already cancelled or was
    /// cancelled during the sleep; restores no state (the caller is
    /// expected to exit its loop iteration on `Err`).
    pub fn sleep(&self, dur: Duration) -> Result<()> {
        let (lock, cvar) = &*self.inner;
        let mut cancelled = lock.lock();
        if *cancelled {
            return Err(DbError::Interrupted);
        }
        cvar.wait_for(&mut cancelled, dur);
        if *cancelled {
            Err(DbError::Interrupted)
        } else {
            Ok(())
        }
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}
