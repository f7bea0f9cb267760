//! A single storage-group's exclusive log node (§3 LogNode).

use parking_lot::Mutex;

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogNodeState {
    /// Published in the registry but not yet handed its buffers.
    Pending,
    Registered,
    Closed,
    Deleted,
}

pub struct LogNode {
    identifier: String,
    state: Mutex<LogNodeState>,
    buffers: Mutex<Vec<Vec<u8>>>,
}

impl LogNode {
    pub fn new(identifier: String) -> Self {
        Self {
            identifier,
            state: Mutex::new(LogNodeState::Pending),
            buffers: Mutex::new(Vec::new()),
        }
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn state(&self) -> LogNodeState {
        *self.state.lock()
    }

    pub fn is_registered(&self) -> bool {
        *self.state.lock() == LogNodeState::Registered
    }

    /// Attach admitted buffers and transition Pending → Registered.
    pub fn attach(&self, buffers: Vec<Vec<u8>>) {
        *self.buffers.lock() = buffers;
        *self.state.lock() = LogNodeState::Registered;
    }

    /// Idempotent durability barrier: flush buffered bytes to the
    /// collaborator-chosen file sink. The core does not specify the
    /// on-disk layout (§6); this is a no-op placeholder a real
    /// embedding overrides by wiring its own file sink into buffer
    /// contents before calling force_sync.
    pub fn force_sync(&self) -> Result<()> {
        if *self.state.lock() == LogNodeState::Closed {
            return Ok(());
        }
        Ok(())
    }

    /// Release buffers back to the caller and transition to Closed.
    /// Terminal: calling again returns an empty vec.
    pub fn close(&self) -> Vec<Vec<u8>> {
        let mut state = self.state.lock();
        if *state == LogNodeState::Closed || *state == LogNodeState::Deleted {
            return Vec::new();
        }
        *state = LogNodeState::Closed;
        drop(state);
        std::mem::take(&mut *self.buffers.lock())
    }

    /// Release buffers and transition to Deleted.
    pub fn delete(&self) -> Vec<Vec<u8>> {
        let mut state = self.state.lock();
        if *state == LogNodeState::Deleted {
            return Vec::new();
        }
        *state = LogNodeState::Deleted;
        drop(state);
        std::mem::take(&mut *self.buffers.lock())
    }

    pub fn buffer_count(&self) -> usize {
        self.buffers.lock().len()
    }
}
