//! External collaborator contracts (§6) the consensus driver consumes.
//!
//! None of these are implemented here — a production embedding supplies
//! real ones (a monotonic clock, an async RPC client, a log reader over
//! the actual replicated log). Tests supply fakes. Keeping them as
//! trait objects is how the teacher's `clustering::raft::RaftNode`
//! keeps the state machine itself free of IO.

use super::messages::{Heartbeat, HeartbeatAck, Term, VoteRequest, VoteResponse};
use crate::common::NodeAddr;
use crate::error::Result;
use std::time::Instant;

/// Monotonic millisecond source for timeouts; also the source of
/// `Instant::now()` used for `lastHeartbeatReceivedTime` bookkeeping.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// The default collaborator: the operating system's monotonic clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Invoked once, from a transport-owned thread, with the RPC's outcome.
pub type HeartbeatHandler = Box<dyn FnOnce(Result<HeartbeatAck>) + Send>;
pub type VoteHandler = Box<dyn FnOnce(Result<VoteResponse>) + Send>;

/// Asynchronous RPC client per peer (§6 Transport). `send_heartbeat` and
/// `start_election` must not block the caller — a real implementation
/// enqueues the request and invokes `handler` later from its own worker
/// thread, exactly once, with either the peer's reply or a
/// [`crate::error::DbError::TransportFailure`].
pub trait Transport: Send + Sync {
    fn send_heartbeat(&self, target: &NodeAddr, request: Heartbeat, handler: HeartbeatHandler);
    fn start_election(&self, target: &NodeAddr, request: VoteRequest, handler: VoteHandler);
}

/// Read-only view onto the replicated log (§6 LogManager). The
/// consensus driver treats log contents as opaque and only ever reads
/// these three coordinates.
pub trait LogManager: Send + Sync {
    fn last_log_index(&self) -> u64;
    fn last_log_term(&self) -> Term;
    fn commit_log_index(&self) -> u64;
}
