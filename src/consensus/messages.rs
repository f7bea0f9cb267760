//! Wire-shaped request/response structs (§6 Request schemas).
//!
//! These are plain data; marshalling them onto an actual wire is an
//! external collaborator's job ([`super::collaborators::Transport`]), so
//! every field here is named for what it carries rather than reusing a
//! field across message kinds.

use crate::common::NodeAddr;
use serde::{Deserialize, Serialize};

pub type Term = u64;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Heartbeat {
    pub term: Term,
    pub commit_log_index: u64,
    pub leader: NodeAddr,
    /// Set when the leader does not yet know this target's cluster identifier.
    pub require_identifier: bool,
    /// Set when this target's identifier is known to conflict with another member.
    pub regenerate_identifier: Option<bool>,
    /// Present only when the target is blind and the leader knows every member's id.
    pub node_set: Option<Vec<NodeAddr>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatAck {
    pub term: Term,
    pub success: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteRequest {
    pub term: Term,
    pub last_log_index: u64,
    pub last_log_term: Term,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteResponse {
    pub term: Term,
    pub vote_granted: bool,
}
