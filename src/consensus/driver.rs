//! The consensus driver: a node-local control loop that drives the
//! local node's role through {Leader, Follower, Elector} (§4.3).
//!
//! Modelled on the teacher's `clustering::raft::RaftNode` — a plain
//! synchronous state machine guarded by `parking_lot` locks, with IO
//! pushed out to collaborator traits — generalized to the explicit
//! threaded loop and randomized-backoff election this spec calls for.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, RwLock};
use rand::Rng;

use crate::common::{CancelToken, NodeAddr};
use crate::error::{DbError, Result};

use super::collaborators::{Clock, LogManager, SystemClock, Transport};
use super::messages::{Heartbeat, HeartbeatAck, Term, VoteRequest, VoteResponse};

/// The local node's current role (§3 Role).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Leader,
    Follower,
    Elector,
}

/// Tunables named directly after §6's Configuration section.
#[derive(Debug, Clone)]
pub struct ConsensusConfig {
    pub heartbeat_interval: Duration,
    pub connection_timeout: Duration,
    /// `ElectionLeast` — the fixed floor of the randomized election backoff.
    pub election_backoff_min: Duration,
    /// `ElectionRandom` — width of the `[0, ElectionRandom)` jitter added to the floor.
    pub election_backoff_jitter: Duration,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_millis(1000),
            connection_timeout: Duration::from_millis(3000),
            election_backoff_min: Duration::from_secs(5),
            election_backoff_jitter: Duration::from_secs(5),
        }
    }
}

/// Per-peer bookkeeping the leader loop consults before each heartbeat
/// (§4.3 "Leader loop"). Lives only on the leader; followers don't track it.
#[derive(Debug, Clone)]
struct PeerAux {
    addr: NodeAddr,
    /// "has not yet received the full cluster membership list" (§3).
    blind: bool,
    identifier_conflict: bool,
}

/// Shared state guarded by the single term lock (§3 Term, §5 Ordering
/// guarantees: "all mutations of term ... are serialized under the term lock").
struct TermState {
    term: Term,
    /// `None` outside of an in-flight election round.
    election: Option<ElectionRound>,
    /// Last term this node granted a vote in, and the term voted-for
    /// (duplicate votes within a term are idempotent; §6's
    /// `ElectionRequest` carries no candidate id, so this is the whole
    /// of what a voter can track).
    voted_in_term: Option<Term>,
}

struct ElectionRound {
    round_term: Term,
    terminated: bool,
    valid: bool,
    quorum_remaining: i64,
}

pub struct ConsensusDriver {
    config: ConsensusConfig,
    local: RwLock<NodeAddr>,
    peers: RwLock<Vec<PeerAux>>,
    role: RwLock<Role>,
    term_state: Mutex<TermState>,
    term_cv: Condvar,
    current_leader: RwLock<Option<NodeAddr>>,
    last_heartbeat_received: Mutex<Instant>,
    transport: Arc<dyn Transport>,
    log: Arc<dyn LogManager>,
    clock: Arc<dyn Clock>,
    cancel: CancelToken,
    running: AtomicBool,
}

impl ConsensusDriver {
    pub fn new(
        local: NodeAddr,
        peers: Vec<NodeAddr>,
        config: ConsensusConfig,
        transport: Arc<dyn Transport>,
        log: Arc<dyn LogManager>,
    ) -> Arc<Self> {
        Self::with_clock(local, peers, config, transport, log, Arc::new(SystemClock))
    }

    pub fn with_clock(
        local: NodeAddr,
        peers: Vec<NodeAddr>,
        config: ConsensusConfig,
        transport: Arc<dyn Transport>,
        log: Arc<dyn LogManager>,
        clock: Arc<dyn Clock>,
    ) -> Arc<Self> {
        let now = clock.now();
        Arc::new(Self {
            config,
            local: RwLock::new(local),
            peers: RwLock::new(
                peers
                    .into_iter()
                    .map(|addr| PeerAux {
                        addr,
                        blind: true,
                        identifier_conflict: false,
                    })
                    .collect(),
            ),
            role: RwLock::new(Role::Elector),
            term_state: Mutex::new(TermState {
                term: 0,
                election: None,
                voted_in_term: None,
            }),
            term_cv: Condvar::new(),
            current_leader: RwLock::new(None),
            last_heartbeat_received: Mutex::new(now),
            transport,
            log,
            clock,
            cancel: CancelToken::new(),
            running: AtomicBool::new(false),
        })
    }

    // ---- queries (§6 "Consensus query") ----

    pub fn role(&self) -> Role {
        *self.role.read()
    }

    pub fn current_term(&self) -> Term {
        self.term_state.lock().term
    }

    pub fn current_leader(&self) -> Option<NodeAddr> {
        self.current_leader.read().clone()
    }

    pub fn local_addr(&self) -> NodeAddr {
        self.local.read().clone()
    }

    // ---- lifecycle ----

    /// Spawn the single long-lived consensus thread (§5: "the consensus
    /// loop" is one of three long-lived worker threads per node).
    pub fn start(self: &Arc<Self>) -> JoinHandle<()> {
        self.running.store(true, Ordering::SeqCst);
        let driver = Arc::clone(self);
        std::thread::spawn(move || driver.run())
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.cancel.cancel();
    }

    fn run(self: Arc<Self>) {
        while self.running.load(Ordering::SeqCst) {
            let result = match self.role() {
                Role::Leader => self.leader_tick(),
                Role::Follower => self.follower_tick(),
                Role::Elector => self.elector_tick(),
            };
            if let Err(DbError::Interrupted) = result {
                break;
            }
        }
    }

    // ---- role transitions ----

    fn set_role(&self, new_role: Role) {
        let mut guard = self.role.write();
        let old_role = *guard;
        if old_role == new_role {
            return;
        }
        *guard = new_role;
        if old_role == Role::Elector {
            // "On exit from the Elector state, reset lastHeartbeatReceivedTime
            // to now (prevents immediate re-election flap)."
            *self.last_heartbeat_received.lock() = self.clock.now();
        }
        tracing::info!(node = %self.local_addr(), from = ?old_role, to = ?new_role, "role transition");
    }

    fn become_follower(&self, leader: Option<NodeAddr>) {
        *self.current_leader.write() = leader;
        self.set_role(Role::Follower);
    }

    fn become_elector(&self) {
        *self.current_leader.write() = None;
        self.set_role(Role::Elector);
    }

    fn become_leader(&self) {
        let me = self.local_addr();
        *self.current_leader.write() = Some(me.clone());
        self.set_role(Role::Leader);
        tracing::info!(node = %me, term = self.current_term(), "became leader");
    }

    /// Any reply (heartbeat ack or vote response) reporting a higher
    /// term forces a step-down, regardless of current role (§4.3 "Leader
    /// → Follower: Observed higher term in any reply").
    fn observe_term(&self, observed: Term) -> bool {
        let mut guard = self.term_state.lock();
        if observed > guard.term {
            guard.term = observed;
            guard.election = None;
            drop(guard);
            self.become_follower(None);
            true
        } else {
            false
        }
    }

    // ---- inbound RPC handlers (exposed to the transport collaborator) ----

    /// Handle an incoming heartbeat from the current (or a new) leader.
    pub fn on_heartbeat(&self, req: Heartbeat) -> HeartbeatAck {
        if self.observe_term(req.term) {
            // stepped down; term_state now reflects req.term
        }
        let current_term = self.current_term();
        if req.term < current_term {
            return HeartbeatAck {
                term: current_term,
                success: false,
            };
        }

        *self.last_heartbeat_received.lock() = self.clock.now();
        self.become_follower(Some(req.leader));

        HeartbeatAck {
            term: self.current_term(),
            success: true,
        }
    }

    /// Handle an incoming vote request (§4.3 "Tie-breaking and safety").
    pub fn on_vote_request(&self, req: VoteRequest) -> VoteResponse {
        self.observe_term(req.term);

        let mut guard = self.term_state.lock();
        if req.term < guard.term {
            return VoteResponse {
                term: guard.term,
                vote_granted: false,
            };
        }

        let log_ok = (req.last_log_term, req.last_log_index)
            >= (self.log.last_log_term(), self.log.last_log_index());

        // Strict `>`: a node that already voted (for itself or a peer) in
        // term T must not grant a second vote at T to a different
        // candidate — `ElectionRequest` carries no candidate id, so equality
        // can't be told apart from a rival's request and must be denied.
        let granted = log_ok
            && guard
                .voted_in_term
                .map_or(true, |voted| req.term > voted);

        if granted {
            guard.voted_in_term = Some(req.term);
        }

        VoteResponse {
            term: guard.term,
            vote_granted: granted,
        }
    }

    // ---- leader loop ----

    fn leader_tick(self: &Arc<Self>) -> Result<()> {
        let peers = self.peers.read().clone();
        let term = self.current_term();
        let commit_log_index = self.log.commit_log_index();
        let leader = self.local_addr();
        let all_identifiers_known = peers.iter().all(|p| p.addr.identifier.is_some());

        for peer in &peers {
            if self.role() != Role::Leader {
                // "If ... the local role is no longer Leader, abort the
                // remaining sends."
                break;
            }

            let mut request = Heartbeat {
                term,
                commit_log_index,
                leader: leader.clone(),
                require_identifier: false,
                regenerate_identifier: None,
                node_set: None,
            };

            if peer.addr.identifier.is_none() {
                request.require_identifier = true;
            }
            if peer.identifier_conflict {
                request.regenerate_identifier = Some(true);
            }
            if peer.blind && all_identifiers_known {
                request.node_set = Some(peers.iter().map(|p| p.addr.clone()).collect());
                self.clear_blind(&peer.addr);
            }

            let driver = Arc::clone(self);
            let target = peer.addr.clone();
            self.transport.send_heartbeat(
                &peer.addr,
                request,
                Box::new(move |result| driver.handle_heartbeat_ack(&target, result)),
            );
        }

        self.cancel.sleep(self.config.heartbeat_interval)
    }

    fn clear_blind(&self, addr: &NodeAddr) {
        let mut peers = self.peers.write();
        if let Some(peer) = peers.iter_mut().find(|p| &p.addr == addr) {
            peer.blind = false;
        }
    }

    fn handle_heartbeat_ack(&self, target: &NodeAddr, result: Result<HeartbeatAck>) {
        match result {
            Ok(ack) => {
                self.observe_term(ack.term);
            }
            Err(err) => {
                tracing::warn!(target = %target, error = %err, "heartbeat send failed");
            }
        }
    }

    // ---- follower loop ----

    fn follower_tick(&self) -> Result<()> {
        self.cancel.sleep(self.config.connection_timeout)?;
        let elapsed = self.last_heartbeat_received.lock().elapsed();
        if elapsed >= self.config.connection_timeout {
            self.become_elector();
        }
        Ok(())
    }

    // ---- elector loop ----

    fn elector_tick(self: &Arc<Self>) -> Result<()> {
        self.run_election_round()?;
        if self.role() == Role::Elector {
            let jitter_ms = self.config.election_backoff_jitter.as_millis().max(1) as u64;
            let jitter = Duration::from_millis(rand::rng().random_range(0..jitter_ms));
            self.cancel.sleep(self.config.election_backoff_min + jitter)?;
        }
        Ok(())
    }

    fn run_election_round(self: &Arc<Self>) -> Result<()> {
        let peers = self.peers.read().clone();
        let num_nodes = peers.len() + 1;
        let quorum_threshold = (num_nodes / 2) as i64;

        let request = {
            let mut guard = self.term_state.lock();
            guard.term += 1;
            let round_term = guard.term;
            guard.voted_in_term = Some(round_term); // voting for self
            let valid_immediately = quorum_threshold <= 0;
            guard.election = Some(ElectionRound {
                round_term,
                terminated: false,
                valid: valid_immediately,
                quorum_remaining: quorum_threshold,
            });
            VoteRequest {
                term: round_term,
                last_log_index: self.log.last_log_index(),
                last_log_term: self.log.last_log_term(),
            }
        };

        tracing::info!(node = %self.local_addr(), term = request.term, peers = peers.len(), "starting election");

        for peer in &peers {
            let driver = Arc::clone(self);
            let round_term = request.term;
            self.transport.start_election(
                &peer.addr,
                request.clone(),
                Box::new(move |result| driver.handle_vote_reply(round_term, result)),
            );
        }

        let won = {
            let mut guard = self.term_state.lock();
            if !guard
                .election
                .as_ref()
                .map_or(false, |e| e.valid || e.terminated)
            {
                self.term_cv
                    .wait_for(&mut guard, self.config.connection_timeout);
            }
            let current_term = guard.term;
            match guard.election.as_mut() {
                Some(election) if election.round_term == current_term => {
                    election.terminated = true;
                    election.valid
                }
                _ => false,
            }
        };

        if self.cancel.is_cancelled() {
            return Err(DbError::Interrupted);
        }

        if won {
            self.become_leader();
        }
        Ok(())
    }

    fn handle_vote_reply(&self, round_term: Term, result: Result<VoteResponse>) {
        let response = match result {
            Ok(r) => r,
            Err(err) => {
                tracing::warn!(error = %err, "vote request send failed");
                return;
            }
        };

        if self.observe_term(response.term) {
            return;
        }

        let mut guard = self.term_state.lock();
        let should_notify = match guard.election.as_mut() {
            Some(election) if election.round_term == round_term && !election.terminated => {
                if response.vote_granted {
                    election.quorum_remaining -= 1;
                    if election.quorum_remaining <= 0 {
                        election.valid = true;
                        true
                    } else {
                        false
                    }
                } else {
                    false
                }
            }
            _ => false,
        };
        drop(guard);
        if should_notify {
            self.term_cv.notify_all();
        }
    }
}
