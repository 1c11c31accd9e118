//! # Summary
//!
//! This module defines the `Replica` actor: it owns all protocol state and
//! processes one inbound message at a time, run to completion. It performs
//! no I/O itself. Every call to [`Replica::handle`] returns the messages the
//! caller should put on the wire.
//!
//! The handlers for each protocol role live under `crate::handler`.

use std::net::SocketAddr;

use hashbrown::HashSet as Set;

use crate::message::{Decree, Message, NewLeaderToClient};
use crate::round::{self, ProposalNumber};
use crate::state::{Leadership, State};
use crate::storage::Snapshot;

/// Where an outbound message should go.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Destination {
    /// A single replica, possibly the sender itself
    Replica(usize),

    /// Every replica except the sender
    Peers,

    /// Every replica including the sender
    All,

    /// A client's return address
    Client(SocketAddr),
}

/// Outbound message and its destination.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Envelope {
    pub to: Destination,
    pub message: Message,
}

/// Single Multi-Paxos participant: acceptor, learner, and leader for the
/// rounds it owns.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct Replica {
    /// Unique replica ID
    pub(crate) id: usize,

    /// Total number of replicas
    pub(crate) count: usize,

    /// Votes needed to learn or establish
    pub(crate) majority: usize,

    /// Slots this replica never fills with fresh client values
    pub(crate) skip: Set<usize>,

    pub(crate) state: State,

    #[derivative(Debug = "ignore")]
    outbox: Vec<Envelope>,
}

impl Replica {
    pub fn new(id: usize, count: usize) -> Self {
        assert!(id < count, "[INTERNAL ERROR]: replica {} outside cluster of {}", id, count);
        Replica {
            id,
            count,
            majority: round::majority(count),
            skip: Set::default(),
            state: State::default(),
            outbox: Vec::new(),
        }
    }

    /// Never originate fresh client values in `slots` while leading.
    pub fn with_skipped_slots<I>(mut self, slots: I) -> Self
        where I: IntoIterator<Item = usize>
    {
        self.skip.extend(slots);
        self
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    /// Leadership is derived from the highest proposal seen.
    pub fn is_leader(&self) -> bool {
        round::leader_of(self.state.leader_proposal) == self.id
    }

    /// Learned decree for `slot`, if any.
    pub fn learned(&self, slot: usize) -> Option<&Decree> {
        self.state.log.learned(slot).map(|pvalue| &pvalue.decree)
    }

    /// Learned log for offline inspection.
    pub fn snapshot(&self) -> Snapshot {
        let mut duplicates = self.state.duplicates.iter().cloned().collect::<Vec<_>>();
        duplicates.sort();
        Snapshot {
            id: self.id,
            leader_proposal: self.state.leader_proposal,
            first_unchosen: self.state.log.first_unchosen(),
            learned: self.state.log.learned_iter().cloned().collect(),
            duplicates,
        }
    }

    /// Kicks off the initial leader's first prepare round.
    pub fn start(&mut self) -> Vec<Envelope> {
        if self.is_leader() {
            info!("replica {} leading {} at startup", self.id, self.state.leader_proposal);
            self.begin_prepare();
        }
        std::mem::replace(&mut self.outbox, Vec::new())
    }

    /// Processes one inbound message to completion.
    pub fn handle(&mut self, message: Message) -> Vec<Envelope> {
        trace!("replica {} received {:?}", self.id, message);
        match message {
        | Message::Prepare(m) => self.respond_prepare(m),
        | Message::AckPrepare(m) => self.respond_ack_prepare(m),
        | Message::Propose(m) => self.respond_propose(m),
        | Message::Accept(m) => self.respond_accept(m),
        | Message::ClientRequest(m) => self.respond_request(m),
        | Message::ClientTimeout(m) => self.respond_timeout(m),
        | Message::HelpMeChoose(m) => self.respond_help(m),
        | Message::YouCanChoose(m) => self.respond_choose(m),
        | Message::AckClient(m) => warn!("replica {} dropping client-bound {:?}", self.id, m),
        | Message::NewLeaderToClient(m) => warn!("replica {} dropping client-bound {:?}", self.id, m),
        }
        self.drain();
        std::mem::replace(&mut self.outbox, Vec::new())
    }

    pub(crate) fn send(&mut self, to: Destination, message: Message) {
        trace!("replica {} sending {:?} to {:?}", self.id, message, to);
        self.outbox.push(Envelope { to, message });
    }

    /// Raises the local belief to `proposal`. Returns true if it was newer.
    /// A replica that was leading steps down.
    pub(crate) fn adopt(&mut self, proposal: ProposalNumber) -> bool {
        if proposal <= self.state.leader_proposal {
            return false
        }
        let was_leader = self.is_leader();
        debug!("replica {} adopting {} over {}", self.id, proposal, self.state.leader_proposal);
        self.state.leader_proposal = proposal;
        if was_leader {
            self.step_down();
        }
        true
    }

    /// Abandons every piece of leader-only bookkeeping. Queued clients are
    /// pointed at the new proposal number so they can retry there.
    fn step_down(&mut self) {
        let leadership = std::mem::replace(&mut self.state.leadership, Leadership::default());
        info!(
            "replica {} superseded by {}, abandoning {} pending requests",
            self.id,
            self.state.leader_proposal,
            leadership.pending.len(),
        );
        let proposal = self.state.leader_proposal;
        for decree in leadership.pending {
            self.send(
                Destination::Client(decree.client),
                Message::NewLeaderToClient(NewLeaderToClient { proposal }),
            );
        }
    }
}
