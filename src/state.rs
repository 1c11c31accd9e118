//! # Summary
//!
//! This module defines the state owned by a single replica. It is mutated
//! only by the replica's own message handlers, one message at a time.

use std::collections::VecDeque;

use hashbrown::HashMap as Map;
use hashbrown::HashSet as Set;
use serde_derive::{Deserialize, Serialize};

use crate::message::{Decree, PValue, RequestId};
use crate::round::ProposalNumber;
use crate::slot::SlotLog;

/// Leader sub-state. Only meaningful while this replica owns the current
/// proposal number.
#[derive(Serialize, Deserialize)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Role {
    /// Collecting promises slot by slot, recovering earlier decrees
    Prepare,

    /// Promised by a majority; filling reserved holes with client values
    Established,

    /// No holes left; proposing into fresh slots
    Dictated,
}

impl Default for Role {
    fn default() -> Self {
        Role::Prepare
    }
}

/// Promises collected for the slot currently being prepared.
#[derive(Serialize, Deserialize)]
#[derive(Clone, Debug)]
pub struct Tally {
    pub slot: usize,

    /// Acceptors that promised
    acks: Set<usize>,

    /// Highest-numbered decree reported for `slot`
    best: Option<PValue>,

    /// Every promise so far reported nothing at or after `slot`
    no_more_accepted: bool,
}

/// Outcome of a prepare round for a single slot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Verdict {
    /// Some acceptor holds a decree that must be driven to learned
    Recover(PValue),

    /// Nothing accepted here but more further on
    Hole,

    /// Nothing accepted here or anywhere after
    Clear,
}

impl Tally {
    pub fn new(slot: usize) -> Self {
        Tally {
            slot,
            acks: Set::default(),
            best: None,
            no_more_accepted: true,
        }
    }

    /// Counts one promise. Returns true once `majority` distinct acceptors
    /// have promised; later calls keep returning false.
    pub fn record(
        &mut self,
        acceptor: usize,
        accepted: Option<PValue>,
        no_more_accepted: bool,
        majority: usize,
    ) -> bool {
        if self.acks.len() >= majority || !self.acks.insert(acceptor) {
            return false
        }
        if let Some(pvalue) = accepted {
            let newer = self.best
                .as_ref()
                .map_or(true, |best| pvalue.proposal > best.proposal);
            if newer {
                self.best = Some(pvalue);
            }
        }
        self.no_more_accepted &= no_more_accepted;
        self.acks.len() >= majority
    }

    pub fn verdict(self) -> Verdict {
        match self.best {
        | Some(pvalue) => Verdict::Recover(pvalue),
        | None if self.no_more_accepted => Verdict::Clear,
        | None => Verdict::Hole,
        }
    }
}

/// Bookkeeping that only exists while this replica leads. Discarded
/// wholesale when a newer proposal number shows up.
#[derive(Serialize, Deserialize)]
#[derive(Clone, Debug, Default)]
pub struct Leadership {
    pub role: Role,

    /// Promises for the slot being prepared
    pub tally: Option<Tally>,

    /// Holes reserved during `Prepare`, lowest first
    pub backlog: VecDeque<usize>,

    /// Decree proposed and not yet learned
    pub in_flight: Option<PValue>,

    /// Client requests not yet assigned a slot, in arrival order
    pub pending: VecDeque<Decree>,

    /// Queue ran dry while a slot was free
    pub waiting_for_client: bool,
}

impl Leadership {
    /// Whether `request` is already queued or being proposed.
    pub fn is_underway(&self, request: &RequestId) -> bool {
        self.pending.iter().any(|decree| decree.request == *request)
            || self.in_flight
                .as_ref()
                .map_or(false, |pvalue| pvalue.decree.request == *request)
    }
}

/// Everything one replica knows.
#[derive(Serialize, Deserialize)]
#[derive(Clone, Debug, Default)]
pub struct State {
    /// Highest proposal number seen; never decreases
    pub(crate) leader_proposal: ProposalNumber,

    /// Next slot to propose into while leading
    pub(crate) next_slot: usize,

    pub(crate) log: SlotLog,

    /// Every chosen request and the lowest slot it was chosen in
    pub(crate) chosen: Map<RequestId, usize>,

    /// Slots holding a request already chosen in a lower slot; never executed
    pub(crate) duplicates: Set<usize>,

    pub(crate) leadership: Leadership,
}

impl State {
    pub fn leader_proposal(&self) -> ProposalNumber {
        self.leader_proposal
    }

    pub fn next_slot(&self) -> usize {
        self.next_slot
    }

    pub fn role(&self) -> Role {
        self.leadership.role
    }

    pub fn log(&self) -> &SlotLog {
        &self.log
    }

    pub fn first_unchosen(&self) -> usize {
        self.log.first_unchosen()
    }

    pub fn chosen_slot(&self, request: &RequestId) -> Option<usize> {
        self.chosen.get(request).cloned()
    }

    pub fn is_duplicate(&self, slot: usize) -> bool {
        self.duplicates.contains(&slot)
    }

    pub fn pending(&self) -> usize {
        self.leadership.pending.len()
    }

    pub fn backlog(&self) -> Vec<usize> {
        self.leadership.backlog.iter().cloned().collect()
    }

    pub fn in_flight(&self) -> Option<usize> {
        self.leadership.in_flight.as_ref().map(|pvalue| pvalue.slot)
    }

    pub fn waiting_for_client(&self) -> bool {
        self.leadership.waiting_for_client
    }
}
