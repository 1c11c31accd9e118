//! # Summary
//!
//! This module defines round-robin proposal numbering. Every round is owned by
//! exactly one replica, so comparing two proposal numbers is enough to decide
//! which leadership attempt takes priority.

use std::fmt;

use serde_derive::{Deserialize, Serialize};

/// Totally ordered identifier of a leadership attempt.
///
/// Ordered lexicographically by `round`, then `leader`. Always build one with
/// [`ProposalNumber::new`] so that `leader == round % count` holds.
#[derive(Serialize, Deserialize)]
#[derive(Copy, Clone, Default, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProposalNumber {
    /// Monotonically increasing round
    pub round: u64,

    /// Replica that owns `round`
    pub leader: usize,
}

impl ProposalNumber {
    /// Proposal number for `round` in a cluster of `count` replicas.
    pub fn new(round: u64, count: usize) -> Self {
        ProposalNumber {
            round,
            leader: (round % count as u64) as usize,
        }
    }

    /// Proposal number of the following round.
    pub fn succ(self, count: usize) -> Self {
        ProposalNumber::new(self.round + 1, count)
    }
}

impl fmt::Display for ProposalNumber {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, "{}.{}", self.round, self.leader)
    }
}

/// Replica responsible for driving `proposal`.
pub fn leader_of(proposal: ProposalNumber) -> usize {
    proposal.leader
}

/// Smallest number of replicas whose votes form a quorum.
pub fn majority(count: usize) -> usize {
    count / 2 + 1
}
