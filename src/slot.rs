//! # Summary
//!
//! This module defines the per-replica slot log: what each replica has
//! accepted for every slot, who voted for it, and whether it is final.
//! Entries are created lazily on first touch and never removed.

use std::collections::BTreeMap;

use hashbrown::HashSet as Set;
use serde_derive::{Deserialize, Serialize};

use crate::message::PValue;
use crate::round::ProposalNumber;

/// State of a single log position.
#[derive(Serialize, Deserialize)]
#[derive(Clone, Debug, Default)]
pub struct SlotEntry {
    /// Most recently accepted decree
    accepted: Option<PValue>,

    /// Replicas known to have accepted `accepted`
    voters: Set<usize>,

    /// `accepted` can never change again
    learned: bool,
}

impl SlotEntry {
    pub fn accepted(&self) -> Option<&PValue> {
        self.accepted.as_ref()
    }

    pub fn proposal(&self) -> Option<ProposalNumber> {
        self.accepted.as_ref().map(|pvalue| pvalue.proposal)
    }

    pub fn is_learned(&self) -> bool {
        self.learned
    }

    pub fn votes(&self) -> usize {
        self.voters.len()
    }

    /// Whether `id` is recorded as accepting this slot under `proposal`.
    pub fn has_vote(&self, id: usize, proposal: ProposalNumber) -> bool {
        self.proposal() == Some(proposal) && self.voters.contains(&id)
    }

    /// Adds a vote for the currently accepted decree. Returns the new tally.
    pub fn vote(&mut self, id: usize) -> usize {
        self.voters.insert(id);
        self.voters.len()
    }

    /// Paxos acceptance rule: only a proposal at least as recent as the
    /// current one may replace it, and nothing replaces a learned decree.
    fn accept<I>(&mut self, pvalue: PValue, voters: I) -> bool
        where I: IntoIterator<Item = usize>
    {
        if self.learned {
            return false
        }
        match self.proposal() {
        | Some(current) if current > pvalue.proposal => return false,
        | Some(current) if current == pvalue.proposal => (),
        | _ => self.voters.clear(),
        }
        self.accepted = Some(pvalue);
        self.voters.extend(voters);
        true
    }
}

/// Replicated log as seen by one replica.
#[derive(Serialize, Deserialize)]
#[derive(Clone, Debug, Default)]
pub struct SlotLog {
    entries: BTreeMap<usize, SlotEntry>,

    /// Lowest slot not known to be learned
    first_unchosen: usize,

    /// Lowest slot without an accepted decree
    first_unaccepted: usize,

    /// One past the highest slot with an accepted decree
    last_accepted: usize,
}

impl SlotLog {
    pub fn first_unchosen(&self) -> usize {
        self.first_unchosen
    }

    pub fn first_unaccepted(&self) -> usize {
        self.first_unaccepted
    }

    pub fn last_accepted(&self) -> usize {
        self.last_accepted
    }

    pub fn get(&self, slot: usize) -> Option<&SlotEntry> {
        self.entries.get(&slot)
    }

    /// Entry for `slot`, created on first touch.
    pub fn entry(&mut self, slot: usize) -> &mut SlotEntry {
        self.entries.entry(slot).or_default()
    }

    pub fn is_learned(&self, slot: usize) -> bool {
        self.get(slot).map_or(false, SlotEntry::is_learned)
    }

    /// Learned decree for `slot`, if any.
    pub fn learned(&self, slot: usize) -> Option<&PValue> {
        self.get(slot)
            .filter(|entry| entry.learned)
            .and_then(SlotEntry::accepted)
    }

    /// True if nothing is accepted at or after `slot`.
    pub fn no_more_accepted(&self, slot: usize) -> bool {
        slot >= self.last_accepted
    }

    /// Records `pvalue` as accepted, crediting `voters`. Returns false if the
    /// acceptance rule rejected it.
    pub fn accept<I>(&mut self, pvalue: PValue, voters: I) -> bool
        where I: IntoIterator<Item = usize>
    {
        let slot = pvalue.slot;
        if !self.entry(slot).accept(pvalue, voters) {
            return false
        }
        self.last_accepted = std::cmp::max(self.last_accepted, slot + 1);
        while self.get(self.first_unaccepted).and_then(SlotEntry::accepted).is_some() {
            self.first_unaccepted += 1;
        }
        true
    }

    /// Marks the accepted decree of `slot` as final.
    pub fn learn(&mut self, slot: usize) -> Option<&PValue> {
        let entry = self.entries.get_mut(&slot)?;
        entry.accepted.as_ref()?;
        entry.learned = true;
        while self.is_learned(self.first_unchosen) {
            self.first_unchosen += 1;
        }
        self.learned(slot)
    }

    /// Installs a decree some other replica already learned, bypassing votes.
    pub fn import(&mut self, pvalue: PValue) -> Option<&PValue> {
        let slot = pvalue.slot;
        if self.is_learned(slot) {
            return None
        }
        let entry = self.entry(slot);
        entry.voters.clear();
        entry.accepted = Some(pvalue);
        self.last_accepted = std::cmp::max(self.last_accepted, slot + 1);
        while self.get(self.first_unaccepted).and_then(SlotEntry::accepted).is_some() {
            self.first_unaccepted += 1;
        }
        self.learn(slot)
    }

    /// Learned decrees in `[start, end)`, in slot order.
    pub fn learned_range(&self, start: usize, end: usize) -> impl Iterator<Item = &PValue> {
        self.entries
            .range(start..end)
            .filter(|(_, entry)| entry.learned)
            .filter_map(|(_, entry)| entry.accepted.as_ref())
    }

    /// Every learned decree, in slot order.
    pub fn learned_iter(&self) -> impl Iterator<Item = &PValue> {
        self.entries
            .values()
            .filter(|entry| entry.learned)
            .filter_map(SlotEntry::accepted)
    }

    pub fn learned_count(&self) -> usize {
        self.entries.values().filter(|entry| entry.learned).count()
    }
}
