//! # Summary
//!
//! This module implements the leader role. A leader walks the log one slot
//! at a time with prepare rounds, starting from the first slot it has not
//! learned:
//!
//! - A slot where some acceptor reports a decree is recovered: the decree
//!   with the highest proposal number is proposed again, and preparing
//!   resumes once it is learned.
//! - A slot where nothing was accepted but something was accepted later is
//!   a hole, and is reserved for a future client request.
//! - A slot with nothing accepted at or after it ends preparation. The
//!   leader is established, and every later slot is free.
//!
//! At most one decree is in flight at a time. Client requests wait in
//! `Leadership::pending` until a slot opens up.

use crate::message::{self, Decree, Message, PValue};
use crate::replica::{Destination, Replica};
use crate::state::{Leadership, Role, Tally, Verdict};

impl Replica {
    /// Starts leading the current proposal number from the first slot not
    /// known to be chosen.
    pub(crate) fn begin_prepare(&mut self) {
        self.state.leadership = Leadership::default();
        let slot = self.state.log.first_unchosen();
        info!(
            "replica {} preparing {} from slot {}",
            self.id, self.state.leader_proposal, slot,
        );
        self.prepare_slot(slot);
    }

    fn prepare_slot(&mut self, mut slot: usize) {
        while self.state.log.is_learned(slot) {
            slot += 1;
        }
        self.state.next_slot = slot;
        self.state.leadership.tally = Some(Tally::new(slot));
        debug!("replica {} sending prepare for slot {}", self.id, slot);
        let prepare = message::Prepare {
            proposal: self.state.leader_proposal,
            slot,
        };
        self.send(Destination::All, Message::Prepare(prepare));
    }

    pub(crate) fn respond_ack_prepare(&mut self, ack: message::AckPrepare) {
        if !self.is_leader()
            || ack.leader_proposal != self.state.leader_proposal
            || self.state.leadership.role != Role::Prepare
        {
            trace!("replica {} ignoring stale {:?}", self.id, ack);
            return
        }

        let majority = self.majority;
        let quorum = match self.state.leadership.tally.as_mut() {
        | Some(tally) if tally.slot == ack.slot => {
            tally.record(ack.acceptor, ack.accepted, ack.no_more_accepted, majority)
        }
        | _ => false,
        };
        if !quorum {
            return
        }

        let tally = match self.state.leadership.tally.take() {
        | Some(tally) => tally,
        | None => return,
        };
        let slot = tally.slot;
        match tally.verdict() {
        | Verdict::Recover(pvalue) => {
            debug!("replica {} recovering slot {} from {}", self.id, slot, pvalue.proposal);
            self.propose(slot, pvalue.decree);
        }
        | Verdict::Hole => {
            debug!("replica {} reserving hole at slot {}", self.id, slot);
            self.state.leadership.backlog.push_back(slot);
            self.prepare_slot(slot + 1);
        }
        | Verdict::Clear => self.establish(slot),
        }
    }

    /// Majority promised and nothing is accepted at or after `slot`.
    fn establish(&mut self, slot: usize) {
        let skip = &self.skip;
        let leadership = &mut self.state.leadership;
        leadership.backlog.retain(|hole| !skip.contains(hole));
        leadership.role = if leadership.backlog.is_empty() {
            Role::Dictated
        } else {
            Role::Established
        };
        self.state.next_slot = slot;
        info!(
            "replica {} established {} at slot {} with holes {:?}",
            self.id, self.state.leader_proposal, slot, self.state.leadership.backlog,
        );
    }

    /// Proposes `decree` for `slot` under the current proposal number. The
    /// leader's own acceptance is recorded before anything is sent.
    pub(crate) fn propose(&mut self, slot: usize, decree: Decree) {
        let proposal = self.state.leader_proposal;
        let pvalue = PValue { slot, proposal, decree: decree.clone() };
        debug!(
            "replica {} proposing client {} request {} for slot {} under {}",
            self.id, decree.request.client_id, decree.request.request_no, slot, proposal,
        );
        self.state.leadership.in_flight = Some(pvalue.clone());
        if !self.state.log.accept(pvalue, Some(self.id)) {
            warn!("replica {} could not accept its own proposal for slot {}", self.id, slot);
        }
        let propose = message::Propose {
            proposal,
            decree,
            first_unchosen: self.state.log.first_unchosen(),
            slot,
        };
        self.send(Destination::Peers, Message::Propose(propose));
        self.check_learned(slot);
    }

    /// Called once the in-flight decree for `slot` is learned.
    pub(crate) fn advance(&mut self, slot: usize) {
        self.state.leadership.in_flight = None;
        if self.state.leadership.role == Role::Prepare {
            self.prepare_slot(slot + 1);
        }
    }

    /// Feeds queued client requests into free slots, one at a time.
    pub(crate) fn drain(&mut self) {
        if !self.is_leader() || self.state.leadership.role == Role::Prepare {
            return
        }
        while self.state.leadership.in_flight.is_none() {
            let decree = match self.state.leadership.pending.pop_front() {
            | Some(decree) => decree,
            | None => {
                self.state.leadership.waiting_for_client = true;
                return
            }
            };
            if let Some(slot) = self.state.chosen_slot(&decree.request) {
                debug!("replica {} dropping queued duplicate of slot {}", self.id, slot);
                self.acknowledge(decree.client, decree.request.request_no);
                continue
            }
            self.state.leadership.waiting_for_client = false;
            let slot = self.reserve_slot();
            self.propose(slot, decree);
        }
    }

    /// Next slot to fill with a fresh client value: reserved holes first,
    /// then the open tail of the log.
    fn reserve_slot(&mut self) -> usize {
        let leadership = &mut self.state.leadership;
        if leadership.role == Role::Established {
            while let Some(slot) = leadership.backlog.pop_front() {
                if leadership.backlog.is_empty() {
                    leadership.role = Role::Dictated;
                }
                if !self.state.log.is_learned(slot) {
                    return slot
                }
            }
            leadership.role = Role::Dictated;
        }
        let mut slot = self.state.next_slot;
        while self.state.log.is_learned(slot) || self.skip.contains(&slot) {
            slot += 1;
        }
        self.state.next_slot = slot + 1;
        slot
    }
}
