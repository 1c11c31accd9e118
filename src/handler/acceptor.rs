//! # Summary
//!
//! This module implements the acceptor role, which acts as Paxos's
//! distributed memory. Promises are global: adopting a proposal number
//! covers every slot, so a single prepare round can walk the whole log.

use crate::message::{self, Message, PValue};
use crate::replica::{Destination, Replica};
use crate::round;

impl Replica {
    /// Promises `prepare.proposal` unless a newer one is already known, and
    /// reports what this replica holds for the prepared slot.
    pub(crate) fn respond_prepare(&mut self, prepare: message::Prepare) {
        if prepare.proposal < self.state.leader_proposal {
            trace!("replica {} ignoring stale {:?}", self.id, prepare);
            return
        }
        self.adopt(prepare.proposal);
        let log = &mut self.state.log;
        let accepted = log.entry(prepare.slot).accepted().cloned();
        let ack = message::AckPrepare {
            acceptor: self.id,
            accepted,
            no_more_accepted: log.no_more_accepted(prepare.slot),
            slot: prepare.slot,
            leader_proposal: prepare.proposal,
        };
        self.send(
            Destination::Replica(round::leader_of(prepare.proposal)),
            Message::AckPrepare(ack),
        );
    }

    /// Accepts the leader's decree and tells everyone else about it.
    pub(crate) fn respond_propose(&mut self, propose: message::Propose) {
        let message::Propose { proposal, decree, first_unchosen, slot } = propose;
        if proposal < self.state.leader_proposal {
            trace!("replica {} ignoring stale propose for slot {} under {}", self.id, slot, proposal);
            return
        }
        self.adopt(proposal);

        if first_unchosen > self.state.log.first_unchosen() {
            self.request_catch_up(round::leader_of(proposal));
        }

        // Already final here: vouch for it under the new proposal as well.
        if let Some(learned) = self.state.log.learned(slot) {
            if learned.decree != decree {
                panic!(
                    "[SAFETY VIOLATION]: slot {} learned {:?} but {} proposes {:?}",
                    slot, learned.decree, proposal, decree,
                );
            }
            let accept = message::Accept { acceptor: self.id, proposal, decree, slot };
            self.send(Destination::Peers, Message::Accept(accept));
            return
        }

        let id = self.id;
        if self.state.log.get(slot).map_or(false, |entry| entry.has_vote(id, proposal)) {
            trace!("replica {} already accepted slot {} under {}", id, slot, proposal);
            return
        }

        let pvalue = PValue { slot, proposal, decree: decree.clone() };
        if !self.state.log.accept(pvalue, vec![id, round::leader_of(proposal)]) {
            return
        }
        let accept = message::Accept { acceptor: id, proposal, decree, slot };
        self.send(Destination::Peers, Message::Accept(accept));
        self.check_learned(slot);
    }
}
