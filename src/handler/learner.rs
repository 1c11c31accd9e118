//! # Summary
//!
//! This module aggregates accept votes. Every replica is a learner: a slot
//! becomes final as soon as a majority of distinct replicas are known to
//! have accepted the same proposal for it.

use crate::message::{self, AckClient, Message, PValue};
use crate::replica::{Destination, Replica};

impl Replica {
    pub(crate) fn respond_accept(&mut self, accept: message::Accept) {
        let message::Accept { acceptor, proposal, decree, slot } = accept;
        if self.state.log.is_learned(slot) {
            return
        }
        if proposal < self.state.leader_proposal {
            trace!("replica {} ignoring stale accept for slot {} under {}", self.id, slot, proposal);
            return
        }
        self.adopt(proposal);

        let id = self.id;
        let voted = self.state.log
            .get(slot)
            .map_or(false, |entry| entry.has_vote(id, proposal));

        if voted {
            self.state.log.entry(slot).vote(acceptor);
        } else {
            // First sighting of this decree: take it and vouch for it.
            let pvalue = PValue { slot, proposal, decree: decree.clone() };
            if !self.state.log.accept(pvalue, vec![id, acceptor]) {
                return
            }
            let echo = message::Accept { acceptor: id, proposal, decree, slot };
            self.send(Destination::Peers, Message::Accept(echo));
        }

        self.check_learned(slot);
    }

    /// Learns `slot` if its current decree has a majority of votes.
    pub(crate) fn check_learned(&mut self, slot: usize) {
        let majority = self.majority;
        let ready = self.state.log
            .get(slot)
            .map_or(false, |entry| !entry.is_learned() && entry.votes() >= majority);
        if !ready {
            return
        }
        let pvalue = match self.state.log.learn(slot) {
        | Some(pvalue) => pvalue.clone(),
        | None => return,
        };
        self.commit(pvalue, true);
    }

    /// Records a freshly learned decree. If `notify` is set, the client that
    /// issued it is acknowledged. A leader waiting on this slot moves on.
    ///
    /// A request can end up learned in more than one slot when a stale
    /// acceptance above a skipped slot is recovered after the client's retry
    /// was chosen lower down. Only the lowest such slot executes; the others
    /// are marked as duplicates and merely acknowledge the client. The same
    /// request carrying two different decrees is fatal.
    pub(crate) fn commit(&mut self, pvalue: PValue, notify: bool) {
        let request = pvalue.decree.request;
        match self.state.chosen.get(&request).cloned() {
        | Some(first) if first != pvalue.slot => {
            if let Some(earlier) = self.state.log.learned(first) {
                if earlier.decree != pvalue.decree {
                    panic!(
                        "[SAFETY VIOLATION]: request {:?} chosen as {:?} in slot {} and {:?} in slot {}",
                        request, earlier.decree, first, pvalue.decree, pvalue.slot,
                    );
                }
            }
            let (kept, duplicate) = if pvalue.slot < first {
                (pvalue.slot, first)
            } else {
                (first, pvalue.slot)
            };
            warn!(
                "replica {}: client {} request {} chosen in slot {} and slot {}; slot {} is a duplicate",
                self.id, request.client_id, request.request_no, first, pvalue.slot, duplicate,
            );
            self.state.chosen.insert(request, kept);
            self.state.duplicates.remove(&kept);
            self.state.duplicates.insert(duplicate);
        }
        | _ => {
            self.state.chosen.insert(request, pvalue.slot);
        }
        }

        info!(
            "replica {} learned slot {} under {}: client {} request {}",
            self.id, pvalue.slot, pvalue.proposal, request.client_id, request.request_no,
        );

        if notify {
            self.send(
                Destination::Client(pvalue.decree.client),
                Message::AckClient(AckClient { request_no: request.request_no }),
            );
        }

        let waiting = self.state.leadership.in_flight
            .as_ref()
            .map_or(false, |in_flight| in_flight.slot == pvalue.slot);

        if self.is_leader() && waiting {
            self.advance(pvalue.slot);
        }
    }
}
