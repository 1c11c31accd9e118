//! # Summary
//!
//! This module admits client requests and reacts to client timeouts, which
//! are the only trigger for leader change.

use crate::message::{self, AckClient, Decree, Endpoint, Message, NewLeaderToClient};
use crate::replica::{Destination, Replica};

impl Replica {
    pub(crate) fn respond_request(&mut self, request: message::ClientRequest) {
        let id = request.id();
        let client = request.client;

        if let Some(slot) = self.state.chosen_slot(&id) {
            debug!("replica {} re-acknowledging {:?} chosen in slot {}", self.id, id, slot);
            self.acknowledge(client, id.request_no);
            return
        }

        if request.proposal < self.state.leader_proposal {
            self.redirect(client);
            return
        }

        if self.adopt(request.proposal) && self.is_leader() {
            self.begin_prepare();
        }

        if !self.is_leader() {
            self.redirect(client);
            return
        }

        if self.state.leadership.is_underway(&id) {
            trace!("replica {} dropping duplicate {:?}", self.id, id);
            return
        }

        debug!("replica {} queueing {:?}", self.id, id);
        self.state.leadership.pending.push_back(Decree {
            value: request.value,
            request: id,
            client,
        });
    }

    /// The client suspects the leader of `timeout.proposal` is gone. Move
    /// past it, and tell the client where to go next.
    pub(crate) fn respond_timeout(&mut self, timeout: message::ClientTimeout) {
        if timeout.proposal >= self.state.leader_proposal {
            let proposal = timeout.proposal.succ(self.count);
            info!(
                "replica {} moving to {}: client {} timed out on {}",
                self.id, proposal, timeout.client_id, timeout.proposal,
            );
            if self.adopt(proposal) && self.is_leader() {
                self.begin_prepare();
            }
        }
        self.redirect(timeout.client);
    }

    pub(crate) fn acknowledge(&mut self, client: Endpoint, request_no: u64) {
        self.send(
            Destination::Client(client),
            Message::AckClient(AckClient { request_no }),
        );
    }

    fn redirect(&mut self, client: Endpoint) {
        let proposal = self.state.leader_proposal;
        self.send(
            Destination::Client(client),
            Message::NewLeaderToClient(NewLeaderToClient { proposal }),
        );
    }
}
