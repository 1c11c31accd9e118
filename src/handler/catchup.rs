//! # Summary
//!
//! This module lets a lagging replica import slots that the rest of the
//! cluster has already learned, instead of waiting for each to be proposed
//! again.

use crate::message::{HelpMeChoose, Message, YouCanChoose};
use crate::replica::{Destination, Replica};
use crate::socket::MAX_PAYLOAD;

/// Bytes of learned decrees packed into one reply, leaving room for the
/// message header. A longer gap is bridged over several replies.
const CATCH_UP_BUDGET: u64 = MAX_PAYLOAD as u64 - 64;

impl Replica {
    /// Asks `replica` for every learned slot from our watermark on.
    pub(crate) fn request_catch_up(&mut self, replica: usize) {
        let help = HelpMeChoose {
            replica: self.id,
            first_unchosen: self.state.log.first_unchosen(),
        };
        debug!("replica {} asking replica {} for slots from {}", self.id, replica, help.first_unchosen);
        self.send(Destination::Replica(replica), Message::HelpMeChoose(help));
    }

    /// Replies with learned slots from the requester's watermark on, as many
    /// as fit in one datagram. `end` is one past the last slot included; the
    /// requester asks again from there on the next propose.
    pub(crate) fn respond_help(&mut self, help: HelpMeChoose) {
        let watermark = self.state.log.first_unchosen();
        if help.first_unchosen >= watermark {
            trace!("replica {} has nothing for replica {}", self.id, help.replica);
            return
        }

        let mut chosen = Vec::new();
        let mut size = 0;
        let mut end = help.first_unchosen;
        for pvalue in self.state.log.learned_range(help.first_unchosen, watermark) {
            let bytes = match bincode::serialized_size(pvalue) {
            | Ok(bytes) => bytes,
            | Err(error) => {
                warn!("replica {} could not size slot {}: {}", self.id, pvalue.slot, error);
                break
            }
            };
            if !chosen.is_empty() && size + bytes > CATCH_UP_BUDGET {
                break
            }
            size += bytes;
            end = pvalue.slot + 1;
            chosen.push(pvalue.clone());
        }
        if chosen.is_empty() {
            return
        }

        debug!(
            "replica {} sending slots [{}, {}) of [{}, {}) to replica {}",
            self.id, help.first_unchosen, end, help.first_unchosen, watermark, help.replica,
        );
        let reply = YouCanChoose { start: help.first_unchosen, end, chosen };
        self.send(Destination::Replica(help.replica), Message::YouCanChoose(reply));
    }

    pub(crate) fn respond_choose(&mut self, choose: YouCanChoose) {
        let YouCanChoose { start, end, chosen } = choose;
        for pvalue in chosen {
            if pvalue.slot < start || pvalue.slot >= end {
                warn!("replica {} ignoring slot {} outside [{}, {})", self.id, pvalue.slot, start, end);
                continue
            }
            if let Some(learned) = self.state.log.learned(pvalue.slot) {
                if learned.decree != pvalue.decree {
                    panic!(
                        "[SAFETY VIOLATION]: slot {} learned {:?} but peer learned {:?}",
                        pvalue.slot, learned.decree, pvalue.decree,
                    );
                }
                continue
            }
            let pvalue = match self.state.log.import(pvalue) {
            | Some(pvalue) => pvalue.clone(),
            | None => continue,
            };
            self.commit(pvalue, false);
        }
        debug!("replica {} caught up to slot {}", self.id, self.state.log.first_unchosen());
    }
}
