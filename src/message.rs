//! # Summary
//!
//! Wire messages exchanged between replicas and clients. Every datagram
//! carries exactly one [`Message`], encoded with `bincode`.

use std::net::SocketAddr;

use serde_derive::{Deserialize, Serialize};

use crate::error::Error;
use crate::round::ProposalNumber;

/// Network address of a replica or client.
pub type Endpoint = SocketAddr;

/// Unique per client; clients never reuse one until it is acknowledged.
#[derive(Serialize, Deserialize)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestId {
    pub client_id: u64,
    pub request_no: u64,
}

/// Client value together with where it came from.
#[derive(Serialize, Deserialize)]
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Decree {
    pub value: Vec<u8>,
    pub request: RequestId,
    pub client: Endpoint,
}

/// Decree accepted for a slot under some proposal.
#[derive(Serialize, Deserialize)]
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PValue {
    pub slot: usize,
    pub proposal: ProposalNumber,
    pub decree: Decree,
}

/// Leader asks every replica to promise `proposal`, starting with `slot`.
#[derive(Serialize, Deserialize)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Prepare {
    pub proposal: ProposalNumber,
    pub slot: usize,
}

/// Promise for `leader_proposal`, reporting what `acceptor` holds for `slot`.
#[derive(Serialize, Deserialize)]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AckPrepare {
    pub acceptor: usize,
    pub accepted: Option<PValue>,
    /// Acceptor holds nothing at or after `slot`
    pub no_more_accepted: bool,
    pub slot: usize,
    pub leader_proposal: ProposalNumber,
}

#[derive(Serialize, Deserialize)]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Propose {
    pub proposal: ProposalNumber,
    pub decree: Decree,
    /// Leader's replication watermark
    pub first_unchosen: usize,
    pub slot: usize,
}

/// `acceptor` accepted `decree` for `slot` under `proposal`.
#[derive(Serialize, Deserialize)]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Accept {
    pub acceptor: usize,
    pub proposal: ProposalNumber,
    pub decree: Decree,
    pub slot: usize,
}

#[derive(Serialize, Deserialize)]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientRequest {
    pub client_id: u64,
    pub client: Endpoint,
    pub request_no: u64,
    /// Proposal the client believes is leading
    pub proposal: ProposalNumber,
    pub value: Vec<u8>,
}

impl ClientRequest {
    pub fn id(&self) -> RequestId {
        RequestId {
            client_id: self.client_id,
            request_no: self.request_no,
        }
    }
}

/// Client gave up waiting on the leader of `proposal`.
#[derive(Serialize, Deserialize)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ClientTimeout {
    pub client_id: u64,
    pub client: Endpoint,
    pub request_no: u64,
    pub proposal: ProposalNumber,
}

#[derive(Serialize, Deserialize)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct AckClient {
    pub request_no: u64,
}

#[derive(Serialize, Deserialize)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct NewLeaderToClient {
    pub proposal: ProposalNumber,
}

/// Lagging `replica` asks for every slot from `first_unchosen` on.
#[derive(Serialize, Deserialize)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct HelpMeChoose {
    pub replica: usize,
    pub first_unchosen: usize,
}

/// Already learned slots `[start, end)`.
#[derive(Serialize, Deserialize)]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct YouCanChoose {
    pub start: usize,
    pub end: usize,
    pub chosen: Vec<PValue>,
}

#[derive(Serialize, Deserialize)]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Message {
    Prepare(Prepare),
    AckPrepare(AckPrepare),
    Propose(Propose),
    Accept(Accept),
    ClientRequest(ClientRequest),
    ClientTimeout(ClientTimeout),
    AckClient(AckClient),
    NewLeaderToClient(NewLeaderToClient),
    HelpMeChoose(HelpMeChoose),
    YouCanChoose(YouCanChoose),
}

impl Message {
    /// Serializes into a single datagram payload.
    pub fn encode(&self) -> Result<Vec<u8>, Error> {
        Ok(bincode::serialize(self)?)
    }

    /// Parses a datagram payload. Unknown tags and truncated payloads fail.
    pub fn decode(bytes: &[u8]) -> Result<Self, Error> {
        Ok(bincode::deserialize(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decree() -> Decree {
        Decree {
            value: b"X".to_vec(),
            request: RequestId { client_id: 1, request_no: 0 },
            client: "127.0.0.1:8000".parse().unwrap(),
        }
    }

    #[test]
    fn catch_up_reply_survives_encoding() {
        let message = Message::YouCanChoose(YouCanChoose {
            start: 5,
            end: 7,
            chosen: vec![
                PValue { slot: 5, proposal: ProposalNumber::new(3, 3), decree: decree() },
                PValue { slot: 6, proposal: ProposalNumber::new(4, 3), decree: decree() },
            ],
        });
        let bytes = message.encode().unwrap();
        assert_eq!(Message::decode(&bytes).unwrap(), message);
    }

    #[test]
    fn empty_ack_prepare_survives_encoding() {
        let message = Message::AckPrepare(AckPrepare {
            acceptor: 2,
            accepted: None,
            no_more_accepted: true,
            slot: u32::max_value() as usize + 1,
            leader_proposal: ProposalNumber { round: u64::max_value(), leader: 1 },
        });
        let bytes = message.encode().unwrap();
        assert_eq!(Message::decode(&bytes).unwrap(), message);
    }

    #[test]
    fn unknown_tag_is_rejected() {
        let bytes = 99u32.to_le_bytes();
        match Message::decode(&bytes) {
        | Err(Error::Decode(_)) => (),
        | other => panic!("expected decode error, got {:?}", other),
        }
    }

    #[test]
    fn truncated_datagram_is_rejected() {
        let message = Message::Propose(Propose {
            proposal: ProposalNumber::default(),
            decree: decree(),
            first_unchosen: 0,
            slot: 0,
        });
        let bytes = message.encode().unwrap();
        assert!(Message::decode(&bytes[..bytes.len() - 3]).is_err());
    }
}
