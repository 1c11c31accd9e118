//! # Summary
//!
//! This module connects a [`Replica`] to the network. It runs a single
//! loop: receive a datagram, run the replica to completion on it, route the
//! replica's output. Messages a replica addresses to itself never touch the
//! socket, so they cannot be dropped.

use std::collections::VecDeque;
use std::net::SocketAddr;

use crate::error::Error;
use crate::message::Message;
use crate::replica::{Destination, Envelope, Replica};
use crate::socket::Socket;
use crate::storage::{Snapshot, Storage};

pub struct Server {
    replica: Replica,
    socket: Socket,

    /// Replica addresses, indexed by replica ID
    peers: Vec<SocketAddr>,

    /// Self-addressed messages awaiting delivery
    local: VecDeque<Message>,

    storage: Option<Storage<Snapshot>>,

    /// Learned slot count at the last snapshot
    saved: usize,
}

impl Server {
    pub fn new(replica: Replica, socket: Socket, peers: Vec<SocketAddr>) -> Self {
        Server {
            replica,
            socket,
            peers,
            local: VecDeque::new(),
            storage: None,
            saved: 0,
        }
    }

    pub fn with_storage(mut self, storage: Storage<Snapshot>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub async fn run(mut self) -> Result<(), Error> {
        let outbound = self.replica.start();
        self.route(outbound);
        self.flush();
        loop {
            match self.socket.recv::<Message>().await {
            | Ok((message, from)) => {
                trace!("received {:?} from {}", message, from);
                self.local.push_back(message);
                self.flush();
            }
            | Err(Error::Decode(error)) => warn!("dropping malformed datagram: {}", error),
            | Err(error) => warn!("receive failed: {}", error),
            }
        }
    }

    /// Handles every queued local message, including those queued while
    /// handling.
    fn flush(&mut self) {
        while let Some(message) = self.local.pop_front() {
            let outbound = self.replica.handle(message);
            self.route(outbound);
        }
        self.dump();
    }

    fn route(&mut self, outbound: Vec<Envelope>) {
        let id = self.replica.id();
        for Envelope { to, message } in outbound {
            match to {
            | Destination::Replica(peer) if peer == id => self.local.push_back(message),
            | Destination::Replica(peer) => match self.peers.get(peer) {
                | Some(addr) => self.socket.send(*addr, &message),
                | None => warn!("no address for replica {}, dropping {:?}", peer, message),
            },
            | Destination::Peers => self.broadcast(&message),
            | Destination::All => {
                self.broadcast(&message);
                self.local.push_back(message);
            }
            | Destination::Client(addr) => self.socket.send(addr, &message),
            }
        }
    }

    fn broadcast(&self, message: &Message) {
        let id = self.replica.id();
        for (_, addr) in self.peers.iter().enumerate().filter(|(peer, _)| *peer != id) {
            self.socket.send(*addr, message);
        }
    }

    /// Writes a snapshot if new slots were learned since the last one.
    fn dump(&mut self) {
        let storage = match self.storage.as_mut() {
        | Some(storage) => storage,
        | None => return,
        };
        let learned = self.replica.state().log().learned_count();
        if learned <= self.saved {
            return
        }
        match storage.save(&self.replica.snapshot()) {
        | Ok(()) => self.saved = learned,
        | Err(error) => warn!("could not write snapshot: {}", error),
        }
    }
}
