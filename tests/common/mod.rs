//! In-process cluster over a simulated network. Delivery order, loss and
//! partitions are controlled by the test; randomness comes from a seeded
//! `StdRng`, so every run of a given seed is identical.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::net::SocketAddr;

use hashbrown::HashMap as Map;
use multipaxos::message::*;
use multipaxos::{Destination, Envelope, ProposalNumber, Replica};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Upper bound on deliveries in a single `run`.
const MAX_STEPS: usize = 1_000_000;

pub type Filter = Box<dyn FnMut(usize, usize, &Message) -> bool>;

/// Datagram between two replicas.
pub struct Packet {
    pub from: usize,
    pub to: usize,
    pub message: Message,
}

pub struct Cluster {
    pub replicas: Vec<Replica>,
    crashed: Vec<bool>,
    network: VecDeque<Packet>,
    mailboxes: Map<SocketAddr, Vec<Message>>,

    /// Percentage of outbound datagrams dropped, per sender
    drop_rate: Vec<u8>,

    /// Returns false for datagrams that must not be delivered
    filter: Option<Filter>,

    /// Deliver in random order instead of FIFO
    shuffle: bool,

    rng: StdRng,
}

pub fn client(id: u64) -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 9000 + id as u16))
}

impl Cluster {
    pub fn new(count: usize, seed: u64) -> Self {
        Cluster {
            replicas: (0..count).map(|id| Replica::new(id, count)).collect(),
            crashed: vec![false; count],
            network: VecDeque::new(),
            mailboxes: Map::default(),
            drop_rate: vec![0; count],
            filter: None,
            shuffle: false,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Cluster with the initial leader already established.
    pub fn established(count: usize) -> Self {
        let mut cluster = Cluster::new(count, 0);
        cluster.start();
        cluster.run();
        cluster
    }

    pub fn count(&self) -> usize {
        self.replicas.len()
    }

    pub fn with_skipped_slots(mut self, id: usize, slots: Vec<usize>) -> Self {
        let count = self.count();
        self.replicas[id] = Replica::new(id, count).with_skipped_slots(slots);
        self
    }

    pub fn shuffled(mut self) -> Self {
        self.shuffle = true;
        self
    }

    pub fn set_drop_rate(&mut self, id: usize, rate: u8) {
        self.drop_rate[id] = rate;
    }

    pub fn set_drop_rate_all(&mut self, rate: u8) {
        for drop_rate in &mut self.drop_rate {
            *drop_rate = rate;
        }
    }

    pub fn set_filter<F>(&mut self, filter: F)
        where F: FnMut(usize, usize, &Message) -> bool + 'static
    {
        self.filter = Some(Box::new(filter));
    }

    pub fn clear_filter(&mut self) {
        self.filter = None;
    }

    /// Crashed replicas neither receive nor send anything from now on.
    pub fn crash(&mut self, id: usize) {
        self.crashed[id] = true;
    }

    pub fn start(&mut self) {
        let live = (0..self.count())
            .filter(|id| !self.crashed[*id])
            .collect::<Vec<_>>();
        for id in live {
            let outbound = self.replicas[id].start();
            let mut local = VecDeque::new();
            self.route(id, outbound, &mut local);
            self.deliver_local(id, local);
        }
    }

    /// Client `client_id` sends `value` to replica `to`.
    pub fn request(&mut self, to: usize, client_id: u64, request_no: u64, proposal: ProposalNumber, value: &str) {
        let request = ClientRequest {
            client_id,
            client: client(client_id),
            request_no,
            proposal,
            value: value.as_bytes().to_vec(),
        };
        self.deliver(to, Message::ClientRequest(request));
    }

    /// Client `client_id` reports a timeout to every replica.
    pub fn timeout(&mut self, client_id: u64, request_no: u64, proposal: ProposalNumber) {
        let timeout = ClientTimeout {
            client_id,
            client: client(client_id),
            request_no,
            proposal,
        };
        for id in 0..self.count() {
            self.deliver(id, Message::ClientTimeout(timeout));
        }
    }

    /// Delivers one datagram. Returns false once the network is empty.
    pub fn step(&mut self) -> bool {
        let packet = if self.shuffle && !self.network.is_empty() {
            let index = self.rng.gen_range(0..self.network.len());
            self.network.swap_remove_back(index)
        } else {
            self.network.pop_front()
        };
        match packet {
        | Some(packet) => {
            self.deliver(packet.to, packet.message);
            true
        }
        | None => false,
        }
    }

    /// Delivers datagrams until the network is quiet.
    pub fn run(&mut self) {
        for _ in 0..MAX_STEPS {
            if !self.step() {
                return
            }
        }
        panic!("network still busy after {} deliveries", MAX_STEPS);
    }

    /// Delivers at most `steps` datagrams.
    pub fn run_for(&mut self, steps: usize) {
        for _ in 0..steps {
            if !self.step() {
                return
            }
        }
    }

    pub fn deliver(&mut self, to: usize, message: Message) {
        if self.crashed[to] {
            return
        }
        let mut local = VecDeque::new();
        local.push_back(message);
        self.deliver_local(to, local);
    }

    fn deliver_local(&mut self, to: usize, mut local: VecDeque<Message>) {
        while let Some(message) = local.pop_front() {
            let outbound = self.replicas[to].handle(message);
            self.route(to, outbound, &mut local);
        }
    }

    fn route(&mut self, from: usize, outbound: Vec<Envelope>, local: &mut VecDeque<Message>) {
        for Envelope { to, message } in outbound {
            match to {
            | Destination::Replica(id) if id == from => local.push_back(message),
            | Destination::Replica(id) => self.transmit(from, id, message),
            | Destination::Peers => self.broadcast(from, &message),
            | Destination::All => {
                self.broadcast(from, &message);
                local.push_back(message);
            }
            | Destination::Client(addr) => {
                if !self.dropped(from) {
                    self.mailboxes.entry(addr).or_default().push(message);
                }
            }
            }
        }
    }

    fn broadcast(&mut self, from: usize, message: &Message) {
        for id in (0..self.count()).filter(|id| *id != from) {
            self.transmit(from, id, message.clone());
        }
    }

    fn transmit(&mut self, from: usize, to: usize, message: Message) {
        if self.crashed[from] || self.dropped(from) {
            return
        }
        if let Some(filter) = self.filter.as_mut() {
            if !filter(from, to, &message) {
                return
            }
        }
        self.network.push_back(Packet { from, to, message });
    }

    fn dropped(&mut self, from: usize) -> bool {
        let rate = self.drop_rate[from];
        rate > 0 && self.rng.gen_range(0..100u8) < rate
    }

    /// Everything sent to `client_id` so far, oldest first.
    pub fn mailbox(&self, client_id: u64) -> &[Message] {
        self.mailboxes
            .get(&client(client_id))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn take_mailbox(&mut self, client_id: u64) -> Vec<Message> {
        self.mailboxes.remove(&client(client_id)).unwrap_or_default()
    }

    pub fn acked(&self, client_id: u64, request_no: u64) -> bool {
        self.mailbox(client_id)
            .iter()
            .any(|message| *message == Message::AckClient(AckClient { request_no }))
    }

    /// Highest proposal any client was redirected to.
    pub fn redirect(&self, client_id: u64) -> Option<ProposalNumber> {
        self.mailbox(client_id)
            .iter()
            .filter_map(|message| match message {
                | Message::NewLeaderToClient(redirect) => Some(redirect.proposal),
                | _ => None,
            })
            .max()
    }

    pub fn learned(&self, id: usize, slot: usize) -> Option<Vec<u8>> {
        self.replicas[id].learned(slot).map(|decree| decree.value.clone())
    }

    pub fn leader(&self) -> Option<usize> {
        self.replicas
            .iter()
            .enumerate()
            .filter(|(id, replica)| !self.crashed[*id] && replica.is_leader())
            .map(|(id, _)| id)
            .max_by_key(|id| self.replicas[*id].state().leader_proposal())
    }

    /// Slots holding `request` across every replica's learned log.
    pub fn slots_of(&self, request: RequestId) -> Vec<usize> {
        let mut slots = self.replicas
            .iter()
            .flat_map(|replica| replica.snapshot().learned)
            .filter(|pvalue| pvalue.decree.request == request)
            .map(|pvalue| pvalue.slot)
            .collect::<Vec<_>>();
        slots.sort();
        slots.dedup();
        slots
    }

    /// No two replicas learned different decrees for the same slot, and no
    /// replica executes a request in two slots.
    pub fn check_agreement(&self) {
        let mut slots: Map<usize, Decree> = Map::default();
        for replica in &self.replicas {
            let mut requests: Map<RequestId, usize> = Map::default();
            for pvalue in replica.snapshot().learned {
                let decree = slots.entry(pvalue.slot).or_insert_with(|| pvalue.decree.clone());
                assert_eq!(
                    *decree, pvalue.decree,
                    "replicas disagree on slot {}", pvalue.slot,
                );
                if replica.state().is_duplicate(pvalue.slot) {
                    continue
                }
                let slot = requests.entry(pvalue.decree.request).or_insert(pvalue.slot);
                assert_eq!(
                    *slot, pvalue.slot,
                    "request {:?} executed in two slots", pvalue.decree.request,
                );
            }
        }
    }
}
