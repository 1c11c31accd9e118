//! # Summary
//!
//! This module describes the cluster roster: who the replicas are, where
//! they listen, and which faults each one injects. Rosters are stored as
//! JSON so that they can be written by hand or generated.

use std::fs;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde_derive::{Deserialize, Serialize};

use crate::error::Error;
use crate::replica::Replica;
use crate::server::Server;
use crate::socket::Socket;
use crate::storage::Storage;

/// First port handed out by [`Config::generate`].
pub const BASE_PORT: u16 = 6000;

/// How replicas in this roster are driven.
#[derive(Serialize, Deserialize)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Started together by a script
    Script,

    /// Started one by one by hand
    Manual,
}

impl Default for Mode {
    fn default() -> Self {
        Mode::Script
    }
}

#[derive(Serialize, Deserialize)]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReplicaConfig {
    /// Unique replica ID
    pub id: usize,

    pub ip: String,

    pub port: u16,

    /// Slots this replica never fills with fresh client values
    #[serde(default)]
    pub skip_slot: Vec<usize>,

    /// Percentage of outbound datagrams to drop
    #[serde(default)]
    pub drop_rate: u8,
}

impl ReplicaConfig {
    pub fn address(&self) -> Result<SocketAddr, Error> {
        IpAddr::from_str(&self.ip)
            .map(|ip| SocketAddr::new(ip, self.port))
            .map_err(|_| Error::Config(format!("replica {} has invalid ip {:?}", self.id, self.ip)))
    }
}

#[derive(Serialize, Deserialize)]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// Number of crash failures tolerated
    pub f: usize,

    #[serde(default)]
    pub mode: Mode,

    pub replica_list: Vec<ReplicaConfig>,
}

impl Config {
    /// Roster of `2f + 1` replicas on localhost, on consecutive ports.
    pub fn generate(f: usize) -> Self {
        let replica_list = (0..2 * f + 1)
            .map(|id| ReplicaConfig {
                id,
                ip: "127.0.0.1".to_string(),
                port: BASE_PORT + id as u16,
                skip_slot: Vec::new(),
                drop_rate: 0,
            })
            .collect();
        Config {
            f,
            mode: Mode::Script,
            replica_list,
        }
    }

    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    /// Replica `id` never originates a fresh value in `slot`.
    pub fn with_skip(mut self, id: usize, slot: usize) -> Self {
        if let Some(replica) = self.replica_list.iter_mut().find(|replica| replica.id == id) {
            if !replica.skip_slot.contains(&slot) {
                replica.skip_slot.push(slot);
            }
        }
        self
    }

    /// Replica `id` drops `rate` percent of what it sends. Clamped to 100.
    pub fn with_drop_rate(mut self, id: usize, rate: u8) -> Self {
        if let Some(replica) = self.replica_list.iter_mut().find(|replica| replica.id == id) {
            replica.drop_rate = std::cmp::min(rate, 100);
        }
        self
    }

    pub fn with_drop_rate_all(mut self, rate: u8) -> Self {
        for replica in &mut self.replica_list {
            replica.drop_rate = std::cmp::min(rate, 100);
        }
        self
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        fs::read_to_string(path)?.parse()
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), Error> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Checks the roster is complete and well-formed, and sorts it by ID.
    pub fn validate(mut self) -> Result<Self, Error> {
        self.replica_list.sort_by_key(|replica| replica.id);
        let count = 2 * self.f + 1;
        if self.replica_list.len() != count {
            return Err(Error::Config(format!(
                "f = {} needs {} replicas, found {}",
                self.f, count, self.replica_list.len(),
            )))
        }
        for (expected, replica) in self.replica_list.iter().enumerate() {
            if replica.id != expected {
                return Err(Error::Config(format!(
                    "replica IDs must be 0..{}, found {} in position {}",
                    count, replica.id, expected,
                )))
            }
            if replica.drop_rate > 100 {
                return Err(Error::Config(format!(
                    "replica {} has drop rate {} over 100",
                    replica.id, replica.drop_rate,
                )))
            }
            replica.address()?;
        }
        Ok(self)
    }

    pub fn count(&self) -> usize {
        self.replica_list.len()
    }

    pub fn replica(&self, id: usize) -> Result<&ReplicaConfig, Error> {
        self.replica_list
            .iter()
            .find(|replica| replica.id == id)
            .ok_or(Error::UnknownReplica(id))
    }

    pub fn address(&self, id: usize) -> Result<SocketAddr, Error> {
        self.replica(id)?.address()
    }

    /// Every replica address, indexed by replica ID.
    pub fn addresses(&self) -> Result<Vec<SocketAddr>, Error> {
        self.replica_list
            .iter()
            .map(ReplicaConfig::address)
            .collect()
    }

    /// Runs replica `id` until the process is killed. If `dump` is set, the
    /// learned log is written under that directory whenever it grows.
    pub async fn run(self, id: usize, dump: Option<PathBuf>) -> Result<(), Error> {
        let local = self.replica(id)?.clone();
        let peers = self.addresses()?;
        let replica = Replica::new(id, self.count())
            .with_skipped_slots(local.skip_slot.iter().cloned());
        let socket = Socket::bind(local.address()?)
            .await?
            .with_drop_rate(local.drop_rate);

        info!(
            "replica {} listening on {} (skip {:?}, drop {}%)",
            id, local.address()?, local.skip_slot, local.drop_rate,
        );

        let mut server = Server::new(replica, socket, peers);
        if let Some(dir) = dump {
            fs::create_dir_all(&dir)?;
            let storage = Storage::new(dir.join(format!("replica-{}.bin", id)))?;
            server = server.with_storage(storage);
        }
        server.run().await
    }
}

impl FromStr for Config {
    type Err = Error;
    fn from_str(json: &str) -> Result<Self, Self::Err> {
        serde_json::from_str::<Config>(json)?.validate()
    }
}
