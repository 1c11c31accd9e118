#[macro_use] extern crate derivative;
#[macro_use] extern crate log;

mod config;
mod error;
mod handler;
pub mod message;
mod replica;
pub mod round;
mod server;
mod slot;
mod socket;
mod state;
mod storage;

pub use crate::config::{Config, Mode, ReplicaConfig, BASE_PORT};
pub use crate::error::Error;
pub use crate::message::Message;
pub use crate::replica::{Destination, Envelope, Replica};
pub use crate::round::ProposalNumber;
pub use crate::server::Server;
pub use crate::slot::{SlotEntry, SlotLog};
pub use crate::socket::Socket;
pub use crate::state::{Role, State};
pub use crate::storage::{Snapshot, Storage};
