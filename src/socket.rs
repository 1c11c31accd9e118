//! # Summary
//!
//! This module abstracts over the datagram transport shared by replicas and
//! clients. Every datagram carries a single `bincode`-encoded value.
//!
//! Sending never fails from the caller's point of view: the protocol already
//! tolerates lost datagrams, so encoding and transmission failures are
//! logged and treated as drops. A configurable drop rate injects loss on
//! purpose.

use std::fmt::Debug;
use std::net::SocketAddr;

use rand::Rng;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::net::UdpSocket;

use crate::error::Error;

/// Receive buffer size.
const MAX_DATAGRAM: usize = 65_536;

/// Largest payload a single UDP datagram can carry over IPv4.
pub(crate) const MAX_PAYLOAD: usize = 65_507;

pub struct Socket {
    socket: UdpSocket,

    /// Percentage of outbound datagrams silently discarded
    drop_rate: u8,
}

impl Socket {
    pub async fn bind(addr: SocketAddr) -> Result<Self, Error> {
        let socket = UdpSocket::bind(addr).await?;
        Ok(Socket { socket, drop_rate: 0 })
    }

    /// Drops `drop_rate` percent of outbound datagrams. Clamped to 100.
    pub fn with_drop_rate(mut self, drop_rate: u8) -> Self {
        self.drop_rate = std::cmp::min(drop_rate, 100);
        self
    }

    pub fn local_addr(&self) -> Result<SocketAddr, Error> {
        Ok(self.socket.local_addr()?)
    }

    pub fn send<T: Serialize + Debug>(&self, addr: SocketAddr, message: &T) {
        if self.drop_rate > 0 && rand::thread_rng().gen_range(0..100u8) < self.drop_rate {
            trace!("dropping {:?} to {}", message, addr);
            return
        }
        let bytes = match bincode::serialize(message) {
        | Ok(bytes) => bytes,
        | Err(error) => {
            warn!("could not encode {:?}: {}", message, error);
            return
        }
        };
        if bytes.len() > MAX_PAYLOAD {
            warn!("dropping {}-byte datagram to {}: over the {}-byte limit", bytes.len(), addr, MAX_PAYLOAD);
            return
        }
        if let Err(error) = self.socket.try_send_to(&bytes, addr) {
            warn!("could not send to {}: {}", addr, error);
        }
    }

    /// Waits for the next datagram. A datagram that fails to decode is
    /// reported as `Error::Decode`; the socket stays usable.
    pub async fn recv<T: DeserializeOwned>(&self) -> Result<(T, SocketAddr), Error> {
        let mut buffer = vec![0u8; MAX_DATAGRAM];
        let (len, from) = self.socket.recv_from(&mut buffer).await?;
        let message = bincode::deserialize(&buffer[..len])?;
        Ok((message, from))
    }
}
