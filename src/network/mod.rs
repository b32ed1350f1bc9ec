// Emulated Network Transport
//
// In-process message bus standing in for a real datagram network. Each
// registered address owns a delivery buffer; `send` enqueues best-effort
// (unknown destinations and injected losses drop the datagram) and `drain`
// hands everything queued for an address to the node's recv step.
//
// Datagrams carry a protocol tag so a node can route them into the right
// per-component inbox (gossip vs kv) without peeking at payload bytes.

use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use dashmap::DashMap;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::KvError;

/// Node address: 4-byte identifier plus 2-byte port, compared byte-wise.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Address {
    pub id: u32,
    pub port: u16,
}

impl Address {
    pub const fn new(id: u32, port: u16) -> Self {
        Self { id, port }
    }

    /// Packed 6-byte wire form: little-endian id followed by port.
    pub fn to_bytes(&self) -> [u8; 6] {
        let mut bytes = [0u8; 6];
        bytes[..4].copy_from_slice(&self.id.to_le_bytes());
        bytes[4..].copy_from_slice(&self.port.to_le_bytes());
        bytes
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.id, self.port)
    }
}

impl FromStr for Address {
    type Err = KvError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (id, port) = s
            .split_once(':')
            .ok_or_else(|| KvError::InvalidAddress(s.to_string()))?;
        let id = id
            .parse()
            .map_err(|_| KvError::InvalidAddress(s.to_string()))?;
        let port = port
            .parse()
            .map_err(|_| KvError::InvalidAddress(s.to_string()))?;
        Ok(Self { id, port })
    }
}

/// Which per-component inbox a datagram belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Gossip,
    Kv,
}

/// One in-flight message.
#[derive(Debug, Clone)]
pub struct Datagram {
    pub from: Address,
    pub to: Address,
    pub protocol: Protocol,
    pub payload: Bytes,
}

/// Emulated best-effort transport shared by every node in a cluster.
///
/// Delivery is FIFO per destination buffer in this emulation, but protocol
/// logic must not depend on more than best-effort semantics: sends to
/// unregistered addresses vanish, and a configurable loss model can drop
/// any datagram.
pub struct EmulNet {
    buffers: DashMap<Address, VecDeque<Datagram>>,
    drop_rate: f64,
    rng: Mutex<StdRng>,
    sent: AtomicU64,
    delivered: AtomicU64,
    dropped: AtomicU64,
}

impl EmulNet {
    pub fn new(seed: u64, drop_rate: f64) -> Self {
        Self {
            buffers: DashMap::new(),
            drop_rate: drop_rate.clamp(0.0, 1.0),
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            sent: AtomicU64::new(0),
            delivered: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    /// Create the delivery buffer for a node.
    pub fn register(&self, addr: Address) {
        self.buffers.entry(addr).or_default();
    }

    /// Tear down a node's buffer; queued and future datagrams are lost.
    pub fn deregister(&self, addr: Address) {
        self.buffers.remove(&addr);
    }

    pub fn is_registered(&self, addr: Address) -> bool {
        self.buffers.contains_key(&addr)
    }

    /// Enqueue a datagram best-effort.
    pub fn send(&self, from: Address, to: Address, protocol: Protocol, payload: Bytes) {
        self.sent.fetch_add(1, Ordering::Relaxed);

        if self.drop_rate > 0.0 && self.rng.lock().random_bool(self.drop_rate) {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            return;
        }

        match self.buffers.get_mut(&to) {
            Some(mut buffer) => {
                buffer.push_back(Datagram {
                    from,
                    to,
                    protocol,
                    payload,
                });
                self.delivered.fetch_add(1, Ordering::Relaxed);
            }
            None => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Remove and return everything queued for `addr`, oldest first.
    pub fn drain(&self, addr: Address) -> Vec<Datagram> {
        self.buffers
            .get_mut(&addr)
            .map(|mut buffer| buffer.drain(..).collect())
            .unwrap_or_default()
    }

    /// Traffic counters: (sent, delivered, dropped).
    pub fn stats(&self) -> (u64, u64, u64) {
        (
            self.sent.load(Ordering::Relaxed),
            self.delivered.load(Ordering::Relaxed),
            self.dropped.load(Ordering::Relaxed),
        )
    }
}
