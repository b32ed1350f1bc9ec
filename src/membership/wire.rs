// Membership wire format.
//
// Binary codec for join and heartbeat traffic. The packed layout of the
// original protocol (type byte, 4-byte id, 2-byte port, heartbeat counter)
// is expressed as a tagged variant encoded with bincode; field semantics
// are unchanged. The failed mark carries no timestamp: the receiver stamps
// its own suspicion round.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::membership::table::ReportedBeat;
use crate::network::Address;

/// One member's reported heartbeat as carried in gossip payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartbeatEntry {
    pub id: u32,
    pub port: u16,
    pub beat: ReportedBeat,
}

impl HeartbeatEntry {
    pub fn new(addr: Address, beat: ReportedBeat) -> Self {
        Self {
            id: addr.id,
            port: addr.port,
            beat,
        }
    }

    pub fn addr(&self) -> Address {
        Address::new(self.id, self.port)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GossipMessage {
    /// Joiner -> introducer: announce self.
    JoinRequest(HeartbeatEntry),
    /// Introducer -> joiner: full table.
    JoinReply(Vec<HeartbeatEntry>),
    /// Periodic table digest to random peers.
    PingHeartbeat(Vec<HeartbeatEntry>),
}

impl GossipMessage {
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(bincode::serde::encode_to_vec(
            self,
            bincode::config::standard(),
        )?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let (message, _) =
            bincode::serde::decode_from_slice(bytes, bincode::config::standard())?;
        Ok(message)
    }
}
