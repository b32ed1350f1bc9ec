// Protocol Constants and Harness Configuration
//
// Every constant here is part of the cross-node contract: all nodes in a
// cluster must agree on these values for the failure detection windows,
// quorum arithmetic and ring geometry to line up.

use crate::network::Address;

/// Rounds of silence before a member is suspected (marked failed).
pub const TFAIL: u64 = 10;

/// Rounds a failed member is retained before eviction.
pub const TREMOVE: u64 = 15;

/// Gossip fanout: peers pinged with a table digest each round.
pub const PING_NBR_CNT: usize = 4;

/// Replica replies required to finalize a client operation.
pub const QUORUM: usize = 2;

/// Rounds before an open transaction is failed.
pub const TIMEOUT_SEC: u64 = 10;

/// Copies kept of every key.
pub const REPLICA_COUNT: usize = 3;

/// Ring modulus for consistent hashing.
pub const RING_SIZE: u64 = 512;

/// Sentinel transaction id tagging stabilization repair traffic.
pub const STAB_TRANS: i64 = -1;

/// Rendezvous address new nodes send their join request to.
pub fn introducer() -> Address {
    Address::new(1, 0)
}

// Simulation harness configuration
#[derive(Debug, Clone)]
pub struct SimConfig {
    // Base seed; per-node gossip seeds and the loss model derive from it
    pub seed: u64,
    // Probability that the emulated network drops a datagram
    pub drop_rate: f64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 0x5eed,
            drop_rate: 0.0,
        }
    }
}
