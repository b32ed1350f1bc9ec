// Membership Protocol Module
//
// Gossip-style SWIM variant providing failure detection and an eventually
// consistent view of the live group:
//
// - `table`: member entries, tagged liveness state, gossip merge rules
// - `detector`: per-round protocol driver (join, timeouts, gossip fanout)
// - `wire`: binary codec for join and heartbeat traffic

pub mod detector;
pub mod table;
pub mod wire;

pub use detector::FailureDetector;
pub use table::{MemberEntry, MemberState, MembershipTable, ReportedBeat};
pub use wire::{GossipMessage, HeartbeatEntry};
