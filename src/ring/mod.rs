// Consistent-Hash Ring
//
// Derived view over the live membership: every live member hashed to a
// position mod RING_SIZE, sorted ascending with address bytes breaking
// ties so every node derives the identical ring. The ring is rebuilt, never
// mutated, on each kv tick; positional comparison against the previous
// ring is the stabilization trigger.
//
// Positions come from the std DefaultHasher: SipHash with fixed keys, so
// every node of a build computes the same placement. Agreeing on the
// algorithm is a correctness requirement here, not a performance choice.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::config::{REPLICA_COUNT, RING_SIZE};
use crate::network::Address;

/// Position on the ring (0..RING_SIZE).
pub type RingPosition = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RingNode {
    pub addr: Address,
    pub hash: RingPosition,
}

/// Hash a key to its ring position.
pub fn hash_position(key: &str) -> RingPosition {
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    hasher.finish() % RING_SIZE
}

fn address_position(addr: Address) -> RingPosition {
    let mut hasher = DefaultHasher::new();
    addr.to_bytes().hash(&mut hasher);
    hasher.finish() % RING_SIZE
}

/// Build the sorted ring for a set of live members.
pub fn build_ring(members: &[Address]) -> Vec<RingNode> {
    let mut ring: Vec<RingNode> = members
        .iter()
        .map(|&addr| RingNode {
            addr,
            hash: address_position(addr),
        })
        .collect();
    ring.sort_by(|a, b| {
        a.hash
            .cmp(&b.hash)
            .then_with(|| a.addr.to_bytes().cmp(&b.addr.to_bytes()))
    });
    ring
}

/// Positional comparison: any length difference or per-slot hash mismatch
/// counts as a change.
pub fn ring_changed(old: &[RingNode], new: &[RingNode]) -> bool {
    old.len() != new.len() || old.iter().zip(new).any(|(a, b)| a.hash != b.hash)
}

/// The nodes responsible for a key: the first ring node at or after the
/// key's position plus its successors, wrapping past the top. Fewer than
/// REPLICA_COUNT live members yields no replicas at all.
pub fn find_replicas(key: &str, ring: &[RingNode]) -> Vec<Address> {
    if ring.len() < REPLICA_COUNT {
        return Vec::new();
    }
    let pos = hash_position(key);
    let primary = ring.iter().position(|node| node.hash >= pos).unwrap_or(0);
    (0..REPLICA_COUNT)
        .map(|i| ring[(primary + i) % ring.len()].addr)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn members(n: u32) -> Vec<Address> {
        (1..=n).map(|id| Address::new(id, 0)).collect()
    }

    #[test]
    fn test_ring_sorted_ascending() {
        let ring = build_ring(&members(8));
        assert_eq!(ring.len(), 8);
        for pair in ring.windows(2) {
            assert!(pair[0].hash <= pair[1].hash);
        }
    }

    #[test]
    fn test_ring_independent_of_member_order() {
        let mut reversed = members(8);
        reversed.reverse();
        assert_eq!(build_ring(&members(8)), build_ring(&reversed));
    }

    #[test]
    fn test_ring_change_detection() {
        let ring5 = build_ring(&members(5));
        let ring6 = build_ring(&members(6));
        assert!(ring_changed(&ring5, &ring6));
        assert!(!ring_changed(&ring5, &ring5.clone()));
        assert!(ring_changed(&[], &ring5));
    }

    #[test]
    fn test_too_few_members_yields_no_replicas() {
        assert!(find_replicas("k", &build_ring(&members(2))).is_empty());
        assert!(find_replicas("k", &[]).is_empty());
    }

    #[test]
    fn test_replicas_are_primary_and_successors() {
        let ring = build_ring(&members(6));
        let replicas = find_replicas("some-key", &ring);
        assert_eq!(replicas.len(), REPLICA_COUNT);

        let pos = hash_position("some-key");
        let primary = ring.iter().position(|n| n.hash >= pos).unwrap_or(0);
        for (i, replica) in replicas.iter().enumerate() {
            assert_eq!(*replica, ring[(primary + i) % ring.len()].addr);
        }
    }

    #[test]
    fn test_replicas_distinct_on_big_ring() {
        let ring = build_ring(&members(10));
        let replicas = find_replicas("another-key", &ring);
        assert_eq!(replicas.len(), 3);
        assert_ne!(replicas[0], replicas[1]);
        assert_ne!(replicas[1], replicas[2]);
        assert_ne!(replicas[0], replicas[2]);
    }

    #[test]
    fn test_wraparound_past_highest_position() {
        let ring = build_ring(&members(5));
        // Any key hashing past the last node must wrap to the ring head.
        let top = ring.last().unwrap().hash;
        for i in 0..200u32 {
            let key = format!("probe-{i}");
            if hash_position(&key) > top {
                let replicas = find_replicas(&key, &ring);
                assert_eq!(replicas[0], ring[0].addr);
                return;
            }
        }
        // All sampled keys landed at or below the top position; the sort
        // invariant above still covers ordering.
    }

    #[test]
    fn test_positions_are_stable() {
        assert_eq!(hash_position("k"), hash_position("k"));
        assert!(hash_position("k") < RING_SIZE);
    }
}
