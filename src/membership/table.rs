// Membership table: this node's view of the group.
//
// Ordered list of member entries with the owning node pinned at index 0.
// Entries for other members change only through the gossip merge rules; the
// failed state is sticky until eviction, so a suspicion cannot be undone by
// a stale heartbeat arriving late.

use serde::{Deserialize, Serialize};

use crate::config::{TFAIL, TREMOVE};
use crate::network::Address;

/// Liveness state of a table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MemberState {
    /// Member is reporting heartbeats.
    Alive { heartbeat: u64 },
    /// Suspected dead; retained so the suspicion can be gossiped.
    Failed { since: u64 },
}

impl MemberState {
    pub fn is_failed(&self) -> bool {
        matches!(self, MemberState::Failed { .. })
    }

    pub fn heartbeat(&self) -> Option<u64> {
        match self {
            MemberState::Alive { heartbeat } => Some(*heartbeat),
            MemberState::Failed { .. } => None,
        }
    }
}

/// Heartbeat as reported in gossip: a counter value or a failed mark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportedBeat {
    Alive(u64),
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberEntry {
    pub addr: Address,
    pub state: MemberState,
    /// Local round of the last state transition.
    pub timestamp: u64,
}

/// Ordered member list; the owning node's entry is always index 0.
#[derive(Debug, Clone)]
pub struct MembershipTable {
    entries: Vec<MemberEntry>,
}

impl MembershipTable {
    pub fn new(self_addr: Address, now: u64) -> Self {
        Self {
            entries: vec![MemberEntry {
                addr: self_addr,
                state: MemberState::Alive { heartbeat: 0 },
                timestamp: now,
            }],
        }
    }

    pub fn self_addr(&self) -> Address {
        self.entries[0].addr
    }

    pub fn self_entry(&self) -> &MemberEntry {
        &self.entries[0]
    }

    pub fn entries(&self) -> &[MemberEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, addr: Address) -> Option<&MemberEntry> {
        self.entries.iter().find(|e| e.addr == addr)
    }

    pub fn contains(&self, addr: Address) -> bool {
        self.get(addr).is_some()
    }

    /// Bump the owner's heartbeat for a new round.
    pub fn advance_self(&mut self, now: u64) {
        let entry = &mut self.entries[0];
        if let MemberState::Alive { heartbeat } = &mut entry.state {
            *heartbeat += 1;
        }
        entry.timestamp = now;
    }

    /// Apply one gossiped observation. Returns true when a previously
    /// unknown member was inserted (the caller logs NodeAdd).
    ///
    /// Monotone heartbeats win; failed reports stick; observations about
    /// the owner are ignored (only the owner mutates its own heartbeat).
    pub fn merge(&mut self, addr: Address, beat: ReportedBeat, now: u64) -> bool {
        if addr == self.self_addr() {
            return false;
        }

        match self.entries.iter_mut().find(|e| e.addr == addr) {
            Some(entry) => {
                match (entry.state, beat) {
                    // Sticky: only eviction removes a failed entry.
                    (MemberState::Failed { .. }, _) => {}
                    (MemberState::Alive { .. }, ReportedBeat::Failed) => {
                        entry.state = MemberState::Failed { since: now };
                        entry.timestamp = now;
                    }
                    (MemberState::Alive { heartbeat }, ReportedBeat::Alive(hb)) => {
                        if hb > heartbeat {
                            entry.state = MemberState::Alive { heartbeat: hb };
                            entry.timestamp = now;
                        }
                    }
                }
                false
            }
            None => match beat {
                ReportedBeat::Alive(hb) => {
                    self.entries.push(MemberEntry {
                        addr,
                        state: MemberState::Alive { heartbeat: hb },
                        timestamp: now,
                    });
                    true
                }
                // An unknown member reported failed would be evicted anyway.
                ReportedBeat::Failed => false,
            },
        }
    }

    /// Suspicion/eviction pass. Silent members are marked failed after
    /// TFAIL rounds; failed members are deleted after TREMOVE more. Returns
    /// the addresses evicted this round (the caller logs NodeRemove).
    pub fn expire(&mut self, now: u64) -> Vec<Address> {
        for entry in self.entries.iter_mut().skip(1) {
            if let MemberState::Alive { .. } = entry.state {
                if now.saturating_sub(entry.timestamp) > TFAIL {
                    entry.state = MemberState::Failed { since: now };
                    entry.timestamp = now;
                }
            }
        }

        let mut evicted = Vec::new();
        self.entries.retain(|entry| {
            if let MemberState::Failed { .. } = entry.state {
                if now.saturating_sub(entry.timestamp) > TREMOVE {
                    evicted.push(entry.addr);
                    return false;
                }
            }
            true
        });
        evicted
    }

    /// The full table as gossiped observations, owner first.
    pub fn snapshot(&self) -> Vec<(Address, ReportedBeat)> {
        self.entries
            .iter()
            .map(|entry| {
                let beat = match entry.state {
                    MemberState::Alive { heartbeat } => ReportedBeat::Alive(heartbeat),
                    MemberState::Failed { .. } => ReportedBeat::Failed,
                };
                (entry.addr, beat)
            })
            .collect()
    }

    /// Addresses of all non-failed members, self included.
    pub fn live_members(&self) -> Vec<Address> {
        self.entries
            .iter()
            .filter(|e| !e.state.is_failed())
            .map(|e| e.addr)
            .collect()
    }
}
