// Failure detector: the per-round membership protocol driver.
//
// Each round, in order: advance the own heartbeat, drain the gossip inbox
// applying the merge rules, run the suspicion/eviction pass, then gossip
// the full table to a random handful of live peers. A node that is not the
// introducer starts in a waiting state: it has announced itself with a
// join request and acts on nothing but join traffic until the reply
// arrives.

use std::collections::VecDeque;
use std::sync::Arc;

use bytes::Bytes;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::{debug, warn};

use crate::config::{self, PING_NBR_CNT};
use crate::events::EventLog;
use crate::membership::table::{MembershipTable, ReportedBeat};
use crate::membership::wire::{GossipMessage, HeartbeatEntry};
use crate::network::{Address, EmulNet, Protocol};

pub struct FailureDetector {
    addr: Address,
    table: MembershipTable,
    in_group: bool,
    inbox: VecDeque<Bytes>,
    rng: StdRng,
    net: Arc<EmulNet>,
    log: Arc<EventLog>,
}

impl FailureDetector {
    /// Boot the membership layer. The introducer forms the group on its
    /// own; everyone else announces itself to the introducer and waits.
    pub fn new(
        addr: Address,
        seed: u64,
        net: Arc<EmulNet>,
        log: Arc<EventLog>,
        now: u64,
    ) -> crate::error::Result<Self> {
        let mut detector = Self {
            addr,
            table: MembershipTable::new(addr, now),
            in_group: false,
            inbox: VecDeque::new(),
            rng: StdRng::seed_from_u64(seed),
            net,
            log,
        };

        if addr == config::introducer() {
            detector.in_group = true;
            detector.log.node_add(addr, addr);
        } else {
            let request = GossipMessage::JoinRequest(HeartbeatEntry::new(
                addr,
                ReportedBeat::Alive(0),
            ));
            let bytes = request.encode()?;
            detector
                .net
                .send(addr, config::introducer(), Protocol::Gossip, Bytes::from(bytes));
            debug!(node = %addr, "join request sent to introducer");
        }

        Ok(detector)
    }

    pub fn addr(&self) -> Address {
        self.addr
    }

    pub fn in_group(&self) -> bool {
        self.in_group
    }

    pub fn table(&self) -> &MembershipTable {
        &self.table
    }

    pub fn live_members(&self) -> Vec<Address> {
        self.table.live_members()
    }

    /// Queue a received gossip payload for the next tick.
    pub fn enqueue(&mut self, payload: Bytes) {
        self.inbox.push_back(payload);
    }

    /// One membership round.
    pub fn tick(&mut self, now: u64) {
        if self.in_group {
            self.table.advance_self(now);
        }

        self.drain_inbox(now);

        if !self.in_group {
            return;
        }

        for removed in self.table.expire(now) {
            self.log.node_remove(self.addr, removed);
        }

        self.gossip();
    }

    fn drain_inbox(&mut self, now: u64) {
        while let Some(payload) = self.inbox.pop_front() {
            match GossipMessage::decode(&payload) {
                Ok(message) => self.handle_message(message, now),
                Err(err) => {
                    debug!(node = %self.addr, %err, "dropping undecodable gossip payload")
                }
            }
        }
    }

    fn handle_message(&mut self, message: GossipMessage, now: u64) {
        match message {
            GossipMessage::JoinRequest(entry) => {
                if self.addr != config::introducer() {
                    warn!(node = %self.addr, from = %entry.addr(), "join request at non-introducer; ignoring");
                    return;
                }
                let joiner = entry.addr();
                self.merge_entries([entry], now);
                let reply = GossipMessage::JoinReply(self.digest());
                self.send_gossip(joiner, &reply);
            }
            GossipMessage::JoinReply(entries) => {
                self.merge_entries(entries, now);
                if !self.in_group {
                    debug!(node = %self.addr, members = self.table.len(), "joined group");
                    self.in_group = true;
                }
            }
            GossipMessage::PingHeartbeat(entries) => {
                // Waiting state: act on join traffic only.
                if !self.in_group {
                    return;
                }
                self.merge_entries(entries, now);
            }
        }
    }

    fn merge_entries<I>(&mut self, entries: I, now: u64)
    where
        I: IntoIterator<Item = HeartbeatEntry>,
    {
        for entry in entries {
            if self.table.merge(entry.addr(), entry.beat, now) {
                self.log.node_add(self.addr, entry.addr());
            }
        }
    }

    /// Send the table digest to up to PING_NBR_CNT random live peers.
    /// Failed entries are passed over while more live peers remain, keeping
    /// the fanout up.
    fn gossip(&mut self) {
        let peers: Vec<(Address, bool)> = self.table.entries()[1..]
            .iter()
            .map(|e| (e.addr, e.state.is_failed()))
            .collect();
        if peers.is_empty() {
            return;
        }

        let mut order: Vec<usize> = (0..peers.len()).collect();
        order.shuffle(&mut self.rng);

        let message = GossipMessage::PingHeartbeat(self.digest());
        let mut sent = 0;
        for index in order {
            if sent >= PING_NBR_CNT {
                break;
            }
            let (peer, failed) = peers[index];
            if failed {
                continue;
            }
            self.send_gossip(peer, &message);
            sent += 1;
        }
    }

    /// The current table as wire entries, owner first.
    fn digest(&self) -> Vec<HeartbeatEntry> {
        self.table
            .snapshot()
            .into_iter()
            .map(|(addr, beat)| HeartbeatEntry::new(addr, beat))
            .collect()
    }

    fn send_gossip(&self, to: Address, message: &GossipMessage) {
        match message.encode() {
            Ok(bytes) => {
                self.net
                    .send(self.addr, to, Protocol::Gossip, Bytes::from(bytes))
            }
            Err(err) => warn!(node = %self.addr, %err, "failed to encode gossip message"),
        }
    }
}
