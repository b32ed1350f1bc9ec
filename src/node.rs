// Node: one process in the cluster.
//
// Couples the membership failure detector with the kv layer over a shared
// address. Per round the harness calls `recv` (drain the network delivery
// buffer, routing each datagram into the right per-component inbox) and
// then `tick` (membership first, then kv over the resulting live view).

use std::sync::Arc;

use crate::error::Result;
use crate::events::EventLog;
use crate::kv::KvNode;
use crate::membership::FailureDetector;
use crate::network::{Address, EmulNet, Protocol};

pub struct Node {
    addr: Address,
    net: Arc<EmulNet>,
    detector: FailureDetector,
    kv: KvNode,
}

impl Node {
    pub fn new(
        addr: Address,
        seed: u64,
        net: Arc<EmulNet>,
        log: Arc<EventLog>,
        now: u64,
    ) -> Result<Self> {
        net.register(addr);
        let detector =
            FailureDetector::new(addr, seed, Arc::clone(&net), Arc::clone(&log), now)?;
        let kv = KvNode::new(addr, Arc::clone(&net), log);
        Ok(Self {
            addr,
            net,
            detector,
            kv,
        })
    }

    pub fn addr(&self) -> Address {
        self.addr
    }

    /// Drain the delivery buffer into the per-component inboxes.
    pub fn recv(&mut self) {
        for datagram in self.net.drain(self.addr) {
            match datagram.protocol {
                Protocol::Gossip => self.detector.enqueue(datagram.payload),
                Protocol::Kv => self.kv.enqueue(datagram.payload),
            }
        }
    }

    /// One protocol round.
    pub fn tick(&mut self, now: u64) {
        self.detector.tick(now);
        self.kv.tick(now, &self.detector.live_members());
    }

    pub fn detector(&self) -> &FailureDetector {
        &self.detector
    }

    pub fn kv(&self) -> &KvNode {
        &self.kv
    }

    pub fn kv_mut(&mut self) -> &mut KvNode {
        &mut self.kv
    }
}
