// Simulation Harness
//
// Round-driven cluster driver owning the emulated network, the shared
// event log and the discrete clock. Each round runs two phases over the
// surviving nodes: every node drains its delivery buffer, then every node
// ticks. Messages sent while ticking in round r are therefore observed in
// round r+1 on every node. The introducer must be added before any joiner
// so the join request finds a live buffer.

use std::sync::Arc;

use tracing::info;

use crate::config::SimConfig;
use crate::error::{KvError, Result};
use crate::events::EventLog;
use crate::network::{Address, EmulNet};
use crate::node::Node;
use crate::ring::{self, RingNode};

pub struct Cluster {
    net: Arc<EmulNet>,
    log: Arc<EventLog>,
    nodes: Vec<Node>,
    round: u64,
    config: SimConfig,
}

impl Cluster {
    pub fn new(config: SimConfig) -> Self {
        Self {
            net: Arc::new(EmulNet::new(config.seed, config.drop_rate)),
            log: Arc::new(EventLog::new()),
            nodes: Vec::new(),
            round: 0,
            config,
        }
    }

    pub fn add_node(&mut self, addr: Address) -> Result<()> {
        if self.nodes.iter().any(|n| n.addr() == addr) {
            return Err(KvError::Configuration(format!(
                "duplicate node address {addr}"
            )));
        }
        // Distinct deterministic gossip seed per node.
        let seed = self.config.seed ^ ((addr.id as u64) << 16) ^ addr.port as u64;
        let node = Node::new(
            addr,
            seed,
            Arc::clone(&self.net),
            Arc::clone(&self.log),
            self.round,
        )?;
        self.nodes.push(node);
        Ok(())
    }

    /// Silent node death: the process stops participating and its delivery
    /// buffer disappears, exactly like a crash between rounds.
    pub fn kill(&mut self, addr: Address) {
        self.nodes.retain(|n| n.addr() != addr);
        self.net.deregister(addr);
        info!(%addr, "node killed");
    }

    pub fn run_round(&mut self) {
        self.round += 1;
        for node in &mut self.nodes {
            node.recv();
        }
        for node in &mut self.nodes {
            node.tick(self.round);
        }
    }

    pub fn run_rounds(&mut self, rounds: u64) {
        for _ in 0..rounds {
            self.run_round();
        }
    }

    pub fn round(&self) -> u64 {
        self.round
    }

    pub fn log(&self) -> &EventLog {
        &self.log
    }

    pub fn net(&self) -> &EmulNet {
        &self.net
    }

    pub fn addresses(&self) -> Vec<Address> {
        self.nodes.iter().map(Node::addr).collect()
    }

    pub fn node(&self, addr: Address) -> Option<&Node> {
        self.nodes.iter().find(|n| n.addr() == addr)
    }

    fn node_mut(&mut self, addr: Address) -> Result<&mut Node> {
        self.nodes
            .iter_mut()
            .find(|n| n.addr() == addr)
            .ok_or_else(|| KvError::Network(format!("no node at {addr}")))
    }

    // ---- client operations -------------------------------------------

    pub fn client_create(&mut self, at: Address, key: &str, value: &str) -> Result<()> {
        self.node_mut(at)?.kv_mut().client_create(key, value);
        Ok(())
    }

    pub fn client_read(&mut self, at: Address, key: &str) -> Result<()> {
        self.node_mut(at)?.kv_mut().client_read(key);
        Ok(())
    }

    pub fn client_update(&mut self, at: Address, key: &str, value: &str) -> Result<()> {
        self.node_mut(at)?.kv_mut().client_update(key, value);
        Ok(())
    }

    pub fn client_delete(&mut self, at: Address, key: &str) -> Result<()> {
        self.node_mut(at)?.kv_mut().client_delete(key);
        Ok(())
    }

    // ---- inspection --------------------------------------------------

    pub fn membership_size(&self, addr: Address) -> Option<usize> {
        self.node(addr).map(|n| n.detector().table().len())
    }

    pub fn in_group(&self, addr: Address) -> bool {
        self.node(addr).is_some_and(|n| n.detector().in_group())
    }

    pub fn live_view(&self, addr: Address) -> Option<Vec<Address>> {
        self.node(addr).map(|n| n.detector().live_members())
    }

    pub fn ring_of(&self, addr: Address) -> Option<Vec<RingNode>> {
        self.node(addr).map(|n| n.kv().ring().to_vec())
    }

    pub fn holds_key(&self, addr: Address, key: &str) -> bool {
        self.node(addr).is_some_and(|n| n.kv().store().contains(key))
    }

    /// Replica set for a key under the ring a given node currently sees.
    pub fn replicas_for(&self, at: Address, key: &str) -> Vec<Address> {
        self.node(at)
            .map(|n| ring::find_replicas(key, n.kv().ring()))
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config;

    #[test]
    fn test_duplicate_node_rejected() {
        let mut cluster = Cluster::new(SimConfig::default());
        cluster.add_node(config::introducer()).unwrap();
        assert!(cluster.add_node(config::introducer()).is_err());
    }

    #[test]
    fn test_rounds_advance_the_clock() {
        let mut cluster = Cluster::new(SimConfig::default());
        cluster.add_node(config::introducer()).unwrap();
        cluster.run_rounds(3);
        assert_eq!(cluster.round(), 3);
    }

    #[test]
    fn test_kill_removes_node_and_buffer() {
        let mut cluster = Cluster::new(SimConfig::default());
        let a = config::introducer();
        let b = Address::new(2, 0);
        cluster.add_node(a).unwrap();
        cluster.add_node(b).unwrap();
        cluster.run_rounds(3);

        cluster.kill(b);
        assert_eq!(cluster.addresses(), vec![a]);
        assert!(!cluster.net().is_registered(b));
        assert!(cluster.node(b).is_none());
    }

    #[test]
    fn test_client_op_at_unknown_node_errors() {
        let mut cluster = Cluster::new(SimConfig::default());
        cluster.add_node(config::introducer()).unwrap();
        assert!(cluster.client_create(Address::new(9, 9), "k", "v").is_err());
    }
}
