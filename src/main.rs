// ringkv-sim: demo driver for the emulated cluster.
//
// Boots a cluster, loads keys through the introducer, kills a few nodes
// and lets the membership and stabilization protocols converge. Knobs via
// environment: RINGKV_NODES (default 10), RINGKV_KEYS (default 30),
// RINGKV_KILLS (default 3), RINGKV_SEED, RINGKV_DROP (loss probability),
// RINGKV_LOG (tracing level).

use ringkv::config::{self, SimConfig, TFAIL, TREMOVE};
use ringkv::error::Result;
use ringkv::events::{self, Event};
use ringkv::network::Address;
use ringkv::sim::Cluster;

fn env_u64(name: &str, default: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_f64(name: &str, default: f64) -> f64 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn main() -> Result<()> {
    events::init_tracing();

    let nodes = env_u64("RINGKV_NODES", 10).max(1);
    let keys = env_u64("RINGKV_KEYS", 30);
    let kills = env_u64("RINGKV_KILLS", 3).min(nodes.saturating_sub(3));
    let sim_config = SimConfig {
        seed: env_u64("RINGKV_SEED", 0x5eed),
        drop_rate: env_f64("RINGKV_DROP", 0.0),
    };

    let mut cluster = Cluster::new(sim_config);
    cluster.add_node(config::introducer())?;
    for id in 2..=nodes as u32 {
        cluster.add_node(Address::new(id, 0))?;
    }
    cluster.run_rounds(15); // membership convergence

    let coordinator = config::introducer();
    for i in 0..keys {
        cluster.client_create(coordinator, &format!("key-{i}"), &format!("value-{i}"))?;
    }
    cluster.run_rounds(12); // quorum finalization

    for i in 0..kills {
        cluster.kill(Address::new((nodes - i) as u32, 0));
    }
    cluster.run_rounds(TFAIL + TREMOVE + 10); // eviction + stabilization

    let events = cluster.log().events();
    let adds = events
        .iter()
        .filter(|e| matches!(e, Event::NodeAdd { .. }))
        .count();
    let removes = events
        .iter()
        .filter(|e| matches!(e, Event::NodeRemove { .. }))
        .count();
    let coordinator_outcomes = cluster.log().coordinator_events(coordinator);
    let successes = coordinator_outcomes.iter().filter(|e| e.success).count();
    let failures = coordinator_outcomes.len() - successes;

    let replicated = (0..keys)
        .filter(|i| {
            let key = format!("key-{i}");
            let replicas = cluster.replicas_for(coordinator, &key);
            !replicas.is_empty() && replicas.iter().all(|&r| cluster.holds_key(r, &key))
        })
        .count();

    let (sent, delivered, dropped) = cluster.net().stats();
    println!("rounds run:            {}", cluster.round());
    println!("membership events:     {adds} adds, {removes} removes");
    println!("coordinator outcomes:  {successes} success, {failures} fail");
    println!("fully replicated keys: {replicated}/{keys}");
    println!("network datagrams:     {sent} sent, {delivered} delivered, {dropped} dropped");

    Ok(())
}
