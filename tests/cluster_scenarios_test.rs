// Replicated KV Cluster Scenarios
//
// End-to-end runs over the simulation harness: quorum CRUD with exact
// event accounting, reads across replica failure, and stabilization after
// churn. All scenarios are deterministic under the fixed harness seed.

use ringkv::config::{self, SimConfig, TFAIL, TIMEOUT_SEC, TREMOVE};
use ringkv::events::KvOp;
use ringkv::network::Address;
use ringkv::sim::Cluster;

fn converged_cluster(n: u32) -> Cluster {
    let mut cluster = Cluster::new(SimConfig::default());
    cluster
        .add_node(config::introducer())
        .expect("introducer boots");
    for id in 2..=n {
        cluster.add_node(Address::new(id, 0)).expect("node boots");
    }
    cluster.run_rounds(20);

    // Every node must see the same ring before the scenarios start.
    let reference = cluster.ring_of(config::introducer()).unwrap();
    assert_eq!(reference.len(), n as usize);
    for addr in cluster.addresses() {
        assert_eq!(cluster.ring_of(addr).unwrap(), reference, "ring at {addr}");
    }
    cluster
}

#[test]
fn test_quorum_write_logs_one_coordinator_and_three_server_events() {
    let mut cluster = converged_cluster(5);
    let coordinator = config::introducer();

    cluster.client_create(coordinator, "k", "v").unwrap();
    cluster.run_rounds(5);

    let finalized = cluster.log().coordinator_events(coordinator);
    assert_eq!(finalized.len(), 1);
    assert!(finalized[0].success);
    assert_eq!(finalized[0].op, KvOp::Create);
    assert_eq!(finalized[0].key, "k");

    // Exactly the three replicas served the create, each exactly once.
    let replicas = cluster.replicas_for(coordinator, "k");
    assert_eq!(replicas.len(), 3);
    let mut servers = Vec::new();
    for addr in cluster.addresses() {
        for event in cluster.log().server_events(addr) {
            assert!(event.success);
            assert_eq!(event.op, KvOp::Create);
            servers.push(event.node);
        }
        assert_eq!(cluster.holds_key(addr, "k"), replicas.contains(&addr));
    }
    servers.sort();
    let mut expected = replicas.clone();
    expected.sort();
    assert_eq!(servers, expected);
    println!("✓ quorum write: one coordinator event, three server events");
}

#[test]
fn test_create_then_read_returns_value_at_quorum() {
    let mut cluster = converged_cluster(5);
    let coordinator = config::introducer();

    cluster.client_create(coordinator, "k", "v").unwrap();
    cluster.run_rounds(5);
    cluster.client_read(coordinator, "k").unwrap();
    cluster.run_rounds(5);

    let finalized = cluster.log().coordinator_events(coordinator);
    assert_eq!(finalized.len(), 2);
    let read = &finalized[1];
    assert_eq!(read.op, KvOp::Read);
    assert!(read.success);
    assert_eq!(read.value.as_deref(), Some("v"));
    println!("✓ create-then-read observes the written value");
}

#[test]
fn test_duplicate_create_fails_at_the_coordinator() {
    let mut cluster = converged_cluster(5);
    let coordinator = config::introducer();

    cluster.client_create(coordinator, "k", "v").unwrap();
    cluster.run_rounds(5);
    cluster.client_create(coordinator, "k", "other").unwrap();
    cluster.run_rounds(5);

    let finalized = cluster.log().coordinator_events(coordinator);
    assert_eq!(finalized.len(), 2);
    assert!(finalized[0].success);
    assert!(!finalized[1].success, "duplicate create must fail");
    println!("✓ duplicate create fails at every replica and the coordinator");
}

#[test]
fn test_update_and_delete_round_trip() {
    let mut cluster = converged_cluster(5);
    let coordinator = Address::new(3, 0);

    cluster.client_create(coordinator, "k", "v1").unwrap();
    cluster.run_rounds(5);
    cluster.client_update(coordinator, "k", "v2").unwrap();
    cluster.run_rounds(5);
    cluster.client_read(coordinator, "k").unwrap();
    cluster.run_rounds(5);
    cluster.client_delete(coordinator, "k").unwrap();
    cluster.run_rounds(5);
    cluster.client_read(coordinator, "k").unwrap();
    cluster.run_rounds(TIMEOUT_SEC + 2);

    let finalized = cluster.log().coordinator_events(coordinator);
    let outcomes: Vec<(KvOp, bool)> = finalized.iter().map(|e| (e.op, e.success)).collect();
    assert_eq!(
        outcomes,
        vec![
            (KvOp::Create, true),
            (KvOp::Update, true),
            (KvOp::Read, true),
            (KvOp::Delete, true),
            (KvOp::Read, false),
        ]
    );
    assert_eq!(finalized[2].value.as_deref(), Some("v2"));

    // The deleted key is gone from every store.
    for addr in cluster.addresses() {
        assert!(!cluster.holds_key(addr, "k"));
    }
    println!("✓ update/delete round trip with read-after-delete failure");
}

#[test]
fn test_read_survives_one_dead_replica() {
    let mut cluster = converged_cluster(5);
    let coordinator = config::introducer();

    cluster.client_create(coordinator, "k", "v").unwrap();
    cluster.run_rounds(5);

    // Kill one replica that is not the coordinator.
    let victim = cluster
        .replicas_for(coordinator, "k")
        .into_iter()
        .find(|&r| r != coordinator)
        .expect("a non-coordinator replica exists");
    cluster.kill(victim);
    cluster.run_rounds(TFAIL + TREMOVE + 10);

    cluster.client_read(coordinator, "k").unwrap();
    cluster.run_rounds(5);

    let reads: Vec<_> = cluster
        .log()
        .coordinator_events(coordinator)
        .into_iter()
        .filter(|e| e.op == KvOp::Read)
        .collect();
    assert_eq!(reads.len(), 1);
    assert!(reads[0].success, "read must reach quorum without {victim}");
    assert_eq!(reads[0].value.as_deref(), Some("v"));

    // Stabilization restored three live replicas for the key.
    let replicas = cluster.replicas_for(coordinator, "k");
    assert_eq!(replicas.len(), 3);
    for replica in replicas {
        assert!(cluster.holds_key(replica, "k"), "{replica} missing the key");
    }
    println!("✓ read finalizes at quorum with one replica dead");
}

#[test]
fn test_no_replicas_times_out_as_failure() {
    let mut cluster = converged_cluster(2);
    let coordinator = config::introducer();

    cluster.client_create(coordinator, "k", "v").unwrap();
    cluster.run_rounds(TIMEOUT_SEC + 2);

    let finalized = cluster.log().coordinator_events(coordinator);
    assert_eq!(finalized.len(), 1);
    assert!(!finalized[0].success);
    for addr in cluster.addresses() {
        assert!(!cluster.holds_key(addr, "k"));
    }
    println!("✓ undersized ring fails client operations via timeout");
}

#[test]
fn test_stabilization_after_churn_restores_replica_sets() {
    let mut cluster = converged_cluster(10);
    let coordinator = config::introducer();

    let keys: Vec<String> = (0..30).map(|i| format!("key-{i}")).collect();
    for (i, key) in keys.iter().enumerate() {
        cluster.client_create(coordinator, key, &format!("value-{i}")).unwrap();
    }
    cluster.run_rounds(12);

    // All creates finalized successfully on the stable ring.
    let finalized = cluster.log().coordinator_events(coordinator);
    assert_eq!(finalized.len(), keys.len());
    assert!(finalized.iter().all(|e| e.success));

    for victim in [8u32, 9, 10] {
        cluster.kill(Address::new(victim, 0));
    }
    cluster.run_rounds(TFAIL + TREMOVE + 12);

    // Ring shrank to the seven survivors everywhere.
    let reference = cluster.ring_of(coordinator).unwrap();
    assert_eq!(reference.len(), 7);
    for addr in cluster.addresses() {
        assert_eq!(cluster.ring_of(addr).unwrap(), reference, "ring at {addr}");
    }

    // Every surviving key sits on exactly the replicas of the new ring.
    let mut survived = 0;
    for key in &keys {
        let holders: Vec<Address> = cluster
            .addresses()
            .into_iter()
            .filter(|&addr| cluster.holds_key(addr, key))
            .collect();
        if holders.is_empty() {
            continue; // the key's whole replica set was killed
        }
        survived += 1;

        let mut expected = cluster.replicas_for(coordinator, key);
        expected.sort();
        let mut holders = holders;
        holders.sort();
        assert_eq!(holders, expected, "replica set for {key}");
    }
    assert!(survived >= keys.len() - 5, "only {survived} keys survived");
    println!("✓ churn: {survived}/30 surviving keys re-replicated correctly");
}
