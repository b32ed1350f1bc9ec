// Semantic Event Log
//
// The observable contract of both protocols. Membership changes and CRUD
// outcomes are recorded here as typed events; the scenario tests assert on
// the log contents. Every event is mirrored to `tracing` for human-readable
// diagnostics. Stabilization repair traffic never reaches this log.

use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::network::Address;

/// Client-visible operation kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KvOp {
    Create,
    Read,
    Update,
    Delete,
}

/// One CRUD outcome, on either side of the protocol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrudEvent {
    pub node: Address,
    /// true for coordinator finalizations, false for server-side outcomes
    pub coordinator: bool,
    pub trans_id: i64,
    pub op: KvOp,
    pub success: bool,
    pub key: String,
    pub value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    NodeAdd { observer: Address, added: Address },
    NodeRemove { observer: Address, removed: Address },
    Crud(CrudEvent),
}

/// Shared append-only event record.
#[derive(Default)]
pub struct EventLog {
    events: RwLock<Vec<Event>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node_add(&self, observer: Address, added: Address) {
        info!(%observer, %added, "membership: node added");
        self.events.write().push(Event::NodeAdd { observer, added });
    }

    pub fn node_remove(&self, observer: Address, removed: Address) {
        info!(%observer, %removed, "membership: node removed");
        self.events
            .write()
            .push(Event::NodeRemove { observer, removed });
    }

    pub fn crud(&self, event: CrudEvent) {
        info!(
            node = %event.node,
            coordinator = event.coordinator,
            op = ?event.op,
            success = event.success,
            key = %event.key,
            "kv outcome"
        );
        self.events.write().push(Event::Crud(event));
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.read().clone()
    }

    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }

    pub fn crud_events(&self) -> Vec<CrudEvent> {
        self.events
            .read()
            .iter()
            .filter_map(|event| match event {
                Event::Crud(crud) => Some(crud.clone()),
                _ => None,
            })
            .collect()
    }

    /// Coordinator finalizations recorded at one node.
    pub fn coordinator_events(&self, node: Address) -> Vec<CrudEvent> {
        self.crud_events()
            .into_iter()
            .filter(|e| e.coordinator && e.node == node)
            .collect()
    }

    /// Server-side outcomes recorded at one node.
    pub fn server_events(&self, node: Address) -> Vec<CrudEvent> {
        self.crud_events()
            .into_iter()
            .filter(|e| !e.coordinator && e.node == node)
            .collect()
    }

    /// Peers an observer has logged NodeAdd for.
    pub fn node_adds(&self, observer: Address) -> Vec<Address> {
        self.events
            .read()
            .iter()
            .filter_map(|event| match event {
                Event::NodeAdd {
                    observer: who,
                    added,
                } if *who == observer => Some(*added),
                _ => None,
            })
            .collect()
    }

    /// Peers an observer has logged NodeRemove for.
    pub fn node_removes(&self, observer: Address) -> Vec<Address> {
        self.events
            .read()
            .iter()
            .filter_map(|event| match event {
                Event::NodeRemove {
                    observer: who,
                    removed,
                } if *who == observer => Some(*removed),
                _ => None,
            })
            .collect()
    }

    pub fn to_json(&self) -> crate::error::Result<String> {
        serde_json::to_string_pretty(&self.events()).map_err(Into::into)
    }
}

static TRACING: OnceCell<()> = OnceCell::new();

/// Install the global tracing subscriber once; the binary and tests share it.
/// Level comes from RINGKV_LOG (default info).
pub fn init_tracing() {
    TRACING.get_or_init(|| {
        let level = std::env::var("RINGKV_LOG")
            .ok()
            .and_then(|v| v.parse::<tracing::Level>().ok())
            .unwrap_or(tracing::Level::INFO);
        let _ = tracing_subscriber::fmt()
            .with_max_level(level)
            .with_target(false)
            .try_init();
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(id: u32) -> Address {
        Address::new(id, 0)
    }

    fn crud(node: Address, coordinator: bool, success: bool) -> CrudEvent {
        CrudEvent {
            node,
            coordinator,
            trans_id: 1,
            op: KvOp::Create,
            success,
            key: "k".to_string(),
            value: Some("v".to_string()),
        }
    }

    #[test]
    fn test_membership_event_queries() {
        let log = EventLog::new();
        log.node_add(addr(1), addr(2));
        log.node_add(addr(2), addr(1));
        log.node_remove(addr(1), addr(2));

        assert_eq!(log.node_adds(addr(1)), vec![addr(2)]);
        assert_eq!(log.node_adds(addr(2)), vec![addr(1)]);
        assert_eq!(log.node_removes(addr(1)), vec![addr(2)]);
        assert!(log.node_removes(addr(2)).is_empty());
    }

    #[test]
    fn test_crud_side_filtering() {
        let log = EventLog::new();
        log.crud(crud(addr(1), true, true));
        log.crud(crud(addr(1), false, true));
        log.crud(crud(addr(2), false, false));

        assert_eq!(log.coordinator_events(addr(1)).len(), 1);
        assert_eq!(log.server_events(addr(1)).len(), 1);
        assert!(log.coordinator_events(addr(2)).is_empty());
        assert_eq!(log.crud_events().len(), 3);
    }

    #[test]
    fn test_json_export() {
        let log = EventLog::new();
        log.node_add(addr(1), addr(1));
        let json = log.to_json().unwrap();
        assert!(json.contains("NodeAdd"));
    }
}
