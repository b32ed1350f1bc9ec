// KV protocol node: client coordinator, server store and stabilizer.
//
// Each tick pulls the live membership view, rebuilds the ring and runs the
// stabilizer when the ring moved, then drains the kv inbox (server CRUD
// plus reply accounting) and reaps open transactions against quorum and
// timeout. Client operations can be injected between ticks; they resolve
// the replica set under the current ring and go out immediately.

use std::collections::VecDeque;
use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, trace};

use crate::config::STAB_TRANS;
use crate::events::{CrudEvent, EventLog, KvOp};
use crate::kv::message::{KvMessage, KvMessageKind};
use crate::kv::transaction::{Transaction, TransactionTable};
use crate::network::{Address, EmulNet, Protocol};
use crate::ring::{self, RingNode};
use crate::store::LocalStore;

pub struct KvNode {
    addr: Address,
    store: LocalStore,
    ring: Vec<RingNode>,
    transactions: TransactionTable,
    inbox: VecDeque<Bytes>,
    net: Arc<EmulNet>,
    log: Arc<EventLog>,
    local_time: u64,
}

impl KvNode {
    pub fn new(addr: Address, net: Arc<EmulNet>, log: Arc<EventLog>) -> Self {
        Self {
            addr,
            store: LocalStore::new(),
            ring: Vec::new(),
            transactions: TransactionTable::new(),
            inbox: VecDeque::new(),
            net,
            log,
            local_time: 0,
        }
    }

    pub fn addr(&self) -> Address {
        self.addr
    }

    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    pub fn ring(&self) -> &[RingNode] {
        &self.ring
    }

    pub fn open_transactions(&self) -> usize {
        self.transactions.len()
    }

    /// Queue a received kv payload for the next tick.
    pub fn enqueue(&mut self, payload: Bytes) {
        self.inbox.push_back(payload);
    }

    // ---- client side -------------------------------------------------

    pub fn client_create(&mut self, key: &str, value: &str) {
        self.client_op(KvOp::Create, key, value);
    }

    pub fn client_read(&mut self, key: &str) {
        self.client_op(KvOp::Read, key, "");
    }

    pub fn client_update(&mut self, key: &str, value: &str) {
        self.client_op(KvOp::Update, key, value);
    }

    pub fn client_delete(&mut self, key: &str) {
        self.client_op(KvOp::Delete, key, "");
    }

    fn client_op(&mut self, op: KvOp, key: &str, value: &str) {
        let id = self.transactions.allocate();
        self.transactions
            .insert(Transaction::new(id, op, key, value, self.local_time));

        let replicas = ring::find_replicas(key, &self.ring);
        if replicas.is_empty() {
            debug!(node = %self.addr, key, "no replicas available; operation will time out");
            return;
        }

        let kind = match op {
            KvOp::Create => KvMessageKind::Create {
                key: key.to_string(),
                value: value.to_string(),
            },
            KvOp::Read => KvMessageKind::Read {
                key: key.to_string(),
            },
            KvOp::Update => KvMessageKind::Update {
                key: key.to_string(),
                value: value.to_string(),
            },
            KvOp::Delete => KvMessageKind::Delete {
                key: key.to_string(),
            },
        };
        let message = KvMessage::new(id, self.addr, kind);
        for replica in replicas {
            self.send(replica, &message);
        }
    }

    // ---- per-round work ----------------------------------------------

    /// One kv round over the current live membership view.
    pub fn tick(&mut self, now: u64, live_members: &[Address]) {
        self.local_time = now;
        self.update_ring(live_members);
        self.process_inbox();
        self.reap(now);
    }

    fn update_ring(&mut self, live_members: &[Address]) {
        let new_ring = ring::build_ring(live_members);
        if ring::ring_changed(&self.ring, &new_ring) {
            debug!(node = %self.addr, members = new_ring.len(), "ring changed; stabilizing");
            self.ring = new_ring;
            self.stabilize();
        }
    }

    /// Re-replicate every locally held key to its replica set under the
    /// new ring. Repair traffic travels with the sentinel transaction id:
    /// servers neither log nor reply to it, and the placeholder transaction
    /// recorded here is reaped by the timeout path without logging.
    fn stabilize(&mut self) {
        if self.store.is_empty() {
            return;
        }

        let mut sent = 0usize;
        for (key, value) in self.store.entries() {
            for replica in ring::find_replicas(key, &self.ring) {
                let message = KvMessage::new(
                    STAB_TRANS,
                    self.addr,
                    KvMessageKind::Create {
                        key: key.to_string(),
                        value: value.to_string(),
                    },
                );
                self.send(replica, &message);
                sent += 1;
            }
        }

        if sent > 0 {
            self.transactions.insert(Transaction::new(
                STAB_TRANS,
                KvOp::Create,
                "",
                "",
                self.local_time,
            ));
            trace!(node = %self.addr, sent, "stabilization repairs sent");
        }
    }

    fn process_inbox(&mut self) {
        while let Some(payload) = self.inbox.pop_front() {
            let text = match std::str::from_utf8(&payload) {
                Ok(text) => text,
                Err(_) => {
                    debug!(node = %self.addr, "dropping non-utf8 kv payload");
                    continue;
                }
            };
            match text.parse::<KvMessage>() {
                Ok(message) => self.dispatch(message),
                Err(err) => debug!(node = %self.addr, %err, "dropping malformed kv message"),
            }
        }
    }

    fn dispatch(&mut self, message: KvMessage) {
        let KvMessage {
            trans_id,
            from,
            kind,
        } = message;
        match kind {
            KvMessageKind::Create { key, value } => {
                self.serve_create(trans_id, from, &key, &value)
            }
            KvMessageKind::Read { key } => self.serve_read(trans_id, from, &key),
            KvMessageKind::Update { key, value } => {
                self.serve_update(trans_id, from, &key, &value)
            }
            KvMessageKind::Delete { key } => self.serve_delete(trans_id, from, &key),
            KvMessageKind::Reply { success } => self.account_reply(trans_id, success),
            KvMessageKind::ReadReply { value } => self.account_read_reply(trans_id, &value),
        }
    }

    // ---- server side -------------------------------------------------

    fn serve_create(&mut self, trans_id: i64, from: Address, key: &str, value: &str) {
        let success = self.store.create(key, value);
        if trans_id == STAB_TRANS {
            // Background repair: no event, no reply.
            return;
        }
        self.log.crud(CrudEvent {
            node: self.addr,
            coordinator: false,
            trans_id,
            op: KvOp::Create,
            success,
            key: key.to_string(),
            value: Some(value.to_string()),
        });
        self.send(from, &KvMessage::new(trans_id, self.addr, KvMessageKind::Reply { success }));
    }

    fn serve_read(&mut self, trans_id: i64, from: Address, key: &str) {
        let value = self.store.read(key).unwrap_or("").to_string();
        let success = !value.is_empty();
        self.log.crud(CrudEvent {
            node: self.addr,
            coordinator: false,
            trans_id,
            op: KvOp::Read,
            success,
            key: key.to_string(),
            value: success.then(|| value.clone()),
        });
        self.send(
            from,
            &KvMessage::new(trans_id, self.addr, KvMessageKind::ReadReply { value }),
        );
    }

    fn serve_update(&mut self, trans_id: i64, from: Address, key: &str, value: &str) {
        let success = self.store.update(key, value);
        self.log.crud(CrudEvent {
            node: self.addr,
            coordinator: false,
            trans_id,
            op: KvOp::Update,
            success,
            key: key.to_string(),
            value: Some(value.to_string()),
        });
        self.send(from, &KvMessage::new(trans_id, self.addr, KvMessageKind::Reply { success }));
    }

    fn serve_delete(&mut self, trans_id: i64, from: Address, key: &str) {
        let success = self.store.delete(key);
        self.log.crud(CrudEvent {
            node: self.addr,
            coordinator: false,
            trans_id,
            op: KvOp::Delete,
            success,
            key: key.to_string(),
            value: None,
        });
        self.send(from, &KvMessage::new(trans_id, self.addr, KvMessageKind::Reply { success }));
    }

    // ---- reply accounting --------------------------------------------

    fn account_reply(&mut self, trans_id: i64, success: bool) {
        match self.transactions.get_mut(trans_id) {
            Some(tx) if !tx.is_stabilization() => tx.record_reply(success),
            Some(_) => {} // stabilization replies are swallowed
            None => trace!(node = %self.addr, trans_id, "late reply dropped"),
        }
    }

    fn account_read_reply(&mut self, trans_id: i64, value: &str) {
        match self.transactions.get_mut(trans_id) {
            Some(tx) if !tx.is_stabilization() => tx.record_read_reply(value),
            Some(_) => {}
            None => trace!(node = %self.addr, trans_id, "late read reply dropped"),
        }
    }

    /// Finalize every transaction with a verdict: exactly one coordinator
    /// event per client operation, nothing for stabilization placeholders.
    fn reap(&mut self, now: u64) {
        for (id, success) in self.transactions.ripe(now) {
            let tx = match self.transactions.remove(id) {
                Some(tx) => tx,
                None => continue,
            };
            if tx.is_stabilization() {
                continue;
            }

            let value = match (tx.op, success) {
                (KvOp::Create, _) | (KvOp::Update, _) => Some(tx.value.clone()),
                (KvOp::Read, true) => tx.observed_value.clone(),
                _ => None,
            };
            self.log.crud(CrudEvent {
                node: self.addr,
                coordinator: true,
                trans_id: id,
                op: tx.op,
                success,
                key: tx.key.clone(),
                value,
            });
        }
    }

    fn send(&self, to: Address, message: &KvMessage) {
        self.net.send(
            self.addr,
            to,
            Protocol::Kv,
            Bytes::from(message.encode().into_bytes()),
        );
    }
}
