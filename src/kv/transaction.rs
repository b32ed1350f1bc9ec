// Transaction tracking for outstanding client operations.
//
// One entry per open client request, keyed by a dense per-node id. Replies
// bump the counters; the verdict is taken once a quorum of replies arrived
// or the round budget ran out. Stabilization repairs share the table under
// the sentinel id but are reaped without any logging.

use std::collections::HashMap;

use crate::config::{QUORUM, STAB_TRANS, TIMEOUT_SEC};
use crate::events::KvOp;

/// One outstanding client operation awaiting replica replies.
#[derive(Debug, Clone)]
pub struct Transaction {
    pub id: i64,
    pub op: KvOp,
    pub key: String,
    pub value: String,
    pub init_time: u64,
    pub reply_count: usize,
    pub success_count: usize,
    /// First non-empty read value observed.
    pub observed_value: Option<String>,
}

impl Transaction {
    pub fn new(id: i64, op: KvOp, key: &str, value: &str, init_time: u64) -> Self {
        Self {
            id,
            op,
            key: key.to_string(),
            value: value.to_string(),
            init_time,
            reply_count: 0,
            success_count: 0,
            observed_value: None,
        }
    }

    pub fn is_stabilization(&self) -> bool {
        self.id == STAB_TRANS
    }

    pub fn record_reply(&mut self, success: bool) {
        self.reply_count += 1;
        if success {
            self.success_count += 1;
        }
    }

    /// A read reply; a non-empty value counts as success and the first one
    /// seen is what the coordinator will log.
    pub fn record_read_reply(&mut self, value: &str) {
        self.reply_count += 1;
        if !value.is_empty() {
            self.success_count += 1;
            if self.observed_value.is_none() {
                self.observed_value = Some(value.to_string());
            }
        }
    }

    /// Finalization decision for this round, if any: Some(success) once a
    /// quorum of replies arrived, Some(false) once the budget expired.
    pub fn verdict(&self, now: u64) -> Option<bool> {
        if self.reply_count >= QUORUM {
            Some(self.success_count >= QUORUM)
        } else if now.saturating_sub(self.init_time) > TIMEOUT_SEC {
            Some(false)
        } else {
            None
        }
    }
}

/// Open transactions keyed by id, with per-node id allocation.
#[derive(Debug, Default)]
pub struct TransactionTable {
    open: HashMap<i64, Transaction>,
    next_id: i64,
}

impl TransactionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&mut self) -> i64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn insert(&mut self, transaction: Transaction) {
        self.open.insert(transaction.id, transaction);
    }

    pub fn get_mut(&mut self, id: i64) -> Option<&mut Transaction> {
        self.open.get_mut(&id)
    }

    pub fn remove(&mut self, id: i64) -> Option<Transaction> {
        self.open.remove(&id)
    }

    pub fn len(&self) -> usize {
        self.open.len()
    }

    pub fn is_empty(&self) -> bool {
        self.open.is_empty()
    }

    /// Ids with a verdict this round, ready to finalize.
    pub fn ripe(&self, now: u64) -> Vec<(i64, bool)> {
        self.open
            .iter()
            .filter_map(|(id, tx)| tx.verdict(now).map(|success| (*id, success)))
            .collect()
    }
}
