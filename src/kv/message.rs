// KV wire format: '|'-delimited text records.
//
// Requests: transID|id:port|TYPE[|key[|value]]
// Replies:  transID|id:port|REPLY|0or1  and  transID|id:port|READREPLY|value
//
// An empty READREPLY value encodes a read miss. Records that do not parse
// are dropped by the receiver; they never corrupt state.

use std::str::FromStr;

use crate::error::{KvError, Result};
use crate::network::Address;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KvMessageKind {
    Create { key: String, value: String },
    Read { key: String },
    Update { key: String, value: String },
    Delete { key: String },
    Reply { success: bool },
    ReadReply { value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KvMessage {
    pub trans_id: i64,
    pub from: Address,
    pub kind: KvMessageKind,
}

impl KvMessage {
    pub fn new(trans_id: i64, from: Address, kind: KvMessageKind) -> Self {
        Self {
            trans_id,
            from,
            kind,
        }
    }

    pub fn encode(&self) -> String {
        let header = format!("{}|{}", self.trans_id, self.from);
        match &self.kind {
            KvMessageKind::Create { key, value } => format!("{header}|CREATE|{key}|{value}"),
            KvMessageKind::Read { key } => format!("{header}|READ|{key}"),
            KvMessageKind::Update { key, value } => format!("{header}|UPDATE|{key}|{value}"),
            KvMessageKind::Delete { key } => format!("{header}|DELETE|{key}"),
            KvMessageKind::Reply { success } => {
                format!("{header}|REPLY|{}", u8::from(*success))
            }
            KvMessageKind::ReadReply { value } => format!("{header}|READREPLY|{value}"),
        }
    }
}

impl FromStr for KvMessage {
    type Err = KvError;

    fn from_str(record: &str) -> Result<Self> {
        let malformed = || KvError::MalformedMessage(record.to_string());

        let mut parts = record.splitn(4, '|');
        let trans_id = parts
            .next()
            .and_then(|f| f.parse::<i64>().ok())
            .ok_or_else(malformed)?;
        let from: Address = parts.next().ok_or_else(malformed)?.parse()?;
        let tag = parts.next().ok_or_else(malformed)?;
        let rest = parts.next();

        let kind = match tag {
            "CREATE" | "UPDATE" => {
                let (key, value) = rest
                    .and_then(|r| r.split_once('|'))
                    .ok_or_else(malformed)?;
                if tag == "CREATE" {
                    KvMessageKind::Create {
                        key: key.to_string(),
                        value: value.to_string(),
                    }
                } else {
                    KvMessageKind::Update {
                        key: key.to_string(),
                        value: value.to_string(),
                    }
                }
            }
            "READ" => KvMessageKind::Read {
                key: rest.ok_or_else(malformed)?.to_string(),
            },
            "DELETE" => KvMessageKind::Delete {
                key: rest.ok_or_else(malformed)?.to_string(),
            },
            "REPLY" => match rest {
                Some("0") => KvMessageKind::Reply { success: false },
                Some("1") => KvMessageKind::Reply { success: true },
                _ => return Err(malformed()),
            },
            "READREPLY" => KvMessageKind::ReadReply {
                value: rest.unwrap_or_default().to_string(),
            },
            _ => return Err(malformed()),
        };

        Ok(KvMessage::new(trans_id, from, kind))
    }
}
