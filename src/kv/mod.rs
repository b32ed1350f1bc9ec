// Replicated KV Layer
//
// Quorum-acknowledged CRUD over the consistent-hash ring:
//
// - `message`: request/reply envelope with the '|'-delimited textual codec
// - `transaction`: quorum bookkeeping for outstanding client operations
// - `node`: client coordinator, server dispatch and the stabilizer

pub mod message;
pub mod node;
pub mod transaction;

pub use message::{KvMessage, KvMessageKind};
pub use node::KvNode;
pub use transaction::{Transaction, TransactionTable};
