//! File persistence for tdbot.
//!
//! - [`JsonLedgerStore`]: per-scope ledger snapshots behind the settlement
//!   [`LedgerStore`](tdbot_settlement::LedgerStore) boundary, with an OS
//!   file lock per scope shared by every process on the data directory
//! - [`SignalJournal`]: JSON Lines journal of detector readings, one file
//!   per UTC day

pub mod error;
pub mod journal;
pub mod ledger_store;

pub use error::{PersistenceError, PersistenceResult};
pub use journal::{SignalJournal, SignalRecord};
pub use ledger_store::{JsonLedgerStore, ScopeFileLock, LEDGER_FILE, LOCK_FILE};
