//! Fill settlement for the tdbot trading core.
//!
//! Matches SELL fills against held BUY inventory, cheapest lot first, and
//! keeps a per-scope ledger of unmatched lots and settled matches.
//!
//! # Key Components
//!
//! - [`Ledger`]: fills and matches of one instrument + timeframe family
//! - [`settle`]: pure price-priority FIFO matching pass
//! - [`SettlementEngine`]: scope exclusivity, storage and proxy settlement
//! - [`LedgerStore`]: storage boundary; [`MemoryLedgerStore`] in-process
//! - [`ScopeLocks`]: at-most-one pass per scope, released on drop
//! - [`lockable_quantity`]: profit-lock sizing oracle
//! - [`daily_profit`]: day-over-day profit summary

pub mod config;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod locks;
pub mod matcher;
pub mod profit_lock;
pub mod proxy;
pub mod store;
pub mod summary;

pub use config::{ProxyConfig, SettlementConfig, DEFAULT_PROXY_MIN_DISTANCE_SECS};
pub use engine::SettlementEngine;
pub use error::{SettlementError, SettlementResult};
pub use ledger::Ledger;
pub use locks::{ScopeGuard, ScopeLocks};
pub use matcher::{settle, ForcedRemainder, SettlementReport};
pub use profit_lock::{lockable_quantity, locked_profit_preview, ProfitLockConfig};
pub use proxy::{proxy_window_clear, ProxyOutcome, ProxyRun};
pub use store::{check_unique_pairs, LedgerStore, MemoryLedgerStore};
pub use summary::{daily_profit, DailyProfit};
