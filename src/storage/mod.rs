//! Account state and snapshot persistence
//!
//! Account balances live in memory in an [`AccountStore`]; every long-lived
//! record is written to a sled-backed [`SnapshotStore`] as JSON.

pub mod accounts;
pub mod snapshot;

pub use accounts::{Account, AccountStore, GENESIS_ALLOCATION};
pub use snapshot::{
    SnapshotStore, ACCOUNTS_KEY, ECONOMICS_KEY, FEES_KEY, LEDGER_KEY, STAKING_KEY, WALLETS_KEY,
};
