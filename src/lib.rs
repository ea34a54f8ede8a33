//! # ChainLog
//!
//! A small account-based ledger for recording data entries and moving coins.
//!
//! - `core/`: blocks, transactions, the ledger, validation, proof-of-work
//!   mining, difficulty retargeting and validator staking
//! - `economy/`: block rewards, fee split and burn, supply tracking and the
//!   transaction processor that applies balance effects
//! - `storage/`: account balances and the sled-backed snapshot store
//! - `network/`: JSON envelopes over TCP for gossip and chain sync
//! - `wallet/`: ECDSA P-256 keys, addresses and signing
//! - `config/`: node settings read from the environment
//! - `context`: the shared handle wiring all of the above together
//! - `cli/`: command-line parsing for the `chainlog` binary

pub mod cli;
pub mod config;
pub mod context;
pub mod core;
pub mod economy;
pub mod error;
pub mod network;
pub mod storage;
pub mod utils;
pub mod wallet;

pub use cli::{Command, Opt};
pub use config::Config;
pub use context::{ChainContext, ChainStatus, FeeStatistics, RewardStatistics};
pub use crate::core::{
    Block, ChainValidator, Ledger, Miner, MiningHandle, ProofOfWork, StakingRegistry, Transaction,
    TransactionType, Verdict,
};
pub use economy::{CoinEconomics, FeeManager, RewardManager, TransactionProcessor};
pub use error::{BlockchainError, ErrorKind, Result};
pub use network::{Envelope, MessageType, Node};
pub use storage::{AccountStore, SnapshotStore};
pub use utils::current_timestamp;
pub use wallet::{short_address, validate_address, Signer, Wallet, Wallets};
