//! Consensus core
//!
//! Blocks, transactions, the ledger, chain validation, proof-of-work mining,
//! difficulty retargeting and the validator stake registry.

pub mod block;
pub mod difficulty;
pub mod ledger;
pub mod miner;
pub mod proof_of_work;
pub mod staking;
pub mod transaction;
pub mod validator;

pub use block::{Block, GENESIS_DIFFICULTY, GENESIS_TIMESTAMP, SYSTEM_MINER, UNKNOWN_MINER};
pub use difficulty::{DifficultyAdjustment, DIFFICULTY_ADJUSTMENT_PERIOD, TARGET_BLOCK_TIME_SECS};
pub use ledger::{Ledger, LedgerSnapshot};
pub use miner::{Miner, MiningHandle};
pub use proof_of_work::{PowOutcome, ProofOfWork, CANCEL_CHECK_INTERVAL, EXHAUSTED_NONCE, MAX_NONCE};
pub use staking::{StakingRegistry, StakingSnapshot, Validator, MIN_STAKE};
pub use transaction::{Transaction, TransactionType, NETWORK_SENDER};
pub use validator::{
    ChainValidator, Verdict, MAX_BLOCK_FUTURE_DRIFT_SECS, MAX_TX_FUTURE_DRIFT_SECS,
};
