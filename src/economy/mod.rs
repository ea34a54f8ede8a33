//! Coin economy
//!
//! Reward schedule, fee split, reward issuance and the transaction processor
//! that turns accepted transactions into balance changes.

pub mod coins;
pub mod fees;
pub mod processor;
pub mod rewards;

pub use coins::{
    calculate_block_reward, calculate_next_halving, issued_rewards, CoinEconomics,
    BASE_BLOCK_REWARD, GENESIS_SUPPLY, HALVING_INTERVAL, MAX_SUPPLY, MAX_TRANSACTION_FEE,
    MIN_TRANSACTION_FEE,
};
pub use fees::{
    calculate_fee_distribution, create_fee_distribution_transactions, validate_transaction_fee,
    FeeManager, BURN_ADDRESS,
};
pub use processor::TransactionProcessor;
pub use rewards::{RewardManager, STAKING_REWARD_DIVISOR};
