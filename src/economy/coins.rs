//! Fixed coin schedule
//!
//! The block reward starts at [`BASE_BLOCK_REWARD`] and halves every
//! [`HALVING_INTERVAL`] blocks until integer division takes it to zero.

use crate::core::Block;
use crate::economy::calculate_fee_distribution;
use log::info;
use serde::{Deserialize, Serialize};

/// Coins in existence before the first mined block
pub const GENESIS_SUPPLY: u64 = 1_000_000;
/// Advertised supply cap; informational only, minting is not stopped here
pub const MAX_SUPPLY: u64 = 21_000_000;
/// Reward for blocks below the first halving
pub const BASE_BLOCK_REWARD: u64 = 10;
/// Blocks between two halvings
pub const HALVING_INTERVAL: i64 = 100_000;
/// Lowest fee a transaction may carry
pub const MIN_TRANSACTION_FEE: u64 = 1;
/// Highest fee a transaction may carry
pub const MAX_TRANSACTION_FEE: u64 = 5;

/// Reward paid to the miner of the block at `height`
pub fn calculate_block_reward(height: i64) -> u64 {
    if height < 0 {
        return BASE_BLOCK_REWARD;
    }
    let halvings = height / HALVING_INTERVAL;
    if halvings >= u64::BITS as i64 {
        return 0;
    }
    BASE_BLOCK_REWARD >> halvings
}

/// First height at which the reward halves again
pub fn calculate_next_halving(height: i64) -> i64 {
    (height.max(0) / HALVING_INTERVAL + 1) * HALVING_INTERVAL
}

/// Sum of every block reward the schedule pays for heights `1..=height`
pub fn issued_rewards(height: i64) -> u64 {
    let mut issued = 0u64;
    let mut era_start = 1i64;
    while era_start <= height {
        let reward = calculate_block_reward(era_start);
        if reward == 0 {
            break;
        }
        let era_end = calculate_next_halving(era_start).min(height + 1);
        let blocks = (era_end - era_start) as u64;
        issued = issued.saturating_add(reward.saturating_mul(blocks));
        era_start = era_end;
    }
    issued
}

/// Supply figures derived from chain height and cumulative burn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoinEconomics {
    total_supply: u64,
    circulating: u64,
    burned: u64,
    current_block_reward: u64,
    next_halving_height: i64,
    height: i64,
}

impl Default for CoinEconomics {
    fn default() -> Self {
        CoinEconomics::new()
    }
}

impl CoinEconomics {
    pub fn new() -> CoinEconomics {
        let mut economics = CoinEconomics {
            total_supply: GENESIS_SUPPLY,
            circulating: GENESIS_SUPPLY,
            burned: 0,
            current_block_reward: BASE_BLOCK_REWARD,
            next_halving_height: HALVING_INTERVAL,
            height: 0,
        };
        economics.recompute(0);
        economics
    }

    fn recompute(&mut self, height: i64) {
        self.height = height;
        self.current_block_reward = calculate_block_reward(height);
        self.next_halving_height = calculate_next_halving(height);
        self.total_supply = GENESIS_SUPPLY.saturating_add(issued_rewards(height));
        self.circulating = self.total_supply.saturating_sub(self.burned);
    }

    /// Fold a freshly appended block into the figures
    pub fn update_after_block(&mut self, block: &Block) {
        let burned: u64 = block
            .get_transactions()
            .iter()
            .filter(|tx| tx.get_fee() > 0)
            .map(|tx| calculate_fee_distribution(tx.get_fee()).1)
            .fold(0, u64::saturating_add);
        self.burned = self.burned.saturating_add(burned);
        self.recompute(block.get_index());

        info!(
            "Economics at height {}: supply {}, circulating {}, burned {}",
            self.height, self.total_supply, self.circulating, self.burned
        );
    }

    /// Recompute from scratch over a whole chain
    pub fn from_chain(chain: &[Block]) -> CoinEconomics {
        let mut economics = CoinEconomics::new();
        for block in chain.iter().filter(|b| !b.is_genesis()) {
            economics.update_after_block(block);
        }
        economics
    }

    pub fn get_total_supply(&self) -> u64 {
        self.total_supply
    }

    pub fn get_circulating(&self) -> u64 {
        self.circulating
    }

    pub fn get_burned(&self) -> u64 {
        self.burned
    }

    pub fn get_current_block_reward(&self) -> u64 {
        self.current_block_reward
    }

    pub fn get_next_halving_height(&self) -> i64 {
        self.next_halving_height
    }

    pub fn get_height(&self) -> i64 {
        self.height
    }
}
