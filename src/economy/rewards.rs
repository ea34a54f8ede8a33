use crate::core::Transaction;
use crate::economy::calculate_block_reward;
use crate::error::Result;
use crate::wallet::short_address;
use log::info;

/// Divisor turning a stake into its per-round reward (1% of stake over 20 rounds)
pub const STAKING_REWARD_DIVISOR: u64 = 2000;

/// Issues protocol rewards to a fixed miner address
pub struct RewardManager {
    miner_address: String,
    total_rewards_distributed: u64,
}

impl RewardManager {
    pub fn new(miner_address: &str) -> RewardManager {
        RewardManager {
            miner_address: miner_address.to_string(),
            total_rewards_distributed: 0,
        }
    }

    /// Reward for mining the block at `height`; `None` once the schedule hits zero
    pub fn create_block_reward(&mut self, height: i64) -> Result<Option<Transaction>> {
        let amount = calculate_block_reward(height);
        if amount == 0 {
            info!("Block reward has been reduced to 0");
            return Ok(None);
        }
        let reward = Transaction::new_reward(&self.miner_address, amount)?;
        self.total_rewards_distributed = self.total_rewards_distributed.saturating_add(amount);
        info!(
            "Block reward: {amount} -> {}",
            short_address(&self.miner_address)
        );
        Ok(Some(reward))
    }

    /// Staking payout for `staked` coins; `None` when it rounds down to zero
    pub fn create_staking_reward(
        &mut self,
        validator_address: &str,
        staked: u64,
    ) -> Result<Option<Transaction>> {
        let amount = staked / STAKING_REWARD_DIVISOR;
        if amount == 0 {
            return Ok(None);
        }
        let reward = Transaction::new_reward(validator_address, amount)?;
        self.total_rewards_distributed = self.total_rewards_distributed.saturating_add(amount);
        info!(
            "Staking reward: {amount} -> {}",
            short_address(validator_address)
        );
        Ok(Some(reward))
    }

    pub fn get_miner_address(&self) -> &str {
        self.miner_address.as_str()
    }

    pub fn get_total_rewards_distributed(&self) -> u64 {
        self.total_rewards_distributed
    }
}
