//! Stake-weighted validator registry
//!
//! The registry is the non-PoW path to block production: addresses lock coins
//! as stake, and a weighted lottery picks the next proposer. Blocks mined by a
//! known validator (or by a sentinel miner) pass [`StakingRegistry::validate_block`].

use crate::core::{Block, SYSTEM_MINER, UNKNOWN_MINER};
use crate::error::{BlockchainError, Result};
use crate::wallet::short_address;
use log::info;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Smallest stake a single deposit may carry
pub const MIN_STAKE: u64 = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validator {
    pub address: String,
    pub staked: u64,
    pub voting_power: u64,
    pub active: bool,
}

/// Serializable registry record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakingSnapshot {
    pub validators: HashMap<String, Validator>,
}

#[derive(Default)]
pub struct StakingRegistry {
    validators: Mutex<HashMap<String, Validator>>,
}

impl StakingRegistry {
    pub fn new() -> StakingRegistry {
        StakingRegistry::default()
    }

    pub fn from_snapshot(snapshot: StakingSnapshot) -> StakingRegistry {
        info!("Loaded staking data: {} validators", snapshot.validators.len());
        StakingRegistry {
            validators: Mutex::new(snapshot.validators),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Validator>> {
        self.validators.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> StakingSnapshot {
        StakingSnapshot {
            validators: self.lock().clone(),
        }
    }

    /// Add `amount` to `address`'s stake, registering a new active validator if needed
    pub fn add_stake(&self, address: &str, amount: u64) -> Result<()> {
        if amount < MIN_STAKE {
            return Err(BlockchainError::StakeTooLow {
                amount,
                minimum: MIN_STAKE,
            });
        }

        let mut validators = self.lock();
        match validators.get_mut(address) {
            Some(existing) => {
                existing.staked = existing.staked.checked_add(amount).ok_or_else(|| {
                    BlockchainError::BalanceOverflow {
                        address: address.to_string(),
                        balance: existing.staked,
                        amount,
                    }
                })?;
                existing.voting_power = existing.staked;
                info!(
                    "Validator {} increased stake to {}",
                    short_address(address),
                    existing.staked
                );
            }
            None => {
                validators.insert(
                    address.to_string(),
                    Validator {
                        address: address.to_string(),
                        staked: amount,
                        voting_power: amount,
                        active: true,
                    },
                );
                info!("New validator: {} with {amount}", short_address(address));
            }
        }
        Ok(())
    }

    /// Weighted lottery over active validators using the thread RNG.
    ///
    /// The draw is not verifiable and can be biased by whoever controls the
    /// node, so it is unsuitable where validators are adversarial.
    pub fn select_validator(&self) -> Option<String> {
        self.select_validator_with(&mut rand::thread_rng())
    }

    /// Weighted lottery with a caller-supplied RNG. Validators are walked in
    /// address order so a seeded RNG gives reproducible picks.
    pub fn select_validator_with<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<String> {
        let mut active: Vec<(String, u64)> = self
            .lock()
            .values()
            .filter(|v| v.active && v.voting_power > 0)
            .map(|v| (v.address.clone(), v.voting_power))
            .collect();
        active.sort();

        let total: u64 = active
            .iter()
            .map(|(_, weight)| *weight)
            .fold(0, u64::saturating_add);
        if total == 0 {
            return None;
        }

        let mut draw = rng.gen_range(0..total);
        for (address, weight) in active {
            if draw < weight {
                return Some(address);
            }
            draw -= weight;
        }
        None
    }

    /// Sentinel miners always pass; anyone else must be an active validator
    pub fn validate_block(&self, block: &Block) -> bool {
        let miner = block.get_miner();
        if miner == SYSTEM_MINER || miner == UNKNOWN_MINER {
            return true;
        }
        self.lock().get(miner).map_or(false, |v| v.active)
    }

    pub fn get_total_staked(&self) -> u64 {
        self.lock()
            .values()
            .map(|v| v.staked)
            .fold(0, u64::saturating_add)
    }

    pub fn get_validator(&self, address: &str) -> Option<Validator> {
        self.lock().get(address).cloned()
    }

    /// Copy of every validator, sorted by address
    pub fn validators(&self) -> Vec<Validator> {
        let mut list: Vec<Validator> = self.lock().values().cloned().collect();
        list.sort_by(|a, b| a.address.cmp(&b.address));
        list
    }
}
