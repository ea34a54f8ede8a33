use crate::core::{Block, Ledger, GENESIS_DIFFICULTY};
use log::info;

/// Desired seconds between blocks
pub const TARGET_BLOCK_TIME_SECS: i64 = 10;
/// Retarget only when the block count is a multiple of this
pub const DIFFICULTY_ADJUSTMENT_PERIOD: usize = 10;
/// How many recent block intervals feed the average
const RECENT_INTERVALS: usize = 5;
const MIN_DIFFICULTY: u32 = 1;

/// Difficulty retargeting driven by recent block timing
pub struct DifficultyAdjustment;

impl DifficultyAdjustment {
    /// Difficulty for the next block given the chain and the current value.
    /// Pure: the caller decides whether to apply it.
    pub fn calculate_new_difficulty(chain: &[Block], current: u32) -> u32 {
        let height = chain.len();
        if height < 2 {
            return GENESIS_DIFFICULTY;
        }
        if height % DIFFICULTY_ADJUSTMENT_PERIOD != 0 {
            return current;
        }

        let intervals = RECENT_INTERVALS.min(height - 1);
        let recent = &chain[height - 1 - intervals..];
        let total: i64 = recent
            .windows(2)
            .map(|pair| pair[1].get_timestamp() - pair[0].get_timestamp())
            .sum();
        let average = total / intervals as i64;

        if average < TARGET_BLOCK_TIME_SECS / 2 {
            current.saturating_add(1)
        } else if average > TARGET_BLOCK_TIME_SECS * 2 {
            current.saturating_sub(1).max(MIN_DIFFICULTY)
        } else {
            current
        }
    }

    /// Recompute and store the ledger difficulty; returns the new value
    pub fn update_difficulty(ledger: &Ledger) -> u32 {
        let current = ledger.get_difficulty();
        let next = Self::calculate_new_difficulty(&ledger.blocks(), current);
        if next != current {
            ledger.set_difficulty(next);
            info!("Difficulty adjusted: {current} -> {next}");
        }
        next
    }
}
