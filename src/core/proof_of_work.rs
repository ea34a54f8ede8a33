use crate::core::Block;
use crate::error::{BlockchainError, Result};
use crate::utils::sha256_digest;
use data_encoding::HEXLOWER;
use log::{debug, info};
use num_bigint::{BigInt, Sign};
use std::ops::ShlAssign;

/// Nonce ceiling for a single search
pub const MAX_NONCE: i64 = 10_000_000;
/// Nonce value reported when the search space ran out
pub const EXHAUSTED_NONCE: i64 = -1;
/// How many nonces are tried between cancellation checks
pub const CANCEL_CHECK_INTERVAL: i64 = 10_000;

const PROGRESS_LOG_INTERVAL: i64 = 100_000;
const HASH_BITS: u32 = 256;

/// Result of a nonce search
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PowOutcome {
    Found { nonce: i64, hash: String },
    Exhausted,
    Cancelled,
}

impl PowOutcome {
    /// Nonce in the `-1` sentinel convention
    pub fn nonce(&self) -> i64 {
        match self {
            PowOutcome::Found { nonce, .. } => *nonce,
            PowOutcome::Exhausted | PowOutcome::Cancelled => EXHAUSTED_NONCE,
        }
    }
}

pub struct ProofOfWork {
    // Hash input up to (not including) the nonce, built once per search
    prefix: String,
    target: BigInt,
    difficulty: u32,
    max_nonce: i64,
}

impl ProofOfWork {
    pub fn new(block: &Block, difficulty: u32) -> Result<ProofOfWork> {
        Ok(ProofOfWork {
            prefix: block.header_prefix(),
            target: Self::target_for(difficulty)?,
            difficulty,
            max_nonce: MAX_NONCE,
        })
    }

    /// `2^(256 - difficulty)`
    pub fn target_for(difficulty: u32) -> Result<BigInt> {
        if difficulty > HASH_BITS {
            return Err(BlockchainError::Precondition(format!(
                "Difficulty {difficulty} exceeds {HASH_BITS} bits"
            )));
        }
        let mut target = BigInt::from(1);
        target.shl_assign(HASH_BITS - difficulty);
        Ok(target)
    }

    /// Lower the nonce ceiling; used to keep exhaustion tests fast
    pub fn with_max_nonce(mut self, max_nonce: i64) -> ProofOfWork {
        self.max_nonce = max_nonce;
        self
    }

    pub fn get_difficulty(&self) -> u32 {
        self.difficulty
    }

    /// Whether a hex hash lies below the target
    pub fn validate_hash(&self, hash: &str) -> bool {
        match HEXLOWER.decode(hash.as_bytes()) {
            Ok(bytes) => BigInt::from_bytes_be(Sign::Plus, &bytes) < self.target,
            Err(_) => false,
        }
    }

    /// Recompute a mined block's hash and check it against its own difficulty
    pub fn validate(block: &Block) -> Result<bool> {
        let pow = ProofOfWork::new(block, block.get_difficulty())?;
        let hash = block.calculate_hash();
        Ok(hash == block.get_hash() && pow.validate_hash(&hash))
    }

    fn hash_digest(&self, nonce: i64) -> Vec<u8> {
        let data = format!("{}{}", self.prefix, nonce);
        sha256_digest(data.as_bytes())
    }

    pub fn run(&self) -> PowOutcome {
        self.run_until(|| false)
    }

    /// Search nonces from 0 upward, polling `should_stop` every
    /// [`CANCEL_CHECK_INTERVAL`] attempts
    pub fn run_until<F>(&self, mut should_stop: F) -> PowOutcome
    where
        F: FnMut() -> bool,
    {
        info!("Mining the block at difficulty {}", self.difficulty);
        let mut nonce = 0;
        while nonce < self.max_nonce {
            if nonce % CANCEL_CHECK_INTERVAL == 0 && should_stop() {
                info!("Mining cancelled after {nonce} attempts");
                return PowOutcome::Cancelled;
            }

            let hash = self.hash_digest(nonce);
            if BigInt::from_bytes_be(Sign::Plus, hash.as_slice()) < self.target {
                let hash = HEXLOWER.encode(hash.as_slice());
                info!("Found nonce {nonce}: {hash}");
                return PowOutcome::Found { nonce, hash };
            }

            if nonce > 0 && nonce % PROGRESS_LOG_INTERVAL == 0 {
                debug!("Tried {nonce} nonces");
            }
            nonce += 1;
        }
        info!("Nonce space exhausted after {} attempts", self.max_nonce);
        PowOutcome::Exhausted
    }
}
