use crate::core::{Block, Ledger, PowOutcome, ProofOfWork, MAX_NONCE};
use crate::economy::RewardManager;
use crate::error::{BlockchainError, Result};
use crate::utils::current_timestamp;
use crate::wallet::short_address;
use log::{error, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

// Granularity of the stop check while the loop sleeps between attempts
const STOP_POLL: Duration = Duration::from_millis(50);

/// Builds and mines blocks on top of a ledger for one reward address
#[derive(Clone)]
pub struct Miner {
    address: String,
    ledger: Ledger,
    max_nonce: i64,
}

impl Miner {
    pub fn new(address: &str, ledger: Ledger) -> Miner {
        Miner {
            address: address.to_string(),
            ledger,
            max_nonce: MAX_NONCE,
        }
    }

    /// Lower the nonce ceiling for every search this miner runs
    pub fn with_max_nonce(mut self, max_nonce: i64) -> Miner {
        self.max_nonce = max_nonce;
        self
    }

    pub fn get_address(&self) -> &str {
        self.address.as_str()
    }

    pub fn mine_block(&self) -> Result<Block> {
        self.mine_block_until(|| false)
    }

    /// Mine the pending pool into a new block without appending it.
    ///
    /// The reward transaction, while the schedule still pays one, sits at
    /// position 0 and is part of the hashed content, so the returned block
    /// validates as-is.
    pub fn mine_block_until<F>(&self, should_stop: F) -> Result<Block>
    where
        F: FnMut() -> bool,
    {
        let pending = self.ledger.get_pending_transactions();
        if pending.is_empty() {
            return Err(BlockchainError::NothingToMine);
        }

        let last = self.ledger.get_last_block();
        let index = last.get_index() + 1;
        let difficulty = self.ledger.get_difficulty();

        let mut transactions = Vec::with_capacity(pending.len() + 1);
        if let Some(reward) = RewardManager::new(&self.address).create_block_reward(index)? {
            transactions.push(reward);
        }
        transactions.extend(pending);

        let mut block = Block::new_candidate(
            index,
            current_timestamp()?.max(last.get_timestamp()),
            transactions,
            last.get_hash(),
            difficulty,
            &self.address,
        );

        let pow = ProofOfWork::new(&block, difficulty)?.with_max_nonce(self.max_nonce);
        match pow.run_until(should_stop) {
            PowOutcome::Found { nonce, hash } => {
                block.seal(nonce, hash);
                info!(
                    "Mined block {} for {} with {} transactions",
                    block.get_index(),
                    short_address(&self.address),
                    block.get_transactions().len()
                );
                Ok(block)
            }
            PowOutcome::Exhausted => Err(BlockchainError::NonceExhausted {
                difficulty,
                attempts: self.max_nonce,
            }),
            PowOutcome::Cancelled => Err(BlockchainError::MiningCancelled),
        }
    }

    /// Mine in a background thread until stopped.
    ///
    /// Each mined block goes to `on_block`, which is expected to append it and
    /// clear the pending pool. A search is abandoned as soon as the ledger tip
    /// moves or a stop is requested.
    pub fn start_mining<F>(self, interval: Duration, on_block: F) -> MiningHandle
    where
        F: Fn(Block) -> Result<()> + Send + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        info!("Miner {} started", short_address(&self.address));

        let handle = thread::spawn(move || {
            while !flag.load(Ordering::SeqCst) {
                if self.ledger.pending_len() > 0 {
                    let parent = self.ledger.tip_hash();
                    let ledger = self.ledger.clone();
                    let outcome = self.mine_block_until(|| {
                        flag.load(Ordering::SeqCst) || ledger.tip_hash() != parent
                    });
                    match outcome {
                        Ok(block) => {
                            let index = block.get_index();
                            if let Err(e) = on_block(block) {
                                error!("Mined block {index} was not accepted: {e}");
                            }
                        }
                        Err(BlockchainError::NothingToMine) => {}
                        Err(e) if e.is_retryable() => warn!("{e}"),
                        Err(e) => error!("Mining failed: {e}"),
                    }
                }
                sleep_unless_stopped(&flag, interval);
            }
            info!("Miner {} stopped", short_address(&self.address));
        });

        MiningHandle {
            stop,
            handle: Some(handle),
        }
    }
}

fn sleep_unless_stopped(flag: &AtomicBool, interval: Duration) {
    let mut remaining = interval;
    while !remaining.is_zero() && !flag.load(Ordering::SeqCst) {
        let step = remaining.min(STOP_POLL);
        thread::sleep(step);
        remaining -= step;
    }
}

/// Handle to a running mining loop; dropping it stops the loop
pub struct MiningHandle {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl MiningHandle {
    pub fn is_running(&self) -> bool {
        !self.stop.load(Ordering::SeqCst)
    }

    /// Signal the loop and wait for it to exit
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("Mining thread panicked");
            }
        }
    }
}

impl Drop for MiningHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}
