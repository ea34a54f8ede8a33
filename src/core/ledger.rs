// The ledger owns the chain and the pending pool. Every mutation takes the
// write lock, and a block is validated and appended under that same lock so
// no reader ever sees a half-applied chain.

use crate::core::{Block, ChainValidator, Transaction, GENESIS_DIFFICULTY, SYSTEM_MINER};
use crate::economy::calculate_block_reward;
use crate::error::{BlockchainError, Result};
use crate::utils::current_timestamp;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Serializable ledger record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub chain: Vec<Block>,
    pub pending: Vec<Transaction>,
    pub difficulty: u32,
    pub block_reward: u64,
}

#[derive(Clone)]
pub struct Ledger {
    state: Arc<RwLock<LedgerSnapshot>>,
}

impl Default for Ledger {
    fn default() -> Self {
        Ledger::new()
    }
}

impl Ledger {
    /// A fresh ledger holding only the genesis block
    pub fn new() -> Ledger {
        info!("Creating ledger with genesis block");
        Ledger {
            state: Arc::new(RwLock::new(LedgerSnapshot {
                chain: vec![Block::generate_genesis_block()],
                pending: vec![],
                difficulty: GENESIS_DIFFICULTY,
                block_reward: calculate_block_reward(0),
            })),
        }
    }

    /// Rebuild a ledger from a stored record; the genesis invariants must hold
    pub fn from_snapshot(snapshot: LedgerSnapshot) -> Result<Ledger> {
        let genesis = snapshot.chain.first().ok_or_else(|| {
            BlockchainError::Precondition("Ledger snapshot has an empty chain".to_string())
        })?;
        if !genesis.is_genesis()
            || !genesis.get_prev_hash().is_empty()
            || genesis.get_miner() != SYSTEM_MINER
        {
            return Err(BlockchainError::Precondition(
                "Ledger snapshot has a malformed genesis block".to_string(),
            ));
        }
        if snapshot.difficulty == 0 {
            return Err(BlockchainError::Precondition(
                "Ledger snapshot has zero difficulty".to_string(),
            ));
        }
        info!(
            "Loaded ledger: {} blocks, {} pending",
            snapshot.chain.len(),
            snapshot.pending.len()
        );
        Ok(Ledger {
            state: Arc::new(RwLock::new(snapshot)),
        })
    }

    // Validation precedes every push, so state behind a poisoned lock is consistent
    fn read(&self) -> RwLockReadGuard<'_, LedgerSnapshot> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, LedgerSnapshot> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        self.read().clone()
    }

    /// Queue a transaction; callers validate it first
    pub fn add_transaction(&self, tx: Transaction) {
        self.write().pending.push(tx);
    }

    /// Validate `block` against the current tip and append it
    pub fn add_block(&self, block: Block) -> Result<()> {
        let now = current_timestamp()?;
        let mut state = self.write();
        let verdict = ChainValidator::validate_block_at(&block, state.chain.last(), now);
        if let Some(reason) = verdict.reason() {
            warn!("Rejected block {}: {reason}", block.get_index());
            return Err(BlockchainError::Validation(reason.to_string()));
        }
        if let Some(id) = repeated_transaction(&state.chain, &block) {
            let reason = format!(
                "Block {} repeats transaction {id}",
                block.get_index()
            );
            warn!("Rejected block {}: {reason}", block.get_index());
            return Err(BlockchainError::Validation(reason));
        }
        info!(
            "Appended block {} ({} transactions) {}",
            block.get_index(),
            block.get_transactions().len(),
            block.get_hash()
        );
        state.block_reward = calculate_block_reward(block.get_index() + 1);
        state.chain.push(block);
        Ok(())
    }

    pub fn clear_pending(&self) {
        self.write().pending.clear();
    }

    /// Drop pending transactions whose ids are in `ids`
    pub fn prune_pending(&self, ids: &HashSet<String>) -> usize {
        let mut state = self.write();
        let before = state.pending.len();
        state.pending.retain(|tx| !ids.contains(tx.get_id()));
        before - state.pending.len()
    }

    pub fn get_last_block(&self) -> Block {
        // The chain always holds genesis
        let state = self.read();
        match state.chain.last() {
            Some(block) => block.clone(),
            None => Block::generate_genesis_block(),
        }
    }

    pub fn get_block_count(&self) -> usize {
        self.read().chain.len()
    }

    pub fn get_pending_transactions(&self) -> Vec<Transaction> {
        self.read().pending.clone()
    }

    pub fn pending_len(&self) -> usize {
        self.read().pending.len()
    }

    pub fn tip_hash(&self) -> String {
        self.read()
            .chain
            .last()
            .map(|b| b.get_hash().to_string())
            .unwrap_or_default()
    }

    /// Copy of the whole chain
    pub fn blocks(&self) -> Vec<Block> {
        self.read().chain.clone()
    }

    /// Blocks with index strictly above `height`
    pub fn blocks_after(&self, height: i64) -> Vec<Block> {
        self.read()
            .chain
            .iter()
            .filter(|b| b.get_index() > height)
            .cloned()
            .collect()
    }

    pub fn get_difficulty(&self) -> u32 {
        self.read().difficulty
    }

    pub fn set_difficulty(&self, difficulty: u32) {
        self.write().difficulty = difficulty;
    }

    pub fn get_block_reward(&self) -> u64 {
        self.read().block_reward
    }

    /// Whether a block on the chain already carries `id`
    pub fn is_confirmed(&self, id: &str) -> bool {
        self.read()
            .chain
            .iter()
            .any(|b| b.get_transactions().iter().any(|tx| tx.get_id() == id))
    }

    /// Whether `id` is confirmed or waiting in the pool
    pub fn contains_transaction(&self, id: &str) -> bool {
        if self.read().pending.iter().any(|tx| tx.get_id() == id) {
            return true;
        }
        self.is_confirmed(id)
    }

    pub fn pending_ids(&self) -> HashSet<String> {
        self.read()
            .pending
            .iter()
            .map(|tx| tx.get_id().to_string())
            .collect()
    }

    /// Find a transaction by id prefix; `Some(None)` means still pending
    pub fn find_transaction(&self, id_prefix: &str) -> Option<(Transaction, Option<i64>)> {
        let state = self.read();
        for block in state.chain.iter().rev() {
            if let Some(tx) = block
                .get_transactions()
                .iter()
                .find(|tx| tx.get_id().starts_with(id_prefix))
            {
                return Some((tx.clone(), Some(block.get_index())));
            }
        }
        state
            .pending
            .iter()
            .find(|tx| tx.get_id().starts_with(id_prefix))
            .map(|tx| (tx.clone(), None))
    }
}

// First id in `block` that is already on `chain` or appears twice in `block`
fn repeated_transaction(chain: &[Block], block: &Block) -> Option<String> {
    let mut seen: HashSet<&str> = chain
        .iter()
        .flat_map(|b| b.get_transactions())
        .map(Transaction::get_id)
        .collect();
    block
        .get_transactions()
        .iter()
        .map(Transaction::get_id)
        .find(|id| !seen.insert(*id))
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::TransactionType;

    fn next_block(ledger: &Ledger) -> Block {
        let last = ledger.get_last_block();
        let now = current_timestamp().unwrap();
        Block::new_test_block(last.get_index() + 1, now, last.get_hash())
    }

    #[test]
    fn test_new_ledger_holds_genesis() {
        let ledger = Ledger::new();
        assert_eq!(ledger.get_block_count(), 1);
        assert_eq!(ledger.get_difficulty(), GENESIS_DIFFICULTY);
        assert_eq!(ledger.get_last_block().get_miner(), SYSTEM_MINER);
        assert_eq!(ledger.get_block_reward(), 10);
    }

    #[test]
    fn test_add_block_appends_valid_successor() {
        let ledger = Ledger::new();
        let block = next_block(&ledger);
        let hash = block.get_hash().to_string();
        ledger.add_block(block).unwrap();
        assert_eq!(ledger.get_block_count(), 2);
        assert_eq!(ledger.tip_hash(), hash);
    }

    #[test]
    fn test_add_block_rejects_and_leaves_chain_unchanged() {
        let ledger = Ledger::new();
        let bad = Block::new_test_block(1, current_timestamp().unwrap(), "elsewhere");
        let err = ledger.add_block(bad).unwrap_err();
        assert!(matches!(err, BlockchainError::Validation(_)));
        assert_eq!(ledger.get_block_count(), 1);
    }

    #[test]
    fn test_pending_pool() {
        let ledger = Ledger::new();
        let a = Transaction::new(TransactionType::Data, "a", "s", "", 0, 1, 1, 1);
        let b = Transaction::new(TransactionType::Data, "b", "s", "", 0, 1, 1, 2);
        ledger.add_transaction(a.clone());
        ledger.add_transaction(b.clone());
        // No duplicate suppression at this layer
        ledger.add_transaction(a.clone());
        assert_eq!(ledger.pending_len(), 3);

        let ids: HashSet<String> = [a.get_id().to_string()].into_iter().collect();
        assert_eq!(ledger.prune_pending(&ids), 2);
        assert_eq!(ledger.get_pending_transactions(), vec![b.clone()]);

        let (found, height) = ledger.find_transaction(&b.get_id()[..10]).unwrap();
        assert_eq!(found, b);
        assert_eq!(height, None);

        ledger.clear_pending();
        assert_eq!(ledger.pending_len(), 0);
    }

    #[test]
    fn test_confirmed_transactions_cannot_be_included_again() {
        let ledger = Ledger::new();
        let tx = Transaction::new(TransactionType::Data, "a", "s", "", 0, 1, 1, 1);
        ledger.add_transaction(tx.clone());
        assert!(ledger.contains_transaction(tx.get_id()));
        assert!(!ledger.is_confirmed(tx.get_id()));
        assert!(ledger.pending_ids().contains(tx.get_id()));

        let mut first = next_block(&ledger);
        first.transactions_mut().push(tx.clone());
        let first = first.resealed();
        ledger.add_block(first).unwrap();
        ledger.clear_pending();
        assert!(ledger.is_confirmed(tx.get_id()));
        assert!(ledger.contains_transaction(tx.get_id()));

        let mut replay = next_block(&ledger);
        replay.transactions_mut().push(tx.clone());
        let err = ledger.add_block(replay.resealed()).unwrap_err();
        assert!(matches!(err, BlockchainError::Validation(reason) if reason.contains("repeats")));
        assert_eq!(ledger.get_block_count(), 2);
    }

    #[test]
    fn test_block_with_duplicate_transaction_is_rejected() {
        let ledger = Ledger::new();
        let tx = Transaction::new(TransactionType::Data, "a", "s", "", 0, 1, 1, 1);
        let mut block = next_block(&ledger);
        block.transactions_mut().push(tx.clone());
        block.transactions_mut().push(tx);
        assert!(ledger.add_block(block.resealed()).is_err());
        assert_eq!(ledger.get_block_count(), 1);
    }

    #[test]
    fn test_snapshot_round_trip() {
        let ledger = Ledger::new();
        ledger.add_block(next_block(&ledger)).unwrap();
        ledger.set_difficulty(3);

        let restored = Ledger::from_snapshot(ledger.snapshot()).unwrap();
        assert_eq!(restored.blocks(), ledger.blocks());
        assert_eq!(restored.get_difficulty(), 3);
        assert_eq!(restored.blocks_after(0).len(), 1);
    }

    #[test]
    fn test_from_snapshot_rejects_bad_genesis() {
        let mut snapshot = Ledger::new().snapshot();
        snapshot.chain.clear();
        assert!(matches!(
            Ledger::from_snapshot(snapshot),
            Err(BlockchainError::Precondition(_))
        ));

        let mut snapshot = Ledger::new().snapshot();
        snapshot.chain[0] = Block::new_test_block(0, 5, "");
        assert!(Ledger::from_snapshot(snapshot).is_err());
    }

    #[test]
    fn test_clones_share_state() {
        let ledger = Ledger::new();
        let other = ledger.clone();
        other.add_block(next_block(&other)).unwrap();
        assert_eq!(ledger.get_block_count(), 2);
    }
}
