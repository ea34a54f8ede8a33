use crate::core::Transaction;
use crate::utils::sha256_hex;
use serde::{Deserialize, Serialize};

/// Miner sentinel for the genesis block
pub const SYSTEM_MINER: &str = "system";
/// Miner sentinel for blocks whose producer is not known
pub const UNKNOWN_MINER: &str = "unknown";
/// Fixed genesis timestamp so every node derives the same genesis hash
pub const GENESIS_TIMESTAMP: i64 = 1_704_067_200;
/// Difficulty recorded on the genesis block
pub const GENESIS_DIFFICULTY: u32 = 2;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    index: i64,
    timestamp: i64,
    transactions: Vec<Transaction>,
    prev_hash: String,
    hash: String,
    nonce: i64,
    difficulty: u32,
    miner: String,
}

impl Block {
    /// Build an unmined candidate; `hash` is derived for nonce 0
    pub fn new_candidate(
        index: i64,
        timestamp: i64,
        transactions: Vec<Transaction>,
        prev_hash: &str,
        difficulty: u32,
        miner: &str,
    ) -> Block {
        let mut block = Block {
            index,
            timestamp,
            transactions,
            prev_hash: prev_hash.to_string(),
            hash: String::new(),
            nonce: 0,
            difficulty,
            miner: miner.to_string(),
        };
        block.hash = block.calculate_hash();
        block
    }

    pub fn generate_genesis_block() -> Block {
        Block::new_candidate(
            0,
            GENESIS_TIMESTAMP,
            vec![],
            "",
            GENESIS_DIFFICULTY,
            SYSTEM_MINER,
        )
    }

    /// Concatenated transaction material covered by the block hash
    pub fn transactions_data(&self) -> String {
        self.transactions
            .iter()
            .map(Transaction::block_material)
            .collect()
    }

    /// Everything the hash covers except the nonce
    pub fn header_prefix(&self) -> String {
        format!(
            "{}{}{}{}",
            self.index,
            self.timestamp,
            self.transactions_data(),
            self.prev_hash
        )
    }

    /// Header bytes for a given nonce
    pub fn hash_preimage(&self, nonce: i64) -> String {
        format!("{}{}", self.header_prefix(), nonce)
    }

    pub fn calculate_hash(&self) -> String {
        self.calculate_hash_with_nonce(self.nonce)
    }

    pub fn calculate_hash_with_nonce(&self, nonce: i64) -> String {
        sha256_hex(self.hash_preimage(nonce).as_bytes())
    }

    /// Record the proof-of-work result on the block
    pub fn seal(&mut self, nonce: i64, hash: String) {
        self.nonce = nonce;
        self.hash = hash;
    }

    pub fn is_genesis(&self) -> bool {
        self.index == 0
    }

    pub fn get_index(&self) -> i64 {
        self.index
    }

    pub fn get_timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn get_transactions(&self) -> &[Transaction] {
        self.transactions.as_slice()
    }

    pub fn get_prev_hash(&self) -> &str {
        self.prev_hash.as_str()
    }

    pub fn get_hash(&self) -> &str {
        self.hash.as_str()
    }

    pub fn get_nonce(&self) -> i64 {
        self.nonce
    }

    pub fn get_difficulty(&self) -> u32 {
        self.difficulty
    }

    pub fn get_miner(&self) -> &str {
        self.miner.as_str()
    }

    /// Sum of all fees carried by the block's transactions
    pub fn total_fees(&self) -> u64 {
        self.transactions
            .iter()
            .map(Transaction::get_fee)
            .fold(0u64, u64::saturating_add)
    }

    /// Block with a chosen timestamp and parent, hash derived but not mined
    #[cfg(test)]
    pub fn new_test_block(index: i64, timestamp: i64, prev_hash: &str) -> Block {
        Block::new_candidate(index, timestamp, vec![], prev_hash, 1, UNKNOWN_MINER)
    }

    #[cfg(test)]
    pub fn transactions_mut(&mut self) -> &mut Vec<Transaction> {
        &mut self.transactions
    }

    /// Same block with its hash recomputed after test edits
    #[cfg(test)]
    pub fn resealed(mut self) -> Block {
        self.hash = self.calculate_hash();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::TransactionType;

    #[test]
    fn test_genesis_block_invariants() {
        let genesis = Block::generate_genesis_block();
        assert_eq!(genesis.get_index(), 0);
        assert_eq!(genesis.get_prev_hash(), "");
        assert_eq!(genesis.get_miner(), SYSTEM_MINER);
        assert_eq!(genesis.get_hash(), genesis.calculate_hash());
        // Deterministic across nodes
        assert_eq!(genesis, Block::generate_genesis_block());
    }

    #[test]
    fn test_hash_preimage_layout() {
        let block = Block::new_test_block(3, 1000, "abc");
        assert_eq!(block.hash_preimage(42), "31000abc42");
    }

    #[test]
    fn test_hash_covers_transaction_payload() {
        let tx = Transaction::new(TransactionType::Data, "reading=1", "a", "", 0, 1, 10, 1);
        let mut block = Block::new_candidate(1, 10, vec![tx], "prev", 1, "miner");
        let original = block.calculate_hash();

        block.transactions_mut()[0].tamper_data("reading=2");
        assert_ne!(original, block.calculate_hash());
    }

    #[test]
    fn test_total_fees() {
        let txs = vec![
            Transaction::new(TransactionType::Data, "x", "a", "", 0, 2, 10, 1),
            Transaction::new(TransactionType::Data, "y", "a", "", 0, 3, 10, 2),
        ];
        let block = Block::new_candidate(1, 10, txs, "prev", 1, "miner");
        assert_eq!(block.total_fees(), 5);
    }
}
