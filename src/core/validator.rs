//! Stateless structural and temporal checks for transactions, blocks and chains
//!
//! Expected rejections (bad hash, broken link, skewed clock) come back as a
//! [`Verdict`]; only impossible inputs such as an empty chain are errors.

use crate::core::{Block, Transaction, TransactionType};
use crate::economy::{MAX_TRANSACTION_FEE, MIN_TRANSACTION_FEE};
use crate::error::{BlockchainError, Result};
use crate::utils::current_timestamp;
use log::{debug, warn};

/// How far a transaction timestamp may run ahead of the local clock
pub const MAX_TX_FUTURE_DRIFT_SECS: i64 = 300;
/// How far a block timestamp may run ahead of the local clock
pub const MAX_BLOCK_FUTURE_DRIFT_SECS: i64 = 3600;

/// Outcome of a validation check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Accepted,
    Rejected(String),
}

impl Verdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Verdict::Accepted)
    }

    /// Rejection reason, if any
    pub fn reason(&self) -> Option<&str> {
        match self {
            Verdict::Accepted => None,
            Verdict::Rejected(reason) => Some(reason.as_str()),
        }
    }

    /// Turn a rejection into a validation error for callers that propagate with `?`
    pub fn into_result(self) -> Result<()> {
        match self {
            Verdict::Accepted => Ok(()),
            Verdict::Rejected(reason) => Err(BlockchainError::Validation(reason)),
        }
    }
}

fn reject(reason: String) -> Verdict {
    warn!("{reason}");
    Verdict::Rejected(reason)
}

pub struct ChainValidator;

impl ChainValidator {
    pub fn validate_transaction(tx: &Transaction) -> Result<Verdict> {
        Ok(Self::validate_transaction_at(tx, current_timestamp()?))
    }

    /// Check a transaction against a given clock reading
    pub fn validate_transaction_at(tx: &Transaction, now: i64) -> Verdict {
        if tx.get_type() == TransactionType::Data && tx.get_data().is_empty() {
            return reject(format!("Transaction {} has no data", tx.get_id()));
        }

        if !(MIN_TRANSACTION_FEE..=MAX_TRANSACTION_FEE).contains(&tx.get_fee()) {
            return reject(format!(
                "Transaction {} fee {} outside {MIN_TRANSACTION_FEE}-{MAX_TRANSACTION_FEE}",
                tx.get_id(),
                tx.get_fee()
            ));
        }

        if tx.get_id() != tx.calculate_id() {
            return reject(format!("Transaction {} id does not match content", tx.get_id()));
        }

        if tx.get_timestamp() > now + MAX_TX_FUTURE_DRIFT_SECS {
            return reject(format!(
                "Transaction {} timestamp {} is in the future",
                tx.get_id(),
                tx.get_timestamp()
            ));
        }

        debug!("Transaction {} validation passed", tx.get_id());
        Verdict::Accepted
    }

    /// Check `block` as the successor of `previous`; `None` means genesis
    pub fn validate_block_at(block: &Block, previous: Option<&Block>, now: i64) -> Verdict {
        if block.get_index() < 0 {
            return reject(format!("Block index {} is negative", block.get_index()));
        }

        match previous {
            None => {
                if !block.is_genesis() {
                    return reject(format!(
                        "Block {} has no predecessor",
                        block.get_index()
                    ));
                }
                if !block.get_prev_hash().is_empty() {
                    return reject("Genesis block must not have a previous hash".to_string());
                }
            }
            Some(prev) => {
                if block.get_index() != prev.get_index() + 1 {
                    return reject(format!(
                        "Block index out of order: expected {}, got {}",
                        prev.get_index() + 1,
                        block.get_index()
                    ));
                }
                if block.get_prev_hash() != prev.get_hash() {
                    return reject(format!(
                        "Block {} points to wrong previous hash",
                        block.get_index()
                    ));
                }
            }
        }

        let calculated = block.calculate_hash();
        if block.get_hash() != calculated {
            return reject(format!(
                "Block {} hash is invalid: expected {calculated}, got {}",
                block.get_index(),
                block.get_hash()
            ));
        }

        if block.get_timestamp() > now + MAX_BLOCK_FUTURE_DRIFT_SECS {
            return reject(format!(
                "Block {} timestamp {} is in the future",
                block.get_index(),
                block.get_timestamp()
            ));
        }

        if let Some(prev) = previous {
            if block.get_timestamp() < prev.get_timestamp() {
                return reject(format!(
                    "Block {} timestamp is before previous block",
                    block.get_index()
                ));
            }
        }

        debug!("Block {} validation passed", block.get_index());
        Verdict::Accepted
    }

    /// Check `block` as the next block on top of `chain`
    pub fn validate_block(chain: &[Block], block: &Block) -> Result<Verdict> {
        if chain.is_empty() {
            return Err(BlockchainError::Precondition(
                "Cannot validate a block against an empty chain".to_string(),
            ));
        }
        Ok(Self::validate_block_at(
            block,
            chain.last(),
            current_timestamp()?,
        ))
    }

    /// Validate every block after genesis, stopping at the first failure
    pub fn validate_chain(chain: &[Block]) -> Result<Verdict> {
        Self::validate_chain_at(chain, current_timestamp()?)
    }

    /// Validate a chain against a given clock reading
    pub fn validate_chain_at(chain: &[Block], now: i64) -> Result<Verdict> {
        if chain.is_empty() {
            return Err(BlockchainError::Precondition(
                "Chain has no genesis block".to_string(),
            ));
        }

        for pair in chain.windows(2) {
            let verdict = Self::validate_block_at(&pair[1], Some(&pair[0]), now);
            if !verdict.is_accepted() {
                warn!("Chain invalid at block {}", pair[1].get_index());
                return Ok(verdict);
            }
        }

        debug!("Validated {} blocks", chain.len());
        Ok(Verdict::Accepted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_800_000_000;

    fn data_tx(data: &str, fee: u64, timestamp: i64) -> Transaction {
        Transaction::new(TransactionType::Data, data, "alice", "", 0, fee, timestamp, 1)
    }

    fn linked(prev: &Block, timestamp: i64) -> Block {
        Block::new_test_block(prev.get_index() + 1, timestamp, prev.get_hash())
    }

    #[test]
    fn test_valid_transaction() {
        assert!(ChainValidator::validate_transaction_at(&data_tx("ok", 1, NOW), NOW).is_accepted());
        assert!(ChainValidator::validate_transaction_at(&data_tx("ok", 5, NOW), NOW).is_accepted());
    }

    #[test]
    fn test_transaction_rejections() {
        assert!(!ChainValidator::validate_transaction_at(&data_tx("", 2, NOW), NOW).is_accepted());
        assert!(!ChainValidator::validate_transaction_at(&data_tx("x", 0, NOW), NOW).is_accepted());
        assert!(!ChainValidator::validate_transaction_at(&data_tx("x", 6, NOW), NOW).is_accepted());

        let future = data_tx("x", 2, NOW + MAX_TX_FUTURE_DRIFT_SECS + 1);
        assert!(!ChainValidator::validate_transaction_at(&future, NOW).is_accepted());
        let edge = data_tx("x", 2, NOW + MAX_TX_FUTURE_DRIFT_SECS);
        assert!(ChainValidator::validate_transaction_at(&edge, NOW).is_accepted());

        let mut tampered = data_tx("x", 2, NOW);
        tampered.tamper_data("y");
        let verdict = ChainValidator::validate_transaction_at(&tampered, NOW);
        assert!(verdict.reason().unwrap().contains("id does not match"));
    }

    #[test]
    fn test_transfer_without_data_is_fine() {
        let tx = Transaction::new(TransactionType::Transfer, "", "a", "b", 5, 1, NOW, 1);
        assert!(ChainValidator::validate_transaction_at(&tx, NOW).is_accepted());
    }

    #[test]
    fn test_block_linkage() {
        let genesis = Block::generate_genesis_block();
        let next = linked(&genesis, NOW);
        assert!(ChainValidator::validate_block_at(&next, Some(&genesis), NOW).is_accepted());

        let wrong_index = Block::new_test_block(2, NOW, genesis.get_hash());
        assert!(!ChainValidator::validate_block_at(&wrong_index, Some(&genesis), NOW).is_accepted());

        let wrong_parent = Block::new_test_block(1, NOW, "deadbeef");
        assert!(!ChainValidator::validate_block_at(&wrong_parent, Some(&genesis), NOW).is_accepted());
    }

    #[test]
    fn test_block_hash_mismatch() {
        let genesis = Block::generate_genesis_block();
        let mut next = linked(&genesis, NOW);
        next.seal(99, next.get_hash().to_string());
        let verdict = ChainValidator::validate_block_at(&next, Some(&genesis), NOW);
        assert!(verdict.reason().unwrap().contains("hash is invalid"));
    }

    #[test]
    fn test_block_timestamps() {
        let genesis = Block::generate_genesis_block();
        let too_far = linked(&genesis, NOW + MAX_BLOCK_FUTURE_DRIFT_SECS + 1);
        assert!(!ChainValidator::validate_block_at(&too_far, Some(&genesis), NOW).is_accepted());

        let first = linked(&genesis, NOW);
        let earlier = linked(&first, NOW - 1);
        assert!(!ChainValidator::validate_block_at(&earlier, Some(&first), NOW).is_accepted());
        let same_second = linked(&first, NOW);
        assert!(ChainValidator::validate_block_at(&same_second, Some(&first), NOW).is_accepted());
    }

    #[test]
    fn test_genesis_rules() {
        let genesis = Block::generate_genesis_block();
        assert!(ChainValidator::validate_block_at(&genesis, None, NOW).is_accepted());

        let bad_genesis = Block::new_test_block(0, NOW, "something");
        assert!(!ChainValidator::validate_block_at(&bad_genesis, None, NOW).is_accepted());

        let orphan = Block::new_test_block(4, NOW, "");
        assert!(!ChainValidator::validate_block_at(&orphan, None, NOW).is_accepted());
    }

    #[test]
    fn test_chain_validation_short_circuits() {
        let genesis = Block::generate_genesis_block();
        let b1 = linked(&genesis, NOW - 100);
        let b2 = linked(&b1, NOW - 50);
        let chain = vec![genesis.clone(), b1.clone(), b2.clone()];
        assert!(ChainValidator::validate_chain_at(&chain, NOW).unwrap().is_accepted());

        let broken = Block::new_test_block(2, NOW - 50, "not-b1");
        let chain = vec![genesis, b1, broken];
        assert!(!ChainValidator::validate_chain_at(&chain, NOW).unwrap().is_accepted());
    }

    #[test]
    fn test_chain_validation_uses_wall_clock() {
        let now = current_timestamp().unwrap();
        let genesis = Block::generate_genesis_block();
        let b1 = linked(&genesis, now - 10);
        let chain = vec![genesis.clone(), b1];
        assert!(ChainValidator::validate_chain(&chain).unwrap().is_accepted());

        let ahead = linked(&genesis, now + 2 * MAX_BLOCK_FUTURE_DRIFT_SECS);
        assert!(!ChainValidator::validate_chain(&[genesis, ahead]).unwrap().is_accepted());
    }

    #[test]
    fn test_empty_chain_is_precondition_fault() {
        let result = ChainValidator::validate_chain(&[]);
        assert!(matches!(result, Err(BlockchainError::Precondition(_))));
        let result = ChainValidator::validate_chain_at(&[], NOW);
        assert!(matches!(result, Err(BlockchainError::Precondition(_))));

        let block = Block::generate_genesis_block();
        let result = ChainValidator::validate_block(&[], &block);
        assert!(matches!(result, Err(BlockchainError::Precondition(_))));
    }

    #[test]
    fn test_verdict_into_result() {
        assert!(Verdict::Accepted.into_result().is_ok());
        let err = Verdict::Rejected("bad".to_string()).into_result().unwrap_err();
        assert_eq!(err, BlockchainError::Validation("bad".to_string()));
    }
}
