use crate::core::{Transaction, TransactionType};
use crate::economy::{MAX_TRANSACTION_FEE, MIN_TRANSACTION_FEE};
use crate::error::Result;
use crate::storage::AccountStore;
use crate::wallet::short_address;
use log::info;
use serde::{Deserialize, Serialize};

/// Receiver of the burned part of every fee; nobody holds its key
pub const BURN_ADDRESS: &str = "BURN0000000000000000000000000000";

/// Split a fee into `(miner_share, burned)`; the miner gets 80% rounded half up
pub fn calculate_fee_distribution(fee: u64) -> (u64, u64) {
    let miner_share = (fee.saturating_mul(80).saturating_add(50)) / 100;
    (miner_share, fee - miner_share)
}

pub fn validate_transaction_fee(fee: u64) -> bool {
    (MIN_TRANSACTION_FEE..=MAX_TRANSACTION_FEE).contains(&fee)
}

/// Build the Fee records describing where `tx`'s fee went
pub fn create_fee_distribution_transactions(tx: &Transaction, collector: &str) -> Vec<Transaction> {
    let (miner_share, burned) = calculate_fee_distribution(tx.get_fee());
    let mut records = vec![];
    if miner_share > 0 {
        records.push(Transaction::new(
            TransactionType::Fee,
            "",
            tx.get_sender(),
            collector,
            miner_share,
            0,
            tx.get_timestamp(),
            tx.get_nonce().wrapping_add(1),
        ));
    }
    if burned > 0 {
        records.push(Transaction::new(
            TransactionType::Fee,
            "",
            tx.get_sender(),
            BURN_ADDRESS,
            burned,
            0,
            tx.get_timestamp(),
            tx.get_nonce().wrapping_add(2),
        ));
    }
    records
}

/// Running fee totals for the blocks this node has applied
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeManager {
    total_fees_collected: u64,
    total_fees_burned: u64,
}

impl FeeManager {
    pub fn new() -> FeeManager {
        FeeManager::default()
    }

    /// Pay the miner share of every fee in `transactions` to `collector` and
    /// return the Fee records for the split
    pub fn process_fees(
        &mut self,
        transactions: &[Transaction],
        collector: &str,
        accounts: &mut AccountStore,
    ) -> Result<Vec<Transaction>> {
        let mut records = vec![];
        let mut collected = 0u64;
        let mut burned = 0u64;

        for tx in transactions.iter().filter(|tx| tx.get_fee() > 0) {
            let (miner_share, burn) = calculate_fee_distribution(tx.get_fee());
            if miner_share > 0 {
                accounts.credit(collector, miner_share)?;
            }
            collected = collected.saturating_add(tx.get_fee());
            burned = burned.saturating_add(burn);
            records.extend(create_fee_distribution_transactions(tx, collector));
        }

        self.total_fees_collected = self.total_fees_collected.saturating_add(collected);
        self.total_fees_burned = self.total_fees_burned.saturating_add(burned);

        if collected > 0 {
            info!(
                "Block fees: {collected} collected, {burned} burned, miner {}",
                short_address(collector)
            );
        }
        Ok(records)
    }

    /// `(collected, burned)` since this manager was created
    pub fn get_fee_statistics(&self) -> (u64, u64) {
        (self.total_fees_collected, self.total_fees_burned)
    }
}
