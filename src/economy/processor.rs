//! Applies a transaction's balance effect to account state

use crate::core::{Transaction, TransactionType, MIN_STAKE};
use crate::economy::{validate_transaction_fee, MAX_TRANSACTION_FEE, MIN_TRANSACTION_FEE};
use crate::error::{BlockchainError, Result};
use crate::storage::AccountStore;
use crate::wallet::short_address;
use log::info;

pub struct TransactionProcessor;

impl TransactionProcessor {
    /// Check `tx` and apply it to `accounts`. Nothing is mutated unless every
    /// check passes.
    pub fn process_transaction(tx: &Transaction, accounts: &mut AccountStore) -> Result<()> {
        Self::check_structure(tx)?;

        let required = tx.get_amount().checked_add(tx.get_fee()).ok_or_else(|| {
            BlockchainError::Transaction("Amount plus fee overflows".to_string())
        })?;
        let available = accounts.balance(tx.get_sender());
        if available < required {
            return Err(BlockchainError::InsufficientFunds {
                required,
                available,
            });
        }

        Self::check_type_rules(tx)?;

        match tx.get_type() {
            TransactionType::Data => {
                accounts.debit(tx.get_sender(), tx.get_fee())?;
                info!(
                    "Data transaction processed: {} paid {} fee",
                    short_address(tx.get_sender()),
                    tx.get_fee()
                );
            }
            TransactionType::Transfer => {
                // Credit can only fail on overflow; check before touching the sender
                let receiver_balance = accounts.balance(tx.get_receiver());
                if receiver_balance.checked_add(tx.get_amount()).is_none() {
                    return Err(BlockchainError::BalanceOverflow {
                        address: tx.get_receiver().to_string(),
                        balance: receiver_balance,
                        amount: tx.get_amount(),
                    });
                }
                accounts.debit(tx.get_sender(), required)?;
                accounts.credit(tx.get_receiver(), tx.get_amount())?;
                info!(
                    "Transfer processed: {} -> {}: {} (fee {})",
                    short_address(tx.get_sender()),
                    short_address(tx.get_receiver()),
                    tx.get_amount(),
                    tx.get_fee()
                );
            }
            TransactionType::Stake => {
                accounts.debit(tx.get_sender(), tx.get_amount())?;
                info!(
                    "Stake processed: {} staked {}",
                    short_address(tx.get_sender()),
                    tx.get_amount()
                );
            }
            other => {
                return Err(BlockchainError::Transaction(format!(
                    "Unsupported transaction type: {other}"
                )));
            }
        }
        Ok(())
    }

    fn check_structure(tx: &Transaction) -> Result<()> {
        if tx.get_id().is_empty() {
            return Err(BlockchainError::Transaction("Transaction id is required".to_string()));
        }
        if tx.get_sender().is_empty() {
            return Err(BlockchainError::Transaction("Sender address is required".to_string()));
        }
        if tx.get_timestamp() == 0 {
            return Err(BlockchainError::Transaction(
                "Transaction timestamp is required".to_string(),
            ));
        }
        if tx.get_id() != tx.calculate_id() {
            return Err(BlockchainError::Transaction("Transaction id is invalid".to_string()));
        }
        if !validate_transaction_fee(tx.get_fee()) {
            return Err(BlockchainError::InvalidFee {
                fee: tx.get_fee(),
                min: MIN_TRANSACTION_FEE,
                max: MAX_TRANSACTION_FEE,
            });
        }
        if tx.get_amount() > 0 && tx.get_receiver().is_empty() {
            return Err(BlockchainError::Transaction(
                "Transaction with an amount must have a receiver".to_string(),
            ));
        }
        Ok(())
    }

    fn check_type_rules(tx: &Transaction) -> Result<()> {
        match tx.get_type() {
            TransactionType::Data if tx.get_data().is_empty() => Err(BlockchainError::Transaction(
                "Data transactions must contain data".to_string(),
            )),
            TransactionType::Transfer if tx.get_receiver().is_empty() => Err(
                BlockchainError::Transaction("Transfer requires a receiver".to_string()),
            ),
            TransactionType::Transfer if tx.get_amount() == 0 => Err(BlockchainError::Transaction(
                "Transfer amount must be greater than 0".to_string(),
            )),
            TransactionType::Transfer if tx.get_sender() == tx.get_receiver() => Err(
                BlockchainError::Transaction("Cannot transfer to self".to_string()),
            ),
            TransactionType::Stake if tx.get_receiver() != tx.get_sender() => Err(
                BlockchainError::Transaction("Stake must be locked on the sender".to_string()),
            ),
            TransactionType::Stake if tx.get_amount() < MIN_STAKE => {
                Err(BlockchainError::StakeTooLow {
                    amount: tx.get_amount(),
                    minimum: MIN_STAKE,
                })
            }
            _ => Ok(()),
        }
    }
}
