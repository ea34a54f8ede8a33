//! Account balances and nonces

use crate::error::{BlockchainError, Result};
use crate::wallet::short_address;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Coins credited to each genesis address
pub const GENESIS_ALLOCATION: u64 = 1000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub address: String,
    pub balance: u64,
    pub nonce: u64,
}

impl Account {
    fn new(address: &str, balance: u64) -> Account {
        Account {
            address: address.to_string(),
            balance,
            nonce: 0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountStore {
    accounts: HashMap<String, Account>,
}

impl AccountStore {
    pub fn new() -> AccountStore {
        AccountStore::default()
    }

    /// Balance of `address`; unknown addresses hold nothing
    pub fn balance(&self, address: &str) -> u64 {
        self.accounts.get(address).map_or(0, |a| a.balance)
    }

    pub fn get(&self, address: &str) -> Option<&Account> {
        self.accounts.get(address)
    }

    /// Add `amount` to `address`, creating the account when needed
    pub fn credit(&mut self, address: &str, amount: u64) -> Result<()> {
        let account = self
            .accounts
            .entry(address.to_string())
            .or_insert_with(|| Account::new(address, 0));
        account.balance = account.balance.checked_add(amount).ok_or_else(|| {
            BlockchainError::BalanceOverflow {
                address: address.to_string(),
                balance: account.balance,
                amount,
            }
        })?;
        debug!("Credited {amount} to {}", short_address(address));
        Ok(())
    }

    /// Remove `amount` from `address` and bump its nonce
    pub fn debit(&mut self, address: &str, amount: u64) -> Result<()> {
        let account = self
            .accounts
            .get_mut(address)
            .ok_or_else(|| BlockchainError::AccountNotFound(address.to_string()))?;
        if account.balance < amount {
            return Err(BlockchainError::InsufficientFunds {
                required: amount,
                available: account.balance,
            });
        }
        account.balance -= amount;
        account.nonce += 1;
        debug!("Debited {amount} from {}", short_address(address));
        Ok(())
    }

    /// Give each address the genesis allocation; only valid on an empty store
    pub fn initialize_genesis(&mut self, addresses: &[String]) -> Result<()> {
        if !self.accounts.is_empty() {
            return Err(BlockchainError::Precondition(format!(
                "Genesis allocation needs an empty account store, found {} accounts",
                self.accounts.len()
            )));
        }
        for address in addresses {
            self.accounts
                .insert(address.clone(), Account::new(address, GENESIS_ALLOCATION));
            info!(
                "Genesis allocation: {} -> {GENESIS_ALLOCATION}",
                short_address(address)
            );
        }
        Ok(())
    }

    pub fn total_balance(&self) -> u64 {
        self.accounts
            .values()
            .map(|a| a.balance)
            .fold(0, u64::saturating_add)
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// Accounts sorted by address
    pub fn accounts(&self) -> Vec<Account> {
        let mut accounts: Vec<Account> = self.accounts.values().cloned().collect();
        accounts.sort_by(|a, b| a.address.cmp(&b.address));
        accounts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credit_creates_account() {
        let mut store = AccountStore::new();
        assert_eq!(store.balance("bob"), 0);
        store.credit("bob", 7).unwrap();
        assert_eq!(store.balance("bob"), 7);
        assert_eq!(store.get("bob").unwrap().nonce, 0);
    }

    #[test]
    fn test_credit_overflow_is_rejected() {
        let mut store = AccountStore::new();
        store.credit("bob", u64::MAX).unwrap();
        let err = store.credit("bob", 1).unwrap_err();
        assert!(matches!(err, BlockchainError::BalanceOverflow { .. }));
        assert_eq!(store.balance("bob"), u64::MAX);
    }

    #[test]
    fn test_debit_rules() {
        let mut store = AccountStore::new();
        assert_eq!(
            store.debit("ghost", 1).unwrap_err(),
            BlockchainError::AccountNotFound("ghost".to_string())
        );

        store.credit("alice", 10).unwrap();
        assert_eq!(
            store.debit("alice", 11).unwrap_err(),
            BlockchainError::InsufficientFunds {
                required: 11,
                available: 10
            }
        );
        store.debit("alice", 4).unwrap();
        assert_eq!(store.balance("alice"), 6);
        assert_eq!(store.get("alice").unwrap().nonce, 1);
    }

    #[test]
    fn test_genesis_allocation() {
        let mut store = AccountStore::new();
        store
            .initialize_genesis(&["a".to_string(), "b".to_string()])
            .unwrap();
        assert_eq!(store.balance("a"), GENESIS_ALLOCATION);
        assert_eq!(store.total_balance(), 2 * GENESIS_ALLOCATION);
        assert_eq!(store.len(), 2);
        assert_eq!(store.accounts()[0].address, "a");
    }

    #[test]
    fn test_genesis_allocation_runs_once() {
        let mut store = AccountStore::new();
        store.initialize_genesis(&["a".to_string()]).unwrap();
        store.debit("a", 400).unwrap();

        let err = store.initialize_genesis(&["a".to_string()]).unwrap_err();
        assert!(matches!(err, BlockchainError::Precondition(_)));
        assert_eq!(store.balance("a"), GENESIS_ALLOCATION - 400);
    }
}
