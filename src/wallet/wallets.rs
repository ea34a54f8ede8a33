use crate::error::{BlockchainError, Result};
use crate::wallet::Wallet;
use data_encoding::HEXLOWER;
use std::collections::HashMap;

/// Keyring of locally held wallets, keyed by address
#[derive(Default)]
pub struct Wallets {
    wallets: HashMap<String, Wallet>,
}

impl Wallets {
    pub fn new() -> Wallets {
        Wallets {
            wallets: HashMap::new(),
        }
    }

    pub fn create_wallet(&mut self) -> Result<String> {
        let wallet = Wallet::new()?;
        let address = wallet.get_address();
        self.wallets.insert(address.clone(), wallet);
        Ok(address)
    }

    pub fn get_addresses(&self) -> Vec<String> {
        let mut addresses: Vec<String> = self.wallets.keys().cloned().collect();
        addresses.sort();
        addresses
    }

    pub fn get_wallet(&self, address: &str) -> Option<&Wallet> {
        self.wallets.get(address)
    }

    pub fn len(&self) -> usize {
        self.wallets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wallets.is_empty()
    }

    /// PKCS#8 documents as hex, the persisted form of the keyring
    pub fn to_records(&self) -> Vec<String> {
        self.get_addresses()
            .iter()
            .filter_map(|address| self.wallets.get(address))
            .map(|wallet| HEXLOWER.encode(wallet.get_pkcs8()))
            .collect()
    }

    pub fn from_records(records: &[String]) -> Result<Wallets> {
        let mut wallets = HashMap::new();
        for record in records {
            let pkcs8 = HEXLOWER.decode(record.as_bytes()).map_err(|e| {
                BlockchainError::Serialization(format!("Invalid wallet record: {e}"))
            })?;
            let wallet = Wallet::from_pkcs8(&pkcs8)?;
            wallets.insert(wallet.get_address(), wallet);
        }
        Ok(Wallets { wallets })
    }
}
