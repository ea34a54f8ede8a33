// Transactions are the only way value or data enters the ledger.
// Every transaction is self-certifying: its id is the SHA-256 of its content,
// so any change to the payload after signing is detectable.

use crate::error::{BlockchainError, Result};
use crate::utils::{current_nanos, current_timestamp, sha256_hex};
use crate::wallet::{Signer, SIGNATURE_HEX_LEN};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Sender used for protocol-issued block and staking rewards
pub const NETWORK_SENDER: &str = "network";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionType {
    Data,
    Fee,
    Reward,
    Stake,
    Transfer,
}

impl TransactionType {
    /// Protocol-constructed records carry no wallet signature
    pub fn is_synthetic(&self) -> bool {
        matches!(self, TransactionType::Fee | TransactionType::Reward)
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransactionType::Data => "DATA",
            TransactionType::Fee => "FEE",
            TransactionType::Reward => "REWARD",
            TransactionType::Stake => "STAKE",
            TransactionType::Transfer => "TRANSFER",
        };
        write!(f, "{name}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    id: String,
    #[serde(rename = "type")]
    tx_type: TransactionType,
    data: String,
    sender: String,
    receiver: String,
    amount: u64,
    fee: u64,
    signature: String,
    timestamp: i64,
    nonce: u64,
}

impl Transaction {
    /// Build an unsigned transaction with its id already derived
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        tx_type: TransactionType,
        data: &str,
        sender: &str,
        receiver: &str,
        amount: u64,
        fee: u64,
        timestamp: i64,
        nonce: u64,
    ) -> Transaction {
        let mut tx = Transaction {
            id: String::new(),
            tx_type,
            data: data.to_string(),
            sender: sender.to_string(),
            receiver: receiver.to_string(),
            amount,
            fee,
            signature: String::new(),
            timestamp,
            nonce,
        };
        tx.id = tx.calculate_id();
        tx
    }

    /// A signed data record paying only a fee
    pub fn new_data(data: &str, fee: u64, signer: &dyn Signer) -> Result<Transaction> {
        Self::new_signed(TransactionType::Data, data, "", 0, fee, signer)
    }

    /// A signed value transfer
    pub fn new_transfer(
        receiver: &str,
        amount: u64,
        fee: u64,
        signer: &dyn Signer,
    ) -> Result<Transaction> {
        Self::new_signed(TransactionType::Transfer, "", receiver, amount, fee, signer)
    }

    /// A signed stake deposit; the sender locks `amount` on its own address
    pub fn new_stake(amount: u64, fee: u64, signer: &dyn Signer) -> Result<Transaction> {
        let staker = signer.address();
        Self::new_signed(TransactionType::Stake, "", &staker, amount, fee, signer)
    }

    fn new_signed(
        tx_type: TransactionType,
        data: &str,
        receiver: &str,
        amount: u64,
        fee: u64,
        signer: &dyn Signer,
    ) -> Result<Transaction> {
        let mut tx = Transaction::new(
            tx_type,
            data,
            &signer.address(),
            receiver,
            amount,
            fee,
            current_timestamp()?,
            current_nanos()?,
        );
        tx.signature = signer
            .sign(tx.id.as_bytes())
            .map_err(|e| BlockchainError::Crypto(format!("Failed to sign transaction: {e}")))?;
        Ok(tx)
    }

    /// A protocol reward paid by the network sentinel
    pub fn new_reward(receiver: &str, amount: u64) -> Result<Transaction> {
        Ok(Transaction::new(
            TransactionType::Reward,
            "",
            NETWORK_SENDER,
            receiver,
            amount,
            0,
            current_timestamp()?,
            current_nanos()?,
        ))
    }

    /// The content the id commits to
    pub fn id_preimage(&self) -> String {
        format!(
            "{}{}{}{}{}{}{}",
            self.data, self.sender, self.receiver, self.amount, self.fee, self.timestamp, self.nonce
        )
    }

    pub fn calculate_id(&self) -> String {
        sha256_hex(self.id_preimage().as_bytes())
    }

    /// Opaque signature format check: 128 hex characters
    pub fn verify_signature(&self) -> bool {
        self.signature.len() == SIGNATURE_HEX_LEN
            && self.signature.chars().all(|c| c.is_ascii_hexdigit())
    }

    /// Bytes folded into the hash of the enclosing block
    pub fn block_material(&self) -> String {
        format!(
            "{}{}{}{}",
            self.id,
            self.tx_type,
            self.id_preimage(),
            self.signature
        )
    }

    pub fn get_id(&self) -> &str {
        self.id.as_str()
    }

    pub fn get_type(&self) -> TransactionType {
        self.tx_type
    }

    pub fn get_data(&self) -> &str {
        self.data.as_str()
    }

    pub fn get_sender(&self) -> &str {
        self.sender.as_str()
    }

    pub fn get_receiver(&self) -> &str {
        self.receiver.as_str()
    }

    pub fn get_amount(&self) -> u64 {
        self.amount
    }

    pub fn get_fee(&self) -> u64 {
        self.fee
    }

    pub fn get_signature(&self) -> &str {
        self.signature.as_str()
    }

    pub fn get_timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn get_nonce(&self) -> u64 {
        self.nonce
    }

    pub fn is_reward(&self) -> bool {
        self.tx_type == TransactionType::Reward
    }

    /// Replace the payload without re-deriving the id
    #[cfg(test)]
    pub fn tamper_data(&mut self, data: &str) {
        self.data = data.to_string();
    }
}
