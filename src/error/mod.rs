//! Error handling for the ledger
//!
//! Every fallible operation in the crate returns [`BlockchainError`]. The
//! variants are grouped into the four failure classes the node cares about
//! (see [`ErrorKind`]) plus failures reported by external collaborators such as
//! the snapshot database or the network.

use std::fmt;

/// Result type alias for ledger operations
pub type Result<T> = std::result::Result<T, BlockchainError>;

/// Failure classes a caller reacts to differently
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed block or transaction; drop it and carry on
    ValidationRejection,
    /// Nothing to mine, nonce space exhausted or search cancelled; retry later
    MiningFailure,
    /// Balance, fee or stake rule violated; report to the originator
    EconomicRejection,
    /// Broken invariant or malformed snapshot; fail the operation loudly
    PreconditionFault,
    /// Storage, network, serialization or crypto collaborator failed
    External,
}

/// Error types for ledger, consensus and economy operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockchainError {
    /// Block or transaction rejected by the chain validator
    Validation(String),
    /// Generic mining failure
    Mining(String),
    /// Pending pool is empty
    NothingToMine,
    /// No nonce below the ceiling satisfied the target
    NonceExhausted { difficulty: u32, attempts: i64 },
    /// The nonce search was interrupted by a stop request or a newer block
    MiningCancelled,
    /// Sender cannot cover amount plus fee
    InsufficientFunds { required: u64, available: u64 },
    /// Fee outside the accepted range
    InvalidFee { fee: u64, min: u64, max: u64 },
    /// Crediting would overflow the receiver balance
    BalanceOverflow { address: String, balance: u64, amount: u64 },
    /// Stake below the registry minimum
    StakeTooLow { amount: u64, minimum: u64 },
    /// Debit from an address that has no account
    AccountNotFound(String),
    /// Transaction structurally unfit for processing
    Transaction(String),
    /// Invariant violated or impossible state requested
    Precondition(String),
    /// Database-related errors
    Database(String),
    /// Serialization/deserialization errors
    Serialization(String),
    /// File I/O errors
    Io(String),
    /// Network communication errors
    Network(String),
    /// Cryptographic operation errors
    Crypto(String),
}

impl BlockchainError {
    /// Failure class this error belongs to
    pub fn kind(&self) -> ErrorKind {
        match self {
            BlockchainError::Validation(_) => ErrorKind::ValidationRejection,
            BlockchainError::Mining(_)
            | BlockchainError::NothingToMine
            | BlockchainError::NonceExhausted { .. }
            | BlockchainError::MiningCancelled => ErrorKind::MiningFailure,
            BlockchainError::InsufficientFunds { .. }
            | BlockchainError::InvalidFee { .. }
            | BlockchainError::BalanceOverflow { .. }
            | BlockchainError::StakeTooLow { .. }
            | BlockchainError::AccountNotFound(_)
            | BlockchainError::Transaction(_) => ErrorKind::EconomicRejection,
            BlockchainError::Precondition(_) => ErrorKind::PreconditionFault,
            BlockchainError::Database(_)
            | BlockchainError::Serialization(_)
            | BlockchainError::Io(_)
            | BlockchainError::Network(_)
            | BlockchainError::Crypto(_) => ErrorKind::External,
        }
    }

    /// Mining failures may simply be retried later
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::MiningFailure
    }
}

impl fmt::Display for BlockchainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockchainError::Validation(msg) => write!(f, "Validation rejected: {msg}"),
            BlockchainError::Mining(msg) => write!(f, "Mining error: {msg}"),
            BlockchainError::NothingToMine => write!(f, "Mining error: nothing to mine"),
            BlockchainError::NonceExhausted {
                difficulty,
                attempts,
            } => write!(
                f,
                "Mining error: no valid nonce in {attempts} attempts at difficulty {difficulty}"
            ),
            BlockchainError::MiningCancelled => write!(f, "Mining error: search cancelled"),
            BlockchainError::InsufficientFunds {
                required,
                available,
            } => {
                write!(
                    f,
                    "Insufficient funds: required {required}, available {available}"
                )
            }
            BlockchainError::InvalidFee { fee, min, max } => {
                write!(f, "Invalid transaction fee: {fee} (must be {min}-{max})")
            }
            BlockchainError::BalanceOverflow {
                address,
                balance,
                amount,
            } => write!(
                f,
                "Balance overflow: cannot add {amount} to balance {balance} of {address}"
            ),
            BlockchainError::StakeTooLow { amount, minimum } => {
                write!(f, "Stake too low: {amount} (minimum {minimum})")
            }
            BlockchainError::AccountNotFound(addr) => write!(f, "Account not found: {addr}"),
            BlockchainError::Transaction(msg) => write!(f, "Transaction error: {msg}"),
            BlockchainError::Precondition(msg) => write!(f, "Precondition violated: {msg}"),
            BlockchainError::Database(msg) => write!(f, "Database error: {msg}"),
            BlockchainError::Serialization(msg) => write!(f, "Serialization error: {msg}"),
            BlockchainError::Io(msg) => write!(f, "I/O error: {msg}"),
            BlockchainError::Network(msg) => write!(f, "Network error: {msg}"),
            BlockchainError::Crypto(msg) => write!(f, "Cryptographic error: {msg}"),
        }
    }
}

impl std::error::Error for BlockchainError {}

impl From<std::io::Error> for BlockchainError {
    fn from(err: std::io::Error) -> Self {
        BlockchainError::Io(err.to_string())
    }
}

impl From<sled::Error> for BlockchainError {
    fn from(err: sled::Error) -> Self {
        BlockchainError::Database(err.to_string())
    }
}

impl From<serde_json::Error> for BlockchainError {
    fn from(err: serde_json::Error) -> Self {
        BlockchainError::Serialization(err.to_string())
    }
}
