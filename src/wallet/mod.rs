//! Key capability
//!
//! ECDSA P-256 wallets, address derivation and the [`Signer`] trait through
//! which the ledger obtains transaction signatures.

#[allow(clippy::module_inception)]
pub mod wallet;
pub mod wallets;

pub use wallet::{
    address_of, short_address, validate_address, verify_signature, Signer, Wallet, ADDRESS_LEN,
    SIGNATURE_HEX_LEN,
};
pub use wallets::Wallets;
