use crate::error::{BlockchainError, Result};
use crate::utils::{ecdsa_p256_sha256_sign_digest, ecdsa_p256_sha256_sign_verify, sha256_digest};
use data_encoding::HEXLOWER;
use ring::rand::SystemRandom;
use ring::signature::{EcdsaKeyPair, KeyPair, ECDSA_P256_SHA256_FIXED_SIGNING};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Number of raw bytes kept from the public key hash
pub const ADDRESS_LEN: usize = 20;

/// Hex length of a fixed-size P-256 signature (r || s)
pub const SIGNATURE_HEX_LEN: usize = 128;

/// Key capability consumed by the ledger
///
/// The ledger never touches curve math; it only asks a signer for its address
/// and for a hex signature over some bytes.
pub trait Signer {
    fn address(&self) -> String;
    fn sign(&self, message: &[u8]) -> Result<String>;
}

#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Wallet {
    pkcs8: Vec<u8>,
    public_key: Vec<u8>,
}

impl Wallet {
    pub fn new() -> Result<Wallet> {
        let pkcs8 = crate::utils::new_key_pair()?;
        Self::from_pkcs8(&pkcs8)
    }

    /// Rebuild a wallet from a stored PKCS#8 document
    pub fn from_pkcs8(pkcs8: &[u8]) -> Result<Wallet> {
        let rng = SystemRandom::new();
        let key_pair = EcdsaKeyPair::from_pkcs8(&ECDSA_P256_SHA256_FIXED_SIGNING, pkcs8, &rng)
            .map_err(|e| {
                BlockchainError::Crypto(format!("Failed to create key pair from PKCS8: {e}"))
            })?;
        let public_key = key_pair.public_key().as_ref().to_vec();
        Ok(Wallet {
            pkcs8: pkcs8.to_vec(),
            public_key,
        })
    }

    pub fn get_address(&self) -> String {
        address_of(&self.public_key)
    }

    /// First eight characters of the address, for log lines
    pub fn get_address_short(&self) -> String {
        short_address(&self.get_address())
    }

    pub fn get_public_key(&self) -> &[u8] {
        self.public_key.as_slice()
    }

    pub fn get_pkcs8(&self) -> &[u8] {
        self.pkcs8.as_slice()
    }
}

impl Signer for Wallet {
    fn address(&self) -> String {
        self.get_address()
    }

    fn sign(&self, message: &[u8]) -> Result<String> {
        let signature = ecdsa_p256_sha256_sign_digest(&self.pkcs8, message)?;
        Ok(HEXLOWER.encode(&signature))
    }
}

/// Derive an address from an uncompressed SEC1 public key
///
/// The address is the hex of the first 20 bytes of SHA-256 over X || Y.
pub fn address_of(public_key: &[u8]) -> String {
    // Drop the 0x04 uncompressed-point tag
    let coordinates = match public_key.split_first() {
        Some((0x04, rest)) => rest,
        _ => public_key,
    };
    let digest = sha256_digest(coordinates);
    HEXLOWER.encode(&digest[..ADDRESS_LEN])
}

pub fn validate_address(address: &str) -> bool {
    address.len() == ADDRESS_LEN * 2
        && address
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
}

/// Check a hex signature against a public key
pub fn verify_signature(public_key: &[u8], message: &[u8], signature_hex: &str) -> bool {
    if signature_hex.len() != SIGNATURE_HEX_LEN {
        return false;
    }
    match HEXLOWER.decode(signature_hex.as_bytes()) {
        Ok(signature) => ecdsa_p256_sha256_sign_verify(public_key, &signature, message),
        Err(_) => false,
    }
}

pub fn short_address(address: &str) -> String {
    address.chars().take(8).collect()
}
