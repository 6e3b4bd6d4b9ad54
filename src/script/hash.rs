//! Content hashes
//!
//! Scripts are identified by Hash160 (RIPEMD-160 over SHA-256), a 20-byte
//! digest of their bytes.

use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

pub type ScriptHash = [u8; 20];

pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

/// Double SHA-256
pub fn hash256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(Sha256::digest(data)).into()
}

/// RIPEMD-160 of SHA-256
pub fn hash160(data: &[u8]) -> ScriptHash {
    Ripemd160::digest(Sha256::digest(data)).into()
}
