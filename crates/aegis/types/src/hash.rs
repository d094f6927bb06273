//! Keccak-256 hashing shared by identifier derivation and message encoding.

use sha3::{Digest, Keccak256};

/// Hash arbitrary bytes with Keccak-256.
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    let digest = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}
