//! Stable identifiers: wallet addresses, function selectors, and the
//! keccak-derived role / operation-category ids.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::hash::keccak256;

/// A 20-byte wallet or contract address.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Address(pub [u8; 20]);

impl Address {
    /// The all-zero address, used as the "no address" sentinel.
    pub const ZERO: Address = Address([0u8; 20]);

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }

    /// Build an address from a byte slice; `None` unless exactly 20 bytes.
    pub fn from_slice(bytes: &[u8]) -> Option<Address> {
        if bytes.len() != 20 {
            return None;
        }
        let mut out = [0u8; 20];
        out.copy_from_slice(bytes);
        Some(Address(out))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

/// A 4-byte function selector derived from a human-readable signature.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Selector(pub [u8; 4]);

impl Selector {
    /// The all-zero selector; never valid as a registered function.
    pub const ZERO: Selector = Selector([0u8; 4]);

    /// Derive the selector from a signature such as `"transfer(address,uint256)"`.
    pub fn from_signature(signature: &str) -> Selector {
        let digest = keccak256(signature.as_bytes());
        let mut out = [0u8; 4];
        out.copy_from_slice(&digest[..4]);
        Selector(out)
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 4]
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

/// A 32-byte hash value.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Hash32(pub [u8; 32]);

impl Hash32 {
    pub const ZERO: Hash32 = Hash32([0u8; 32]);

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }
}

impl fmt::Display for Hash32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

/// Stable role identifier: keccak256 of the role name.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RoleId(pub Hash32);

impl RoleId {
    pub fn from_name(name: &str) -> RoleId {
        RoleId(Hash32(keccak256(name.as_bytes())))
    }
}

impl fmt::Display for RoleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Stable operation-category identifier: keccak256 of the operation name.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OperationCategory(pub Hash32);

impl OperationCategory {
    pub fn from_operation_name(name: &str) -> OperationCategory {
        OperationCategory(Hash32(keccak256(name.as_bytes())))
    }
}

impl fmt::Display for OperationCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selector_derivation_matches_known_value() {
        // keccak256("transfer(address,uint256)")[..4] == 0xa9059cbb
        let sel = Selector::from_signature("transfer(address,uint256)");
        assert_eq!(sel.0, [0xa9, 0x05, 0x9c, 0xbb]);
    }

    #[test]
    fn zero_sentinels() {
        assert!(Address::ZERO.is_zero());
        assert!(Selector::ZERO.is_zero());
        assert!(!Selector::from_signature("f()").is_zero());
    }

    #[test]
    fn address_from_slice_rejects_wrong_length() {
        assert!(Address::from_slice(&[1u8; 19]).is_none());
        assert!(Address::from_slice(&[1u8; 21]).is_none());
        assert_eq!(Address::from_slice(&[1u8; 20]), Some(Address([1u8; 20])));
    }

    #[test]
    fn role_ids_are_stable_per_name() {
        assert_eq!(RoleId::from_name("APPROVER"), RoleId::from_name("APPROVER"));
        assert_ne!(RoleId::from_name("APPROVER"), RoleId::from_name("REQUESTER"));
    }

    #[test]
    fn display_is_hex_prefixed() {
        let addr = Address([0xab; 20]);
        assert!(addr.to_string().starts_with("0xabab"));
        let sel = Selector([0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(sel.to_string(), "0xdeadbeef");
    }
}
