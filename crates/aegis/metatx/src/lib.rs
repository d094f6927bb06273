//! Aegis MetaTx - the signed-authorization protocol.
//!
//! A meta-transaction lets a signer authorize an operation off-line and a
//! separate relayer submit it. The encoding here must stay bit-exact across
//! implementations: external signers compute the same domain separator and
//! struct hash to produce interoperable signatures.

#![deny(unsafe_code)]

pub mod encode;
pub mod verify;

pub use encode::{domain_separator, envelope_message_hash, struct_hash, DomainContext};
pub use verify::{recover_signer, verify_envelope};

/// Protocol name bound into every domain separator.
pub const PROTOCOL_NAME: &str = "AegisSecureOperation";

/// Semantic protocol version bound into every domain separator.
pub const PROTOCOL_VERSION: &str = "1";
