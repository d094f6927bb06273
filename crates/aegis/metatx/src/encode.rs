//! Structured message encoding: domain separator and struct hash.
//!
//! Fields are encoded as 32-byte words in a fixed order; dynamic byte
//! strings are keccak-hashed before inclusion. The final message is
//! `keccak256(0x19 0x01 || domain_separator || struct_hash)`.

use chrono::{DateTime, Utc};

use aegis_types::{keccak256, Address, Hash32, MetaTxParams, Selector, TxRecord};

/// Identity of the verifying account a signature is bound to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DomainContext {
    pub protocol_name: String,
    pub protocol_version: String,
    pub chain_id: u64,
    pub account: Address,
}

/// Canonical type string of the domain separator.
const DOMAIN_TYPE: &[u8] =
    b"EIP712Domain(string name,string version,uint256 chainId,address verifyingContract)";

/// Canonical type string of the signed operation struct. Field order here
/// is the wire format; changing it breaks interoperability.
const OPERATION_TYPE: &[u8] = b"SecureOperation(\
uint256 txId,uint256 releaseTime,uint8 status,\
address requester,address target,uint256 value,uint256 gasBudget,\
bytes32 category,bytes4 executionSelector,bytes32 callDataHash,\
address paymentRecipient,uint256 paymentNative,address paymentToken,uint256 paymentTokenAmount,\
uint256 chainId,uint256 nonce,address handlerContract,bytes4 handlerSelector,\
uint8 action,uint256 deadline,uint256 maxGasPrice,address signer)";

fn word_u128(value: u128) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[16..].copy_from_slice(&value.to_be_bytes());
    word
}

fn word_u64(value: u64) -> [u8; 32] {
    word_u128(value as u128)
}

fn word_u8(value: u8) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[31] = value;
    word
}

fn word_address(address: &Address) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[12..].copy_from_slice(&address.0);
    word
}

fn word_selector(selector: &Selector) -> [u8; 32] {
    // bytes4 values are right-padded.
    let mut word = [0u8; 32];
    word[..4].copy_from_slice(&selector.0);
    word
}

fn word_timestamp(instant: &DateTime<Utc>) -> [u8; 32] {
    word_u64(instant.timestamp().max(0) as u64)
}

/// Domain separator over protocol name, semantic version, chain id, and
/// the verifying account.
pub fn domain_separator(ctx: &DomainContext) -> Hash32 {
    let mut buf = Vec::with_capacity(5 * 32);
    buf.extend_from_slice(&keccak256(DOMAIN_TYPE));
    buf.extend_from_slice(&keccak256(ctx.protocol_name.as_bytes()));
    buf.extend_from_slice(&keccak256(ctx.protocol_version.as_bytes()));
    buf.extend_from_slice(&word_u64(ctx.chain_id));
    buf.extend_from_slice(&word_address(&ctx.account));
    Hash32(keccak256(&buf))
}

/// Struct hash over the full transaction record plus the envelope fields.
pub fn struct_hash(record: &TxRecord, params: &MetaTxParams) -> Hash32 {
    let mut buf = Vec::with_capacity(23 * 32);
    buf.extend_from_slice(&keccak256(OPERATION_TYPE));
    buf.extend_from_slice(&word_u64(record.id));
    buf.extend_from_slice(&word_timestamp(&record.release_time));
    buf.extend_from_slice(&word_u8(record.status.kind_id()));
    buf.extend_from_slice(&word_address(&record.params.requester));
    buf.extend_from_slice(&word_address(&record.params.target));
    buf.extend_from_slice(&word_u128(record.params.value));
    buf.extend_from_slice(&word_u64(record.params.gas_budget));
    buf.extend_from_slice(&record.params.category.0 .0);
    buf.extend_from_slice(&word_selector(&record.params.execution_selector));
    buf.extend_from_slice(&keccak256(&record.params.call_data));
    buf.extend_from_slice(&word_address(&record.payment.recipient));
    buf.extend_from_slice(&word_u128(record.payment.native_amount));
    buf.extend_from_slice(&word_address(&record.payment.token));
    buf.extend_from_slice(&word_u128(record.payment.token_amount));
    buf.extend_from_slice(&word_u64(params.chain_id));
    buf.extend_from_slice(&word_u64(params.nonce));
    buf.extend_from_slice(&word_address(&params.handler_contract));
    buf.extend_from_slice(&word_selector(&params.handler_selector));
    buf.extend_from_slice(&word_u8(params.action.kind_id()));
    buf.extend_from_slice(&word_timestamp(&params.deadline));
    buf.extend_from_slice(&word_u128(params.max_gas_price));
    buf.extend_from_slice(&word_address(&params.signer));
    Hash32(keccak256(&buf))
}

/// The message hash a signer commits to.
pub fn envelope_message_hash(
    record: &TxRecord,
    params: &MetaTxParams,
    ctx: &DomainContext,
) -> Hash32 {
    let domain = domain_separator(ctx);
    let structure = struct_hash(record, params);
    let mut buf = Vec::with_capacity(2 + 64);
    buf.extend_from_slice(&[0x19, 0x01]);
    buf.extend_from_slice(&domain.0);
    buf.extend_from_slice(&structure.0);
    Hash32(keccak256(&buf))
}
