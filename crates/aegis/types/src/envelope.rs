//! Meta-transaction envelope: a transaction record plus the signed
//! authorization context a relayer submits on the signer's behalf.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::action::TxAction;
use crate::ids::{Address, Hash32, Selector};
use crate::record::TxRecord;

/// Authorization context bound into the signed message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaTxParams {
    /// Chain the authorization is valid on.
    pub chain_id: u64,
    /// Per-signer replay counter.
    pub nonce: u64,
    /// Account hosting the handler entry point.
    pub handler_contract: Address,
    /// Selector of the entry point the relayer must use.
    pub handler_selector: Selector,
    /// Action the signature authorizes.
    pub action: TxAction,
    /// Instant after which the authorization is void.
    pub deadline: DateTime<Utc>,
    /// Highest gas price the signer will underwrite; 0 disables the ceiling.
    pub max_gas_price: u128,
    /// Declared signing identity, checked against recovery.
    pub signer: Address,
}

/// A complete signed authorization ready for relay.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaTxEnvelope {
    /// The wrapped transaction record (existing, or proposed for
    /// request-and-approve actions).
    pub record: TxRecord,
    pub params: MetaTxParams,
    /// Domain-separated message hash the signature covers.
    pub message_hash: Hash32,
    /// 65-byte (r, s, v) signature.
    pub signature: Vec<u8>,
    /// Pre-encoded call data mirrored from the record.
    pub data: Vec<u8>,
}
