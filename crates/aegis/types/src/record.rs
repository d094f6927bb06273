//! Transaction records and the one-directional status machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{Address, Hash32, OperationCategory, Selector};

/// Lifecycle status of a requested operation.
///
/// Legal transitions form two chains and nothing else:
/// `Pending -> Executing -> ProcessingPayment -> Completed`,
/// `Pending -> Executing -> Failed` (also from `ProcessingPayment`),
/// `Pending -> Cancelled`. No state is ever revisited.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TxStatus {
    Pending,
    Executing,
    ProcessingPayment,
    Completed,
    Failed,
    Cancelled,
}

impl TxStatus {
    /// Stable numeric discriminant used in signed-message encoding.
    pub fn kind_id(&self) -> u8 {
        match self {
            TxStatus::Pending => 1,
            TxStatus::Executing => 2,
            TxStatus::ProcessingPayment => 3,
            TxStatus::Completed => 4,
            TxStatus::Failed => 5,
            TxStatus::Cancelled => 6,
        }
    }

    /// Whether `next` is a legal direct successor of `self`.
    pub fn can_transition_to(&self, next: TxStatus) -> bool {
        matches!(
            (self, next),
            (TxStatus::Pending, TxStatus::Executing)
                | (TxStatus::Pending, TxStatus::Cancelled)
                | (TxStatus::Executing, TxStatus::ProcessingPayment)
                | (TxStatus::Executing, TxStatus::Completed)
                | (TxStatus::Executing, TxStatus::Failed)
                | (TxStatus::ProcessingPayment, TxStatus::Completed)
                | (TxStatus::ProcessingPayment, TxStatus::Failed)
        )
    }
}

/// Immutable call parameters captured at request time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxParams {
    /// Wallet that requested the operation.
    pub requester: Address,
    /// External target the call addresses.
    pub target: Address,
    /// Native value forwarded with the call.
    pub value: u128,
    /// Gas budget reserved for the call.
    pub gas_budget: u64,
    /// Operation category of the execution function.
    pub category: OperationCategory,
    /// Selector of the operation actually invoked on the target.
    pub execution_selector: Selector,
    /// Pre-encoded call data.
    pub call_data: Vec<u8>,
}

/// Payment settled after a successful execution.
///
/// All-zero fields mean "no payment attached".
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentDetails {
    pub recipient: Address,
    pub native_amount: u128,
    pub token: Address,
    pub token_amount: u128,
}

impl PaymentDetails {
    pub fn is_none(&self) -> bool {
        self.recipient.is_zero()
            && self.native_amount == 0
            && self.token.is_zero()
            && self.token_amount == 0
    }
}

/// A requested operation: immutable once created except for `status`,
/// `result`, and the pending-index membership tracked by the ledger.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxRecord {
    /// Monotonically increasing, 1-based identifier.
    pub id: u64,
    /// Earliest instant at which a time-delay approval may execute.
    pub release_time: DateTime<Utc>,
    pub status: TxStatus,
    pub params: TxParams,
    /// Opaque authorization message hash, set for meta-transaction flows.
    pub message_hash: Hash32,
    /// Raw result bytes of the executed call, or the failure payload.
    pub result: Vec<u8>,
    pub payment: PaymentDetails,
}
