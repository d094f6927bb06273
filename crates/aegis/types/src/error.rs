//! Error taxonomy shared across all Aegis crates.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::ids::{Address, Selector};
use crate::record::TxStatus;

/// Errors raised by the secure-operation engine and its components.
///
/// Every validation error aborts the whole call with no partial state
/// change. Execution failures of the target call are not errors here: they
/// finalize the transaction as `Failed` while the entry point itself
/// succeeds.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("engine state already initialized")]
    AlreadyInitialized,

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("resource not found: {0}")]
    ResourceNotFound(String),

    #[error("resource already exists: {0}")]
    ResourceAlreadyExists(String),

    #[error("item not found: {0}")]
    ItemNotFound(String),

    #[error("item already exists: {0}")]
    ItemAlreadyExists(String),

    #[error("cannot modify protected resource: {0}")]
    CannotModifyProtected(String),

    #[error("transaction status mismatch: expected {expected:?}, found {actual:?}")]
    TransactionStatusMismatch { expected: TxStatus, actual: TxStatus },

    #[error("release time {release_time} has not been reached")]
    BeforeReleaseTime { release_time: DateTime<Utc> },

    #[error("no permission: {0}")]
    NoPermission(String),

    #[error("target {target} not whitelisted for selector {selector}")]
    TargetNotWhitelisted { selector: Selector, target: Address },

    #[error("invalid signature: {0}")]
    SignatureInvalid(String),

    #[error("invalid signature length: expected 65 bytes, found {found}")]
    SignatureLengthInvalid { found: usize },

    #[error("recovered signer {recovered} does not match declared signer {declared}")]
    SignerNotAuthorized { declared: Address, recovered: Address },

    #[error("nonce mismatch: expected {expected}, found {found}")]
    NonceMismatch { expected: u64, found: u64 },

    #[error("chain id mismatch: expected {expected}, found {found}")]
    ChainIdMismatch { expected: u64, found: u64 },

    #[error("authorization deadline {deadline} has passed")]
    DeadlineExpired { deadline: DateTime<Utc> },

    #[error("gas price {current} exceeds signed ceiling {max}")]
    GasPriceExceedsMax { max: u128, current: u128 },

    #[error("insufficient balance: required {required}, available {available}")]
    InsufficientBalance { required: u128, available: u128 },

    #[error("payment failed: {0}")]
    PaymentFailed(String),

    #[error("handler selector mismatch: {0}")]
    HandlerSelectorMismatch(String),

    #[error("conflicting permissions: {0}")]
    ConflictingPermissions(String),

    #[error("count limit exceeded for {what}: limit {limit}")]
    CountLimitExceeded { what: String, limit: usize },
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        let err = EngineError::NonceMismatch { expected: 4, found: 3 };
        assert_eq!(err.to_string(), "nonce mismatch: expected 4, found 3");

        let err = EngineError::TransactionStatusMismatch {
            expected: TxStatus::Pending,
            actual: TxStatus::Executing,
        };
        assert!(err.to_string().contains("Pending"));
        assert!(err.to_string().contains("Executing"));

        let err = EngineError::CountLimitExceeded { what: "roles".into(), limit: 64 };
        assert_eq!(err.to_string(), "count limit exceeded for roles: limit 64");
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<EngineError>();
    }
}
