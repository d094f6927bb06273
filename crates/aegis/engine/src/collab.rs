//! External collaborators, injected at construction and mockable in tests.

use chrono::{DateTime, Utc};

use aegis_types::{Address, OperationCategory, Selector, TxStatus};

/// Result of invoking an external target.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallOutcome {
    pub success: bool,
    /// Returned bytes on success, failure payload otherwise.
    pub output: Vec<u8>,
}

/// Dynamic dispatch to an arbitrary external target.
///
/// The engine is agnostic to what `data` encodes. Implementations may call
/// back into the engine within the same logical turn; the status machine is
/// the defense, not this trait.
pub trait CallExecutor {
    fn invoke(&mut self, target: Address, value: u128, data: &[u8]) -> CallOutcome;
}

/// Value-transfer primitive used for payment settlement.
///
/// `token = None` moves native value; `Some(token)` moves token units. The
/// primitive is expected to be atomic: a `false` return means nothing moved.
pub trait PaymentRail {
    fn transfer(&mut self, token: Option<Address>, recipient: Address, amount: u128) -> bool;

    /// Native balance available to the engine's account.
    fn native_balance(&self) -> u128;
}

/// Best-effort notification emitted at every lifecycle edge.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OperationEvent {
    pub tx_id: u64,
    pub selector: Selector,
    pub status: TxStatus,
    pub requester: Address,
    pub target: Address,
    pub category: OperationCategory,
}

/// Notification sink. Failures are logged and swallowed by the engine;
/// they never affect transaction state.
pub trait EventSink {
    fn notify(&mut self, event: &OperationEvent) -> Result<(), String>;
}

/// Injectable clock so the time-lock is testable.
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Caller identity and gas price for one engine invocation.
#[derive(Clone, Copy, Debug)]
pub struct CallContext {
    pub caller: Address,
    pub gas_price: u128,
}
