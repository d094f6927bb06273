//! The per-account state aggregate.
//!
//! One `EngineState` owns everything a guarded account needs: roles,
//! schemas, whitelist, ledger, nonces, and configuration. It is passed by
//! handle into every operation; there is no ambient singleton. `Clone`
//! doubles as the snapshot mechanism for all-or-nothing batches.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use aegis_types::{
    limits::{MAX_TIMELOCK_SECS, MIN_TIMELOCK_SECS},
    Address, EngineError, EngineResult, OrderedSet, Selector,
};

use aegis_ledger::TransactionLedger;
use aegis_registry::{SchemaRegistry, TargetWhitelist};
use aegis_roles::PermissionStore;

/// Initialization parameters for a guarded account.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// The guarded account's own address.
    pub self_address: Address,
    /// Chain the account lives on; bound into every signed authorization.
    pub chain_id: u64,
    /// Mandatory delay between request and time-delay approval.
    pub timelock_secs: i64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineState {
    initialized: bool,
    pub self_address: Address,
    pub chain_id: u64,
    pub timelock_secs: i64,
    pub roles: PermissionStore,
    pub registry: SchemaRegistry,
    pub whitelist: TargetWhitelist,
    pub ledger: TransactionLedger,
    /// Per-signer meta-transaction replay counters.
    pub nonces: HashMap<Address, u64>,
    /// Selectors allowed to address this account as a macro target.
    pub macro_selectors: OrderedSet<Selector>,
}

impl EngineState {
    pub fn new() -> Self {
        Self::default()
    }

    /// One-shot initialization; a second call is rejected.
    pub fn initialize(&mut self, config: EngineConfig) -> EngineResult<()> {
        if self.initialized {
            return Err(EngineError::AlreadyInitialized);
        }
        if config.self_address.is_zero() {
            return Err(EngineError::InvalidAddress("self address must not be zero".into()));
        }
        if !(MIN_TIMELOCK_SECS..=MAX_TIMELOCK_SECS).contains(&config.timelock_secs) {
            return Err(EngineError::InvalidParameter(format!(
                "time-lock period must be between {MIN_TIMELOCK_SECS} and {MAX_TIMELOCK_SECS} seconds"
            )));
        }
        self.self_address = config.self_address;
        self.chain_id = config.chain_id;
        self.timelock_secs = config.timelock_secs;
        self.initialized = true;
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn ensure_initialized(&self) -> EngineResult<()> {
        if !self.initialized {
            return Err(EngineError::InvalidParameter("engine state not initialized".into()));
        }
        Ok(())
    }

    /// Current nonce for a signer; starts at 0.
    pub fn nonce(&self, signer: &Address) -> u64 {
        self.nonces.get(signer).copied().unwrap_or(0)
    }

    /// Advance a signer's nonce by exactly one.
    pub fn bump_nonce(&mut self, signer: &Address) {
        *self.nonces.entry(*signer).or_insert(0) += 1;
    }
}
