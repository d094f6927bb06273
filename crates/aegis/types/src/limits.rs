//! Structural limits enforced by the engine.

/// Maximum number of roles a single engine state may hold.
pub const MAX_ROLES: usize = 64;

/// Maximum number of registered function schemas.
pub const MAX_FUNCTIONS: usize = 256;

/// Maximum whitelisted targets per selector.
pub const MAX_WHITELIST_TARGETS: usize = 128;

/// Maximum actions in one administrative batch.
pub const MAX_BATCH_ACTIONS: usize = 32;

/// Shortest accepted time-lock period.
pub const MIN_TIMELOCK_SECS: i64 = 60;

/// Longest accepted time-lock period (90 days).
pub const MAX_TIMELOCK_SECS: i64 = 90 * 24 * 3600;
