//! Per-selector allow-list of external targets, deny-by-default.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::info;

use aegis_types::{
    limits::MAX_WHITELIST_TARGETS, Address, EngineError, EngineResult, OrderedSet, Selector,
};

/// Whitelist guard for external call targets.
///
/// A registered selector starts with an empty list, which denies every
/// external target. The engine's own account is always admitted. For an
/// unregistered selector the check is skipped entirely; callers that want
/// the guard must register the selector first.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TargetWhitelist {
    targets: HashMap<Selector, OrderedSet<Address>>,
}

impl TargetWhitelist {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_target(&mut self, selector: Selector, target: Address) -> EngineResult<()> {
        if target.is_zero() {
            return Err(EngineError::InvalidAddress("cannot whitelist the zero address".into()));
        }
        let entry = self.targets.entry(selector).or_default();
        if entry.contains(&target) {
            return Err(EngineError::ItemAlreadyExists(format!(
                "target {target} for selector {selector}"
            )));
        }
        if entry.len() >= MAX_WHITELIST_TARGETS {
            return Err(EngineError::CountLimitExceeded {
                what: format!("whitelist targets for {selector}"),
                limit: MAX_WHITELIST_TARGETS,
            });
        }
        entry.insert(target);
        info!(%selector, %target, "whitelist target added");
        Ok(())
    }

    pub fn remove_target(&mut self, selector: &Selector, target: &Address) -> EngineResult<()> {
        let removed = self
            .targets
            .get_mut(selector)
            .map(|entry| entry.remove(target))
            .unwrap_or(false);
        if !removed {
            return Err(EngineError::ItemNotFound(format!(
                "target {target} for selector {selector}"
            )));
        }
        info!(%selector, %target, "whitelist target removed");
        Ok(())
    }

    /// Check a target against the whitelist.
    ///
    /// Runs at request time and again at approval time, so a target removed
    /// while a request sits pending is caught before execution.
    pub fn check(
        &self,
        selector: &Selector,
        target: &Address,
        self_address: &Address,
        selector_registered: bool,
    ) -> EngineResult<()> {
        if !selector_registered {
            // Unmanaged selectors bypass the guard entirely.
            return Ok(());
        }
        if target == self_address {
            return Ok(());
        }
        let allowed = self
            .targets
            .get(selector)
            .map(|entry| entry.contains(target))
            .unwrap_or(false);
        if allowed {
            Ok(())
        } else {
            Err(EngineError::TargetNotWhitelisted { selector: *selector, target: *target })
        }
    }

    /// Targets allowed for a selector, in insertion order.
    pub fn targets(&self, selector: &Selector) -> Vec<Address> {
        self.targets.get(selector).map(|entry| entry.to_vec()).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SELF: Address = Address([0xEE; 20]);

    fn target(byte: u8) -> Address {
        Address([byte; 20])
    }

    #[test]
    fn empty_list_denies_external_targets() {
        let whitelist = TargetWhitelist::new();
        let sel = Selector::from_signature("transfer(address,uint256)");
        let err = whitelist.check(&sel, &target(1), &SELF, true).unwrap_err();
        assert!(matches!(err, EngineError::TargetNotWhitelisted { .. }));
    }

    #[test]
    fn self_address_always_allowed() {
        let whitelist = TargetWhitelist::new();
        let sel = Selector::from_signature("transfer(address,uint256)");
        assert!(whitelist.check(&sel, &SELF, &SELF, true).is_ok());
    }

    #[test]
    fn unregistered_selector_skips_check() {
        let whitelist = TargetWhitelist::new();
        let sel = Selector::from_signature("unmanaged()");
        assert!(whitelist.check(&sel, &target(1), &SELF, false).is_ok());
    }

    #[test]
    fn add_then_remove_reinstates_denial() {
        let mut whitelist = TargetWhitelist::new();
        let sel = Selector::from_signature("call(bytes)");
        whitelist.add_target(sel, target(5)).unwrap();
        assert!(whitelist.check(&sel, &target(5), &SELF, true).is_ok());

        whitelist.remove_target(&sel, &target(5)).unwrap();
        assert!(whitelist.check(&sel, &target(5), &SELF, true).is_err());
    }

    #[test]
    fn duplicate_and_missing_entries() {
        let mut whitelist = TargetWhitelist::new();
        let sel = Selector::from_signature("call(bytes)");
        whitelist.add_target(sel, target(5)).unwrap();
        assert!(matches!(
            whitelist.add_target(sel, target(5)),
            Err(EngineError::ItemAlreadyExists(_))
        ));
        assert!(matches!(
            whitelist.remove_target(&sel, &target(6)),
            Err(EngineError::ItemNotFound(_))
        ));
    }

    #[test]
    fn zero_address_rejected() {
        let mut whitelist = TargetWhitelist::new();
        let sel = Selector::from_signature("call(bytes)");
        assert!(matches!(
            whitelist.add_target(sel, Address::ZERO),
            Err(EngineError::InvalidAddress(_))
        ));
    }
}
