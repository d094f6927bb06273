//! Aegis Roles - the permission store.
//!
//! Answers "can wallet W perform action A on selector S?" by walking the
//! wallet's role memberships through a reverse index, so evaluation cost is
//! O(k) in the wallet's role count and independent of the total number of
//! roles. All mutations keep the forward role data and the reverse index
//! consistent; a rejected mutation leaves no partial effect.

#![deny(unsafe_code)]

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use aegis_types::{
    limits::MAX_ROLES, ActionBitmap, Address, EngineError, EngineResult, FunctionPermission,
    OrderedSet, RoleId, Selector, TxAction,
};

/// A named role: member wallets plus per-selector permission bitmaps.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Role {
    pub name: String,
    pub id: RoleId,
    pub wallets: OrderedSet<Address>,
    /// Selectors with a permission entry, in grant order.
    pub selector_order: OrderedSet<Selector>,
    pub permissions: HashMap<Selector, FunctionPermission>,
    /// Hard cap on member wallets.
    pub max_wallets: usize,
    /// A protected role can never be removed or lose its last wallet.
    pub protected: bool,
}

impl Role {
    pub fn wallet_count(&self) -> usize {
        self.wallets.len()
    }

    pub fn permission(&self, selector: &Selector) -> Option<&FunctionPermission> {
        self.permissions.get(selector)
    }
}

/// Role storage with a reverse wallet-to-roles index.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PermissionStore {
    roles: HashMap<RoleId, Role>,
    role_order: OrderedSet<RoleId>,
    wallet_roles: HashMap<Address, OrderedSet<RoleId>>,
}

impl PermissionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a role. The id is derived from the name, so names are unique.
    pub fn create_role(
        &mut self,
        name: &str,
        max_wallets: usize,
        protected: bool,
    ) -> EngineResult<RoleId> {
        if name.trim().is_empty() {
            return Err(EngineError::InvalidParameter("role name must not be empty".into()));
        }
        if max_wallets == 0 {
            return Err(EngineError::InvalidParameter(
                "role wallet capacity must be at least 1".into(),
            ));
        }
        if self.roles.len() >= MAX_ROLES {
            return Err(EngineError::CountLimitExceeded { what: "roles".into(), limit: MAX_ROLES });
        }
        let id = RoleId::from_name(name);
        if self.roles.contains_key(&id) {
            return Err(EngineError::ResourceAlreadyExists(format!("role {name}")));
        }

        self.roles.insert(
            id,
            Role {
                name: name.to_string(),
                id,
                wallets: OrderedSet::new(),
                selector_order: OrderedSet::new(),
                permissions: HashMap::new(),
                max_wallets,
                protected,
            },
        );
        self.role_order.insert(id);
        info!(role = name, %id, max_wallets, protected, "role created");
        Ok(id)
    }

    /// Remove a role and every reverse-index entry pointing at it.
    pub fn remove_role(&mut self, id: &RoleId) -> EngineResult<()> {
        let role = self
            .roles
            .get(id)
            .ok_or_else(|| EngineError::ResourceNotFound(format!("role {id}")))?;
        if role.protected {
            return Err(EngineError::CannotModifyProtected(format!("role {}", role.name)));
        }

        let members = role.wallets.to_vec();
        let name = role.name.clone();
        for wallet in &members {
            if let Some(memberships) = self.wallet_roles.get_mut(wallet) {
                memberships.remove(id);
                if memberships.is_empty() {
                    self.wallet_roles.remove(wallet);
                }
            }
        }
        self.roles.remove(id);
        self.role_order.remove(id);
        info!(role = name, %id, "role removed");
        Ok(())
    }

    /// Add a wallet to a role.
    pub fn assign_wallet(&mut self, id: &RoleId, wallet: Address) -> EngineResult<()> {
        if wallet.is_zero() {
            return Err(EngineError::InvalidAddress("cannot assign the zero address".into()));
        }
        let role = self
            .roles
            .get_mut(id)
            .ok_or_else(|| EngineError::ResourceNotFound(format!("role {id}")))?;
        if role.wallets.contains(&wallet) {
            return Err(EngineError::ItemAlreadyExists(format!(
                "wallet {wallet} in role {}",
                role.name
            )));
        }
        if role.wallets.len() >= role.max_wallets {
            return Err(EngineError::CountLimitExceeded {
                what: format!("wallets in role {}", role.name),
                limit: role.max_wallets,
            });
        }

        role.wallets.insert(wallet);
        self.wallet_roles.entry(wallet).or_default().insert(*id);
        info!(%wallet, role = %id, "wallet assigned");
        Ok(())
    }

    /// Remove a wallet from a role. A protected role keeps its last wallet.
    pub fn revoke_wallet(&mut self, id: &RoleId, wallet: &Address) -> EngineResult<()> {
        let role = self
            .roles
            .get_mut(id)
            .ok_or_else(|| EngineError::ResourceNotFound(format!("role {id}")))?;
        if !role.wallets.contains(wallet) {
            return Err(EngineError::ItemNotFound(format!(
                "wallet {wallet} in role {}",
                role.name
            )));
        }
        if role.protected && role.wallets.len() == 1 {
            return Err(EngineError::CannotModifyProtected(format!(
                "last wallet of protected role {}",
                role.name
            )));
        }

        role.wallets.remove(wallet);
        if let Some(memberships) = self.wallet_roles.get_mut(wallet) {
            memberships.remove(id);
            if memberships.is_empty() {
                self.wallet_roles.remove(wallet);
            }
        }
        info!(%wallet, role = %id, "wallet revoked");
        Ok(())
    }

    /// Attach a validated permission entry to a role.
    ///
    /// Structural bitmap rules are re-checked here; schema cross-validation
    /// happens in the registry before this call.
    pub fn add_permission(
        &mut self,
        id: &RoleId,
        permission: FunctionPermission,
    ) -> EngineResult<()> {
        permission.actions.validate()?;
        let role = self
            .roles
            .get_mut(id)
            .ok_or_else(|| EngineError::ResourceNotFound(format!("role {id}")))?;
        if role.permissions.contains_key(&permission.selector) {
            return Err(EngineError::ItemAlreadyExists(format!(
                "permission for {} in role {}",
                permission.selector, role.name
            )));
        }
        role.selector_order.insert(permission.selector);
        role.permissions.insert(permission.selector, permission);
        Ok(())
    }

    /// Detach a permission entry from a role.
    pub fn remove_permission(&mut self, id: &RoleId, selector: &Selector) -> EngineResult<()> {
        let role = self
            .roles
            .get_mut(id)
            .ok_or_else(|| EngineError::ResourceNotFound(format!("role {id}")))?;
        if role.permissions.remove(selector).is_none() {
            return Err(EngineError::ItemNotFound(format!(
                "permission for {selector} in role {}",
                role.name
            )));
        }
        role.selector_order.remove(selector);
        Ok(())
    }

    /// True if any of the wallet's roles grants `action` on `selector`.
    pub fn has_action_permission(
        &self,
        wallet: &Address,
        selector: &Selector,
        action: TxAction,
    ) -> bool {
        let Some(memberships) = self.wallet_roles.get(wallet) else {
            return false;
        };
        for role_id in memberships.iter() {
            if let Some(role) = self.roles.get(role_id) {
                if let Some(permission) = role.permissions.get(selector) {
                    if permission.actions.contains(action) {
                        debug!(%wallet, %selector, ?action, role = %role_id, "permission granted");
                        return true;
                    }
                }
            }
        }
        false
    }

    /// O(1) membership probe via the reverse index.
    pub fn has_any_role(&self, wallet: &Address) -> bool {
        self.wallet_roles.get(wallet).map(|set| !set.is_empty()).unwrap_or(false)
    }

    /// Role ids a wallet belongs to, in assignment order.
    pub fn wallet_roles(&self, wallet: &Address) -> Vec<RoleId> {
        self.wallet_roles.get(wallet).map(|set| set.to_vec()).unwrap_or_default()
    }

    pub fn role(&self, id: &RoleId) -> Option<&Role> {
        self.roles.get(id)
    }

    /// All roles in creation order.
    pub fn roles(&self) -> Vec<&Role> {
        self.role_order.iter().filter_map(|id| self.roles.get(id)).collect()
    }

    pub fn role_count(&self) -> usize {
        self.roles.len()
    }

    /// True if any role still carries a permission for `selector`.
    pub fn selector_in_use(&self, selector: &Selector) -> bool {
        self.roles.values().any(|role| role.permissions.contains_key(selector))
    }

    /// The granted bitmap for one role/selector pair, if any.
    pub fn permission(&self, id: &RoleId, selector: &Selector) -> Option<&FunctionPermission> {
        self.roles.get(id).and_then(|role| role.permissions.get(selector))
    }

    /// Merge the bitmaps a wallet holds for a selector across all its roles.
    pub fn effective_actions(&self, wallet: &Address, selector: &Selector) -> ActionBitmap {
        let mut merged = ActionBitmap::EMPTY;
        if let Some(memberships) = self.wallet_roles.get(wallet) {
            for role_id in memberships.iter() {
                if let Some(permission) =
                    self.roles.get(role_id).and_then(|r| r.permissions.get(selector))
                {
                    merged.0 |= permission.actions.0;
                }
            }
        }
        merged
    }
}
