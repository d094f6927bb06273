//! Administrative operations and all-or-nothing batches.
//!
//! Single actions validate and apply atomically by construction (every
//! component rejects before mutating). Batches get the same guarantee by
//! snapshotting the whole state aggregate and restoring it on the first
//! failing action.

use serde::{Deserialize, Serialize};
use tracing::info;

use aegis_types::{
    limits::MAX_BATCH_ACTIONS, ActionBitmap, Address, EngineError, EngineResult,
    FunctionPermission, RoleId, Selector,
};

use crate::state::EngineState;

/// One administrative action, batchable.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum AdminAction {
    CreateRole { name: String, max_wallets: usize, protected: bool },
    RemoveRole { role: RoleId },
    AssignWallet { role: RoleId, wallet: Address },
    RevokeWallet { role: RoleId, wallet: Address },
    CreateFunctionSchema {
        signature: String,
        selector: Selector,
        operation_name: String,
        supported_actions: ActionBitmap,
        protected: bool,
        handled_selectors: Vec<Selector>,
    },
    RemoveFunctionSchema { selector: Selector, safe: bool },
    AddFunctionToRole { role: RoleId, permission: FunctionPermission },
    RemoveFunctionFromRole { role: RoleId, selector: Selector },
    AddWhitelistTarget { selector: Selector, target: Address },
    RemoveWhitelistTarget { selector: Selector, target: Address },
    AddMacroSelector { selector: Selector },
}

impl EngineState {
    /// Grant a role a permission after schema cross-validation.
    pub fn add_function_to_role(
        &mut self,
        role: &RoleId,
        permission: FunctionPermission,
    ) -> EngineResult<()> {
        self.registry.validate_permission(&permission)?;
        self.roles.add_permission(role, permission)
    }

    /// Remove a schema; `safe` refuses while any role still references it.
    pub fn remove_function_schema(&mut self, selector: &Selector, safe: bool) -> EngineResult<()> {
        let still_referenced = safe && self.roles.selector_in_use(selector);
        self.registry.remove_schema(selector, still_referenced)
    }

    /// Allow a registered selector to address this account as a macro target.
    pub fn add_macro_selector(&mut self, selector: Selector) -> EngineResult<()> {
        if !self.registry.contains(&selector) {
            return Err(EngineError::ResourceNotFound(format!("function {selector}")));
        }
        if !self.macro_selectors.insert(selector) {
            return Err(EngineError::ItemAlreadyExists(format!("macro selector {selector}")));
        }
        info!(%selector, "macro selector added");
        Ok(())
    }

    /// Apply one administrative action.
    pub fn apply_admin(&mut self, action: AdminAction) -> EngineResult<()> {
        self.ensure_initialized()?;
        match action {
            AdminAction::CreateRole { name, max_wallets, protected } => {
                self.roles.create_role(&name, max_wallets, protected).map(|_| ())
            }
            AdminAction::RemoveRole { role } => self.roles.remove_role(&role),
            AdminAction::AssignWallet { role, wallet } => self.roles.assign_wallet(&role, wallet),
            AdminAction::RevokeWallet { role, wallet } => self.roles.revoke_wallet(&role, &wallet),
            AdminAction::CreateFunctionSchema {
                signature,
                selector,
                operation_name,
                supported_actions,
                protected,
                handled_selectors,
            } => self
                .registry
                .create_schema(
                    &signature,
                    selector,
                    &operation_name,
                    supported_actions,
                    protected,
                    handled_selectors,
                )
                .map(|_| ()),
            AdminAction::RemoveFunctionSchema { selector, safe } => {
                self.remove_function_schema(&selector, safe)
            }
            AdminAction::AddFunctionToRole { role, permission } => {
                self.add_function_to_role(&role, permission)
            }
            AdminAction::RemoveFunctionFromRole { role, selector } => {
                self.roles.remove_permission(&role, &selector)
            }
            AdminAction::AddWhitelistTarget { selector, target } => {
                self.whitelist.add_target(selector, target)
            }
            AdminAction::RemoveWhitelistTarget { selector, target } => {
                self.whitelist.remove_target(&selector, &target)
            }
            AdminAction::AddMacroSelector { selector } => self.add_macro_selector(selector),
        }
    }

    /// Apply a batch with full rollback on the first failure.
    pub fn execute_batch(&mut self, actions: Vec<AdminAction>) -> EngineResult<()> {
        self.ensure_initialized()?;
        if actions.len() > MAX_BATCH_ACTIONS {
            return Err(EngineError::CountLimitExceeded {
                what: "batch actions".into(),
                limit: MAX_BATCH_ACTIONS,
            });
        }
        let snapshot = self.clone();
        let total = actions.len();
        for action in actions {
            if let Err(err) = self.apply_admin(action) {
                *self = snapshot;
                return Err(err);
            }
        }
        info!(actions = total, "administrative batch applied");
        Ok(())
    }
}
