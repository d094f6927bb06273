//! Function schemas and permission cross-validation.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::info;

use aegis_types::{
    limits::MAX_FUNCTIONS, EngineError, EngineResult, FunctionPermission, OperationCategory,
    OrderedSet, Selector,
};

/// Metadata for one callable function.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionSchema {
    /// Human-readable signature, e.g. `"upgrade(address)"`.
    pub signature: String,
    /// Selector derived from the signature.
    pub selector: Selector,
    /// Category shared by related operations.
    pub category: OperationCategory,
    /// Human-readable operation name the category derives from.
    pub operation_name: String,
    /// Superset of any bitmap a permission for this selector may grant.
    pub supported_actions: aegis_types::ActionBitmap,
    /// Protected schemas can never be removed.
    pub protected: bool,
    /// Execution selectors this function handles. An execution function
    /// lists itself; a handler entry point lists the execution selectors
    /// it services.
    pub handled_selectors: Vec<Selector>,
}

impl FunctionSchema {
    /// True when this selector is an execution selector (self-referencing).
    pub fn is_execution_selector(&self) -> bool {
        self.handled_selectors.contains(&self.selector)
    }
}

/// Registry of function schemas with operation-category reference counts.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaRegistry {
    schemas: HashMap<Selector, FunctionSchema>,
    selector_order: OrderedSet<Selector>,
    /// Category -> number of schemas referencing it.
    category_refs: HashMap<OperationCategory, usize>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a function schema.
    ///
    /// The declared selector must equal the keccak-derived selector of the
    /// signature; the handler-for list must be non-empty and free of zero
    /// entries; a non-self-referencing list marks a handler entry point and
    /// must name at least one other selector.
    pub fn create_schema(
        &mut self,
        signature: &str,
        declared_selector: Selector,
        operation_name: &str,
        supported_actions: aegis_types::ActionBitmap,
        protected: bool,
        handled_selectors: Vec<Selector>,
    ) -> EngineResult<&FunctionSchema> {
        if signature.trim().is_empty() {
            return Err(EngineError::InvalidParameter("function signature must not be empty".into()));
        }
        if operation_name.trim().is_empty() {
            return Err(EngineError::InvalidParameter("operation name must not be empty".into()));
        }
        let derived = Selector::from_signature(signature);
        if derived != declared_selector {
            return Err(EngineError::InvalidParameter(format!(
                "declared selector {declared_selector} does not match signature (derived {derived})"
            )));
        }
        if handled_selectors.is_empty() {
            return Err(EngineError::InvalidParameter(
                "handler-for list must not be empty".into(),
            ));
        }
        if handled_selectors.iter().any(Selector::is_zero) {
            return Err(EngineError::InvalidParameter(
                "handler-for list must not contain the zero selector".into(),
            ));
        }
        if supported_actions.is_empty() {
            return Err(EngineError::InvalidParameter(
                "supported-actions bitmap must not be empty".into(),
            ));
        }
        if self.schemas.contains_key(&declared_selector) {
            return Err(EngineError::ResourceAlreadyExists(format!(
                "function {declared_selector}"
            )));
        }
        if self.schemas.len() >= MAX_FUNCTIONS {
            return Err(EngineError::CountLimitExceeded {
                what: "functions".into(),
                limit: MAX_FUNCTIONS,
            });
        }

        let category = OperationCategory::from_operation_name(operation_name);
        let schema = FunctionSchema {
            signature: signature.to_string(),
            selector: declared_selector,
            category,
            operation_name: operation_name.to_string(),
            supported_actions,
            protected,
            handled_selectors,
        };
        *self.category_refs.entry(category).or_insert(0) += 1;
        self.selector_order.insert(declared_selector);
        self.schemas.insert(declared_selector, schema);
        info!(selector = %declared_selector, signature, operation = operation_name, "function schema registered");
        Ok(&self.schemas[&declared_selector])
    }

    /// Remove a schema.
    ///
    /// `still_referenced` is supplied by the caller (the engine consults the
    /// permission store); when true, safe removal refuses to orphan grants.
    /// The operation category is pruned once its last schema disappears.
    pub fn remove_schema(&mut self, selector: &Selector, still_referenced: bool) -> EngineResult<()> {
        let schema = self
            .schemas
            .get(selector)
            .ok_or_else(|| EngineError::ResourceNotFound(format!("function {selector}")))?;
        if schema.protected {
            return Err(EngineError::CannotModifyProtected(format!(
                "function {} ({selector})",
                schema.signature
            )));
        }
        if still_referenced {
            return Err(EngineError::ConflictingPermissions(format!(
                "function {selector} still referenced by a role"
            )));
        }

        let category = schema.category;
        let signature = schema.signature.clone();
        self.schemas.remove(selector);
        self.selector_order.remove(selector);
        if let Some(count) = self.category_refs.get_mut(&category) {
            *count -= 1;
            if *count == 0 {
                self.category_refs.remove(&category);
            }
        }
        info!(%selector, signature, "function schema removed");
        Ok(())
    }

    /// Cross-validate a permission grant against the schema it targets.
    ///
    /// Every requested action must be supported by the schema, and every
    /// handled selector named by the permission must appear in the schema's
    /// own handler graph. A self-reference is only legal when the selector
    /// is an execution selector.
    pub fn validate_permission(&self, permission: &FunctionPermission) -> EngineResult<()> {
        permission.actions.validate()?;
        let schema = self
            .schemas
            .get(&permission.selector)
            .ok_or_else(|| EngineError::ResourceNotFound(format!("function {}", permission.selector)))?;

        if !permission.actions.is_subset_of(schema.supported_actions) {
            return Err(EngineError::NoPermission(format!(
                "permission requests actions the function {} does not support",
                permission.selector
            )));
        }
        if permission.handled_selectors.is_empty() {
            return Err(EngineError::InvalidParameter(
                "permission handler-for list must not be empty".into(),
            ));
        }
        for handled in &permission.handled_selectors {
            if handled.is_zero() {
                return Err(EngineError::InvalidParameter(
                    "permission handler-for list must not contain the zero selector".into(),
                ));
            }
            if *handled == permission.selector && !schema.is_execution_selector() {
                return Err(EngineError::HandlerSelectorMismatch(format!(
                    "selector {} is a handler entry point and cannot self-reference",
                    permission.selector
                )));
            }
            if !schema.handled_selectors.contains(handled) {
                return Err(EngineError::HandlerSelectorMismatch(format!(
                    "selector {handled} is not handled by function {}",
                    permission.selector
                )));
            }
        }
        Ok(())
    }

    pub fn schema(&self, selector: &Selector) -> Option<&FunctionSchema> {
        self.schemas.get(selector)
    }

    pub fn contains(&self, selector: &Selector) -> bool {
        self.schemas.contains_key(selector)
    }

    /// All schemas in registration order.
    pub fn schemas(&self) -> Vec<&FunctionSchema> {
        self.selector_order.iter().filter_map(|s| self.schemas.get(s)).collect()
    }

    pub fn schema_count(&self) -> usize {
        self.schemas.len()
    }

    /// Categories currently referenced by at least one schema.
    pub fn categories(&self) -> Vec<OperationCategory> {
        self.category_refs.keys().copied().collect()
    }
}
