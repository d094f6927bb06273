//! Transaction action kinds and the 16-bit permission bitmap.

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::ids::Selector;

/// The nine action kinds a permission can grant or a function can support.
///
/// The time-delay actions drive the waiting-period flow; the sign-meta
/// actions authorize producing an off-line signature; the execute-meta
/// actions authorize submitting someone else's signature as a relayer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TxAction {
    TimeDelayRequest,
    TimeDelayApprove,
    TimeDelayCancel,
    SignMetaApprove,
    SignMetaCancel,
    SignMetaRequestAndApprove,
    ExecuteMetaApprove,
    ExecuteMetaCancel,
    ExecuteMetaRequestAndApprove,
}

impl TxAction {
    /// Bit position of this action inside an [`ActionBitmap`].
    pub fn bit(&self) -> u16 {
        match self {
            TxAction::TimeDelayRequest => 1 << 0,
            TxAction::TimeDelayApprove => 1 << 1,
            TxAction::TimeDelayCancel => 1 << 2,
            TxAction::SignMetaApprove => 1 << 3,
            TxAction::SignMetaCancel => 1 << 4,
            TxAction::SignMetaRequestAndApprove => 1 << 5,
            TxAction::ExecuteMetaApprove => 1 << 6,
            TxAction::ExecuteMetaCancel => 1 << 7,
            TxAction::ExecuteMetaRequestAndApprove => 1 << 8,
        }
    }

    /// Stable numeric discriminant used in signed-message encoding.
    pub fn kind_id(&self) -> u8 {
        match self {
            TxAction::TimeDelayRequest => 0,
            TxAction::TimeDelayApprove => 1,
            TxAction::TimeDelayCancel => 2,
            TxAction::SignMetaApprove => 3,
            TxAction::SignMetaCancel => 4,
            TxAction::SignMetaRequestAndApprove => 5,
            TxAction::ExecuteMetaApprove => 6,
            TxAction::ExecuteMetaCancel => 7,
            TxAction::ExecuteMetaRequestAndApprove => 8,
        }
    }

    /// Whether this action creates the transaction it also approves.
    pub fn is_request_and_approve(&self) -> bool {
        matches!(
            self,
            TxAction::SignMetaRequestAndApprove | TxAction::ExecuteMetaRequestAndApprove
        )
    }

    pub const ALL: [TxAction; 9] = [
        TxAction::TimeDelayRequest,
        TxAction::TimeDelayApprove,
        TxAction::TimeDelayCancel,
        TxAction::SignMetaApprove,
        TxAction::SignMetaCancel,
        TxAction::SignMetaRequestAndApprove,
        TxAction::ExecuteMetaApprove,
        TxAction::ExecuteMetaCancel,
        TxAction::ExecuteMetaRequestAndApprove,
    ];
}

/// Bits covering all sign-meta actions.
pub const SIGN_META_MASK: u16 = (1 << 3) | (1 << 4) | (1 << 5);

/// Bits covering all execute-meta actions.
pub const EXECUTE_META_MASK: u16 = (1 << 6) | (1 << 7) | (1 << 8);

/// Fixed-width bitmap of granted or supported actions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActionBitmap(pub u16);

impl ActionBitmap {
    pub const EMPTY: ActionBitmap = ActionBitmap(0);

    pub fn from_actions(actions: &[TxAction]) -> ActionBitmap {
        let mut bits = 0u16;
        for action in actions {
            bits |= action.bit();
        }
        ActionBitmap(bits)
    }

    pub fn contains(&self, action: TxAction) -> bool {
        self.0 & action.bit() != 0
    }

    pub fn insert(&mut self, action: TxAction) {
        self.0 |= action.bit();
    }

    pub fn remove(&mut self, action: TxAction) {
        self.0 &= !action.bit();
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// True when every bit set here is also set in `other`.
    pub fn is_subset_of(&self, other: ActionBitmap) -> bool {
        self.0 & !other.0 == 0
    }

    pub fn has_sign_meta(&self) -> bool {
        self.0 & SIGN_META_MASK != 0
    }

    pub fn has_execute_meta(&self) -> bool {
        self.0 & EXECUTE_META_MASK != 0
    }

    /// Structural validation shared by permission grants.
    ///
    /// An all-zero bitmap grants nothing and is rejected outright. A single
    /// permission holding both sign-meta and execute-meta bits would let one
    /// wallet sign an authorization and then relay it itself, so that
    /// combination is rejected as conflicting.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.is_empty() {
            return Err(EngineError::InvalidParameter(
                "action bitmap must grant at least one action".into(),
            ));
        }
        if self.has_sign_meta() && self.has_execute_meta() {
            return Err(EngineError::ConflictingPermissions(
                "sign-meta and execute-meta actions cannot coexist in one permission".into(),
            ));
        }
        Ok(())
    }
}

/// A permission entry granted to a role for one selector.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionPermission {
    /// Selector the permission is granted for.
    pub selector: Selector,
    /// Actions the holder may perform through this selector.
    pub actions: ActionBitmap,
    /// Execution selectors this permission covers when `selector` is a
    /// handler entry point.
    pub handled_selectors: Vec<Selector>,
}
