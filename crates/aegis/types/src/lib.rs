//! Aegis Types - shared vocabulary of the secure-operation engine.
//!
//! Every other Aegis crate builds on the identifiers, action bitmaps,
//! transaction records, and the error taxonomy defined here. Keeping them in
//! one leaf crate gives the whole workspace a single source of truth for the
//! wire-level shapes that must stay bit-exact across implementations.

#![deny(unsafe_code)]

pub mod action;
pub mod envelope;
pub mod error;
pub mod hash;
pub mod ids;
pub mod limits;
pub mod ordered;
pub mod record;

pub use action::{ActionBitmap, FunctionPermission, TxAction};
pub use envelope::{MetaTxEnvelope, MetaTxParams};
pub use error::{EngineError, EngineResult};
pub use hash::keccak256;
pub use ids::{Address, Hash32, OperationCategory, RoleId, Selector};
pub use ordered::OrderedSet;
pub use record::{PaymentDetails, TxParams, TxRecord, TxStatus};
