//! Aegis Registry - callable-function metadata and the target whitelist.
//!
//! The schema registry records what each selector is (signature, category,
//! supported actions, handler graph) and cross-validates permission grants
//! against it. The whitelist guard keeps a deny-by-default allow-list of
//! external targets per selector.

#![deny(unsafe_code)]

pub mod schema;
pub mod whitelist;

pub use schema::{FunctionSchema, SchemaRegistry};
pub use whitelist::TargetWhitelist;
