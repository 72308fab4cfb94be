#![forbid(unsafe_code)]
//! ufsview public API facade.
//!
//! Re-exports the traversal engine from `ufsview-core` through a stable
//! external interface. This is the crate downstream consumers (CLI, tools)
//! depend on.

pub use ufsview_core::*;
