//! Intermediate Representation (IR) consumed by the mandatory optimizer.
//!
//! This module defines a small SSA-form IR for whole modules, together with
//! the analyses every pass needs: operand traversal, a def-use index, access
//! paths and a verifier.

mod types;
pub use types::*;

mod builder;
pub use builder::FunctionBuilder;

mod printer;
pub mod projection;
pub mod uses;
pub mod utils;
pub mod verify;

pub use projection::{AccessBase, AccessPath, ProjectionPath, ProjectionStep};
pub use uses::{DefUse, Use, UseSite};
