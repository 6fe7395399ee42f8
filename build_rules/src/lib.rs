//! # Build Rules
//!
//! The data model for placed pieces: identities, recipes, capability
//! components, and the prefab catalog that holds canonical recipes.
//! This crate holds no removal logic; `removal_core` builds on it.

pub mod catalog;
pub mod pieces;
pub mod recipes;

pub use catalog::*;
pub use pieces::*;
pub use recipes::*;
