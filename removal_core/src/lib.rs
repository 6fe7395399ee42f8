//! # Removal Core
//!
//! Decides whether a placed piece may be removed, destroys it through the
//! one pathway its capabilities call for, and computes the refund without
//! double counting anything its side effects already dropped.
//!
//! ## Core Components
//!
//! - **authorizer**: target, zone, permission and tool checks
//! - **dispatcher**: capability match and destruction pathways
//! - **reconciler**: deduplicated, zero-clamped refunds
//! - **gateway**: contract with the host's object replication
//! - **service**: `handle_removal_request`, the single entry point
//!
//! ## Concurrency
//!
//! Requests run synchronously on the caller's thread. The engine holds no
//! locks; the piece's destroyed flag is the single commit point, and every
//! side effect is followed by a fresh validity check through the gateway.

pub mod authorizer;
pub mod config;
pub mod dispatcher;
pub mod effects;
pub mod error;
pub mod gateway;
pub mod reconciler;
pub mod service;

pub use authorizer::*;
pub use config::*;
pub use dispatcher::*;
pub use effects::*;
pub use error::*;
pub use gateway::*;
pub use reconciler::*;
pub use service::*;
