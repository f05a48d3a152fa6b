//! Stratus Core
//!
//! Core library for a cloud-infrastructure provider plugin: the typed
//! resource model, the provider contract, and the reconciliation primitives
//! that drive eventually consistent control-plane resources to a desired
//! status.

pub mod provider;
pub mod resource;
pub mod retry;
pub mod waiter;
