//! fleetstats core - pure domain logic with no I/O dependencies
//!
//! This crate holds the domain types, the per-repository state machine, the
//! in-memory cache model, typed errors and the ports (interfaces) that the
//! discovery and processing services depend on. Git access, filesystem
//! persistence and rendering live in adapters in the main crate.

pub mod domain;
pub mod error;
pub mod ports;

// Re-exports for ergonomics
pub use domain::*;
pub use error::*;
