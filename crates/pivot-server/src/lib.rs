//! `pivot` HTTP service (library surface).
//!
//! The `pivot` binary wires these pieces together; integration tests build the
//! same router against fixture providers.

pub mod config;
pub mod envelope;
pub mod routes;
pub mod state;

pub use pivot_core as core;

/// Bumped when the `doctor`/`version` JSON shapes change.
pub const SCHEMA_VERSION: u64 = 1;
