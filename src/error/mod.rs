//! Error types
//!
//! Defines domain-specific error types for each boundary of the engine.

pub mod types;

pub use types::{CommandError, DriverError, TransferError};
