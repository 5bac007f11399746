//! Error types
//!
//! Every client-facing failure ends up as a numeric FTP status line; these
//! types carry the failures between the driver, the transfer machinery, and
//! the dispatch boundary that maps them to responses.

use std::io;

use thiserror::Error;

/// Errors returned by the business-logic driver.
#[derive(Debug, Error)]
pub enum DriverError {
    /// The driver refused the request. Handlers surface the message to the
    /// client with the status code appropriate for the command (530, 550).
    #[error("{0}")]
    Rejected(String),

    /// The driver itself failed. Handlers propagate this as a fault, which
    /// the dispatcher turns into a `500 Internal error` response.
    #[error("driver failure: {0}")]
    Io(#[from] io::Error),
}

/// Transfer-connection lifecycle errors.
#[derive(Debug, Error)]
pub enum TransferError {
    /// `transfer_open` was called with no transfer connection attached.
    #[error("no transfer connection declared")]
    NotDeclared,

    #[error("transfer connection failed: {0}")]
    Io(#[from] io::Error),
}

/// A command handler fault.
///
/// Caught at the dispatch boundary and mapped to a `500 Internal error`
/// response; a fault never tears the session down, only connection-level
/// errors do.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("{0}")]
    Driver(#[from] DriverError),

    #[error("{0}")]
    Transfer(#[from] TransferError),

    #[error("{0}")]
    Io(#[from] io::Error),
}
