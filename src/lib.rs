//! Helm FTP Server
//!
//! The control-connection engine of an FTP server: parses the command
//! protocol line by line, enforces authentication gating, dispatches to
//! command handlers, and manages the lifecycle of the data connection.
//! Business logic (filesystem access, credential checks) lives behind the
//! driver traits in [`driver`]; data-connection variants live behind the
//! trait in [`transfer`].

pub mod driver;
pub mod error;
pub mod protocol;
pub mod server;
pub mod session;
pub mod transfer;

pub use server::Server;
