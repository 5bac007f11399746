//! FTP protocol implementation
//!
//! Handles command-line parsing, the verb dispatch table, the baseline
//! command handlers, and response formatting.

pub mod commands;
pub mod handlers;
pub mod parser;
pub mod responses;

pub use commands::{CommandDescriptor, CommandHandler, CommandSet, HandlerFuture};
pub use parser::parse_line;
