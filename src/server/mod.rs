//! Server: accept loop and session bookkeeping
//!
//! Accepts control connections, constructs one session per connection, and
//! tracks active sessions so departures can be accounted for.

pub mod config;
pub mod core;

pub use config::ServerConfig;
pub use core::{Server, SessionRegistry};
