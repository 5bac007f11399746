//! Client session management
//!
//! Owns one control connection end to end: the line-oriented I/O and the
//! per-connection state machine that drives the read-dispatch-respond loop.

pub mod control;
pub mod session;

pub use control::ControlChannel;
pub use session::ClientSession;
