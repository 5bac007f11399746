//! Driver boundary
//!
//! The engine owns the protocol; everything that touches users or storage is
//! delegated to a driver supplied by the embedding server. [`ServerDriver`]
//! is shared by all sessions and must tolerate concurrent calls;
//! [`ClientDriver`] is handed out per authenticated user. A session holds no
//! client driver until login succeeds, and that absence is what gates
//! privileged commands.

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::DriverError;

/// Owned snapshot of a session's identity, handed to driver calls so the
/// driver never borrows the live session state.
#[derive(Debug, Clone)]
pub struct SessionInfo {
    /// Server-scoped unique id, assigned at accept time.
    pub id: u32,
    pub remote_addr: SocketAddr,
    pub local_addr: SocketAddr,
    pub connected_at: DateTime<Utc>,
    /// Username; empty until the client has sent USER.
    pub user: String,
}

/// Server-wide driver, shared across all sessions.
#[async_trait]
pub trait ServerDriver: Send + Sync {
    /// Called once when a session starts. The returned message is sent in
    /// the `220` greeting; an error aborts the session with a `500` before
    /// the read loop begins.
    async fn welcome_user(&self, session: &SessionInfo) -> Result<String, DriverError>;

    /// Called by the PASS handler. Success attaches the returned client
    /// driver to the session, which from then on counts as authenticated.
    async fn authenticate_user(
        &self,
        session: &SessionInfo,
        user: &str,
        password: &str,
    ) -> Result<Arc<dyn ClientDriver>, DriverError>;

    /// Called exactly once when a session ends, after the control connection
    /// is no longer read from.
    async fn user_left(&self, session: &SessionInfo);
}

/// Per-user driver, attached to a session after successful authentication.
#[async_trait]
pub trait ClientDriver: Send + Sync {
    /// Resolves `target` against the session's `current` working directory
    /// and returns the new directory path; the session stores it wholesale.
    async fn change_directory(
        &self,
        session: &SessionInfo,
        current: &str,
        target: &str,
    ) -> Result<String, DriverError>;

    /// Completes a two-step rename (RNFR/RNTO).
    async fn rename(&self, session: &SessionInfo, from: &str, to: &str)
    -> Result<(), DriverError>;
}
