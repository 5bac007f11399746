//! Transfer connection contract
//!
//! A session owns at most one transfer connection at a time. Concrete
//! variants (active, passive, with or without TLS) are constructed by
//! data-mode command handlers outside this engine and attached to the
//! session with `set_transfer`; the session only ever talks to this trait
//! and enforces the `150`/`226`/`550` response ordering around it.

use std::io;

use async_trait::async_trait;
use tokio::net::TcpStream;

/// One data connection for bulk transfers.
#[async_trait]
pub trait TransferConnection: Send {
    /// Produces the data socket, blocking until the peer is connected.
    async fn open(&mut self) -> io::Result<TcpStream>;

    /// Releases the connection. Safe to call on an already-closed one.
    async fn close(&mut self);
}
