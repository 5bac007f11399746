//! Module `server`
//!
//! The accept loop: binds the control socket, enforces the session limit,
//! assigns unique session ids, and spawns one task per accepted connection
//! running the session to completion.

use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use log::{error, info, warn};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;

use crate::driver::ServerDriver;
use crate::protocol::{CommandSet, responses};
use crate::server::config::ServerConfig;
use crate::session::ClientSession;

/// Bookkeeping shared by all sessions. Each session reports its departure
/// here exactly once; calls arrive concurrently from many session tasks.
#[derive(Default)]
pub struct SessionRegistry {
    active: Mutex<HashMap<u32, SocketAddr>>,
}

impl SessionRegistry {
    pub fn client_arrival(&self, id: u32, addr: SocketAddr) {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        active.insert(id, addr);
    }

    pub fn client_departure(&self, id: u32) {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        active.remove(&id);
    }

    pub fn active_count(&self) -> usize {
        let active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        active.len()
    }
}

pub struct Server {
    listener: TcpListener,
    driver: Arc<dyn ServerDriver>,
    registry: Arc<SessionRegistry>,
    commands: Arc<CommandSet>,
    config: ServerConfig,
    next_id: AtomicU32,
}

impl Server {
    /// Binds the control listener. The driver is shared by every session
    /// this server will accept.
    pub async fn bind(config: ServerConfig, driver: Arc<dyn ServerDriver>) -> io::Result<Self> {
        let listener = TcpListener::bind(config.bind_addr()).await?;
        info!("server bound to {}", listener.local_addr()?);
        Ok(Self {
            listener,
            driver,
            registry: Arc::new(SessionRegistry::default()),
            commands: Arc::new(CommandSet::baseline()),
            config,
            next_id: AtomicU32::new(1),
        })
    }

    /// Replaces the verb table handed to new sessions, letting the embedding
    /// server register its own data-mode and extension handlers. Call before
    /// `serve`; sessions already running keep the set they started with.
    pub fn set_commands(&mut self, commands: CommandSet) {
        self.commands = Arc::new(commands);
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn registry(&self) -> Arc<SessionRegistry> {
        Arc::clone(&self.registry)
    }

    /// Accepts control connections until the listener fails fatally. Each
    /// accepted connection gets a fresh session id and its own task.
    pub async fn serve(&self) -> io::Result<()> {
        info!(
            "serving FTP control connections (max {} clients)",
            self.config.max_clients
        );
        loop {
            let (mut stream, addr) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(err) => {
                    error!("accept failed: {}", err);
                    continue;
                }
            };

            if self.registry.active_count() >= self.config.max_clients {
                warn!("rejecting {}: session limit reached", addr);
                let notice = responses::format_response(
                    responses::SERVICE_NOT_AVAILABLE,
                    "Too many connections, closing control connection",
                );
                let _ = stream.write_all(notice.as_bytes()).await;
                continue;
            }

            let id = self.next_id.fetch_add(1, Ordering::Relaxed);
            let session = match ClientSession::new(
                id,
                stream,
                Arc::clone(&self.driver),
                self.registry(),
                Arc::clone(&self.commands),
                self.config.idle_timeout(),
            ) {
                Ok(session) => session,
                Err(err) => {
                    warn!("client {} ({}): session setup failed: {}", id, addr, err);
                    continue;
                }
            };

            self.registry.client_arrival(id, addr);
            info!(
                "client {} connected from {} ({} active)",
                id,
                addr,
                self.registry.active_count()
            );
            tokio::spawn(session.handle_commands());
        }
    }
}
