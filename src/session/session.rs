//! Module `session`
//!
//! The per-connection state machine. One `ClientSession` is constructed per
//! accepted control connection and runs `handle_commands` to completion on
//! its own task: greet, then read-dispatch-respond until disconnect, idle
//! timeout, or a fatal I/O error. Whatever the exit path, teardown runs
//! exactly once and notifies the driver and the server registry.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use tokio::net::TcpStream;
use tokio::time;

use crate::driver::{ClientDriver, ServerDriver, SessionInfo};
use crate::error::{CommandError, TransferError};
use crate::protocol::{CommandSet, parse_line, responses};
use crate::server::core::SessionRegistry;
use crate::session::control::ControlChannel;
use crate::transfer::TransferConnection;

/// Bound on how long the courtesy 421 and the close may take after an idle
/// timeout fires; teardown is never allowed to hang on a slow peer.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(60);

pub struct ClientSession {
    id: u32,
    connected_at: DateTime<Utc>,
    control: ControlChannel,
    server_driver: Arc<dyn ServerDriver>,
    registry: Arc<SessionRegistry>,
    commands: Arc<CommandSet>,
    idle_timeout: Option<Duration>,

    /// Attached by a successful PASS; its presence is the authentication flag.
    driver: Option<Arc<dyn ClientDriver>>,
    user: String,
    path: String,

    // Per-command scratch, overwritten on every dispatch.
    command: String,
    param: String,

    // Cross-command scratch for the RNFR/RNTO and REST/RETR pairs.
    rename_from: Option<String>,
    restart_offset: u64,

    transfer: Option<Box<dyn TransferConnection>>,
    transfer_tls: bool,
    debug: bool,
    closing: bool,
}

impl ClientSession {
    pub fn new(
        id: u32,
        stream: TcpStream,
        server_driver: Arc<dyn ServerDriver>,
        registry: Arc<SessionRegistry>,
        commands: Arc<CommandSet>,
        idle_timeout: Option<Duration>,
    ) -> io::Result<Self> {
        let control = ControlChannel::new(stream)?;
        Ok(Self {
            id,
            connected_at: Utc::now(),
            control,
            server_driver,
            registry,
            commands,
            idle_timeout,
            driver: None,
            user: String::new(),
            path: "/".to_string(),
            command: String::new(),
            param: String::new(),
            rename_from: None,
            restart_offset: 0,
            transfer: None,
            transfer_tls: false,
            debug: false,
            closing: false,
        })
    }

    /// Runs the whole session to completion: greeting, read loop, teardown.
    /// Never returns early; every exit path funnels through `end`.
    pub async fn handle_commands(mut self) {
        self.run().await;
        self.end().await;
    }

    async fn run(&mut self) {
        let info = self.info();
        let welcome = self.server_driver().welcome_user(&info).await;
        match welcome {
            Ok(message) => {
                if let Err(err) = self.write_message(responses::READY, &message).await {
                    error!("client {}: greeting failed: {}", self.id, err);
                    return;
                }
            }
            Err(err) => {
                warn!("client {}: driver refused connection: {}", self.id, err);
                let _ = self
                    .write_message(responses::INTERNAL_ERROR, &err.to_string())
                    .await;
                return;
            }
        }

        let mut line = String::new();
        while !self.closing {
            // The deadline is re-armed from "now" before every read so the
            // timeout measures idle time, not session age.
            let read = match self.idle_timeout {
                Some(limit) => {
                    let outcome = time::timeout(limit, self.control.read_line(&mut line)).await;
                    match outcome {
                        Ok(read) => read,
                        Err(_) => {
                            // A partially read line is lost here; irrelevant,
                            // the session is ending.
                            self.idle_expired(limit).await;
                            return;
                        }
                    }
                }
                None => self.control.read_line(&mut line).await,
            };

            match read {
                Ok(0) => {
                    if self.debug {
                        debug!("client {}: clean disconnect", self.id);
                    }
                    return;
                }
                Ok(_) => {
                    if self.debug {
                        debug!(
                            "client {}: FTP RECV {:?}",
                            self.id,
                            line.trim_end_matches(['\r', '\n'])
                        );
                    }
                    if let Err(err) = self.dispatch_line(&line).await {
                        error!("client {}: control write error: {}", self.id, err);
                        return;
                    }
                }
                Err(err) => {
                    error!("client {}: control read error: {}", self.id, err);
                    return;
                }
            }
        }
    }

    /// Parses and dispatches one received line. Returns `Err` only for
    /// control-connection write failures, which are session-fatal; handler
    /// faults are contained here and answered with a `500`.
    async fn dispatch_line(&mut self, line: &str) -> io::Result<()> {
        let (verb, param) = parse_line(line);
        self.command = verb.to_ascii_uppercase();
        self.param = param.to_string();

        let commands = Arc::clone(&self.commands);
        let Some(descriptor) = commands.lookup(&self.command) else {
            return self
                .write_message(responses::UNKNOWN_COMMAND, "Unknown command")
                .await;
        };
        if self.driver.is_none() && !descriptor.open {
            return self
                .write_message(responses::NOT_LOGGED_IN, "Please login with USER and PASS")
                .await;
        }

        if let Err(fault) = (descriptor.handler)(self).await {
            warn!("client {}: {} failed: {}", self.id, self.command, fault);
            self.write_message(responses::INTERNAL_ERROR, &format!("Internal error: {}", fault))
                .await?;
        }
        Ok(())
    }

    async fn idle_expired(&mut self, limit: Duration) {
        info!("client {}: idle timeout", self.id);
        let notice = format!(
            "command timeout ({} seconds): closing control connection",
            limit.as_secs()
        );
        let farewell = async {
            self.write_message(responses::SERVICE_NOT_AVAILABLE, &notice)
                .await?;
            self.control.shutdown().await
        };
        let outcome = time::timeout(SHUTDOWN_GRACE, farewell).await;
        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(err)) => error!("client {}: close after idle timeout failed: {}", self.id, err),
            Err(_) => error!("client {}: closing the control connection stalled", self.id),
        }
    }

    /// Teardown, run exactly once regardless of which exit path triggered
    /// it: driver notification, registry departure, transfer cleanup.
    async fn end(&mut self) {
        let info = self.info();
        self.server_driver().user_left(&info).await;
        self.registry.client_departure(self.id);
        if let Some(mut transfer) = self.transfer.take() {
            transfer.close().await;
            if self.debug {
                debug!("client {}: transfer connection closed at session end", self.id);
            }
        }
        info!("client {}: session ended ({})", self.id, info.remote_addr);
    }

    // --------------------
    // Responses
    // --------------------

    /// Writes one raw response line (CRLF appended, flushed immediately).
    pub async fn write_line(&mut self, line: &str) -> io::Result<()> {
        if self.debug {
            debug!("client {}: FTP SEND {:?}", self.id, line);
        }
        self.control.write_line(line).await
    }

    /// Writes a formatted `<code> <message>` response line.
    pub async fn write_message(&mut self, code: u16, message: &str) -> io::Result<()> {
        self.write_line(&format!("{} {}", code, message)).await
    }

    // --------------------
    // Transfer connection lifecycle
    // --------------------

    /// Attaches a transfer connection, closing any previous one first so a
    /// handle can never leak; the session holds at most one at a time.
    pub async fn set_transfer(&mut self, transfer: Box<dyn TransferConnection>) {
        if let Some(mut previous) = self.transfer.take() {
            previous.close().await;
        }
        self.transfer = Some(transfer);
    }

    pub fn has_transfer(&self) -> bool {
        self.transfer.is_some()
    }

    /// Announces the transfer with a `150` and asks the attached connection
    /// for its data socket. With nothing attached this answers `550` and
    /// fails without blocking.
    pub async fn transfer_open(&mut self) -> Result<TcpStream, TransferError> {
        if self.transfer.is_none() {
            self.write_message(responses::ACTION_NOT_TAKEN, "No passive connection declared")
                .await?;
            return Err(TransferError::NotDeclared);
        }
        self.write_message(responses::TRANSFER_OPEN, "Using transfer connection")
            .await?;
        let transfer = self.transfer.as_mut().ok_or(TransferError::NotDeclared)?;
        let socket = transfer.open().await?;
        if self.debug {
            if let (Ok(local), Ok(remote)) = (socket.local_addr(), socket.peer_addr()) {
                debug!(
                    "client {}: transfer connection opened ({} -> {})",
                    self.id, local, remote
                );
            }
        }
        Ok(socket)
    }

    /// Answers `226`, closes and detaches the transfer connection. A no-op
    /// when nothing is attached.
    pub async fn transfer_close(&mut self) -> io::Result<()> {
        let Some(mut transfer) = self.transfer.take() else {
            return Ok(());
        };
        let wrote = self
            .write_message(responses::TRANSFER_CLOSE, "Closing transfer connection")
            .await;
        transfer.close().await;
        if self.debug {
            debug!("client {}: transfer connection closed", self.id);
        }
        wrote
    }

    // --------------------
    // Accessors
    // --------------------

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn connected_at(&self) -> DateTime<Utc> {
        self.connected_at
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.control.local_addr()
    }

    pub fn remote_addr(&self) -> SocketAddr {
        self.control.remote_addr()
    }

    /// Current working directory; replaced wholesale by CWD/CDUP, never
    /// mutated incrementally.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn set_path(&mut self, path: String) {
        self.path = path;
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn set_user(&mut self, user: String) {
        self.user = user;
    }

    /// Verb of the command currently being dispatched, uppercased.
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Parameter of the command currently being dispatched, case preserved.
    pub fn param(&self) -> &str {
        &self.param
    }

    pub fn authenticated(&self) -> bool {
        self.driver.is_some()
    }

    pub fn attach_driver(&mut self, driver: Arc<dyn ClientDriver>) {
        self.driver = Some(driver);
    }

    /// The per-user driver. Dispatch gating guarantees it is attached for
    /// every non-open verb, so an absence here is a handler fault.
    pub fn client_driver(&self) -> Result<Arc<dyn ClientDriver>, CommandError> {
        self.driver
            .clone()
            .ok_or_else(|| CommandError::Io(io::Error::other("no client driver attached")))
    }

    pub fn server_driver(&self) -> Arc<dyn ServerDriver> {
        Arc::clone(&self.server_driver)
    }

    /// Rename source set by RNFR, consumed by RNTO.
    pub fn set_rename_from(&mut self, source: Option<String>) {
        self.rename_from = source;
    }

    pub fn take_rename_from(&mut self) -> Option<String> {
        self.rename_from.take()
    }

    /// Restart offset set by REST, consumed by the next RETR/STOR.
    pub fn restart_offset(&self) -> u64 {
        self.restart_offset
    }

    pub fn set_restart_offset(&mut self, offset: u64) {
        self.restart_offset = offset;
    }

    pub fn transfer_tls(&self) -> bool {
        self.transfer_tls
    }

    pub fn set_transfer_tls(&mut self, tls: bool) {
        self.transfer_tls = tls;
    }

    pub fn debug(&self) -> bool {
        self.debug
    }

    pub fn set_debug(&mut self, debug: bool) {
        self.debug = debug;
    }

    /// Marks the session for a clean close after the current command.
    pub fn request_close(&mut self) {
        self.closing = true;
    }

    /// Owned identity snapshot for driver calls.
    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            id: self.id,
            remote_addr: self.control.remote_addr(),
            local_addr: self.control.local_addr(),
            connected_at: self.connected_at,
            user: self.user.clone(),
        }
    }
}
