//! Helm FTP Server - entry point
//!
//! Wires the session engine to a minimal in-memory driver so the engine can
//! be exercised end to end from any FTP-speaking client.

use std::sync::Arc;

use async_trait::async_trait;
use log::info;

use helm_ftp_server::Server;
use helm_ftp_server::driver::{ClientDriver, ServerDriver, SessionInfo};
use helm_ftp_server::error::DriverError;
use helm_ftp_server::server::ServerConfig;

/// Single-user demo driver: `demo` logs in with any password, the directory
/// tree is purely virtual, nothing touches a real filesystem.
struct DemoDriver;

#[async_trait]
impl ServerDriver for DemoDriver {
    async fn welcome_user(&self, session: &SessionInfo) -> Result<String, DriverError> {
        Ok(format!("Helm FTP server ready, session {}", session.id))
    }

    async fn authenticate_user(
        &self,
        _session: &SessionInfo,
        user: &str,
        _password: &str,
    ) -> Result<Arc<dyn ClientDriver>, DriverError> {
        if user == "demo" {
            Ok(Arc::new(DemoClient))
        } else {
            Err(DriverError::Rejected("unknown user".to_string()))
        }
    }

    async fn user_left(&self, session: &SessionInfo) {
        info!(
            "user {:?} left (session {}, connected since {})",
            session.user, session.id, session.connected_at
        );
    }
}

struct DemoClient;

#[async_trait]
impl ClientDriver for DemoClient {
    async fn change_directory(
        &self,
        _session: &SessionInfo,
        current: &str,
        target: &str,
    ) -> Result<String, DriverError> {
        Ok(resolve(current, target))
    }

    async fn rename(
        &self,
        _session: &SessionInfo,
        _from: &str,
        _to: &str,
    ) -> Result<(), DriverError> {
        Err(DriverError::Rejected(
            "renaming is not supported here".to_string(),
        ))
    }
}

/// Resolves `target` against `current` without touching any filesystem.
fn resolve(current: &str, target: &str) -> String {
    let mut parts: Vec<&str> = if target.starts_with('/') {
        Vec::new()
    } else {
        current.split('/').filter(|part| !part.is_empty()).collect()
    };
    for part in target.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            name => parts.push(name),
        }
    }
    format!("/{}", parts.join("/"))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // env_logger picks up the RUST_LOG environment variable.
    env_logger::init();

    let config = ServerConfig::load()?;
    let server = Server::bind(config, Arc::new(DemoDriver)).await?;
    server.serve().await?;
    Ok(())
}
