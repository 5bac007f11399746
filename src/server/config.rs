//! Server configuration
//!
//! Defaults suit a local development setup; any field can be overridden from
//! an optional `helm-ftp.toml` next to the process or from `HELM_FTP_*`
//! environment variables.

use std::time::Duration;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_clients: usize,
    /// Idle timeout in seconds; 0 disables the deadline entirely.
    pub idle_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 2121,
            max_clients: 10,
            idle_timeout_secs: 300,
        }
    }
}

impl ServerConfig {
    /// Loads configuration from file and environment, on top of defaults.
    pub fn load() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::File::with_name("helm-ftp").required(false))
            .add_source(config::Environment::with_prefix("HELM_FTP"))
            .build()?
            .try_deserialize()
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn idle_timeout(&self) -> Option<Duration> {
        if self.idle_timeout_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.idle_timeout_secs))
        }
    }
}
