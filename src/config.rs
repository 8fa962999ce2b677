//! Connection configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_rustls::rustls;

/// Transport security for the initial connection.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum Security {
    /// Plain TCP.
    #[default]
    Plain,
    /// TLS from the first byte (implicit TLS).
    Tls(TlsParams),
}

/// TLS knobs for [`Security::Tls`].
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TlsParams {
    /// SNI name; defaults to the server host.
    #[serde(default)]
    pub sni: Option<String>,
    /// Extra PEM CA bundle trusted alongside the webpki roots.
    #[serde(default)]
    pub ca_cert: Option<PathBuf>,
    /// Full client config override; when set, `ca_cert` is ignored.
    #[serde(skip)]
    pub client_config: Option<Arc<rustls::ClientConfig>>,
}

/// Where and how to reach the server.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerParams {
    /// Server hostname or IP literal.
    #[serde(default = "default_host")]
    pub host: String,
    /// Server port (default: 25).
    #[serde(default = "default_port")]
    pub port: u16,
    /// Time allowed for connecting, handshaking and reading the greeting.
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for ServerParams {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            timeout: default_timeout(),
        }
    }
}

/// Full connection configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ConnectConfig {
    /// Transport security.
    #[serde(default)]
    pub security: Security,
    /// Server endpoint.
    #[serde(default)]
    pub server: ServerParams,
}

// Default value functions
fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    25
}
fn default_timeout() -> Duration {
    Duration::from_secs(10)
}

impl ConnectConfig {
    /// Load configuration from file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
