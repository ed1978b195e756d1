//! Process configuration from command-line flags and `USERSYNC_*` variables.

use std::time::Duration;

use anyhow::bail;
use clap::{Parser, ValueEnum};
use usersync_core::USERS_ROOT;

use crate::network::NetworkConfig;
use crate::records::AdapterConfig;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogFormat {
    /// Human-readable compact lines.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

/// Command-line arguments of `usersync-server`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "usersync-server",
    version,
    about = "User records over a document store, served as HTTP and a WebSocket feed"
)]
pub struct ServerArgs {
    /// Bind address.
    #[arg(long, env = "USERSYNC_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Listen port.
    #[arg(long, env = "USERSYNC_PORT", default_value_t = 8080)]
    pub port: u16,

    /// Collection root holding the records.
    #[arg(long, env = "USERSYNC_COLLECTION", default_value = USERS_ROOT)]
    pub collection: String,

    /// Prefix of image download URLs. Defaults to this server's `/assets`.
    #[arg(long, env = "USERSYNC_ASSET_BASE_URL")]
    pub asset_base_url: Option<String>,

    #[arg(long, env = "USERSYNC_LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,

    /// Let PATCH on a missing id create a partial record instead of 404.
    #[arg(long, env = "USERSYNC_UPDATE_CREATES_MISSING")]
    pub update_creates_missing: bool,

    /// Per-request timeout in seconds.
    #[arg(long, env = "USERSYNC_REQUEST_TIMEOUT_SECS", default_value_t = 30)]
    pub request_timeout_secs: u64,
}

impl ServerArgs {
    #[must_use]
    pub fn network_config(&self) -> NetworkConfig {
        NetworkConfig {
            host: self.host.clone(),
            port: self.port,
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            ..NetworkConfig::default()
        }
    }

    #[must_use]
    pub fn adapter_config(&self) -> AdapterConfig {
        AdapterConfig {
            collection: self.collection.clone(),
            update_creates_missing: self.update_creates_missing,
        }
    }

    /// Asset URL prefix; falls back to `http://{host}:{port}/assets`, with a
    /// wildcard host replaced by `localhost`.
    ///
    /// # Errors
    ///
    /// Returns an error when no prefix is configured and the port is 0, since
    /// image URLs are fixed before the OS assigns a port.
    pub fn asset_base_url(&self) -> anyhow::Result<String> {
        if let Some(url) = &self.asset_base_url {
            return Ok(url.clone());
        }
        if self.port == 0 {
            bail!("--asset-base-url is required when --port is 0");
        }
        let host = match self.host.as_str() {
            "0.0.0.0" | "::" | "[::]" => "localhost",
            other => other,
        };
        Ok(format!("http://{host}:{}/assets", self.port))
    }
}
