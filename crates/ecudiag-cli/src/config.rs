//! Configuration file handling for ecudiag

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Args;
use ecudiag_uds::config::parse_logical_address;
use ecudiag_uds::{ConnectionConfig, SecurityConfig};
use serde::{Deserialize, Serialize};

/// Contents of `config.toml`
///
/// ```toml
/// [connection]
/// host = "192.168.0.10"
/// server_address = "0x1001"
///
/// [security]
/// constant = 0x1234
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Default gateway to connect to
    pub connection: Option<ConnectionConfig>,
    #[serde(default)]
    pub security: SecurityConfig,
    #[serde(default)]
    pub no_color: bool,
}

/// Connection flags shared by the commands that talk to an ECU
#[derive(Debug, Clone, Default, Args)]
pub struct ConnectionArgs {
    /// Gateway IP address or hostname
    #[arg(long, env = "ECUDIAG_HOST")]
    pub host: Option<String>,

    /// Gateway TCP port
    #[arg(long)]
    pub port: Option<u16>,

    /// ECU logical address as hex (e.g. 1001)
    #[arg(long)]
    pub server: Option<String>,

    /// Tester logical address as hex (e.g. 0E80)
    #[arg(long)]
    pub client: Option<String>,

    /// Send/receive timeout in milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Security access cipher constant as hex
    #[arg(long)]
    pub constant: Option<String>,
}

impl ClientConfig {
    /// Load configuration from the default config file
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Get the default config file path
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?
            .join("ecudiag");

        Ok(config_dir.join("config.toml"))
    }

    /// Merge command-line flags over config file values
    pub fn merge_with_args(
        &self,
        args: &ConnectionArgs,
    ) -> Result<(ConnectionConfig, SecurityConfig)> {
        let file = self.connection.as_ref();

        let Some(host) = args
            .host
            .clone()
            .or_else(|| file.map(|c| c.host.clone()))
        else {
            bail!("No host given; pass --host or set connection.host in the config file");
        };

        let server_address = match &args.server {
            Some(text) => parse_logical_address(text)
                .with_context(|| format!("Invalid server address: {}", text))?,
            None => match file {
                Some(c) => c.server_address,
                None => bail!(
                    "No ECU address given; pass --server or set connection.server_address"
                ),
            },
        };

        let mut connection = ConnectionConfig::new(host, server_address);
        if let Some(file) = file {
            connection.port = file.port;
            connection.client_address = file.client_address;
            connection.timeout_ms = file.timeout_ms;
        }
        if let Some(port) = args.port {
            connection.port = port;
        }
        if let Some(text) = &args.client {
            connection.client_address = parse_logical_address(text)
                .with_context(|| format!("Invalid client address: {}", text))?;
        }
        if let Some(timeout_ms) = args.timeout_ms {
            connection.timeout_ms = timeout_ms;
        }

        let mut security = self.security;
        if let Some(text) = &args.constant {
            security.constant = parse_hex_u32(text)?;
        }

        Ok((connection, security))
    }
}

/// Parse a 32-bit value written as hex, with or without a `0x` prefix
pub fn parse_hex_u32(text: &str) -> Result<u32> {
    let trimmed = text.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    u32::from_str_radix(digits, 16).with_context(|| format!("Invalid hex value: {}", text))
}
