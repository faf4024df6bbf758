//! Connection and security access configuration
//!
//! Logical addresses may be written either as integers (`0x0E80` in TOML) or
//! as hex strings (`"0E80"`, `"0x0E80"`), the form diagnostic tools usually
//! display them in.

use std::num::ParseIntError;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};

use crate::uds::UdsError;

/// Default DoIP TCP port (ISO 13400)
pub const DEFAULT_DOIP_PORT: u16 = 13400;

/// Default tester logical address
pub const DEFAULT_CLIENT_ADDRESS: u16 = 0x0E80;

/// Default send/receive timeout in milliseconds
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Default cipher constant used when submitting a security key
pub const DEFAULT_SECURITY_CONSTANT: u32 = 0x1234;

/// Where and how to reach a DoIP entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Gateway IP address or hostname
    pub host: String,
    /// Gateway TCP port (default: 13400)
    #[serde(default = "default_port")]
    pub port: u16,
    /// Tester logical address (default: 0x0E80)
    #[serde(
        default = "default_client_address",
        deserialize_with = "deserialize_logical_address"
    )]
    pub client_address: u16,
    /// ECU logical address
    #[serde(deserialize_with = "deserialize_logical_address")]
    pub server_address: u16,
    /// Connect, send and receive timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_port() -> u16 {
    DEFAULT_DOIP_PORT
}

fn default_client_address() -> u16 {
    DEFAULT_CLIENT_ADDRESS
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

impl ConnectionConfig {
    pub fn new(host: impl Into<String>, server_address: u16) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_DOIP_PORT,
            client_address: DEFAULT_CLIENT_ADDRESS,
            server_address,
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_client_address(mut self, client_address: u16) -> Self {
        self.client_address = client_address;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// `host:port` as accepted by the socket resolver
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Reject configurations no transport could use
    pub fn validate(&self) -> Result<(), UdsError> {
        if self.host.trim().is_empty() {
            return Err(UdsError::MalformedRequest("host must not be empty".into()));
        }
        if self.port == 0 {
            return Err(UdsError::MalformedRequest("port must not be 0".into()));
        }
        if self.timeout_ms == 0 {
            return Err(UdsError::MalformedRequest(
                "timeout must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

/// Operator-supplied security access parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Constant mixed into the seed-to-key transform
    #[serde(default = "default_security_constant")]
    pub constant: u32,
}

fn default_security_constant() -> u32 {
    DEFAULT_SECURITY_CONSTANT
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            constant: DEFAULT_SECURITY_CONSTANT,
        }
    }
}

/// Parse a logical address written as hex, with or without a `0x` prefix
pub fn parse_logical_address(text: &str) -> Result<u16, ParseIntError> {
    let text = text.trim();
    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text);
    u16::from_str_radix(digits, 16)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum AddressRepr {
    Number(u16),
    Text(String),
}

fn deserialize_logical_address<'de, D>(deserializer: D) -> Result<u16, D::Error>
where
    D: Deserializer<'de>,
{
    match AddressRepr::deserialize(deserializer)? {
        AddressRepr::Number(value) => Ok(value),
        AddressRepr::Text(text) => parse_logical_address(&text).map_err(|e| {
            serde::de::Error::custom(format!("invalid logical address '{}': {}", text, e))
        }),
    }
}
