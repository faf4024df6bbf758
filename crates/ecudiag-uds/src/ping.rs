//! Network reachability check, independent of any DoIP session
//!
//! Tries the system `ping` utility first. If it is missing or gets no reply
//! (ICMP is often filtered on vehicle networks), a TCP connect to the DoIP
//! port decides instead.

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::net::TcpStream;
use tokio::process::Command;
use tokio::time::Instant;
use tracing::debug;

use crate::config::DEFAULT_DOIP_PORT;

/// Default time allowed for each reachability step
pub const DEFAULT_PING_TIMEOUT: Duration = Duration::from_secs(3);

/// Which check produced the result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PingMethod {
    /// Name resolution failed, nothing was sent
    Resolve,
    SystemPing,
    TcpConnect,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PingResult {
    pub success: bool,
    pub host: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub method: PingMethod,
}

/// Check `host` with the default DoIP port and timeout
pub async fn ping_host(host: &str) -> PingResult {
    ping_host_with(host, DEFAULT_DOIP_PORT, DEFAULT_PING_TIMEOUT).await
}

/// Check `host`; `port` is used by the TCP fallback
pub async fn ping_host_with(host: &str, port: u16, timeout: Duration) -> PingResult {
    let ip = match resolve(host, port).await {
        Ok(ip) => ip,
        Err(e) => {
            return PingResult {
                success: false,
                host: host.to_string(),
                ip: None,
                time_ms: None,
                error: Some(e),
                method: PingMethod::Resolve,
            }
        }
    };

    let system = system_ping(host, ip, timeout).await;
    if system.success {
        return system;
    }
    debug!(host, error = ?system.error, "System ping failed, trying TCP connect");

    tcp_check(host, ip, port, timeout).await
}

async fn resolve(host: &str, port: u16) -> Result<IpAddr, String> {
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Ok(ip);
    }
    tokio::net::lookup_host((host, port))
        .await
        .map_err(|e| format!("DNS resolution failed: {}", e))?
        .next()
        .map(|addr| addr.ip())
        .ok_or_else(|| format!("No IP address found for {}", host))
}

async fn system_ping(host: &str, ip: IpAddr, timeout: Duration) -> PingResult {
    let count_flag = if cfg!(target_os = "windows") { "-n" } else { "-c" };
    let start = Instant::now();

    let output = tokio::time::timeout(
        timeout,
        Command::new("ping")
            .args([count_flag, "1", &ip.to_string()])
            .kill_on_drop(true)
            .output(),
    )
    .await;
    let elapsed = start.elapsed();

    let error = match output {
        Ok(Ok(output)) if output.status.success() => None,
        Ok(Ok(output)) => Some(format!(
            "System ping failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        )),
        Ok(Err(e)) => Some(format!("Failed to execute ping command: {}", e)),
        Err(_) => Some("System ping timed out".to_string()),
    };

    PingResult {
        success: error.is_none(),
        host: host.to_string(),
        ip: Some(ip.to_string()),
        time_ms: error.is_none().then(|| elapsed.as_secs_f64() * 1000.0),
        error,
        method: PingMethod::SystemPing,
    }
}

/// A refused connection still proves the host is up
async fn tcp_check(host: &str, ip: IpAddr, port: u16, timeout: Duration) -> PingResult {
    let start = Instant::now();
    let connect = TcpStream::connect(SocketAddr::new(ip, port));
    let result = tokio::time::timeout(timeout, connect).await;
    let elapsed = start.elapsed();

    let error = match result {
        Ok(Ok(_)) => None,
        Ok(Err(e)) if e.kind() == std::io::ErrorKind::ConnectionRefused => None,
        Ok(Err(e)) => Some(format!("TCP connect failed: {}", e)),
        Err(_) => Some(format!("TCP connect to port {} timed out", port)),
    };

    PingResult {
        success: error.is_none(),
        host: host.to_string(),
        ip: Some(ip.to_string()),
        time_ms: error.is_none().then(|| elapsed.as_secs_f64() * 1000.0),
        error,
        method: PingMethod::TcpConnect,
    }
}
